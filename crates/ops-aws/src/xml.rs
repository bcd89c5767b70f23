//! Helpers for Query protocol XML bodies.
//!
//! AWS wraps every list in an element whose children all share one member
//! name, and that name varies by shape:
//!
//! ```xml
//! <DBInstances><DBInstance>…</DBInstance><DBInstance>…</DBInstance></DBInstances>
//! <StaticMembers><member>db-1</member></StaticMembers>
//! ```
//!
//! The functions here are `deserialize_with` targets that flatten such a
//! wrapper into a plain `Vec`, so the same struct serializes to JSON as a
//! bare array.

use serde::de::{Deserialize, DeserializeOwned, Deserializer};

macro_rules! member_list {
    ($(#[$doc:meta])* $name:ident, $member:literal) => {
        $(#[$doc])*
        pub fn $name<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
        where
            D: Deserializer<'de>,
            T: DeserializeOwned,
        {
            #[derive(serde::Deserialize)]
            #[serde(bound = "T: DeserializeOwned")]
            struct Wrapper<T> {
                #[serde(rename = $member, default = "Vec::new")]
                items: Vec<T>,
            }
            Ok(Wrapper::<T>::deserialize(deserializer)?.items)
        }
    };
}

member_list!(
    /// `<DBInstances><DBInstance>…`
    db_instances,
    "DBInstance"
);

member_list!(
    /// `<DBClusterEndpoints><DBClusterEndpointList>…`
    db_cluster_endpoints,
    "DBClusterEndpointList"
);

member_list!(
    /// Generic `<Wrapper><member>…` lists.
    members,
    "member"
);

/// Parse a Query protocol response body.
pub fn from_str<T: DeserializeOwned>(body: &str) -> Result<T, quick_xml::de::DeError> {
    quick_xml::de::from_str(body)
}
