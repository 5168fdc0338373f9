use serde::{Deserialize, Serialize};

/// Registry limits and policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Entries kept in the in-process LRU layer. 0 disables the layer.
    pub memory_capacity: usize,
    /// Time to live of entries written to the shared cache. 0 never expires.
    pub cache_ttl_secs: u64,
    /// Keep every registered version in storage history.
    pub versioning: bool,
    /// Permission a user needs before `get_for_user` looks anything up.
    pub read_permission: Option<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            memory_capacity: 256,
            cache_ttl_secs: 3600,
            versioning: true,
            read_permission: None,
        }
    }
}
