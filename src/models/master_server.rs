//! Singleton-per-cluster locator record for the active master.
//!
//! Resolved immediately before each dispatch call and never cached across
//! calls: the active master may change between submissions on failover.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterServer {
    pub host: String,
    pub port: u16,
}

impl MasterServer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for MasterServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
