//! Update-trust engine abstraction.
//!
//! The engine verifies and stores signed metadata from both the config
//! and director repositories; this crate only orchestrates on top of its
//! version/state queries and target-file retrieval. Version numbers are
//! non-decreasing across successful updates — the engine must reject a
//! regression as a rollback rather than apply it.

use std::collections::HashMap;

use remconf_protocol::LatestConfigsResponse;

#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    /// A response advertised an older metadata version. Potential
    /// rollback attack; state must not have been mutated.
    #[error("version rollback: {repository} root {advertised} < {current}")]
    Rollback {
        repository: &'static str,
        current: u64,
        advertised: u64,
    },

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("unknown target file: {0}")]
    UnknownTarget(String),

    #[error("store: {0}")]
    Store(String),
}

/// Current verified metadata versions across both repositories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TufVersions {
    pub config_root: u64,
    pub config_snapshot: u64,
    pub director_root: u64,
    pub director_targets: u64,
}

#[derive(Debug, Clone, Default)]
pub struct MetaState {
    pub version: u64,
    pub hash: String,
}

/// Diagnostic snapshot of the verified store.
#[derive(Debug, Clone, Default)]
pub struct TrustState {
    pub config_state: HashMap<String, MetaState>,
    pub director_state: HashMap<String, MetaState>,
    pub target_filenames: HashMap<String, String>,
}

/// A verified target-file entry: digests, length, and the raw director
/// custom blob carrying targeting predicates.
#[derive(Debug, Clone, Default)]
pub struct TargetMeta {
    /// algorithm -> raw digest bytes.
    pub hashes: HashMap<String, Vec<u8>>,
    pub length: u64,
    pub custom: Option<serde_json::Value>,
}

pub type TargetFiles = HashMap<String, TargetMeta>;

/// Verified-state store the orchestrator reads, and the sink it feeds
/// backend responses into. Calls are synchronous: the engine works
/// against a local store, never the network.
pub trait TrustEngine: Send + Sync {
    /// Verify and apply a backend response. On any failure the stored
    /// state must be left untouched.
    fn update(&self, response: &LatestConfigsResponse) -> Result<(), TrustError>;

    fn state(&self) -> Result<TrustState, TrustError>;

    fn tuf_version_state(&self) -> Result<TufVersions, TrustError>;

    /// Raw director root metadata for one specific version.
    fn director_root(&self, version: u64) -> Result<Vec<u8>, TrustError>;

    /// Verified director target-file set.
    fn targets(&self) -> Result<TargetFiles, TrustError>;

    fn target_file(&self, path: &str) -> Result<Vec<u8>, TrustError>;

    /// Raw current director targets metadata.
    fn targets_meta(&self) -> Result<Vec<u8>, TrustError>;

    /// Raw `custom` blob of the director targets metadata.
    fn targets_custom(&self) -> Result<Vec<u8>, TrustError>;

    fn stored_org_uuid(&self) -> Result<String, TrustError>;
}

/// Persistent cache backing the trust engine. The orchestrator closes
/// it during shutdown, strictly after the refresh loop has exited.
pub trait ConfigStore: Send + Sync {
    fn close(&self) -> Result<(), TrustError>;
}
