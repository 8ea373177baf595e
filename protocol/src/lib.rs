//! `remconf-protocol` — wire types for the remote configuration service.
//!
//! Defines the client-facing polling API (`ClientGetConfigsRequest` /
//! `ClientGetConfigsResponse`), the backend fetch API
//! (`LatestConfigsRequest` / `LatestConfigsResponse`), and the shared
//! metadata types both sides exchange. Pure data, no I/O; validation
//! lives in the service crate.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Client identity
// ─────────────────────────────────────────────────────────────────────────────

/// A downstream client polling for configuration.
///
/// Exactly one of `is_agent` / `is_tracer` / `is_updater` must be set,
/// with the matching role payload present and the others absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ClientState>,
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub is_agent: bool,
    #[serde(default)]
    pub is_tracer: bool,
    #[serde(default)]
    pub is_updater: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_agent: Option<ClientAgent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_tracer: Option<ClientTracer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_updater: Option<ClientUpdater>,
}

/// Last-reported update-protocol state of a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientState {
    /// Root metadata version the client currently trusts. Must be >= 1:
    /// every client ships with the base director root.
    pub root_version: u64,
    /// Targets metadata version the client last applied (0 = none).
    #[serde(default)]
    pub targets_version: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientAgent {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientTracer {
    /// Runtime identity of the traced process; must differ from
    /// the client id.
    pub runtime_id: String,
    pub language: String,
    #[serde(default)]
    pub tracer_version: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub env: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientUpdater {
    #[serde(default)]
    pub tags: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client polling API
// ─────────────────────────────────────────────────────────────────────────────

/// A digest of a target file the client already holds in its cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetFileMeta {
    pub path: String,
    pub length: u64,
    #[serde(default)]
    pub hashes: Vec<TargetFileHash>,
}

/// One named digest of a cached target file. `hash` is hex-encoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetFileHash {
    pub algorithm: String,
    pub hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientGetConfigsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<Client>,
    #[serde(default)]
    pub cached_target_files: Vec<TargetFileMeta>,
}

/// A target file delivered to a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub path: String,
    pub raw: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientGetConfigsResponse {
    /// Intermediate root metadata blobs (canonical JSON), ascending and
    /// gap-free from the client's trusted root version.
    #[serde(default)]
    pub roots: Vec<Vec<u8>>,
    /// Current director targets metadata (canonical JSON).
    #[serde(default)]
    pub targets: Vec<u8>,
    #[serde(default)]
    pub target_files: Vec<File>,
    /// Config pointers the director predicates matched for this client.
    #[serde(default)]
    pub client_configs: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// State query (diagnostics)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMetaState {
    pub version: u64,
    pub hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetStateConfigResponse {
    pub config_state: HashMap<String, FileMetaState>,
    pub director_state: HashMap<String, FileMetaState>,
    pub target_filenames: HashMap<String, String>,
    pub active_clients: Vec<Client>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend fetch API
// ─────────────────────────────────────────────────────────────────────────────

/// Outbound fetch request: tells the backend what we have, which
/// products to include, and who is currently polling us.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatestConfigsRequest {
    pub hostname: String,
    pub agent_version: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_agent_env: Option<String>,
    pub org_uuid: String,
    pub current_config_root_version: u64,
    pub current_config_snapshot_version: u64,
    pub current_director_root_version: u64,
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub new_products: Vec<String>,
    #[serde(default)]
    pub active_clients: Vec<Client>,
    /// Opaque state blob the backend handed us in targets custom,
    /// echoed back verbatim.
    #[serde(default)]
    pub backend_client_state: Vec<u8>,
    #[serde(default)]
    pub has_error: bool,
    #[serde(default)]
    pub error: String,
}

/// One versioned metadata blob from the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopMeta {
    pub version: u64,
    pub raw: Vec<u8>,
}

/// Backend fetch response, consumed opaquely by the trust engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatestConfigsResponse {
    #[serde(default)]
    pub config_roots: Vec<TopMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_targets: Option<TopMeta>,
    #[serde(default)]
    pub director_roots: Vec<TopMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director_targets: Option<TopMeta>,
    #[serde(default)]
    pub target_files: Vec<File>,
}

/// Org provisioning summary from the status probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgStatusResponse {
    pub enabled: bool,
    pub authorized: bool,
}
