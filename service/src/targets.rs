//! Filtering / target-diff engine.
//!
//! Given the verified target set and one client's declared state, this
//! module computes the minimal response: target files the client is
//! subscribed to and does not already hold (content-addressed diff, not
//! timestamp-based), intersected with the director predicates that
//! authoritatively target this client, plus the gap-free chain of root
//! metadata versions it is missing.

use std::collections::{BTreeMap, HashMap};

use remconf_protocol::{Client, File, TargetFileMeta};
use serde::Deserialize;

use crate::data::{ConfigPathError, parse_config_path};
use crate::uptane::{TargetFiles, TargetMeta, TrustEngine, TrustError};

#[derive(Debug, thiserror::Error)]
pub enum TargetsError {
    #[error(transparent)]
    Path(#[from] ConfigPathError),

    #[error("cached target file {path}: invalid {algorithm} digest")]
    InvalidDigest { path: String, algorithm: String },

    #[error("target {path}: malformed predicates: {reason}")]
    MalformedPredicates { path: String, reason: String },

    #[error("metadata is not valid JSON: {0}")]
    Canonical(String),

    #[error(transparent)]
    Trust(#[from] TrustError),
}

/// Re-encode a metadata blob deterministically (sorted object keys).
/// Semantically equal JSON always yields identical bytes.
pub fn canonical_json(raw: &[u8]) -> Result<Vec<u8>, TargetsError> {
    let value: serde_json::Value =
        serde_json::from_slice(raw).map_err(|e| TargetsError::Canonical(e.to_string()))?;
    serde_json::to_vec(&value).map_err(|e| TargetsError::Canonical(e.to_string()))
}

/// Every intermediate director root in `(current, new]`, ascending, so
/// the client can verify the signing chain without gaps.
pub fn director_root_deltas(
    engine: &dyn TrustEngine,
    current_version: u64,
    new_version: u64,
) -> Result<Vec<Vec<u8>>, TargetsError> {
    let mut roots = Vec::new();
    for version in current_version + 1..=new_version {
        let root = engine.director_root(version)?;
        roots.push(canonical_json(&root)?);
    }
    Ok(roots)
}

struct CachedDigest {
    length: u64,
    hashes: HashMap<String, Vec<u8>>,
}

fn decode_cached(cached: &[TargetFileMeta]) -> Result<HashMap<String, CachedDigest>, TargetsError> {
    let mut map = HashMap::new();
    for file in cached {
        let mut hashes = HashMap::new();
        for hash in &file.hashes {
            let raw = hex::decode(&hash.hash).map_err(|_| TargetsError::InvalidDigest {
                path: file.path.clone(),
                algorithm: hash.algorithm.clone(),
            })?;
            hashes.insert(hash.algorithm.clone(), raw);
        }
        map.insert(
            file.path.clone(),
            CachedDigest {
                length: file.length,
                hashes,
            },
        );
    }
    Ok(map)
}

/// Exact content match: same length and every server digest present and
/// equal in the cached entry. Resistant to clock skew by construction.
fn cached_matches(cached: Option<&CachedDigest>, meta: &TargetMeta) -> bool {
    let Some(cached) = cached else {
        return false;
    };
    if cached.length != meta.length || meta.hashes.is_empty() {
        return false;
    }
    meta.hashes
        .iter()
        .all(|(algorithm, digest)| cached.hashes.get(algorithm) == Some(digest))
}

/// Target files whose path encodes a subscribed product and whose
/// content differs from what the client reports as cached.
pub fn filter_target_files(
    engine: &dyn TrustEngine,
    products: &[String],
    cached_target_files: &[TargetFileMeta],
) -> Result<Vec<File>, TargetsError> {
    let cached = decode_cached(cached_target_files)?;
    // Sorted iteration keeps responses deterministic.
    let targets: BTreeMap<String, TargetMeta> = engine.targets()?.into_iter().collect();

    let mut files = Vec::new();
    for (path, meta) in &targets {
        let path_meta = parse_config_path(path)?;
        if !products.contains(&path_meta.product) {
            continue;
        }
        if cached_matches(cached.get(path), meta) {
            continue;
        }
        let raw = engine.target_file(path)?;
        files.push(File {
            path: path.clone(),
            raw,
        });
    }
    Ok(files)
}

/// One director targeting rule. All present conditions must hold for
/// the rule to match a client; a rule with no conditions matches every
/// client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigPredicate {
    #[serde(default)]
    pub client_id: Option<String>,
    /// "agent", "tracer", or "updater".
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    /// Every listed tag must be carried by the client.
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TargetCustom {
    #[serde(default)]
    predicates: Option<Vec<ConfigPredicate>>,
}

fn client_tags(client: &Client) -> Vec<&str> {
    let tags = if let Some(agent) = &client.client_agent {
        &agent.tags
    } else if let Some(tracer) = &client.client_tracer {
        &tracer.tags
    } else if let Some(updater) = &client.client_updater {
        &updater.tags
    } else {
        return Vec::new();
    };
    tags.iter().map(String::as_str).collect()
}

fn predicate_matches(predicate: &ConfigPredicate, client: &Client) -> bool {
    if let Some(id) = &predicate.client_id
        && id != &client.id
    {
        return false;
    }
    if let Some(role) = &predicate.role {
        let holds = match role.as_str() {
            "agent" => client.is_agent,
            "tracer" => client.is_tracer,
            "updater" => client.is_updater,
            _ => false,
        };
        if !holds {
            return false;
        }
    }
    if let Some(product) = &predicate.product
        && !client.products.contains(product)
    {
        return false;
    }
    let tags = client_tags(client);
    predicate.tags.iter().all(|tag| tags.contains(&tag.as_str()))
}

/// Config pointers the director explicitly targets at this client.
/// Predicates are the authoritative targeting mechanism: a target
/// carrying predicates none of which match is excluded. A target with
/// no predicate list declares no targeting restrictions.
pub fn matched_client_configs(
    client: &Client,
    targets: &TargetFiles,
) -> Result<Vec<String>, TargetsError> {
    let sorted: BTreeMap<&String, &TargetMeta> = targets.iter().collect();
    let mut matched = Vec::new();
    for (path, meta) in sorted {
        let predicates = match &meta.custom {
            None => None,
            Some(custom) => {
                let parsed: TargetCustom = serde_json::from_value(custom.clone()).map_err(|e| {
                    TargetsError::MalformedPredicates {
                        path: path.clone(),
                        reason: e.to_string(),
                    }
                })?;
                parsed.predicates
            }
        };
        let matches = match predicates {
            None => true,
            Some(predicates) => predicates
                .iter()
                .any(|predicate| predicate_matches(predicate, client)),
        };
        if matches {
            matched.push(path.clone());
        }
    }
    Ok(matched)
}
