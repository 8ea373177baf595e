//! Request-shape validation for the client polling API.
//!
//! Validation failures surface synchronously to the caller as
//! structured errors and are never retried.

use remconf_protocol::{Client, ClientGetConfigsRequest};

use crate::data::{ConfigPathError, parse_config_path};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("client is a required field for client config update requests")]
    MissingClient,

    #[error("client.state is a required field for client config update requests")]
    MissingClientState,

    #[error("client.state.root_version must be >= 1 (clients must start with the base director root)")]
    InvalidRootVersion,

    #[error("client.id is a required field for client config update requests")]
    MissingClientId,

    #[error("client.is_agent, client.is_tracer, and client.is_updater are mutually exclusive")]
    ConflictingRoles,

    #[error("one of client.is_agent, client.is_tracer, client.is_updater must be set")]
    MissingRole,

    #[error("client.{payload} must be set if client.{flag} is true")]
    MissingRolePayload {
        flag: &'static str,
        payload: &'static str,
    },

    #[error("client.{payload} must not be set if client.{flag} is true")]
    ForbiddenRolePayload {
        flag: &'static str,
        payload: &'static str,
    },

    #[error("client.id must be different from client.client_tracer.runtime_id")]
    TracerRuntimeIdCollision,

    #[error("client.client_tracer.language is a required field for tracer client config update requests")]
    MissingTracerLanguage,

    #[error("cached_target_files[{index}].path is not a valid config path: {source}")]
    InvalidCachedPath {
        index: usize,
        source: ConfigPathError,
    },

    #[error("cached_target_files[{index}].length must be >= 1 (no empty file allowed)")]
    EmptyCachedFile { index: usize },

    #[error("cached_target_files[{index}].hashes is a required field for client config update requests")]
    MissingCachedHashes { index: usize },

    #[error("cached_target_files[{file_index}].hashes[{hash_index}].{field} is a required field for client config update requests")]
    EmptyCachedHashField {
        file_index: usize,
        hash_index: usize,
        field: &'static str,
    },
}

/// Validate the request shape, returning the embedded client on
/// success so callers need not re-unwrap it.
pub fn validate_request(
    request: &ClientGetConfigsRequest,
) -> Result<&Client, ValidationError> {
    let client = request.client.as_ref().ok_or(ValidationError::MissingClient)?;

    let state = client
        .state
        .as_ref()
        .ok_or(ValidationError::MissingClientState)?;
    if state.root_version == 0 {
        return Err(ValidationError::InvalidRootVersion);
    }
    if client.id.is_empty() {
        return Err(ValidationError::MissingClientId);
    }

    let roles = [client.is_agent, client.is_tracer, client.is_updater];
    match roles.iter().filter(|set| **set).count() {
        0 => return Err(ValidationError::MissingRole),
        1 => {}
        _ => return Err(ValidationError::ConflictingRoles),
    }

    if client.is_agent {
        if client.client_agent.is_none() {
            return Err(ValidationError::MissingRolePayload {
                flag: "is_agent",
                payload: "client_agent",
            });
        }
        if client.client_tracer.is_some() {
            return Err(ValidationError::ForbiddenRolePayload {
                flag: "is_agent",
                payload: "client_tracer",
            });
        }
        if client.client_updater.is_some() {
            return Err(ValidationError::ForbiddenRolePayload {
                flag: "is_agent",
                payload: "client_updater",
            });
        }
    }

    if client.is_tracer {
        let tracer = client.client_tracer.as_ref().ok_or(
            ValidationError::MissingRolePayload {
                flag: "is_tracer",
                payload: "client_tracer",
            },
        )?;
        if client.client_agent.is_some() {
            return Err(ValidationError::ForbiddenRolePayload {
                flag: "is_tracer",
                payload: "client_agent",
            });
        }
        if client.client_updater.is_some() {
            return Err(ValidationError::ForbiddenRolePayload {
                flag: "is_tracer",
                payload: "client_updater",
            });
        }
        if tracer.runtime_id == client.id {
            return Err(ValidationError::TracerRuntimeIdCollision);
        }
        if tracer.language.is_empty() {
            return Err(ValidationError::MissingTracerLanguage);
        }
    }

    if client.is_updater {
        if client.client_updater.is_none() {
            return Err(ValidationError::MissingRolePayload {
                flag: "is_updater",
                payload: "client_updater",
            });
        }
        if client.client_agent.is_some() {
            return Err(ValidationError::ForbiddenRolePayload {
                flag: "is_updater",
                payload: "client_agent",
            });
        }
        if client.client_tracer.is_some() {
            return Err(ValidationError::ForbiddenRolePayload {
                flag: "is_updater",
                payload: "client_tracer",
            });
        }
    }

    for (index, file) in request.cached_target_files.iter().enumerate() {
        parse_config_path(&file.path)
            .map_err(|source| ValidationError::InvalidCachedPath { index, source })?;
        if file.length == 0 {
            return Err(ValidationError::EmptyCachedFile { index });
        }
        if file.hashes.is_empty() {
            return Err(ValidationError::MissingCachedHashes { index });
        }
        for (hash_index, hash) in file.hashes.iter().enumerate() {
            if hash.algorithm.is_empty() {
                return Err(ValidationError::EmptyCachedHashField {
                    file_index: index,
                    hash_index,
                    field: "algorithm",
                });
            }
            if hash.hash.is_empty() {
                return Err(ValidationError::EmptyCachedHashField {
                    file_index: index,
                    hash_index,
                    field: "hash",
                });
            }
        }
    }

    Ok(client)
}
