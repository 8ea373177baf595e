//! `remconf-service` — core remote configuration distribution service.
//!
//! The [`service::ConfigService`] type fetches versioned configuration
//! bundles from the backend under a rollback-protected update protocol,
//! tracks which downstream clients (agents, tracers, updaters) are
//! actively polling, and serves each client only the configuration
//! artifacts targeted at it.
//!
//! Collaborators are abstracted behind traits so the orchestrator can be
//! driven with test doubles: the update-trust engine ([`uptane`]), the
//! backend API ([`api`]), and the telemetry sink ([`telemetry`]).

use std::time::Duration;

pub mod api;
pub mod backoff;
pub mod bypass;
pub mod clients;
pub mod data;
pub mod service;
pub mod targets;
pub mod telemetry;
pub mod uptane;
pub mod validation;

pub use service::{ConfigService, ServiceOptions};

/// Scheduled refresh cadence when the backend does not recommend one.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Floor for a locally configured refresh interval.
pub const MINIMAL_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// How long a client stays "active" after its last poll.
pub const DEFAULT_CLIENTS_TTL: Duration = Duration::from_secs(30);

/// Ceiling for a locally configured client TTL.
pub const MAX_CLIENTS_TTL: Duration = Duration::from_secs(60);

/// Upper bound on how long a never-seen client may block on the bypass
/// coordination before being served whatever state is current.
pub const NEW_CLIENT_BLOCK_TTL: Duration = Duration::from_secs(2);

/// Cache-bypass admissions allowed per rate-limit window.
pub const DEFAULT_CACHE_BYPASS_LIMIT: u32 = 5;
pub const MIN_CACHE_BYPASS_LIMIT: u32 = 1;
pub const MAX_CACHE_BYPASS_LIMIT: u32 = 10;

/// Fixed period of the org-status poller.
pub const ORG_STATUS_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Bounds on the maximum backoff time applied after repeated failures.
pub const MINIMAL_MAX_BACKOFF: Duration = Duration::from_secs(120);
pub const MAXIMAL_MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Repeated unauthorized/proxy fetch failures are logged at error level
/// this many times, then demoted to debug to avoid flooding when an org
/// is simply not provisioned for remote configuration.
pub const INITIAL_FETCH_ERROR_LOG: u64 = 5;
