//! Config distribution orchestrator.
//!
//! Owns the client registry, product set, backoff state, and bypass
//! limiter under a single exclusion lock, runs the two background loops
//! (org-status poller and config refresh loop), and exposes the
//! client-facing `client_get_configs` / `config_get_state` operations.
//!
//! Lock discipline: the state lock is held only for brief synchronous
//! sections. The backend fetch is always issued with the lock released
//! so client polls are never serialized behind a slow round-trip.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use remconf_protocol::{
    ClientGetConfigsRequest, ClientGetConfigsResponse, File, FileMetaState,
    GetStateConfigResponse, LatestConfigsRequest, OrgStatusResponse,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::{BackendApi, BackendError};
use crate::backoff::ExpBackoffPolicy;
use crate::bypass::{BypassRateLimiter, BypassReceiver, BypassSender, bypass_channel};
use crate::clients::ClientRegistry;
use crate::targets::{
    TargetsError, canonical_json, director_root_deltas, filter_target_files,
    matched_client_configs,
};
use crate::telemetry::TelemetryReporter;
use crate::uptane::{ConfigStore, TrustEngine, TrustError, TufVersions};
use crate::validation::{ValidationError, validate_request};
use crate::{
    DEFAULT_CACHE_BYPASS_LIMIT, DEFAULT_CLIENTS_TTL, DEFAULT_REFRESH_INTERVAL,
    INITIAL_FETCH_ERROR_LOG, MAX_CACHE_BYPASS_LIMIT, MAX_CLIENTS_TTL, MAXIMAL_MAX_BACKOFF,
    MIN_CACHE_BYPASS_LIMIT, MINIMAL_MAX_BACKOFF, MINIMAL_REFRESH_INTERVAL, NEW_CLIENT_BLOCK_TTL,
    ORG_STATUS_POLL_INTERVAL,
};

// ─────────────────────────────────────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────────────────────────────────────

/// Service construction options. Out-of-range values are rejected back
/// to their defaults with a warning, never silently clamped to an
/// extreme.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Disambiguates multiple service instances in log output.
    pub rc_type: String,
    pub hostname: String,
    pub agent_version: String,
    pub tags: Vec<String>,
    pub trace_agent_env: Option<String>,

    refresh_interval: Duration,
    refresh_interval_override_allowed: bool,
    max_backoff: Duration,
    client_ttl: Duration,
    cache_bypass_limit: u32,
    new_client_block_ttl: Duration,
    org_status_poll_interval: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            rc_type: "remote-config".to_string(),
            hostname: String::new(),
            agent_version: String::new(),
            tags: Vec::new(),
            trace_agent_env: None,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            refresh_interval_override_allowed: true,
            max_backoff: MINIMAL_MAX_BACKOFF,
            client_ttl: DEFAULT_CLIENTS_TTL,
            cache_bypass_limit: DEFAULT_CACHE_BYPASS_LIMIT,
            new_client_block_ttl: NEW_CLIENT_BLOCK_TTL,
            org_status_poll_interval: ORG_STATUS_POLL_INTERVAL,
        }
    }
}

impl ServiceOptions {
    /// Pin the refresh interval locally. A pinned interval also opts
    /// out of backend interval recommendations.
    pub fn with_refresh_interval(mut self, interval: Duration, cfg_path: &str) -> Self {
        if interval < MINIMAL_REFRESH_INTERVAL {
            tracing::warn!(
                "{cfg_path} is set to {interval:?} which is below the minimum of \
                 {MINIMAL_REFRESH_INTERVAL:?} - using default refresh interval \
                 {DEFAULT_REFRESH_INTERVAL:?}"
            );
            self.refresh_interval = DEFAULT_REFRESH_INTERVAL;
            self.refresh_interval_override_allowed = true;
        } else {
            self.refresh_interval = interval;
            self.refresh_interval_override_allowed = false;
        }
        self
    }

    pub fn with_max_backoff(mut self, interval: Duration, cfg_path: &str) -> Self {
        if interval < MINIMAL_MAX_BACKOFF {
            tracing::warn!(
                "{cfg_path} is set to {interval:?} which is below the minimum of \
                 {MINIMAL_MAX_BACKOFF:?} - setting value to {MINIMAL_MAX_BACKOFF:?}"
            );
            self.max_backoff = MINIMAL_MAX_BACKOFF;
        } else if interval > MAXIMAL_MAX_BACKOFF {
            tracing::warn!(
                "{cfg_path} is set to {interval:?} which is above the maximum of \
                 {MAXIMAL_MAX_BACKOFF:?} - setting value to {MAXIMAL_MAX_BACKOFF:?}"
            );
            self.max_backoff = MAXIMAL_MAX_BACKOFF;
        } else {
            self.max_backoff = interval;
        }
        self
    }

    pub fn with_client_ttl(mut self, ttl: Duration, cfg_path: &str) -> Self {
        if !(MINIMAL_REFRESH_INTERVAL..=MAX_CLIENTS_TTL).contains(&ttl) {
            tracing::warn!(
                "{cfg_path} is not within accepted range \
                 ({MINIMAL_REFRESH_INTERVAL:?} - {MAX_CLIENTS_TTL:?}): {ttl:?}. \
                 Defaulting to {DEFAULT_CLIENTS_TTL:?}"
            );
            self.client_ttl = DEFAULT_CLIENTS_TTL;
        } else {
            self.client_ttl = ttl;
        }
        self
    }

    pub fn with_cache_bypass_limit(mut self, limit: u32, cfg_path: &str) -> Self {
        if !(MIN_CACHE_BYPASS_LIMIT..=MAX_CACHE_BYPASS_LIMIT).contains(&limit) {
            tracing::warn!(
                "{cfg_path} is not within accepted range \
                 ({MIN_CACHE_BYPASS_LIMIT} - {MAX_CACHE_BYPASS_LIMIT}): {limit}. \
                 Defaulting to {DEFAULT_CACHE_BYPASS_LIMIT}"
            );
            self.cache_bypass_limit = DEFAULT_CACHE_BYPASS_LIMIT;
        } else {
            self.cache_bypass_limit = limit;
        }
        self
    }

    /// Bound on how long a never-seen client may block on bypass
    /// coordination.
    pub fn with_new_client_block_ttl(mut self, ttl: Duration) -> Self {
        self.new_client_block_ttl = ttl;
        self
    }

    pub fn with_org_status_poll_interval(mut self, interval: Duration) -> Self {
        self.org_status_poll_interval = interval;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum GetConfigsError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Trust(#[from] TrustError),

    #[error(transparent)]
    Targets(#[from] TargetsError),
}

/// Why a refresh cycle failed. Transport and verification failures
/// drive backoff identically but stay distinguishable for diagnostics.
#[derive(Debug, thiserror::Error)]
enum RefreshError {
    #[error("api: {0}")]
    Api(#[from] BackendError),

    #[error("tuf: {0}")]
    Trust(#[from] TrustError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

struct MutableState {
    first_update: bool,
    default_refresh_interval: Duration,
    refresh_interval_override_allowed: bool,
    backoff: ExpBackoffPolicy,
    backoff_error_count: u32,
    /// Products already included in outbound fetch requests.
    products: HashSet<String>,
    /// Newly observed products, promoted to `products` only after a
    /// successful fetch cycle. Never demoted back.
    new_products: HashSet<String>,
    clients: ClientRegistry,
    bypass_limiter: BypassRateLimiter,
    last_update_err: Option<String>,
    fetch_error_count: u64,
    last_fetch_error: Option<String>,
    previous_org_status: Option<OrgStatusResponse>,
}

struct Shared {
    rc_type: String,
    hostname: String,
    agent_version: String,
    tags: Vec<String>,
    trace_agent_env: Option<String>,
    api: Arc<dyn BackendApi>,
    uptane: Arc<dyn TrustEngine>,
    telemetry: Arc<dyn TelemetryReporter>,
    new_client_block_ttl: Duration,
    org_status_poll_interval: Duration,
    state: Mutex<MutableState>,
}

impl Shared {
    fn state_guard(&self) -> MutexGuard<'_, MutableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The remote configuration distribution service.
pub struct ConfigService {
    shared: Arc<Shared>,
    store: Arc<dyn ConfigStore>,
    cancel: CancellationToken,
    bypass_tx: BypassSender,
    bypass_rx: Mutex<Option<BypassReceiver>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ConfigService {
    /// Construct the service with explicit collaborator references.
    /// State lives on the instance; there are no ambient globals.
    pub fn new(
        options: ServiceOptions,
        api: Arc<dyn BackendApi>,
        uptane: Arc<dyn TrustEngine>,
        store: Arc<dyn ConfigStore>,
        telemetry: Arc<dyn TelemetryReporter>,
    ) -> Self {
        let (bypass_tx, bypass_rx) = bypass_channel();
        let state = MutableState {
            first_update: true,
            default_refresh_interval: options.refresh_interval,
            refresh_interval_override_allowed: options.refresh_interval_override_allowed,
            backoff: ExpBackoffPolicy::new(options.max_backoff),
            backoff_error_count: 0,
            products: HashSet::new(),
            new_products: HashSet::new(),
            clients: ClientRegistry::new(options.client_ttl),
            bypass_limiter: BypassRateLimiter::new(
                options.cache_bypass_limit,
                options.refresh_interval,
            ),
            last_update_err: None,
            fetch_error_count: 0,
            last_fetch_error: None,
            previous_org_status: None,
        };
        Self {
            shared: Arc::new(Shared {
                rc_type: options.rc_type,
                hostname: options.hostname,
                agent_version: options.agent_version,
                tags: options.tags,
                trace_agent_env: options.trace_agent_env,
                api,
                uptane,
                telemetry,
                new_client_block_ttl: options.new_client_block_ttl,
                org_status_poll_interval: options.org_status_poll_interval,
                state: Mutex::new(state),
            }),
            store,
            cancel: CancellationToken::new(),
            bypass_tx,
            bypass_rx: Mutex::new(Some(bypass_rx)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the org-status poller and the config refresh loop.
    /// Idempotent: later calls are no-ops.
    pub fn start(&self) {
        let Some(mut bypass_rx) = self
            .bypass_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        let org_poller = tokio::spawn(async move {
            poll_org_status(&shared).await;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(shared.org_status_poll_interval) => {
                        poll_org_status(&shared).await;
                    }
                    _ = cancel.cancelled() => {
                        tracing::info!("[{}] stopping org status poller", shared.rc_type);
                        return;
                    }
                }
            }
        });

        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        let refresh_loop = tokio::spawn(async move {
            if let Err(err) = refresh(&shared).await {
                log_refresh_error(&shared, &err);
            }
            loop {
                let interval = {
                    let state = shared.state_guard();
                    state.default_refresh_interval
                        + state.backoff.backoff_duration(state.backoff_error_count)
                };
                let outcome = tokio::select! {
                    _ = tokio::time::sleep(interval) => Some(refresh(&shared).await),
                    request = bypass_rx.recv() => match request {
                        Some(responder) => {
                            let admitted = shared.state_guard().bypass_limiter.try_admit();
                            let outcome = if admitted {
                                Some(refresh(&shared).await)
                            } else {
                                shared.telemetry.inc_rate_limit();
                                None
                            };
                            // Waiters are released whether or not the
                            // refresh ran or succeeded.
                            let _ = responder.send(());
                            outcome
                        }
                        None => None,
                    },
                    _ = cancel.cancelled() => {
                        tracing::info!(
                            "[{}] stopping configuration refresh loop",
                            shared.rc_type
                        );
                        return;
                    }
                };
                if let Some(Err(err)) = outcome {
                    log_refresh_error(&shared, &err);
                }
            }
        });

        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([org_poller, refresh_loop]);
    }

    /// Signal shutdown, wait for both loops to exit, then close the
    /// persistent store. The ordering matters: the store must not be
    /// closed while the refresh loop could still touch it.
    pub async fn stop(&self) -> Result<(), TrustError> {
        self.cancel.cancel();
        let tasks = std::mem::take(
            &mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            let _ = task.await;
        }
        self.store.close()
    }

    /// The polling operation downstream clients call for their current
    /// configuration.
    pub async fn client_get_configs(
        &self,
        request: &ClientGetConfigsRequest,
    ) -> Result<ClientGetConfigsResponse, GetConfigsError> {
        let client = validate_request(request)?.clone();

        let is_active = self.shared.state_guard().clients.is_active(&client.id);
        if !is_active {
            // Force an out-of-band refresh so a brand-new client does
            // not wait a full cycle. Both waits are bounded: on
            // overload the client is served current (possibly stale)
            // state instead of an error.
            self.shared.state_guard().clients.seen(&client);
            self.bypass_refresh().await;
        }

        let mut state = self.shared.state_guard();
        state.clients.seen(&client);
        drop(state);

        let uptane = self.shared.uptane.as_ref();
        let versions = uptane.tuf_version_state()?;
        let client_state = client.state.clone().unwrap_or_default();
        if versions.director_targets == client_state.targets_version {
            return Ok(ClientGetConfigsResponse::default());
        }

        let roots =
            director_root_deltas(uptane, client_state.root_version, versions.director_root)?;
        let targets = canonical_json(&uptane.targets_meta()?)?;
        let target_files =
            filter_target_files(uptane, &client.products, &request.cached_target_files)?;
        let director_targets = uptane.targets()?;
        let client_configs = matched_client_configs(&client, &director_targets)?;

        // Predicates are authoritative: only deliver file contents the
        // director explicitly pointed at this client.
        let matched: HashSet<&String> = client_configs.iter().collect();
        let target_files: Vec<File> = target_files
            .into_iter()
            .filter(|file| matched.contains(&file.path))
            .collect();

        Ok(ClientGetConfigsResponse {
            roots,
            targets,
            target_files,
            client_configs,
        })
    }

    /// Read-only diagnostic snapshot of the verified store and the
    /// active client set.
    pub fn config_get_state(&self) -> Result<GetStateConfigResponse, TrustError> {
        let state = self.shared.uptane.state()?;
        let active_clients = self.shared.state_guard().clients.active_clients();

        Ok(GetStateConfigResponse {
            config_state: state
                .config_state
                .into_iter()
                .map(|(name, meta)| {
                    (
                        name,
                        FileMetaState {
                            version: meta.version,
                            hash: meta.hash,
                        },
                    )
                })
                .collect(),
            director_state: state
                .director_state
                .into_iter()
                .map(|(name, meta)| {
                    (
                        name,
                        FileMetaState {
                            version: meta.version,
                            hash: meta.hash,
                        },
                    )
                })
                .collect(),
            target_filenames: state.target_filenames,
            active_clients,
        })
    }

    /// Two-phase bounded wait on the refresh loop, per the bypass
    /// contract: the call never blocks longer than `new_client_block_ttl`
    /// regardless of refresh-loop health.
    async fn bypass_refresh(&self) {
        let started = tokio::time::Instant::now();
        let (done_tx, done_rx) = oneshot::channel();

        // Phase 1: hand the request to the refresh loop. Bounded in
        // case a previous bypass is still being processed.
        let accepted = tokio::time::timeout(
            self.shared.new_client_block_ttl,
            self.bypass_tx.send(done_tx),
        )
        .await;

        let remaining = self
            .shared
            .new_client_block_ttl
            .saturating_sub(started.elapsed());

        match accepted {
            Ok(Ok(())) => {
                // Phase 2: wait out the remainder for the loop to
                // signal completion of the cycle.
                if tokio::time::timeout(remaining, done_rx).await.is_err() {
                    self.shared.telemetry.inc_timeout();
                }
            }
            _ => {
                // The loop never accepted the request; give it the
                // remainder of the bound anyway, then serve what we
                // have.
                tokio::time::sleep(remaining).await;
                self.shared.telemetry.inc_timeout();
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Refresh cycle
// ─────────────────────────────────────────────────────────────────────────────

async fn refresh(shared: &Shared) -> Result<(), RefreshError> {
    let request = {
        let mut state = shared.state_guard();
        let active_clients = state.clients.active_clients();
        for client in &active_clients {
            for product in &client.products {
                if !state.products.contains(product) {
                    state.new_products.insert(product.clone());
                }
            }
        }

        let mut previous = match shared.uptane.tuf_version_state() {
            Ok(versions) => versions,
            Err(err) => {
                tracing::warn!(
                    "[{}] could not get previous metadata version state: {err}",
                    shared.rc_type
                );
                TufVersions::default()
            }
        };
        // The first refresh after startup always performs a full state
        // exchange: a corrupted or stale on-disk cache must not be able
        // to truncate the verification chain.
        if state.first_update {
            previous = TufVersions::default();
        }

        let backend_client_state = match backend_client_state(shared.uptane.as_ref()) {
            Ok(blob) => blob,
            Err(err) => {
                tracing::warn!(
                    "[{}] could not get previous backend client state: {err}",
                    shared.rc_type
                );
                Vec::new()
            }
        };
        let org_uuid = shared.uptane.stored_org_uuid()?;

        let mut products: Vec<String> = state.products.iter().cloned().collect();
        products.sort();
        let mut new_products: Vec<String> = state.new_products.iter().cloned().collect();
        new_products.sort();

        LatestConfigsRequest {
            hostname: shared.hostname.clone(),
            agent_version: shared.agent_version.clone(),
            tags: shared.tags.clone(),
            trace_agent_env: shared.trace_agent_env.clone(),
            org_uuid,
            current_config_root_version: previous.config_root,
            current_config_snapshot_version: previous.config_snapshot,
            current_director_root_version: previous.director_root,
            products,
            new_products,
            active_clients,
            backend_client_state,
            has_error: state.last_update_err.is_some(),
            error: state.last_update_err.clone().unwrap_or_default(),
        }
    };

    // The fetch runs without the state lock so client polls are never
    // blocked behind the backend round-trip.
    let result = shared.api.fetch(request).await;

    let mut state = shared.state_guard();
    state.last_update_err = None;
    let response = match result {
        Ok(response) => response,
        Err(err) => {
            state.backoff_error_count = state.backoff.inc_error(state.backoff_error_count);
            state.last_update_err = Some(format!("api: {err}"));

            let kind = err.to_string();
            if state.last_fetch_error.as_deref() != Some(kind.as_str()) {
                state.last_fetch_error = Some(kind);
                state.fetch_error_count = 0;
            }
            if err.is_throttled_kind() {
                if state.fetch_error_count < INITIAL_FETCH_ERROR_LOG {
                    state.fetch_error_count += 1;
                    return Err(err.into());
                }
                // Seen often enough that an unprovisioned org is the
                // likely explanation; stop flooding the error log.
                tracing::debug!(
                    "[{}] could not refresh remote configuration: {err}",
                    shared.rc_type
                );
                return Ok(());
            }
            return Err(err.into());
        }
    };
    state.fetch_error_count = 0;
    state.last_fetch_error = None;

    if let Err(err) = shared.uptane.update(&response) {
        state.backoff_error_count = state.backoff.inc_error(state.backoff_error_count);
        state.last_update_err = Some(format!("tuf: {err}"));
        return Err(err.into());
    }

    // Unless the operator pinned the interval, let the backend tune the
    // refresh cadence. Out-of-bound recommendations are ignored.
    if state.refresh_interval_override_allowed
        && let Some(interval) = server_refresh_interval(shared.uptane.as_ref())
        && state.default_refresh_interval != interval
    {
        state.default_refresh_interval = interval;
        state.bypass_limiter.set_window_duration(interval);
        tracing::info!(
            "[{}] overriding base refresh interval to {interval:?} due to backend recommendation",
            shared.rc_type
        );
    }

    state.first_update = false;
    let pending = std::mem::take(&mut state.new_products);
    state.products.extend(pending);
    state.backoff_error_count = state.backoff.dec_error(state.backoff_error_count);

    Ok(())
}

fn log_refresh_error(shared: &Shared, err: &RefreshError) {
    let provisioned = shared
        .state_guard()
        .previous_org_status
        .is_some_and(|status| status.enabled && status.authorized);
    if provisioned {
        tracing::error!(
            "[{}] could not refresh remote configuration: {err}",
            shared.rc_type
        );
    } else {
        tracing::debug!(
            "[{}] could not refresh remote configuration (org is disabled or key is not \
             authorized): {err}",
            shared.rc_type
        );
    }
}

async fn poll_org_status(shared: &Shared) {
    let status = match shared.api.fetch_org_status().await {
        Ok(status) => status,
        Err(err) => {
            // Unauthorized and proxy failures are reported (and
            // throttled) by the refresh loop; repeating them here would
            // only flood the log.
            if !err.is_throttled_kind() {
                tracing::error!(
                    "[{}] could not fetch org status: {err}",
                    shared.rc_type
                );
            }
            return;
        }
    };

    let mut state = shared.state_guard();
    if state.previous_org_status != Some(status) {
        let message = match (status.enabled, status.authorized) {
            (true, true) => "remote configuration is enabled for this organization and agent",
            (true, false) => {
                "remote configuration is enabled for this organization but disabled for this \
                 agent; add the remote configuration read permission to its API key to enable it"
            }
            (false, true) => "remote configuration is disabled for this organization",
            (false, false) => "remote configuration is disabled for this organization and agent",
        };
        tracing::info!("[{}] {message}", shared.rc_type);
    }
    state.previous_org_status = Some(status);
}

// ─────────────────────────────────────────────────────────────────────────────
// Targets custom metadata
// ─────────────────────────────────────────────────────────────────────────────

/// Backend-controlled fields in the director targets custom blob.
#[derive(Debug, Default, Deserialize)]
struct TargetsCustom {
    #[serde(default)]
    opaque_backend_state: Option<String>,
    /// Recommended refresh cadence in seconds.
    #[serde(default)]
    agent_refresh_interval: Option<u64>,
}

fn parse_targets_custom(raw: &[u8]) -> Result<TargetsCustom, serde_json::Error> {
    if raw.is_empty() {
        return Ok(TargetsCustom::default());
    }
    serde_json::from_slice(raw)
}

/// Opaque state blob echoed back to the backend in fetch requests.
fn backend_client_state(uptane: &dyn TrustEngine) -> Result<Vec<u8>, TrustError> {
    let raw = uptane.targets_custom()?;
    let custom =
        parse_targets_custom(&raw).map_err(|err| TrustError::Verification(err.to_string()))?;
    Ok(custom
        .opaque_backend_state
        .map(String::into_bytes)
        .unwrap_or_default())
}

/// Refresh interval recommended by the backend, if present and sane.
/// Only values in [1s, 1m] are honored.
fn server_refresh_interval(uptane: &dyn TrustEngine) -> Option<Duration> {
    let raw = uptane.targets_custom().ok()?;
    let custom = parse_targets_custom(&raw).ok()?;
    let secs = custom.agent_refresh_interval?;
    if !(1..=60).contains(&secs) {
        return None;
    }
    Some(Duration::from_secs(secs))
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache key
// ─────────────────────────────────────────────────────────────────────────────

/// Derive the store's cache key from the API key and the embedded
/// initial root. Tying the key to the root keeps a store created
/// against development roots from being reused against production ones.
pub fn generate_cache_key(api_key: &str, embedded_root: Option<&[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    if let Some(root) = embedded_root {
        hasher.update(root);
    }
    format!("{}/", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn refresh_interval_below_minimum_falls_back_to_default() {
        let options = ServiceOptions::default()
            .with_refresh_interval(Duration::from_secs(1), "remote_configuration.refresh_interval");
        assert_eq!(options.refresh_interval, DEFAULT_REFRESH_INTERVAL);
        assert!(options.refresh_interval_override_allowed);
    }

    #[test]
    fn valid_refresh_interval_pins_the_cadence() {
        let options = ServiceOptions::default()
            .with_refresh_interval(Duration::from_secs(10), "remote_configuration.refresh_interval");
        assert_eq!(options.refresh_interval, Duration::from_secs(10));
        assert!(!options.refresh_interval_override_allowed);
    }

    #[test]
    fn max_backoff_is_bounded_both_ways() {
        let low = ServiceOptions::default()
            .with_max_backoff(Duration::from_secs(10), "remote_configuration.max_backoff_interval");
        assert_eq!(low.max_backoff, MINIMAL_MAX_BACKOFF);

        let high = ServiceOptions::default()
            .with_max_backoff(Duration::from_secs(900), "remote_configuration.max_backoff_interval");
        assert_eq!(high.max_backoff, MAXIMAL_MAX_BACKOFF);

        let ok = ServiceOptions::default()
            .with_max_backoff(Duration::from_secs(180), "remote_configuration.max_backoff_interval");
        assert_eq!(ok.max_backoff, Duration::from_secs(180));
    }

    #[test]
    fn client_ttl_out_of_range_falls_back_to_default() {
        let options = ServiceOptions::default()
            .with_client_ttl(Duration::from_secs(600), "remote_configuration.clients.ttl_seconds");
        assert_eq!(options.client_ttl, DEFAULT_CLIENTS_TTL);
    }

    #[test]
    fn cache_bypass_limit_out_of_range_falls_back_to_default() {
        let options = ServiceOptions::default()
            .with_cache_bypass_limit(50, "remote_configuration.clients.cache_bypass_limit");
        assert_eq!(options.cache_bypass_limit, DEFAULT_CACHE_BYPASS_LIMIT);

        let options = ServiceOptions::default()
            .with_cache_bypass_limit(2, "remote_configuration.clients.cache_bypass_limit");
        assert_eq!(options.cache_bypass_limit, 2);
    }

    #[test]
    fn targets_custom_parses_known_fields() {
        let raw = br#"{"opaque_backend_state":"abc","agent_refresh_interval":42}"#;
        let custom = parse_targets_custom(raw).unwrap();
        assert_eq!(custom.opaque_backend_state.as_deref(), Some("abc"));
        assert_eq!(custom.agent_refresh_interval, Some(42));
    }

    #[test]
    fn empty_targets_custom_is_default() {
        let custom = parse_targets_custom(b"").unwrap();
        assert!(custom.opaque_backend_state.is_none());
        assert!(custom.agent_refresh_interval.is_none());
    }

    #[test]
    fn cache_key_depends_on_api_key_and_root() {
        let plain = generate_cache_key("key-a", None);
        let with_root = generate_cache_key("key-a", Some(b"root"));
        let other_key = generate_cache_key("key-b", Some(b"root"));
        assert_ne!(plain, with_root);
        assert_ne!(with_root, other_key);
        assert!(plain.ends_with('/'));
    }
}
