//! Backend API abstraction.
//!
//! The production implementation lives in `remconf-backend-client`; the
//! orchestrator depends only on this trait so tests can substitute a
//! programmable double. Implementations must carry their own request
//! deadline — a stalled fetch would otherwise degrade every
//! bypass-dependent `client_get_configs` call to its worst-case bound.

use async_trait::async_trait;
use remconf_protocol::{LatestConfigsRequest, LatestConfigsResponse, OrgStatusResponse};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The API key is not authorized for remote configuration.
    #[error("unauthorized")]
    Unauthorized,

    /// An intermediate proxy rejected the request.
    #[error("proxy error")]
    Proxy,

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("transport: {0}")]
    Transport(String),

    #[error("invalid response body: {0}")]
    Decode(String),
}

impl BackendError {
    /// Failures that are expected when an org is simply not provisioned
    /// for the feature; their logs are throttled after a few
    /// occurrences.
    pub fn is_throttled_kind(&self) -> bool {
        matches!(self, BackendError::Unauthorized | BackendError::Proxy)
    }
}

#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn fetch(
        &self,
        request: LatestConfigsRequest,
    ) -> Result<LatestConfigsResponse, BackendError>;

    async fn fetch_org_status(&self) -> Result<OrgStatusResponse, BackendError>;
}
