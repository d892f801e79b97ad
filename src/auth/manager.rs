use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::clock::{Clock, SystemClock};
use super::error::AuthError;
use super::exchange;
use super::transport::Transport;
use super::types::{CachedToken, Credential, TokenInfo, TokenSettings};

/// Token manager
/// Owns the credential, caches the resource token and runs the two-step
/// exchange when the cached token is missing or inside the safety margin.
pub struct TokenManager {
    /// Credential material, fixed for the process lifetime
    credential: Credential,

    /// Safety margin, assertion lifetime, dataspace
    settings: TokenSettings,

    /// HTTP transport for the identity and exchange requests
    transport: Arc<dyn Transport>,

    /// Time source for expiry checks
    clock: Arc<dyn Clock>,

    /// Current resource token, replaced wholesale on refresh
    cached: RwLock<Option<CachedToken>>,

    /// Held for the duration of an exchange so only one runs at a time
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(
        credential: Credential,
        settings: TokenSettings,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::with_clock(credential, settings, transport, Arc::new(SystemClock))
    }

    pub fn with_clock(
        credential: Credential,
        settings: TokenSettings,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            credential,
            settings,
            transport,
            clock,
            cached: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Get a `(token, base_url)` pair that is valid for immediate use
    ///
    /// Concurrent callers that find no valid token queue on the refresh
    /// lock; whoever gets it first runs the exchange and the rest pick up
    /// its result from the cache.
    pub async fn get_token(&self) -> Result<(String, String), AuthError> {
        if let Some(pair) = self.valid_cached().await {
            tracing::debug!("Using cached Data Cloud token");
            return Ok(pair);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock
        if let Some(pair) = self.valid_cached().await {
            tracing::debug!("Using Data Cloud token refreshed by a concurrent caller");
            return Ok(pair);
        }

        tracing::info!("No valid cached token, authenticating with platform...");
        let token = self.run_exchange().await?;
        let pair = (token.value.clone(), token.base_url.clone());

        *self.cached.write().await = Some(token);

        Ok(pair)
    }

    /// Drop the cached token so the next `get_token` re-authenticates
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
        tracing::info!("Cleared cached Data Cloud token");
    }

    /// Snapshot of the cache for diagnostics
    pub async fn token_info(&self) -> TokenInfo {
        let cached = self.cached.read().await;
        let now = self.clock.now();

        match *cached {
            Some(ref token) => TokenInfo {
                has_token: true,
                valid: token.is_valid_at(now, self.settings.safety_margin),
                base_url: Some(token.base_url.clone()),
                obtained_at: Some(token.obtained_at),
                expires_at: Some(token.expires_at),
            },
            None => TokenInfo {
                has_token: false,
                valid: false,
                base_url: None,
                obtained_at: None,
                expires_at: None,
            },
        }
    }

    async fn valid_cached(&self) -> Option<(String, String)> {
        let cached = self.cached.read().await;
        let now = self.clock.now();

        cached
            .as_ref()
            .filter(|token| token.is_valid_at(now, self.settings.safety_margin))
            .map(|token| (token.value.clone(), token.base_url.clone()))
    }

    async fn run_exchange(&self) -> Result<CachedToken, AuthError> {
        let platform = exchange::request_identity_token(
            self.transport.as_ref(),
            &self.credential,
            &self.settings,
            self.clock.now(),
        )
        .await?;

        exchange::exchange_for_resource_token(
            self.transport.as_ref(),
            &platform,
            &self.settings,
            self.clock.now(),
        )
        .await
    }
}
