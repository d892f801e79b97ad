// Authentication module
// Two-step platform token chain with a single-flight token cache

mod assertion;
mod clock;
mod credentials;
mod error;
mod exchange;
mod manager;
pub mod transport;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Clock, SystemClock};
pub use credentials::{load_credential, load_signing_key};
pub use error::{AuthError, AuthStage, ConfigError};
pub use manager::TokenManager;
pub use transport::{ReqwestTransport, Transport};
pub use types::{CachedToken, Credential, TokenInfo, TokenSettings};
