// Credential loading from a PEM signing key on disk

use jsonwebtoken::EncodingKey;
use std::path::Path;

use super::error::ConfigError;
use super::types::Credential;

/// Read an RSA private key (PKCS#1 or PKCS#8 PEM)
pub fn load_signing_key(path: &Path) -> Result<EncodingKey, ConfigError> {
    let pem = std::fs::read(path).map_err(|source| ConfigError::KeyRead {
        path: path.to_path_buf(),
        source,
    })?;

    let key = EncodingKey::from_rsa_pem(&pem)?;
    tracing::debug!("Signing key loaded: {}", path.display());
    Ok(key)
}

/// Build the process credential, failing on the first missing or bad field
pub fn load_credential(
    client_id: &str,
    username: &str,
    login_url: &str,
    private_key_path: &Path,
) -> Result<Credential, ConfigError> {
    if client_id.trim().is_empty() {
        return Err(ConfigError::MissingField("client_id"));
    }
    if username.trim().is_empty() {
        return Err(ConfigError::MissingField("username"));
    }

    let signing_key = load_signing_key(private_key_path)?;
    Credential::new(client_id, username, login_url, signing_key)
}
