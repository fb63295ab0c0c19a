//! Warehouse credentials.
//!
//! Two forms are accepted: a pre-issued OAuth bearer token (ambient
//! credentials), or a service-account key file whose path is resolved
//! against an allowed parent directory before it is read. Key material is
//! never logged; log lines carry only the resolved path.

use crate::error::WarehouseError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SCOPE: &str = "https://www.googleapis.com/auth/bigquery.readonly";
/// Issued tokens last an hour; refresh with some slack.
const TOKEN_SLACK: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub enum Credentials {
    /// An already-minted bearer token.
    Token(String),
    /// Path to a service-account JSON key file.
    ServiceAccount(PathBuf),
}

/// Resolves a service-account path against `parent`, rejecting traversal
/// outside it.
pub fn resolve_credentials_path(parent: &Path, path: &Path) -> Result<PathBuf, WarehouseError> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        parent.join(path)
    };
    let canonical = joined.canonicalize()?;
    let parent_canonical = parent.canonicalize()?;
    if !canonical.starts_with(&parent_canonical) {
        return Err(WarehouseError::UnsafeCredentialsPath {
            path: path.display().to_string(),
            parent: parent.display().to_string(),
        });
    }
    Ok(canonical)
}

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(serde::Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Issues and caches bearer tokens for warehouse requests.
#[derive(Debug)]
pub struct TokenProvider {
    credentials: Credentials,
    http: reqwest::Client,
    cached: Mutex<Option<(String, Instant)>>,
}

impl TokenProvider {
    pub fn new(credentials: Credentials, http: reqwest::Client) -> TokenProvider {
        TokenProvider {
            credentials,
            http,
            cached: Mutex::new(None),
        }
    }

    /// Returns a valid bearer token, minting one if necessary.
    pub async fn bearer(&self) -> Result<String, WarehouseError> {
        let path = match &self.credentials {
            Credentials::Token(token) => return Ok(token.clone()),
            Credentials::ServiceAccount(path) => path.clone(),
        };

        let mut cached = self.cached.lock().await;
        if let Some((token, expires)) = cached.as_ref() {
            if Instant::now() < *expires {
                return Ok(token.clone());
            }
        }

        tracing::debug!(path = %path.display(), "minting warehouse token from service account");
        let key: ServiceAccountKey = serde_json::from_slice(&tokio::fs::read(&path).await?)
            .map_err(|err| WarehouseError::InvalidCredentials {
                detail: err.to_string(),
            })?;
        let (token, ttl) = self.exchange(&key).await?;
        *cached = Some((token.clone(), Instant::now() + ttl - TOKEN_SLACK));
        Ok(token)
    }

    /// The JWT-bearer grant: sign an RS256 assertion with the key and trade
    /// it for an access token.
    async fn exchange(&self, key: &ServiceAccountKey) -> Result<(String, Duration), WarehouseError> {
        let token_uri = key.token_uri.as_deref().unwrap_or(TOKEN_URL);
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let claims = Claims {
            iss: &key.client_email,
            scope: SCOPE,
            aud: token_uri,
            iat: now,
            exp: now + 3600,
        };
        let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|err| WarehouseError::InvalidCredentials {
                detail: err.to_string(),
            })?;
        let assertion = jsonwebtoken::encode(
            &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256),
            &claims,
            &encoding_key,
        )
        .map_err(|err| WarehouseError::Auth {
            detail: err.to_string(),
        })?;

        let resp = self
            .http
            .post(token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(WarehouseError::Auth {
                detail: format!("token endpoint returned HTTP {}", resp.status()),
            });
        }
        let token: TokenResponse = resp.json().await?;
        let ttl = Duration::from_secs(token.expires_in.unwrap_or(3600));
        Ok((token.access_token, ttl))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn credentials_path_must_stay_under_parent() {
        let parent = tempfile::tempdir().unwrap();
        let inside = parent.path().join("key.json");
        std::fs::write(&inside, b"{}").unwrap();

        let resolved = resolve_credentials_path(parent.path(), Path::new("key.json")).unwrap();
        assert!(resolved.ends_with("key.json"));

        let outside = tempfile::tempdir().unwrap();
        let escape = outside.path().join("other.json");
        std::fs::write(&escape, b"{}").unwrap();
        assert!(matches!(
            resolve_credentials_path(parent.path(), &escape),
            Err(WarehouseError::UnsafeCredentialsPath { .. })
        ));

        assert!(matches!(
            resolve_credentials_path(parent.path(), Path::new("../escape.json")),
            Err(_)
        ));
    }
}
