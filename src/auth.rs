use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use hex::encode;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use url::Url;

pub fn str_to_hex_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("No authorization header")]
    MissingHeader,

    #[error("Unauthorized")]
    Unauthorized,
}

#[derive(Debug, thiserror::Error)]
pub enum VerifierSetupError {
    #[error("Invalid identity endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Error building the HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VerifiedUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Checks a caller's credential. Implementations only ever use restricted
/// credentials of their own; nothing here touches the catalog.
#[async_trait]
pub trait IdentityVerifier: Send + Sync + Debug {
    async fn verify(&self, token: &str) -> Result<VerifiedUser, AuthError>;
}

/// Pull the token out of an `Authorization` header value
pub fn token_from_header(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingHeader)?;
    let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();

    if token.is_empty() {
        Err(AuthError::Unauthorized)
    } else {
        Ok(token)
    }
}

/// Verifies user access tokens against a GoTrue-compatible auth API
/// (`GET <url>/auth/v1/user`), presenting the public anon key alongside the
/// caller's token.
#[derive(Debug)]
pub struct GoTrueVerifier {
    client: Client,
    user_url: Url,
    anon_key: String,
}

impl GoTrueVerifier {
    pub fn new(
        base_url: &str,
        anon_key: String,
        timeout: Duration,
    ) -> Result<Self, VerifierSetupError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            user_url: base.join("auth/v1/user")?,
            anon_key,
        })
    }
}

#[async_trait]
impl IdentityVerifier for GoTrueVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedUser, AuthError> {
        let response = self
            .client
            .get(self.user_url.clone())
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                warn!("Identity endpoint request failed: {e}");
                AuthError::Unauthorized
            })?;

        if !response.status().is_success() {
            debug!("Identity endpoint rejected credential: {}", response.status());
            return Err(AuthError::Unauthorized);
        }

        response.json::<VerifiedUser>().await.map_err(|e| {
            warn!("Unexpected identity endpoint response: {e}");
            AuthError::Unauthorized
        })
    }
}

/// Single shared secret, stored as its SHA-256 hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordVerifier {
    sha256_hash: String,
}

pub const PASSWORD_PRINCIPAL: &str = "operator";

impl PasswordVerifier {
    pub fn new(sha256_hash: String) -> Self {
        Self {
            sha256_hash: sha256_hash.to_lowercase(),
        }
    }

    pub fn with_password(password: &str) -> Self {
        Self::new(str_to_hex_hash(password))
    }
}

#[async_trait]
impl IdentityVerifier for PasswordVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedUser, AuthError> {
        if str_to_hex_hash(token) == self.sha256_hash {
            Ok(VerifiedUser {
                id: PASSWORD_PRINCIPAL.to_string(),
                email: None,
            })
        } else {
            Err(AuthError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const PASSWORD: &str = "write_password";

    #[test]
    fn test_str_to_hex_hash() {
        assert_eq!(
            str_to_hex_hash("password"),
            "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
        );
    }

    #[test]
    fn test_token_from_header() {
        assert_eq!(token_from_header(None), Err(AuthError::MissingHeader));
        assert_eq!(token_from_header(Some("Bearer abc")), Ok("abc"));
        assert_eq!(token_from_header(Some("abc")), Ok("abc"));
        assert_eq!(token_from_header(Some("Bearer ")), Err(AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn test_password_verifier() {
        let verifier = PasswordVerifier::with_password(PASSWORD);

        let user = verifier.verify(PASSWORD).await.unwrap();
        assert_eq!(user.id, PASSWORD_PRINCIPAL);

        assert_eq!(
            verifier.verify("read_password").await,
            Err(AuthError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn test_password_verifier_uppercase_hash() {
        let verifier = PasswordVerifier::new(str_to_hex_hash(PASSWORD).to_uppercase());
        assert!(verifier.verify(PASSWORD).await.is_ok());
    }

    async fn gotrue_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("apikey", "anon-key"))
            .and(header("authorization", "Bearer good-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "user-1", "email": "ops@example.com"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_gotrue_verifier_accepts_valid_token() {
        let server = gotrue_server().await;
        let verifier = GoTrueVerifier::new(
            &server.uri(),
            "anon-key".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();

        let user = verifier.verify("good-token").await.unwrap();
        assert_eq!(
            user,
            VerifiedUser {
                id: "user-1".to_string(),
                email: Some("ops@example.com".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_gotrue_verifier_rejects_invalid_token() {
        let server = gotrue_server().await;
        let verifier = GoTrueVerifier::new(
            &server.uri(),
            "anon-key".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(
            verifier.verify("stolen-token").await,
            Err(AuthError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn test_gotrue_verifier_unreachable() {
        // Nothing listens on port 9 (discard) in the test environment
        let verifier = GoTrueVerifier::new(
            "http://127.0.0.1:9",
            "anon-key".to_string(),
            Duration::from_secs(1),
        )
        .unwrap();

        assert_eq!(
            verifier.verify("good-token").await,
            Err(AuthError::Unauthorized)
        );
    }

    #[test]
    fn test_gotrue_url_join() {
        let verifier = GoTrueVerifier::new(
            "https://project.example.co/base",
            "anon-key".to_string(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            verifier.user_url.as_str(),
            "https://project.example.co/base/auth/v1/user"
        );

        assert!(matches!(
            GoTrueVerifier::new("not a url", "k".to_string(), Duration::from_secs(1)),
            Err(VerifierSetupError::Url(_))
        ));
    }
}
