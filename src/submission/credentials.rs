use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;

use crate::error::AuthenticationError;

/// Short-lived bearer token for the remote store.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn authenticate(&self) -> Result<BearerToken, AuthenticationError>;
}

/// OAuth client-credentials grant against a token endpoint.
#[derive(Clone)]
pub struct ClientCredentialsProvider {
    client: reqwest::Client,
    token_url: url::Url,
    basic_credential: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

impl ClientCredentialsProvider {
    /// `basic_credential` is the already-encoded `client:secret` pair.
    pub fn new(token_url: url::Url, basic_credential: impl Into<String>) -> Result<Self, AuthenticationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            token_url,
            basic_credential: basic_credential.into(),
        })
    }

    pub fn from_client_secret(
        token_url: url::Url,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Self, AuthenticationError> {
        Self::new(token_url, STANDARD.encode(format!("{client_id}:{client_secret}")))
    }
}

#[async_trait]
impl CredentialProvider for ClientCredentialsProvider {
    async fn authenticate(&self) -> Result<BearerToken, AuthenticationError> {
        let response = self
            .client
            .post(self.token_url.clone())
            .header(reqwest::header::AUTHORIZATION, format!("Basic {}", self.basic_credential))
            .query(&[("grant_type", "client_credentials")])
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                target: "submission.auth",
                token_url = %self.token_url,
                status = status.as_u16(),
                "token request rejected"
            );
            return Err(AuthenticationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse = response.json().await?;
        let token = parsed
            .access_token
            .filter(|token| !token.trim().is_empty())
            .ok_or(AuthenticationError::MissingToken)?;
        tracing::debug!(target: "submission.auth", token_url = %self.token_url, "obtained access token");
        Ok(BearerToken::new(token))
    }
}
