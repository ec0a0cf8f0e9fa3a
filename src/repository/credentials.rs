//! Credential providers
//!
//! Bearer tokens are injected into the HTTP repository through
//! `CredentialProvider` instead of living in global state. On a 401 the
//! repository asks the provider for a fresh token once.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::error::{RepositoryError, RepositoryResult};
use super::wire::{error_detail, RefreshRequest, RefreshResponse};

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current access token, if any
    async fn access_token(&self) -> Option<String>;

    /// Obtain a new access token after a 401.
    ///
    /// `Ok(None)` means this provider cannot refresh; the original 401 stands.
    async fn refresh(&self) -> RepositoryResult<Option<String>>;
}

/// Fixed token (or none), never refreshed
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn access_token(&self) -> Option<String> {
        self.0.clone()
    }

    async fn refresh(&self) -> RepositoryResult<Option<String>> {
        Ok(None)
    }
}

#[derive(Debug)]
struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
}

/// Access/refresh token pair backed by the `/auth/refresh/` endpoint.
///
/// A failed refresh clears both tokens; later requests go out unauthenticated
/// until new credentials are configured.
pub struct RefreshingCredentials {
    client: reqwest::Client,
    refresh_url: String,
    tokens: Mutex<Tokens>,
}

impl RefreshingCredentials {
    pub fn new(api_base_url: &str, access: Option<String>, refresh: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_base_url, access, refresh)
    }

    pub fn with_client(
        client: reqwest::Client,
        api_base_url: &str,
        access: Option<String>,
        refresh: impl Into<String>,
    ) -> Self {
        Self {
            client,
            refresh_url: format!("{}/auth/refresh/", api_base_url.trim_end_matches('/')),
            tokens: Mutex::new(Tokens {
                access,
                refresh: Some(refresh.into()),
            }),
        }
    }
}

#[async_trait]
impl CredentialProvider for RefreshingCredentials {
    async fn access_token(&self) -> Option<String> {
        self.tokens.lock().await.access.clone()
    }

    async fn refresh(&self) -> RepositoryResult<Option<String>> {
        let mut tokens = self.tokens.lock().await;
        let refresh = tokens
            .refresh
            .clone()
            .ok_or_else(|| RepositoryError::Auth("no refresh token available".to_string()))?;

        let response = self
            .client
            .post(&self.refresh_url)
            .json(&RefreshRequest { refresh: &refresh })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tokens.access = None;
            tokens.refresh = None;
            log::error!("Token refresh failed ({}), credentials cleared", status);
            return Err(RepositoryError::Auth(error_detail(status, &body)));
        }

        let RefreshResponse { access } = response.json().await?;
        tokens.access = Some(access.clone());
        log::info!("Access token refreshed");
        Ok(Some(access))
    }
}
