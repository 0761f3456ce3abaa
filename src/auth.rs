use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, info};

use crate::error::FrameError;
use crate::settings::{OAuthToken, SettingsStore};

/// HTTP client that attaches the stored OAuth bearer token to every GET and
/// recovers from credential expiry with exactly one silent refresh + retry.
///
/// Non-auth failures (timeouts, DNS, 5xx) are never retried here; callers
/// decide whether to fall back or abort.
#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    settings: SettingsStore,
}

impl AuthClient {
    pub fn new(settings: SettingsStore) -> Result<Self, FrameError> {
        let timeout = Duration::from_secs(settings.config().http_timeout_seconds);
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, settings })
    }

    pub async fn get(
        &self,
        uri: &str,
        params: &[(&str, String)],
    ) -> Result<reqwest::Response, FrameError> {
        let token = self.settings.token().ok_or(FrameError::NotLinked)?;

        let first = self.send(uri, params, &token.access_token).await?;
        if !is_auth_failure(first.status()) {
            return Ok(first.error_for_status()?);
        }

        debug!(status = %first.status(), %uri, "credential rejected; refreshing token once");
        let refreshed = self.refresh(&token).await?;
        // Persist before use: a token that only exists in memory would be
        // lost on restart and the refresh token may have been rotated.
        self.settings.store_token(refreshed.clone()).await?;

        let retry = self.send(uri, params, &refreshed.access_token).await?;
        if is_auth_failure(retry.status()) {
            return Err(FrameError::Auth(format!(
                "request to {uri} rejected again after token refresh ({})",
                retry.status()
            )));
        }
        Ok(retry.error_for_status()?)
    }

    async fn send(
        &self,
        uri: &str,
        params: &[(&str, String)],
        access_token: &str,
    ) -> Result<reqwest::Response, FrameError> {
        let mut request = self.http.get(uri).bearer_auth(access_token);
        if !params.is_empty() {
            request = request.query(params);
        }
        Ok(request.send().await?)
    }

    async fn refresh(&self, current: &OAuthToken) -> Result<OAuthToken, FrameError> {
        let config = self.settings.config();
        let oauth = config
            .oauth
            .as_ref()
            .ok_or_else(|| FrameError::Auth("oauth client credentials are not configured".into()))?;
        let refresh_token = current
            .refresh_token
            .as_deref()
            .ok_or_else(|| FrameError::Auth("stored token has no refresh token".into()))?;

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.as_str()),
        ];
        let response = self
            .http
            .post(&oauth.token_uri)
            .form(&form)
            .send()
            .await
            .map_err(|err| FrameError::Auth(format!("token refresh failed: {err}")))?;
        if !response.status().is_success() {
            return Err(FrameError::Auth(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }
        let mut fresh: OAuthToken = response
            .json()
            .await
            .map_err(|err| FrameError::Auth(format!("malformed token response: {err}")))?;
        // Providers commonly omit the refresh token on renewal.
        if fresh.refresh_token.is_none() {
            fresh.refresh_token = current.refresh_token.clone();
        }
        info!("refreshed OAuth access token");
        Ok(fresh)
    }
}

fn is_auth_failure(status: StatusCode) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
}
