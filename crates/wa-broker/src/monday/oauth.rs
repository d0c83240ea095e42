//! OAuth authorization-code flow against monday.com.

use reqwest::{Client, Url};
use tracing::{debug, info};

use super::boards::check_status;
use super::error::{MondayError, MondayResult};
use crate::session::OAuthTokens;
use crate::settings::MondayConfig;

/// Configured OAuth application.
#[derive(Clone)]
pub struct MondayOAuth {
    http: Client,
    client_id: String,
    client_secret: String,
    auth_url: String,
    redirect_uri: String,
}

impl MondayOAuth {
    /// Build from configuration. Fails when the client id or secret is missing.
    pub fn new(http: Client, config: &MondayConfig, redirect_uri: String) -> MondayResult<Self> {
        config.validate()?;
        let client_id = config.client_id.clone().unwrap_or_default();
        let client_secret = config.resolve_client_secret()?.unwrap_or_default();

        Ok(Self {
            http,
            client_id,
            client_secret,
            auth_url: config.auth_url.trim_end_matches('/').to_string(),
            redirect_uri,
        })
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Provider URL the browser is sent to, carrying `state`.
    pub fn authorize_url(&self, state: &str) -> MondayResult<Url> {
        let base = format!("{}/authorize", self.auth_url);
        Url::parse_with_params(
            &base,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| MondayError::InvalidUrl {
            url: base.clone(),
            message: e.to_string(),
        })
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> MondayResult<OAuthTokens> {
        let url = format!("{}/token", self.auth_url);
        debug!("Exchanging OAuth code at {}", url);

        let response = self
            .http
            .post(&url)
            .form(&[
                ("redirect_uri", self.redirect_uri.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
            ])
            .send()
            .await
            .map_err(|e| MondayError::ConnectionFailed {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let tokens: OAuthTokens = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| MondayError::ParseError(e.to_string()))?;
        info!(scope = ?tokens.scope, "OAuth code exchanged");
        Ok(tokens)
    }
}

impl std::fmt::Debug for MondayOAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MondayOAuth")
            .field("client_id", &self.client_id)
            .field("auth_url", &self.auth_url)
            .field("redirect_uri", &self.redirect_uri)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ConfigValidationError;

    fn configured() -> MondayConfig {
        MondayConfig {
            client_id: Some("client-123".to_string()),
            client_secret: Some("shh".to_string()),
            ..MondayConfig::default()
        }
    }

    #[test]
    fn test_authorize_url_carries_params() {
        let oauth = MondayOAuth::new(
            Client::new(),
            &configured(),
            "https://sunday.example.net/gosvc/oauth/callback".to_string(),
        )
        .unwrap();

        let url = oauth.authorize_url("st4te").unwrap();
        assert_eq!(url.path(), "/oauth2/authorize");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".to_string(), "client-123".to_string())));
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "https://sunday.example.net/gosvc/oauth/callback".to_string()
        )));
        assert!(pairs.contains(&("state".to_string(), "st4te".to_string())));
    }

    #[test]
    fn test_new_requires_credentials() {
        let err = MondayOAuth::new(Client::new(), &MondayConfig::default(), String::new())
            .unwrap_err();
        assert!(matches!(
            err,
            MondayError::NotConfigured(ConfigValidationError::MissingClientId)
        ));
    }
}
