//! Client for the external token endpoint that mints ephemeral credentials.

use secrecy::SecretString;
use serde::Deserialize;
use tracing::{debug, instrument};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("token response did not contain a credential")]
    MissingToken,
}

/// The shapes a token endpoint may answer with.
#[derive(Deserialize)]
#[serde(untagged)]
enum TokenResponse {
    /// `{ "token": "..." }` or a Gemini auth token object `{ "token": { "name": "..." } }`.
    Token { token: TokenValue },
    /// OpenAI client secrets: `{ "client_secret": { "value": "..." } }`.
    ClientSecret { client_secret: ClientSecret },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TokenValue {
    Plain(String),
    Named { name: String },
}

#[derive(Deserialize)]
struct ClientSecret {
    value: String,
}

/// Extracts the ephemeral credential from a token endpoint response body.
pub fn parse_token_response(body: serde_json::Value) -> Result<SecretString, TokenError> {
    let response = TokenResponse::deserialize(body).map_err(|_| TokenError::MissingToken)?;
    let token = match response {
        TokenResponse::Token {
            token: TokenValue::Plain(token),
        } => token,
        TokenResponse::Token {
            token: TokenValue::Named { name },
        } => name,
        TokenResponse::ClientSecret { client_secret } => client_secret.value,
    };
    if token.is_empty() {
        return Err(TokenError::MissingToken);
    }
    Ok(SecretString::from(token))
}

pub struct TokenClient {
    http: reqwest::Client,
    url: String,
}

impl TokenClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Requests a fresh credential. Called once per connection attempt.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn fetch(&self) -> Result<SecretString, TokenError> {
        let body: serde_json::Value = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let token = parse_token_response(body)?;
        debug!("Obtained ephemeral session token");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serde_json::json;

    #[test]
    fn test_plain_token() {
        let token = parse_token_response(json!({"token": "ek_abc"})).unwrap();
        assert_eq!(token.expose_secret(), "ek_abc");
    }

    #[test]
    fn test_named_gemini_token() {
        let token = parse_token_response(json!({
            "token": {"name": "auth_tokens/xyz", "expireTime": "2025-01-01T00:00:00Z"}
        }))
        .unwrap();
        assert_eq!(token.expose_secret(), "auth_tokens/xyz");
    }

    #[test]
    fn test_openai_client_secret() {
        let token = parse_token_response(json!({
            "id": "sess_1",
            "client_secret": {"value": "ek_secret", "expires_at": 1234}
        }))
        .unwrap();
        assert_eq!(token.expose_secret(), "ek_secret");
    }

    #[test]
    fn test_missing_or_empty_token() {
        assert!(matches!(
            parse_token_response(json!({"error": "nope"})),
            Err(TokenError::MissingToken)
        ));
        assert!(matches!(
            parse_token_response(json!({"token": ""})),
            Err(TokenError::MissingToken)
        ));
    }
}
