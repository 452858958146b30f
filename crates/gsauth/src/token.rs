// TokenIssuer - per-application service tokens
//
// Exchanges a completed session for an app-scoped bearer token: prove
// session possession with an HMAC checksum, then decrypt the returned
// AEAD blob into a token record list.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use data_encoding::BASE64;

use grandslam_shared::auth::payload_crypto::{compute_app_checksum, decrypt_aead_payload};

use crate::anisette::AnisetteProvider;
use crate::auth_flow::{AuthSession, identity_token};
use crate::channel::AuthChannel;
use crate::error::AuthError;
use crate::protocol::{TokenList, require};
use crate::transport::Transport;

/// App identifier for the developer-tools client
pub const XCODE_APP_ID: &str = "com.apple.gs.xcode.auth";

/// A decrypted per-application token
#[derive(Debug, Clone)]
pub struct AppToken {
    pub service: String,
    pub token: String,
    pub auth_service_url: Option<String>,
    pub auth_service_key: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

impl AppToken {
    /// Header set a downstream service client attaches to its requests
    pub fn authorization_headers<P: AnisetteProvider>(
        &self,
        adsid: &str,
        anisette: &P,
    ) -> HashMap<String, String> {
        let mut headers = anisette.headers(true);
        headers.insert("X-Apple-Identity-Token".to_string(), self.token.clone());
        if let Some(service_key) = &self.auth_service_key {
            headers.insert("X-Apple-Authorization-Key".to_string(), service_key.clone());
        }
        headers.insert("X-Apple-DSID".to_string(), adsid.to_string());
        headers
    }
}

pub struct TokenIssuer<'a, P: AnisetteProvider, T: Transport> {
    channel: &'a AuthChannel<P, T>,
}

impl<'a, P: AnisetteProvider, T: Transport> TokenIssuer<'a, P, T> {
    pub fn new(channel: &'a AuthChannel<P, T>) -> Self {
        TokenIssuer { channel }
    }

    /// Request and decrypt a token for the given application identifier
    pub async fn fetch_app_token(
        &self,
        session: &AuthSession,
        app: &str,
    ) -> Result<AppToken, AuthError> {
        let payload = session.payload();

        let checksum = compute_app_checksum(&payload.session_key, &payload.adsid, app);
        let response = self
            .channel
            .request_app_tokens(
                app,
                &payload.cookie,
                BASE64.encode(&checksum),
                identity_token(payload),
                &payload.adsid,
            )
            .await?;

        let encrypted = require(response.et, "et")?;
        let blob = crate::protocol::decode_base64(&encrypted, "et")?;
        let plaintext = decrypt_aead_payload(&payload.session_key, &blob)?;

        let list: TokenList = serde_json::from_slice(&plaintext)
            .map_err(|e| AuthError::ProtocolViolation(format!("malformed token payload: {e}")))?;
        let records = require(list.t, "t")?;
        let record = records.into_iter().next().ok_or_else(|| {
            AuthError::ProtocolViolation("token response contained no records".into())
        })?;

        let token = record
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::ProtocolViolation("token record missing token".into()))?;

        let app_token = AppToken {
            service: record.token_type.unwrap_or_else(|| app.to_string()),
            token,
            auth_service_url: record.auth_service_url,
            auth_service_key: record.auth_service_key,
            expiry: record.expiry_time.and_then(|raw| parse_expiry(&raw)),
        };

        tracing::info!(
            "Issued '{}' token (expires {})",
            app_token.service,
            app_token
                .expiry
                .map(|e| e.to_rfc3339())
                .unwrap_or_else(|| "never".to_string())
        );
        Ok(app_token)
    }
}

/// Token expiry arrives as an RFC 3339 timestamp; an unparseable value
/// degrades to "no expiry known" rather than failing issuance.
fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anisette::{AnisetteData, StaticAnisette};

    #[test]
    fn test_parse_expiry() {
        let parsed = parse_expiry("2026-09-01T10:30:00Z").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-09-01T10:30:00+00:00");
        assert!(parse_expiry("next tuesday").is_none());
    }

    #[test]
    fn test_authorization_headers() {
        let token = AppToken {
            service: XCODE_APP_ID.to_string(),
            token: "bearer-value".to_string(),
            auth_service_url: None,
            auth_service_key: Some("service-key".to_string()),
            expiry: None,
        };
        let anisette = StaticAnisette::new(AnisetteData::default());
        let headers = token.authorization_headers("000123", &anisette);
        assert_eq!(headers["X-Apple-Identity-Token"], "bearer-value");
        assert_eq!(headers["X-Apple-Authorization-Key"], "service-key");
        assert_eq!(headers["X-Apple-DSID"], "000123");
    }
}
