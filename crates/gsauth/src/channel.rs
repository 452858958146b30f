// AuthChannel - request/response plumbing for the identity service
//
// Owns the endpoint URLs and header sets, builds the two-level request
// envelope (merging the provider's `cpd` map into every body), unwraps
// the response envelope, and enforces the status-block contract: any
// non-zero `ec` anywhere becomes ServerRejected before a caller sees
// the response.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Value, from_slice};

use crate::anisette::AnisetteProvider;
use crate::error::AuthError;
use crate::protocol::*;
use crate::transport::Transport;

/// Production host for the identity service
pub const DEFAULT_BASE_URL: &str = "https://gsa.apple.com";

/// Service path under the base URL
const SERVICE_PATH: &str = "/grandslam/GsService2";
const USER_INFO_PATH: &str = "/grandslam/GsService2/fetchUserInfo";
const VALIDATE_PATH: &str = "/grandslam/GsService2/validate";
const TRUSTED_DEVICE_PATH: &str = "/auth/verify/trusteddevice";
const SMS_TRIGGER_PATH: &str = "/auth";
const SMS_CODE_PATH: &str = "/auth/verify/phone/securitycode";

const USER_AGENT: &str = "akd/1.0 CFNetwork/978.0.7 Darwin/18.7.0";

pub struct AuthChannel<P: AnisetteProvider, T: Transport> {
    anisette: P,
    transport: T,
    base_url: String,
}

impl<P: AnisetteProvider, T: Transport> AuthChannel<P, T> {
    pub fn new(anisette: P, transport: T) -> Self {
        Self::with_base_url(anisette, transport, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(anisette: P, transport: T, base_url: String) -> Self {
        AuthChannel {
            anisette,
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn anisette(&self) -> &P {
        &self.anisette
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Header set for service envelope requests
    fn base_headers(&self) -> HashMap<String, String> {
        let mut headers = self.anisette.headers(true);
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept".to_string(), "*/*".to_string());
        headers.insert("User-Agent".to_string(), USER_AGENT.to_string());
        headers.insert("Accept-Language".to_string(), "en-us".to_string());
        headers
    }

    /// Base headers plus the identity token for second-factor calls
    fn identity_headers(&self, identity_token: &str) -> HashMap<String, String> {
        let mut headers = self.base_headers();
        headers.insert(
            "X-Apple-Identity-Token".to_string(),
            identity_token.to_string(),
        );
        headers
    }

    /// POST an operation to the service endpoint and unwrap the
    /// response envelope, rejecting any non-zero status.
    async fn service_request<R: Serialize>(&self, request: R) -> Result<Value, AuthError> {
        let envelope = RequestEnvelope::new(request);
        let body = serde_json::to_vec(&envelope)
            .map_err(|e| AuthError::ProtocolViolation(format!("request encoding failed: {e}")))?;

        let raw = self
            .transport
            .post(&self.url(SERVICE_PATH), &self.base_headers(), body)
            .await?;

        let parsed: Value = from_slice(&raw)
            .map_err(|e| AuthError::ProtocolViolation(format!("malformed response body: {e}")))?;
        let response = parsed
            .get("Response")
            .cloned()
            .ok_or_else(|| AuthError::ProtocolViolation("missing Response envelope".into()))?;

        check_status(&response)?;
        Ok(response)
    }

    /// Phase 1: announce the public ephemeral, learn salt, iteration
    /// count, server ephemeral, and the session cookie.
    pub async fn init(&self, username: &str, a2k: String) -> Result<InitResponse, AuthError> {
        tracing::debug!("Sending init request for '{}'", username);
        let response = self
            .service_request(InitRequest {
                a2k,
                ps: vec![SCHEME_S2K, SCHEME_S2K_FO],
                u: username.to_string(),
                o: OP_INIT,
                cpd: self.anisette.client_provisioning(),
            })
            .await?;
        decode_response(response)
    }

    /// Phase 2: send the client proof, receive the server proof and the
    /// encrypted secure payload.
    pub async fn complete(
        &self,
        username: &str,
        cookie: &str,
        m1: String,
    ) -> Result<CompleteResponse, AuthError> {
        tracing::debug!("Sending completion request for '{}'", username);
        let response = self
            .service_request(CompleteRequest {
                c: cookie.to_string(),
                m1,
                u: username.to_string(),
                o: OP_COMPLETE,
                cpd: self.anisette.client_provisioning(),
            })
            .await?;
        decode_response(response)
    }

    /// Phase 3: exchange the session checksum for an encrypted app token
    pub async fn request_app_tokens(
        &self,
        app: &str,
        cookie: &str,
        checksum: String,
        identity_token: String,
        adsid: &str,
    ) -> Result<AppTokensResponse, AuthError> {
        tracing::debug!("Requesting app token for '{}'", app);
        let response = self
            .service_request(AppTokensRequest {
                app: vec![app.to_string()],
                c: cookie.to_string(),
                checksum,
                o: OP_APP_TOKENS,
                t: identity_token,
                u: adsid.to_string(),
                cpd: self.anisette.client_provisioning(),
            })
            .await?;
        decode_response(response)
    }

    /// Fetch account metadata for the signed-in device
    pub async fn fetch_user_info(&self) -> Result<Value, AuthError> {
        let raw = self
            .transport
            .get(&self.url(USER_INFO_PATH), &self.base_headers())
            .await?;
        let parsed: Value = from_slice(&raw)
            .map_err(|e| AuthError::ProtocolViolation(format!("malformed response body: {e}")))?;
        check_status(&parsed)?;
        Ok(parsed)
    }

    /// Ask the service to push an approval prompt to trusted devices
    pub async fn trigger_trusted_device(&self, identity_token: &str) -> Result<(), AuthError> {
        self.transport
            .get(
                &self.url(TRUSTED_DEVICE_PATH),
                &self.identity_headers(identity_token),
            )
            .await?;
        Ok(())
    }

    /// Submit a trusted-device code via the validate endpoint
    pub async fn submit_trusted_code(
        &self,
        identity_token: &str,
        code: &str,
    ) -> Result<(), AuthError> {
        let mut headers = self.identity_headers(identity_token);
        headers.insert("security-code".to_string(), code.to_string());

        let raw = self
            .transport
            .get(&self.url(VALIDATE_PATH), &headers)
            .await?;
        let parsed: Value = from_slice(&raw)
            .map_err(|e| AuthError::ProtocolViolation(format!("malformed response body: {e}")))?;
        check_status(&parsed)
    }

    /// Ask the service to text a code to the account's phone
    pub async fn trigger_sms(&self, identity_token: &str) -> Result<(), AuthError> {
        let mut headers = self.identity_headers(identity_token);
        headers.insert(
            "Accept".to_string(),
            "application/json, text/javascript, */*; q=0.01".to_string(),
        );
        self.transport
            .get(&self.url(SMS_TRIGGER_PATH), &headers)
            .await?;
        Ok(())
    }

    /// Submit an SMS code
    pub async fn submit_sms_code(&self, identity_token: &str, code: &str) -> Result<(), AuthError> {
        let body = serde_json::to_vec(&SmsCodeRequest::new(code))
            .map_err(|e| AuthError::ProtocolViolation(format!("request encoding failed: {e}")))?;

        let raw = self
            .transport
            .post(&self.url(SMS_CODE_PATH), &self.identity_headers(identity_token), body)
            .await?;

        // A 2xx with an empty or non-JSON body counts as acceptance;
        // a JSON body still gets its status block enforced.
        if raw.is_empty() {
            return Ok(());
        }
        match from_slice::<Value>(&raw) {
            Ok(parsed) => check_status(&parsed),
            Err(_) => Ok(()),
        }
    }
}

/// Decode a `Response` value into a typed response struct
fn decode_response<R: serde::de::DeserializeOwned>(response: Value) -> Result<R, AuthError> {
    serde_json::from_value(response)
        .map_err(|e| AuthError::ProtocolViolation(format!("malformed response fields: {e}")))
}

/// Enforce the status block. The block usually sits under `Status`,
/// but some endpoints return it at the top level.
pub fn check_status(response: &Value) -> Result<(), AuthError> {
    let status = response.get("Status").unwrap_or(response);
    let code = status.get("ec").and_then(Value::as_i64).unwrap_or(0);
    if code != 0 {
        let message = status
            .get("em")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string();
        tracing::warn!("Service rejected request: ec={} em='{}'", code, message);
        return Err(AuthError::ServerRejected { code, message });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_status_nested() {
        let response = json!({"Status": {"ec": 1, "em": "locked"}});
        match check_status(&response).unwrap_err() {
            AuthError::ServerRejected { code, message } => {
                assert_eq!(code, 1);
                assert_eq!(message, "locked");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_check_status_top_level() {
        let response = json!({"ec": -20101, "em": "bad credentials"});
        assert!(matches!(
            check_status(&response).unwrap_err(),
            AuthError::ServerRejected { code: -20101, .. }
        ));
    }

    #[test]
    fn test_check_status_zero_and_absent_pass() {
        assert!(check_status(&json!({"Status": {"ec": 0}})).is_ok());
        assert!(check_status(&json!({"sp": "s2k"})).is_ok());
    }

    #[test]
    fn test_check_status_missing_message() {
        match check_status(&json!({"ec": 9})).unwrap_err() {
            AuthError::ServerRejected { message, .. } => {
                assert_eq!(message, "Unknown error");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
