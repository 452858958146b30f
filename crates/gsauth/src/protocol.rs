// Protocol - typed request/response envelopes for the identity service
//
// Every service call wraps its operation fields in the same two-level
// envelope: {"Header": {"Version": ...}, "Request": {...}} out,
// {"Response": {...}} back. Responses are decoded into structs with
// optional fields: unknown fields are ignored, and required fields are
// enforced afterwards so a missing one maps to ProtocolViolation
// rather than a deserializer error.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use zeroize::Zeroizing;

use crate::error::AuthError;

/// Version tag sent in every request envelope header
pub const ENVELOPE_VERSION: &str = "1.0.1";

/// Operation tags
pub const OP_INIT: &str = "init";
pub const OP_COMPLETE: &str = "complete";
pub const OP_APP_TOKENS: &str = "apptokens";

/// Password schemes offered during init; only s2k is implemented
pub const SCHEME_S2K: &str = "s2k";
pub const SCHEME_S2K_FO: &str = "s2k_fo";

/// Auth-type indicators in the completion status block
pub const AUTH_TYPE_TRUSTED_DEVICE: &str = "trustedDeviceSecondaryAuth";
pub const AUTH_TYPE_SECONDARY: &str = "secondaryAuth";

#[derive(Debug, Serialize)]
pub struct EnvelopeHeader {
    #[serde(rename = "Version")]
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RequestEnvelope<T: Serialize> {
    #[serde(rename = "Header")]
    pub header: EnvelopeHeader,
    #[serde(rename = "Request")]
    pub request: T,
}

impl<T: Serialize> RequestEnvelope<T> {
    pub fn new(request: T) -> Self {
        RequestEnvelope {
            header: EnvelopeHeader {
                version: ENVELOPE_VERSION,
            },
            request,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InitRequest {
    #[serde(rename = "A2k")]
    pub a2k: String,
    pub ps: Vec<&'static str>,
    pub u: String,
    pub o: &'static str,
    pub cpd: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct CompleteRequest {
    pub c: String,
    #[serde(rename = "M1")]
    pub m1: String,
    pub u: String,
    pub o: &'static str,
    pub cpd: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct AppTokensRequest {
    pub app: Vec<String>,
    pub c: String,
    pub checksum: String,
    pub o: &'static str,
    pub t: String,
    pub u: String,
    pub cpd: Map<String, Value>,
}

/// Body of the SMS code verification POST
#[derive(Debug, Serialize)]
pub struct SmsCodeRequest {
    #[serde(rename = "phoneNumber")]
    pub phone_number: PhoneNumberRef,
    #[serde(rename = "securityCode")]
    pub security_code: SecurityCode,
    pub mode: &'static str,
}

#[derive(Debug, Serialize)]
pub struct PhoneNumberRef {
    pub id: u32,
}

#[derive(Debug, Serialize)]
pub struct SecurityCode {
    pub code: String,
}

impl SmsCodeRequest {
    pub fn new(code: &str) -> Self {
        SmsCodeRequest {
            phone_number: PhoneNumberRef { id: 1 },
            security_code: SecurityCode { code: code.to_string() },
            mode: "sms",
        }
    }
}

/// Status block: error code, message, and the completion auth-type
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusBlock {
    pub ec: Option<i64>,
    pub em: Option<String>,
    pub au: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InitResponse {
    pub sp: Option<String>,
    pub s: Option<String>,
    pub i: Option<u32>,
    #[serde(rename = "B")]
    pub b: Option<String>,
    pub c: Option<String>,
    #[serde(rename = "Status")]
    pub status: Option<StatusBlock>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteResponse {
    #[serde(rename = "M2")]
    pub m2: Option<String>,
    pub spd: Option<String>,
    #[serde(rename = "Status")]
    pub status: Option<StatusBlock>,
}

#[derive(Debug, Deserialize)]
pub struct AppTokensResponse {
    pub et: Option<String>,
    #[serde(rename = "Status")]
    pub status: Option<StatusBlock>,
}

/// Fields decrypted out of the completion payload. `sk` is the opaque
/// session key later used for token checksums and token decryption;
/// it is wiped when the payload is dropped.
#[derive(Debug)]
pub struct SecurePayload {
    pub adsid: String,
    pub gs_idms_token: String,
    pub session_key: Zeroizing<Vec<u8>>,
    pub cookie: String,
}

#[derive(Deserialize)]
struct SecurePayloadWire {
    adsid: Option<String>,
    #[serde(rename = "GsIdmsToken")]
    gs_idms_token: Option<String>,
    sk: Option<String>,
    c: Option<String>,
}

impl SecurePayload {
    /// Decode the decrypted completion payload
    pub fn decode(plaintext: &[u8]) -> Result<Self, AuthError> {
        let wire: SecurePayloadWire = serde_json::from_slice(plaintext)
            .map_err(|e| AuthError::ProtocolViolation(format!("malformed secure payload: {e}")))?;

        let sk_b64 = require(wire.sk, "sk")?;
        let session_key = Zeroizing::new(decode_base64(&sk_b64, "sk")?);

        Ok(SecurePayload {
            adsid: require(wire.adsid, "adsid")?,
            gs_idms_token: require(wire.gs_idms_token, "GsIdmsToken")?,
            session_key,
            cookie: require(wire.c, "c")?,
        })
    }
}

/// One record from the decrypted token list
#[derive(Debug, Deserialize)]
pub struct TokenRecord {
    pub token_type: Option<String>,
    pub token: Option<String>,
    pub auth_service_url: Option<String>,
    pub auth_service_key: Option<String>,
    pub expiry_time: Option<String>,
}

/// Decrypted token payload: {"t": [record, ...]}
#[derive(Debug, Deserialize)]
pub struct TokenList {
    pub t: Option<Vec<TokenRecord>>,
}

/// Enforce a required response field
pub fn require<T>(field: Option<T>, name: &str) -> Result<T, AuthError> {
    field.ok_or_else(|| AuthError::ProtocolViolation(format!("missing field `{name}`")))
}

/// Base64-decode a wire field
pub fn decode_base64(value: &str, name: &str) -> Result<Vec<u8>, AuthError> {
    data_encoding::BASE64
        .decode(value.as_bytes())
        .map_err(|_| AuthError::ProtocolViolation(format!("field `{name}` is not valid base64")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let envelope = RequestEnvelope::new(InitRequest {
            a2k: "QUJD".into(),
            ps: vec![SCHEME_S2K, SCHEME_S2K_FO],
            u: "alice@example.com".into(),
            o: OP_INIT,
            cpd: Map::new(),
        });
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["Header"]["Version"], ENVELOPE_VERSION);
        assert_eq!(value["Request"]["o"], "init");
        assert_eq!(value["Request"]["A2k"], "QUJD");
        assert_eq!(value["Request"]["ps"][0], "s2k");
    }

    #[test]
    fn test_secure_payload_decode() {
        let plaintext = serde_json::json!({
            "adsid": "000123-05-1a2b",
            "GsIdmsToken": "idms-token",
            "sk": data_encoding::BASE64.encode(&[7u8; 32]),
            "c": "cookie-value",
            "acname": "ignored extra field",
        });
        let payload = SecurePayload::decode(plaintext.to_string().as_bytes()).unwrap();
        assert_eq!(payload.adsid, "000123-05-1a2b");
        assert_eq!(payload.gs_idms_token, "idms-token");
        assert_eq!(&payload.session_key[..], &[7u8; 32]);
        assert_eq!(payload.cookie, "cookie-value");
    }

    #[test]
    fn test_secure_payload_missing_field() {
        let plaintext = serde_json::json!({
            "adsid": "000123-05-1a2b",
            "sk": data_encoding::BASE64.encode(&[7u8; 32]),
            "c": "cookie-value",
        });
        let err = SecurePayload::decode(plaintext.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, AuthError::ProtocolViolation(_)));
    }

    #[test]
    fn test_sms_code_request_shape() {
        let value = serde_json::to_value(SmsCodeRequest::new("123456")).unwrap();
        assert_eq!(value["phoneNumber"]["id"], 1);
        assert_eq!(value["securityCode"]["code"], "123456");
        assert_eq!(value["mode"], "sms");
    }
}
