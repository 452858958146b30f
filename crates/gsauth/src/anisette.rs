// Anisette - device-fingerprint header provider
//
// The service refuses requests without a set of opaque client-identity
// headers plus a client-metadata map (`cpd`). Both come from outside:
// the engine includes them verbatim and never generates, caches, or
// mutates them itself. Providers own their refresh lifecycle.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::{Map, Value, json};

use crate::error::{AuthError, TransportError};
use crate::transport::Transport;

pub const HEADER_MACHINE_ID: &str = "X-Apple-I-MD";
pub const HEADER_ONE_TIME_PASSWORD: &str = "X-Apple-I-MD-M";
pub const HEADER_ROUTING_INFO: &str = "X-Apple-I-MD-RINFO";
pub const HEADER_SERIAL_NUMBER: &str = "X-Apple-I-SRL-NO";

/// One snapshot of device-fingerprint data
#[derive(Debug, Clone, Default)]
pub struct AnisetteData {
    pub machine_id: String,
    pub one_time_password: String,
    pub routing_info: String,
    pub device_serial: String,
}

impl AnisetteData {
    pub fn to_headers(&self) -> HashMap<String, String> {
        HashMap::from([
            (HEADER_MACHINE_ID.to_string(), self.machine_id.clone()),
            (
                HEADER_ONE_TIME_PASSWORD.to_string(),
                self.one_time_password.clone(),
            ),
            (HEADER_ROUTING_INFO.to_string(), self.routing_info.clone()),
            (HEADER_SERIAL_NUMBER.to_string(), self.device_serial.clone()),
        ])
    }
}

/// Client-metadata map sent as `cpd` inside every request body
pub fn default_client_provisioning() -> Map<String, Value> {
    let mut cpd = Map::new();
    cpd.insert("bootstrap".to_string(), json!(true));
    cpd.insert("icscrec".to_string(), json!(true));
    cpd.insert("pbe".to_string(), json!(false));
    cpd.insert("prkgen".to_string(), json!(true));
    cpd.insert("svct".to_string(), json!("iCloud"));
    cpd
}

/// Source of fingerprint headers and the `cpd` metadata map.
/// `include_user` distinguishes requests made on behalf of a signed-in
/// user from anonymous provisioning calls.
pub trait AnisetteProvider: Send + Sync {
    fn headers(&self, include_user: bool) -> HashMap<String, String>;
    fn client_provisioning(&self) -> Map<String, Value>;
}

/// Provider wrapping caller-supplied fingerprint data verbatim
pub struct StaticAnisette {
    data: AnisetteData,
    cpd: Map<String, Value>,
}

impl StaticAnisette {
    pub fn new(data: AnisetteData) -> Self {
        StaticAnisette {
            data,
            cpd: default_client_provisioning(),
        }
    }
}

impl AnisetteProvider for StaticAnisette {
    fn headers(&self, _include_user: bool) -> HashMap<String, String> {
        self.data.to_headers()
    }

    fn client_provisioning(&self) -> Map<String, Value> {
        self.cpd.clone()
    }
}

/// Provider backed by a remote anisette server. Headers come from the
/// last successful `refresh()`; until then they are empty strings,
/// which the service rejects with its usual status mechanism.
pub struct RemoteAnisette<T: Transport> {
    base_url: String,
    serial: Option<String>,
    transport: T,
    data: RwLock<AnisetteData>,
}

impl<T: Transport> RemoteAnisette<T> {
    pub fn new(base_url: String, serial: Option<String>, transport: T) -> Self {
        RemoteAnisette {
            base_url,
            serial,
            transport,
            data: RwLock::new(AnisetteData::default()),
        }
    }

    /// Fetch fresh fingerprint data from the anisette server
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let url = format!("{}/anisette/data", self.base_url.trim_end_matches('/'));
        let mut headers = HashMap::new();
        if let Some(serial) = &self.serial {
            headers.insert("X-Apple-Serial".to_string(), serial.clone());
        }

        let body = self.transport.get(&url, &headers).await?;
        let parsed: Value = serde_json::from_slice(&body).map_err(|e| {
            AuthError::Transport(TransportError::Network(format!(
                "anisette server returned malformed JSON: {e}"
            )))
        })?;

        let header_map = parsed
            .get("anisette-headers")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                AuthError::ProtocolViolation("anisette response missing anisette-headers".into())
            })?;

        let fetch = |name: &str| {
            header_map
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let fresh = AnisetteData {
            machine_id: fetch(HEADER_MACHINE_ID),
            one_time_password: fetch(HEADER_ONE_TIME_PASSWORD),
            routing_info: fetch(HEADER_ROUTING_INFO),
            device_serial: fetch(HEADER_SERIAL_NUMBER),
        };

        tracing::debug!("Refreshed anisette data from {}", self.base_url);
        *self.data.write() = fresh;
        Ok(())
    }
}

impl<T: Transport> AnisetteProvider for RemoteAnisette<T> {
    fn headers(&self, _include_user: bool) -> HashMap<String, String> {
        self.data.read().to_headers()
    }

    fn client_provisioning(&self) -> Map<String, Value> {
        default_client_provisioning()
    }
}
