//! Realtime wire messages (JSON).
//!
//! Field names are PascalCase on the wire, matching what existing clients
//! and sensor publishers already send.

use serde::{Deserialize, Serialize};

use crate::error::{LedgerGateError, Result};

/// Connect handshake, sent once when a peer asks to be admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConnectRequest {
    pub resource: String,
    pub token: String,
}

impl ConnectRequest {
    pub fn decode(raw: &str) -> Result<Self> {
        let req: ConnectRequest = serde_json::from_str(raw)
            .map_err(|e| LedgerGateError::BadRequest(format!("invalid connect request: {e}")))?;
        if req.resource.is_empty() {
            return Err(LedgerGateError::BadRequest("connect request without resource".into()));
        }
        Ok(req)
    }
}

/// A sensor reading as published on the message streams.
///
/// Only `Device` drives authorization; the rest is forwarded untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Reading {
    pub device: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
}

impl Reading {
    pub fn decode(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| LedgerGateError::BadRequest(format!("invalid reading: {e}")))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn connect_request_uses_pascal_case() {
        let req = ConnectRequest::decode(r#"{"Resource":"temperature","Token":"a|b|1|0x00"}"#).unwrap();
        assert_eq!(req.resource, "temperature");
        assert_eq!(req.token, "a|b|1|0x00");

        assert!(ConnectRequest::decode(r#"{"resource":"temperature"}"#).is_err());
        assert!(ConnectRequest::decode(r#"{"Resource":"","Token":"t"}"#).is_err());
    }

    #[test]
    fn connect_request_encodes_as_clients_send_it() {
        let req = ConnectRequest {
            resource: "temperature".into(),
            token: "t".into(),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({ "Resource": "temperature", "Token": "t" })
        );
    }

    #[test]
    fn reading_keeps_only_what_it_needs() {
        let r = Reading::decode(
            br#"{"Date":"2021-06-05T12:00:00+02:00","Device":"Sensor_1","Value":23.5}"#,
        )
        .unwrap();
        assert_eq!(r.device, "Sensor_1");
        assert_eq!(r.value, Some(23.5));

        assert!(Reading::decode(b"not json").is_err());
    }
}
