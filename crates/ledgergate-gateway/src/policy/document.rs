//! Off-chain policy documents.
//!
//! A document is a JSON object with a `start_time`/`expiration` window and
//! arbitrary named fields. Fields are read leniently: a numeric string
//! satisfies an int rule and a scalar satisfies a string rule.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use ledgergate_core::error::{LedgerGateError, Result};

use super::evaluator::ValueSource;

#[derive(Debug, Clone)]
pub struct PolicyDocument {
    pub start_time: DateTime<Utc>,
    pub expiration: DateTime<Utc>,
    fields: Map<String, Value>,
}

impl PolicyDocument {
    pub fn parse(resource: &str, body: &str) -> Result<Self> {
        let unusable = |why: String| LedgerGateError::Internal(format!("policy for {resource}: {why}"));

        let fields = match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(unusable("document is not a JSON object".into())),
            Err(e) => return Err(unusable(format!("invalid JSON: {e}"))),
        };

        let instant = |name: &str| -> Result<DateTime<Utc>> {
            let raw = fields
                .get(name)
                .and_then(Value::as_str)
                .ok_or_else(|| unusable(format!("missing {name}")))?;
            parse_instant(raw).ok_or_else(|| unusable(format!("unparsable {name}: {raw}")))
        };

        let start_time = instant("start_time")?;
        let expiration = instant("expiration")?;
        Ok(Self {
            start_time,
            expiration,
            fields,
        })
    }

    fn field(&self, name: &str) -> Result<&Value> {
        self.fields
            .get(name)
            .ok_or_else(|| LedgerGateError::Internal(format!("policy has no field {name}")))
    }
}

/// RFC 3339, or a naive ISO-8601 datetime taken as UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn mistyped(name: &str, want: &str) -> LedgerGateError {
    LedgerGateError::Internal(format!("policy field {name} is not a {want}"))
}

#[async_trait]
impl ValueSource for PolicyDocument {
    async fn bool_value(&self, name: &str) -> Result<bool> {
        match self.field(name)? {
            Value::Bool(b) => Ok(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(mistyped(name, "bool")),
        }
    }

    async fn int_value(&self, name: &str) -> Result<i64> {
        match self.field(name)? {
            Value::Number(n) => n.as_i64().ok_or_else(|| mistyped(name, "int")),
            Value::String(s) => s.trim().parse().map_err(|_| mistyped(name, "int")),
            _ => Err(mistyped(name, "int")),
        }
    }

    async fn string_value(&self, name: &str) -> Result<String> {
        match self.field(name)? {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            _ => Err(mistyped(name, "string")),
        }
    }
}
