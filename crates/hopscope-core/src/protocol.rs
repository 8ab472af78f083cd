//! Wire types for the `/store` and `/get` node endpoints
//!
//! Requests are strict; replies are decoded leniently. Nodes are free to add
//! fields, and missing telemetry degrades to a default instead of failing the
//! exchange.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Address of a single DHT node's HTTP API
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddress {
    pub host: String,
    pub port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Full URL of an endpoint on this node
    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("http://{}:{}{}", self.host, self.port, endpoint.path())
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Node endpoints used by the harness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Store,
    Get,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Store => "/store",
            Endpoint::Get => "/get",
        }
    }
}

/// Body of `POST /store`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRequest {
    pub key: String,
    pub value: String,
}

/// Body of `POST /get`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRequest {
    pub key: String,
}

/// Raw HTTP answer from a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Body as text, for diagnostics
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Decoded reply of `POST /store`
#[derive(Debug, Clone, PartialEq)]
pub struct StoreReply {
    success: Value,
    pub message: Option<String>,
    pub key_hash: Option<String>,
}

impl StoreReply {
    /// Decode a store reply; the body must be a JSON object
    pub fn decode(body: &[u8]) -> Result<Self, String> {
        let object = decode_object(body)?;
        Ok(Self {
            success: object.get("success").cloned().unwrap_or(Value::Null),
            message: string_field(&object, "message"),
            key_hash: string_field(&object, "key_hash"),
        })
    }

    /// Whether the node acknowledged the write
    pub fn acknowledged(&self) -> bool {
        is_truthy(&self.success)
    }
}

/// Decoded reply of `POST /get`
///
/// Both fields are optional: a node that cannot resolve the key may omit
/// `value`, and a node without hop telemetry may omit `hop_count`. An explicit
/// `"hop_count": null` is kept and rejected as malformed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetReply {
    value: Option<Value>,
    hop_count: Option<Value>,
}

impl GetReply {
    /// Decode a get reply; the body must be a JSON object
    pub fn decode(body: &[u8]) -> Result<Self, String> {
        let mut object = decode_object(body)?;
        Ok(Self {
            value: object.remove("value").filter(|v| !v.is_null()),
            hop_count: object.remove("hop_count"),
        })
    }

    /// Whether the returned value is exactly `expected`
    pub fn value_matches(&self, expected: &str) -> bool {
        matches!(&self.value, Some(Value::String(s)) if s == expected)
    }

    /// Returned value rendered for diagnostics, `None` if the node sent none
    pub fn value_text(&self) -> Option<String> {
        self.value.as_ref().map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Reported hop count; absent telemetry counts as zero hops
    pub fn hop_count(&self) -> Result<u64, String> {
        match &self.hop_count {
            None => Ok(0),
            Some(v) => v
                .as_u64()
                .ok_or_else(|| format!("malformed hop_count: {}", v)),
        }
    }
}

fn decode_object(body: &[u8]) -> Result<serde_json::Map<String, Value>, String> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected JSON object, got {}", other)),
        Err(e) => Err(format!("invalid JSON body: {}", e)),
    }
}

fn string_field(object: &serde_json::Map<String, Value>, name: &str) -> Option<String> {
    object.get(name).and_then(Value::as_str).map(str::to_string)
}

/// JSON truthiness: `false`, `null`, `0`, `""`, `[]` and `{}` are false
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
