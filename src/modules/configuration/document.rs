//! Role-tagged proxy configuration document
//!
//! The document is a JSON object. Known fields are typed per deployment role;
//! anything else lands in `extra` and is written back untouched. Every field
//! distinguishes "absent" from "explicitly null".

use crate::config::DeploymentRole;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocumentError {
    #[error("Invalid JSON: {0}")]
    Syntax(String),

    #[error("Configuration must be a JSON object")]
    NotAnObject,

    #[error("Invalid configuration: {0}")]
    Decode(String),

    #[error("Invalid value for `{key}`: {reason}")]
    Field { key: String, reason: String },

    #[error("invalid configuration: `{field}` is not allowed for a {role} deployment")]
    RoleViolation {
        role: DeploymentRole,
        field: &'static str,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),
}

/// A single document field
#[derive(Debug, Clone, PartialEq)]
pub enum Setting<T> {
    Absent,
    Null,
    Value(T),
}

impl<T> Default for Setting<T> {
    fn default() -> Self {
        Setting::Absent
    }
}

impl<T> Setting<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Setting::Absent)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Setting::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl Setting<String> {
    /// Holds a non-empty string
    pub fn is_populated(&self) -> bool {
        self.value().is_some_and(|value| !value.is_empty())
    }
}

impl<T: Serialize> Serialize for Setting<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Setting::Value(value) => value.serialize(serializer),
            Setting::Absent | Setting::Null => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Setting<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Setting::Value(value),
            None => Setting::Null,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub bind: Setting<String>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub with_basic_auth: Setting<String>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub server_bind: Setting<String>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub pac_bind: Setting<String>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub key: Setting<String>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub encryption: Setting<String>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub acl: Setting<String>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub pin_dest_addr: Setting<String>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub udp_over_tcp: Setting<bool>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub dns_server: Setting<String>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub tls: Setting<bool>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub quic: Setting<bool>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub quic_max_concurrency: Setting<u16>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub tls_cert: Setting<String>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub monitor: Setting<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub bind: Setting<String>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub key: Setting<String>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub encryption: Setting<String>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub acl: Setting<String>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub pin_dest_addr: Setting<String>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub udp_over_tcp: Setting<bool>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub dns_server: Setting<String>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub tls: Setting<bool>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub quic: Setting<bool>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub tls_cert: Setting<String>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub tls_key: Setting<String>,
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub monitor: Setting<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigDocument {
    Client(ClientConfig),
    Server(ServerConfig),
}

impl ConfigDocument {
    pub fn empty(role: DeploymentRole) -> Self {
        match role {
            DeploymentRole::Client => ConfigDocument::Client(ClientConfig::default()),
            DeploymentRole::Server => ConfigDocument::Server(ServerConfig::default()),
        }
    }

    pub fn from_value(role: DeploymentRole, value: Value) -> Result<Self, DocumentError> {
        if !value.is_object() {
            return Err(DocumentError::NotAnObject);
        }

        let decoded = match role {
            DeploymentRole::Client => serde_json::from_value(value).map(ConfigDocument::Client),
            DeploymentRole::Server => serde_json::from_value(value).map(ConfigDocument::Server),
        };
        decoded.map_err(|e| DocumentError::Decode(e.to_string()))
    }

    pub fn parse(role: DeploymentRole, text: &str) -> Result<Self, DocumentError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| DocumentError::Syntax(e.to_string()))?;
        Self::from_value(role, value)
    }

    pub fn role(&self) -> DeploymentRole {
        match self {
            ConfigDocument::Client(_) => DeploymentRole::Client,
            ConfigDocument::Server(_) => DeploymentRole::Server,
        }
    }

    pub fn to_value(&self) -> Result<Value, DocumentError> {
        let value = match self {
            ConfigDocument::Client(config) => serde_json::to_value(config),
            ConfigDocument::Server(config) => serde_json::to_value(config),
        };
        value.map_err(|e| DocumentError::Serialize(e.to_string()))
    }

    /// Two-space indented JSON, the format the backend stores.
    pub fn to_pretty_text(&self) -> Result<String, DocumentError> {
        let value = self.to_value()?;
        serde_json::to_string_pretty(&value).map_err(|e| DocumentError::Serialize(e.to_string()))
    }

    /// `None` for an absent key, `Some(Value::Null)` for an explicit null.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.to_value().ok()? {
            Value::Object(mut map) => map.remove(key),
            _ => None,
        }
    }

    /// Sets one key; a missing value is stored as an explicit null.
    ///
    /// The document is left untouched if the value does not fit the field.
    pub fn set_field(&mut self, key: &str, value: Option<Value>) -> Result<(), DocumentError> {
        let mut map = match self.to_value()? {
            Value::Object(map) => map,
            _ => return Err(DocumentError::NotAnObject),
        };
        map.insert(key.to_string(), value.unwrap_or(Value::Null));

        let updated =
            Self::from_value(self.role(), Value::Object(map)).map_err(|e| DocumentError::Field {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        *self = updated;
        Ok(())
    }

    /// Rejects fields that belong to the other role.
    pub fn validate_role(&self) -> Result<(), DocumentError> {
        match self {
            ConfigDocument::Client(config) if is_truthy(config.extra.get("tls_key")) => {
                Err(DocumentError::RoleViolation {
                    role: DeploymentRole::Client,
                    field: "tls_key",
                })
            }
            ConfigDocument::Server(config) if is_truthy(config.extra.get("with_basic_auth")) => {
                Err(DocumentError::RoleViolation {
                    role: DeploymentRole::Server,
                    field: "with_basic_auth",
                })
            }
            _ => Ok(()),
        }
    }

    /// Server document with both certificate and key paths set
    pub fn has_tls_credentials(&self) -> bool {
        match self {
            ConfigDocument::Server(config) => {
                config.tls_cert.is_populated() && config.tls_key.is_populated()
            }
            ConfigDocument::Client(_) => false,
        }
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Structured document plus its text rendering
#[derive(Debug, Clone, PartialEq)]
pub struct DualDocument {
    pub structured: ConfigDocument,
    pub text: String,
}

impl DualDocument {
    pub fn new(structured: ConfigDocument) -> Result<Self, DocumentError> {
        let text = structured.to_pretty_text()?;
        Ok(Self { structured, text })
    }

    /// Re-renders `text` from `structured`.
    pub fn sync_text(&mut self) -> Result<(), DocumentError> {
        self.text = self.structured.to_pretty_text()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_and_absent_are_distinct() {
        let doc = ConfigDocument::from_value(
            DeploymentRole::Client,
            json!({"bind": "127.0.0.1:1080", "dns_server": null}),
        )
        .unwrap();

        let ConfigDocument::Client(config) = &doc else {
            panic!("expected client document");
        };
        assert_eq!(config.bind, Setting::Value("127.0.0.1:1080".to_string()));
        assert_eq!(config.dns_server, Setting::Null);
        assert_eq!(config.server_bind, Setting::Absent);

        assert_eq!(doc.get("dns_server"), Some(Value::Null));
        assert_eq!(doc.get("server_bind"), None);
        assert_eq!(
            doc.to_value().unwrap(),
            json!({"bind": "127.0.0.1:1080", "dns_server": null})
        );
    }

    #[test]
    fn unknown_keys_pass_through() {
        let input = json!({"bind": "0.0.0.0:9000", "legacy_flag": [1, 2], "proxy_white_list": "a.txt"});
        let doc = ConfigDocument::from_value(DeploymentRole::Server, input.clone()).unwrap();
        assert_eq!(doc.to_value().unwrap(), input);
    }

    #[test]
    fn set_field_normalizes_missing_value_to_null() {
        let mut doc =
            ConfigDocument::from_value(DeploymentRole::Client, json!({"bind": "127.0.0.1:1080"}))
                .unwrap();
        doc.set_field("bind", None).unwrap();
        assert_eq!(doc.get("bind"), Some(Value::Null));
    }

    #[test]
    fn set_field_rejects_mistyped_values_without_mutation() {
        let mut doc =
            ConfigDocument::from_value(DeploymentRole::Client, json!({"tls": true})).unwrap();
        let before = doc.clone();

        let err = doc.set_field("tls", Some(json!("yes"))).unwrap_err();
        assert!(matches!(err, DocumentError::Field { ref key, .. } if key == "tls"));
        assert_eq!(doc, before);
    }

    #[test]
    fn text_round_trip_preserves_structure() {
        let mut doc = ConfigDocument::empty(DeploymentRole::Client);
        doc.set_field("bind", Some(json!("127.0.0.1:1080"))).unwrap();
        doc.set_field("quic", Some(json!(true))).unwrap();
        doc.set_field("quic_max_concurrency", Some(json!(64))).unwrap();
        doc.set_field("pac_bind", None).unwrap();
        doc.set_field("custom", Some(json!({"nested": [1.5, "x", null]}))).unwrap();

        let text = doc.to_pretty_text().unwrap();
        assert_eq!(ConfigDocument::parse(DeploymentRole::Client, &text).unwrap(), doc);
    }

    #[test]
    fn text_round_trip_keeps_floats_exact() {
        let mut doc = ConfigDocument::empty(DeploymentRole::Server);
        doc.set_field("legacy_ratio", Some(json!(1.0715660391465826e-75)))
            .unwrap();
        doc.set_field("legacy_limit", Some(json!(-1.603964615428183e143)))
            .unwrap();
        doc.set_field("legacy_weight", Some(json!([0.1, 2.5e-308, 1.7976931348623157e308])))
            .unwrap();

        let text = doc.to_pretty_text().unwrap();
        let parsed = ConfigDocument::parse(DeploymentRole::Server, &text).unwrap();
        assert_eq!(parsed, doc);
        assert_eq!(
            parsed.get("legacy_ratio").and_then(|v| v.as_f64()),
            Some(1.0715660391465826e-75)
        );
    }

    #[test]
    fn pretty_text_uses_two_space_indent() {
        let doc =
            ConfigDocument::from_value(DeploymentRole::Client, json!({"bind": "127.0.0.1:1080"}))
                .unwrap();
        assert_eq!(
            doc.to_pretty_text().unwrap(),
            "{\n  \"bind\": \"127.0.0.1:1080\"\n}"
        );
    }

    #[test]
    fn parse_reports_syntax_and_shape_errors() {
        assert!(matches!(
            ConfigDocument::parse(DeploymentRole::Client, "{\"bind\": "),
            Err(DocumentError::Syntax(_))
        ));
        assert_eq!(
            ConfigDocument::parse(DeploymentRole::Client, "[1, 2]"),
            Err(DocumentError::NotAnObject)
        );
        assert!(matches!(
            ConfigDocument::parse(DeploymentRole::Server, "{\"quic\": \"fast\"}"),
            Err(DocumentError::Decode(_))
        ));
    }

    #[test]
    fn client_rejects_populated_private_key() {
        let doc = ConfigDocument::from_value(
            DeploymentRole::Client,
            json!({"bind": "127.0.0.1:1080", "tls_key": "/etc/bp/key.pem"}),
        )
        .unwrap();
        let err = doc.validate_role().unwrap_err();
        assert_eq!(
            err,
            DocumentError::RoleViolation {
                role: DeploymentRole::Client,
                field: "tls_key"
            }
        );
        assert_eq!(
            err.to_string(),
            "invalid configuration: `tls_key` is not allowed for a CLIENT deployment"
        );
    }

    #[test]
    fn empty_foreign_fields_are_tolerated() {
        let client =
            ConfigDocument::from_value(DeploymentRole::Client, json!({"tls_key": ""})).unwrap();
        assert!(client.validate_role().is_ok());

        let server =
            ConfigDocument::from_value(DeploymentRole::Server, json!({"with_basic_auth": null}))
                .unwrap();
        assert!(server.validate_role().is_ok());

        let server = ConfigDocument::from_value(
            DeploymentRole::Server,
            json!({"with_basic_auth": "user:pass"}),
        )
        .unwrap();
        assert!(server.validate_role().is_err());
    }

    #[test]
    fn tls_credentials_need_cert_and_key() {
        let partial =
            ConfigDocument::from_value(DeploymentRole::Server, json!({"tls_cert": "cert.pem"}))
                .unwrap();
        assert!(!partial.has_tls_credentials());

        let complete = ConfigDocument::from_value(
            DeploymentRole::Server,
            json!({"tls_cert": "cert.pem", "tls_key": "key.pem"}),
        )
        .unwrap();
        assert!(complete.has_tls_credentials());
    }
}
