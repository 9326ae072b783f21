//! reqwest-backed transport for the `bp` web backend
//!
//! * `GET` parameters are URL-encoded into the query string.
//! * `POST` bodies are pretty-printed JSON.
//! * With a cipher configured, the query string and the `POST` body are
//!   encrypted, and `application/octet-stream` responses are decrypted and
//!   then read as JSON.
//! * A non-success status becomes [`TransportError::Rejected`] carrying the
//!   body text, or the status reason when the body is blank.

use super::{cipher_for, Method, Payload, PayloadCipher, Transport, TransportError};
use crate::config::ConsoleSettings;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use url::Url;

const JSON_CONTENT: &str = "application/json";
const SEALED_CONTENT: &str = "application/octet-stream";

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    cookie: Option<String>,
    cipher: Option<Arc<dyn PayloadCipher>>,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url.as_str())
            .field("cookie", &self.cookie.is_some())
            .field("cipher", &self.cipher)
            .finish()
    }
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self, TransportError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| TransportError::Network(format!("invalid base url {}: {}", base_url, e)))?;
        // Url::join replaces the last segment unless the path ends with a slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            cookie: None,
            cipher: None,
        })
    }

    pub fn from_settings(settings: &ConsoleSettings) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let mut transport = Self::with_client(client, &settings.base_url)?;
        transport.cookie = settings.cookie.clone();
        transport.cipher = cipher_for(settings.crypto);
        Ok(transport)
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    pub fn with_cipher(mut self, cipher: Arc<dyn PayloadCipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError::Network(format!("invalid path {}: {}", path, e)))
    }

    fn query_string(&self, params: &Value) -> Result<String, TransportError> {
        let map = match params {
            Value::Object(map) => map,
            Value::Null => return Ok(String::new()),
            other => {
                return Err(TransportError::Body(format!(
                    "query parameters must be an object, got {}",
                    other
                )))
            }
        };

        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in map {
            match value {
                Value::Null => {}
                Value::String(text) => {
                    serializer.append_pair(key, text);
                }
                other => {
                    serializer.append_pair(key, &other.to_string());
                }
            }
        }
        let query = serializer.finish();

        match (&self.cipher, query.is_empty()) {
            (Some(cipher), false) => cipher.encrypt(&query),
            _ => Ok(query),
        }
    }

    fn request_body(&self, body: &Value) -> Result<String, TransportError> {
        let text =
            serde_json::to_string_pretty(body).map_err(|e| TransportError::Body(e.to_string()))?;
        match &self.cipher {
            Some(cipher) => cipher.encrypt(&text),
            None => Ok(text),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Payload, TransportError> {
        let mut url = self.endpoint(path)?;

        let request = match method {
            Method::Get => {
                if let Some(params) = &body {
                    let query = self.query_string(params)?;
                    if !query.is_empty() {
                        url.set_query(Some(&query));
                    }
                }
                self.client.get(url)
            }
            Method::Post => {
                let request = self.client.post(url).header(CONTENT_TYPE, JSON_CONTENT);
                match &body {
                    Some(body) => request.body(self.request_body(body)?),
                    None => request,
                }
            }
        };
        let request = match &self.cookie {
            Some(cookie) => request.header(COOKIE, cookie.as_str()),
            None => request,
        };

        debug!("{} {}", method, path);
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = if text.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                text
            };
            debug!("{} {} rejected with {}: {}", method, path, status, message);
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        decode_body(&content_type, text, self.cipher.as_deref())
    }
}

fn decode_body(
    content_type: &str,
    text: String,
    cipher: Option<&dyn PayloadCipher>,
) -> Result<Payload, TransportError> {
    let (is_json, text) = match cipher {
        Some(cipher) if content_type.contains(SEALED_CONTENT) => (true, cipher.decrypt(&text)?),
        _ => (content_type.contains("json"), text),
    };

    if text.is_empty() {
        return Ok(Payload::Empty);
    }
    if is_json {
        return serde_json::from_str(&text)
            .map(Payload::Json)
            .map_err(|e| TransportError::Body(e.to_string()));
    }
    Ok(Payload::Text(text))
}
