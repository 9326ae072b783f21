//! Transport collaborator
//!
//! Controllers never talk HTTP themselves. They go through a [`Transport`],
//! which performs one call against the `bp` web backend and hands back a
//! [`Payload`] or a [`TransportError`]. [`HttpTransport`](http::HttpTransport)
//! is the production implementation; tests script their own.
//!
//! An optional [`PayloadCipher`] wraps request and response bodies. The
//! controllers never see it.

pub mod api;
pub mod http;

use crate::config::CryptoMethod;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// Successful response body
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
    Empty,
}

impl Payload {
    /// Interprets the body as JSON; an empty body is `null`.
    pub fn into_json(self) -> Result<Value, TransportError> {
        match self {
            Payload::Json(value) => Ok(value),
            Payload::Text(text) => {
                serde_json::from_str(&text).map_err(|e| TransportError::Body(e.to_string()))
            }
            Payload::Empty => Ok(Value::Null),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Payload::Json(Value::String(text)) => text,
            Payload::Json(value) => value.to_string(),
            Payload::Text(text) => text,
            Payload::Empty => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// Non-success status; `message` is the body text or the status reason
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response body: {0}")]
    Body(String),

    #[error("Payload cipher failed: {0}")]
    Cipher(String),
}

impl TransportError {
    /// Message supplied by the server, if it sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            TransportError::Rejected { message, .. } if !message.trim().is_empty() => {
                Some(message.as_str())
            }
            _ => None,
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one call. For `GET` the body becomes the query string.
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Payload, TransportError>;
}

/// Symmetric encrypt/decrypt hook around request and response bodies
pub trait PayloadCipher: Send + Sync + fmt::Debug {
    fn encrypt(&self, plain: &str) -> Result<String, TransportError>;
    fn decrypt(&self, sealed: &str) -> Result<String, TransportError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Base64Cipher;

impl PayloadCipher for Base64Cipher {
    fn encrypt(&self, plain: &str) -> Result<String, TransportError> {
        Ok(STANDARD.encode(plain.as_bytes()))
    }

    fn decrypt(&self, sealed: &str) -> Result<String, TransportError> {
        let bytes = STANDARD
            .decode(sealed.trim())
            .map_err(|e| TransportError::Cipher(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| TransportError::Cipher(e.to_string()))
    }
}

pub fn cipher_for(method: CryptoMethod) -> Option<Arc<dyn PayloadCipher>> {
    match method {
        CryptoMethod::None => None,
        CryptoMethod::Base64 => Some(Arc::new(Base64Cipher)),
    }
}
