//! Typed endpoints of the `bp` web backend

use super::{Method, Transport};
use crate::service::ServiceError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub const QUERY_CONFIG: &str = "/api/config/query";
pub const CREATE_CONFIG: &str = "/api/config/create";
pub const CREATE_TLS_CONFIG: &str = "/api/config/create_tls_config";
pub const MODIFY_CONFIG: &str = "/api/config/modify";
pub const QUERY_ACL: &str = "/api/config/query_acl";
pub const TAIL_LOG: &str = "/api/logging/tail";
pub const SYSTEM_INFO: &str = "/api/monitor/system/info";
pub const QUERY_SERVICE: &str = "/api/service/query";
pub const START_SERVICE: &str = "/api/service/start";
pub const STOP_SERVICE: &str = "/api/service/stop";

/// Configuration file as reported by the backend; all `None` when no file exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigEnvelope {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AclEnvelope {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifyType {
    Config,
    Acl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyRequest {
    pub modify_type: ModifyType,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub bind_host: String,
    pub bind_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_ip: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceEnvelope {
    #[serde(default)]
    pub service_info: Option<ServiceInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    #[serde(default)]
    pub system_name: Option<String>,
    #[serde(default)]
    pub system_hostname: Option<String>,
    #[serde(default)]
    pub system_kernel_version: Option<String>,
    #[serde(default)]
    pub system_os_version: Option<String>,
    /// Seconds since boot
    pub uptime: u64,
    /// Kilobytes
    pub free_memory: u64,
    /// Kilobytes
    pub total_memory: u64,
    pub processors_count: usize,
    pub load_average: (f64, f64, f64),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEnvelope<T> {
    success: bool,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default = "Option::default")]
    data: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Reply<T> {
    Wrapped(ApiEnvelope<T>),
    Bare(T),
}

impl<T> Reply<T> {
    fn into_result(self, path: &str) -> Result<T, ServiceError> {
        match self {
            Reply::Bare(data) => Ok(data),
            Reply::Wrapped(envelope) if envelope.success => envelope
                .data
                .ok_or_else(|| ServiceError::Decode(format!("{}: envelope without data", path))),
            Reply::Wrapped(envelope) => Err(ServiceError::Refused(
                envelope.error_message.unwrap_or_default(),
            )),
        }
    }
}

/// Typed access to every endpoint the console consumes
#[derive(Clone)]
pub struct ConsoleApi {
    transport: Arc<dyn Transport>,
}

impl ConsoleApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ServiceError> {
        let value = self.transport.call(method, path, body).await?.into_json()?;
        serde_json::from_value(value).map_err(|e| ServiceError::Decode(format!("{}: {}", path, e)))
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<(), ServiceError> {
        self.transport.call(method, path, body).await?;
        Ok(())
    }

    pub async fn query_config(&self) -> Result<ConfigEnvelope, ServiceError> {
        self.fetch(Method::Get, QUERY_CONFIG, None).await
    }

    pub async fn create_config(&self) -> Result<ConfigEnvelope, ServiceError> {
        self.fetch(Method::Post, CREATE_CONFIG, None).await
    }

    pub async fn create_tls_config(&self, hostname: &str) -> Result<(), ServiceError> {
        self.send(
            Method::Post,
            CREATE_TLS_CONFIG,
            Some(json!({ "hostname": hostname })),
        )
        .await
    }

    pub async fn modify(&self, request: ModifyRequest) -> Result<(), ServiceError> {
        let body = serde_json::to_value(&request)
            .map_err(|e| ServiceError::Decode(format!("{}: {}", MODIFY_CONFIG, e)))?;
        self.send(Method::Post, MODIFY_CONFIG, Some(body)).await
    }

    pub async fn query_acl(&self) -> Result<AclEnvelope, ServiceError> {
        self.fetch(Method::Get, QUERY_ACL, None).await
    }

    pub async fn tail_log(&self) -> Result<String, ServiceError> {
        Ok(self
            .transport
            .call(Method::Get, TAIL_LOG, None)
            .await?
            .into_text())
    }

    pub async fn query_system_info(&self) -> Result<SystemInfo, ServiceError> {
        let reply: Reply<SystemInfo> = self.fetch(Method::Get, SYSTEM_INFO, None).await?;
        reply.into_result(SYSTEM_INFO)
    }

    pub async fn query_service(&self) -> Result<Option<ServiceInfo>, ServiceError> {
        let envelope: ServiceEnvelope = self.fetch(Method::Get, QUERY_SERVICE, None).await?;
        Ok(envelope.service_info)
    }

    pub async fn start_service(&self) -> Result<Option<ServiceInfo>, ServiceError> {
        let envelope: ServiceEnvelope = self.fetch(Method::Post, START_SERVICE, None).await?;
        Ok(envelope.service_info)
    }

    pub async fn stop_service(&self) -> Result<(), ServiceError> {
        self.send(Method::Post, STOP_SERVICE, None).await
    }
}
