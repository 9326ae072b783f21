//! Configuration editor
//!
//! # State Machine
//!
//! ```text
//! Unloaded ──► Loading ──► Empty ──create──► Editing
//!                 │                            ▲  │
//!                 ├──► LoadFailed              │  save
//!                 │                            │  ▼
//!                 └──────────────────────► Editing ──► Saving ──► Saved
//!                                                        │
//!                                                        └──► SaveFailed
//! ```
//!
//! The document has two representations, structured and text. While
//! `is_show_code` is set the text is the source of truth; leaving text view
//! requires the text to parse. Role validation happens at load time only.

pub mod document;

pub use document::{ClientConfig, ConfigDocument, DocumentError, DualDocument, ServerConfig, Setting};

use super::ErrorBuckets;
use crate::config::DeploymentRole;
use crate::service::{ErrorInfo, ServiceCall};
use crate::store::{Controller, Store};
use crate::transport::api::{ConfigEnvelope, ConsoleApi, ModifyRequest, ModifyType};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_TLS_HOSTNAME: &str = "localhost";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("No configuration loaded")]
    NoDocument,

    #[error("Structured edits are disabled while the text view is active")]
    TextViewActive,

    #[error("Text edits require the text view")]
    TextViewInactive,

    #[error("Configuration module is no longer mounted")]
    Detached,

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Asks the operator for the hostname TLS files are issued for.
pub trait HostnamePrompt: Send + Sync {
    /// `None` means the operator cancelled.
    fn prompt_hostname(&self, default: &str) -> Option<String>;
}

/// Answers every prompt with a fixed value, or cancels when empty.
#[derive(Debug, Clone, Default)]
pub struct StaticHostnamePrompt(pub Option<String>);

impl HostnamePrompt for StaticHostnamePrompt {
    fn prompt_hostname(&self, _default: &str) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigPhase {
    #[default]
    Unloaded,
    Loading,
    /// Loaded, but no configuration file exists yet
    Empty,
    LoadFailed,
    Editing,
    Saving,
    Saved,
    SaveFailed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigurationState {
    pub phase: ConfigPhase,
    pub loaded: bool,
    pub file_path: Option<String>,
    pub metadata: Option<Value>,
    pub document: Option<DualDocument>,
    pub is_show_code: bool,
    pub is_form_dirty: bool,
    pub is_save_success: bool,
    pub error_info: ErrorBuckets,
    /// Bumped on every change of the document
    pub revision: u64,
}

impl ConfigurationState {
    pub fn config(&self) -> Option<&ConfigDocument> {
        self.document.as_ref().map(|doc| &doc.structured)
    }

    pub fn code(&self) -> Option<&str> {
        self.document.as_ref().map(|doc| doc.text.as_str())
    }

    fn replace_document(&mut self, document: Option<DualDocument>) {
        // text view and its parse error belong to the replaced document
        self.is_show_code = false;
        self.error_info.code = None;
        self.document = document;
        self.is_form_dirty = false;
        self.is_save_success = false;
        self.revision += 1;
    }

    fn mark_edited(&mut self) {
        self.is_form_dirty = true;
        self.is_save_success = false;
        self.revision += 1;
        if self.phase != ConfigPhase::Saving {
            self.phase = ConfigPhase::Editing;
        }
    }
}

struct ConfigurationServices {
    query: ServiceCall<(), ConfigEnvelope>,
    create: ServiceCall<(), ConfigEnvelope>,
    create_tls: ServiceCall<String, ()>,
    modify: ServiceCall<ModifyRequest, ()>,
}

pub struct ConfigurationController {
    role: DeploymentRole,
    store: Store<ConfigurationState>,
    services: ConfigurationServices,
    prompt: Arc<dyn HostnamePrompt>,
}

impl ConfigurationController {
    pub fn new(role: DeploymentRole, api: ConsoleApi, prompt: Arc<dyn HostnamePrompt>) -> Self {
        let store = Store::new(ConfigurationState::default());

        let services = ConfigurationServices {
            query: {
                let api = api.clone();
                ServiceCall::new("config.query", store.lifetime(), move |_: ()| {
                    let api = api.clone();
                    async move { api.query_config().await }
                })
            },
            create: {
                let api = api.clone();
                ServiceCall::new("config.create", store.lifetime(), move |_: ()| {
                    let api = api.clone();
                    async move { api.create_config().await }
                })
            },
            create_tls: {
                let api = api.clone();
                ServiceCall::new(
                    "config.create_tls",
                    store.lifetime(),
                    move |hostname: String| {
                        let api = api.clone();
                        async move { api.create_tls_config(&hostname).await }
                    },
                )
            },
            modify: ServiceCall::new(
                "config.modify",
                store.lifetime(),
                move |request: ModifyRequest| {
                    let api = api.clone();
                    async move { api.modify(request).await }
                },
            ),
        };

        Self {
            role,
            store,
            services,
            prompt,
        }
    }

    pub fn role(&self) -> DeploymentRole {
        self.role
    }

    pub fn is_loading(&self) -> bool {
        self.services.query.is_loading()
    }

    pub fn is_saving(&self) -> bool {
        self.services.modify.is_loading()
    }

    /// Server deployment whose configuration lacks a certificate or key.
    pub fn needs_tls_credentials(&self) -> bool {
        self.role.is_server()
            && self.store.read(|state| {
                state
                    .config()
                    .is_some_and(|config| !config.has_tls_credentials())
            })
    }

    fn decode(&self, value: Value, validate: bool) -> Result<Option<DualDocument>, ErrorInfo> {
        if value.is_null() {
            return Ok(None);
        }
        let structured = ConfigDocument::from_value(self.role, value)
            .map_err(|e| ErrorInfo::new(e.to_string()))?;
        if validate {
            structured
                .validate_role()
                .map_err(|e| ErrorInfo::new(e.to_string()))?;
        }
        DualDocument::new(structured)
            .map(Some)
            .map_err(|e| ErrorInfo::new(e.to_string()))
    }

    /// Fetches the document. Always ends with `loaded == true`.
    pub async fn load(&self) {
        self.store.update(|state| {
            state.error_info.load = None;
            state.phase = ConfigPhase::Loading;
        });

        let outcome = self.services.query.invoke(()).await;
        let decoded = match outcome {
            Some(Ok(envelope)) => {
                let ConfigEnvelope {
                    file_path,
                    config,
                    metadata,
                } = envelope;
                Some((
                    file_path,
                    metadata,
                    self.decode(config.unwrap_or(Value::Null), true),
                ))
            }
            Some(Err(info)) => {
                self.store.update(|state| {
                    state.error_info.load = Some(info);
                    state.phase = ConfigPhase::LoadFailed;
                });
                None
            }
            None => None,
        };

        self.store.update(|state| {
            if let Some((file_path, metadata, document)) = decoded {
                state.file_path = file_path;
                state.metadata = metadata;
                match document {
                    Ok(Some(document)) => {
                        state.replace_document(Some(document));
                        state.phase = ConfigPhase::Editing;
                    }
                    Ok(None) => {
                        state.replace_document(None);
                        state.phase = ConfigPhase::Empty;
                    }
                    Err(info) => {
                        warn!("Rejecting loaded configuration: {}", info);
                        state.replace_document(None);
                        state.error_info.load = Some(info);
                        state.phase = ConfigPhase::LoadFailed;
                    }
                }
            }
            state.loaded = true;
        });
    }

    /// Asks the backend for a default document.
    pub async fn create(&self) {
        self.store.update(|state| state.error_info.mutate = None);

        let envelope = match self.services.create.invoke(()).await {
            Some(Ok(envelope)) => envelope,
            Some(Err(info)) => {
                self.store.update(|state| state.error_info.mutate = Some(info));
                return;
            }
            None => return,
        };

        let ConfigEnvelope {
            file_path,
            config,
            metadata,
        } = envelope;
        match self.decode(config.unwrap_or(Value::Null), false) {
            Ok(document) => {
                info!("Default configuration created");
                self.store.update(|state| {
                    state.phase = if document.is_some() {
                        ConfigPhase::Editing
                    } else {
                        ConfigPhase::Empty
                    };
                    state.file_path = file_path;
                    state.metadata = metadata;
                    state.replace_document(document);
                });
            }
            Err(info) => {
                self.store.update(|state| state.error_info.mutate = Some(info));
            }
        }
    }

    /// Sets one field of the structured document. `None` stores an explicit null.
    pub fn edit_field(&self, key: &str, value: Option<Value>) -> Result<(), ConfigurationError> {
        self.store
            .update(|state| {
                if state.is_show_code {
                    return Err(ConfigurationError::TextViewActive);
                }
                let document = state
                    .document
                    .as_mut()
                    .ok_or(ConfigurationError::NoDocument)?;

                let mut structured = document.structured.clone();
                structured.set_field(key, value)?;
                let text = structured.to_pretty_text()?;
                document.structured = structured;
                document.text = text;

                state.mark_edited();
                debug!("Configuration field {} edited", key);
                Ok(())
            })
            .unwrap_or(Err(ConfigurationError::Detached))
    }

    /// Replaces the text representation; only legal in text view.
    pub fn edit_text(&self, text: impl Into<String>) -> Result<(), ConfigurationError> {
        let text = text.into();
        self.store
            .update(|state| {
                if !state.is_show_code {
                    return Err(ConfigurationError::TextViewInactive);
                }
                let document = state
                    .document
                    .as_mut()
                    .ok_or(ConfigurationError::NoDocument)?;
                document.text = text;
                state.mark_edited();
                Ok(())
            })
            .unwrap_or(Err(ConfigurationError::Detached))
    }

    /// Switches between structured and text view. Returns whether the view changed.
    ///
    /// Leaving text view with unparsable text sets the `code` error and keeps
    /// both the text view and the structured document as they were.
    pub fn toggle_text_view(&self) -> bool {
        let role = self.role;
        self.store
            .update(|state| {
                let Some(document) = state.document.as_mut() else {
                    return false;
                };

                if !state.is_show_code {
                    return match document.sync_text() {
                        Ok(()) => {
                            state.is_show_code = true;
                            true
                        }
                        Err(e) => {
                            state.error_info.code = Some(ErrorInfo::new(e.to_string()));
                            false
                        }
                    };
                }

                match ConfigDocument::parse(role, &document.text) {
                    Ok(structured) => {
                        document.structured = structured;
                        if let Err(e) = document.sync_text() {
                            warn!("Keeping operator text after re-render failure: {}", e);
                        }
                        state.error_info.code = None;
                        state.is_show_code = false;
                        state.mark_edited();
                        true
                    }
                    Err(e) => {
                        debug!("Text view rejected: {}", e);
                        state.error_info.code = Some(ErrorInfo::new(e.to_string()));
                        false
                    }
                }
            })
            .unwrap_or(false)
    }

    /// Persists the document.
    ///
    /// In text view the text is committed first; a parse failure aborts the
    /// save with a `code` error. An edit made while the save is in flight
    /// keeps the form dirty.
    pub async fn save(&self) {
        let role = self.role;
        let prepared = self
            .store
            .update(|state| {
                state.is_save_success = false;
                state.error_info.mutate = None;

                let Some(document) = state.document.as_mut() else {
                    state.error_info.mutate =
                        Some(ErrorInfo::new(ConfigurationError::NoDocument.to_string()));
                    return None;
                };

                if state.is_show_code {
                    match ConfigDocument::parse(role, &document.text) {
                        Ok(structured) => {
                            if structured != document.structured {
                                document.structured = structured;
                                state.revision += 1;
                            }
                            state.error_info.code = None;
                        }
                        Err(e) => {
                            state.error_info.code = Some(ErrorInfo::new(e.to_string()));
                            return None;
                        }
                    }
                }

                match document.structured.to_pretty_text() {
                    Ok(content) => {
                        state.phase = ConfigPhase::Saving;
                        Some((
                            ModifyRequest {
                                modify_type: ModifyType::Config,
                                content,
                            },
                            state.revision,
                        ))
                    }
                    Err(e) => {
                        state.error_info.mutate = Some(ErrorInfo::new(e.to_string()));
                        None
                    }
                }
            })
            .flatten();

        let Some((request, revision)) = prepared else {
            return;
        };

        match self.services.modify.invoke(request).await {
            Some(Ok(())) => {
                self.store.update(|state| {
                    if state.revision == revision {
                        state.is_form_dirty = false;
                        state.is_save_success = true;
                        state.phase = ConfigPhase::Saved;
                        info!("Configuration saved");
                    } else {
                        debug!("Configuration changed while saving, staying dirty");
                        state.phase = ConfigPhase::Editing;
                    }
                });
            }
            Some(Err(info)) => {
                self.store.update(|state| {
                    state.error_info.mutate = Some(info);
                    state.phase = ConfigPhase::SaveFailed;
                });
            }
            None => {}
        }
    }

    /// Prompts for a hostname and provisions TLS files for it.
    ///
    /// Returns `false` if the prompt was cancelled or provisioning failed.
    pub async fn provision_tls_credentials(&self) -> bool {
        if !self.role.is_server() {
            self.reject_tls_for_client();
            return false;
        }

        let Some(hostname) = self.prompt.prompt_hostname(DEFAULT_TLS_HOSTNAME) else {
            info!("TLS provisioning cancelled");
            return false;
        };
        self.provision_tls_credentials_for(&hostname).await
    }

    /// Provisions TLS files for `hostname`, then reloads the document.
    pub async fn provision_tls_credentials_for(&self, hostname: &str) -> bool {
        if !self.role.is_server() {
            self.reject_tls_for_client();
            return false;
        }

        self.store.update(|state| state.error_info.mutate = None);

        let hostname = hostname.trim();
        if hostname.is_empty() {
            self.store.update(|state| {
                state.error_info.mutate = Some(ErrorInfo::new("hostname cannot be empty"));
            });
            return false;
        }

        info!("Creating TLS files for {}", hostname);
        match self.services.create_tls.invoke(hostname.to_string()).await {
            Some(Ok(())) => {
                self.load().await;
                true
            }
            Some(Err(info)) => {
                self.store.update(|state| state.error_info.mutate = Some(info));
                false
            }
            None => false,
        }
    }

    fn reject_tls_for_client(&self) {
        warn!("TLS files requested for a {} deployment", self.role);
        self.store.update(|state| {
            state.error_info.mutate = Some(ErrorInfo::new(format!(
                "TLS files can only be created for a {} deployment",
                DeploymentRole::Server
            )));
        });
    }
}

#[async_trait]
impl Controller for ConfigurationController {
    type State = ConfigurationState;

    fn name(&self) -> &'static str {
        "configuration"
    }

    fn store(&self) -> &Store<ConfigurationState> {
        &self.store
    }

    async fn init(&self) {
        self.load().await;
    }
}
