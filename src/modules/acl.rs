//! Access-control-list file editor

use super::ErrorBuckets;
use crate::service::{ErrorInfo, ServiceCall};
use crate::store::{Controller, Store};
use crate::transport::api::{AclEnvelope, ConsoleApi, ModifyRequest, ModifyType};
use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AclState {
    pub loaded: bool,
    pub file_path: Option<String>,
    pub content: String,
    pub is_dirty: bool,
    pub is_save_success: bool,
    pub error_info: ErrorBuckets,
    revision: u64,
}

pub struct AclController {
    store: Store<AclState>,
    query: ServiceCall<(), AclEnvelope>,
    modify: ServiceCall<ModifyRequest, ()>,
}

impl AclController {
    pub fn new(api: ConsoleApi) -> Self {
        let store = Store::new(AclState::default());
        let query = {
            let api = api.clone();
            ServiceCall::new("acl.query", store.lifetime(), move |_: ()| {
                let api = api.clone();
                async move { api.query_acl().await }
            })
        };
        let modify = ServiceCall::new("acl.modify", store.lifetime(), move |request: ModifyRequest| {
            let api = api.clone();
            async move { api.modify(request).await }
        });

        Self {
            store,
            query,
            modify,
        }
    }

    pub fn is_saving(&self) -> bool {
        self.modify.is_loading()
    }

    pub async fn load(&self) {
        self.store.update(|state| state.error_info.load = None);

        let outcome = self.query.invoke(()).await;
        self.store.update(|state| {
            match outcome {
                Some(Ok(envelope)) => {
                    state.file_path = envelope.file_path;
                    state.content = envelope.content.unwrap_or_default();
                    state.is_dirty = false;
                    state.is_save_success = false;
                    state.revision += 1;
                }
                Some(Err(info)) => state.error_info.load = Some(info),
                None => {}
            }
            state.loaded = true;
        });
    }

    pub fn edit_content(&self, content: impl Into<String>) {
        let content = content.into();
        self.store.update(|state| {
            state.content = content;
            state.is_dirty = true;
            state.is_save_success = false;
            state.revision += 1;
        });
    }

    pub async fn save(&self) {
        let Some((request, revision)) = self.store.update(|state| {
            state.is_save_success = false;
            state.error_info.mutate = None;
            (
                ModifyRequest {
                    modify_type: ModifyType::Acl,
                    content: state.content.clone(),
                },
                state.revision,
            )
        }) else {
            return;
        };

        match self.modify.invoke(request).await {
            Some(Ok(())) => {
                info!("ACL saved");
                self.store.update(|state| {
                    if state.revision == revision {
                        state.is_dirty = false;
                        state.is_save_success = true;
                    }
                });
            }
            Some(Err(info)) => {
                self.store
                    .update(|state| state.error_info.mutate = Some(info));
            }
            None => {}
        }
    }
}

#[async_trait]
impl Controller for AclController {
    type State = AclState;

    fn name(&self) -> &'static str {
        "acl"
    }

    fn store(&self) -> &Store<AclState> {
        &self.store
    }

    async fn init(&self) {
        self.load().await;
    }
}
