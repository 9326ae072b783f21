//! Start/stop of the managed proxy service

use crate::service::{ErrorInfo, ServiceCall};
use crate::store::{Controller, Store};
use crate::transport::api::{ConsoleApi, ServiceInfo};
use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlState {
    pub loaded: bool,
    pub online: bool,
    pub service_info: Option<ServiceInfo>,
    pub error_info: Option<ErrorInfo>,
}

impl ControlState {
    pub fn status_line(&self) -> String {
        match (&self.service_info, self.online) {
            (Some(info), true) => format!("running at {}:{}", info.bind_host, info.bind_port),
            (None, true) => "running".to_string(),
            (_, false) => "not running".to_string(),
        }
    }
}

pub struct ControlController {
    store: Store<ControlState>,
    query: ServiceCall<(), Option<ServiceInfo>>,
    start: ServiceCall<(), Option<ServiceInfo>>,
    stop: ServiceCall<(), ()>,
}

impl ControlController {
    pub fn new(api: ConsoleApi) -> Self {
        let store = Store::new(ControlState::default());

        let query = {
            let api = api.clone();
            ServiceCall::new("service.query", store.lifetime(), move |_: ()| {
                let api = api.clone();
                async move { api.query_service().await }
            })
        };
        let start = {
            let api = api.clone();
            ServiceCall::new("service.start", store.lifetime(), move |_: ()| {
                let api = api.clone();
                async move { api.start_service().await }
            })
        };
        let stop = ServiceCall::new("service.stop", store.lifetime(), move |_: ()| {
            let api = api.clone();
            async move { api.stop_service().await }
        });

        Self {
            store,
            query,
            start,
            stop,
        }
    }

    pub fn is_toggling(&self) -> bool {
        self.start.is_loading() || self.stop.is_loading()
    }

    pub fn status_line(&self) -> String {
        self.store.read(ControlState::status_line)
    }

    /// Stops a running service or starts a stopped one.
    pub async fn toggle_service(&self) {
        let Some(online) = self.store.update(|state| {
            state.error_info = None;
            state.online
        }) else {
            return;
        };

        if online {
            match self.stop.invoke(()).await {
                Some(Ok(())) => {
                    info!("Proxy service stopped");
                    self.store.update(|state| {
                        state.online = false;
                        state.service_info = None;
                    });
                }
                Some(Err(info)) => {
                    self.store.update(|state| state.error_info = Some(info));
                }
                None => {}
            }
        } else {
            match self.start.invoke(()).await {
                Some(Ok(service_info)) => {
                    info!("Proxy service started");
                    self.store.update(|state| {
                        state.service_info = service_info;
                        state.online = true;
                    });
                }
                Some(Err(info)) => {
                    self.store.update(|state| state.error_info = Some(info));
                }
                None => {}
            }
        }
    }
}

#[async_trait]
impl Controller for ControlController {
    type State = ControlState;

    fn name(&self) -> &'static str {
        "control"
    }

    fn store(&self) -> &Store<ControlState> {
        &self.store
    }

    async fn init(&self) {
        let outcome = self.query.invoke(()).await;
        self.store.update(|state| {
            match outcome {
                Some(Ok(service_info)) => {
                    state.online = service_info.is_some();
                    state.service_info = service_info;
                }
                Some(Err(info)) => state.error_info = Some(info),
                None => {}
            }
            state.loaded = true;
        });
    }
}
