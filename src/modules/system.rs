//! Host metrics of the machine running the proxy

use crate::service::{ErrorInfo, ServiceCall};
use crate::store::{Controller, Store};
use crate::transport::api::{ConsoleApi, SystemInfo};
use async_trait::async_trait;
use chrono::{DateTime, Local};

const MISSING: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemRow {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemState {
    pub loaded: bool,
    pub error_info: Option<ErrorInfo>,
    pub info: Option<SystemInfo>,
    pub rows: Vec<SystemRow>,
    pub refreshed_at: Option<DateTime<Local>>,
}

pub struct SystemController {
    store: Store<SystemState>,
    query: ServiceCall<(), SystemInfo>,
}

impl SystemController {
    pub fn new(api: ConsoleApi) -> Self {
        let store = Store::new(SystemState::default());
        let query = ServiceCall::new("system.info", store.lifetime(), move |_: ()| {
            let api = api.clone();
            async move { api.query_system_info().await }
        });
        Self { store, query }
    }

    pub fn is_loading(&self) -> bool {
        self.query.is_loading()
    }

    pub async fn refresh(&self) {
        self.store.update(|state| state.error_info = None);

        let outcome = self.query.invoke(()).await;
        self.store.update(|state| {
            match outcome {
                Some(Ok(info)) => {
                    state.rows = system_rows(&info);
                    state.info = Some(info);
                    state.refreshed_at = Some(Local::now());
                }
                Some(Err(info)) => state.error_info = Some(info),
                None => {}
            }
            state.loaded = true;
        });
    }
}

#[async_trait]
impl Controller for SystemController {
    type State = SystemState;

    fn name(&self) -> &'static str {
        "system"
    }

    fn store(&self) -> &Store<SystemState> {
        &self.store
    }

    async fn init(&self) {
        self.refresh().await;
    }
}

pub fn system_rows(info: &SystemInfo) -> Vec<SystemRow> {
    let text = |value: &Option<String>| value.clone().unwrap_or_else(|| MISSING.to_string());
    let (one, five, fifteen) = info.load_average;

    vec![
        SystemRow {
            label: "Host Name",
            value: text(&info.system_hostname),
        },
        SystemRow {
            label: "System",
            value: format!(
                "{} {}_{}",
                text(&info.system_name),
                text(&info.system_os_version),
                text(&info.system_kernel_version)
            ),
        },
        SystemRow {
            label: "Uptime",
            value: format_time_ago(info.uptime),
        },
        SystemRow {
            label: "Memory Usage",
            value: format!(
                "{} / {}",
                format_kb(info.free_memory),
                format_kb(info.total_memory)
            ),
        },
        SystemRow {
            label: "Load Avg",
            value: format!("{:.2}, {:.2}, {:.2}", one, five, fifteen),
        },
        SystemRow {
            label: "Processors",
            value: info.processors_count.to_string(),
        },
    ]
}

/// Kilobytes as reported by the backend (1000 bytes each), in binary units.
pub fn format_kb(kb: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

    let mut value = kb as f64 * 1000.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

/// Phrase for "`seconds` ago", e.g. `3 days ago`.
pub fn format_time_ago(seconds: u64) -> String {
    const STEPS: [(f64, &str); 7] = [
        (60.0, "second"),
        (60.0, "minute"),
        (24.0, "hour"),
        (7.0, "day"),
        (365.0 / 7.0 / 12.0, "week"),
        (12.0, "month"),
        (f64::INFINITY, "year"),
    ];

    let mut value = seconds as f64;
    let mut index = 0;
    while value >= STEPS[index].0 {
        value /= STEPS[index].0;
        index += 1;
    }

    let count = value.floor() as u64;
    if index == 0 && count < 10 {
        return "just now".to_string();
    }

    let unit = STEPS[index].1;
    if count == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}
