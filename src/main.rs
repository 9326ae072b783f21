use bp_console::config::{settings_path, ConsoleSettings};
use bp_console::modules::acl::{AclController, AclState};
use bp_console::modules::configuration::{
    ConfigurationController, ConfigurationState, StaticHostnamePrompt,
};
use bp_console::modules::control::{ControlController, ControlState};
use bp_console::modules::logs::{LogController, LogState, ScrollTarget};
use bp_console::modules::system::{SystemController, SystemState};
use bp_console::store::{Controller, ModuleHandle};
use bp_console::transport::api::ConsoleApi;
use bp_console::transport::http::HttpTransport;
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Headless stand-in for a log view.
struct TracingScroll;

impl ScrollTarget for TracingScroll {
    fn scroll_to_bottom(&self) {
        debug!("Log view scrolled to bottom");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let path = settings_path();
    info!("Loading console settings from {}", path.display());
    let settings = ConsoleSettings::load_or_create(&path).await?;
    info!(
        "Connecting to {} as {} deployment",
        settings.base_url, settings.role
    );

    let transport = HttpTransport::from_settings(&settings)
        .map_err(|e| eyre!("Failed to build HTTP transport: {}", e))?;
    let api = ConsoleApi::new(Arc::new(transport));

    let configuration = Arc::new(ConfigurationController::new(
        settings.role,
        api.clone(),
        Arc::new(StaticHostnamePrompt(settings.tls_hostname.clone())),
    ));
    let acl = Arc::new(AclController::new(api.clone()));
    let control = Arc::new(ControlController::new(api.clone()));
    let logs = Arc::new(LogController::new(
        api.clone(),
        &settings.logs,
        Arc::new(TracingScroll),
    ));
    let system = Arc::new(SystemController::new(api));

    watch_state(configuration.clone(), configuration_summary);
    watch_state(acl.clone(), acl_summary);
    watch_state(control.clone(), control_summary);
    watch_state(logs.clone(), log_summary);
    watch_state(system.clone(), system_summary);

    let mut configuration_handle = ModuleHandle::new(configuration.clone());
    let mut acl_handle = ModuleHandle::new(acl);
    let mut control_handle = ModuleHandle::new(control);
    let mut logs_handle = ModuleHandle::new(logs.clone());
    let mut system_handle = ModuleHandle::new(system);

    configuration_handle.mount();
    acl_handle.mount();
    control_handle.mount();
    logs_handle.mount();
    system_handle.mount();

    logs.set_auto_refresh(settings.logs.auto_refresh);

    configuration_handle.initialised().await;
    if configuration.needs_tls_credentials() {
        if settings.tls_hostname.is_some() {
            configuration.provision_tls_credentials().await;
        } else {
            warn!("Server configuration has no TLS files and no tls_hostname is set");
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    logs_handle.unmount();
    system_handle.unmount();
    control_handle.unmount();
    acl_handle.unmount();
    configuration_handle.unmount();

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

/// Logs a one-line summary of every state change until the module is destroyed.
fn watch_state<C: Controller>(controller: Arc<C>, summary: fn(&C::State) -> String) {
    let mut receiver = controller.subscribe();
    let lifetime = controller.store().lifetime();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = lifetime.cancelled() => break,
                changed = receiver.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let line = summary(&receiver.borrow_and_update());
                    info!("[{}] {}", controller.name(), line);
                }
            }
        }
    });
}

fn configuration_summary(state: &ConfigurationState) -> String {
    match state.error_info.first() {
        Some(error) => format!("{:?}: {}", state.phase, error),
        None => format!(
            "{:?} {} dirty={} code_view={}",
            state.phase,
            state.file_path.as_deref().unwrap_or("<no file>"),
            state.is_form_dirty,
            state.is_show_code
        ),
    }
}

fn acl_summary(state: &AclState) -> String {
    match state.error_info.first() {
        Some(error) => format!("error: {}", error),
        None => format!(
            "{} ({} lines) dirty={}",
            state.file_path.as_deref().unwrap_or("<no file>"),
            state.content.lines().count(),
            state.is_dirty
        ),
    }
}

fn control_summary(state: &ControlState) -> String {
    match &state.error_info {
        Some(error) => format!("error: {}", error),
        None => state.status_line(),
    }
}

fn log_summary(state: &LogState) -> String {
    match &state.error_info {
        Some(error) => format!("error: {}", error),
        None => format!(
            "{} lines, last: {}",
            state.log.lines().count(),
            state.log.lines().last().unwrap_or("")
        ),
    }
}

fn system_summary(state: &SystemState) -> String {
    match &state.error_info {
        Some(error) => format!("error: {}", error),
        None => state
            .rows
            .iter()
            .map(|row| format!("{}: {}", row.label, row.value))
            .collect::<Vec<_>>()
            .join(" | "),
    }
}
