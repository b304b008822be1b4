//! Shared helpers for command handlers.

use std::sync::Arc;
use std::time::Duration;

use homedash_core::{ConnectionState, Dashboard, DashboardView, DesiredState, Snapshot};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// True once the connection manager has stopped retrying.
pub fn gave_up(view: &DashboardView) -> bool {
    view.connection.state == ConnectionState::Disconnected && view.connection.error.is_some()
}

/// The first wait is over: state arrived or the connection gave up.
/// Server `error` frames are not fatal and do not end it.
pub fn first_state_settled(view: &DashboardView) -> bool {
    view.snapshot.is_some() || gave_up(view)
}

/// Start the dashboard and wait for the first full state, bounded by
/// `--wait`.
pub async fn await_snapshot(
    dashboard: &Dashboard,
    global: &GlobalOpts,
) -> Result<Arc<Snapshot>, CliError> {
    dashboard.start()?;
    let mut views = dashboard.subscribe();

    let view = tokio::time::timeout(
        Duration::from_secs(global.wait),
        views.wait_for(first_state_settled),
    )
    .await
    .map_err(|_| CliError::Timeout {
        seconds: global.wait,
    })?
    .ok_or_else(|| CliError::Internal("dashboard closed while waiting for state".into()))?;

    if let Some(ref snapshot) = view.snapshot {
        return Ok(Arc::clone(snapshot));
    }
    if let Some(ref error) = view.last_server_error {
        tracing::warn!(%error, "server reported an error before the first state");
    }
    let reason = view
        .connection
        .error
        .clone()
        .unwrap_or_else(|| "connection closed".into());
    Err(CliError::ConnectionFailed {
        url: dashboard.config().server.to_string(),
        source: reason.into(),
    })
}

/// Human-readable rendering of a partial state, e.g. `on, 40%, 2700K`.
pub fn describe_desired(desired: &DesiredState) -> String {
    let mut parts = Vec::new();
    if let Some(on) = desired.on {
        parts.push(if on { "on".to_owned() } else { "off".to_owned() });
    }
    if let Some(brightness) = desired.brightness {
        parts.push(format!("{brightness}%"));
    }
    if let Some(kelvin) = desired.color_temp {
        parts.push(format!("{kelvin}K"));
    }
    if parts.is_empty() {
        "unchanged".into()
    } else {
        parts.join(", ")
    }
}
