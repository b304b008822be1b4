//! `watch`: follow the live dashboard until Ctrl-C.
//!
//! Prints connection transitions as they happen and a one-line summary each
//! time the merged view changes. Structured output modes emit one compact
//! JSON object per line instead.

use serde::Serialize;

use homedash_core::{ConnectionState, Dashboard, DashboardView};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct WatchLine {
    state: ConnectionState,
    reconnecting: bool,
    stale: bool,
    has_state: bool,
    lights_on: usize,
    lights_total: usize,
    rooms_active: usize,
    motion_active: usize,
    pending: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl WatchLine {
    fn from_view(view: &DashboardView) -> Self {
        let mut line = Self {
            state: view.connection.state,
            reconnecting: view.connection.is_reconnecting,
            stale: view.stale,
            pending: view.pending.len(),
            error: view
                .last_server_error
                .clone()
                .or_else(|| view.connection.error.clone()),
            ..Self::default()
        };
        if let Some(ref snapshot) = view.snapshot {
            line.has_state = true;
            line.lights_total = snapshot.lights().count();
            line.lights_on = snapshot.lights().filter(|light| light.on).count();
            line.rooms_active = snapshot.rooms.iter().filter(|room| room.any_on).count();
            line.motion_active = snapshot
                .motion_zones
                .iter()
                .filter(|zone| zone.motion)
                .count();
        }
        line
    }

    fn summary(&self, color: bool) -> String {
        if !self.has_state {
            return "waiting for state...".into();
        }
        let mut text = format!(
            "{}/{} lights on · {} rooms active · motion in {}",
            self.lights_on, self.lights_total, self.rooms_active, self.motion_active
        );
        if self.pending > 0 {
            text.push_str(&format!(" · {} pending", self.pending));
        }
        if self.stale {
            text.push_str(" · ");
            text.push_str(&output::warn_label("stale", color));
        }
        text
    }
}

fn transition(view: &DashboardView, color: bool) -> String {
    let status = &view.connection;
    let mut text = format!("connection: {}", connection_label(status.state));
    if status.is_reconnecting {
        text.push_str(&format!(
            " ({}, attempt {})",
            output::warn_label("reconnecting", color),
            status.attempt
        ));
    }
    if let Some(ref error) = status.error {
        text.push_str(&format!(": {error}"));
    }
    text
}

fn connection_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Open => "open",
        ConnectionState::Reconnecting => "reconnecting",
    }
}

pub async fn handle(dashboard: &Dashboard, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let structured = matches!(
        global.output,
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml
    );

    dashboard.start()?;
    let mut views = dashboard.subscribe();
    let mut last_connection = None;
    let mut last_line = None;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut view = views.latest();
    loop {
        let connection = (view.connection.state, view.connection.is_reconnecting);
        if !structured && last_connection != Some(connection) {
            output::print_output(&transition(&view, color), global.quiet);
        }
        last_connection = Some(connection);

        let line = WatchLine::from_view(&view);
        if last_line.as_ref() != Some(&line) {
            let rendered = if structured {
                output::render_json(&line, true)?
            } else {
                line.summary(color)
            };
            output::print_output(&rendered, global.quiet);
            last_line = Some(line);
        }

        tokio::select! {
            _ = &mut ctrl_c => break,
            next = views.changed() => match next {
                Some(next) => view = next,
                None => break,
            },
        }
    }

    tracing::debug!("watch interrupted");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use homedash_core::Snapshot;
    use serde_json::json;

    use super::*;

    fn view() -> DashboardView {
        let snapshot: Snapshot = serde_json::from_value(json!({
            "rooms": [
                { "id": "r1", "name": "Living", "anyOn": true,
                  "lights": [{ "id": "l1", "on": true }, { "id": "l2", "on": false }] },
                { "id": "r2", "name": "Hall",
                  "lights": [{ "id": "l3", "on": false }] }
            ],
            "motionZones": [{ "id": "m1", "name": "Door", "motion": true }]
        }))
        .unwrap();
        DashboardView {
            snapshot: Some(Arc::new(snapshot)),
            stale: true,
            ..DashboardView::default()
        }
    }

    #[test]
    fn summary_counts_the_merged_snapshot() {
        let line = WatchLine::from_view(&view());
        assert_eq!(
            line.summary(false),
            "1/3 lights on · 1 rooms active · motion in 1 · stale"
        );
    }

    #[test]
    fn summary_before_state() {
        let line = WatchLine::from_view(&DashboardView::default());
        assert_eq!(line.summary(false), "waiting for state...");
    }

    #[test]
    fn transition_shows_terminal_error() {
        let mut view = DashboardView::default();
        view.connection.error = Some("connection lost after 5 reconnect attempts".into());
        assert_eq!(
            transition(&view, false),
            "connection: disconnected: connection lost after 5 reconnect attempts"
        );
    }
}
