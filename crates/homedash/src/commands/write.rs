//! Write commands: `light`, `room`, `zone`, `scene`.
//!
//! Each waits for the first state (targets are resolved against it), issues
//! the command and reports what the server accepted.

use std::fmt::Write as _;

use serde::Serialize;

use homedash_core::{Command, CommandResult, Dashboard, DesiredState, EntityKind};

use crate::cli::{GlobalOpts, GroupArgs, LightArgs, SceneArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct AffectedRow {
    kind: EntityKind,
    id: String,
    #[serde(flatten)]
    state: DesiredState,
}

#[derive(Debug, Serialize)]
struct WriteOutcome {
    command: &'static str,
    target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    requested: Option<DesiredState>,
    affected: Vec<AffectedRow>,
}

impl WriteOutcome {
    fn new(command: &Command, result: CommandResult) -> Self {
        let requested = match command {
            Command::SetLight { desired, .. } => Some(*desired),
            Command::SetRoomPower { on, .. } | Command::SetZonePower { on, .. } => {
                Some(DesiredState::power(*on))
            }
            Command::ActivateScene { .. } => None,
        };
        Self {
            command: command.name(),
            target: command.target_id().to_owned(),
            requested,
            affected: result
                .affected
                .into_iter()
                .map(|(key, state)| AffectedRow {
                    kind: key.kind,
                    id: key.id,
                    state,
                })
                .collect(),
        }
    }

    fn detail(&self) -> String {
        let mut out = format!("✓ {} {}", self.command, self.target);
        if let Some(ref requested) = self.requested {
            let _ = write!(out, ": {}", util::describe_desired(requested));
        }
        for row in &self.affected {
            let _ = write!(
                out,
                "\n  {}:{} → {}",
                row.kind,
                row.id,
                util::describe_desired(&row.state)
            );
        }
        out
    }
}

async fn run(dashboard: &Dashboard, command: Command, global: &GlobalOpts) -> Result<(), CliError> {
    util::await_snapshot(dashboard, global).await?;

    tracing::debug!(command = command.name(), target = command.target_id(), "sending write");
    let result = dashboard.execute(command.clone())?.await?;
    let outcome = WriteOutcome::new(&command, result);

    let rendered = output::render_single(
        &global.output,
        &outcome,
        WriteOutcome::detail,
        |o| o.target.clone(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

pub async fn light(dashboard: &Dashboard, args: LightArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let desired = DesiredState {
        on: Some(args.power.is_on()),
        brightness: args.brightness,
        color_temp: args.color_temp,
    };
    run(
        dashboard,
        Command::SetLight {
            light_id: args.id,
            desired,
        },
        global,
    )
    .await
}

pub async fn room(dashboard: &Dashboard, args: GroupArgs, global: &GlobalOpts) -> Result<(), CliError> {
    run(
        dashboard,
        Command::SetRoomPower {
            room_id: args.id,
            on: args.power.is_on(),
        },
        global,
    )
    .await
}

pub async fn zone(dashboard: &Dashboard, args: GroupArgs, global: &GlobalOpts) -> Result<(), CliError> {
    run(
        dashboard,
        Command::SetZonePower {
            zone_id: args.id,
            on: args.power.is_on(),
        },
        global,
    )
    .await
}

pub async fn scene(dashboard: &Dashboard, args: SceneArgs, global: &GlobalOpts) -> Result<(), CliError> {
    run(
        dashboard,
        Command::ActivateScene { scene_id: args.id },
        global,
    )
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use homedash_core::EntityKey;

    use super::*;

    fn scene_outcome() -> WriteOutcome {
        WriteOutcome::new(
            &Command::ActivateScene {
                scene_id: "movie".into(),
            },
            CommandResult {
                write_id: None,
                affected: vec![(
                    EntityKey::light("l2"),
                    DesiredState {
                        brightness: Some(20),
                        ..DesiredState::power(false)
                    },
                )],
            },
        )
    }

    #[test]
    fn scene_detail_lists_affected() {
        assert_eq!(
            scene_outcome().detail(),
            "✓ activate_scene movie\n  light:l2 → off, 20%"
        );
    }

    #[test]
    fn outcome_json_flattens_state() {
        let value = serde_json::to_value(scene_outcome()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "command": "activate_scene",
                "target": "movie",
                "affected": [{ "kind": "light", "id": "l2", "on": false, "brightness": 20 }]
            })
        );
    }

    #[test]
    fn light_detail_shows_request() {
        let outcome = WriteOutcome::new(
            &Command::SetLight {
                light_id: "l1".into(),
                desired: DesiredState::power(true),
            },
            CommandResult::default(),
        );
        assert_eq!(outcome.detail(), "✓ set_light l1: on");
    }
}
