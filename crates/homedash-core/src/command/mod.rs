// ── Command API ──
//
// All write operations flow through a unified `Command` enum. Planning
// (which entries to overlay before the request goes out) lives in `plan`;
// `execute` performs the HTTP write and reports what the server accepted.

pub(crate) mod plan;

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use homedash_api::CommandClient;
use homedash_api::models::LightStatePayload;

use crate::convert;
use crate::error::CoreError;
use crate::model::{DesiredState, EntityKey};
use crate::store::WriteId;

/// All write operations against the state service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetLight {
        light_id: String,
        desired: DesiredState,
    },
    SetRoomPower {
        room_id: String,
        on: bool,
    },
    SetZonePower {
        zone_id: String,
        on: bool,
    },
    ActivateScene {
        scene_id: String,
    },
}

impl Command {
    /// Short operation name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetLight { .. } => "set_light",
            Self::SetRoomPower { .. } => "set_room_power",
            Self::SetZonePower { .. } => "set_zone_power",
            Self::ActivateScene { .. } => "activate_scene",
        }
    }

    pub fn target_id(&self) -> &str {
        match self {
            Self::SetLight { light_id: id, .. }
            | Self::SetRoomPower { room_id: id, .. }
            | Self::SetZonePower { zone_id: id, .. }
            | Self::ActivateScene { scene_id: id } => id,
        }
    }
}

/// Outcome of a completed write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// Id of the optimistic batch this write owns, if it recorded any.
    pub write_id: Option<WriteId>,
    /// Entities and values the server reported as accepted.
    pub affected: Vec<(EntityKey, DesiredState)>,
}

/// Perform the HTTP write for `command`, returning the accepted values.
pub(crate) async fn execute(
    client: &CommandClient,
    command: &Command,
) -> Result<Vec<(EntityKey, DesiredState)>, CoreError> {
    match command {
        Command::SetLight { light_id, desired } => {
            let payload = LightStatePayload::from(*desired);
            let response = client.set_light_state(light_id, &payload).await?;
            let id = if response.id.is_empty() {
                light_id.clone()
            } else {
                response.id
            };
            let accepted = DesiredState::from(response.state);
            Ok(if accepted.is_empty() {
                Vec::new()
            } else {
                vec![(EntityKey::light(id), accepted)]
            })
        }
        Command::SetRoomPower { room_id, on } => {
            let response = client.set_room_power(room_id, *on).await?;
            Ok(response.affected.iter().filter_map(convert::affected_entry).collect())
        }
        Command::SetZonePower { zone_id, on } => {
            let response = client.set_zone_power(zone_id, *on).await?;
            Ok(response.affected.iter().filter_map(convert::affected_entry).collect())
        }
        Command::ActivateScene { scene_id } => {
            let response = client.activate_scene(scene_id).await?;
            Ok(response.affected.iter().filter_map(convert::affected_entry).collect())
        }
    }
}

// ── PendingWrite ─────────────────────────────────────────────────────

/// Handle to an in-flight write.
///
/// The optimistic overlay is already visible when this is returned. Await
/// it for the outcome; dropping it does not cancel the request, and a
/// failure still rolls the overlay back.
#[derive(Debug)]
pub struct PendingWrite {
    write_id: WriteId,
    rx: oneshot::Receiver<Result<CommandResult, CoreError>>,
}

impl PendingWrite {
    pub(crate) fn new(
        write_id: WriteId,
        rx: oneshot::Receiver<Result<CommandResult, CoreError>>,
    ) -> Self {
        Self { write_id, rx }
    }

    pub fn write_id(&self) -> WriteId {
        self.write_id
    }
}

impl IntoFuture for PendingWrite {
    type Output = Result<CommandResult, CoreError>;
    type IntoFuture = WriteFuture;

    fn into_future(self) -> Self::IntoFuture {
        WriteFuture { rx: self.rx }
    }
}

/// Future returned by awaiting a [`PendingWrite`].
#[derive(Debug)]
pub struct WriteFuture {
    rx: oneshot::Receiver<Result<CommandResult, CoreError>>,
}

impl Future for WriteFuture {
    type Output = Result<CommandResult, CoreError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(CoreError::Internal(
                    "write task ended without reporting a result".into(),
                ))
            })
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn target_of_each_command() {
        let command = Command::SetZonePower {
            zone_id: "upstairs".into(),
            on: false,
        };
        assert_eq!(command.name(), "set_zone_power");
        assert_eq!(command.target_id(), "upstairs");

        let command = Command::ActivateScene {
            scene_id: "movie".into(),
        };
        assert_eq!(command.target_id(), "movie");
    }

    #[tokio::test]
    async fn pending_write_resolves_to_sent_result() {
        let (tx, rx) = oneshot::channel();
        let pending = PendingWrite::new(WriteId::default(), rx);
        tx.send(Ok(CommandResult::default())).unwrap();
        assert_eq!(pending.await.unwrap(), CommandResult::default());
    }

    #[tokio::test]
    async fn dropped_sender_is_an_internal_error() {
        let (tx, rx) = oneshot::channel::<Result<CommandResult, CoreError>>();
        drop(tx);
        let err = PendingWrite::new(WriteId::default(), rx).await.unwrap_err();
        assert!(matches!(err, CoreError::Internal(_)));
    }
}
