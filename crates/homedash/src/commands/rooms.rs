//! `rooms`: list rooms with their lights and scenes.

use tabled::Tabled;

use homedash_core::{Dashboard, Room};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct RoomRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Power")]
    power: String,
    #[tabled(rename = "Lights")]
    lights: String,
    #[tabled(rename = "Brightness")]
    brightness: String,
    #[tabled(rename = "Scenes")]
    scenes: String,
}

fn room_row(room: &Room, color: bool) -> RoomRow {
    RoomRow {
        id: room.id.clone(),
        name: room.name.clone(),
        power: output::power_label(room.any_on, color),
        lights: format!("{}/{} on", room.lights_on(), room.lights.len()),
        brightness: room
            .brightness
            .map_or_else(|| "-".into(), |b| format!("{b}%")),
        scenes: room
            .scenes
            .iter()
            .map(|scene| scene.id.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

pub async fn handle(dashboard: &Dashboard, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshot = util::await_snapshot(dashboard, global).await?;
    let color = output::should_color(&global.color);

    let rendered = output::render_list(
        &global.output,
        &snapshot.rooms,
        |room| room_row(room, color),
        |room| room.id.clone(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
