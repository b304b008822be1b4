// ── Delta reducer ──
//
// Pure transition function from (previous snapshot, update) to the next
// snapshot. No clock, no I/O, no shared state.

use std::sync::Arc;

use tracing::debug;

use crate::model::{Light, MotionZone, Room, Snapshot, Summary, Zone};

/// One typed change record from a `state_update` batch.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeRecord {
    Summary(Summary),
    Room(Room),
    Zone(Zone),
    MotionZone(MotionZone),
    Light { room_id: String, light: Light },
}

/// Input to [`reduce`].
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Full state from `initial_state`.
    Replace(Arc<Snapshot>),
    /// Ordered batch from `state_update`, applied as one unit.
    Changes(Vec<ChangeRecord>),
}

/// Compute the next snapshot.
///
/// Returns `None` when a change batch arrives before any full state; there
/// is nothing to apply it to.
pub fn reduce(previous: Option<&Arc<Snapshot>>, update: &Update) -> Option<Arc<Snapshot>> {
    match update {
        Update::Replace(snapshot) => Some(Arc::clone(snapshot)),
        Update::Changes(records) => {
            let Some(base) = previous else {
                debug!(records = records.len(), "dropping delta batch with no base snapshot");
                return None;
            };
            let mut next = Snapshot::clone(base);
            for record in records {
                apply_change(&mut next, record);
            }
            Some(Arc::new(next))
        }
    }
}

fn apply_change(snapshot: &mut Snapshot, record: &ChangeRecord) {
    match record {
        ChangeRecord::Summary(summary) => snapshot.summary = summary.clone(),
        ChangeRecord::Room(room) => replace_by_id(&mut snapshot.rooms, room, |r| &r.id),
        ChangeRecord::Zone(zone) => replace_by_id(&mut snapshot.zones, zone, |z| &z.id),
        ChangeRecord::MotionZone(motion) => {
            replace_by_id(&mut snapshot.motion_zones, motion, |m| &m.id);
        }
        ChangeRecord::Light { room_id, light } => {
            match snapshot.rooms.iter_mut().find(|r| r.id == *room_id) {
                Some(room) => replace_by_id(&mut room.lights, light, |l| &l.id),
                None => debug!(%room_id, light_id = %light.id, "light change for unknown room"),
            }
        }
    }
}

/// Replace the element sharing `new`'s id. Unknown ids are a no-op.
fn replace_by_id<T: Clone>(items: &mut [T], new: &T, id: impl Fn(&T) -> &String) {
    let target = id(new);
    match items.iter_mut().find(|item| id(item) == target) {
        Some(slot) => *slot = new.clone(),
        None => debug!(id = %target, "change for unknown entity ignored"),
    }
}
