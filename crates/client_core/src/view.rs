use shared::domain::{Car, ConnectionState, Direction};

use crate::{
    calls::{CallKey, CallRequestTracker},
    config::ClientSettings,
    doors::DoorOverrideStore,
    snapshot::SnapshotStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorCaption {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloorCell {
    pub floor: i64,
    /// Up call highlight; always false on the top floor, which has no up button.
    pub up_pending: bool,
    /// Down call highlight; always false on the bottom floor.
    pub down_pending: bool,
    pub car_here: bool,
    pub door: DoorCaption,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnView {
    pub car: Car,
    pub floors: Vec<FloorCell>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetView {
    /// Connection status text; an Errored state's message verbatim.
    pub status_line: String,
    pub connected: bool,
    pub columns: Vec<ColumnView>,
}

/// Pure derivation of everything the display renders, from the three stores
/// plus the connection state. No mutation, no I/O; deterministic for any
/// given store contents, which is what makes it snapshot-testable.
pub fn derive(
    snapshot: &SnapshotStore,
    calls: &CallRequestTracker,
    doors: &DoorOverrideStore,
    connection: &ConnectionState,
    settings: &ClientSettings,
) -> FleetView {
    let columns = snapshot
        .cars()
        .iter()
        .enumerate()
        .map(|(column, car)| ColumnView {
            car: car.clone(),
            floors: (1..=settings.floor_count)
                .rev()
                .map(|floor| floor_cell(column, floor, car, calls, doors, settings))
                .collect(),
        })
        .collect();

    FleetView {
        status_line: connection.describe().to_string(),
        connected: *connection == ConnectionState::Connected,
        columns,
    }
}

fn floor_cell(
    column: usize,
    floor: i64,
    car: &Car,
    calls: &CallRequestTracker,
    doors: &DoorOverrideStore,
    settings: &ClientSettings,
) -> FloorCell {
    let car_here = car.current_floor == floor;
    let door_open = if car_here {
        match doors.get(column, floor) {
            Some(intent) if settings.door_overrides => intent,
            _ => car.door_open,
        }
    } else {
        false
    };
    FloorCell {
        floor,
        up_pending: floor != settings.floor_count
            && calls.is_pending(CallKey {
                column,
                floor,
                direction: Direction::Up,
            }),
        down_pending: floor != 1
            && calls.is_pending(CallKey {
                column,
                floor,
                direction: Direction::Down,
            }),
        car_here,
        door: if door_open {
            DoorCaption::Open
        } else {
            DoorCaption::Closed
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::calls::DEFAULT_CALL_TIMEOUT;
    use shared::domain::CarId;

    fn car(floor: i64, door_open: bool) -> Car {
        Car {
            id: CarId(0),
            current_floor: floor,
            destination_floor: None,
            direction: Direction::Idle,
            door_open,
            targets: Vec::new(),
        }
    }

    fn stores_with(car0: Car) -> (SnapshotStore, CallRequestTracker, DoorOverrideStore) {
        let mut snapshot = SnapshotStore::new();
        snapshot.replace(vec![car0]);
        (
            snapshot,
            CallRequestTracker::new(DEFAULT_CALL_TIMEOUT),
            DoorOverrideStore::new(),
        )
    }

    fn cell(view: &FleetView, column: usize, floor: i64) -> &FloorCell {
        view.columns[column]
            .floors
            .iter()
            .find(|cell| cell.floor == floor)
            .expect("floor cell")
    }

    #[test]
    fn pending_call_highlights_exactly_its_triple() {
        let (snapshot, mut calls, doors) = stores_with(car(1, false));
        calls.request(
            CallKey {
                column: 0,
                floor: 5,
                direction: Direction::Up,
            },
            Instant::now(),
        );

        let settings = ClientSettings::default();
        let view = derive(&snapshot, &calls, &doors, &ConnectionState::Connected, &settings);
        assert!(cell(&view, 0, 5).up_pending);
        assert!(!cell(&view, 0, 5).down_pending);
        assert!(!cell(&view, 0, 4).up_pending);
    }

    #[test]
    fn door_caption_is_closed_away_from_the_car() {
        let (snapshot, calls, doors) = stores_with(car(3, true));
        let settings = ClientSettings::default();
        let view = derive(&snapshot, &calls, &doors, &ConnectionState::Connected, &settings);
        assert_eq!(cell(&view, 0, 3).door, DoorCaption::Open);
        assert!(cell(&view, 0, 3).car_here);
        assert_eq!(cell(&view, 0, 4).door, DoorCaption::Closed);
    }

    #[test]
    fn override_masks_snapshot_only_where_the_car_stands() {
        let (snapshot, calls, mut doors) = stores_with(car(3, false));
        doors.set(0, 3, true);

        let enabled = ClientSettings {
            door_overrides: true,
            ..ClientSettings::default()
        };
        let view = derive(&snapshot, &calls, &doors, &ConnectionState::Connected, &enabled);
        assert_eq!(cell(&view, 0, 3).door, DoorCaption::Open);

        // Same stores with overrides disabled: door state stays authoritative.
        let disabled = ClientSettings::default();
        let view = derive(&snapshot, &calls, &doors, &ConnectionState::Connected, &disabled);
        assert_eq!(cell(&view, 0, 3).door, DoorCaption::Closed);
    }

    #[test]
    fn stale_override_is_ignored_after_the_car_moves() {
        let (mut snapshot, calls, mut doors) = stores_with(car(3, false));
        doors.set(0, 3, true);
        snapshot.replace(vec![car(4, false)]);

        let settings = ClientSettings {
            door_overrides: true,
            ..ClientSettings::default()
        };
        let view = derive(&snapshot, &calls, &doors, &ConnectionState::Connected, &settings);
        assert_eq!(cell(&view, 0, 3).door, DoorCaption::Closed);
    }

    #[test]
    fn errored_status_line_is_the_message_verbatim() {
        let (snapshot, calls, doors) = stores_with(car(1, false));
        let settings = ClientSettings::default();
        let state = ConnectionState::Errored("WebSocket connection error.".into());
        let view = derive(&snapshot, &calls, &doors, &state, &settings);
        assert_eq!(view.status_line, "WebSocket connection error.");
        assert!(!view.connected);
    }

    #[test]
    fn terminal_floors_never_highlight_the_missing_button() {
        let (snapshot, mut calls, doors) = stores_with(car(1, false));
        let now = Instant::now();
        // Entries a stricter caller would have rejected; the view still
        // refuses to light a button that does not exist.
        calls.request(
            CallKey {
                column: 0,
                floor: 10,
                direction: Direction::Up,
            },
            now,
        );
        calls.request(
            CallKey {
                column: 0,
                floor: 1,
                direction: Direction::Down,
            },
            now,
        );

        let settings = ClientSettings::default();
        let view = derive(&snapshot, &calls, &doors, &ConnectionState::Connected, &settings);
        assert!(!cell(&view, 0, 10).up_pending);
        assert!(!cell(&view, 0, 1).down_pending);
    }
}
