use std::collections::HashMap;

use shared::domain::Car;

/// Transient local door intent, keyed by (column, floor). Purely display
/// state: it never round-trips to the backend and stops applying once the
/// snapshot shows the car elsewhere. Carried for the manual-door variant;
/// the view only consults it when overrides are enabled in settings.
#[derive(Debug, Default)]
pub struct DoorOverrideStore {
    overrides: HashMap<(usize, i64), bool>,
}

impl DoorOverrideStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: usize, floor: i64, open: bool) {
        self.overrides.insert((column, floor), open);
    }

    pub fn get(&self, column: usize, floor: i64) -> Option<bool> {
        self.overrides.get(&(column, floor)).copied()
    }

    /// Drop overrides invalidated by the latest snapshot: the column's car
    /// has moved away, or the column no longer exists.
    pub fn prune(&mut self, cars: &[Car]) {
        self.overrides.retain(|&(column, floor), _| {
            cars.get(column)
                .is_some_and(|car| car.current_floor == floor)
        });
    }
}
