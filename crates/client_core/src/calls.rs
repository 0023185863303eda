use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use shared::{
    domain::{Car, Direction},
    error::FleetError,
};

/// Fallback threshold after which a pending call is cleared unconditionally.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(3000);

/// A call button identity: one entry per (column, floor, direction) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallKey {
    pub column: usize,
    pub floor: i64,
    pub direction: Direction,
}

/// The two triggers that move a pending call into its terminal cleared
/// state. Both are explicit so the snapshot/timer race is order-independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    SnapshotMatched,
    TimedOut,
}

/// Which arrival clears a pending call.
///
/// `AnyCar` is behavioral parity with the original client: the tracker does
/// not know car-to-request assignment, so any car reaching the floor clears
/// the highlight. `ColumnCar` is the stricter opt-in mode that only accepts
/// arrival of the column's own car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearPolicy {
    #[default]
    AnyCar,
    ColumnCar,
}

#[derive(Debug, Clone, Copy)]
struct PendingCall {
    issued_at: Instant,
}

/// Tracks in-flight call requests and their pending/cleared transitions.
#[derive(Debug)]
pub struct CallRequestTracker {
    pending: HashMap<CallKey, PendingCall>,
    timeout: Duration,
}

impl CallRequestTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            timeout,
        }
    }

    /// Mark a triple pending. Re-pressing while pending refreshes the
    /// issue time only; there is never more than one entry per triple.
    /// Returns true when the entry is new.
    pub fn request(&mut self, key: CallKey, now: Instant) -> bool {
        self.pending
            .insert(key, PendingCall { issued_at: now })
            .is_none()
    }

    pub fn is_pending(&self, key: CallKey) -> bool {
        self.pending.contains_key(&key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Reconcile against a freshly applied snapshot: every pending request
    /// whose floor has been reached (per the policy) clears in this pass.
    pub fn reconcile(&mut self, cars: &[Car], policy: ClearPolicy) -> Vec<(CallKey, ClearReason)> {
        let mut cleared = Vec::new();
        self.pending.retain(|key, _| {
            let reached = match policy {
                ClearPolicy::AnyCar => cars.iter().any(|car| car.current_floor == key.floor),
                ClearPolicy::ColumnCar => cars
                    .get(key.column)
                    .is_some_and(|car| car.current_floor == key.floor),
            };
            if reached {
                cleared.push((*key, ClearReason::SnapshotMatched));
            }
            !reached
        });
        cleared
    }

    /// Clear requests older than the fallback threshold. Trades a possible
    /// premature un-highlight against a permanently stuck button when the
    /// backend loses or ignores a call.
    pub fn expire(&mut self, now: Instant) -> Vec<(CallKey, ClearReason)> {
        let mut cleared = Vec::new();
        self.pending.retain(|key, call| {
            let stale = now.duration_since(call.issued_at) >= self.timeout;
            if stale {
                cleared.push((*key, ClearReason::TimedOut));
            }
            !stale
        });
        cleared
    }
}

/// Validate a call before submission: floor in range, no up button on the
/// top floor, no down button on the bottom floor. The backend applies the
/// same rule defensively; violations here never reach the network.
pub fn validate_call(floor: i64, direction: Direction, floor_count: i64) -> Result<(), FleetError> {
    if !(1..=floor_count).contains(&floor) {
        return Err(FleetError::validation(format!(
            "floor {floor} outside 1..={floor_count}"
        )));
    }
    match direction {
        Direction::Idle => Err(FleetError::validation("call direction must be up or down")),
        Direction::Up if floor == floor_count => Err(FleetError::validation(format!(
            "no up call from the top floor {floor}"
        ))),
        Direction::Down if floor == 1 => {
            Err(FleetError::validation("no down call from the bottom floor"))
        }
        _ => Ok(()),
    }
}
