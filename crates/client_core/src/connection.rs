use shared::domain::ConnectionState;
use tracing::debug;

/// The realtime channel's state machine. One instance per channel; invalid
/// transitions are ignored with a log instead of panicking, since a racing
/// close/error pair from the transport is legal.
#[derive(Debug)]
pub struct ConnectionLifecycle {
    state: ConnectionState,
}

impl ConnectionLifecycle {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Idle,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Apply a transition if it is legal from the current state. Returns the
    /// new state when something changed.
    pub fn transition(&mut self, next: ConnectionState) -> Option<ConnectionState> {
        let legal = match (&self.state, &next) {
            (ConnectionState::Idle, ConnectionState::Connecting) => true,
            (ConnectionState::Connecting, ConnectionState::Connected) => true,
            (ConnectionState::Connected, ConnectionState::Disconnected) => true,
            (ConnectionState::Connecting, ConnectionState::Errored(_)) => true,
            (ConnectionState::Connected, ConnectionState::Errored(_)) => true,
            // Teardown closes the channel regardless of where it got to.
            (ConnectionState::Connecting, ConnectionState::Disconnected) => true,
            (ConnectionState::Idle, ConnectionState::Disconnected) => true,
            _ => false,
        };
        if !legal {
            debug!(from = ?self.state, to = ?next, "ignoring illegal connection transition");
            return None;
        }
        self.state = next.clone();
        Some(next)
    }
}

impl Default for ConnectionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_runs_idle_to_disconnected() {
        let mut lifecycle = ConnectionLifecycle::new();
        assert!(lifecycle.transition(ConnectionState::Connecting).is_some());
        assert!(lifecycle.transition(ConnectionState::Connected).is_some());
        assert!(lifecycle.transition(ConnectionState::Disconnected).is_some());
        assert!(lifecycle.state().is_terminal());
    }

    #[test]
    fn error_while_connecting_carries_the_message() {
        let mut lifecycle = ConnectionLifecycle::new();
        lifecycle.transition(ConnectionState::Connecting);
        lifecycle.transition(ConnectionState::Errored("dial refused".into()));
        assert_eq!(lifecycle.state().describe(), "dial refused");
    }

    #[test]
    fn terminal_states_ignore_further_transitions() {
        let mut lifecycle = ConnectionLifecycle::new();
        lifecycle.transition(ConnectionState::Connecting);
        lifecycle.transition(ConnectionState::Errored("boom".into()));
        assert!(lifecycle.transition(ConnectionState::Connected).is_none());
        assert!(lifecycle.transition(ConnectionState::Connecting).is_none());
        assert_eq!(lifecycle.state().describe(), "boom");
    }

    #[test]
    fn connected_cannot_be_reached_from_idle() {
        let mut lifecycle = ConnectionLifecycle::new();
        assert!(lifecycle.transition(ConnectionState::Connected).is_none());
        assert_eq!(lifecycle.state(), &ConnectionState::Idle);
    }
}
