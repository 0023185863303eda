use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(CarId);

/// Travel direction as carried on the wire: -1 down, 0 idle, +1 up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Direction {
    Down,
    Idle,
    Up,
}

impl Direction {
    pub fn as_i8(self) -> i8 {
        match self {
            Direction::Down => -1,
            Direction::Idle => 0,
            Direction::Up => 1,
        }
    }
}

impl TryFrom<i8> for Direction {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Direction::Down),
            0 => Ok(Direction::Idle),
            1 => Ok(Direction::Up),
            other => Err(format!("invalid direction {other}, expected -1, 0 or 1")),
        }
    }
}

impl From<Direction> for i8 {
    fn from(value: Direction) -> Self {
        value.as_i8()
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Direction::Down => "down",
            Direction::Idle => "idle",
            Direction::Up => "up",
        };
        f.write_str(label)
    }
}

/// One simulated elevator unit as pushed by the backend. Authoritative fields
/// are only ever replaced wholesale with a backend value, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Car {
    pub id: CarId,
    pub current_floor: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_floor: Option<i64>,
    pub direction: Direction,
    pub door_open: bool,
    #[serde(default)]
    pub targets: Vec<i64>,
}

/// Lifecycle of one realtime channel instance. Disconnected and Errored are
/// terminal for the instance; recovery means dialing a fresh channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Errored(String),
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Disconnected | ConnectionState::Errored(_))
    }

    /// Status text for display. For Errored this is the channel's error
    /// message verbatim.
    pub fn describe(&self) -> &str {
        match self {
            ConnectionState::Idle => "Idle",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Errored(message) => message,
        }
    }
}
