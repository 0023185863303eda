use thiserror::Error;

/// Failure taxonomy for the fleet client. None of these are fatal to the
/// core: transport failures surface as status, parse failures drop the
/// offending message, validation failures are rejected before any I/O.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed push payload: {0}")]
    Parse(String),
    #[error("invalid call request: {0}")]
    Validation(String),
}

impl FleetError {
    pub fn transport(source: impl std::fmt::Display) -> Self {
        FleetError::Transport(source.to_string())
    }

    pub fn parse(detail: impl std::fmt::Display) -> Self {
        FleetError::Parse(detail.to_string())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        FleetError::Validation(reason.into())
    }
}
