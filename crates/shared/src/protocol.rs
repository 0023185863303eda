use serde::{Deserialize, Serialize};

use crate::{
    domain::{Car, Direction},
    error::FleetError,
};

pub const STATUS_UPDATE_TYPE: &str = "STATUS_UPDATE";

/// Body of `GET /api/elevators/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub elevators: Vec<Car>,
}

/// Body of `POST /api/elevators/call`. The ack body is ignored by the core
/// beyond HTTP success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallBody {
    pub floor: i64,
    pub direction: Direction,
}

/// The two push shapes seen on the realtime channel: a typed envelope or a
/// bare car array (named-event transports deliver the payload directly).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum StatusPush {
    Enveloped {
        #[serde(rename = "type")]
        kind: String,
        data: Vec<Car>,
    },
    Bare(Vec<Car>),
}

/// Normalize one inbound text frame into a snapshot. Non-JSON frames and
/// envelopes of any other type are parse errors; the caller drops the
/// message and keeps prior state.
pub fn decode_snapshot(text: &str) -> Result<Vec<Car>, FleetError> {
    match serde_json::from_str::<StatusPush>(text).map_err(FleetError::parse)? {
        StatusPush::Enveloped { kind, data } => {
            if kind == STATUS_UPDATE_TYPE {
                Ok(data)
            } else {
                Err(FleetError::parse(format!("unexpected push type {kind:?}")))
            }
        }
        StatusPush::Bare(cars) => Ok(cars),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CarId;

    const CAR_JSON: &str = r#"{"id":3,"currentFloor":7,"direction":1,"doorOpen":true,"targets":[9]}"#;

    #[test]
    fn decodes_enveloped_push() {
        let text = format!(r#"{{"type":"STATUS_UPDATE","data":[{CAR_JSON}]}}"#);
        let cars = decode_snapshot(&text).unwrap();
        assert_eq!(cars.len(), 1);
        assert_eq!(cars[0].id, CarId(3));
        assert_eq!(cars[0].current_floor, 7);
    }

    #[test]
    fn decodes_bare_array_push() {
        let text = format!("[{CAR_JSON}]");
        let cars = decode_snapshot(&text).unwrap();
        assert_eq!(cars.len(), 1);
        assert_eq!(cars[0].targets, vec![9]);
    }

    #[test]
    fn rejects_wrong_envelope_type() {
        let text = format!(r#"{{"type":"HEARTBEAT","data":[{CAR_JSON}]}}"#);
        let err = decode_snapshot(&text).unwrap_err();
        assert!(matches!(err, FleetError::Parse(_)));
    }

    #[test]
    fn rejects_non_json_frame() {
        assert!(matches!(
            decode_snapshot("not json"),
            Err(FleetError::Parse(_))
        ));
    }

    #[test]
    fn call_body_serializes_direction_as_integer() {
        let body = CallBody {
            floor: 5,
            direction: Direction::Up,
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"floor":5,"direction":1}"#
        );
    }
}
