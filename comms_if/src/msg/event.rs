//! # Event envelope
//!
//! Encoding and decoding of `42[<name>,<payload>]` frames.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;
use serde_json::Value;

use super::Telemetry;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Prefix marking a socket.io message (`4`) carrying an event (`2`).
pub const EVENT_PREFIX: &str = "42";

/// Name of the inbound telemetry event.
pub const TELEMETRY_EVENT: &str = "telemetry";

/// Name of the outbound steering event.
pub const STEER_EVENT: &str = "steer";

/// Name of the outbound event sent when there is no data to act on.
pub const MANUAL_EVENT: &str = "manual";

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A telemetry event with its payload.
    Telemetry(Telemetry),

    /// The frame carried no data, the simulator is being driven manually.
    Manual,

    /// An event the controller doesn't handle.
    Other(String),
}

/// Errors which can occur while decoding an event frame.
#[derive(thiserror::Error, Debug)]
pub enum EventError {
    #[error("The frame is not a socket.io event: {0:?}")]
    NotAnEvent(String),

    #[error("The event array is empty or its name is not a string")]
    MissingName,

    #[error("The {0} event has no payload")]
    MissingPayload(String),

    #[error("Could not parse the event JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Get the JSON array part of an event frame.
///
/// Returns `None` if the frame contains `null` anywhere, which the simulator sends when it has no
/// data, or if there is no bracketed section.
pub fn extract_payload(frame: &str) -> Option<&str> {
    if frame.contains("null") {
        return None;
    }

    let start = frame.find('[')?;
    let end = frame.rfind(']')?;

    if end < start {
        return None;
    }

    Some(&frame[start..=end])
}

/// Decode an inbound event frame.
pub fn parse_event(frame: &str) -> Result<Event, EventError> {
    if frame.len() <= EVENT_PREFIX.len() || !frame.starts_with(EVENT_PREFIX) {
        return Err(EventError::NotAnEvent(frame.to_string()));
    }

    let payload = match extract_payload(frame) {
        Some(p) => p,
        None => return Ok(Event::Manual),
    };

    let mut array: Vec<Value> = serde_json::from_str(payload)?;

    if array.is_empty() {
        return Err(EventError::MissingName);
    }

    let name = match array.remove(0) {
        Value::String(s) => s,
        _ => return Err(EventError::MissingName),
    };

    if name != TELEMETRY_EVENT {
        return Ok(Event::Other(name));
    }

    if array.is_empty() {
        return Err(EventError::MissingPayload(name));
    }

    Ok(Event::Telemetry(serde_json::from_value(array.remove(0))?))
}

/// Encode an outbound event frame.
pub fn encode_event<T: Serialize>(name: &str, payload: &T) -> Result<String, serde_json::Error> {
    Ok(format!(
        "{}{}",
        EVENT_PREFIX,
        serde_json::to_string(&(name, payload))?
    ))
}

/// The reply sent when the controller has no command to give.
pub fn manual_event() -> String {
    format!("{}[\"{}\",{{}}]", EVENT_PREFIX, MANUAL_EVENT)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::msg::SteerCommand;

    const TELEM_FRAME: &str = "42[\"telemetry\",{\"ptsx\":[-32.16173,-43.49173,-61.09],\
        \"ptsy\":[113.361,105.941,92.88499],\"psi\":3.733651,\"x\":-40.62,\"y\":108.73,\
        \"steering_angle\":0,\"throttle\":0,\"speed\":0.4380091}]";

    #[test]
    fn test_extract_payload() {
        assert_eq!(extract_payload("42[\"a\",{}]"), Some("[\"a\",{}]"));
        assert_eq!(extract_payload("42[\"telemetry\",null]"), None);
        assert_eq!(extract_payload("42"), None);
        assert_eq!(extract_payload("42]x["), None);
    }

    #[test]
    fn test_parse_telemetry() {
        let telem = match parse_event(TELEM_FRAME).unwrap() {
            Event::Telemetry(t) => t,
            e => panic!("Expected telemetry, got {:?}", e),
        };

        assert_eq!(telem.ptsx.len(), 3);
        assert_eq!(telem.ptsy.len(), 3);
        assert_eq!(telem.x, -40.62);
        assert_eq!(telem.psi, 3.733651);
        assert_eq!(telem.steering_angle, Some(0.0));
        assert_eq!(telem.throttle, Some(0.0));
    }

    #[test]
    fn test_parse_other_frames() {
        assert_eq!(parse_event("42[\"telemetry\",null]").unwrap(), Event::Manual);
        assert_eq!(
            parse_event("42[\"reset\",{}]").unwrap(),
            Event::Other("reset".into())
        );

        match parse_event("2probe") {
            Err(EventError::NotAnEvent(_)) => (),
            r => panic!("Expected NotAnEvent, got {:?}", r),
        }
        match parse_event("42[\"telemetry\"]") {
            Err(EventError::MissingPayload(_)) => (),
            r => panic!("Expected MissingPayload, got {:?}", r),
        }
        match parse_event("42[\"telemetry\",{\"x\":1.0}]") {
            Err(EventError::Json(_)) => (),
            r => panic!("Expected Json error, got {:?}", r),
        }
    }

    #[test]
    fn test_encode_steer() {
        let cmd = SteerCommand {
            steering_angle: -0.1,
            throttle: 0.3,
            next_x: vec![0.0, 5.0],
            next_y: vec![0.0, 0.5],
            mpc_x: vec![0.0],
            mpc_y: vec![0.0],
        };

        let frame = encode_event(STEER_EVENT, &cmd).unwrap();
        assert!(frame.starts_with("42[\"steer\",{"));

        let array: (String, SteerCommand) =
            serde_json::from_str(extract_payload(&frame).unwrap()).unwrap();
        assert_eq!(array.0, "steer");
        assert_eq!(array.1, cmd);
    }

    #[test]
    fn test_manual_event() {
        assert_eq!(manual_event(), "42[\"manual\",{}]");
    }
}
