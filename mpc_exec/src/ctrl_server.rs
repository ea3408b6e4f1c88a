//! # Control Server Module
//!
//! This module abstracts over the networking side of the MPC executable. The server accepts
//! telemetry events from the simulator bridge and replies to each one with exactly one event.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    msg::{encode_event, manual_event, parse_event, Event, EventError, SteerCommand, STEER_EVENT},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};
use log::warn;

use crate::params::MpcExecParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An abstraction over the networking part of the MPC executable.
pub struct CtrlServer {
    /// REP socket which receives telemetry and sends commands
    telem_socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur in the [`CtrlServer`]
#[derive(thiserror::Error, Debug)]
pub enum CtrlServerError {
    #[error("Socket error: {0}")]
    SocketError(#[from] MonitoredSocketError),

    #[error("Could not serialise the reply: {0}")]
    SerialiseError(#[from] serde_json::Error),

    #[error("Could not send data to the client: {0}")]
    SendError(zmq::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CtrlServer {
    /// Create a new instance of the control server.
    ///
    /// This function will not wait for a connection from the client before returning.
    pub fn new(params: &MpcExecParams) -> Result<Self, CtrlServerError> {
        let ctx = zmq::Context::new();

        let telem_socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            recv_timeout: params.recv_timeout_ms,
            send_timeout: 10,
            ..Default::default()
        };

        let telem_socket = MonitoredSocket::new(
            &ctx,
            zmq::REP,
            telem_socket_options,
            &params.telemetry_endpoint,
        )?;

        Ok(Self { telem_socket })
    }

    /// Receive an event from the client.
    ///
    /// `None` is returned if nothing arrived before the receive timeout, or if the receive
    /// failed. Otherwise the user MUST reply with [`CtrlServer::send_steer`] or
    /// [`CtrlServer::send_manual`], even when the event could not be decoded.
    ///
    /// If the socket is still owed a reply from an earlier event (for example after a failed
    /// send) the manual event is sent to return the socket to its receiving state.
    pub fn get_event(&mut self) -> Option<Result<Event, EventError>> {
        let msg = match self.telem_socket.recv_msg(0) {
            Ok(m) => m,
            Err(zmq::Error::EAGAIN) => return None,
            Err(zmq::Error::EFSM) => {
                warn!("Telemetry socket is awaiting a reply, sending the manual event");
                if let Err(e) = self.send_manual() {
                    warn!("Could not recover the telemetry socket: {}", e);
                }
                return None;
            }
            Err(e) => {
                warn!("Could not receive from the telemetry socket: {}", e);
                return None;
            }
        };

        Some(match msg.as_str() {
            Some(s) => parse_event(s),
            None => Err(EventError::NotAnEvent(String::from("<non-UTF8 frame>"))),
        })
    }

    /// Reply with a steering command.
    pub fn send_steer(&mut self, cmd: &SteerCommand) -> Result<(), CtrlServerError> {
        let frame = encode_event(STEER_EVENT, cmd)?;
        self.send(&frame)
    }

    /// Reply with the manual event, used whenever there is no command to give.
    pub fn send_manual(&mut self) -> Result<(), CtrlServerError> {
        self.send(&manual_event())
    }

    /// Return if a client is connected.
    pub fn connected(&self) -> bool {
        self.telem_socket.connected()
    }

    fn send(&mut self, frame: &str) -> Result<(), CtrlServerError> {
        self.telem_socket
            .send(frame, 0)
            .map_err(CtrlServerError::SendError)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::msg::MANUAL_EVENT;

    fn server_at(endpoint: &str) -> CtrlServer {
        CtrlServer::new(&MpcExecParams {
            telemetry_endpoint: endpoint.into(),
            recv_timeout_ms: 100,
            control_period_s: 0.1,
            archive: false,
        })
        .unwrap()
    }

    fn client_at(ctx: &zmq::Context, endpoint: &str) -> zmq::Socket {
        let client = ctx.socket(zmq::REQ).unwrap();
        client.set_rcvtimeo(2000).unwrap();
        client.set_linger(0).unwrap();
        client.connect(endpoint).unwrap();
        client
    }

    /// Poll the server until an event arrives, allowing for the connection to be set up.
    fn wait_event(server: &mut CtrlServer) -> Option<Result<Event, EventError>> {
        for _ in 0..20 {
            if let Some(e) = server.get_event() {
                return Some(e);
            }
        }
        None
    }

    #[test]
    fn test_timeout_gives_none() {
        let mut server = server_at("tcp://127.0.0.1:45781");

        assert!(server.get_event().is_none());
    }

    #[test]
    fn test_unanswered_event_is_recovered() {
        let mut server = server_at("tcp://127.0.0.1:45782");
        let ctx = zmq::Context::new();
        let client = client_at(&ctx, "tcp://127.0.0.1:45782");

        client.send(r#"42["telemetry",null]"#, 0).unwrap();

        assert_eq!(wait_event(&mut server).unwrap().unwrap(), Event::Manual);

        // No reply was sent, so the next receive finds the socket still owing one
        assert!(server.get_event().is_none());

        let reply = client.recv_string(0).unwrap().unwrap();
        assert!(reply.contains(MANUAL_EVENT));

        // The socket accepts events again
        client.send(r#"42["telemetry",null]"#, 0).unwrap();
        assert!(wait_event(&mut server).is_some());
        server.send_manual().unwrap();
        assert!(client.recv_string(0).unwrap().is_ok());
    }
}
