//! # Control Server Module
//!
//! This module abstracts over the networking side of the platform executable. Clients send
//! [`PlatRequest`]s on a REP socket and each one is answered with a [`PlatResponse`]. The progress
//! of a running program is published on a PUB socket.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Arc, Mutex};

use comms_if::{
    net::{zmq, ConnectionMonitor, MonitoredSocket, MonitoredSocketError, SocketOptions},
    plat::{PlatProgress, PlatRequest, PlatResponse},
};
use log::{debug, info, warn};

use crate::{
    auto::{ProgressSink, SinkError},
    control_state::lock,
    params::PlatExecParams,
    plat_ctrl::{ManualSession, PlatCtrl, SessionError},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Serves the requests of one client at a time.
pub struct CtrlServer {
    /// REP socket which accepts requests from the client
    req_socket: MonitoredSocket,

    /// PUB socket on which program progress is published
    progress_socket: Arc<Mutex<MonitoredSocket>>,

    handler: RequestHandler,

    /// Whether a client was connected when last checked
    was_connected: bool,
}

/// Executes requests against the platform, holding the client's manual session.
pub struct RequestHandler {
    plat: PlatCtrl,
    manual: Option<ManualSession>,
}

/// Publishes the progress of a program on the progress socket.
///
/// The peer is considered connected for as long as a client is connected to the request socket.
pub struct PubSink {
    socket: Arc<Mutex<MonitoredSocket>>,
    client: ConnectionMonitor,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur in the [`CtrlServer`]
#[derive(thiserror::Error, Debug)]
pub enum CtrlServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not receive a request from the client: {0}")]
    RecvError(zmq::Error),

    #[error("Could not send data to the client: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialise the response: {0}")]
    SerialiseError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CtrlServer {

    /// Create a new instance of the control server.
    ///
    /// This function will not wait for a connection from a client before returning. A client is
    /// considered gone once it misses its heartbeats.
    pub fn new(params: &PlatExecParams, plat: PlatCtrl) -> Result<Self, CtrlServerError> {

        let ctx = zmq::Context::new();

        let req_socket_options = SocketOptions {
            recv_timeout: params.request_timeout_ms,
            send_timeout: 10,
            heartbeat_ivl: params.heartbeat_ivl_ms,
            heartbeat_timeout: params.heartbeat_timeout_ms,
            ..Default::default()
        };
        let progress_socket_options = SocketOptions {
            send_timeout: 10,
            ..Default::default()
        };

        let req_socket = MonitoredSocket::bind(
            &ctx,
            zmq::REP,
            &req_socket_options,
            &params.request_endpoint
        )?;
        let progress_socket = MonitoredSocket::bind(
            &ctx,
            zmq::PUB,
            &progress_socket_options,
            &params.progress_endpoint
        )?;

        info!(
            "Serving requests on {}, progress on {}",
            req_socket.endpoint(), progress_socket.endpoint()
        );

        Ok(Self {
            req_socket,
            progress_socket: Arc::new(Mutex::new(progress_socket)),
            handler: RequestHandler::new(plat),
            was_connected: false,
        })
    }

    /// Serve requests until a fatal error occurs.
    ///
    /// A response which can't be sent is not fatal, the client will time out and retry.
    pub fn run(&mut self) -> Result<(), CtrlServerError> {
        loop {
            match self.serve_once() {
                Ok(()) => (),
                Err(CtrlServerError::SendError(e)) => {
                    warn!("Couldn't send response to client: {}", e)
                },
                Err(e) => return Err(e)
            }
        }
    }

    /// Wait for one request and answer it.
    ///
    /// Returns without answering if no request arrives before the receive timeout. The client's
    /// sessions are torn down once it disconnects.
    pub fn serve_once(&mut self) -> Result<(), CtrlServerError> {
        let msg = match self.req_socket.recv_msg(0) {
            Ok(m) => Some(m),
            Err(zmq::Error::EAGAIN) => None,
            Err(e) => return Err(CtrlServerError::RecvError(e))
        };

        self.check_connection();

        let msg = match msg {
            Some(m) => m,
            None => return Ok(())
        };

        let response = match msg.as_str() {
            Some(s) => match serde_json::from_str::<PlatRequest>(s) {
                Ok(req) => {
                    let sink = self.progress_sink();
                    self.handler.handle(req, move || Box::new(sink) as Box<dyn ProgressSink>)
                },
                Err(e) => {
                    warn!("Could not deserialize request: {}", e);
                    PlatResponse::Invalid(e.to_string())
                }
            },
            None => PlatResponse::Invalid("Request is not valid UTF-8".into())
        };

        let resp_str = serde_json::to_string(&response)
            .map_err(CtrlServerError::SerialiseError)?;

        self.req_socket.send(&resp_str, 0).map_err(CtrlServerError::SendError)
    }

    /// A sink publishing on this server's progress socket.
    pub fn progress_sink(&self) -> PubSink {
        PubSink {
            socket: self.progress_socket.clone(),
            client: self.req_socket.connection_monitor(),
        }
    }

    fn check_connection(&mut self) {
        let connected = self.req_socket.connected();

        if connected && !self.was_connected {
            info!("Client connected");
        }
        else if !connected && self.was_connected {
            info!("Client disconnected");
            self.handler.peer_disconnected();
        }

        self.was_connected = connected;
    }
}

impl From<MonitoredSocketError> for CtrlServerError {
    fn from(e: MonitoredSocketError) -> Self {
        CtrlServerError::SocketError(e)
    }
}

impl RequestHandler {
    pub fn new(plat: PlatCtrl) -> Self {
        Self {
            plat,
            manual: None,
        }
    }

    /// True if this client holds an active manual session.
    pub fn has_manual_session(&self) -> bool {
        self.manual.as_ref().map(|s| s.is_active()).unwrap_or(false)
    }

    /// Execute a request.
    ///
    /// `make_sink` is only called when an automatic session is started.
    pub fn handle<F>(&mut self, req: PlatRequest, make_sink: F) -> PlatResponse
    where
        F: FnOnce() -> Box<dyn ProgressSink>
    {
        debug!("Request: {:?}", req);

        match req {
            PlatRequest::GetStatus => PlatResponse::Status(self.plat.get_status()),
            PlatRequest::SetMode(mode) => {
                if let Err(e) = self.plat.set_mode(mode) {
                    match e {}
                }

                if !self.has_manual_session() {
                    self.manual = None;
                }

                PlatResponse::Ok
            },
            PlatRequest::UploadProgram(program) => match self.plat.upload_program(&program) {
                Ok(n) => PlatResponse::Steps(n),
                Err(e) => rejected(e)
            },
            PlatRequest::Stop => {
                self.plat.request_stop();
                PlatResponse::Ok
            },
            PlatRequest::ConnectManual => {
                if self.has_manual_session() {
                    return PlatResponse::Ok
                }

                match self.plat.begin_manual_session() {
                    Ok(s) => {
                        self.manual = Some(s);
                        PlatResponse::Ok
                    },
                    Err(e) => rejected(e)
                }
            },
            PlatRequest::Drive(cmd) => {
                let result = match self.manual.as_ref() {
                    Some(s) => s.set_target(cmd),
                    None => return PlatResponse::Rejected("No manual session".into())
                };

                match result {
                    Ok(()) => PlatResponse::Ok,
                    Err(SessionError::Revoked) => {
                        self.manual = None;
                        rejected(SessionError::Revoked)
                    },
                    Err(e) => rejected(e)
                }
            },
            PlatRequest::StartAuto => match self.plat.begin_automatic_session(make_sink()) {
                Ok(()) => PlatResponse::Ok,
                Err(e) => rejected(e)
            },
            PlatRequest::Disconnect => {
                self.end_sessions();
                PlatResponse::Ok
            },
        }
    }

    /// Tear down the sessions of a client which has gone away.
    pub fn peer_disconnected(&mut self) {
        if self.manual.is_some() || self.plat.session_active() {
            warn!("Client lost, ending its sessions");
        }
        self.end_sessions();
    }

    fn end_sessions(&mut self) {
        if let Some(s) = self.manual.take() {
            s.end();
        }
        self.plat.end_automatic_session();
    }
}

impl ProgressSink for PubSink {
    fn send_progress(&mut self, progress: f64) -> Result<(), SinkError> {
        if !self.client.connected() {
            return Err(SinkError::Disconnected)
        }
        self.publish(&PlatProgress::Progress(progress))
    }

    fn is_connected(&self) -> bool {
        self.client.connected()
    }

    fn close(&mut self) {
        if let Err(e) = self.publish(&PlatProgress::Finished) {
            warn!("Could not publish program completion: {}", e);
        }
    }
}

impl PubSink {
    fn publish(&self, msg: &PlatProgress) -> Result<(), SinkError> {
        let msg_str = serde_json::to_string(msg)
            .map_err(|e| SinkError::SendFailed(e.to_string()))?;

        lock(&self.socket)
            .send(&msg_str, zmq::DONTWAIT)
            .map_err(|e| SinkError::SendFailed(e.to_string()))
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn rejected<E: std::fmt::Display>(e: E) -> PlatResponse {
    info!("Request rejected: {}", e);
    PlatResponse::Rejected(e.to_string())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        auto::{ChannelSink, ProfileCompiler, ProfileParams},
        control_state::ControlState,
        drive_ctrl,
        motor_driver::SimDriver,
    };
    use comms_if::plat::{Direction, HighLevelInstruction, MotorCommand, PlatformMode, Track};
    use std::sync::mpsc::channel;

    fn handler() -> RequestHandler {
        let control = Arc::new(ControlState::new(Box::new(SimDriver::new())));
        let compiler = ProfileCompiler::new(
            ProfileParams::default(),
            &drive_ctrl::Params::default()
        ).unwrap();

        RequestHandler::new(PlatCtrl::new(control, compiler))
    }

    fn no_sink() -> Box<dyn ProgressSink> {
        panic!("No sink expected")
    }

    #[test]
    fn test_manual_requests() {
        let mut h = handler();
        let cmd = MotorCommand::new(40.0, Direction::Forward, Track::Left);

        assert!(matches!(h.handle(PlatRequest::Drive(cmd), no_sink), PlatResponse::Rejected(_)));
        assert!(matches!(
            h.handle(PlatRequest::ConnectManual, no_sink),
            PlatResponse::Rejected(_)
        ));

        assert_eq!(
            h.handle(PlatRequest::SetMode(PlatformMode::ManualControl), no_sink),
            PlatResponse::Ok
        );
        assert_eq!(h.handle(PlatRequest::ConnectManual, no_sink), PlatResponse::Ok);
        assert!(h.has_manual_session());
        assert_eq!(h.handle(PlatRequest::Drive(cmd), no_sink), PlatResponse::Ok);

        match h.handle(PlatRequest::GetStatus, no_sink) {
            PlatResponse::Status(s) => assert_eq!(s.current_target_left, Some(cmd)),
            r => panic!("Unexpected response {:?}", r)
        }

        // Leaving manual mode drops the session
        h.handle(PlatRequest::SetMode(PlatformMode::None), no_sink);
        assert!(!h.has_manual_session());
        assert!(matches!(h.handle(PlatRequest::Drive(cmd), no_sink), PlatResponse::Rejected(_)));
    }

    #[test]
    fn test_program_requests() {
        let mut h = handler();
        let program = vec![
            HighLevelInstruction::straight_time(30.0, Direction::Forward),
        ];

        h.handle(PlatRequest::SetMode(PlatformMode::AutomaticControl), no_sink);
        assert!(matches!(
            h.handle(PlatRequest::UploadProgram(vec![]), no_sink),
            PlatResponse::Rejected(_)
        ));
        assert_eq!(h.handle(PlatRequest::UploadProgram(program), no_sink), PlatResponse::Steps(3));

        let (tx, rx) = channel();
        let resp = h.handle(
            PlatRequest::StartAuto,
            move || Box::new(ChannelSink::new(tx)) as Box<dyn ProgressSink>
        );
        assert_eq!(resp, PlatResponse::Ok);
        assert_eq!(rx.recv().unwrap(), PlatProgress::Progress(0.0));

        h.peer_disconnected();
        assert!(!h.plat.session_active());
        assert_eq!(h.plat.control().target.get().left, Some(MotorCommand::stop(Track::Left)));
    }

    #[test]
    fn test_disconnect_ends_manual_session() {
        let mut h = handler();

        h.handle(PlatRequest::SetMode(PlatformMode::ManualControl), no_sink);
        h.handle(PlatRequest::ConnectManual, no_sink);
        h.handle(
            PlatRequest::Drive(MotorCommand::new(90.0, Direction::Backward, Track::Right)),
            no_sink
        );

        assert_eq!(h.handle(PlatRequest::Disconnect, no_sink), PlatResponse::Ok);
        assert!(!h.plat.session_active());
        assert_eq!(
            h.plat.control().target.get().right,
            Some(MotorCommand::stop(Track::Right))
        );
    }
}
