//! # Network Module
//!
//! Server side sockets over ZMQ. The platform only ever binds, clients connect to it, and it
//! needs to know when its client has gone so that the client's session can be ended.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread,
};
use zmq::{Context, Socket, SocketEvent, SocketType};
use log::{debug, warn};

// Export zmq
pub use zmq;

// ------------------------------------------------------------------------------------------------
// STATICS
// ------------------------------------------------------------------------------------------------

/// Number of monitors created so far, gives each monitor a unique inproc endpoint.
static NUM_MONITORS: AtomicUsize = AtomicUsize::new(0);

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Receive timeout of the monitor socket. Dropping a socket waits up to this long for its
/// monitor thread to exit.
const MONITOR_RECV_TIMEOUT_MS: i32 = 100;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A bound zmq socket which counts its connected peers.
///
/// A background thread reads the socket's monitor events, counting accepted connections up and
/// disconnections down.
pub struct MonitoredSocket {
    socket: Socket,

    endpoint: String,

    join_handle: Option<thread::JoinHandle<()>>,

    shutdown: Arc<AtomicBool>,

    peers: Arc<AtomicUsize>,
}

/// A cloneable, thread safe view of a [`MonitoredSocket`]'s connection state.
#[derive(Clone, Debug)]
pub struct ConnectionMonitor {
    peers: Arc<AtomicUsize>,
}

/// Options set on a [`MonitoredSocket`] before it is bound.
///
/// Times are in milliseconds, see
/// [`zmq_setsockopt`](http://api.zeromq.org/4-2:zmq-setsockopt) for their meaning.
#[derive(Debug, Clone)]
pub struct SocketOptions {

    /// `ZMQ_LINGER`: how long pending messages are kept after the socket is closed
    pub linger: i32,

    /// `ZMQ_RCVTIMEO`: maximum time before a recv returns with `EAGAIN`, -1 blocks
    pub recv_timeout: i32,

    /// `ZMQ_SNDTIMEO`: maximum time before a send returns with `EAGAIN`, -1 blocks
    pub send_timeout: i32,

    /// `ZMQ_HEARTBEAT_IVL`: interval between ZMTP heartbeats, 0 disables them.
    ///
    /// Without heartbeats a peer which vanishes without closing its connection (a dropped wifi
    /// link for example) is never reported as disconnected.
    pub heartbeat_ivl: i32,

    /// `ZMQ_HEARTBEAT_TIMEOUT`: time without traffic after a heartbeat before the connection is
    /// closed
    pub heartbeat_timeout: i32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum MonitoredSocketError {
    #[error("Error creating the socket: {0}")]
    CreateSocketError(zmq::Error),

    #[error("Error enabling monitoring for the socket: {0}")]
    MonitoringEnableError(zmq::Error),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(&'static str, zmq::Error),

    #[error("Could not bind the socket to {0}: {1}")]
    BindError(String, zmq::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MonitoredSocket {
    /// Create a socket of the given type and bind it to `endpoint`.
    ///
    /// Returns as soon as the socket is bound, without waiting for a peer.
    pub fn bind(
        ctx: &Context,
        socket_type: SocketType,
        options: &SocketOptions,
        endpoint: &str
    ) -> Result<Self, MonitoredSocketError> {
        let socket = ctx.socket(socket_type)
            .map_err(MonitoredSocketError::CreateSocketError)?;

        // The monitor must be connected before the socket is bound or early events are lost
        let monitor_endpoint = format!(
            "inproc://monitor_{}",
            NUM_MONITORS.fetch_add(1, Ordering::Relaxed)
        );
        let events = SocketEvent::ACCEPTED as i32 | SocketEvent::DISCONNECTED as i32;
        socket.monitor(&monitor_endpoint, events)
            .map_err(MonitoredSocketError::MonitoringEnableError)?;

        let monitor = ctx.socket(zmq::PAIR)
            .map_err(MonitoredSocketError::CreateSocketError)?;
        monitor.set_rcvtimeo(MONITOR_RECV_TIMEOUT_MS)
            .map_err(|e| MonitoredSocketError::SocketOptionError("rcvtimeo", e))?;
        monitor.connect(&monitor_endpoint)
            .map_err(MonitoredSocketError::MonitoringEnableError)?;

        options.apply(&socket)?;

        socket.bind(endpoint)
            .map_err(|e| MonitoredSocketError::BindError(endpoint.into(), e))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let peers = Arc::new(AtomicUsize::new(0));

        let join_handle = {
            let shutdown = shutdown.clone();
            let peers = peers.clone();
            let endpoint = endpoint.to_string();
            thread::spawn(move || monitor_socket(monitor, &endpoint, &shutdown, &peers))
        };

        debug!("Socket bound to {}", endpoint);

        Ok(Self {
            socket,
            endpoint: endpoint.into(),
            join_handle: Some(join_handle),
            shutdown,
            peers,
        })
    }

    /// The endpoint this socket is bound to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Return if at least one peer is connected to the socket.
    pub fn connected(&self) -> bool {
        self.num_peers() > 0
    }

    /// Return the number of peers currently connected to the socket.
    pub fn num_peers(&self) -> usize {
        self.peers.load(Ordering::Relaxed)
    }

    /// Get a handle which tracks the connection state of this socket from another thread.
    pub fn connection_monitor(&self) -> ConnectionMonitor {
        ConnectionMonitor {
            peers: self.peers.clone(),
        }
    }
}

impl ConnectionMonitor {
    /// Return if at least one peer is connected to the monitored socket.
    pub fn connected(&self) -> bool {
        self.peers.load(Ordering::Relaxed) > 0
    }
}

impl Drop for MonitoredSocket {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        if let Some(jh) = self.join_handle.take() {
            jh.join().ok();
        }
    }
}

impl std::ops::Deref for MonitoredSocket {
    type Target = Socket;

    fn deref(&self) -> &Self::Target {
        &self.socket
    }
}

impl std::ops::DerefMut for MonitoredSocket {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.socket
    }
}

impl SocketOptions {
    /// Set these options on the given socket.
    pub fn apply(&self, socket: &Socket) -> Result<(), MonitoredSocketError> {
        socket.set_linger(self.linger).map_err(opt_err("linger"))?;
        socket.set_rcvtimeo(self.recv_timeout).map_err(opt_err("rcvtimeo"))?;
        socket.set_sndtimeo(self.send_timeout).map_err(opt_err("sndtimeo"))?;
        socket.set_heartbeat_ivl(self.heartbeat_ivl).map_err(opt_err("heartbeat_ivl"))?;
        socket.set_heartbeat_timeout(self.heartbeat_timeout)
            .map_err(opt_err("heartbeat_timeout"))?;

        Ok(())
    }
}

impl Default for SocketOptions {
    fn default() -> Self {
        // zmq's own defaults, except linger which is shortened so the executable can exit
        // while a client is unreachable
        Self {
            linger: 1000,
            recv_timeout: -1,
            send_timeout: -1,
            heartbeat_ivl: 0,
            heartbeat_timeout: 0,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn opt_err(name: &'static str) -> impl Fn(zmq::Error) -> MonitoredSocketError {
    move |e| MonitoredSocketError::SocketOptionError(name, e)
}

/// Read an event from a monitor socket.
///
/// Each event is two frames, the event id and value followed by the peer address.
fn read_event(monitor: &Socket) -> Result<SocketEvent, zmq::Error> {
    let msg = monitor.recv_msg(0)?;

    if msg.len() < 2 || !monitor.get_rcvmore()? {
        return Err(zmq::Error::EPROTO)
    }

    // Drop the address frame
    monitor.recv_msg(0)?;

    Ok(SocketEvent::from_raw(u16::from_ne_bytes([msg[0], msg[1]])))
}

/// Monitor thread, tracks the number of connected peers until shutdown is requested.
fn monitor_socket(
    monitor: Socket,
    endpoint: &str,
    shutdown: &AtomicBool,
    peers: &AtomicUsize
) {
    while !shutdown.load(Ordering::Relaxed) {
        let event = match read_event(&monitor) {
            Ok(e) => e,
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) => {
                warn!("Stopped monitoring {}: {}", endpoint, e);
                break
            }
        };

        match event {
            SocketEvent::ACCEPTED => {
                let n = peers.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("Peer connected on {} ({} connected)", endpoint, n);
            },
            SocketEvent::DISCONNECTED => {
                let prev = peers
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |p| Some(p.saturating_sub(1)))
                    .unwrap_or(0);
                debug!(
                    "Peer disconnected on {} ({} connected)",
                    endpoint,
                    prev.saturating_sub(1)
                );
            },
            _ => ()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_peer_counting() {
        let ctx = zmq::Context::new();
        let server = MonitoredSocket::bind(
            &ctx,
            zmq::REP,
            &SocketOptions::default(),
            "inproc://test_peer_counting"
        ).unwrap();
        assert!(!server.connected());
        assert_eq!(server.endpoint(), "inproc://test_peer_counting");

        let monitor = server.connection_monitor();
        assert!(!monitor.connected());
    }
}
