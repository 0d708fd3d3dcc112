//! # Progress sinks
//!
//! A running program reports its progress to the client which started it. The sink also tells
//! the sequencer when that client has gone away, in which case the run is abandoned.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::mpsc::Sender;

use comms_if::plat::PlatProgress;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Receiver of the progress of a program run.
pub trait ProgressSink: Send {
    /// Report the fraction of the program started so far, between 0 and 1.
    fn send_progress(&mut self, progress: f64) -> Result<(), SinkError>;

    /// False once the peer has gone away.
    fn is_connected(&self) -> bool;

    /// Tell the peer the program has completed.
    fn close(&mut self);
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Sink forwarding progress over an mpsc channel.
///
/// The peer is considered gone once the receiving end has been dropped.
pub struct ChannelSink {
    sender: Sender<PlatProgress>,
    connected: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("The progress peer has disconnected")]
    Disconnected,

    #[error("Could not send progress: {0}")]
    SendFailed(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ChannelSink {
    pub fn new(sender: Sender<PlatProgress>) -> Self {
        Self {
            sender,
            connected: true,
        }
    }
}

impl ProgressSink for ChannelSink {
    fn send_progress(&mut self, progress: f64) -> Result<(), SinkError> {
        self.sender.send(PlatProgress::Progress(progress)).map_err(|_| {
            self.connected = false;
            SinkError::Disconnected
        })
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn close(&mut self) {
        if self.sender.send(PlatProgress::Finished).is_err() {
            self.connected = false;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn test_channel_sink() {
        let (tx, rx) = channel();
        let mut sink = ChannelSink::new(tx);

        sink.send_progress(0.5).unwrap();
        sink.close();
        assert_eq!(rx.recv().unwrap(), PlatProgress::Progress(0.5));
        assert_eq!(rx.recv().unwrap(), PlatProgress::Finished);

        drop(rx);
        assert!(sink.send_progress(1.0).is_err());
        assert!(!sink.is_connected());
    }
}
