//! Frame transport
//!
//! The controller only needs a reliable duplex channel of 64-byte frames.
//! [`channel`] pairs two endpoints in memory; [`stream`] runs over any byte
//! stream (TCP socket, serial device file).

pub mod channel;
pub mod stream;

use serde::Serialize;

use crate::error::TransportError;
use crate::protocol::Frame;

pub use channel::ChannelTransport;
pub use stream::StreamTransport;

/// Duplex frame channel
pub trait Transport {
    /// Send one frame without waiting
    ///
    /// Failures are reported, never retried at this layer.
    fn send(&mut self, frame: &Frame) -> Result<(), TransportError>;

    /// Receive one frame if a complete one is available; never blocks
    fn try_receive(&mut self) -> Option<Frame>;

    fn stats(&self) -> TransportStats;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, frame: &Frame) -> Result<(), TransportError> {
        (**self).send(frame)
    }

    fn try_receive(&mut self) -> Option<Frame> {
        (**self).try_receive()
    }

    fn stats(&self) -> TransportStats {
        (**self).stats()
    }
}

/// Transport statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransportStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    /// Frames refused because the link could not take them yet
    pub busy_sends: u64,
    pub send_failures: u64,
}

impl TransportStats {
    pub(crate) fn record_send(&mut self, result: &Result<(), TransportError>) {
        match result {
            Ok(()) => self.frames_sent += 1,
            Err(TransportError::Busy) => self.busy_sends += 1,
            Err(_) => self.send_failures += 1,
        }
    }
}
