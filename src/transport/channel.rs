//! In-memory transport over crossbeam channels

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};

use super::{Transport, TransportStats};
use crate::error::TransportError;
use crate::protocol::Frame;

/// One end of an in-memory frame link
pub struct ChannelTransport {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
    stats: TransportStats,
}

impl ChannelTransport {
    /// Two connected endpoints with unbounded buffering
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = unbounded();
        let (b_tx, a_rx) = unbounded();
        (Self::new(a_tx, a_rx), Self::new(b_tx, b_rx))
    }

    /// Two connected endpoints holding at most `capacity` frames in flight per
    /// direction; a full link refuses the frame with [`TransportError::Busy`]
    pub fn bounded_pair(capacity: usize) -> (Self, Self) {
        let (a_tx, b_rx) = bounded(capacity);
        let (b_tx, a_rx) = bounded(capacity);
        (Self::new(a_tx, a_rx), Self::new(b_tx, b_rx))
    }

    fn new(tx: Sender<Frame>, rx: Receiver<Frame>) -> Self {
        Self {
            tx,
            rx,
            stats: TransportStats::default(),
        }
    }

    /// Frames waiting to be received on this end
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, frame: &Frame) -> Result<(), TransportError> {
        let result = self.tx.try_send(*frame).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::Busy,
            TrySendError::Disconnected(_) => TransportError::Unavailable,
        });
        self.stats.record_send(&result);
        result
    }

    fn try_receive(&mut self) -> Option<Frame> {
        let frame = self.rx.try_recv().ok()?;
        self.stats.frames_received += 1;
        Some(frame)
    }

    fn stats(&self) -> TransportStats {
        self.stats
    }
}
