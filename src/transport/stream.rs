//! Frame transport over a byte stream
//!
//! The stream is expected to be non-blocking (`TcpStream::set_nonblocking`).
//! Reads accumulate until a whole frame is buffered. Sends never wait: a
//! frame the socket will not take at all is refused with
//! [`TransportError::Busy`]. A frame that went out partway counts as sent; its
//! tail is written before anything else so the peer never sees a torn frame
//! boundary.

use bytes::{Buf, BytesMut};
use std::io::{ErrorKind, Read, Write};

use super::{Transport, TransportStats};
use crate::constants::FRAME_SIZE;
use crate::error::TransportError;
use crate::protocol::Frame;

const READ_CHUNK: usize = FRAME_SIZE * 8;

pub struct StreamTransport<S> {
    stream: S,
    rx_buf: BytesMut,
    tx_pending: BytesMut,
    closed: bool,
    stats: TransportStats,
}

impl<S: Read + Write> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            rx_buf: BytesMut::with_capacity(READ_CHUNK),
            tx_pending: BytesMut::with_capacity(FRAME_SIZE),
            closed: false,
            stats: TransportStats::default(),
        }
    }

    /// True once the peer closed the stream or it failed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    fn fill(&mut self) {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    tracing::info!("Stream closed by peer");
                    self.closed = true;
                    return;
                }
                Ok(n) => {
                    self.rx_buf.extend_from_slice(&chunk[..n]);
                    if self.rx_buf.len() >= FRAME_SIZE {
                        return;
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!("Stream read failed: {}", e);
                    self.closed = true;
                    return;
                }
            }
        }
    }

    /// Write as much of the pending bytes as the socket takes right now
    fn flush_pending(&mut self) -> Result<(), TransportError> {
        while !self.tx_pending.is_empty() {
            match self.stream.write(&self.tx_pending) {
                Ok(0) => {
                    self.closed = true;
                    return Err(TransportError::Unavailable);
                }
                Ok(n) => self.tx_pending.advance(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Err(TransportError::Busy),
                Err(e) => {
                    tracing::warn!("Stream write failed: {}", e);
                    self.closed = true;
                    return Err(TransportError::Unavailable);
                }
            }
        }
        match self.stream.flush() {
            Err(e) if e.kind() != ErrorKind::WouldBlock => {
                self.closed = true;
                Err(TransportError::Io(e))
            }
            _ => Ok(()),
        }
    }

    fn send_frame(&mut self, frame: &Frame) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Unavailable);
        }
        self.flush_pending()?;

        self.tx_pending.extend_from_slice(frame.as_bytes());
        match self.flush_pending() {
            // Nothing of this frame went out; refuse it rather than queue it
            Err(TransportError::Busy) if self.tx_pending.len() == FRAME_SIZE => {
                self.tx_pending.clear();
                Err(TransportError::Busy)
            }
            Err(TransportError::Busy) => Ok(()),
            other => other,
        }
    }
}

impl<S: Read + Write> Transport for StreamTransport<S> {
    fn send(&mut self, frame: &Frame) -> Result<(), TransportError> {
        let result = self.send_frame(frame);
        self.stats.record_send(&result);
        result
    }

    fn try_receive(&mut self) -> Option<Frame> {
        if self.rx_buf.len() < FRAME_SIZE && !self.closed {
            self.fill();
        }
        if self.rx_buf.len() < FRAME_SIZE {
            return None;
        }
        let bytes = self.rx_buf.split_to(FRAME_SIZE);
        let frame = Frame::from_slice(&bytes)?;
        self.stats.frames_received += 1;
        Some(frame)
    }

    fn stats(&self) -> TransportStats {
        self.stats
    }
}
