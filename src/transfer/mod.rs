//! Bulk transfer state machines
//!
//! Session enumeration and icon transfer are acknowledged multi-frame
//! exchanges. At most one runs at a time; the dispatch loop defers every
//! other host frame until it finishes.
//!
//! ```text
//! Idle ──EnumerationInit{n}──▶ ReceivingSessionEnumeration ──n records──▶ Idle
//!   │                              ▲ SessionDataChunk / Ack
//!   └───IconInit{id,p,b}────▶ ReceivingIcon ──p chunks, inflate──▶ Idle
//!                                  ▲ IconDataChunk / Ack
//! ```

pub mod enumeration;
pub mod icon;

use serde::Serialize;

use crate::codec::IconBitmap;
use crate::error::{ProtocolViolation, TransferError};
use crate::protocol::{AckKind, Message, MessageType, SessionId, SessionRecord};

pub use enumeration::EnumerationReceiver;
pub use icon::IconReceiver;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BulkTransferState {
    #[default]
    Idle,
    ReceivingSessionEnumeration(EnumerationReceiver),
    ReceivingIcon(IconReceiver),
}

/// A finished transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completed {
    Sessions(Vec<SessionRecord>),
    Icon { session: SessionId, icon: IconBitmap },
}

/// Result of feeding one frame to the transfer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Step {
    /// Acknowledge to send back
    pub ack: Option<Message<'static>>,
    pub completed: Option<Completed>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    pub enumerations_completed: u64,
    pub icons_completed: u64,
    pub chunks_received: u64,
}

#[derive(Debug, Default)]
pub struct BulkTransfer {
    state: BulkTransferState,
    stats: TransferStats,
}

impl BulkTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &BulkTransferState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != BulkTransferState::Idle
    }

    pub fn stats(&self) -> TransferStats {
        self.stats
    }

    /// Handle an EnumerationInit; the caller guarantees no transfer is active
    pub fn begin_enumeration(&mut self, count: u8) -> Step {
        debug_assert!(!self.is_active());
        let receiver = EnumerationReceiver::new(count);
        tracing::debug!("Enumeration of {} sessions started", receiver.expected());

        let ack = Some(ack(0, AckKind::Sessions));
        if receiver.is_complete() {
            self.stats.enumerations_completed += 1;
            return Step {
                ack,
                completed: Some(Completed::Sessions(Vec::new())),
            };
        }
        self.state = BulkTransferState::ReceivingSessionEnumeration(receiver);
        Step { ack, completed: None }
    }

    /// Handle an IconInit; the caller guarantees no transfer is active
    pub fn begin_icon(
        &mut self,
        session: SessionId,
        packet_count: u32,
        byte_count: u32,
    ) -> Result<Step, ProtocolViolation> {
        debug_assert!(!self.is_active());
        let receiver = IconReceiver::new(session, packet_count, byte_count)?;
        tracing::debug!(
            "Icon transfer for {} started: {} packets, {} bytes",
            session,
            packet_count,
            byte_count
        );
        self.state = BulkTransferState::ReceivingIcon(receiver);
        Ok(Step {
            ack: Some(ack(0, AckKind::Icon)),
            completed: None,
        })
    }

    /// Feed a SessionDataChunk or IconDataChunk
    pub fn on_chunk(&mut self, message: &Message<'_>) -> Result<Step, TransferError> {
        match (std::mem::take(&mut self.state), message) {
            (
                BulkTransferState::ReceivingSessionEnumeration(mut receiver),
                Message::SessionDataChunk { first, second },
            ) => {
                receiver.accept(first.clone(), second.clone());
                self.stats.chunks_received += 1;
                let ack = Some(ack(receiver.chunks() as u8, AckKind::Sessions));
                if !receiver.is_complete() {
                    self.state = BulkTransferState::ReceivingSessionEnumeration(receiver);
                    return Ok(Step { ack, completed: None });
                }
                self.stats.enumerations_completed += 1;
                Ok(Step {
                    ack,
                    completed: Some(Completed::Sessions(receiver.into_records())),
                })
            }
            (BulkTransferState::ReceivingIcon(mut receiver), Message::IconDataChunk { bytes }) => {
                receiver.accept(bytes);
                self.stats.chunks_received += 1;
                let ack = Some(ack(receiver.received_packets() as u8, AckKind::Icon));
                if !receiver.is_complete() {
                    self.state = BulkTransferState::ReceivingIcon(receiver);
                    return Ok(Step { ack, completed: None });
                }
                let (session, icon) = receiver.finish()?;
                self.stats.icons_completed += 1;
                Ok(Step {
                    ack,
                    completed: Some(Completed::Icon { session, icon }),
                })
            }
            (state, message) => {
                self.state = state;
                Err(ProtocolViolation::UnexpectedChunk(message.message_type()).into())
            }
        }
    }

    /// Whether a frame of this type may be handled now or must wait
    pub fn accepts(&self, message_type: MessageType) -> bool {
        !self.is_active() || message_type.is_bulk_chunk()
    }
}

fn ack(count: u8, kind: AckKind) -> Message<'static> {
    Message::Acknowledge { count, kind }
}
