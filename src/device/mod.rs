//! Controller dispatch loop
//!
//! A single-threaded cooperative loop. Each [`DispatchLoop::tick`] runs every
//! handler to completion without blocking:
//!
//! 1. sample faders and apply queued input events
//! 2. schedule bulk requests (one outstanding, retried on a timer)
//! 3. flush up to `max_frames_out_per_tick` outbound frames
//! 4. replay one deferred frame if no transfer is running
//! 5. receive and dispatch one inbound frame
//!
//! Any [`FatalError`] moves the device into [`DevicePhase::Failed`]; from then
//! on ticks do nothing.

pub mod input;
pub mod outbox;
pub mod pending;

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;
use std::time::Instant;

use crate::actuator::ChannelActuator;
use crate::channels::ChannelEngine;
use crate::codec::{decode, FrameEncoder};
use crate::config::AppConfig;
use crate::error::{CodecError, FatalError, ProtocolViolation, TransferError, TransportError};
use crate::protocol::{ChannelTarget, Frame, Message, MessageType, VolumeLevel};
use crate::transfer::{BulkTransfer, Completed, Step, TransferStats};
use crate::transport::{Transport, TransportStats};

pub use input::{FaderReading, InputEvent, InputSampler};
pub use outbox::{BulkRequest, Outbox};
pub use pending::PendingFrameQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DevicePhase {
    /// Waiting for the first session enumeration
    Booting,
    Running,
    /// Terminal; nothing is processed any more
    Failed,
}

/// Protocol counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProtocolStats {
    pub frames_received: u64,
    pub frames_sent: u64,
    pub frames_deferred: u64,
    pub send_failures: u64,
    /// Flushes cut short by a full link
    pub sends_postponed: u64,
    pub violations: u64,
    pub unknown_messages: u64,
    pub version_mismatches: u64,
    pub malformed_frames: u64,
    pub stray_chunks: u64,
    pub rejected_icon_inits: u64,
    pub device_only_received: u64,
}

/// Everything the controller knows, owned by the dispatch loop
pub struct SystemState {
    pub engine: ChannelEngine,
    pub transfer: BulkTransfer,
    pub pending: PendingFrameQueue,
    pub outbox: Outbox,
    pub phase: DevicePhase,
    pub stats: ProtocolStats,
}

/// Serializable snapshot of every counter
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStats {
    pub phase: DevicePhase,
    pub protocol: ProtocolStats,
    pub transfer: TransferStats,
    pub transport: TransportStats,
    pub pending_high_water: usize,
    pub request_retries: u64,
    pub icons_abandoned: u64,
}

pub struct DispatchLoop<T, A> {
    transport: T,
    actuator: A,
    encoder: FrameEncoder,
    sampler: InputSampler,
    input_tx: Sender<InputEvent>,
    input_rx: Receiver<InputEvent>,
    state: SystemState,
    max_frames_out: usize,
}

impl<T: Transport, A: ChannelActuator> DispatchLoop<T, A> {
    pub fn new(transport: T, actuator: A, config: &AppConfig) -> Self {
        let (input_tx, input_rx) = unbounded();
        Self {
            transport,
            actuator,
            encoder: FrameEncoder::new(),
            sampler: InputSampler::new(&config.touch),
            input_tx,
            input_rx,
            state: SystemState {
                engine: ChannelEngine::new(config.timing.debounce()),
                transfer: BulkTransfer::new(),
                pending: PendingFrameQueue::new(),
                outbox: Outbox::new(config.timing.enumeration_retry(), config.timing.icon_retry())
                    .with_icon_attempts(config.timing.icon_attempts),
                phase: DevicePhase::Booting,
                stats: ProtocolStats::default(),
            },
            max_frames_out: config.timing.max_frames_out_per_tick,
        }
    }

    /// Calibrate touch, draw the master channel and ask for the session list
    pub fn boot(&mut self) {
        tracing::info!("Controller booting");
        self.sampler.calibrate(&mut self.actuator);
        self.state.engine.init_master(&mut self.actuator);
        self.state.outbox.request_sessions();
        self.state.phase = DevicePhase::Booting;
    }

    /// Run one loop iteration
    pub fn tick(&mut self, now: Instant) {
        if self.state.phase == DevicePhase::Failed {
            return;
        }
        if let Err(fatal) = self.step(now) {
            self.fail(fatal);
        }
    }

    fn step(&mut self, now: Instant) -> Result<(), FatalError> {
        self.poll_input(now);
        self.state
            .outbox
            .schedule(now, self.state.transfer.is_active());
        for session in self.state.outbox.take_abandoned() {
            self.state.engine.on_icon_is_default(&mut self.actuator, session);
        }
        self.flush();

        if !self.state.transfer.is_active() {
            if let Some(frame) = self.state.pending.pop() {
                tracing::debug!("Replaying deferred frame {:?}", frame);
                self.process(&frame)?;
            }
        }

        if let Some(frame) = self.transport.try_receive() {
            self.state.stats.frames_received += 1;
            self.receive(frame)?;
        }
        Ok(())
    }

    fn fail(&mut self, fatal: FatalError) {
        tracing::error!("Fatal: {}", fatal);
        self.state.phase = DevicePhase::Failed;
        self.actuator.show_fatal(&fatal.to_string());
    }

    fn poll_input(&mut self, now: Instant) {
        let SystemState { engine, outbox, .. } = &mut self.state;

        for reading in self.sampler.sample(&mut self.actuator) {
            if let Some(slot) = engine.slot_mut(reading.slot) {
                slot.physical_position = reading.position;
                slot.touched = reading.touched;
            }
            if reading.touch_changed {
                self.actuator.set_touched(reading.slot, reading.touched);
                if !reading.touched {
                    engine.on_fader_released(outbox, reading.slot, now);
                }
            }
            if reading.moving {
                engine.on_user_moved_fader(outbox, &mut self.actuator, reading.slot, reading.position, now);
            }
        }

        while let Ok(event) = self.input_rx.try_recv() {
            tracing::debug!("Input {:?}", event);
            match event {
                InputEvent::Button { slot, button } => {
                    engine.on_button(outbox, &mut self.actuator, slot, button)
                }
                InputEvent::RotaryTurn { slot, delta } => {
                    engine.on_rotary_turn(&mut self.actuator, slot, delta)
                }
                InputEvent::RotaryPress { slot } => {
                    engine.on_rotary_press(outbox, &mut self.actuator, slot)
                }
            }
        }
    }

    fn flush(&mut self) {
        for _ in 0..self.max_frames_out {
            let Some(message) = self.state.outbox.pop() else {
                break;
            };
            let frame = self.encoder.encode(&message);
            match self.transport.send(&frame) {
                Ok(()) => {
                    self.state.stats.frames_sent += 1;
                    tracing::debug!("Sent {:?} (seq {})", message.message_type(), frame.sequence());
                }
                Err(TransportError::Busy) => {
                    tracing::debug!("Link busy, holding {:?}", message.message_type());
                    self.state.stats.sends_postponed += 1;
                    self.state.outbox.put_back(message);
                    break;
                }
                Err(e) => {
                    self.state.stats.send_failures += 1;
                    tracing::warn!("Failed to send {:?}: {}", message.message_type(), e);
                }
            }
        }
    }

    /// A fresh frame from the transport
    ///
    /// While a transfer runs only its chunks get through; everything else,
    /// and everything behind an already deferred frame, waits in the queue.
    fn receive(&mut self, frame: Frame) -> Result<(), FatalError> {
        let message_type = match MessageType::try_from(frame.type_byte()) {
            Ok(t) => t,
            Err(e) => {
                self.violation(e.into());
                return Ok(());
            }
        };

        let defer = if self.state.transfer.is_active() {
            !self.state.transfer.accepts(message_type)
        } else {
            !self.state.pending.is_empty()
        };
        if defer {
            tracing::debug!("Deferring {:?} during bulk transfer", message_type);
            self.state.pending.push(frame)?;
            self.state.stats.frames_deferred += 1;
            return Ok(());
        }
        self.process(&frame)
    }

    fn process(&mut self, frame: &Frame) -> Result<(), FatalError> {
        let decoded = match decode(frame) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.violation(e.into());
                return Ok(());
            }
        };
        tracing::debug!(
            "Received {:?} (seq {})",
            decoded.message.message_type(),
            decoded.sequence
        );
        self.dispatch(decoded.message)
    }

    fn dispatch(&mut self, message: Message<'_>) -> Result<(), FatalError> {
        let SystemState {
            engine,
            transfer,
            outbox,
            ..
        } = &mut self.state;
        let actuator = &mut self.actuator;

        match message {
            Message::EnumerationInit { count } => {
                outbox.answered(BulkRequest::Sessions);
                let step = transfer.begin_enumeration(count);
                self.apply(step);
            }
            Message::SessionDataChunk { .. } | Message::IconDataChunk { .. } => {
                match transfer.on_chunk(&message) {
                    Ok(step) => self.apply(step),
                    Err(TransferError::Violation(v)) => self.violation(v),
                    Err(TransferError::Fatal(fatal)) => return Err(fatal),
                }
            }
            Message::IconInit {
                session,
                packet_count,
                byte_count,
            } => {
                let started = transfer.begin_icon(session, packet_count, byte_count);
                outbox.answered(BulkRequest::Icon(session));
                match started {
                    Ok(step) => self.apply(step),
                    Err(v) => {
                        // No retry for a rejected init; show the placeholder
                        engine.on_icon_is_default(actuator, session);
                        self.violation(v);
                    }
                }
            }
            Message::IconIsDefault { session } => {
                outbox.answered(BulkRequest::Icon(session));
                engine.on_icon_is_default(actuator, session);
            }
            Message::ChannelData {
                target,
                volume,
                muted,
                name,
            } => engine.on_channel_data(actuator, target, volume, muted, name),
            Message::SessionClosed { session } => engine.on_session_closed(outbox, actuator, session),
            Message::CurrentVolumeLevels { levels } => engine.on_volume_levels(actuator, &levels),
            Message::NewSessionOpened {
                session,
                volume,
                muted,
            } => engine.on_session_appeared(outbox, actuator, session, volume, muted),
            Message::VolumeChanged {
                target,
                volume,
                muted,
            } => engine.on_host_volume_changed(actuator, target, volume, muted),
            Message::RequestCurrentVolumeLevels => {
                let levels = engine
                    .slots()
                    .iter()
                    .filter_map(|slot| {
                        slot.bound.map(|session| VolumeLevel {
                            session,
                            level: slot.target_volume,
                        })
                    })
                    .collect();
                outbox.send(Message::CurrentVolumeLevels { levels });
            }
            Message::Acknowledge { count, kind } => {
                tracing::debug!("Host acknowledged {:?} #{}", kind, count);
            }
            other @ (Message::RequestAllSessions
            | Message::StartNormalBroadcasts
            | Message::StopNormalBroadcasts
            | Message::RequestChannelData { .. }
            | Message::CurrentSelectedSessions { .. }
            | Message::RequestIcon { .. }
            | Message::ButtonPushed { .. }) => {
                self.violation(ProtocolViolation::DeviceOnlyMessage(other.message_type()));
            }
        }
        Ok(())
    }

    fn apply(&mut self, step: Step) {
        let SystemState {
            engine,
            outbox,
            phase,
            ..
        } = &mut self.state;

        if let Some(ack) = step.ack {
            outbox.send(ack);
        }
        match step.completed {
            Some(Completed::Sessions(records)) => {
                tracing::info!("Enumeration complete: {} sessions", records.len());
                let booting = *phase == DevicePhase::Booting;
                if booting {
                    outbox.send(Message::RequestChannelData {
                        target: ChannelTarget::Master,
                    });
                }
                let bound = engine.on_enumeration_complete(outbox, &mut self.actuator, records);
                if booting {
                    if bound == 0 {
                        outbox.send(Message::CurrentSelectedSessions {
                            sessions: engine.selected_sessions(),
                        });
                    }
                    *phase = DevicePhase::Running;
                    tracing::info!("Controller running");
                }
            }
            Some(Completed::Icon { session, icon }) => {
                tracing::debug!("Icon received for {}", session);
                engine.on_icon_received(&mut self.actuator, session, icon);
            }
            None => {}
        }
    }

    fn violation(&mut self, violation: ProtocolViolation) {
        let stats = &mut self.state.stats;
        stats.violations += 1;
        match &violation {
            ProtocolViolation::Codec(CodecError::UnknownMessage(_)) => stats.unknown_messages += 1,
            ProtocolViolation::Codec(CodecError::UnsupportedVersion(_)) => {
                stats.version_mismatches += 1
            }
            ProtocolViolation::Codec(_) => stats.malformed_frames += 1,
            ProtocolViolation::UnexpectedChunk(_) => stats.stray_chunks += 1,
            ProtocolViolation::IconInitRejected { .. } => stats.rejected_icon_inits += 1,
            ProtocolViolation::DeviceOnlyMessage(_) => stats.device_only_received += 1,
        }
        tracing::warn!("Protocol violation: {}", violation);
    }

    /// Handle for injecting button and encoder events
    pub fn input_sender(&self) -> Sender<InputEvent> {
        self.input_tx.clone()
    }

    pub fn state(&self) -> &SystemState {
        &self.state
    }

    pub fn phase(&self) -> DevicePhase {
        self.state.phase
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn stats(&self) -> DeviceStats {
        DeviceStats {
            phase: self.state.phase,
            protocol: self.state.stats,
            transfer: self.state.transfer.stats(),
            transport: self.transport.stats(),
            pending_high_water: self.state.pending.high_water(),
            request_retries: self.state.outbox.retries(),
            icons_abandoned: self.state.outbox.abandoned_total(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::SimulatedActuator;
    use crate::channels::{Button, SlotIcon};
    use crate::codec::icon::{compress, packet_count};
    use crate::codec::IconBitmap;
    use crate::constants::{API_VERSION, FRAME_SIZE, ICON_CHUNK_SIZE, PENDING_QUEUE_CAPACITY};
    use crate::protocol::{AckKind, SessionId, SessionName, SessionRecord};
    use crate::transfer::BulkTransferState;
    use crate::transport::ChannelTransport;
    use std::time::Duration;

    type Device = DispatchLoop<ChannelTransport, SimulatedActuator>;

    struct Rig {
        device: Device,
        host: ChannelTransport,
        encoder: FrameEncoder,
        actuator: SimulatedActuator,
        now: Instant,
    }

    impl Rig {
        fn new() -> Self {
            let (device_end, host) = ChannelTransport::pair();
            let actuator = SimulatedActuator::new();
            let mut device = DispatchLoop::new(device_end, actuator.clone(), &AppConfig::default());
            device.boot();
            Self {
                device,
                host,
                encoder: FrameEncoder::new(),
                actuator,
                now: Instant::now(),
            }
        }

        /// Boot and answer the first enumeration; host output is drained
        fn booted(sessions: &[(u32, &str)]) -> Self {
            let mut rig = Self::new();
            rig.ticks(1);
            rig.enumerate(sessions);
            rig.ticks(sessions.len() + 4);
            rig.received();
            rig
        }

        fn send(&mut self, message: &Message<'_>) {
            let frame = self.encoder.encode(message);
            self.host.send(&frame).unwrap();
        }

        fn enumerate(&mut self, sessions: &[(u32, &str)]) {
            self.send(&Message::EnumerationInit {
                count: sessions.len() as u8,
            });
            for pair in sessions.chunks(2) {
                let first = SessionRecord::new(pair[0].0, pair[0].1);
                let second = pair
                    .get(1)
                    .map(|(id, name)| SessionRecord::new(*id, name))
                    .unwrap_or_else(|| SessionRecord::new(0, ""));
                self.send(&Message::SessionDataChunk { first, second });
            }
        }

        fn send_icon(&mut self, session: u32, compressed: &[u8]) {
            self.send(&Message::IconInit {
                session: SessionId(session),
                packet_count: packet_count(compressed.len()) as u32,
                byte_count: compressed.len() as u32,
            });
            for piece in compressed.chunks(ICON_CHUNK_SIZE) {
                self.send(&Message::IconDataChunk { bytes: piece });
            }
        }

        fn ticks(&mut self, n: usize) {
            for _ in 0..n {
                self.device.tick(self.now);
                self.now += Duration::from_millis(1);
            }
        }

        fn received(&mut self) -> Vec<Message<'static>> {
            std::iter::from_fn(|| self.host.try_receive())
                .filter_map(|frame| decode(&frame).ok()?.message.into_static())
                .collect()
        }
    }

    fn count(messages: &[Message<'_>], message_type: MessageType) -> usize {
        messages
            .iter()
            .filter(|m| m.message_type() == message_type)
            .count()
    }

    #[test]
    fn test_boot_retries_enumeration_request() {
        let mut rig = Rig::new();
        rig.ticks(1);
        assert_eq!(rig.received(), vec![Message::RequestAllSessions]);

        rig.ticks(50);
        assert!(rig.received().is_empty());
        rig.ticks(60);
        assert_eq!(rig.received(), vec![Message::RequestAllSessions]);
        assert_eq!(rig.device.phase(), DevicePhase::Booting);
    }

    #[test]
    fn test_boot_enumeration_binds_channels() {
        let mut rig = Rig::new();
        rig.ticks(1);
        rig.received();

        rig.enumerate(&[(1, "Spotify"), (2, "Discord"), (3, "Game")]);
        rig.ticks(5);
        let sent = rig.received();

        assert_eq!(rig.device.phase(), DevicePhase::Running);
        assert_eq!(
            sent.iter()
                .filter(|m| matches!(m, Message::Acknowledge { kind: AckKind::Sessions, .. }))
                .count(),
            3
        );
        assert!(sent.contains(&Message::RequestChannelData {
            target: ChannelTarget::Master
        }));
        assert_eq!(count(&sent, MessageType::RequestChannelData), 4);
        assert!(sent.contains(&Message::CurrentSelectedSessions {
            sessions: vec![SessionId(1), SessionId(2), SessionId(3)]
        }));
        assert!(sent.contains(&Message::RequestIcon {
            session: SessionId(1)
        }));
        assert_eq!(rig.actuator.channel(2).name.as_str(), "Discord");
        assert_eq!(rig.device.state().engine.directory().len(), 3);

        // Default icon: placeholder without entering a transfer
        rig.send(&Message::IconIsDefault {
            session: SessionId(1),
        });
        rig.ticks(1);
        assert_eq!(rig.actuator.channel(1).icon, SlotIcon::Placeholder);
        assert_eq!(rig.device.state().transfer.state(), &BulkTransferState::Idle);

        // The next icon is requested only once the first was answered
        rig.ticks(1);
        let sent = rig.received();
        assert!(sent.contains(&Message::RequestIcon {
            session: SessionId(2)
        }));
        assert!(!sent.contains(&Message::RequestIcon {
            session: SessionId(3)
        }));
    }

    #[test]
    fn test_icon_transfer_reaches_channel() {
        let mut rig = Rig::booted(&[(7, "Browser")]);
        let bitmap = IconBitmap::from_fn(|x, y| (x + y) as u16);
        let compressed = compress(&bitmap).unwrap();

        rig.send_icon(7, &compressed);
        rig.ticks(packet_count(compressed.len()) + 3);

        assert_eq!(rig.actuator.channel(1).icon, SlotIcon::Bitmap(bitmap));
        assert!(!rig.device.state().transfer.is_active());
        let sent = rig.received();
        assert_eq!(
            sent.iter()
                .filter(|m| matches!(m, Message::Acknowledge { kind: AckKind::Icon, .. }))
                .count(),
            packet_count(compressed.len()) + 1
        );
        // Bulk work drained, broadcasts resume
        assert!(sent.contains(&Message::StartNormalBroadcasts));
    }

    #[test]
    fn test_init_during_icon_transfer_is_deferred() {
        let mut rig = Rig::booted(&[(7, "Browser")]);
        let bitmap = IconBitmap::solid(0x001F);
        let compressed = compress(&bitmap).unwrap();
        let packets = packet_count(compressed.len());

        rig.send(&Message::IconInit {
            session: SessionId(7),
            packet_count: packets as u32,
            byte_count: compressed.len() as u32,
        });
        rig.ticks(1);
        rig.send(&Message::EnumerationInit { count: 1 });
        rig.ticks(1);
        assert_eq!(rig.device.state().pending.len(), 1);
        assert_eq!(rig.device.state().stats.frames_deferred, 1);

        for piece in compressed.chunks(ICON_CHUNK_SIZE) {
            rig.send(&Message::IconDataChunk { bytes: piece });
        }
        rig.ticks(packets);
        assert_eq!(rig.actuator.channel(1).icon, SlotIcon::Bitmap(bitmap));

        rig.ticks(1);
        assert!(rig.device.state().pending.is_empty());
        assert!(matches!(
            rig.device.state().transfer.state(),
            BulkTransferState::ReceivingSessionEnumeration(_)
        ));

        rig.send(&Message::SessionDataChunk {
            first: SessionRecord::new(7, "Browser"),
            second: SessionRecord::new(0, ""),
        });
        rig.ticks(3);
        assert_eq!(rig.device.state().transfer.stats().enumerations_completed, 2);
        let sent = rig.received();
        assert_eq!(
            sent.iter()
                .filter(|m| **m == Message::Acknowledge { count: 0, kind: AckKind::Sessions })
                .count(),
            1
        );
    }

    #[test]
    fn test_bad_icon_is_fatal() {
        let mut rig = Rig::booted(&[(7, "Browser")]);
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        std::io::Write::write_all(&mut encoder, &[0u8; 1000]).unwrap();
        let compressed = encoder.finish().unwrap();

        rig.send_icon(7, &compressed);
        rig.ticks(3);
        assert_eq!(rig.device.phase(), DevicePhase::Failed);
        assert_eq!(rig.actuator.fatal_calls(), 1);
        assert!(rig.actuator.fatal_message().unwrap().contains("32768"));
        rig.received();

        // Nothing is processed any more
        rig.send(&Message::VolumeChanged {
            target: ChannelTarget::Session(SessionId(7)),
            volume: 90,
            muted: false,
        });
        rig.actuator.touch(1, 40);
        rig.ticks(5);
        assert!(rig.received().is_empty());
        assert_ne!(rig.device.state().engine.slots()[1].target_volume, 90);
        assert_eq!(rig.actuator.fatal_calls(), 1);
    }

    #[test]
    fn test_pending_overflow_is_fatal() {
        let mut rig = Rig::booted(&[(7, "Browser")]);
        rig.send(&Message::EnumerationInit { count: 10 });
        for volume in 0..=PENDING_QUEUE_CAPACITY as u8 {
            rig.send(&Message::VolumeChanged {
                target: ChannelTarget::Master,
                volume,
                muted: false,
            });
        }
        rig.ticks(PENDING_QUEUE_CAPACITY + 1);
        assert_eq!(rig.device.phase(), DevicePhase::Running);
        rig.ticks(1);
        assert_eq!(rig.device.phase(), DevicePhase::Failed);
        assert!(rig
            .actuator
            .fatal_message()
            .unwrap()
            .contains("overflow"));
    }

    #[test]
    fn test_violations_are_counted_and_dropped() {
        let mut rig = Rig::booted(&[(7, "Browser")]);

        let mut bytes = [0u8; FRAME_SIZE];
        bytes[0] = API_VERSION + 1;
        bytes[3] = MessageType::VolumeChanged as u8;
        rig.host.send(&Frame::from_bytes(bytes)).unwrap();

        let mut bytes = [0u8; FRAME_SIZE];
        bytes[0] = API_VERSION;
        bytes[3] = 42;
        rig.host.send(&Frame::from_bytes(bytes)).unwrap();

        rig.send(&Message::RequestIcon {
            session: SessionId(7),
        });
        let chunk = [0u8; ICON_CHUNK_SIZE];
        rig.send(&Message::IconDataChunk { bytes: &chunk });
        rig.send(&Message::IconInit {
            session: SessionId(7),
            packet_count: 0,
            byte_count: 10,
        });
        rig.ticks(6);

        let stats = rig.device.state().stats;
        assert_eq!(stats.version_mismatches, 1);
        assert_eq!(stats.unknown_messages, 1);
        assert_eq!(stats.device_only_received, 1);
        assert_eq!(stats.stray_chunks, 1);
        assert_eq!(stats.rejected_icon_inits, 1);
        assert_eq!(stats.violations, 5);
        assert_eq!(rig.device.phase(), DevicePhase::Running);
        assert!(!rig.device.state().transfer.is_active());
    }

    #[test]
    fn test_rejected_icon_init_shows_placeholder() {
        let mut rig = Rig::booted(&[(7, "Browser")]);
        assert_eq!(
            rig.device.state().outbox.outstanding(),
            Some(BulkRequest::Icon(SessionId(7)))
        );

        rig.send(&Message::IconInit {
            session: SessionId(7),
            packet_count: 0,
            byte_count: 10,
        });
        rig.ticks(2);

        assert_eq!(rig.device.state().stats.rejected_icon_inits, 1);
        assert_eq!(rig.actuator.channel(1).icon, SlotIcon::Placeholder);
        assert!(rig.device.state().outbox.is_bulk_idle());
        assert!(rig.received().contains(&Message::StartNormalBroadcasts));
    }

    #[test]
    fn test_silent_host_does_not_block_menu() {
        let mut rig = Rig::booted(&[(7, "Browser")]);
        let input = rig.device.input_sender();

        // The host never answers the icon request
        rig.ticks(3 * 1000 + 10);
        assert_eq!(rig.actuator.channel(1).icon, SlotIcon::Placeholder);
        assert_eq!(rig.device.stats().icons_abandoned, 1);
        let sent = rig.received();
        assert_eq!(count(&sent, MessageType::RequestIcon), 2);

        input.send(InputEvent::RotaryPress { slot: 1 }).unwrap();
        rig.ticks(2);
        assert!(rig.received().contains(&Message::RequestAllSessions));
        rig.enumerate(&[(7, "Browser"), (8, "Music")]);
        rig.ticks(4);
        assert!(rig.device.state().engine.slots()[1].menu.is_open);
        assert!(rig.actuator.channel(1).menu.is_some());
    }

    #[test]
    fn test_full_link_holds_frames_for_next_tick() {
        let (device_end, mut host) = ChannelTransport::bounded_pair(1);
        let mut device = DispatchLoop::new(device_end, SimulatedActuator::new(), &AppConfig::default());
        device.boot();
        let mut now = Instant::now();
        device.tick(now);

        let mut encoder = FrameEncoder::new();
        host.send(&encoder.encode(&Message::EnumerationInit { count: 0 }))
            .unwrap();

        let mut received = Vec::new();
        for _ in 0..20 {
            now += Duration::from_millis(1);
            device.tick(now);
            if let Some(frame) = host.try_receive() {
                received.extend(decode(&frame).ok().and_then(|d| d.message.into_static()));
            }
        }

        assert_eq!(
            received,
            vec![
                Message::RequestAllSessions,
                Message::Acknowledge {
                    count: 0,
                    kind: AckKind::Sessions
                },
                Message::RequestChannelData {
                    target: ChannelTarget::Master
                },
                Message::CurrentSelectedSessions {
                    sessions: Vec::new()
                },
                Message::StartNormalBroadcasts,
            ]
        );
        let stats = device.stats().protocol;
        assert_eq!(stats.send_failures, 0);
        assert!(stats.sends_postponed > 0);
    }

    #[test]
    fn test_host_updates_channels() {
        let mut rig = Rig::booted(&[(7, "Browser"), (8, "Music")]);

        rig.send(&Message::ChannelData {
            target: ChannelTarget::Master,
            volume: 64,
            muted: false,
            name: SessionName::new("Speakers"),
        });
        rig.send(&Message::VolumeChanged {
            target: ChannelTarget::Session(SessionId(8)),
            volume: 33,
            muted: true,
        });
        rig.send(&Message::CurrentVolumeLevels {
            levels: vec![VolumeLevel {
                session: SessionId(7),
                level: 12,
            }],
        });
        rig.send(&Message::NewSessionOpened {
            session: SessionRecord::new(9, "Chat"),
            volume: 20,
            muted: false,
        });
        rig.send(&Message::SessionClosed {
            session: SessionId(7),
        });
        rig.ticks(6);

        assert_eq!(rig.actuator.channel(0).target, 64);
        assert_eq!(rig.actuator.channel(0).name.as_str(), "Speakers");
        assert_eq!(rig.actuator.channel(2).target, 33);
        assert!(rig.actuator.channel(2).muted);
        assert_eq!(rig.actuator.channel(1).level, 12);
        assert_eq!(rig.actuator.channel(3).name.as_str(), "Chat");
        assert_eq!(rig.actuator.channel(1).name.as_str(), "None");

        let sent = rig.received();
        assert!(sent.contains(&Message::CurrentSelectedSessions {
            sessions: vec![SessionId(8), SessionId(9)]
        }));
    }

    #[test]
    fn test_volume_level_request_is_answered() {
        let mut rig = Rig::booted(&[(7, "Browser")]);
        rig.send(&Message::VolumeChanged {
            target: ChannelTarget::Session(SessionId(7)),
            volume: 45,
            muted: false,
        });
        rig.send(&Message::RequestCurrentVolumeLevels);
        rig.ticks(3);

        assert!(rig.received().contains(&Message::CurrentVolumeLevels {
            levels: vec![VolumeLevel {
                session: SessionId(7),
                level: 45
            }]
        }));
    }

    #[test]
    fn test_user_input_is_reported() {
        let mut rig = Rig::booted(&[(7, "Browser")]);
        let input = rig.device.input_sender();

        rig.actuator.touch(1, 70);
        input
            .send(InputEvent::Button {
                slot: 3,
                button: Button::Select,
            })
            .unwrap();
        rig.ticks(2);

        let sent = rig.received();
        assert_eq!(
            sent.iter()
                .filter(|m| matches!(m, Message::VolumeChanged { .. }))
                .collect::<Vec<_>>(),
            vec![&Message::VolumeChanged {
                target: ChannelTarget::Session(SessionId(7)),
                volume: 70,
                muted: false
            }]
        );
        assert!(sent.contains(&Message::ButtonPushed { button: 3 }));
        assert!(rig.actuator.channel(1).touched);
    }
}
