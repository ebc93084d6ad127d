//! Outbound command queue
//!
//! Plain messages are queued FIFO. Bulk requests (`RequestAllSessions`,
//! `RequestIcon`) go through a scheduler that keeps at most one of them
//! outstanding, resends it when unanswered, and brackets bulk work with
//! Stop/StartNormalBroadcasts. Enumeration requests are resent until the host
//! answers; an icon request is abandoned after a bounded number of sends so a
//! silent host cannot hold up the requests behind it.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::constants::DEFAULT_ICON_ATTEMPTS;
use crate::protocol::{Message, SessionId};

/// A device-initiated request that the host answers with a bulk transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkRequest {
    Sessions,
    Icon(SessionId),
}

impl BulkRequest {
    fn message(self) -> Message<'static> {
        match self {
            Self::Sessions => Message::RequestAllSessions,
            Self::Icon(session) => Message::RequestIcon { session },
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Outstanding {
    request: BulkRequest,
    deadline: Instant,
    attempts: u32,
}

pub struct Outbox {
    queue: VecDeque<Message<'static>>,
    sessions_wanted: bool,
    icon_requests: VecDeque<SessionId>,
    outstanding: Option<Outstanding>,
    broadcasts_stopped: bool,
    enumeration_retry: Duration,
    icon_retry: Duration,
    icon_attempts: u32,
    /// Icons the host never answered, waiting to be shown as placeholders
    abandoned: Vec<SessionId>,
    retries: u64,
    abandoned_total: u64,
}

impl Outbox {
    /// New outbox; the host is assumed not to be broadcasting yet
    pub fn new(enumeration_retry: Duration, icon_retry: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            sessions_wanted: false,
            icon_requests: VecDeque::new(),
            outstanding: None,
            broadcasts_stopped: true,
            enumeration_retry,
            icon_retry,
            icon_attempts: DEFAULT_ICON_ATTEMPTS,
            abandoned: Vec::new(),
            retries: 0,
            abandoned_total: 0,
        }
    }

    pub fn with_icon_attempts(mut self, attempts: u32) -> Self {
        self.icon_attempts = attempts.max(1);
        self
    }

    /// Queue a message that needs no reply tracking
    pub fn send(&mut self, message: Message<'static>) {
        self.queue.push_back(message);
    }

    /// Ask the host for a fresh session enumeration
    pub fn request_sessions(&mut self) {
        if self.outstanding.map(|o| o.request) != Some(BulkRequest::Sessions) {
            self.sessions_wanted = true;
        }
    }

    /// Ask the host for a session icon; duplicate requests collapse
    pub fn request_icon(&mut self, session: SessionId) {
        let outstanding = self.outstanding.map(|o| o.request) == Some(BulkRequest::Icon(session));
        if !outstanding && !self.icon_requests.contains(&session) {
            self.icon_requests.push_back(session);
        }
    }

    /// Forget any icon request for a session that went away
    pub fn cancel_icon(&mut self, session: SessionId) {
        self.icon_requests.retain(|s| *s != session);
        self.answered(BulkRequest::Icon(session));
    }

    /// The host started answering `request`
    pub fn answered(&mut self, request: BulkRequest) {
        if self.outstanding.map(|o| o.request) == Some(request) {
            self.outstanding = None;
        }
    }

    /// Advance the bulk-request scheduler
    ///
    /// No new request starts while a transfer is in progress; an outstanding
    /// one is still resent when its deadline passes.
    pub fn schedule(&mut self, now: Instant, transfer_active: bool) {
        if let Some(outstanding) = self.outstanding.as_mut() {
            if now < outstanding.deadline {
                return;
            }
            let request = outstanding.request;
            match request {
                BulkRequest::Icon(session) if outstanding.attempts >= self.icon_attempts => {
                    tracing::warn!(
                        "No answer to icon request for {} after {} attempts, using placeholder",
                        session,
                        outstanding.attempts
                    );
                    self.outstanding = None;
                    self.abandoned.push(session);
                    self.abandoned_total += 1;
                }
                _ => {
                    outstanding.attempts += 1;
                    outstanding.deadline = now + retry_for(request, self.enumeration_retry, self.icon_retry);
                    self.retries += 1;
                    tracing::debug!("Resending {:?} (attempt {})", request, outstanding.attempts);
                    self.queue.push_back(request.message());
                    return;
                }
            }
        }
        if transfer_active {
            return;
        }

        let next = if std::mem::take(&mut self.sessions_wanted) {
            Some(BulkRequest::Sessions)
        } else {
            self.icon_requests.pop_front().map(BulkRequest::Icon)
        };

        match next {
            Some(request) => {
                if !self.broadcasts_stopped {
                    self.queue.push_back(Message::StopNormalBroadcasts);
                    self.broadcasts_stopped = true;
                }
                self.queue.push_back(request.message());
                self.outstanding = Some(Outstanding {
                    request,
                    deadline: now + retry_for(request, self.enumeration_retry, self.icon_retry),
                    attempts: 1,
                });
            }
            None if self.broadcasts_stopped => {
                self.queue.push_back(Message::StartNormalBroadcasts);
                self.broadcasts_stopped = false;
            }
            None => {}
        }
    }

    /// Next message to put on the wire
    pub fn pop(&mut self) -> Option<Message<'static>> {
        self.queue.pop_front()
    }

    /// Return a popped message the link could not take; it goes out first
    pub fn put_back(&mut self, message: Message<'static>) {
        self.queue.push_front(message);
    }

    pub fn outstanding(&self) -> Option<BulkRequest> {
        self.outstanding.map(|o| o.request)
    }

    /// No bulk request outstanding or waiting
    pub fn is_bulk_idle(&self) -> bool {
        self.outstanding.is_none() && !self.sessions_wanted && self.icon_requests.is_empty()
    }

    /// Icon requests given up on since the last call
    pub fn take_abandoned(&mut self) -> Vec<SessionId> {
        std::mem::take(&mut self.abandoned)
    }

    /// Requests resent after their deadline
    pub fn retries(&self) -> u64 {
        self.retries
    }

    pub fn abandoned_total(&self) -> u64 {
        self.abandoned_total
    }
}

fn retry_for(request: BulkRequest, enumeration: Duration, icon: Duration) -> Duration {
    match request {
        BulkRequest::Sessions => enumeration,
        BulkRequest::Icon(_) => icon,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outbox() -> Outbox {
        Outbox::new(Duration::from_millis(100), Duration::from_secs(1))
    }

    fn drain(outbox: &mut Outbox) -> Vec<Message<'static>> {
        std::iter::from_fn(|| outbox.pop()).collect()
    }

    #[test]
    fn test_one_bulk_request_at_a_time() {
        let mut outbox = outbox();
        let now = Instant::now();
        outbox.request_sessions();
        outbox.request_icon(SessionId(5));

        outbox.schedule(now, false);
        assert_eq!(drain(&mut outbox), vec![Message::RequestAllSessions]);

        outbox.schedule(now + Duration::from_millis(10), false);
        assert!(drain(&mut outbox).is_empty());

        outbox.answered(BulkRequest::Sessions);
        outbox.schedule(now + Duration::from_millis(20), true);
        assert!(drain(&mut outbox).is_empty());

        outbox.schedule(now + Duration::from_millis(30), false);
        assert_eq!(
            drain(&mut outbox),
            vec![Message::RequestIcon {
                session: SessionId(5)
            }]
        );
    }

    #[test]
    fn test_unanswered_request_is_resent() {
        let mut outbox = outbox();
        let now = Instant::now();
        outbox.request_sessions();
        outbox.schedule(now, false);
        drain(&mut outbox);

        outbox.schedule(now + Duration::from_millis(99), false);
        assert!(drain(&mut outbox).is_empty());
        outbox.schedule(now + Duration::from_millis(100), false);
        assert_eq!(drain(&mut outbox), vec![Message::RequestAllSessions]);
        // Retries continue while a transfer is active
        outbox.schedule(now + Duration::from_millis(200), true);
        assert_eq!(drain(&mut outbox), vec![Message::RequestAllSessions]);
        assert_eq!(outbox.retries(), 2);
    }

    #[test]
    fn test_broadcasts_bracket_bulk_work() {
        let mut outbox = outbox();
        let now = Instant::now();

        outbox.schedule(now, false);
        assert_eq!(drain(&mut outbox), vec![Message::StartNormalBroadcasts]);

        outbox.request_icon(SessionId(1));
        outbox.schedule(now, false);
        assert_eq!(
            drain(&mut outbox),
            vec![
                Message::StopNormalBroadcasts,
                Message::RequestIcon {
                    session: SessionId(1)
                }
            ]
        );

        outbox.answered(BulkRequest::Icon(SessionId(1)));
        outbox.schedule(now, true);
        assert!(drain(&mut outbox).is_empty());
        outbox.schedule(now, false);
        assert_eq!(drain(&mut outbox), vec![Message::StartNormalBroadcasts]);
        assert!(outbox.is_bulk_idle());
    }

    #[test]
    fn test_duplicate_and_cancelled_icon_requests() {
        let mut outbox = outbox();
        let now = Instant::now();
        outbox.request_icon(SessionId(1));
        outbox.request_icon(SessionId(1));
        outbox.request_icon(SessionId(2));
        outbox.cancel_icon(SessionId(2));

        outbox.schedule(now, false);
        assert_eq!(outbox.outstanding(), Some(BulkRequest::Icon(SessionId(1))));
        outbox.request_icon(SessionId(1));
        outbox.cancel_icon(SessionId(1));
        assert!(outbox.is_bulk_idle());
    }

    #[test]
    fn test_silent_icon_request_is_abandoned() {
        let mut outbox = outbox().with_icon_attempts(2);
        let now = Instant::now();
        outbox.request_icon(SessionId(1));
        outbox.schedule(now, false);
        drain(&mut outbox);

        outbox.schedule(now + Duration::from_secs(1), false);
        assert_eq!(
            drain(&mut outbox),
            vec![Message::RequestIcon {
                session: SessionId(1)
            }]
        );
        assert!(outbox.take_abandoned().is_empty());

        // The menu asks for sessions while the icon is still unanswered
        outbox.request_sessions();
        outbox.schedule(now + Duration::from_secs(2), false);
        assert_eq!(drain(&mut outbox), vec![Message::RequestAllSessions]);
        assert_eq!(outbox.outstanding(), Some(BulkRequest::Sessions));
        assert_eq!(outbox.take_abandoned(), vec![SessionId(1)]);
        assert_eq!(outbox.abandoned_total(), 1);
        assert_eq!(outbox.retries(), 1);
    }

    #[test]
    fn test_enumeration_request_is_never_abandoned() {
        let mut outbox = outbox().with_icon_attempts(1);
        let now = Instant::now();
        outbox.request_sessions();
        outbox.schedule(now, false);
        for i in 1..=20 {
            outbox.schedule(now + Duration::from_millis(100 * i), false);
        }
        assert_eq!(outbox.outstanding(), Some(BulkRequest::Sessions));
        assert_eq!(outbox.retries(), 20);
        assert!(outbox.take_abandoned().is_empty());
    }
}
