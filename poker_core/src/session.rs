//! `PlayerSession`: one per connection. The core is transport-agnostic (the
//! message transport is an external collaborator, §1), so a session talks to
//! its connection only through an outbound frame channel that whoever owns
//! the socket drains in order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, Notify};

use crate::protocol::{ClientMessage, ServerMessage};

/// What a blocked actor-turn receiver can wake up to.
enum MailboxItem {
    Action(ClientMessage),
    Disconnect,
}

/// A single-slot mailbox: enqueuing always overwrites whatever was there,
/// so only the most recent record (or the disconnect sentinel) is ever
/// delivered. This is the "capacity 1, newest displaces oldest" primitive
/// the hand loop waits on for an actor's turn.
struct Mailbox {
    slot: std::sync::Mutex<Option<MailboxItem>>,
    notify: Notify,
}

impl Mailbox {
    fn new() -> Self {
        Mailbox {
            slot: std::sync::Mutex::new(None),
            notify: Notify::new(),
        }
    }

    fn put(&self, item: MailboxItem) {
        *self.slot.lock().unwrap() = Some(item);
        self.notify.notify_one();
    }

    async fn take(&self) -> MailboxItem {
        loop {
            let notified = self.notify.notified();
            if let Some(item) = self.slot.lock().unwrap().take() {
                return item;
            }
            notified.await;
        }
    }
}

/// What came back from waiting on a player's turn.
pub enum TurnOutcome {
    Action(ClientMessage),
    Disconnected,
    TimedOut,
}

pub struct PlayerSession {
    outbound_tx: mpsc::Sender<String>,
    mailbox: Mailbox,
    /// Guards nothing structural; lets `signal_disconnect` stay idempotent
    /// without racing itself.
    disconnected: AtomicBool,
    /// Serializes `send` so two concurrent callers can't interleave writes
    /// into the outbound channel out of order.
    send_lock: Mutex<()>,
}

impl PlayerSession {
    /// `outbound_tx` feeds whatever task owns the actual socket; that task
    /// is expected to forward frames to the wire in receive order, which is
    /// what gives the session its FIFO, non-interleaved send guarantee.
    pub fn new(outbound_tx: mpsc::Sender<String>) -> Arc<Self> {
        Arc::new(PlayerSession {
            outbound_tx,
            mailbox: Mailbox::new(),
            disconnected: AtomicBool::new(false),
            send_lock: Mutex::new(()),
        })
    }

    /// Encode and transmit. A closed transport is swallowed here; it will
    /// surface on the next receive as a close, per the propagation policy.
    pub async fn send(&self, message: &ServerMessage) {
        let _guard = self.send_lock.lock().await;
        let _ = self.outbound_tx.send(message.to_frame()).await;
    }

    /// Non-blocking; a full or closed mailbox silently discards the action
    /// (out-of-turn floods are dropped by construction: the previous
    /// occupant, if any, is simply overwritten).
    pub fn enqueue_action(&self, action: ClientMessage) {
        if !self.disconnected.load(Ordering::SeqCst) {
            self.mailbox.put(MailboxItem::Action(action));
        }
    }

    /// Idempotent: places the disconnect sentinel so a blocked receiver
    /// wakes immediately rather than waiting out the full action timeout.
    pub fn signal_disconnect(&self) {
        if !self.disconnected.swap(true, Ordering::SeqCst) {
            self.mailbox.put(MailboxItem::Disconnect);
        }
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    /// Drain any stale record left in the mailbox. Must be called *before*
    /// broadcasting the next prompt, never after — draining after the
    /// prompt races a fast responder and loses the reply.
    pub fn drain_stale(&self) {
        let _ = self.mailbox.slot.lock().unwrap().take();
    }

    /// Await this player's answer to the turn just prompted, bounded by
    /// `timeout`.
    pub async fn await_turn(&self, timeout: Duration) -> TurnOutcome {
        match tokio::time::timeout(timeout, self.mailbox.take()).await {
            Ok(MailboxItem::Action(action)) => TurnOutcome::Action(action),
            Ok(MailboxItem::Disconnect) => TurnOutcome::Disconnected,
            Err(_) => TurnOutcome::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn newest_action_displaces_an_unread_older_one() {
        let (tx, _rx) = mpsc::channel(8);
        let session = PlayerSession::new(tx);
        session.enqueue_action(ClientMessage::Action {
            action: serde_json::json!({"type": "check"}),
        });
        session.enqueue_action(ClientMessage::Action {
            action: serde_json::json!({"type": "fold"}),
        });
        match session.await_turn(Duration::from_millis(50)).await {
            TurnOutcome::Action(ClientMessage::Action { action }) => {
                assert_eq!(action["type"], "fold");
            }
            _ => panic!("expected the newer action to win"),
        }
    }

    #[tokio::test]
    async fn disconnect_wakes_a_blocked_waiter_immediately() {
        let (tx, _rx) = mpsc::channel(8);
        let session = PlayerSession::new(tx);
        let session2 = session.clone();
        let waiter = tokio::spawn(async move { session2.await_turn(Duration::from_secs(30)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        session.signal_disconnect();
        let outcome = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should resolve promptly")
            .unwrap();
        assert!(matches!(outcome, TurnOutcome::Disconnected));
    }

    #[tokio::test]
    async fn no_action_within_deadline_times_out() {
        let (tx, _rx) = mpsc::channel(8);
        let session = PlayerSession::new(tx);
        let outcome = session.await_turn(Duration::from_millis(20)).await;
        assert!(matches!(outcome, TurnOutcome::TimedOut));
    }
}
