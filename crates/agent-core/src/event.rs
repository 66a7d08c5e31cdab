//! Turn events and the per-turn event stream.
//!
//! Every transition of the loop controller is published here as it happens.
//! A subscription belongs to exactly one turn of one session and sees that
//! turn's events in publication order; the sequence ends (the subscription
//! closes) after the terminal event. Two turns racing on the same session
//! never see each other's events.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use crate::checkpoint::SessionId;

/// Identity of one event sequence: the session plus a fresh id for the turn
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TurnKey {
    pub session_id: SessionId,
    pub turn_id: String,
}

impl TurnKey {
    /// Key for a new turn on `session_id`
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            turn_id: Uuid::new_v4().simple().to_string(),
        }
    }
}

impl std::fmt::Display for TurnKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.session_id, self.turn_id)
    }
}

/// Lifecycle events emitted by the loop controller during one turn.
///
/// - `decision-started`: the reasoning engine is being consulted
/// - `tool-call-started`: a tool invocation was dispatched
/// - `tool-call-finished`: that invocation resolved (success or failure)
/// - `final-answer`: terminal, the turn completed
/// - `turn-failed`: terminal, adapter or persistence failure
/// - `turn-capped`: terminal, iteration cap reached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TurnEvent {
    DecisionStarted {
        iteration: usize,
    },

    ToolCallStarted {
        invocation_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },

    ToolCallFinished {
        invocation_id: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    FinalAnswer {
        text: String,
    },

    TurnFailed {
        reason: String,
    },

    TurnCapped {
        iterations: usize,
    },
}

impl TurnEvent {
    /// Wire name of this event kind (also the SSE event name).
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::DecisionStarted { .. } => "decision-started",
            Self::ToolCallStarted { .. } => "tool-call-started",
            Self::ToolCallFinished { .. } => "tool-call-finished",
            Self::FinalAnswer { .. } => "final-answer",
            Self::TurnFailed { .. } => "turn-failed",
            Self::TurnCapped { .. } => "turn-capped",
        }
    }

    /// Whether this event ends the turn's sequence.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::FinalAnswer { .. } | Self::TurnFailed { .. } | Self::TurnCapped { .. }
        )
    }
}

/// Buffered fan-out of turn events, keyed by turn.
#[derive(Default)]
pub struct EventStream {
    subscribers: Mutex<HashMap<TurnKey, Vec<mpsc::UnboundedSender<TurnEvent>>>>,
}

impl EventStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the event sequence of one turn. Subscribe before the turn
    /// starts to see all of it.
    pub fn subscribe(&self, turn: &TurnKey) -> EventSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(turn.clone())
            .or_default()
            .push(tx);
        EventSubscription {
            inner: UnboundedReceiverStream::new(rx),
        }
    }

    /// Publish without blocking. A terminal event closes every subscription of the turn.
    pub fn publish(&self, turn: &TurnKey, event: TurnEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let terminal = event.is_terminal();
        if let Some(senders) = subscribers.get_mut(turn) {
            senders.retain(|tx| tx.send(event.clone()).is_ok());
            if terminal || senders.is_empty() {
                subscribers.remove(turn);
            }
        }
    }

    /// End every subscription of a turn without a terminal event
    pub fn close(&self, turn: &TurnKey) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(turn);
    }

    /// Number of live subscriptions for a turn
    pub fn subscriber_count(&self, turn: &TurnKey) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(turn)
            .map_or(0, Vec::len)
    }
}

/// Ordered, finite stream of one turn's events.
pub struct EventSubscription {
    inner: UnboundedReceiverStream<TurnEvent>,
}

impl EventSubscription {
    /// Receive the next event, `None` once the sequence has ended
    pub async fn recv(&mut self) -> Option<TurnEvent> {
        futures::StreamExt::next(&mut self.inner).await
    }
}

impl Stream for EventSubscription {
    type Item = TurnEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_event_serialization_names() {
        let event = TurnEvent::ToolCallStarted {
            invocation_id: "c1".into(),
            tool_name: "calculator".into(),
            arguments: serde_json::json!({"expr": "25*4"}),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"tool-call-started""#));
        assert!(json.contains(r#""invocation_id":"c1""#));
        assert_eq!(event.event_type(), "tool-call-started");

        let back: TurnEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(TurnEvent::FinalAnswer { text: "x".into() }.is_terminal());
        assert!(TurnEvent::TurnFailed { reason: "x".into() }.is_terminal());
        assert!(TurnEvent::TurnCapped { iterations: 3 }.is_terminal());
        assert!(!TurnEvent::DecisionStarted { iteration: 1 }.is_terminal());
    }

    #[tokio::test]
    async fn test_publication_order_and_end_of_sequence() {
        let stream = EventStream::new();
        let turn = TurnKey::new(SessionId::from_string("s1"));
        let sub = stream.subscribe(&turn);

        stream.publish(&turn, TurnEvent::DecisionStarted { iteration: 1 });
        stream.publish(&turn, TurnEvent::FinalAnswer { text: "Hello!".into() });
        // Nobody is listening any more; this must not reach the old subscription
        stream.publish(&turn, TurnEvent::DecisionStarted { iteration: 1 });

        let events: Vec<TurnEvent> = sub.collect().await;
        assert_eq!(
            events,
            vec![
                TurnEvent::DecisionStarted { iteration: 1 },
                TurnEvent::FinalAnswer { text: "Hello!".into() },
            ]
        );
        assert_eq!(stream.subscriber_count(&turn), 0);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let stream = EventStream::new();
        let a = TurnKey::new(SessionId::from_string("a"));
        let b = TurnKey::new(SessionId::from_string("b"));
        let mut sub_a = stream.subscribe(&a);
        let mut sub_b = stream.subscribe(&b);

        stream.publish(&b, TurnEvent::TurnCapped { iterations: 2 });
        stream.publish(&a, TurnEvent::TurnFailed { reason: "down".into() });

        assert_eq!(sub_a.recv().await, Some(TurnEvent::TurnFailed { reason: "down".into() }));
        assert_eq!(sub_a.recv().await, None);
        assert_eq!(sub_b.recv().await, Some(TurnEvent::TurnCapped { iterations: 2 }));
        assert_eq!(sub_b.recv().await, None);
    }

    #[tokio::test]
    async fn test_turns_of_one_session_are_isolated() {
        let stream = EventStream::new();
        let session = SessionId::from_string("same");
        let first = TurnKey::new(session.clone());
        let second = TurnKey::new(session);
        assert_ne!(first, second);
        let mut sub_first = stream.subscribe(&first);
        let mut sub_second = stream.subscribe(&second);

        stream.publish(&first, TurnEvent::DecisionStarted { iteration: 1 });
        stream.publish(&second, TurnEvent::DecisionStarted { iteration: 1 });
        stream.publish(&first, TurnEvent::FinalAnswer { text: "first".into() });
        // The first turn ending leaves the second one open
        assert_eq!(stream.subscriber_count(&second), 1);
        stream.close(&second);

        assert_eq!(sub_first.recv().await, Some(TurnEvent::DecisionStarted { iteration: 1 }));
        assert_eq!(sub_first.recv().await, Some(TurnEvent::FinalAnswer { text: "first".into() }));
        assert_eq!(sub_first.recv().await, None);
        assert_eq!(sub_second.recv().await, Some(TurnEvent::DecisionStarted { iteration: 1 }));
        assert_eq!(sub_second.recv().await, None);
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let stream = EventStream::new();
        let turn = TurnKey::new(SessionId::from_string("x"));
        stream.publish(&turn, TurnEvent::DecisionStarted { iteration: 1 });
        assert_eq!(stream.subscriber_count(&turn), 0);
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let stream = EventStream::new();
        let turn = TurnKey::new(SessionId::from_string("s"));
        drop(stream.subscribe(&turn));
        stream.publish(&turn, TurnEvent::DecisionStarted { iteration: 1 });
        assert_eq!(stream.subscriber_count(&turn), 0);
    }
}
