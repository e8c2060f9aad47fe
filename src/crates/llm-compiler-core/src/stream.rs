//! The Streaming Output Channel (C7): the sink the planner's token callback
//! writes to and the transport layer drains in real time (§4.6).
//!
//! The original source wires this as a process-wide global queue shared by
//! every in-flight request. That design eliminates itself the moment two
//! requests overlap, so here it is a per-request channel the orchestrator
//! creates, hands to the planner, and returns to its caller (§9, "Global
//! streaming queue").

use tokio::sync::mpsc;

/// Prefix marking an enqueued string as a terminal error rather than a token
/// (§4.6). The remainder of the string is the error description.
pub const ERROR_TOKEN_PREFIX: &str = "###LLM_ERROR_TOKEN###";

/// One item carried on the channel: a raw token, the end-of-stream marker, or
/// a terminal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    Token(String),
    End,
    Error(String),
}

impl StreamItem {
    /// Render as the wire form described in §4.6: a plain token string, or an
    /// `###LLM_ERROR_TOKEN###`-prefixed error string. `End` has no textual
    /// form; callers detect it by the channel closing.
    pub fn into_wire_string(self) -> Option<String> {
        match self {
            StreamItem::Token(token) => Some(token),
            StreamItem::Error(message) => Some(format!("{ERROR_TOKEN_PREFIX}{message}")),
            StreamItem::End => None,
        }
    }
}

/// The producer half, held by the streaming planner.
#[derive(Clone)]
pub struct StreamSender(mpsc::UnboundedSender<StreamItem>);

impl StreamSender {
    /// Echo one raw token from the LLM.
    pub fn send_token(&self, token: impl Into<String>) {
        let _ = self.0.send(StreamItem::Token(token.into()));
    }

    /// Signal the terminal transport/provider error path (§4.2, "Terminal-
    /// error path"): the caller should surface this as a failure rather than
    /// a normal end of stream.
    pub fn send_error(&self, message: impl Into<String>) {
        let _ = self.0.send(StreamItem::Error(message.into()));
    }

    /// Signal normal end of stream for this request.
    pub fn send_end(&self) {
        let _ = self.0.send(StreamItem::End);
    }
}

/// The consumer half, returned to the transport layer.
pub struct StreamReceiver(mpsc::UnboundedReceiver<StreamItem>);

impl StreamReceiver {
    /// Await the next item. Returns `None` once the sender has been dropped
    /// without an explicit `End`, which the transport should treat the same
    /// as an `End`.
    pub async fn recv(&mut self) -> Option<StreamItem> {
        self.0.recv().await
    }
}

/// Create one request-scoped channel. Unbounded, matching the FIFO in §4.6;
/// the channel is sized by one request's token count, never shared across
/// requests.
pub fn channel() -> (StreamSender, StreamReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (StreamSender(tx), StreamReceiver(rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tokens_arrive_in_order() {
        let (tx, mut rx) = channel();
        tx.send_token("a");
        tx.send_token("b");
        tx.send_end();
        assert_eq!(rx.recv().await, Some(StreamItem::Token("a".into())));
        assert_eq!(rx.recv().await, Some(StreamItem::Token("b".into())));
        assert_eq!(rx.recv().await, Some(StreamItem::End));
    }

    #[test]
    fn error_item_renders_with_prefix() {
        let item = StreamItem::Error("boom".to_string());
        assert_eq!(item.into_wire_string(), Some("###LLM_ERROR_TOKEN###boom".to_string()));
    }

    #[test]
    fn end_item_has_no_wire_form() {
        assert_eq!(StreamItem::End.into_wire_string(), None);
    }

    #[tokio::test]
    async fn dropping_sender_without_end_closes_receiver() {
        let (tx, mut rx) = channel();
        tx.send_token("only");
        drop(tx);
        assert_eq!(rx.recv().await, Some(StreamItem::Token("only".into())));
        assert_eq!(rx.recv().await, None);
    }
}
