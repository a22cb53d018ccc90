//! Out-of-band control channel.
//!
//! Pages talk to the agent through a message bus that is separate from
//! request interception. Each envelope carries a `ControlMessage` and,
//! when the sender wants an answer, a oneshot reply port. The listener
//! sends the reply before it moves on to the next message, so
//! `ControlSender::request` behaves like a synchronous call.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{AgentError, Result};
use crate::models::{ControlMessage, ControlReply};
use crate::registration::Registration;

/// Buffer size for the control message channel.
/// Pages send a handful of messages at most; 16 leaves headroom.
const CHANNEL_BUFFER_SIZE: usize = 16;

#[derive(Debug)]
pub struct ControlEnvelope {
    pub message: ControlMessage,
    pub reply: Option<oneshot::Sender<ControlReply>>,
}

/// Page-side handle. Clone is cheap - it wraps an mpsc sender.
#[derive(Clone)]
pub struct ControlSender {
    tx: mpsc::Sender<ControlEnvelope>,
}

impl ControlSender {
    /// Post a message without waiting for a reply.
    pub async fn post(&self, message: ControlMessage) -> Result<()> {
        self.tx
            .send(ControlEnvelope {
                message,
                reply: None,
            })
            .await
            .map_err(|_| AgentError::ChannelClosed)
    }

    /// Post a message and wait for the agent's reply.
    pub async fn request(&self, message: ControlMessage) -> Result<ControlReply> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ControlEnvelope {
                message,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| AgentError::ChannelClosed)?;
        reply_rx.await.map_err(|_| AgentError::ChannelClosed)
    }

    /// Post a raw JSON message, waiting for a reply only when the
    /// message type expects one.
    pub async fn post_json(&self, raw: &str) -> Result<Option<ControlReply>> {
        let message = parse_message(raw)?;
        if message.expects_reply() {
            self.request(message).await.map(Some)
        } else {
            self.post(message).await.map(|_| None)
        }
    }
}

/// Agent-side end of the channel.
pub struct ControlListener {
    rx: mpsc::Receiver<ControlEnvelope>,
    registration: Arc<Registration>,
}

/// Create a connected sender/listener pair for a registration.
pub fn channel(registration: Arc<Registration>) -> (ControlSender, ControlListener) {
    let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    (ControlSender { tx }, ControlListener { rx, registration })
}

pub fn parse_message(raw: &str) -> Result<ControlMessage> {
    Ok(serde_json::from_str(raw)?)
}

impl ControlListener {
    /// Handle messages until every sender is dropped.
    pub async fn run(mut self) {
        while let Some(envelope) = self.rx.recv().await {
            self.handle(envelope).await;
        }
        debug!("Control channel closed");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Handle one envelope. Any reply is sent before this returns.
    pub async fn handle(&self, envelope: ControlEnvelope) {
        let ControlEnvelope { message, reply } = envelope;
        let answer = match self.registration.on_message(message).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(message = ?message, error = %e, "Control message failed");
                None
            }
        };

        match (answer, reply) {
            (Some(answer), Some(port)) => {
                if port.send(answer).is_err() {
                    debug!(message = ?message, "Reply port dropped before reply");
                }
            }
            (Some(_), None) => debug!(message = ?message, "Reply discarded, none requested"),
            // Dropping the port tells the requester there is no answer
            (None, _) => {}
        }
    }
}
