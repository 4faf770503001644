use tokio::sync::mpsc;

use crate::ws::PresenceMessage;

/// The transport primitives the subscription protocol needs from a
/// persistent client connection.
pub trait PresenceConnection: Send + Sync {
    fn conn_id(&self) -> &str;

    /// Queue an outbound event
    fn emit(&self, message: PresenceMessage);

    /// Close the connection from the server side
    fn disconnect(&self);
}

/// What the socket writer task is asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Message(PresenceMessage),
    Close,
}

/// Client connection handle for sending messages
#[derive(Clone)]
pub struct ClientHandle {
    pub conn_id: String,
    pub sender: mpsc::UnboundedSender<Outbound>,
}

impl ClientHandle {
    pub fn new(conn_id: String, sender: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { conn_id, sender }
    }

    pub fn send(&self, msg: Outbound) -> Result<(), mpsc::error::SendError<Outbound>> {
        self.sender.send(msg)
    }
}

impl PresenceConnection for ClientHandle {
    fn conn_id(&self) -> &str {
        &self.conn_id
    }

    fn emit(&self, message: PresenceMessage) {
        if self.send(Outbound::Message(message)).is_err() {
            tracing::trace!(conn_id = %self.conn_id, "Dropping event for closed connection");
        }
    }

    fn disconnect(&self) {
        let _ = self.send(Outbound::Close);
    }
}
