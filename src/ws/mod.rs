pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;

pub use connection::{ClientHandle, Outbound, PresenceConnection};
pub use handler::ws_routes;
pub use messages::{msg_types, PresenceMessage};
pub use subscription::{subscribe, Handshake, RejectReason, Subscription, SubscriptionOutcome};
