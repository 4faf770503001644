pub mod listener;
pub mod registry;
pub mod room;

pub use listener::{ListenerId, RoomListener};
pub use registry::RoomRegistry;
pub use room::{Room, Session};
