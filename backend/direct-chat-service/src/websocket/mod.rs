pub mod message_types;
pub mod registry;
pub mod session;

pub use message_types::{WsInboundEvent, WsOutboundEvent};
pub use registry::{SessionHandle, SessionId, SessionRegistry};
pub use session::{SessionState, WsSession};
