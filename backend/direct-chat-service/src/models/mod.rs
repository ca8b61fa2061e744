pub mod message;

pub use message::{Message, MessageId, UserId};
