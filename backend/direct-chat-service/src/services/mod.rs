pub mod relay;

pub use relay::{DeliveryReport, Relay, RelayError, RelayOptions, RelaySource, SendMessage};
