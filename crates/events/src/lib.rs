//! Message abstractions shared by the runtime and domain crates.

pub mod command;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod subscriber;

pub use command::Command;
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use subscriber::{EventSubscriber, SubscriberError};
