//! Decoder-to-consumer handoff
//!
//! Audio travels through a bounded FIFO and is never dropped. Diagnostics
//! and the sync flag travel through single-slot mailboxes where a new value
//! replaces any unread one.

pub mod channel;
pub mod mailbox;

pub use channel::{channel, RelayConsumer, RelayEvent, RelayHealth, RelayProducer};
pub use mailbox::Mailbox;
