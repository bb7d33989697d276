//! SMB2 message framing: commands, header flags, the header codec and
//! compound chaining.

pub mod command;
pub mod flags;
pub mod header;

pub use command::Command;
pub use flags::HeaderFlags;
pub use header::{size8, EmptyBody, Message, RawBody};
