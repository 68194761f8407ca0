pub mod channel;
pub mod entry;
pub mod error;
pub mod protocol;

pub use channel::*;
pub use entry::*;
pub use error::*;
pub use protocol::*;
