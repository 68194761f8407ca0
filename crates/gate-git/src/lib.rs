pub mod command;
pub mod diff;
pub mod error;
pub mod patch;
pub mod repo;
#[cfg(test)]
pub(crate) mod testutil;
pub mod worktree;

pub use command::*;
pub use diff::*;
pub use error::*;
pub use patch::*;
pub use repo::*;
pub use worktree::*;
