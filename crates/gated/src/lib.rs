pub mod display;
pub mod report;
pub mod resolver;
pub mod scheduler;
pub mod supervisor;

pub use display::*;
pub use report::*;
pub use resolver::*;
pub use scheduler::*;
pub use supervisor::*;
