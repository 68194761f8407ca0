pub mod config;
pub mod events;
pub mod state;
pub mod types;

pub use config::*;
pub use events::*;
pub use state::*;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::{DiffContext, GateConfig, TaskEvent, TaskKind, TaskState, TaskStatus};
    use std::any::TypeId;

    #[test]
    fn crate_root_reexports_core_types() {
        let _ = TypeId::of::<TaskKind>();
        let _ = TypeId::of::<TaskStatus>();
        let _ = TypeId::of::<TaskState>();
        let _ = TypeId::of::<TaskEvent>();
        let _ = TypeId::of::<DiffContext>();
        let _ = TypeId::of::<GateConfig>();
    }
}
