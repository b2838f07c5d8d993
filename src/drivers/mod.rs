//! Hardware initialisation and core-pinned task spawning.

pub mod hw_init;
pub mod task_pin;
