//! Cross-core synchronization available before any kernel exists.

pub mod core_up;

pub use core_up::CoreReadiness;
