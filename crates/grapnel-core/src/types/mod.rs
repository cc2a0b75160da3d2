//! Platform-agnostic value types used across the debugger core.

pub mod process;

pub use process::{ProcessId, ProcessState, StopReason};
