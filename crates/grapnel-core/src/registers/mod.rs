//! # Register Model
//!
//! The typed register catalog and the read/write engine over the kernel's
//! per-process register dump.
//!
//! Three layers:
//!
//! - [`info`]: the static catalog — one descriptor per register (name,
//!   DWARF number, width, byte offset into the kernel's `user` structure,
//!   class, and interpretation format), with lookups by id, name, and
//!   DWARF number.
//! - [`value`]: the variant-typed [`value::RegisterValue`] that reads
//!   produce and writes consume, including the 80-bit extended-precision
//!   conversions the x87 stack registers need.
//! - [`file`]: the [`file::RegisterFile`] buffer mirroring the inferior's
//!   registers, with format-aware read and staged write operations.
//!
//! Writes are routed through the owning [`crate::process::Process`], which
//! flushes staged bytes back into the inferior via the kernel interface.

pub mod file;
pub mod info;
pub mod value;

pub use file::RegisterFile;
pub use info::{
    register_info_by_dwarf, register_info_by_id, register_info_by_name, register_infos, RegisterFormat,
    RegisterId, RegisterInfo, RegisterType,
};
pub use value::RegisterValue;
