//! Common module for library exports

pub use crate::error::{GrapnelError, Result};
pub use crate::pipe::Pipe;
pub use crate::process::Process;
pub use crate::registers::{
    register_info_by_dwarf, register_info_by_id, register_info_by_name, register_infos, RegisterFile,
    RegisterFormat, RegisterId, RegisterInfo, RegisterType, RegisterValue,
};
pub use crate::types::{ProcessId, ProcessState, StopReason};
