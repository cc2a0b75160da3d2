//! # grapnel-core
//!
//! Low-level ptrace debugging primitives and process control for Grapnel.
//!
//! This crate provides the foundational debugging capabilities, including:
//! - Launching inferiors under trace and attaching to running processes
//! - Lifecycle control: resume, wait-on-signal, detach/kill on drop
//! - A typed register catalog and register read/write engine over the
//!   kernel's per-process `user` register dump
//!
//! ## Platform Support
//!
//! - **Linux on x86-64**: uses the `ptrace` interface (`PTRACE_TRACEME`,
//!   `PTRACE_ATTACH`, `PTRACE_GETREGS`, `PTRACE_PEEKUSER`, ...) and the
//!   x86-64 `user` structure layout. Nothing else is supported; the build
//!   script rejects other targets.
//!
//! ## Why unsafe code is needed
//!
//! This crate requires `unsafe` code because we're calling low-level system
//! APIs that interact directly with the kernel. These APIs are inherently
//! unsafe because they can:
//! - Fork the tracer and exec arbitrary programs
//! - Modify another process's registers and execution state
//! - Reinterpret the kernel's raw register dump at computed offsets
//!
//! We wrap these unsafe calls in safe abstractions, but the underlying
//! system calls themselves must be `unsafe`.

#![allow(unsafe_code)]
#![warn(missing_docs)]

mod bits;
pub mod error;
pub mod pipe;
pub mod prelude;
pub mod process;
pub mod registers;
pub mod types;
