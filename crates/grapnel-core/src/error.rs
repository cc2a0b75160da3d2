//! # Error Types
//!
//! General error handling for the debugger core.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use nix::errno::Errno;
use thiserror::Error;

/// Main error type for debugger operations
///
/// This enum represents all the ways a debugger operation can fail.
/// Each variant corresponds to a specific error condition that can occur
/// when controlling an inferior process.
///
/// ## Error Categories
///
/// 1. **Kernel errors**: `Syscall` (a failing `ptrace`/`fork`/`waitpid`/pipe call)
/// 2. **Launch errors**: `ChildStartup` (the forked child failed before `exec`)
/// 3. **Usage errors**: `InvalidArgument`
/// 4. **Register errors**: `RegisterLookup`, `InvalidRegister`
/// 5. **I/O errors**: `Io` (for file operations, etc.)
#[derive(Error, Debug)]
pub enum GrapnelError
{
    /// A kernel call failed
    ///
    /// Carries the operation that failed and the system error code that the
    /// kernel reported. The message renders as `"<context>: <description>"`,
    /// e.g. `"could not attach: ESRCH: No such process"`.
    #[error("{context}: {source}")]
    Syscall
    {
        /// Description of the operation that failed
        context: String,
        /// The system error reported by the kernel
        #[source]
        source: Errno,
    },

    /// The forked child failed before reaching `exec`
    ///
    /// The child reports its failure over the close-on-exec error pipe, and
    /// the parent reconstructs it as this variant. The message is exactly
    /// what the child wrote, e.g. `"exec failed: No such file or directory"`.
    #[error("{0}")]
    ChildStartup(String),

    /// Invalid argument passed to a debugger function
    ///
    /// Examples:
    /// - Attaching to PID 0
    /// - Launching an empty program path
    /// - A path containing an interior NUL byte
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No catalog entry matches the requested register
    ///
    /// Returned by the catalog lookups when the id, name, or DWARF number
    /// has no entry in the register table.
    #[error("Can't find register info: {0}")]
    RegisterLookup(String),

    /// A register has an unsupported width/format combination
    ///
    /// This indicates a malformed catalog entry reaching the read engine at
    /// runtime (e.g. a `Uint` register whose size is not 1, 2, 4, or 8).
    #[error("Unexpected register size or format: {0}")]
    InvalidRegister(String),

    /// I/O error (for file operations, etc.)
    ///
    /// Used for errors when reading/writing files, sockets, etc.
    /// This is a standard Rust `std::io::Error` converted to our error type.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GrapnelError
{
    /// Build a [`GrapnelError::Syscall`] from the ambient `errno`
    ///
    /// Use this right after a raw `libc` call reported failure; the current
    /// thread's `errno` is captured as the error source.
    #[must_use]
    pub fn last_os_error(context: impl Into<String>) -> Self
    {
        Self::Syscall {
            context: context.into(),
            source: Errno::last(),
        }
    }

    /// Build a [`GrapnelError::Syscall`] from an explicit `Errno`
    ///
    /// Use this to attach context to errors returned by `nix` wrappers.
    #[must_use]
    pub fn syscall(context: impl Into<String>, source: Errno) -> Self
    {
        Self::Syscall {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for `Result<T, GrapnelError>`
///
/// ```rust
/// use grapnel_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, GrapnelError>;
