//! # Inferior Process Control
//!
//! The lifecycle state machine for a traced inferior: launch (fork + exec
//! under trace), attach, resume, wait-on-signal, and destructor-driven
//! detach/kill.
//!
//! ## Kernel interface
//!
//! Linux debugging goes through `ptrace(2)` plus the ordinary process
//! primitives (`fork`, `execvp`, `waitpid`, `kill`). We use a hybrid of
//! two layers:
//!
//! - **nix crate**: for the well-maintained safe wrappers (`ptrace::cont`,
//!   `ptrace::attach`, `waitpid`, `signal::kill`, ...)
//! - **libc crate**: for the calls `nix` does not wrap —
//!   `PTRACE_GETFPREGS`/`PTRACE_SETFPREGS` and the raw fd plumbing the
//!   forked child needs before `exec`
//!
//! ## The pre-exec handshake
//!
//! Between `fork` and `exec` the child can still fail (tracing refused,
//! missing program). Those failures happen in the child's copy of the
//! address space, so they are ferried back over a close-on-exec pipe: the
//! child writes `"<prefix>: <errno description>"` and exits; the parent
//! reads the pipe after closing its write end. EOF with no bytes means the
//! `exec` succeeded and the kernel closed the child's write end for us.
//! The child performs only async-signal-safe work on that path — raw
//! writes of static and `errno`-derived strings, no allocation.
//!
//! ## References
//!
//! - [ptrace(2) man page](https://man7.org/linux/man-pages/man2/ptrace.2.html)
//! - [wait(2) man page](https://man7.org/linux/man-pages/man2/wait.2.html)

use std::ffi::CString;
use std::mem;
use std::os::fd::RawFd;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;

use nix::errno::Errno;
use nix::sys::ptrace;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::waitpid;
use nix::unistd::{execvp, fork, ForkResult, Pid};
use tracing::{debug, info, trace, warn};

use crate::error::{GrapnelError, Result};
use crate::pipe::Pipe;
use crate::registers::file::FlushPlan;
use crate::registers::info::{register_info_by_id, RegisterId, RegisterInfo, DEBUG_REGISTER_IDS};
use crate::registers::{RegisterFile, RegisterValue};
use crate::types::{ProcessId, ProcessState, StopReason};

/// A traced inferior process.
///
/// Created only through the [`Process::launch`] and [`Process::attach`]
/// factories; never cloned — exactly one tracer owns a given inferior, and
/// the kernel enforces it. Dropping a `Process` detaches from or kills the
/// inferior depending on how it was acquired (see [`Drop`]).
///
/// ## Lifecycle
///
/// 1. `launch(path, ..)` or `attach(pid)` — returns with the inferior
///    `Stopped` (both consume the initial stop synchronously)
/// 2. `resume()` — the inferior runs until the next event
/// 3. `wait_on_signal()` — blocks, classifies the stop, and refreshes the
///    register file
/// 4. drop — detach (attached) and/or kill (launched)
#[derive(Debug)]
pub struct Process
{
    pid: ProcessId,
    /// Kill the inferior when this tracer goes away (true for launched
    /// inferiors, false for attached ones).
    terminate_on_end: bool,
    /// Whether the inferior is traced by us (false only for launches with
    /// debugging disabled).
    is_attached: bool,
    state: ProcessState,
    registers: RegisterFile,
}

impl Process
{
    /// Launch `path` as a new inferior.
    ///
    /// Forks and execs the program with `argv = [path]`, resolving it
    /// through `PATH`. With `debug` set the child requests tracing before
    /// `exec` and this call consumes the automatic stop at the entry point,
    /// returning a `Stopped` process; with `debug` unset the child runs
    /// untraced and the process is `Running`.
    ///
    /// `stdout_replacement` is duplicated onto the child's standard output
    /// before `exec` when provided; the caller keeps ownership of the fd.
    ///
    /// ## Errors
    ///
    /// - [`GrapnelError::InvalidArgument`]: empty path, or a path with an
    ///   interior NUL byte
    /// - [`GrapnelError::Syscall`]: pipe creation, `fork`, or the initial
    ///   wait failed
    /// - [`GrapnelError::ChildStartup`]: the child failed before `exec`
    ///   (e.g. `"exec failed: No such file or directory"`)
    pub fn launch(path: &Path, debug: bool, stdout_replacement: Option<RawFd>) -> Result<Self>
    {
        let traced = debug;
        info!("launching {:?} (debug: {})", path, traced);

        if path.as_os_str().is_empty() {
            return Err(GrapnelError::InvalidArgument(
                "program path cannot be empty".to_string(),
            ));
        }
        let path_c = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| GrapnelError::InvalidArgument(format!("program path {path:?} contains NUL")))?;

        // The error channel: close-on-exec, so a successful exec closes the
        // child's write end and the parent's read sees clean EOF.
        let mut channel = Pipe::new(true)?;

        // SAFETY: the child branch below restricts itself to
        // async-signal-safe calls (dup2/ptrace/execvp/write/_exit) before
        // exec, as fork in a potentially multi-threaded parent requires.
        let fork_result =
            unsafe { fork() }.map_err(|errno| GrapnelError::syscall("fork failed", errno))?;

        match fork_result {
            ForkResult::Child => {
                channel.close_read();

                if let Some(fd) = stdout_replacement {
                    // SAFETY: plain dup2 of caller-provided fds.
                    if unsafe { libc::dup2(fd, libc::STDOUT_FILENO) } < 0 {
                        exit_with_errno(&channel, "stdout replacement failed");
                    }
                }

                if debug && ptrace::traceme().is_err() {
                    exit_with_errno(&channel, "tracing failed");
                }

                let _ = execvp(&path_c, &[path_c.as_c_str()]);
                // execvp only returns on failure.
                exit_with_errno(&channel, "exec failed");
            }
            ForkResult::Parent { child } => {
                channel.close_write();
                let data = channel.read()?;
                channel.close_read();

                if !data.is_empty() {
                    // The child died before exec; reap it and relay its report.
                    let _ = waitpid(child, None);
                    let message = String::from_utf8_lossy(&data).into_owned();
                    return Err(GrapnelError::ChildStartup(message));
                }

                let mut process = Self {
                    pid: ProcessId::from(child),
                    terminate_on_end: true,
                    is_attached: debug,
                    state: ProcessState::Stopped,
                    registers: RegisterFile::new(),
                };

                if debug {
                    // Consume the automatic stop at exec entry.
                    process.wait_on_signal()?;
                } else {
                    process.state = ProcessState::Running;
                }

                debug!("launched inferior {}", process.pid);
                Ok(process)
            }
        }
    }

    /// Attach to an already-running inferior.
    ///
    /// Issues `PTRACE_ATTACH` and consumes the attach-induced stop, so the
    /// returned process is `Stopped`. The inferior is not killed when this
    /// tracer goes away — dropping detaches and lets it continue.
    ///
    /// ## Errors
    ///
    /// - [`GrapnelError::InvalidArgument`]: `pid` is zero
    /// - [`GrapnelError::Syscall`]: the kernel refused the attach (no such
    ///   process, permissions, already traced)
    pub fn attach(pid: ProcessId) -> Result<Self>
    {
        info!("attaching to pid {}", pid);

        if pid.raw() == 0 {
            return Err(GrapnelError::InvalidArgument("cannot attach to pid 0".to_string()));
        }

        ptrace::attach(Pid::from(pid)).map_err(|errno| GrapnelError::syscall("could not attach", errno))?;

        let mut process = Self {
            pid,
            terminate_on_end: false,
            is_attached: true,
            state: ProcessState::Stopped,
            registers: RegisterFile::new(),
        };
        process.wait_on_signal()?;

        Ok(process)
    }

    /// The inferior's process id.
    #[must_use]
    pub fn pid(&self) -> ProcessId
    {
        self.pid
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ProcessState
    {
        self.state
    }

    /// Resume the stopped inferior.
    ///
    /// ## Errors
    ///
    /// Fails with [`GrapnelError::Syscall`] when the kernel refuses to
    /// continue the inferior — notably when it has already exited.
    pub fn resume(&mut self) -> Result<()>
    {
        trace!("resuming inferior {}", self.pid);

        ptrace::cont(self.nix_pid(), None)
            .map_err(|errno| GrapnelError::syscall("could not resume", errno))?;
        self.state = ProcessState::Running;
        Ok(())
    }

    /// Block until the inferior changes state, and classify the change.
    ///
    /// The process state follows the decoded reason. When the inferior is
    /// traced and the new state is `Stopped`, the whole register file is
    /// refreshed from the kernel before returning, so register reads
    /// reflect the inferior as of this stop.
    ///
    /// ## Errors
    ///
    /// Fails with [`GrapnelError::Syscall`] when `waitpid` or the register
    /// refresh fails.
    pub fn wait_on_signal(&mut self) -> Result<StopReason>
    {
        let status = waitpid(self.nix_pid(), None)
            .map_err(|errno| GrapnelError::syscall("waitpid failed", errno))?;

        let reason = StopReason::from_wait_status(status, self.state);
        self.state = reason.state;
        trace!("inferior {} {}", self.pid, reason);

        if self.is_attached && self.state == ProcessState::Stopped {
            self.read_all_registers()?;
        }

        Ok(reason)
    }

    /// The register file as of the most recent stop plus any writes this
    /// tracer has performed since.
    #[must_use]
    pub fn registers(&self) -> &RegisterFile
    {
        &self.registers
    }

    /// Write a typed value to a register and flush it to the inferior.
    ///
    /// The value is widened and staged into the register file, then pushed
    /// into the inferior: floating-point registers flush the whole FPR/SSE
    /// block (`PTRACE_SETFPREGS` is block-granular), everything else pokes
    /// the enclosing 8-byte-aligned user-area word.
    ///
    /// ## Errors
    ///
    /// Fails with [`GrapnelError::Syscall`] when the kernel write fails.
    ///
    /// ## Panics
    ///
    /// Panics when the value is wider than the register (programmer error;
    /// see [`RegisterFile`]).
    pub fn write_register(&mut self, info: &RegisterInfo, value: RegisterValue) -> Result<()>
    {
        match self.registers.stage_write(info, value) {
            FlushPlan::FprBlock => self.write_fprs(),
            FlushPlan::UserWord { offset, word } => self.write_user_area(offset, word),
        }
    }

    /// Write a register addressed by catalog id.
    ///
    /// ## Errors
    ///
    /// Propagates catalog-lookup and kernel-write failures.
    pub fn write_register_by_id(&mut self, id: RegisterId, value: RegisterValue) -> Result<()>
    {
        self.write_register(register_info_by_id(id)?, value)
    }

    /// Read a register by catalog id, extracting the expected arm.
    ///
    /// The target type must match the register's representation exactly
    /// (e.g. `u64` for `rax`, `[u8; 16]` for `xmm0`); no numeric
    /// conversion happens.
    ///
    /// ## Errors
    ///
    /// Propagates lookup failures and fails with
    /// [`GrapnelError::InvalidRegister`] when the arm does not match.
    pub fn read_register_as<T>(&self, id: RegisterId) -> Result<T>
    where
        T: TryFrom<RegisterValue, Error = GrapnelError>,
    {
        T::try_from(self.registers.read_by_id(id)?)
    }

    fn nix_pid(&self) -> Pid
    {
        Pid::from(self.pid)
    }

    /// Refresh the entire register file from the stopped inferior.
    ///
    /// GPRs and the FPR/SSE block each come over in one call; the debug
    /// registers have no block interface and are peeked word by word.
    fn read_all_registers(&mut self) -> Result<()>
    {
        let gprs = ptrace::getregs(self.nix_pid())
            .map_err(|errno| GrapnelError::syscall("could not read GPR registers", errno))?;
        self.registers.set_gprs(gprs);

        let fprs = read_fprs(self.nix_pid())?;
        self.registers.set_fprs(fprs);

        for (index, id) in DEBUG_REGISTER_IDS.iter().enumerate() {
            let info = register_info_by_id(*id)?;
            // nix's read_user performs the errno-clearing peek protocol: a
            // -1 return only counts as failure when errno is set.
            let word = ptrace::read_user(self.nix_pid(), info.offset as ptrace::AddressType)
                .map_err(|errno| GrapnelError::syscall("could not read debug register", errno))?;
            #[allow(clippy::cast_sign_loss)]
            self.registers.set_debug_register(index, word as u64);
        }

        Ok(())
    }

    /// Poke one 8-byte word into the inferior's user area.
    fn write_user_area(&mut self, offset: usize, word: u64) -> Result<()>
    {
        #[allow(clippy::cast_possible_wrap)]
        let data = word as libc::c_long;

        // SAFETY: POKEUSER writes into the inferior's kernel-side register
        // save area at a catalog-derived offset, not into tracer memory.
        unsafe { ptrace::write_user(self.nix_pid(), offset as ptrace::AddressType, data as ptrace::AddressType) }
            .map_err(|errno| GrapnelError::syscall("could not write to user area", errno))
    }

    /// Flush the staged FPR/SSE block into the inferior.
    fn write_fprs(&mut self) -> Result<()>
    {
        let mut fprs = self.registers.fprs();

        // SAFETY: PTRACE_SETFPREGS reads a complete user_fpregs_struct from
        // the provided pointer; fprs lives for the duration of the call.
        let rc = unsafe {
            libc::ptrace(
                libc::PTRACE_SETFPREGS,
                self.pid.raw(),
                ptr::null_mut::<libc::c_void>(),
                ptr::addr_of_mut!(fprs),
            )
        };
        if rc < 0 {
            return Err(GrapnelError::last_os_error("could not write FPR registers"));
        }
        Ok(())
    }
}

/// Read the FPR/SSE block with `PTRACE_GETFPREGS`.
///
/// `nix` wraps `PTRACE_GETREGS` but not the floating-point variant, so
/// this one goes through `libc` directly.
fn read_fprs(pid: Pid) -> Result<libc::user_fpregs_struct>
{
    // SAFETY: zeroed user_fpregs_struct is a valid target buffer; the
    // kernel fills it completely on success.
    let mut fprs: libc::user_fpregs_struct = unsafe { mem::zeroed() };

    // SAFETY: PTRACE_GETFPREGS writes a complete user_fpregs_struct to the
    // provided pointer; fprs outlives the call.
    let rc = unsafe {
        libc::ptrace(
            libc::PTRACE_GETFPREGS,
            pid.as_raw(),
            ptr::null_mut::<libc::c_void>(),
            ptr::addr_of_mut!(fprs),
        )
    };
    if rc < 0 {
        return Err(GrapnelError::last_os_error("could not read FPR registers"));
    }
    Ok(fprs)
}

/// Report a pre-exec failure over the error channel and die.
///
/// Runs in the forked child, so only async-signal-safe operations are
/// allowed: the `"<prefix>: <errno description>"` message is assembled in
/// a stack buffer — no allocation — and sent with a single pipe write so
/// the parent's one read sees it whole.
fn exit_with_errno(channel: &Pipe, prefix: &str) -> !
{
    let errno = Errno::last();

    let mut message = [0u8; 256];
    let mut len = 0;
    for part in [prefix.as_bytes(), b": ".as_slice(), errno.desc().as_bytes()] {
        let take = part.len().min(message.len() - len);
        message[len..len + take].copy_from_slice(&part[..take]);
        len += take;
    }
    let _ = channel.write(&message[..len]);

    // SAFETY: _exit terminates the child without running the parent's
    // atexit handlers or flushing its stdio buffers, which is exactly what
    // a forked-but-not-exec'd child must do.
    unsafe { libc::_exit(-1) }
}

impl Drop for Process
{
    /// Leave no inferior stopped by a tracer that no longer exists.
    ///
    /// Detaching requires a stopped inferior, so a running one is stopped
    /// first; after detach the inferior is no longer ours, so SIGCONT lets
    /// it carry on. A launched inferior is then killed and reaped so no
    /// zombie outlives the tracer. Every step is best-effort — cleanup
    /// failures are swallowed.
    fn drop(&mut self)
    {
        if self.pid.raw() == 0 {
            return;
        }
        let pid = self.nix_pid();

        if self.is_attached {
            if self.state == ProcessState::Running {
                if let Err(errno) = signal::kill(pid, Signal::SIGSTOP) {
                    warn!("could not stop inferior {} for detach: {}", self.pid, errno);
                }
                let _ = waitpid(pid, None);
            }

            let _ = ptrace::detach(pid, None);
            let _ = signal::kill(pid, Signal::SIGCONT);
            debug!("detached from inferior {}", self.pid);
        }

        if self.terminate_on_end {
            let _ = signal::kill(pid, Signal::SIGKILL);
            let _ = waitpid(pid, None);
            debug!("terminated inferior {}", self.pid);
        }
    }
}
