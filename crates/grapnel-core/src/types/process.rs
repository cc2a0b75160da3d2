//! Process identity, lifecycle state, and stop classification types.

use std::fmt;

use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;

/// Process identifier (PID)
///
/// A PID is a unique number assigned to each running process by the
/// operating system. On Linux, PIDs are signed 32-bit integers (`pid_t`).
///
/// ## Why wrap it in a struct?
///
/// Using a newtype pattern (`struct ProcessId(i32)`) instead of a raw `i32`
/// provides:
/// - **Type safety**: Prevents accidentally passing a random number where a PID is expected
/// - **Self-documenting code**: Makes it clear what the value represents
/// - **Future extensibility**: Can add methods or validation later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(pub i32);

impl ProcessId
{
    /// Get the raw `pid_t` value of this identifier.
    #[must_use]
    pub fn raw(self) -> i32
    {
        self.0
    }
}

impl From<i32> for ProcessId
{
    fn from(pid: i32) -> Self
    {
        ProcessId(pid)
    }
}

impl From<ProcessId> for i32
{
    fn from(pid: ProcessId) -> Self
    {
        pid.0
    }
}

impl From<Pid> for ProcessId
{
    fn from(pid: Pid) -> Self
    {
        ProcessId(pid.as_raw())
    }
}

impl From<ProcessId> for Pid
{
    fn from(pid: ProcessId) -> Self
    {
        Pid::from_raw(pid.0)
    }
}

impl fmt::Display for ProcessId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of an inferior process
///
/// ## State Transitions
///
/// - `Stopped` → `Running`: the tracer resumed the inferior
/// - `Running` → `Stopped`: a signal delivered a stop (observed via wait)
/// - `Running` → `Exited`: the inferior returned from `main`/called `exit`
/// - `Running` → `Terminated`: an uncaught signal killed the inferior
///
/// `Exited` and `Terminated` are terminal: no further transitions happen,
/// and resuming fails. A freshly constructed process is `Stopped` — both
/// launch and attach synchronously wait for the inferior's initial stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState
{
    /// The inferior exists and is stopped under tracer control
    Stopped,
    /// The inferior is executing
    Running,
    /// The inferior exited normally (terminal)
    Exited,
    /// The inferior was killed by a signal (terminal)
    Terminated,
}

impl fmt::Display for ProcessState
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let name = match self {
            ProcessState::Stopped => "stopped",
            ProcessState::Running => "running",
            ProcessState::Exited => "exited",
            ProcessState::Terminated => "terminated",
        };
        write!(f, "{name}")
    }
}

/// Why a wait on the inferior returned
///
/// Decoded from a `waitpid` status. For `Exited` the info byte is the
/// program's exit code; for `Terminated` it is the killing signal number;
/// for `Stopped` it is the signal that delivered the stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopReason
{
    /// The state the inferior transitioned into.
    pub state: ProcessState,
    /// Exit code or signal number, depending on `state`.
    pub info: u8,
}

impl StopReason
{
    /// Decode a wait status into a stop reason.
    ///
    /// Statuses that do not describe an exit, a signal death, or a stop
    /// (e.g. `WCONTINUED` reports, which this crate never requests) keep
    /// `previous` as the state and carry no info.
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn from_wait_status(status: WaitStatus, previous: ProcessState) -> Self
    {
        match status {
            WaitStatus::Exited(_, code) => Self {
                state: ProcessState::Exited,
                info: code as u8,
            },
            WaitStatus::Signaled(_, signal, _core_dumped) => Self {
                state: ProcessState::Terminated,
                info: signal as u8,
            },
            WaitStatus::Stopped(_, signal) | WaitStatus::PtraceEvent(_, signal, _) => Self {
                state: ProcessState::Stopped,
                info: signal as u8,
            },
            WaitStatus::PtraceSyscall(_) => Self {
                state: ProcessState::Stopped,
                info: Signal::SIGTRAP as u8,
            },
            WaitStatus::Continued(_) => Self {
                state: ProcessState::Running,
                info: 0,
            },
            WaitStatus::StillAlive => Self {
                state: previous,
                info: 0,
            },
        }
    }
}

impl fmt::Display for StopReason
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self.state {
            ProcessState::Exited => write!(f, "exited with status {}", self.info),
            ProcessState::Terminated => {
                write!(f, "terminated with signal {}", signal_name(self.info))
            }
            ProcessState::Stopped => write!(f, "stopped with signal {}", signal_name(self.info)),
            ProcessState::Running => write!(f, "running"),
        }
    }
}

/// Render a signal number with its symbolic name when one exists.
fn signal_name(signo: u8) -> String
{
    Signal::try_from(i32::from(signo))
        .map(|signal| signal.to_string())
        .unwrap_or_else(|_| signo.to_string())
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn pid() -> Pid
    {
        Pid::from_raw(42)
    }

    #[test]
    fn exit_status_decodes_to_exited()
    {
        let reason = StopReason::from_wait_status(WaitStatus::Exited(pid(), 3), ProcessState::Running);
        assert_eq!(reason.state, ProcessState::Exited);
        assert_eq!(reason.info, 3);
    }

    #[test]
    fn signal_death_decodes_to_terminated()
    {
        let reason = StopReason::from_wait_status(
            WaitStatus::Signaled(pid(), Signal::SIGKILL, false),
            ProcessState::Running,
        );
        assert_eq!(reason.state, ProcessState::Terminated);
        assert_eq!(reason.info, Signal::SIGKILL as u8);
    }

    #[test]
    fn stop_signal_decodes_to_stopped()
    {
        let reason = StopReason::from_wait_status(
            WaitStatus::Stopped(pid(), Signal::SIGTRAP),
            ProcessState::Running,
        );
        assert_eq!(reason.state, ProcessState::Stopped);
        assert_eq!(reason.info, Signal::SIGTRAP as u8);
    }

    #[test]
    fn unrecognized_status_keeps_previous_state()
    {
        let reason = StopReason::from_wait_status(WaitStatus::StillAlive, ProcessState::Stopped);
        assert_eq!(reason.state, ProcessState::Stopped);
        assert_eq!(reason.info, 0);
    }

    #[test]
    fn stop_reason_renders_signal_names()
    {
        let reason = StopReason {
            state: ProcessState::Stopped,
            info: Signal::SIGTRAP as u8,
        };
        assert_eq!(reason.to_string(), "stopped with signal SIGTRAP");

        let reason = StopReason {
            state: ProcessState::Exited,
            info: 0,
        };
        assert_eq!(reason.to_string(), "exited with status 0");
    }
}
