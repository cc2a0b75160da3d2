//! Live-inferior tests for the process lifecycle state machine.
//!
//! These launch real programs from `PATH` (`yes`, `true`, `echo`) so the
//! state transitions can be checked against what the kernel reports in
//! `/proc/<pid>/stat` and via `kill(pid, 0)` existence probes.

use std::fs::OpenOptions;
use std::os::fd::AsRawFd;
use std::path::Path;

use grapnel_core::error::GrapnelError;
use grapnel_core::pipe::Pipe;
use grapnel_core::process::Process;
use grapnel_core::registers::{register_info_by_name, RegisterId, RegisterValue};
use grapnel_core::types::{ProcessId, ProcessState};
use nix::errno::Errno;
use nix::sys::ptrace;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

/// True when a process with this pid exists (including zombies).
fn process_exists(pid: ProcessId) -> bool
{
    match signal::kill(Pid::from_raw(pid.raw()), None) {
        Ok(()) => true,
        Err(errno) => errno != Errno::ESRCH,
    }
}

/// The single-character state field from `/proc/<pid>/stat`.
///
/// The command name can itself contain spaces and parentheses, so the
/// field is located relative to the final `)`.
fn process_status(pid: ProcessId) -> char
{
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid.raw())).expect("readable stat file");
    let index = stat.rfind(')').expect("malformed stat line") + 2;
    stat.as_bytes()[index] as char
}

/// A sink for inferiors that would otherwise write to the test output.
fn devnull() -> std::fs::File
{
    OpenOptions::new().write(true).open("/dev/null").expect("open /dev/null")
}

#[test]
fn launch_stops_the_inferior_at_entry()
{
    let process = Process::launch(Path::new("yes"), true, None).expect("launch yes");

    assert!(process_exists(process.pid()));
    assert_eq!(process.state(), ProcessState::Stopped);
    assert_eq!(process_status(process.pid()), 't');
}

#[test]
fn launch_reports_a_missing_program()
{
    let err = Process::launch(Path::new("grapnel_no_such_program"), true, None)
        .expect_err("launch must fail");

    assert!(matches!(err, GrapnelError::ChildStartup(_)), "got {err:?}");
    assert!(err.to_string().contains("exec failed"), "got {err}");
}

#[test]
fn launch_rejects_an_empty_path()
{
    let err = Process::launch(Path::new(""), true, None).expect_err("launch must fail");
    assert!(matches!(err, GrapnelError::InvalidArgument(_)), "got {err:?}");
}

#[test]
fn attach_rejects_pid_zero()
{
    let err = Process::attach(ProcessId::from(0)).expect_err("attach must fail");
    assert!(matches!(err, GrapnelError::InvalidArgument(_)), "got {err:?}");
}

#[test]
fn resume_after_exit_fails()
{
    let mut process = Process::launch(Path::new("true"), true, None).expect("launch true");

    process.resume().expect("resume");
    let reason = process.wait_on_signal().expect("wait");
    assert_eq!(reason.state, ProcessState::Exited);
    assert_eq!(reason.info, 0);
    assert_eq!(process.state(), ProcessState::Exited);

    let err = process.resume().expect_err("resuming an exited inferior must fail");
    assert!(matches!(err, GrapnelError::Syscall { .. }), "got {err:?}");
}

#[test]
fn attach_stops_a_running_inferior()
{
    let sink = devnull();
    let target =
        Process::launch(Path::new("yes"), false, Some(sink.as_raw_fd())).expect("launch untraced");

    let _tracer = Process::attach(target.pid()).expect("attach");
    assert_eq!(process_status(target.pid()), 't');
}

#[test]
fn resume_runs_a_launched_inferior()
{
    let sink = devnull();
    let mut process =
        Process::launch(Path::new("yes"), true, Some(sink.as_raw_fd())).expect("launch yes");

    process.resume().expect("resume");
    assert_eq!(process.state(), ProcessState::Running);

    let status = process_status(process.pid());
    assert!(status == 'R' || status == 'S', "unexpected status {status}");
}

#[test]
fn resume_runs_an_attached_inferior()
{
    let sink = devnull();
    let target =
        Process::launch(Path::new("yes"), false, Some(sink.as_raw_fd())).expect("launch untraced");

    let mut tracer = Process::attach(target.pid()).expect("attach");
    tracer.resume().expect("resume");

    let status = process_status(target.pid());
    assert!(status == 'R' || status == 'S', "unexpected status {status}");
}

#[test]
fn dropping_a_launched_process_kills_the_inferior()
{
    let pid = {
        let process = Process::launch(Path::new("yes"), true, None).expect("launch yes");
        process.pid()
    };

    assert!(!process_exists(pid));
}

#[test]
fn dropping_an_attached_process_detaches_without_killing()
{
    let sink = devnull();
    let target =
        Process::launch(Path::new("yes"), false, Some(sink.as_raw_fd())).expect("launch untraced");
    let pid = target.pid();

    {
        let _tracer = Process::attach(pid).expect("attach");
    }

    assert!(process_exists(pid));
}

#[test]
fn launch_refreshes_the_register_file_at_the_initial_stop()
{
    let process = Process::launch(Path::new("yes"), true, None).expect("launch yes");

    // Stopped at the entry point, so the instruction pointer is live.
    let rip: u64 = process.read_register_as(RegisterId::Rip).expect("read rip");
    assert_ne!(rip, 0);

    let rsp: u64 = process.read_register_as(RegisterId::Rsp).expect("read rsp");
    assert_ne!(rsp, 0);
}

#[test]
fn gpr_writes_reach_the_kernel()
{
    let mut process = Process::launch(Path::new("yes"), true, None).expect("launch yes");
    let pid = Pid::from_raw(process.pid().raw());
    let rax = register_info_by_name("rax").expect("rax info");
    let al = register_info_by_name("al").expect("al info");

    process
        .write_register(rax, RegisterValue::U64(0x1122_3344_5566_7788))
        .expect("write rax");

    // Independently read the kernel-side registers: the poke must have
    // landed, not just the local mirror.
    let regs = ptrace::getregs(pid).expect("getregs");
    assert_eq!(regs.rax, 0x1122_3344_5566_7788);

    // The low-byte alias flushes through the enclosing aligned word.
    process.write_register(rax, RegisterValue::U64(0)).expect("clear rax");
    process.write_register(al, RegisterValue::U8(0xAA)).expect("write al");

    let regs = ptrace::getregs(pid).expect("getregs");
    assert_eq!(regs.rax, 0xAA);
}

#[test]
fn debug_register_writes_survive_a_stop_cycle()
{
    let sink = devnull();
    let mut process =
        Process::launch(Path::new("yes"), true, Some(sink.as_raw_fd())).expect("launch yes");
    let pid = Pid::from_raw(process.pid().raw());

    // dr0 holds a linear address; user code never touches it, so it is
    // stable across a resume.
    process
        .write_register_by_id(RegisterId::Dr0, RegisterValue::U64(0x1000))
        .expect("write dr0");

    // Queue a stop, run into it, and let the stop refresh the file from
    // the kernel via the per-word debug register peeks.
    signal::kill(pid, Signal::SIGSTOP).expect("queue SIGSTOP");
    process.resume().expect("resume");
    let reason = process.wait_on_signal().expect("wait");
    assert_eq!(reason.state, ProcessState::Stopped);

    let dr0: u64 = process.read_register_as(RegisterId::Dr0).expect("read dr0");
    assert_eq!(dr0, 0x1000);
}

#[test]
fn stdout_replacement_redirects_inferior_output()
{
    let mut channel = Pipe::new(false).expect("pipe");
    let mut process =
        Process::launch(Path::new("echo"), true, Some(channel.write_end())).expect("launch echo");
    channel.close_write();

    process.resume().expect("resume");
    let reason = process.wait_on_signal().expect("wait");
    assert_eq!(reason.state, ProcessState::Exited);

    let output = channel.read().expect("read redirected output");
    assert_eq!(output, b"\n".to_vec());
}
