//! Tests for error rendering and conversion.

use grapnel_core::error::GrapnelError;
use nix::errno::Errno;

#[test]
fn syscall_errors_render_context_and_description()
{
    let err = GrapnelError::syscall("could not attach", Errno::ESRCH);
    let message = err.to_string();

    assert!(message.starts_with("could not attach: "), "got {message}");
    assert!(message.contains("No such process"), "got {message}");
}

#[test]
fn child_startup_errors_carry_the_report_verbatim()
{
    let err = GrapnelError::ChildStartup("exec failed: No such file or directory".to_string());
    assert_eq!(err.to_string(), "exec failed: No such file or directory");
}

#[test]
fn invalid_argument_errors_are_prefixed()
{
    let err = GrapnelError::InvalidArgument("cannot attach to pid 0".to_string());
    assert_eq!(err.to_string(), "Invalid argument: cannot attach to pid 0");
}

#[test]
fn register_lookup_errors_name_the_miss()
{
    let err = GrapnelError::RegisterLookup("zax".to_string());
    assert_eq!(err.to_string(), "Can't find register info: zax");
}

#[test]
fn io_errors_convert_into_the_io_variant()
{
    let io = std::io::Error::other("boom");
    let err: GrapnelError = io.into();
    assert!(matches!(err, GrapnelError::Io(_)), "got {err:?}");
}

#[test]
fn syscall_errors_expose_their_source()
{
    let err = GrapnelError::syscall("waitpid failed", Errno::ECHILD);
    let source = std::error::Error::source(&err).expect("source errno");
    assert!(source.to_string().contains("No child process"), "got {source}");
}
