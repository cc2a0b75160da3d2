//! Tests for the error-channel pipe.

use grapnel_core::pipe::Pipe;

#[test]
fn write_then_read_round_trips()
{
    let pipe = Pipe::new(false).expect("pipe");
    let message = b"tracing failed: Operation not permitted";
    let written = pipe.write(message).expect("write");
    assert_eq!(written, message.len());

    let data = pipe.read().expect("read");
    assert_eq!(data, message.to_vec());
}

#[test]
fn read_returns_empty_at_eof()
{
    let mut pipe = Pipe::new(false).expect("pipe");
    pipe.write(b"x").expect("write");
    pipe.close_write();

    assert_eq!(pipe.read().expect("read"), b"x".to_vec());
    assert!(pipe.read().expect("read at EOF").is_empty());
}

#[test]
fn close_is_idempotent()
{
    let mut pipe = Pipe::new(true).expect("pipe");

    pipe.close_read();
    pipe.close_read();
    assert_eq!(pipe.read_end(), -1);

    pipe.close_write();
    pipe.close_write();
    assert_eq!(pipe.write_end(), -1);
}

#[test]
fn release_hands_each_end_to_the_caller()
{
    let mut pipe = Pipe::new(false).expect("pipe");
    let read_fd = pipe.release_read();
    let write_fd = pipe.release_write();

    assert!(read_fd >= 0);
    assert!(write_fd >= 0);
    assert_ne!(read_fd, write_fd);
    assert_eq!(pipe.read_end(), -1);
    assert_eq!(pipe.write_end(), -1);

    // Ownership moved to us; closing must succeed exactly once.
    assert_eq!(unsafe { libc::close(read_fd) }, 0);
    assert_eq!(unsafe { libc::close(write_fd) }, 0);
}

#[test]
fn reading_a_released_end_fails()
{
    let mut pipe = Pipe::new(false).expect("pipe");
    let read_fd = pipe.release_read();

    assert!(pipe.read().is_err());

    let _ = unsafe { libc::close(read_fd) };
}
