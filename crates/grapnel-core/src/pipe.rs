//! # Error Channel Pipe
//!
//! A small RAII wrapper over an anonymous OS pipe.
//!
//! Launching an inferior needs a way for the freshly forked child to report
//! failures that happen before `exec` (tracing refused, bad program path)
//! back to the parent. A pipe created with the close-on-exec flag does this
//! with no extra protocol: if `exec` succeeds the kernel closes the child's
//! write end, the parent's read returns EOF, and silence means success.
//!
//! The two descriptors are owned by this struct; a stored value of `-1`
//! means that end is already closed or has been released to a caller.

use std::mem;
use std::os::fd::RawFd;

use crate::error::{GrapnelError, Result};

/// How much we pull out of the pipe in one read call.
const READ_BUFFER_SIZE: usize = 1024;

/// A unidirectional byte channel with independently closable ends.
#[derive(Debug)]
pub struct Pipe
{
    read_fd: RawFd,
    write_fd: RawFd,
}

impl Pipe
{
    /// Create a new pipe.
    ///
    /// With `close_on_exec` set, both descriptors are created with the
    /// `O_CLOEXEC` attribute atomically, so a successful `exec` in a forked
    /// child closes them without any cooperation from the exec'd program.
    ///
    /// ## Errors
    ///
    /// Fails with [`GrapnelError::Syscall`] when the kernel refuses to
    /// create the pipe (e.g. the fd table is full).
    pub fn new(close_on_exec: bool) -> Result<Self>
    {
        let mut fds: [RawFd; 2] = [-1, -1];
        let flags = if close_on_exec { libc::O_CLOEXEC } else { 0 };

        // SAFETY: fds points at two writable ints, exactly what pipe2 expects.
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), flags) };
        if rc < 0 {
            return Err(GrapnelError::last_os_error("pipe creation failed"));
        }

        Ok(Self {
            read_fd: fds[0],
            write_fd: fds[1],
        })
    }

    /// The current read-end descriptor, or `-1` if closed/released.
    #[must_use]
    pub fn read_end(&self) -> RawFd
    {
        self.read_fd
    }

    /// The current write-end descriptor, or `-1` if closed/released.
    #[must_use]
    pub fn write_end(&self) -> RawFd
    {
        self.write_fd
    }

    /// Release ownership of the read end to the caller.
    ///
    /// The stored descriptor becomes `-1`; the caller is now responsible
    /// for closing the returned fd.
    pub fn release_read(&mut self) -> RawFd
    {
        mem::replace(&mut self.read_fd, -1)
    }

    /// Release ownership of the write end to the caller.
    pub fn release_write(&mut self) -> RawFd
    {
        mem::replace(&mut self.write_fd, -1)
    }

    /// Close the read end. Idempotent.
    pub fn close_read(&mut self)
    {
        if self.read_fd != -1 {
            // SAFETY: read_fd is a live descriptor owned by this Pipe.
            unsafe {
                let _ = libc::close(self.read_fd);
            }
            self.read_fd = -1;
        }
    }

    /// Close the write end. Idempotent.
    pub fn close_write(&mut self)
    {
        if self.write_fd != -1 {
            // SAFETY: write_fd is a live descriptor owned by this Pipe.
            unsafe {
                let _ = libc::close(self.write_fd);
            }
            self.write_fd = -1;
        }
    }

    /// Perform one read from the read end.
    ///
    /// Returns exactly the bytes obtained by a single kernel read of up to
    /// 1024 bytes; an empty vector means the write side reached EOF.
    ///
    /// ## Errors
    ///
    /// Fails with [`GrapnelError::Syscall`] when the underlying read fails.
    pub fn read(&self) -> Result<Vec<u8>>
    {
        let mut buf = [0u8; READ_BUFFER_SIZE];

        // SAFETY: buf is a live, writable buffer of the advertised length.
        let n = unsafe { libc::read(self.read_fd, buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            return Err(GrapnelError::last_os_error("could not read from pipe"));
        }

        #[allow(clippy::cast_sign_loss)]
        let n = n as usize;
        Ok(buf[..n].to_vec())
    }

    /// Write `bytes` to the write end with one kernel call.
    ///
    /// Returns the number of bytes actually written; the kernel may accept
    /// fewer than requested.
    ///
    /// ## Errors
    ///
    /// Fails with [`GrapnelError::Syscall`] when the underlying write fails.
    pub fn write(&self, bytes: &[u8]) -> Result<usize>
    {
        // SAFETY: bytes is a live buffer of the advertised length.
        let n = unsafe { libc::write(self.write_fd, bytes.as_ptr().cast(), bytes.len()) };
        if n < 0 {
            return Err(GrapnelError::last_os_error("could not write to pipe"));
        }

        #[allow(clippy::cast_sign_loss)]
        let n = n as usize;
        Ok(n)
    }
}

impl Drop for Pipe
{
    fn drop(&mut self)
    {
        self.close_read();
        self.close_write();
    }
}
