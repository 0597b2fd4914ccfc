// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY allocation for the Process Supervisor's `pty: true` mode.

#![cfg(unix)]

use std::os::fd::{AsRawFd, OwnedFd};

use crate::error::SupervisorError;

/// An allocated pseudo-terminal pair. `master` is retained by the
/// supervisor to copy output from; `slave` is handed to the child as its
/// stdin/stdout/stderr.
pub struct Pty {
    pub master: OwnedFd,
    pub slave: OwnedFd,
}

pub fn open() -> Result<Pty, SupervisorError> {
    let pair = nix::pty::openpty(None, None).map_err(|e| {
        SupervisorError::Pty(std::io::Error::from_raw_os_error(e as i32))
    })?;
    Ok(Pty {
        master: pair.master,
        slave: pair.slave,
    })
}

/// Put the slave side into raw mode so control characters pass through to
/// the child instead of being line-edited by the kernel tty driver.
pub fn set_raw(slave: &OwnedFd) -> Result<(), SupervisorError> {
    let mut termios = nix::sys::termios::tcgetattr(slave)
        .map_err(|e| SupervisorError::Pty(std::io::Error::from_raw_os_error(e as i32)))?;
    nix::sys::termios::cfmakeraw(&mut termios);
    nix::sys::termios::tcsetattr(slave, nix::sys::termios::SetArg::TCSANOW, &termios)
        .map_err(|e| SupervisorError::Pty(std::io::Error::from_raw_os_error(e as i32)))?;
    Ok(())
}

/// `true` when `err` is the benign EIO a PTY master read returns once the
/// slave side has closed — the normal end-of-output condition for PTYs.
pub fn is_benign_eio(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(libc_eio())
}

fn libc_eio() -> i32 {
    nix::errno::Errno::EIO as i32
}

pub fn raw_fd_of(fd: &OwnedFd) -> std::os::fd::RawFd {
    fd.as_raw_fd()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_allocates_a_master_and_slave_pair() {
        let pty = open().expect("openpty should succeed in a test sandbox with a controlling tty or /dev/ptmx");
        assert!(raw_fd_of(&pty.master) >= 0);
        assert!(raw_fd_of(&pty.slave) >= 0);
    }
}
