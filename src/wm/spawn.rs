//! Launching configured programs

use std::io;
use std::os::fd::RawFd;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

use nix::sys::signal::{signal, SigHandler, Signal};
use nix::unistd::setsid;
use tracing::info;

/// Let the kernel reap exited children instead of leaving zombies
pub fn ignore_child_exits() -> nix::Result<()> {
    // Safety: SigIgn installs no handler code
    unsafe { signal(Signal::SIGCHLD, SigHandler::SigIgn) }.map(|_| ())
}

/// Start `argv` in its own session, detached from the manager.
///
/// `x_fd` is closed in the child so the program never shares our protocol
/// stream. Returns the child's pid; the child is never waited for.
pub fn spawn(argv: &[String], x_fd: Option<RawFd>) -> io::Result<u32> {
    let Some((program, args)) = argv.split_first() else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty command"));
    };

    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null());

    // Safety: only async-signal-safe calls between fork and exec
    unsafe {
        command.pre_exec(move || {
            if let Some(fd) = x_fd {
                libc::close(fd);
            }
            setsid().map_err(io::Error::from)?;
            signal(Signal::SIGCHLD, SigHandler::SigDfl).map_err(io::Error::from)?;
            Ok(())
        });
    }

    let child = command.spawn()?;
    info!("Spawned {:?} (pid {})", argv, child.id());
    Ok(child.id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_empty_command_fails() {
        let err = spawn(&[], None).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_spawn_missing_program_fails() {
        let argv = vec!["/nonexistent/kwm-test-program".to_string()];
        assert!(spawn(&argv, None).is_err());
    }

    #[test]
    fn test_spawn_runs_program() {
        let argv = vec!["true".to_string()];
        assert!(spawn(&argv, None).unwrap() > 0);
    }
}
