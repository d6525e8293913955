//! Process helpers for spawning QC worker processes.

#[cfg(feature = "tokio")]
use std::ffi::OsStr;
#[cfg(feature = "tokio")]
use std::process::Stdio;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;
#[cfg(windows)]
const DETACHED_PROCESS: u32 = 0x0000_0008;

/// Platform flags that keep a child out of the parent's console and signal group.
pub trait DetachExt {
    /// Suppress the console window on Windows. No-op elsewhere.
    fn no_window(&mut self);
    /// Put the child in its own process group so a Ctrl-C aimed at the
    /// parent does not reach it.
    fn detach(&mut self);
}

impl DetachExt for std::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.creation_flags(CREATE_NO_WINDOW);
        }
    }

    fn detach(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            self.process_group(0);
        }
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.creation_flags(CREATE_NO_WINDOW | DETACHED_PROCESS);
        }
    }
}

#[cfg(feature = "tokio")]
impl DetachExt for tokio::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
    }

    fn detach(&mut self) {
        self.as_std_mut().detach();
    }
}

/// Create a `tokio::process::Command` with the console window suppressed on Windows.
#[cfg(feature = "tokio")]
pub fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.no_window();
    cmd
}

/// Create a detached `tokio::process::Command` whose stdout and stderr are piped.
///
/// The child survives the parent dropping its handle, runs in its own process
/// group and reads nothing from stdin.
#[cfg(feature = "tokio")]
pub fn detached_tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.detach();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(false);
    cmd
}
