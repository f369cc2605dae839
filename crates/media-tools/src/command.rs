//! Construction of codec-tool commands.
//!
//! Binary locations honour the `FRAMELIFT_FFMPEG` / `FRAMELIFT_FFPROBE`
//! environment variables and fall back to `$PATH` lookup. Child processes
//! never open a console window on Windows.

use std::ffi::OsString;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self);
}

impl NoWindowExt for std::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.creation_flags(CREATE_NO_WINDOW);
        }
    }
}

impl NoWindowExt for tokio::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
    }
}

fn binary(env_var: &str, default: &str) -> OsString {
    std::env::var_os(env_var).unwrap_or_else(|| default.into())
}

/// An ffmpeg `tokio::process::Command` for one-shot invocations.
pub fn ffmpeg() -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(binary("FRAMELIFT_FFMPEG", "ffmpeg"));
    cmd.no_window();
    cmd
}

/// An ffmpeg `std::process::Command` for long-lived piped children driven
/// from blocking pipeline stages.
pub fn ffmpeg_std() -> std::process::Command {
    let mut cmd = std::process::Command::new(binary("FRAMELIFT_FFMPEG", "ffmpeg"));
    cmd.no_window();
    cmd
}

/// An ffprobe `tokio::process::Command`.
pub fn ffprobe() -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(binary("FRAMELIFT_FFPROBE", "ffprobe"));
    cmd.no_window();
    cmd
}
