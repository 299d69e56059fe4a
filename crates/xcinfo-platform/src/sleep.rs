//! Keep the machine awake while a long transfer runs.
//!
//! The inhibitor is a helper process owned by [`SleepInhibitor`]; the system
//! returns to its normal power policy as soon as that process exits, which
//! happens when the inhibitor is dropped.

use std::process::{Child, Command, Stdio};

use tracing::debug;

use crate::{Error, Result};

#[derive(Debug)]
pub struct SleepInhibitor {
    child:   Child,
    program: &'static str,
}

impl SleepInhibitor {
    /// Spawn the platform inhibitor.
    pub fn acquire() -> Result<Self> {
        let (program, args) = inhibitor_command().ok_or(Error::Unsupported)?;
        let path = which::which(program).map_err(|_| Error::CommandNotFound {
            cmd: program.to_string(),
        })?;

        let child = Command::new(path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| Error::CommandFailed {
                cmd: program.to_string(),
                source,
            })?;

        debug!(program, pid = child.id(), "sleep inhibitor started");
        Ok(Self { child, program })
    }

    /// Like [`SleepInhibitor::acquire`], but a missing helper only logs.
    pub fn try_acquire() -> Option<Self> {
        match Self::acquire() {
            Ok(inhibitor) => Some(inhibitor),
            Err(e) => {
                debug!(error = %e, "sleep inhibition unavailable");
                None
            }
        }
    }
}

impl Drop for SleepInhibitor {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        debug!(program = self.program, "sleep inhibitor released");
    }
}

#[cfg(target_os = "macos")]
const INHIBITOR: Option<(&str, &[&str])> = Some(("caffeinate", &["-i"]));

#[cfg(target_os = "linux")]
const INHIBITOR: Option<(&str, &[&str])> = Some((
    "systemd-inhibit",
    &[
        "--what=idle:sleep",
        "--who=xcinfo",
        "--why=Download in progress",
        "--mode=block",
        "sleep",
        "infinity",
    ],
));

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
const INHIBITOR: Option<(&str, &[&str])> = None;

fn inhibitor_command() -> Option<(&'static str, &'static [&'static str])> {
    INHIBITOR
}
