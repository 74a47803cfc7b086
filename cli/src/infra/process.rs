//! OS process launcher and signal control.
//!
//! Background and one-shot children are placed in their own process group on
//! unix so that signals reach the real server behind a package-manager
//! wrapper. Liveness uses the null signal.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::{Child, Command};

use crate::application::ports::{LaunchSpec, ProcessControl, ProcessLauncher};

/// Put `cmd` in a new process group led by the child.
pub fn isolate_group(cmd: &mut Command) {
    #[cfg(unix)]
    cmd.process_group(0);
    #[cfg(not(unix))]
    let _ = cmd;
}

#[cfg(unix)]
mod sys {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    fn to_pid(pid: u32) -> Option<Pid> {
        i32::try_from(pid)
            .ok()
            .filter(|p| *p > 0)
            .map(Pid::from_raw)
    }

    pub fn is_alive(pid: u32) -> bool {
        to_pid(pid).is_some_and(|p| signal::kill(p, None).is_ok())
    }

    /// Signal the group led by `pid`, falling back to the process alone.
    pub fn signal_group(pid: u32, sig: Signal) {
        let Some(p) = to_pid(pid) else { return };
        if signal::killpg(p, sig).is_err() {
            let _ = signal::kill(p, sig);
        }
    }

    pub fn terminate(pid: u32) {
        signal_group(pid, Signal::SIGTERM);
    }

    pub fn kill(pid: u32) {
        signal_group(pid, Signal::SIGKILL);
    }
}

#[cfg(not(unix))]
mod sys {
    // Without signals the exit watcher is the only liveness source, and kill
    // goes through the child handle.
    pub fn is_alive(_pid: u32) -> bool {
        true
    }

    pub fn terminate(_pid: u32) {}

    pub fn kill(_pid: u32) {}
}

pub use sys::{is_alive, kill, terminate};

/// Production launcher and signal sender.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsProcesses;

impl ProcessLauncher for OsProcesses {
    fn launch(&self, spec: &LaunchSpec) -> Result<Child> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        isolate_group(&mut cmd);
        cmd.spawn()
            .with_context(|| format!("failed to spawn {}", spec.program))
    }
}

impl ProcessControl for OsProcesses {
    fn is_alive(&self, pid: u32) -> bool {
        is_alive(pid)
    }

    fn terminate(&self, pid: u32) {
        terminate(pid);
    }

    fn kill(&self, pid: u32) {
        kill(pid);
    }
}
