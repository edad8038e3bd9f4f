use std::thread::sleep;
use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};
use log::{debug, trace, warn};
use sysinfo::{Pid, Process, ProcessStatus, ProcessesToUpdate, Signal, System};

/// How long a server gets to save and exit after SIGTERM.
pub const TERM_GRACE: Duration = Duration::from_secs(5);
pub const KILL_VERIFY_MAX_ELAPSED: Duration = Duration::from_secs(5);

pub(crate) fn with_process<F, R>(pid: u32, f: F) -> Option<R>
where
    F: FnOnce(&Process) -> R,
{
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);

    sys.process(Pid::from_u32(pid)).map(f)
}

/// Whether `pid` still names a live process.
///
/// Our own child stays a zombie until the supervisor reaps it, which counts
/// as gone.
pub(crate) fn is_alive(pid: u32) -> bool {
    with_process(pid, |p| p.status() != ProcessStatus::Zombie).unwrap_or(false)
}

/// Ask the game server to shut down, killing it if it will not.
///
/// Sends SIGTERM so the server can save and waits up to [`TERM_GRACE`] for
/// it to exit. A process still alive after that gets SIGKILL and another
/// [`KILL_VERIFY_MAX_ELAPSED`] to disappear. Blocking; call from
/// `spawn_blocking`.
///
/// # Returns
///
/// * `true` - The process is gone
/// * `false` - It was not found, or survived the kill
pub fn terminate_pid(pid: u32) -> bool {
    terminate_pid_within(pid, TERM_GRACE, KILL_VERIFY_MAX_ELAPSED)
}

pub(crate) fn terminate_pid_within(pid: u32, grace: Duration, kill_window: Duration) -> bool {
    let Some(requested) = with_process(pid, |p| p.kill_with(Signal::Term)) else {
        debug!("Process {pid} not found");
        return false;
    };

    match requested {
        Some(true) => {
            debug!("Sent SIGTERM to PID {pid}");
            if wait_for_exit(pid, grace) {
                return true;
            }
            warn!("Process {pid} ignored SIGTERM for {grace:?}, sending SIGKILL");
        }
        Some(false) => debug!("SIGTERM to PID {pid} was not delivered, sending SIGKILL"),
        None => debug!("SIGTERM unsupported on this platform, sending SIGKILL to PID {pid}"),
    }

    match with_process(pid, |p| p.kill()) {
        // Exited between the last check and the kill.
        None => true,
        Some(killed) => {
            debug!("Sent SIGKILL to PID {pid}: success={killed}");
            wait_for_exit(pid, kill_window)
        }
    }
}

/// Poll with exponential backoff until `pid` is gone or `window` elapses.
fn wait_for_exit(pid: u32, window: Duration) -> bool {
    let mut backoff = ExponentialBackoff {
        max_elapsed_time: Some(window),
        ..Default::default()
    };

    loop {
        if !is_alive(pid) {
            debug!("Process {pid} terminated");
            return true;
        }

        match backoff.next_backoff() {
            Some(duration) => {
                trace!("Process {pid} still alive, retrying after {duration:?}");
                sleep(duration);
            }
            None => {
                debug!("Process {pid} still running after {window:?}");
                return false;
            }
        }
    }
}
