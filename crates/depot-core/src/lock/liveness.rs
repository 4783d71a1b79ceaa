//! Process liveness checks for stale-lock detection

use std::fmt;

/// Capability to ask whether a process id still refers to a live process.
///
/// The lock manager only needs this one question answered; platforms or
/// tests that cannot use the default check substitute their own.
pub trait LivenessCheck: Send + Sync + fmt::Debug {
    fn is_process_alive(&self, pid: u32) -> bool;
}

/// Check backed by the operating system.
///
/// On Unix this sends signal 0, which checks existence without delivering
/// anything. Elsewhere every process is reported alive and staleness falls
/// back to the lock's age alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLiveness;

impl LivenessCheck for SystemLiveness {
    #[cfg(unix)]
    fn is_process_alive(&self, pid: u32) -> bool {
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        // 0 and negative ids address process groups, not a single process.
        if pid <= 0 {
            return false;
        }
        // SAFETY: signal 0 performs only the existence and permission checks.
        let rc = unsafe { libc::kill(pid, 0) };
        if rc == 0 {
            return true;
        }
        // EPERM: the process exists but belongs to another user.
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    #[cfg(not(unix))]
    fn is_process_alive(&self, _pid: u32) -> bool {
        true
    }
}

/// Check with a fixed answer, for tests and for platforms without a liveness check.
#[derive(Debug, Clone, Copy)]
pub struct FixedLiveness(pub bool);

impl LivenessCheck for FixedLiveness {
    fn is_process_alive(&self, _pid: u32) -> bool {
        self.0
    }
}
