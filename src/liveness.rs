/// Errors from the liveness probe itself, as opposed to a "dead" answer.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("pid {0} is not a valid process id")]
    InvalidPid(u32),

    #[error("failed to probe pid {pid}: {source}")]
    Os {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("process probing is not supported on this platform")]
    Unsupported,
}

/// Answers whether a process is still running.
///
/// Implementations must be fast and non-blocking: the stale-lock scan calls
/// this while holding the guard's write lock.
pub trait ProcessLivenessProbe: Send + Sync {
    fn is_alive(&self, pid: u32) -> Result<bool, ProbeError>;
}

/// Probes liveness with a zero signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalProbe;

impl ProcessLivenessProbe for SignalProbe {
    #[cfg(unix)]
    fn is_alive(&self, pid: u32) -> Result<bool, ProbeError> {
        // 0 and anything that wraps negative would address a process group.
        if pid == 0 || pid > i32::MAX as u32 {
            return Err(ProbeError::InvalidPid(pid));
        }
        // SAFETY: kill(pid, 0) performs permission and existence checks without sending a signal.
        if unsafe { libc::kill(pid as i32, 0) } == 0 {
            return Ok(true);
        }
        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EPERM => Ok(true),
            Some(code) if code == libc::ESRCH => Ok(false),
            _ => Err(ProbeError::Os { pid, source: err }),
        }
    }

    #[cfg(not(unix))]
    fn is_alive(&self, _pid: u32) -> Result<bool, ProbeError> {
        Err(ProbeError::Unsupported)
    }
}
