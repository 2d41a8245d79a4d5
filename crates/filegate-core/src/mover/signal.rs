use std::io;
use std::sync::atomic::{AtomicI32, Ordering};

use tracing::warn;

static DEFERRED_SIGNAL: AtomicI32 = AtomicI32::new(0);

extern "C" fn defer_handler(signum: libc::c_int) {
    DEFERRED_SIGNAL.store(signum, Ordering::SeqCst);
}

/// Defers SIGINT and SIGTERM for its lifetime.
///
/// Inside the guard a termination signal is recorded instead of delivered;
/// on drop the previous dispositions are restored and any recorded signal
/// is re-raised, so the process still dies, but only after the bracketed
/// filesystem work has reached a recoverable state.
pub struct CriticalSection {
    old_int: libc::sigaction,
    old_term: libc::sigaction,
}

impl CriticalSection {
    pub fn enter() -> io::Result<Self> {
        DEFERRED_SIGNAL.store(0, Ordering::SeqCst);

        let handler: extern "C" fn(libc::c_int) = defer_handler;
        unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = handler as usize;
            libc::sigemptyset(&mut action.sa_mask);
            action.sa_flags = libc::SA_RESTART;

            let mut old_int: libc::sigaction = std::mem::zeroed();
            if libc::sigaction(libc::SIGINT, &action, &mut old_int) != 0 {
                return Err(io::Error::last_os_error());
            }
            let mut old_term: libc::sigaction = std::mem::zeroed();
            if libc::sigaction(libc::SIGTERM, &action, &mut old_term) != 0 {
                let err = io::Error::last_os_error();
                libc::sigaction(libc::SIGINT, &old_int, std::ptr::null_mut());
                return Err(err);
            }
            Ok(CriticalSection { old_int, old_term })
        }
    }
}

impl Drop for CriticalSection {
    fn drop(&mut self) {
        unsafe {
            libc::sigaction(libc::SIGINT, &self.old_int, std::ptr::null_mut());
            libc::sigaction(libc::SIGTERM, &self.old_term, std::ptr::null_mut());
        }
        let signum = DEFERRED_SIGNAL.swap(0, Ordering::SeqCst);
        if signum != 0 {
            warn!("re-raising signal {} deferred during critical section", signum);
            unsafe {
                libc::raise(signum);
            }
        }
    }
}
