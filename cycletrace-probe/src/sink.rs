//! Process-wide trace sink: one file descriptor, one mutex.
//!
//! The sink performs no interpretation of its input; it atomically
//! appends byte ranges handed over by the staging pages. The mutex is
//! held only for the duration of one `write` call, never across a
//! user-visible code path.

use std::ffi::CStr;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Mutex;

use log::error;

static FD: AtomicI32 = AtomicI32::new(-1);
static LOCK: Mutex<()> = Mutex::new(());
static WRITE_FAILED: AtomicBool = AtomicBool::new(false);

/// Open (truncating) the trace output file. Returns false if the file
/// cannot be opened, in which case the hooks stay no-ops for the run.
pub fn open(path: &CStr) -> bool {
    let fd = unsafe {
        libc::open(
            path.as_ptr(),
            libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC,
            0o644 as libc::c_uint,
        )
    };
    if fd < 0 {
        return false;
    }
    FD.store(fd, Ordering::SeqCst);
    WRITE_FAILED.store(false, Ordering::SeqCst);
    true
}

#[inline]
pub fn is_open() -> bool {
    FD.load(Ordering::Relaxed) >= 0
}

/// Atomically append `bytes` to the trace file.
///
/// A failed write is logged once per run; the bytes of that flush are
/// lost, the descriptor stays usable, and the caller resets its cursor
/// as if the flush had succeeded.
pub fn append(bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    let fd = FD.load(Ordering::Relaxed);
    if fd < 0 {
        return;
    }

    let _guard = LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut written = 0;
    while written < bytes.len() {
        let rc = unsafe {
            libc::write(
                fd,
                bytes[written..].as_ptr() as *const libc::c_void,
                bytes.len() - written,
            )
        };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            if !WRITE_FAILED.swap(true, Ordering::Relaxed) {
                error!("trace write failed ({err}); records from this run will be dropped");
            }
            return;
        }
        written += rc as usize;
    }
}

/// Close the trace file. Further appends become no-ops.
pub fn close() {
    let _guard = LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let fd = FD.swap(-1, Ordering::SeqCst);
    if fd >= 0 {
        unsafe { libc::close(fd) };
    }
}
