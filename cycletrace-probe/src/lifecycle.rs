//! Probe lifecycle: open the output, start the counters, register
//! teardown, drain on exit.

use std::ffi::CString;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::hooks;
use crate::pmcr;
use crate::sink;

#[cfg(feature = "hardware-counters")]
const DEFAULT_TRACE_PATH: &str = "/pc/trace.bin";
#[cfg(not(feature = "hardware-counters"))]
const DEFAULT_TRACE_PATH: &str = "trace.bin";

static INITIALIZED: AtomicBool = AtomicBool::new(false);
static ACTIVE: AtomicBool = AtomicBool::new(false);

#[inline]
pub(crate) fn tracing_active() -> bool {
    ACTIVE.load(Ordering::Relaxed)
}

/// Initialize tracing: open `path` truncating, start the performance
/// counters, and register teardown with `atexit`.
///
/// Returns false when the file cannot be opened; the hooks then stay
/// no-ops for the whole run. Initialization happens once per process;
/// later calls report whether the sink is usable.
pub fn init(path: &str) -> bool {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return sink::is_open();
    }

    let Ok(cpath) = CString::new(path) else {
        return false;
    };
    if !sink::open(&cpath) {
        return false;
    }

    pmcr::start();
    unsafe { libc::atexit(teardown_at_exit) };
    ACTIVE.store(true, Ordering::SeqCst);
    true
}

/// Stop the counters, drain every staging page under the sink mutex,
/// and close the trace file. Idempotent.
pub fn shutdown() {
    ACTIVE.store(false, Ordering::SeqCst);
    if !INITIALIZED.load(Ordering::SeqCst) || !sink::is_open() {
        return;
    }
    pmcr::stop_all();
    hooks::flush_all_pages();
    sink::close();
}

extern "C" fn teardown_at_exit() {
    shutdown();
}

/// C-callable initialization with the target's default output path.
#[no_mangle]
pub extern "C" fn cycletrace_init() {
    init(DEFAULT_TRACE_PATH);
}

/// Resume event capture after a [`cycletrace_stop`].
#[no_mangle]
pub extern "C" fn cycletrace_start() {
    if sink::is_open() {
        ACTIVE.store(true, Ordering::SeqCst);
    }
}

/// Pause event capture; the trace file stays open.
#[no_mangle]
pub extern "C" fn cycletrace_stop() {
    ACTIVE.store(false, Ordering::SeqCst);
}

/// C-callable teardown for hosts that exit through paths `atexit`
/// does not cover.
#[no_mangle]
pub extern "C" fn cycletrace_shutdown() {
    shutdown();
}
