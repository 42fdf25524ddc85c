//! Instrumentation hooks and per-thread staging state.
//!
//! Every instrumented function entry/exit lands here. The hot path
//! reads the counters, delta-encodes one record into the calling
//! thread's staging page, and only touches the shared sink when the
//! page is nearly full.

use std::cell::RefCell;
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU16, Ordering};

use cycletrace_wire::EventKind;

use crate::lifecycle;
use crate::pmcr;
use crate::sink;

/// Staging page size. Amortizes one write syscall over a few hundred
/// records.
pub(crate) const PAGE_SIZE: usize = 8 * 1024;

/// Registry capacity; thread ids are 9 bits.
const MAX_THREADS: usize = 512;

/// Room that must remain in the page before the next append.
#[cfg(not(feature = "fixed-record"))]
const RECORD_RESERVE: usize = cycletrace_wire::MAX_RECORD_LEN;
#[cfg(feature = "fixed-record")]
const RECORD_RESERVE: usize = core::mem::size_of::<cycletrace_wire::fixed::FixedRecord>();

#[repr(align(32))]
struct StagingPage([u8; PAGE_SIZE]);

pub(crate) struct ThreadState {
    page: StagingPage,
    cursor: usize,
    last_cycles: u64,
    last_events: [u64; 2],
    tid: u16,
    registered: bool,
}

static NEXT_TID: AtomicU16 = AtomicU16::new(0);

// One slot per possible thread id so teardown can drain every live
// page. A slot is claimed with a CAS; a colliding late thread simply
// stays unregistered and relies on its own drop flush.
#[allow(clippy::declare_interior_mutable_const)]
const EMPTY_SLOT: AtomicPtr<ThreadState> = AtomicPtr::new(ptr::null_mut());
static REGISTRY: [AtomicPtr<ThreadState>; MAX_THREADS] = [EMPTY_SLOT; MAX_THREADS];

thread_local! {
    static STATE: RefCell<ThreadState> = RefCell::new(ThreadState::new());
}

impl ThreadState {
    fn new() -> Self {
        Self {
            page: StagingPage([0; PAGE_SIZE]),
            cursor: 0,
            last_cycles: 0,
            last_events: [0; 2],
            tid: NEXT_TID.fetch_add(1, Ordering::Relaxed) & (MAX_THREADS as u16 - 1),
            registered: false,
        }
    }

    fn append(&mut self, kind: EventKind, address: u32) {
        let now = pmcr::read_cycles();
        let events = pmcr::read_events();
        // The reference starts at zero on both sides, so the first
        // record of a producer carries the raw counter value.
        let delta = now.wrapping_sub(self.last_cycles);
        let event_deltas = [
            events[0].wrapping_sub(self.last_events[0]),
            events[1].wrapping_sub(self.last_events[1]),
        ];

        self.encode(kind, address, delta, event_deltas);
        self.last_cycles = now;
        self.last_events = events;

        if PAGE_SIZE - self.cursor < RECORD_RESERVE {
            sink::append(&self.page.0[..self.cursor]);
            self.cursor = 0;
        }
    }

    #[cfg(not(feature = "fixed-record"))]
    fn encode(&mut self, kind: EventKind, address: u32, delta: u64, _event_deltas: [u64; 2]) {
        let cursor = self.cursor;
        let len = cycletrace_wire::encode_record(
            kind,
            address,
            delta,
            &mut self.page.0[cursor..cursor + RECORD_RESERVE],
        );
        self.cursor = cursor + len;
    }

    #[cfg(feature = "fixed-record")]
    fn encode(&mut self, kind: EventKind, address: u32, delta: u64, event_deltas: [u64; 2]) {
        use cycletrace_wire::fixed::FixedRecord;

        let record = FixedRecord::new(
            kind == EventKind::Entry,
            self.tid,
            address,
            delta.saturating_mul(pmcr::NS_PER_CYCLE).min(u32::MAX as u64) as u32,
            event_deltas[0].min(u32::MAX as u64) as u32,
            event_deltas[1].min(u32::MAX as u64) as u32,
        );
        let cursor = self.cursor;
        self.page.0[cursor..cursor + RECORD_RESERVE].copy_from_slice(bytemuck::bytes_of(&record));
        self.cursor = cursor + RECORD_RESERVE;
    }

    fn flush(&mut self) {
        sink::append(&self.page.0[..self.cursor]);
        self.cursor = 0;
    }
}

impl Drop for ThreadState {
    fn drop(&mut self) {
        self.flush();
        if self.registered {
            let slot = &REGISTRY[self.tid as usize];
            let _ = slot.compare_exchange(
                self as *mut ThreadState,
                ptr::null_mut(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
        }
    }
}

/// Drain every registered staging page. Called from teardown, after
/// the counters are stopped.
///
/// SAFETY: producers must be quiescent; teardown runs from the exit
/// path of the host program, after its worker threads have joined. A
/// thread that is still producing keeps ownership of its page and is
/// drained by its own TLS drop instead.
pub(crate) fn flush_all_pages() {
    for slot in &REGISTRY {
        let p = slot.load(Ordering::SeqCst);
        if !p.is_null() {
            unsafe { (*p).flush() };
        }
    }
}

#[inline]
fn record(kind: EventKind, address: u32) {
    if !lifecycle::tracing_active() {
        return;
    }
    // try_with: the TLS slot is gone during thread teardown.
    let _ = STATE.try_with(|cell| {
        // The borrow doubles as the per-thread in-flight flag; a
        // re-entered hook finds the state busy and backs out.
        let mut state = match cell.try_borrow_mut() {
            Ok(state) => state,
            Err(_) => return,
        };
        if !state.registered {
            let page_ptr = &mut *state as *mut ThreadState;
            state.registered = REGISTRY[state.tid as usize]
                .compare_exchange(ptr::null_mut(), page_ptr, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok();
        }
        state.append(kind, address);
    });
}

/// Compiler-inserted hook for every instrumented function entry.
#[no_mangle]
pub extern "C" fn __cyg_profile_func_enter(func: *mut c_void, _call_site: *mut c_void) {
    record(EventKind::Entry, func as usize as u32);
}

/// Compiler-inserted hook for every instrumented function exit.
#[no_mangle]
pub extern "C" fn __cyg_profile_func_exit(func: *mut c_void, _call_site: *mut c_void) {
    record(EventKind::Exit, func as usize as u32);
}
