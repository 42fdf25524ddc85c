//! On-target tracer for compiler-instrumented programs.
//!
//! Link this library into a program built with function entry/exit
//! instrumentation (`-finstrument-functions`); the toolchain then
//! calls [`__cyg_profile_func_enter`] / [`__cyg_profile_func_exit`]
//! around every instrumented function. Each call appends one
//! delta-encoded record to a per-thread staging page, and nearly-full
//! pages drain to the trace file under the process-wide sink mutex.
//!
//! # Hot-path rules
//!
//! The hook path never allocates, never takes a lock, and never
//! re-enters itself; the only blocking points are the flush at page
//! high-water and teardown. Nothing in this crate may itself be
//! instrumented - the build compiles the probe without the
//! instrumentation flag, and the per-thread borrow doubles as a
//! re-entry guard for anything that slips through.
//!
//! # Lifecycle
//!
//! The host calls [`cycletrace_init`] before tracing starts (the probe
//! registers its own `atexit` teardown), or the Rust-side [`init`] /
//! [`shutdown`] pair. If the trace file cannot be opened every hook
//! degrades to a no-op for the run; the probe never surfaces errors
//! to the host program.

mod hooks;
mod lifecycle;
pub mod pmcr;
mod sink;

pub use hooks::{__cyg_profile_func_enter, __cyg_profile_func_exit};
pub use lifecycle::{
    cycletrace_init, cycletrace_shutdown, cycletrace_start, cycletrace_stop, init, shutdown,
};
