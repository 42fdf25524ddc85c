//! Call-graph reconstruction and the end-of-stream reduction.
//!
//! Entries intern the function and charge the caller edge; exits pop
//! the shadow stack and attribute the elapsed cycles. The one subtle
//! rule is the direct-recursion return: when the frame below the one
//! being closed belongs to the same symbol, nothing is accumulated -
//! the outermost return accounts the whole span exactly once.

use log::error;
use thiserror::Error;

use crate::decode::Event;
use crate::hotlist::{HotEntry, HotList};
use crate::matrix::CallMatrix;
use crate::resolver::NameResolver;
use crate::stack::{Frame, ShadowStack, MAX_DEPTH};
use crate::symbols::{SymbolTable, TableFull};
use cycletrace_wire::EventKind;

/// Fatal table exhaustion; the run cannot continue.
#[derive(Debug, Error)]
pub enum CapacityError {
    #[error(transparent)]
    Symbols(#[from] TableFull),
    #[error("shadow stack overflow (depth {MAX_DEPTH}) at address {0:#010x}")]
    StackOverflow(u32),
}

/// First and last observed cycle of the run.
#[derive(Debug, Default)]
struct Window {
    start: Option<u64>,
    end: u64,
}

impl Window {
    fn observe(&mut self, cycle: u64) {
        if self.start.is_none() {
            self.start = Some(cycle);
        }
        self.end = cycle;
    }

    fn total(&self) -> u64 {
        self.end - self.start.unwrap_or(self.end)
    }
}

/// Per-symbol reduction result, indexed like the symbol table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SymbolStats {
    pub cumulative: u64,
    pub self_cycles: u64,
    pub other: u64,
}

pub struct Report {
    pub stats: Vec<SymbolStats>,
    pub hot: HotList,
    /// Profile window length, clamped to 1 so a degenerate window
    /// still yields finite percentages.
    pub total: u64,
}

pub struct Profile {
    symbols: SymbolTable,
    matrix: CallMatrix,
    stack: ShadowStack,
    window: Window,
    resolver: Box<dyn NameResolver>,
    last_cycle: u64,
}

impl Profile {
    pub fn new(resolver: Box<dyn NameResolver>) -> Self {
        Self {
            symbols: SymbolTable::new(),
            matrix: CallMatrix::new(),
            stack: ShadowStack::new(),
            window: Window::default(),
            resolver,
            last_cycle: 0,
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn matrix(&self) -> &CallMatrix {
        &self.matrix
    }

    /// Replay one decoded event against the shadow stack.
    pub fn observe(&mut self, event: Event) -> Result<(), CapacityError> {
        self.window.observe(event.cycles);
        self.last_cycle = event.cycles;
        match event.kind {
            EventKind::Entry => self.enter(event.address, event.cycles),
            EventKind::Exit => {
                self.exit(event.address, event.cycles);
                Ok(())
            }
        }
    }

    fn enter(&mut self, address: u32, cycles: u64) -> Result<(), CapacityError> {
        let index = self.symbols.record_call(address, self.resolver.as_mut())?;

        if let Some(top) = self.stack.top() {
            match self.symbols.lookup(top.address) {
                Some(parent) => self.matrix.record_call(parent, index),
                None => error!("caller address {:#010x} not in symbol table", top.address),
            }
        }

        if !self.stack.push(Frame {
            address,
            start_cycle: cycles,
        }) {
            return Err(CapacityError::StackOverflow(address));
        }
        Ok(())
    }

    fn exit(&mut self, address: u32, cycles: u64) {
        let Some(frame) = self.stack.pop() else {
            error!("exit for {address:#010x} with an empty shadow stack; event ignored");
            return;
        };
        self.close_frame(address, cycles.saturating_sub(frame.start_cycle));
    }

    /// Attribute `elapsed` cycles to the symbol at `address` and, when
    /// the caller is a different symbol, to the caller's edge.
    fn close_frame(&mut self, address: u32, elapsed: u64) {
        let Some(to) = self.symbols.lookup(address) else {
            error!("address {address:#010x} not found in symbol table");
            return;
        };

        match self.stack.top() {
            Some(top) => match self.symbols.lookup(top.address) {
                Some(from) if from != to => {
                    self.symbols.add_cycles(to, elapsed);
                    self.matrix.add_cycles(from, to, elapsed);
                }
                // Direct self-recursion return: the outer frame's own
                // close will carry the full span.
                Some(_) => {}
                None => {
                    error!("caller address {:#010x} not in symbol table", top.address);
                    self.symbols.add_cycles(to, elapsed);
                }
            },
            None => self.symbols.add_cycles(to, elapsed),
        }
    }

    /// Close frames still open at EOF against the last observed cycle.
    pub fn finish(&mut self) {
        while let Some(frame) = self.stack.pop() {
            self.close_frame(frame.address, self.last_cycle.saturating_sub(frame.start_cycle));
        }
    }

    /// Attribute self and cumulative cycles per symbol, fill the hot
    /// list, and apply the self-recursion presentation rule.
    pub fn reduce(&mut self) -> Report {
        let total = self.window.total().max(1);
        let count = self.symbols.len();
        let mut stats = Vec::with_capacity(count);
        let mut hot = HotList::new();

        for i in 0..count {
            let other: u64 = (0..count)
                .filter(|&j| j != i)
                .map(|j| self.matrix.get(i, j).total_cycles)
                .sum();
            let cumulative = self.symbols.get(i).total_cycles;
            let self_cycles = cumulative.saturating_sub(other);

            hot.insert(HotEntry {
                symbol: i,
                percent: self_cycles as f64 / total as f64 * 100.0,
                self_cycles,
            });

            // A recursive function shows its cumulative total on the
            // self-edge.
            if self.matrix.get(i, i).total_calls > 0 {
                self.matrix.set_cycles(i, i, cumulative);
            }

            stats.push(SymbolStats {
                cumulative,
                self_cycles,
                other,
            });
        }

        Report { stats, hot, total }
    }
}
