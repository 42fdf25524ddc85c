//! Dense caller/callee adjacency matrix.
//!
//! Cell (from, to) carries how many times `from` invoked `to` and the
//! cycles attributed to that edge. Only the submatrix up to the
//! current symbol count is meaningful.

use crate::symbols::MAX_FUNCTIONS;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CallEdge {
    pub total_calls: u32,
    pub total_cycles: u64,
}

pub struct CallMatrix {
    cells: Vec<CallEdge>,
}

impl CallMatrix {
    pub fn new() -> Self {
        Self {
            cells: vec![CallEdge::default(); MAX_FUNCTIONS * MAX_FUNCTIONS],
        }
    }

    pub fn get(&self, from: usize, to: usize) -> CallEdge {
        self.cells[from * MAX_FUNCTIONS + to]
    }

    pub fn record_call(&mut self, from: usize, to: usize) {
        self.cells[from * MAX_FUNCTIONS + to].total_calls += 1;
    }

    pub fn add_cycles(&mut self, from: usize, to: usize, cycles: u64) {
        self.cells[from * MAX_FUNCTIONS + to].total_cycles += cycles;
    }

    pub fn set_cycles(&mut self, from: usize, to: usize, cycles: u64) {
        self.cells[from * MAX_FUNCTIONS + to].total_cycles = cycles;
    }
}

impl Default for CallMatrix {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_default_to_zero_and_accumulate() {
        let mut matrix = CallMatrix::new();
        assert_eq!(matrix.get(3, 7), CallEdge::default());

        matrix.record_call(3, 7);
        matrix.record_call(3, 7);
        matrix.add_cycles(3, 7, 250);
        assert_eq!(
            matrix.get(3, 7),
            CallEdge {
                total_calls: 2,
                total_cycles: 250
            }
        );
        // The transpose is a distinct edge.
        assert_eq!(matrix.get(7, 3), CallEdge::default());
    }
}
