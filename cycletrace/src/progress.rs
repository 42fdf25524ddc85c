//! Console progress bar for the decode pass.

use std::io::{self, Write};

const BAR_LENGTH: u64 = 50;

pub struct Progress {
    total: u64,
    last_percent: i64,
}

impl Progress {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            last_percent: -1,
        }
    }

    /// Redraw when the integer percentage changes.
    pub fn update(&mut self, bytes_read: u64) {
        if self.total == 0 {
            return;
        }
        let percent = (bytes_read * 100 / self.total) as i64;
        if percent != self.last_percent {
            self.last_percent = percent;
            self.draw(percent as u64);
        }
    }

    /// Leave the cursor on a fresh line if the bar stopped short of
    /// 100% (truncated input).
    pub fn finish(&mut self) {
        if (0..100).contains(&self.last_percent) {
            println!();
        }
    }

    fn draw(&self, percent: u64) {
        let filled = percent * BAR_LENGTH / 100;
        print!("\r[");
        for i in 0..BAR_LENGTH {
            if i < filled {
                print!("#");
            } else {
                print!("-");
            }
        }
        print!("] {percent}%");
        if percent == 100 {
            println!();
        }
        let _ = io::stdout().flush();
    }
}
