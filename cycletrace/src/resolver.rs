//! Address-to-name bridge over an external `addr2line` subprocess.
//!
//! The contract with the tool is line-oriented: the first line of its
//! standard output is the function name. Spawn failures and empty
//! output are non-fatal; the symbol keeps an empty name.

use std::path::PathBuf;
use std::process::Command;

use log::warn;

/// Toolchain-installed resolver used when nothing else is configured.
pub const DEFAULT_ADDR2LINE: &str = "/opt/toolchains/dc/sh-elf/bin/sh-elf-addr2line";

const TOOL_NAME: &str = "sh-elf-addr2line";

pub trait NameResolver {
    fn resolve(&mut self, address: u32) -> Option<String>;
}

/// Closures make convenient resolvers in tests.
impl<F: FnMut(u32) -> Option<String>> NameResolver for F {
    fn resolve(&mut self, address: u32) -> Option<String> {
        self(address)
    }
}

pub struct Addr2Line {
    tool: PathBuf,
    program: PathBuf,
}

impl Addr2Line {
    /// Use `tool` when given; otherwise the toolchain default, or a
    /// bare `sh-elf-addr2line` found on PATH.
    pub fn new(tool: Option<PathBuf>, program: PathBuf) -> Self {
        let tool = tool.unwrap_or_else(|| {
            let default = PathBuf::from(DEFAULT_ADDR2LINE);
            if default.exists() {
                default
            } else {
                which::which(TOOL_NAME).unwrap_or(default)
            }
        });
        Self { tool, program }
    }
}

impl NameResolver for Addr2Line {
    fn resolve(&mut self, address: u32) -> Option<String> {
        let output = match Command::new(&self.tool)
            .arg("-e")
            .arg(&self.program)
            .arg("-f")
            .arg("-s")
            .arg(format!("0x{address:x}"))
            .output()
        {
            Ok(output) => output,
            Err(err) => {
                warn!("failed to run {}: {err}", self.tool.display());
                return None;
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        // lines() strips the newline and any trailing carriage return.
        let name = stdout.lines().next().unwrap_or("").to_string();
        if name.is_empty() {
            warn!(
                "{} produced no name for {address:#010x}",
                self.tool.display()
            );
            None
        } else {
            Some(name)
        }
    }
}
