//! Diagnostic dump surface.
//!
//! Text commands, one per invocation:
//!
//! | arg         | output                                                  |
//! |-------------|---------------------------------------------------------|
//! | `-h`        | usage                                                   |
//! | `-p`        | foreground pids and the pids owning a component         |
//! | `-a` / none | adapter backend status followed by every trust record   |
//!
//! Anything else prints the usage preceded by an error line.

use std::fmt::Write as _;
use std::sync::{Mutex, PoisonError};

use crate::application::manage_components::ComponentRegistry;

pub const USAGE: &str = "Usage:\n\
       -h: command help\n\
       -a: dump all security component info\n\
       -p: dump foreground processes\n";

/// Source of the pids currently in the foreground.
pub trait ForegroundTracker: Send + Sync {
    fn foreground_pids(&self) -> Vec<i32>;
}

/// Foreground list pushed in from outside the service.
#[derive(Debug, Default)]
pub struct StaticForegroundTracker {
    pids: Mutex<Vec<i32>>,
}

impl StaticForegroundTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_foreground(&self, pids: Vec<i32>) {
        *self.pids.lock().unwrap_or_else(PoisonError::into_inner) = pids;
    }
}

impl ForegroundTracker for StaticForegroundTracker {
    fn foreground_pids(&self) -> Vec<i32> {
        self.pids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Renders the dump selected by `args`.
pub fn dump(
    args: &[String],
    registry: &ComponentRegistry,
    foreground: &dyn ForegroundTracker,
) -> String {
    let mut out = String::new();
    match args.first().map(String::as_str) {
        Some("-h") => out.push_str(USAGE),
        Some("-p") => {
            let pids: Vec<String> = foreground
                .foreground_pids()
                .iter()
                .map(i32::to_string)
                .collect();
            let _ = writeln!(out, "foreground pids: [{}]", pids.join(", "));
            registry.dump_pids(&mut out);
        }
        None | Some("-a") => {
            for (role, status) in registry.adapter().status() {
                let _ = writeln!(out, "{role} backend: {status}");
            }
            let _ = writeln!(out, "components: {}", registry.len());
            registry.dump_all(&mut out);
        }
        Some(other) => {
            let _ = writeln!(out, "error: unknown option '{other}'");
            out.push_str(USAGE);
        }
    }
    out
}
