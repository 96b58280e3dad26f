// src/engine/status_file.rs

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::dag::DependencyGraph;
use crate::engine::StatusTable;
use crate::fs::FileSystem;

/// Progress file rewritten after every iteration.
#[derive(Debug, Clone)]
pub struct StatusFile {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl StatusFile {
    pub fn new(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: path.into(),
            fs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the file. Write errors are logged, never returned.
    pub fn write(&self, iteration: u64, table: &StatusTable, graph: &DependencyGraph) {
        let text = render(iteration, table, graph);
        if let Err(e) = self.fs.write(&self.path, text.as_bytes()) {
            warn!(path = %self.path.display(), error = %e, "failed to write status file");
        }
    }
}

/// Plain-text table of every step's status.
pub fn render(iteration: u64, table: &StatusTable, graph: &DependencyGraph) -> String {
    let blocked = table.blocked_steps(graph);
    let mut out = String::new();
    let _ = writeln!(out, "iteration: {iteration}");
    let _ = writeln!(out, "{:<12} {:<12} {}", "step", "status", "retries");
    for step in table.steps() {
        let mut status = table.status(step).to_string();
        if blocked.contains(&step) {
            status.push_str(" (blocked)");
        }
        let _ = writeln!(out, "{:<12} {:<12} {}", step.as_str(), status, table.retries(step));
    }
    out
}
