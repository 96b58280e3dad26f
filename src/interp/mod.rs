// src/interp/mod.rs

//! Interpreter for the restricted shell-like `config.sh` syntax.
//!
//! Supported grammar (one construct per line):
//!
//! ```text
//! # comment line (ignored)
//! KEY=literal or ${OTHER_KEY} or $OTHER_KEY or `cmd arg`
//! if [ "$A" == "$B" ]; then
//! KEY2=value      # only applied if A == B after expansion
//! fi
//! ```
//!
//! Everything else is either ignored (plain commands) or rejected with a
//! [`RrmflowError::ConfigParse`] (nested `if`, `else`/`elif`, stray `fi`,
//! unterminated `if`, conditionals that are not a single `==`).
//!
//! - [`expand`] resolves `$NAME` / `${NAME}` and runs backtick substitutions.
//! - [`line`] classifies individual lines and evaluates conditions.

pub mod expand;
pub mod line;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::errors::{Result, RrmflowError};
use crate::fs::{FileSystem, RealFileSystem};

pub use expand::Expander;
use line::{block_keyword, classify, evaluate_condition, strip_inline_comment, Line};

/// Key/value parameters produced by the interpreter.
pub type VariableMap = BTreeMap<String, String>;

/// An open `if` block.
#[derive(Debug, Clone, Copy)]
struct Block {
    line: usize,
    active: bool,
}

#[derive(Debug, Clone)]
pub struct ConfigInterpreter {
    env: HashMap<String, String>,
    fs: Arc<dyn FileSystem>,
}

impl Default for ConfigInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigInterpreter {
    /// Interpreter over the real filesystem with a snapshot of the current
    /// process environment.
    pub fn new() -> Self {
        Self {
            env: std::env::vars().collect(),
            fs: Arc::new(RealFileSystem),
        }
    }

    /// Replace the environment snapshot used as the last expansion fallback.
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// Read and interpret a config file.
    ///
    /// `PWD` inside the file resolves to the directory containing it.
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<VariableMap> {
        let path = path.as_ref();
        let source = self
            .fs
            .canonicalize(path)
            .unwrap_or_else(|_| path.to_path_buf());
        let text = self.fs.read_to_string(&source)?;
        self.parse_str(&text, &source)
    }

    /// Interpret config text as if it had been read from `source`.
    pub fn parse_str(&self, text: &str, source: &Path) -> Result<VariableMap> {
        let pwd = source
            .parent()
            .map(|p| p.to_string_lossy().into_owned());

        let mut vars = VariableMap::new();
        let mut block: Option<Block> = None;

        for (idx, raw) in text.lines().enumerate() {
            let lineno = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Inside a false branch only the block keywords matter.
            let parsed = if block.is_some_and(|b| !b.active) {
                match block_keyword(line) {
                    Some(keyword) => keyword,
                    None => {
                        trace!(line = lineno, "skipped inside inactive block");
                        continue;
                    }
                }
            } else {
                classify(line).map_err(|m| parse_error(source, lineno, m))?
            };

            match parsed {
                Line::Open => {
                    if let Some(open) = block {
                        return Err(parse_error(
                            source,
                            lineno,
                            format!(
                                "nested conditional (block opened on line {} is still open)",
                                open.line
                            ),
                        ));
                    }
                    let expanded =
                        Expander::new(&vars, &self.env, pwd.as_deref()).expand_variables(line);
                    let active = evaluate_condition(&expanded)
                        .map_err(|m| parse_error(source, lineno, m))?;
                    debug!(line = lineno, condition = %expanded, active, "conditional block");
                    block = Some(Block {
                        line: lineno,
                        active,
                    });
                }
                Line::Close => {
                    if block.take().is_none() {
                        return Err(parse_error(
                            source,
                            lineno,
                            "`fi` without a matching `if`".to_string(),
                        ));
                    }
                }
                Line::Unsupported(keyword) => {
                    return Err(parse_error(
                        source,
                        lineno,
                        format!("`{keyword}` is not supported; only single-level if/fi blocks are"),
                    ));
                }
                Line::Assignment { key, value } => {
                    let value = strip_inline_comment(value);
                    let expanded = Expander::new(&vars, &self.env, pwd.as_deref()).expand(value)?;
                    trace!(key = %key, value = %expanded, "assignment");
                    vars.insert(key.to_string(), expanded);
                }
                Line::Other => {
                    trace!(line = lineno, text = %line, "ignoring non-assignment line");
                }
            }
        }

        if let Some(open) = block {
            return Err(parse_error(
                source,
                open.line,
                "unterminated conditional: missing `fi`".to_string(),
            ));
        }

        debug!(path = %source.display(), variables = vars.len(), "config parsed");
        Ok(vars)
    }
}

fn parse_error(path: &Path, line: usize, message: String) -> RrmflowError {
    RrmflowError::ConfigParse {
        path: PathBuf::from(path),
        line,
        message,
    }
}
