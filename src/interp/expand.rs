// src/interp/expand.rs

//! `$NAME` / `${NAME}` expansion and backtick command substitution.

use std::collections::{BTreeMap, HashMap};
use std::process::{Command, Stdio};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::errors::{Result, RrmflowError};

static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z0-9_]*)\}|\$([A-Za-z0-9_]*)").expect("variable pattern is valid")
});

static BACKTICK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]*)`").expect("backtick pattern is valid"));

/// Resolves variable references against, in order: the variables parsed so
/// far, the special `PWD` (directory of the config file), and an environment
/// snapshot. Unresolved references are left in the text untouched.
#[derive(Debug, Clone, Copy)]
pub struct Expander<'a> {
    vars: &'a BTreeMap<String, String>,
    env: &'a HashMap<String, String>,
    pwd: Option<&'a str>,
}

impl<'a> Expander<'a> {
    pub fn new(
        vars: &'a BTreeMap<String, String>,
        env: &'a HashMap<String, String>,
        pwd: Option<&'a str>,
    ) -> Self {
        Self { vars, env, pwd }
    }

    /// Resolve a single variable name.
    pub fn resolve(&self, name: &str) -> Option<&'a str> {
        if let Some(value) = self.vars.get(name) {
            return Some(value.as_str());
        }
        if name == "PWD" {
            if let Some(pwd) = self.pwd {
                return Some(pwd);
            }
        }
        self.env.get(name).map(|s| s.as_str())
    }

    /// Replace every `$NAME` / `${NAME}` that resolves; keep the rest literal.
    pub fn expand_variables(&self, text: &str) -> String {
        VARIABLE
            .replace_all(text, |caps: &Captures<'_>| {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or_default();

                if name.is_empty() {
                    return caps[0].to_string();
                }

                match self.resolve(name) {
                    Some(value) => value.to_string(),
                    None => {
                        debug!(variable = %name, "unresolved variable left unexpanded");
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    /// Variable expansion followed by command substitution.
    pub fn expand(&self, text: &str) -> Result<String> {
        let expanded = self.expand_variables(text);
        if expanded.contains('`') {
            substitute_commands(&expanded)
        } else {
            Ok(expanded)
        }
    }
}

/// Replace each `` `cmd arg...` `` segment with the trimmed stdout of running
/// `cmd` directly with whitespace-split arguments.
pub fn substitute_commands(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in BACKTICK.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        out.push_str(&run_substitution(&caps[1])?);
        last = whole.end();
    }

    out.push_str(&text[last..]);
    Ok(out)
}

fn run_substitution(command: &str) -> Result<String> {
    let fail = |message: String| RrmflowError::CommandSubstitution {
        command: command.to_string(),
        message,
    };

    let mut argv = command.split_whitespace();
    let program = argv
        .next()
        .ok_or_else(|| fail("empty command".to_string()))?;

    let output = Command::new(program)
        .args(argv)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| fail(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(fail(format!(
            "exited with {}: {}",
            output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| format!("code {c}")),
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    debug!(command = %command, output = %stdout, "command substitution");
    Ok(stdout)
}
