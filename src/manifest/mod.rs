// src/manifest/mod.rs

//! Expected output files per step and the output-existence probe.
//!
//! The scheduler only sees the [`OutputProbe`] trait: one probe before the
//! run seeds `to-do` / `complete`, and one `refresh` after every finished
//! step keeps the shared listing current.
//!
//! Output templates are expanded against the interpreter's variable map.
//! A `{date}` placeholder marks the part of a file name that carries a
//! date; with [`DateMatch::Latest`] any date there is accepted and the
//! lexically latest candidate wins.

pub mod listing;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::interp::{Expander, VariableMap};
use crate::types::{DateMatch, Step};

pub use listing::OutputListing;

/// Placeholder for the date portion of an output file name.
pub const DATE_PLACEHOLDER: &str = "{date}";

/// Collaborator interface consumed by the scheduler.
pub trait OutputProbe: Send {
    /// Refresh the listing and report, per step, whether all of its expected
    /// outputs already exist.
    fn probe(&mut self) -> Result<BTreeMap<Step, bool>>;

    /// Re-read the output directory.
    fn refresh(&mut self) -> Result<()>;
}

/// Output templates of one step, before expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    pub step: Step,
    /// Variable that fills `{date}` (e.g. `date`, `ic_date`).
    pub date_var: Option<String>,
    /// output key → path template.
    pub outputs: BTreeMap<String, String>,
}

/// One expected file after variable expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedFile {
    /// Expanded path that may still contain `{date}`.
    pub pattern: String,
    /// Path currently expected on disk.
    pub resolved: PathBuf,
}

impl ExpectedFile {
    pub fn is_dated(&self) -> bool {
        self.pattern.contains(DATE_PLACEHOLDER)
    }
}

/// File manifest for all steps plus the shared output listing.
#[derive(Debug, Clone)]
pub struct OutputManifest {
    output_root: Option<PathBuf>,
    files: BTreeMap<Step, BTreeMap<String, ExpectedFile>>,
    listing: OutputListing,
    fs: Arc<dyn FileSystem>,
    date_match: DateMatch,
}

impl OutputManifest {
    /// Expand every step's templates against `vars`.
    ///
    /// The output directory is the `output_root` variable.
    pub fn new(
        vars: &VariableMap,
        specs: impl IntoIterator<Item = OutputSpec>,
        fs: Arc<dyn FileSystem>,
        date_match: DateMatch,
    ) -> Self {
        let no_env = HashMap::new();
        let expander = Expander::new(vars, &no_env, None);

        let mut files = BTreeMap::new();
        for spec in specs {
            let date = spec.date_var.as_deref().and_then(|v| vars.get(v));
            let expected = spec
                .outputs
                .iter()
                .map(|(key, template)| {
                    let pattern = expander.expand_variables(template);
                    let resolved = match date {
                        Some(date) => PathBuf::from(pattern.replace(DATE_PLACEHOLDER, date)),
                        None => PathBuf::from(&pattern),
                    };
                    (key.clone(), ExpectedFile { pattern, resolved })
                })
                .collect();
            files.insert(spec.step, expected);
        }

        Self {
            output_root: vars.get("output_root").map(PathBuf::from),
            files,
            listing: OutputListing::new(),
            fs,
            date_match,
        }
    }

    pub fn output_root(&self) -> Option<&Path> {
        self.output_root.as_deref()
    }

    /// Handle on the shared listing.
    pub fn listing(&self) -> OutputListing {
        self.listing.clone()
    }

    /// Expected files of a step, keyed by output name.
    pub fn expected_files(&self, step: Step) -> Option<&BTreeMap<String, ExpectedFile>> {
        self.files.get(&step)
    }

    /// Whether every expected file of `step` is in the current listing.
    ///
    /// A step without expected outputs never counts as present.
    pub fn outputs_present(&self, step: Step) -> bool {
        let snapshot = self.listing.snapshot();
        match self.files.get(&step) {
            Some(files) if !files.is_empty() => {
                files.values().all(|f| snapshot.contains(&f.resolved))
            }
            _ => false,
        }
    }

    /// Point dated outputs of `step` at the latest matching file on disk.
    fn adopt_latest_dates(&mut self, step: Step) {
        let snapshot = self.listing.snapshot();
        let Some(files) = self.files.get_mut(&step) else {
            return;
        };

        for (key, file) in files.iter_mut() {
            if !file.is_dated() || snapshot.contains(&file.resolved) {
                continue;
            }
            match latest_dated_match(&file.pattern, &snapshot) {
                Some(found) => {
                    debug!(step = %step, output = %key, path = %found.display(), "using alternate date");
                    file.resolved = found;
                }
                None => {
                    debug!(step = %step, output = %key, "no file with any date found");
                }
            }
        }
    }
}

impl OutputProbe for OutputManifest {
    fn probe(&mut self) -> Result<BTreeMap<Step, bool>> {
        self.refresh()?;

        let steps: Vec<Step> = self.files.keys().copied().collect();
        let mut found = BTreeMap::new();
        for step in steps {
            if !self.outputs_present(step) && self.date_match == DateMatch::Latest {
                self.adopt_latest_dates(step);
            }
            let present = self.outputs_present(step);
            info!(step = %step, present, "output probe");
            found.insert(step, present);
        }
        Ok(found)
    }

    fn refresh(&mut self) -> Result<()> {
        let entries: BTreeSet<PathBuf> = match &self.output_root {
            None => {
                warn!("`output_root` is not set; treating output listing as empty");
                BTreeSet::new()
            }
            Some(root) => match self.fs.read_dir(root) {
                Ok(paths) => paths.into_iter().collect(),
                Err(e) => {
                    warn!(dir = %root.display(), error = %e, "cannot list output directory");
                    BTreeSet::new()
                }
            },
        };

        debug!(entries = entries.len(), "output listing refreshed");
        self.listing.replace(entries);
        Ok(())
    }
}

/// Find the lexically latest listed file matching `pattern` with any run of
/// digits and dashes in place of `{date}`.
fn latest_dated_match(pattern: &str, listing: &BTreeSet<PathBuf>) -> Option<PathBuf> {
    let path = Path::new(pattern);
    let dir = path.parent()?;
    let name = path.file_name()?.to_str()?;
    let (before, after) = name.split_once(DATE_PLACEHOLDER)?;

    let re = Regex::new(&format!(
        "^{}[0-9-]*{}$",
        regex::escape(before),
        regex::escape(after)
    ))
    .ok()?;

    listing
        .iter()
        .filter(|p| p.parent() == Some(dir))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| re.is_match(n))
        })
        .max()
        .cloned()
}
