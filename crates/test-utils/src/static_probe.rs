use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rrmflow::errors::Result;
use rrmflow::manifest::OutputProbe;
use rrmflow::types::Step;

/// Probe with fixed answers that counts refreshes.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    present: BTreeMap<Step, bool>,
    refreshes: Arc<AtomicUsize>,
}

impl StaticProbe {
    /// Nothing present: every step starts `to-do`.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_present(mut self, step: Step) -> Self {
        self.present.insert(step, true);
        self
    }

    /// Shared counter, readable after the probe moved into a scheduler.
    pub fn refresh_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.refreshes)
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

impl OutputProbe for StaticProbe {
    fn probe(&mut self) -> Result<BTreeMap<Step, bool>> {
        Ok(self.present.clone())
    }

    fn refresh(&mut self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
