use std::collections::BTreeMap;

use crate::config::JsonConfig;
use crate::dex::DexProgram;

/// Named counters reported by a pass run. Ordered so reports are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassStats {
    metrics: BTreeMap<String, u64>,
}

impl PassStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&mut self, metric: &str, by: u64) {
        if by > 0 {
            *self.metrics.entry(metric.to_owned()).or_insert(0) += by;
        }
    }

    #[must_use]
    pub fn get(&self, metric: &str) -> u64 {
        self.metrics.get(metric).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.metrics.iter().map(|(name, &count)| (name.as_str(), count))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// One whole-program optimization pass.
///
/// Passes are `Sync` so they may fan their per-method work out to a worker
/// pool; any shared state a pass keeps must be read-only during `run`.
pub trait Pass: Sync {
    fn name(&self) -> &'static str;

    fn run(&self, program: &mut DexProgram, config: &JsonConfig) -> PassStats;
}

/// Runs registered passes over the program in order and logs their metrics.
#[derive(Default)]
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl PassManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    /// Run every pass in registration order, returning per-pass statistics.
    pub fn run_passes(
        &self,
        program: &mut DexProgram,
        config: &JsonConfig,
    ) -> Vec<(&'static str, PassStats)> {
        let mut results = Vec::with_capacity(self.passes.len());
        for pass in &self.passes {
            tracing::info!(pass = pass.name(), "running pass");
            let stats = pass.run(program, config);
            for (metric, count) in stats.iter() {
                tracing::debug!(pass = pass.name(), metric, count);
            }
            results.push((pass.name(), stats));
        }
        results
    }
}
