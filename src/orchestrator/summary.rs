use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::observability::MetricsSnapshot;

/// Outcome counts of one orchestrator run. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub provider: String,
    /// Distinct ids in the universe
    pub universe: u64,
    /// Distinct items that got at least one attempt
    pub attempted: u64,
    pub succeeded: u64,
    /// Attempts beyond the first, over all items
    pub retried: u64,
    pub quarantined: u64,
    /// Already done before the run started
    pub skipped: u64,
    /// Pending but sitting in the failure ledger
    pub skipped_quarantined: u64,
    /// Items whose retries were cut short by cancellation
    pub interrupted: u64,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn new(run_id: Uuid, provider: impl Into<String>) -> Self {
        Self {
            run_id,
            provider: provider.into(),
            universe: 0,
            attempted: 0,
            succeeded: 0,
            retried: 0,
            quarantined: 0,
            skipped: 0,
            skipped_quarantined: 0,
            interrupted: 0,
            cancelled: false,
            elapsed: Duration::ZERO,
        }
    }

    pub(crate) fn apply(&mut self, metrics: MetricsSnapshot) {
        self.attempted = metrics.attempted;
        self.succeeded = metrics.succeeded;
        self.retried = metrics.retried;
        self.quarantined = metrics.quarantined;
        self.interrupted = metrics.interrupted;
    }

    /// Pending items this run did not bring to an outcome
    pub fn unfinished(&self) -> u64 {
        self.universe
            .saturating_sub(self.skipped + self.skipped_quarantined)
            .saturating_sub(self.succeeded + self.quarantined)
    }

    pub fn log(&self) {
        info!(
            run_id = %self.run_id,
            provider = %self.provider,
            universe = self.universe,
            attempted = self.attempted,
            succeeded = self.succeeded,
            retried = self.retried,
            quarantined = self.quarantined,
            skipped = self.skipped,
            skipped_quarantined = self.skipped_quarantined,
            interrupted = self.interrupted,
            cancelled = self.cancelled,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "Run finished"
        );
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run {} ({})", self.run_id, self.provider)?;
        writeln!(f, "  universe:            {}", self.universe)?;
        writeln!(f, "  attempted:           {}", self.attempted)?;
        writeln!(f, "  succeeded:           {}", self.succeeded)?;
        writeln!(f, "  retried:             {}", self.retried)?;
        writeln!(f, "  quarantined:         {}", self.quarantined)?;
        writeln!(f, "  skipped (done):      {}", self.skipped)?;
        writeln!(f, "  skipped (failures):  {}", self.skipped_quarantined)?;
        writeln!(f, "  interrupted:         {}", self.interrupted)?;
        if self.cancelled {
            writeln!(f, "  cancelled:           yes")?;
        }
        write!(f, "  elapsed:             {:.1}s", self.elapsed.as_secs_f64())
    }
}
