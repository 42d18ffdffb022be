//! Run statistics
//!
//! Accumulates per-batch counts across a whole harvest run and prints a
//! summary at the end.

use crate::state::{BatchResult, GroupStatus};
use std::time::Duration;

/// Aggregated statistics for a harvest run
#[derive(Debug, Clone, Default)]
pub struct RunStatistics {
    /// Batches processed
    pub batches: usize,

    /// Groups resolved by some candidate
    pub groups_resolved: usize,

    /// Groups where every candidate failed
    pub groups_failed: usize,

    /// Failed groups that were stopped by a batch deadline
    pub groups_cancelled: usize,

    /// Failure records produced (one per failed candidate)
    pub failed_candidates: usize,

    /// Attempts dispatched by winning candidates and failed candidates
    pub attempts: u64,

    /// Sum of batch wall-clock durations
    pub elapsed: Duration,
}

impl RunStatistics {
    /// Creates empty statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one batch into the totals
    pub fn record_batch(&mut self, batch: &BatchResult) {
        self.batches += 1;
        self.groups_resolved += batch.successes.len();
        self.groups_failed += batch.failures.len();
        self.groups_cancelled += batch.failures.iter().filter(|g| g.was_cancelled()).count();
        self.failed_candidates += batch.failed_candidates();
        self.elapsed += batch.elapsed;

        for group in batch.successes.iter().chain(batch.failures.iter()) {
            self.attempts += match &group.status {
                GroupStatus::Resolved { attempts, .. } => u64::from(*attempts),
                GroupStatus::Failed(failures) => {
                    failures.iter().map(|f| u64::from(f.attempts)).sum()
                }
            };
        }
    }

    /// Total groups seen
    pub fn total_groups(&self) -> usize {
        self.groups_resolved + self.groups_failed
    }

    /// Returns the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.total_groups();
        if total == 0 {
            return 0.0;
        }
        (self.groups_resolved as f64 / total as f64) * 100.0
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &RunStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Batches processed: {}", stats.batches);
    println!("  Groups: {}", stats.total_groups());
    println!("  Resolved: {}", stats.groups_resolved);
    println!("  Failed: {}", stats.groups_failed);
    if stats.groups_cancelled > 0 {
        println!("  Stopped by deadline: {}", stats.groups_cancelled);
    }
    println!("  Failed candidates: {}", stats.failed_candidates);
    println!("  Attempts recorded: {}", stats.attempts);
    println!("  Processing time: {:.2?}", stats.elapsed);
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} groups resolved)",
        stats.success_rate(),
        stats.groups_resolved,
        stats.total_groups()
    );
}
