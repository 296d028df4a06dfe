//! Run statistics printed at exit.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use ingestion::CycleReport;
use rate_limiter::LimiterStatus;

/// Statistics of one source loop
#[derive(Debug, Clone)]
pub struct SourceStats {
    pub source: String,
    pub last_processed: u64,
    /// Ingestion counters over all cycles
    pub report: CycleReport,
    /// Unit-level counters of the delivery pipeline
    pub delivery: MetricsSnapshot,
}

/// Statistics from a relay run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Per source, sorted by source id
    pub sources: Vec<SourceStats>,

    /// Sources that could not be started
    pub failed_sources: usize,

    /// Limiter state at shutdown
    pub limiter: LimiterStatus,
}

impl RunStats {
    /// Ingestion counters summed over all sources
    pub fn total(&self) -> CycleReport {
        self.sources.iter().fold(CycleReport::default(), |mut acc, s| {
            acc += s.report;
            acc
        })
    }

    /// Unit counters summed over all sources
    pub fn total_delivery(&self) -> MetricsSnapshot {
        self.sources
            .iter()
            .fold(MetricsSnapshot::default(), |acc, s| acc + s.delivery)
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                      Relay Statistics                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        let total = self.total();
        let units = self.total_delivery();

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!(
            "   ├─ Sources: {} ({} failed to start)",
            self.sources.len(),
            self.failed_sources
        );
        println!("   ├─ Records delivered: {}", total.delivered);
        println!("   ├─ Records partial: {}", total.partial);
        println!("   ├─ Records failed: {}", total.failed);
        println!("   ├─ Placeholders: {}", total.placeholders);
        println!("   └─ Units sent: {} ({} failed)", units.units_sent, units.units_failed);

        for (i, source) in self.sources.iter().enumerate() {
            let is_last = i == self.sources.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            let child = if is_last { "   " } else { "│  " };
            let report = &source.report;

            if i == 0 {
                println!("\n📡 Sources");
            }
            println!("   {} {} (last processed {})", prefix, source.source, source.last_processed);
            println!(
                "   {}  ├─ cycles {}, fetch failures {}",
                child, report.cycles, report.fetch_failures
            );
            println!(
                "   {}  ├─ delivered {}, partial {}, failed {}, skipped {}",
                child,
                report.delivered,
                report.partial,
                report.failed,
                report.skipped + report.grouped_skipped
            );
            println!(
                "   {}  └─ placeholders {}, units sent {}, media failures {}",
                child, report.placeholders, source.delivery.units_sent, source.delivery.media_failures
            );
        }

        println!("\n🚦 {}", self.limiter);
    }
}
