//! Report sinks: where finished session reports go.
//!
//! Publication is fire-and-forget. A sink failure is logged and never
//! affects the session that produced the report.

mod directory;
mod history;
pub mod markdown;

use anyhow::Result;
use tracing::{info, warn};

use crate::report::SessionReport;

pub use directory::{DirectorySink, ReportPaths};
pub use history::{HistoryEntry, HistorySink};

/// A destination for finished session reports.
pub trait ReportSink: Send + Sync {
    fn name(&self) -> &str;

    fn publish(&self, report: &SessionReport) -> Result<()>;
}

/// Publish to every sink. Returns how many succeeded.
pub fn publish_report(sinks: &[&dyn ReportSink], report: &SessionReport) -> usize {
    let mut delivered = 0;
    for sink in sinks {
        match sink.publish(report) {
            Ok(()) => {
                info!(sink = sink.name(), session = %report.session_id, "report published");
                delivered += 1;
            }
            Err(e) => {
                warn!(
                    sink = sink.name(),
                    session = %report.session_id,
                    error = %format!("{e:#}"),
                    "report publication failed"
                );
            }
        }
    }
    delivered
}
