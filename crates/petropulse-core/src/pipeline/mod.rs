mod ingest;
mod scheduler;

pub use ingest::{
    filter_by_date, Candidates, Collected, CommitReport, IngestOptions, IngestPipeline, IngestReport,
};
pub use scheduler::{SchedulerEvent, SchedulerService};
