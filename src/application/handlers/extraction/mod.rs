//! Lead extraction handlers - single-conversation extraction and batch passes.

mod extract_lead;
mod run_batch;

pub use extract_lead::{ExtractLeadCommand, ExtractionError, ExtractionOutcome, LeadExtractor};
pub use run_batch::{run_scheduler, BatchItem, BatchItemStatus, BatchReport, BatchScheduler};
