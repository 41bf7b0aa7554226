pub mod admission;
pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logger;
pub mod report;
pub mod settle;
pub mod state;
pub mod storage;

pub use admission::{AdmissionPipeline, EntryDesk, RawLine, SubmitOutcome, SubmitRequest};
pub use report::{Report, ReportAggregator, ReportKind, ReportRequest};
