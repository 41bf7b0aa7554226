pub mod desk;
pub mod expand;
pub mod pipeline;
pub mod window;

pub use desk::EntryDesk;
pub use expand::{expand, BetLine, RawLine};
pub use pipeline::{AdmissionPipeline, SubmitOutcome, SubmitRequest};
pub use window::{DrawWindowResolver, WindowDecision};
