pub mod processor;
pub mod promotion;

pub use processor::{BonificationOutcome, group_documents, process_document};
