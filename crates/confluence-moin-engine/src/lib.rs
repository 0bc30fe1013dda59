pub mod element;
pub mod export;
pub mod moin;
pub mod timestamp;
pub mod translate;
pub mod users;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use export::{Export, ExportError};
pub use moin::{PageWriter, WriteError, WriteSummary};
pub use timestamp::Timestamp;
pub use translate::{MarkupTranslator, TranslateError, translate, translate_to};
pub use users::{CrowdBackup, MoinUsers, UserError};
