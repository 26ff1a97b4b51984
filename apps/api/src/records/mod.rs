// Record management: models, validation, persistence and ingestion, plus
// draft extraction from pasted profile text.

pub mod external;
pub mod handlers;
pub mod ingest;
pub mod models;
pub mod prompts;
pub mod store;
pub mod validation;
