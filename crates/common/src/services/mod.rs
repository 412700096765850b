//! Application services
//!
//! Each service owns one slice of behaviour and checks the caller's
//! access before touching data or collaborators.

pub mod chat;
pub mod documents;
pub mod enrichment;
pub mod query;

pub use chat::{ChatAnswer, ChatService};
pub use documents::{DocumentService, ImageContent, Upload};
pub use enrichment::EnrichmentService;
pub use query::DocumentQueryService;
