//! Tool dispatch layer: schema-validated, sanitized, audited routing from
//! LLM-generated tool invocations to concrete handlers, plus the trip
//! store those handlers persist through.

pub mod audit;
pub mod catalog;
pub mod handlers;
pub mod router;
pub mod sanitizer;
pub mod schema;
pub mod search;
pub mod trips;

pub use router::{ToolHandler, ToolRouter};
pub use trips::TripStore;
