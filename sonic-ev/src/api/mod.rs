//! HTTP API handlers for sonic-ev
//!
//! REST endpoints plus SSE event streaming.

pub mod evaluate;
pub mod evaluators;
pub mod health;
pub mod jobs;
pub mod segments;
pub mod sse;
pub mod summary;

pub use evaluate::evaluate_routes;
pub use evaluators::evaluator_routes;
pub use health::health_routes;
pub use jobs::job_routes;
pub use segments::segment_routes;
pub use sse::event_stream;
pub use summary::summary_routes;
