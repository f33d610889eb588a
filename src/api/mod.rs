pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::ml::InferencePipeline;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<InferencePipeline>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(pipeline: Arc<InferencePipeline>) -> Self {
        Self {
            pipeline,
            started_at: Instant::now(),
        }
    }
}
