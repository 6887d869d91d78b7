//! HTTP request handlers shared by both services.

pub mod health;
pub mod metrics;

pub use health::health_check;
pub use metrics::render_metrics;
