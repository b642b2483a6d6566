pub mod image_ops;
pub mod metrics;

// Re-export commonly used items
pub use image_ops::{
    encode_jpeg, fit_within, normalize_image_async, normalize_image_sync, to_data_uri,
};
pub use metrics::{Metrics, MetricsSnapshot};
