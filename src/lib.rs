pub mod checkpoint_writer;
pub mod config;
pub mod delay_manager;
pub mod error;
pub mod geocoder;
pub mod http_client;
pub mod input_loader;
pub mod logger;
pub mod pipeline;
pub mod progress;
pub mod resume_manager;

// Exporting types for convenience
pub use checkpoint_writer::CheckpointWriter;
pub use config::Settings;
pub use delay_manager::RateLimiter;
pub use error::{PipelineError, RequestError};
pub use geocoder::{AddressLookup, GeocodeOutcome, Geocoder};
pub use http_client::{RetryPolicy, RetryingHttpClient};
pub use input_loader::{InputRecord, ResultRecord};
pub use pipeline::{PipelineDriver, PipelineState, RunOutcome, RunSummary};
pub use progress::{ProgressReporter, ProgressSnapshot};
pub use resume_manager::ResumeState;
