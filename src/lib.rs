pub mod config;
pub mod dates;
pub mod error;
pub mod fetch;
pub mod load;
pub mod pipeline;
pub mod process;
pub mod schema;

pub use config::{DatabaseTarget, PipelineConfig, RawConfig};
pub use error::{ConfigError, ExtractError, FetchError, LoadError, PipelineError, TransformError};
pub use pipeline::{run, PipelineContext, RunReport, RunState};
