pub mod level;
pub mod value;
pub mod logger;
pub mod error;

pub mod record;
pub mod encoder;
pub mod color;
pub mod pool;
pub mod rotate;
pub mod sink;
pub mod noop_sink;

pub mod layer;
pub mod tracing_logger;
pub mod log_logger;
pub mod std_logger;

pub mod config;
pub mod env;
pub mod backend;
pub mod facade;
pub mod init;

pub use backend::{build_logger, build_writer_logger, Engine};
pub use config::{Config, FileConfig, FileMode, Format, OutputTarget};
pub use error::{Error, Result};
pub use facade::Log;
pub use init::{global, init_from_config, init_from_env, init_global};
pub use level::Level;
pub use logger::{with, with_context, Logger};
pub use value::{caller, default_timestamp, timestamp, Context, Value, Valuer};
