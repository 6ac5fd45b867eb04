pub mod config;
pub mod context;
pub mod entry;
pub mod layer;
pub mod level;
pub mod logger;
pub mod middleware;

pub use config::RequestLoggerConfig;
pub use context::{AppEnv, RequestContext, ResponseLifecycle};
pub use entry::{LogEntry, RequestEntry, ResponseEntry};
pub use layer::{LifecycleBody, RequestLoggerLayer, RequestLoggerService};
pub use level::Level;
pub use logger::{LogRecord, Logger, MemoryLogger, TracingLogger};
pub use middleware::RequestLogger;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

pub fn init_logging(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new("info"));

  let json = format == LogFormat::Json;
  tracing_subscriber::registry()
    .with(json.then(|| tracing_subscriber::fmt::layer().json()))
    .with((!json).then(tracing_subscriber::fmt::layer))
    .with(filter)
    .init();
}
