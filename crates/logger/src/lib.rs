mod control;
mod subscriber;

pub use control::{LEVELS, LogConfig, LogControl, LogError, parse_level};
pub use subscriber::{init, init_with_level, scoped, scoped_with};
pub use tracing::level_filters::LevelFilter;
