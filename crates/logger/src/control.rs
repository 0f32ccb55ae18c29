use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Registry, reload};

/// Level names understood by [`parse_level`], most verbose first.
pub const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid level '{0}'. Available: trace, debug, info, warn, error")]
    InvalidLevel(String),
    #[error("Invalid logger name '{0}'")]
    InvalidTarget(String),
    #[error("Failed to apply log filter: {0}")]
    Reload(#[from] reload::Error),
}

/// Parse a level name. `warning` and `critical` are accepted as aliases.
pub fn parse_level(name: &str) -> Result<LevelFilter, LogError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" | "warning" => Ok(LevelFilter::WARN),
        "error" | "critical" => Ok(LevelFilter::ERROR),
        "off" => Ok(LevelFilter::OFF),
        _ => Err(LogError::InvalidLevel(name.to_owned())),
    }
}

fn level_name(level: LevelFilter) -> &'static str {
    if level == LevelFilter::TRACE {
        "trace"
    } else if level == LevelFilter::DEBUG {
        "debug"
    } else if level == LevelFilter::INFO {
        "info"
    } else if level == LevelFilter::WARN {
        "warn"
    } else if level == LevelFilter::ERROR {
        "error"
    } else {
        "off"
    }
}

/// Snapshot of the active filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub global_level: String,
    pub targets: BTreeMap<String, String>,
    /// Span and field directives from `RUST_LOG`, applied as written
    pub other_directives: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct FilterState {
    global: LevelFilter,
    targets: BTreeMap<String, LevelFilter>,
    other: Vec<String>,
}

impl FilterState {
    /// `global` with comma separated `RUST_LOG` style directives on top. A bare
    /// level replaces `global`, `target=level` becomes a target override and
    /// anything else is kept verbatim.
    pub(crate) fn parse(global: LevelFilter, directives: &str) -> Self {
        let mut state = Self { global, targets: BTreeMap::new(), other: Vec::new() };

        for directive in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            if let Ok(level) = parse_level(directive) {
                state.global = level;
                continue;
            }

            let target_level = directive
                .split_once('=')
                .filter(|(target, _)| !target.is_empty() && validate_target(target).is_ok())
                .and_then(|(target, level)| Some((target, parse_level(level).ok()?)));
            match target_level {
                Some((target, level)) => {
                    state.targets.insert(target.to_owned(), level);
                }
                None => state.other.push(directive.to_owned()),
            }
        }

        state
    }

    fn directives(&self) -> String {
        self.other
            .iter()
            .cloned()
            .chain(
                self.targets
                    .iter()
                    .map(|(target, level)| format!("{target}={}", level_name(*level))),
            )
            .collect::<Vec<_>>()
            .join(",")
    }

    pub(crate) fn build(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(self.global.into())
            .parse_lossy(self.directives())
    }
}

/// Runtime handle over the installed filter.
pub struct LogControl {
    handle: reload::Handle<EnvFilter, Registry>,
    state: Mutex<FilterState>,
}

impl LogControl {
    pub(crate) fn new(handle: reload::Handle<EnvFilter, Registry>, state: FilterState) -> Self {
        Self { handle, state: Mutex::new(state) }
    }

    pub fn levels(&self) -> &'static [&'static str] {
        &LEVELS
    }

    pub fn config(&self) -> LogConfig {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        LogConfig {
            global_level: level_name(state.global).to_owned(),
            targets: state
                .targets
                .iter()
                .map(|(target, level)| (target.clone(), level_name(*level).to_owned()))
                .collect(),
            other_directives: state.other.clone(),
        }
    }

    /// Change the global level, or the level of a single target (module path)
    /// when `target` is given and non-empty.
    pub fn set_level(&self, level: &str, target: Option<&str>) -> Result<(), LogError> {
        let level = parse_level(level)?;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let mut next = state.clone();
        match target.map(str::trim).filter(|target| !target.is_empty()) {
            Some(target) => {
                validate_target(target)?;
                next.targets.insert(target.to_owned(), level);
            }
            None => next.global = level,
        }

        self.handle.reload(next.build())?;
        *state = next;
        Ok(())
    }
}

fn validate_target(target: &str) -> Result<(), LogError> {
    let valid = target
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'));
    if valid { Ok(()) } else { Err(LogError::InvalidTarget(target.to_owned())) }
}
