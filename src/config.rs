//! Configuration values and the typed sink registry
//!
//! A configuration lists an optional time layout and an ordered list of
//! handlers. Each handler names its levels, a template, and sink
//! descriptors. A descriptor is a JSON object whose `type` field picks a
//! constructor from the [`SinkRegistry`]; the remaining fields are
//! deserialized into that constructor's own config struct.
//!
//! ```
//! use rust_log_pipeline::config::{LoggingConfig, SinkRegistry};
//!
//! let config = LoggingConfig::from_json_str(r#"{
//!     "time_format": "rfc3339",
//!     "handlers": [
//!         {"levels": ["warn", "error"], "format": "$level $message", "sinks": [{"type": "stderr"}]}
//!     ]
//! }"#).unwrap();
//!
//! let handlers = SinkRegistry::new().build_handlers(&config.handlers).unwrap();
//! assert_eq!(handlers[0].level_names(), ["warn", "error"]);
//! ```

use crate::core::{Handler, LoggerError, Result, Sink, TimestampFormat};
use crate::sinks::{ConsoleSink, FileConfig, FileSink, TimeRotateConfig, TimeRotateSink};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Top-level configuration applied with `Logger::apply_config`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Named layout or strftime string; `None` or empty keeps the current one
    #[serde(default, alias = "timeFormat")]
    pub time_format: Option<String>,
    #[serde(default)]
    pub handlers: Vec<HandlerConfig>,
}

impl LoggingConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            LoggerError::io_operation(
                "read configuration",
                format!("Failed to read '{}'", path.display()),
                e,
            )
        })?;
        Self::from_json_str(&text)
    }

    /// The layout to switch to, validated
    pub fn parsed_time_format(&self) -> Result<Option<TimestampFormat>> {
        match self.time_format.as_deref() {
            None | Some("") => Ok(None),
            Some(layout) => TimestampFormat::parse(layout).map(Some),
        }
    }
}

fn default_format() -> String {
    crate::core::handler::DEFAULT_FORMAT.to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandlerConfig {
    pub levels: Vec<String>,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default, alias = "writers")]
    pub sinks: Vec<SinkConfig>,
}

/// Untyped sink descriptor carrying a `type` discriminator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SinkConfig(Map<String, Value>);

impl SinkConfig {
    pub fn new(kind: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("type".to_string(), Value::String(kind.to_string()));
        Self(fields)
    }

    #[must_use = "builder methods return a new value"]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// The `type` discriminator, if present and a string
    pub fn kind(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// Every field except the discriminator
    fn settings(&self) -> Value {
        let mut fields = self.0.clone();
        fields.remove("type");
        Value::Object(fields)
    }
}

/// Settings for the `stderr` and `stdout` sink types
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsoleConfig {}

type SinkConstructor = Box<dyn Fn(&SinkConfig) -> Result<Arc<dyn Sink>> + Send + Sync>;

/// Maps a `type` discriminator to a constructor taking typed settings
///
/// # Example
///
/// ```
/// use rust_log_pipeline::config::{SinkConfig, SinkRegistry};
/// use rust_log_pipeline::sinks::ConsoleSink;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct QuietConfig {
///     stdout: bool,
/// }
///
/// let mut registry = SinkRegistry::new();
/// registry.register("quiet", |config: QuietConfig| {
///     Ok(if config.stdout { ConsoleSink::stdout() } else { ConsoleSink::stderr() })
/// });
///
/// let sink = registry.build(&SinkConfig::new("quiet").with("stdout", true)).unwrap();
/// assert_eq!(sink.name(), "stdout");
/// ```
pub struct SinkRegistry {
    constructors: HashMap<String, SinkConstructor>,
}

impl SinkRegistry {
    /// Registry with the built-in sink types
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("stderr", |_: ConsoleConfig| Ok(ConsoleSink::stderr()));
        registry.register("stdout", |_: ConsoleConfig| Ok(ConsoleSink::stdout()));
        registry.register("file", |config: FileConfig| FileSink::from_config(&config));
        registry.register("timerotate", TimeRotateSink::new);
        #[cfg(feature = "smtp")]
        registry.register("email", |config: crate::sinks::EmailConfig| {
            crate::sinks::BatchingEmailSink::from_config(&config)
        });
        registry
    }

    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Register `build` for `kind`, replacing any earlier constructor
    pub fn register<C, F, S>(&mut self, kind: impl Into<String>, build: F)
    where
        C: DeserializeOwned,
        F: Fn(C) -> Result<S> + Send + Sync + 'static,
        S: Sink + 'static,
    {
        let kind = kind.into();
        let component = kind.clone();
        let constructor: SinkConstructor = Box::new(move |config: &SinkConfig| {
            let settings: C = serde_json::from_value(config.settings())
                .map_err(|e| LoggerError::config(component.as_str(), e.to_string()))?;
            let sink: Arc<dyn Sink> = Arc::new(build(settings)?);
            Ok(sink)
        });
        self.constructors.insert(kind, constructor);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Registered discriminators, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn build(&self, config: &SinkConfig) -> Result<Arc<dyn Sink>> {
        let kind = config.kind().ok_or(LoggerError::MissingSinkType)?;
        let constructor = self
            .constructors
            .get(kind)
            .ok_or_else(|| LoggerError::UnknownSinkType(kind.to_string()))?;
        constructor(config)
    }

    pub fn build_handler(&self, config: &HandlerConfig) -> Result<Handler> {
        config
            .sinks
            .iter()
            .try_fold(
                Handler::new(&config.format).levels(&config.levels),
                |handler, sink| -> Result<Handler> { Ok(handler.shared_sink(self.build(sink)?)) },
            )
    }

    /// Build every handler, stopping at the first error
    pub fn build_handlers(&self, configs: &[HandlerConfig]) -> Result<Vec<Arc<Handler>>> {
        configs
            .iter()
            .map(|config| self.build_handler(config).map(Arc::new))
            .collect()
    }
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
