//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use weave_aspect::AdviceDescriptor;
use weave_core::ProxySettings;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WeaveConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Proxy creation settings.
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Per-aspect overrides.
    #[serde(default)]
    pub aspects: Vec<AspectConfig>,
}

impl WeaveConfig {
    /// Returns the section for the aspect called `name`, if any.
    pub fn aspect(&self, name: &str) -> Option<&AspectConfig> {
        self.aspects.iter().find(|aspect| aspect.name == name)
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Global log level.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids in log lines.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include file names and line numbers in log lines.
    #[serde(default)]
    pub file_location: bool,

    /// Log file path, required when `output` is `file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    /// Per-module levels, e.g. `weave_core = "trace"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

// =============================================================================
// Proxy
// =============================================================================

/// Proxy creation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Always create subtype-shaped proxies.
    #[serde(default)]
    pub proxy_target_type: bool,

    /// Put the invocation-exposing advisor at the head of every proxy that
    /// carries aspect advice.
    #[serde(default = "default_true")]
    pub expose_invocation: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            proxy_target_type: false,
            expose_invocation: true,
        }
    }
}

impl ProxyConfig {
    pub fn to_settings(self) -> ProxySettings {
        ProxySettings {
            proxy_target_type: self.proxy_target_type,
        }
    }
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Aspects
// =============================================================================

/// Configuration for one registered aspect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AspectConfig {
    /// Name of the aspect this section applies to.
    pub name: String,

    /// Disabled aspects contribute no advisors.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Descriptors replacing or supplying those declared in code.
    #[serde(default)]
    pub advice: Vec<AdviceConfig>,
}

/// The descriptor of one advice method, given in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdviceConfig {
    /// Name of the advice method on the aspect.
    pub method: String,

    #[serde(flatten)]
    pub descriptor: AdviceDescriptor,
}
