//! Bridge configuration.
//!
//! Options come from code, a JSON document, or environment variables with the
//! `WHITEBOX_` prefix. Unset values keep their defaults.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{WhiteboxError, WhiteboxResult};

/// Prefix of the environment variables read by [`WhiteboxOptions::from_env`].
pub const ENV_PREFIX: &str = "WHITEBOX";

/// Options for a [`ProfilingBridge`](crate::ProfilingBridge).
///
/// # Examples
///
/// ```
/// use ferrous_whitebox::WhiteboxOptions;
///
/// let options = WhiteboxOptions::from_json_str(r#"{ "max_stack_frames": 8 }"#).unwrap();
/// assert_eq!(options.max_stack_frames, 8);
/// assert!(options.capture_stack_traces);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhiteboxOptions {
    /// Capture a call stack when a resolve operation begins
    pub capture_stack_traces: bool,
    /// Frames kept per captured stack
    pub max_stack_frames: usize,
    /// Log every outbound message at trace level
    pub trace_messages: bool,
}

impl Default for WhiteboxOptions {
    fn default() -> Self {
        Self {
            capture_stack_traces: true,
            max_stack_frames: 32,
            trace_messages: false,
        }
    }
}

impl WhiteboxOptions {
    /// Parses options from JSON. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> WhiteboxResult<Self> {
        serde_json::from_str(json).map_err(|e| WhiteboxError::Config(e.to_string()))
    }

    /// Reads options from `WHITEBOX_CAPTURE_STACK_TRACES`,
    /// `WHITEBOX_MAX_STACK_FRAMES` and `WHITEBOX_TRACE_MESSAGES`.
    pub fn from_env() -> WhiteboxResult<Self> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Like [`from_env`](Self::from_env) with a custom variable prefix.
    pub fn from_env_with_prefix(prefix: &str) -> WhiteboxResult<Self> {
        let source = EnvironmentSource::with_prefix(prefix);
        let mut options = Self::default();
        if let Some(value) = source.parse("capture_stack_traces")? {
            options.capture_stack_traces = value;
        }
        if let Some(value) = source.parse("max_stack_frames")? {
            options.max_stack_frames = value;
        }
        if let Some(value) = source.parse("trace_messages")? {
            options.trace_messages = value;
        }
        Ok(options)
    }
}

/// Environment variables under a common prefix.
#[derive(Debug)]
struct EnvironmentSource {
    prefix: String,
}

impl EnvironmentSource {
    fn with_prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_uppercase(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}_{}", self.prefix, key.to_uppercase())
    }

    fn parse<T: FromStr>(&self, key: &str) -> WhiteboxResult<Option<T>>
    where
        T::Err: std::fmt::Display,
    {
        let env_key = self.key(key);
        match env::var(&env_key) {
            Ok(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| WhiteboxError::Config(format!("{}={:?}: {}", env_key, raw, e))),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(WhiteboxError::Config(format!("{}: {}", env_key, e))),
        }
    }
}
