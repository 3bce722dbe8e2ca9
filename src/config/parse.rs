//! Environment variable parsing utilities.

use std::str::FromStr;

use super::ConfigError;

/// Variable lookup used while loading configuration.
///
/// Wraps `std::env::var` in production; tests pass a map so they never
/// touch the process environment.
pub struct Env<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl<'a> Env<'a> {
    pub fn new(lookup: &'a dyn Fn(&str) -> Option<String>) -> Self {
        Self { lookup }
    }

    /// Optional variable (None if empty or missing).
    pub fn opt(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|s| !s.trim().is_empty())
    }

    /// Variable with default value.
    pub fn or(&self, key: &str, default: &str) -> String {
        self.opt(key).unwrap_or_else(|| default.to_string())
    }

    /// Boolean variable. Treats "1", "true", "on", "yes" (case-insensitive) as true.
    pub fn flag(&self, key: &str, default: bool) -> bool {
        self.opt(key)
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "on" | "yes"))
            .unwrap_or(default)
    }

    /// Variable with type conversion.
    pub fn parse<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T::Err: std::fmt::Display,
    {
        match self.opt(key) {
            Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError::Parse {
                key: key.into(),
                value: v,
                error: e.to_string(),
            }),
            None => Ok(default),
        }
    }
}

/// Lookup over the real process environment.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
