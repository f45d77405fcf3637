//! Error types for the gencache library.
//!
//! ## Key Components
//!
//! - [`ConfigError`]: Returned when cache configuration parameters are invalid
//!   (e.g. a non-positive max size). The cache keeps its previous
//!   configuration when a reconfiguration call returns this error.
//! - [`RegenerationError`]: Returned by a [`CacheRegenerator`] for a single
//!   warm-transfer item. The warm pass logs it and moves on to the next item.
//!
//! ## Example Usage
//!
//! ```
//! use gencache::config::CacheConfig;
//! use gencache::error::ConfigError;
//!
//! let config: Result<CacheConfig, ConfigError> = CacheConfig::builder().max_size(128).build();
//! assert!(config.is_ok());
//!
//! let bad = CacheConfig::builder().max_size(0).build();
//! assert!(bad.is_err());
//! ```
//!
//! [`CacheRegenerator`]: crate::warm::CacheRegenerator

use thiserror::Error;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by [`CacheConfigBuilder::build`](crate::config::CacheConfigBuilder::build),
/// the runtime setters on [`Generation`](crate::generation::Generation) and
/// [`AutowarmPolicy`](crate::warm::AutowarmPolicy) parsing. Carries a
/// human-readable description of which parameter failed validation.
///
/// # Example
///
/// ```
/// use gencache::config::CacheConfig;
///
/// let err = CacheConfig::builder().max_size(0).build().unwrap_err();
/// assert!(err.to_string().contains("max_size"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// RegenerationError
// ---------------------------------------------------------------------------

/// Error returned when a single warm-transfer item could not be regenerated.
///
/// The warm pass never aborts on this error: the item is logged and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct RegenerationError(String);

impl RegenerationError {
    /// Creates a new `RegenerationError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- ConfigError ------------------------------------------------------

    #[test]
    fn config_display_shows_message() {
        let err = ConfigError::new("max_size must be >= 1");
        assert_eq!(err.to_string(), "max_size must be >= 1");
    }

    #[test]
    fn config_message_accessor() {
        let err = ConfigError::new("bad ratio");
        assert_eq!(err.message(), "bad ratio");
    }

    #[test]
    fn config_clone_and_eq() {
        let a = ConfigError::new("x");
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn config_implements_std_error() {
        fn assert_error<T: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<ConfigError>();
    }

    // -- RegenerationError ------------------------------------------------

    #[test]
    fn regeneration_display_shows_message() {
        let err = RegenerationError::new("filter no longer parses");
        assert_eq!(err.to_string(), "filter no longer parses");
    }

    #[test]
    fn regeneration_debug_includes_message() {
        let err = RegenerationError::new("stale doc set");
        assert!(format!("{:?}", err).contains("stale doc set"));
    }

    #[test]
    fn regeneration_implements_std_error() {
        fn assert_error<T: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<RegenerationError>();
    }
}
