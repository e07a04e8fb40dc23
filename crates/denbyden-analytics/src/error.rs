use thiserror::Error;

/// Raised when a producer is asked to build an event that violates the event model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EventError {
    #[error("cart quantity must be positive")]
    ZeroQuantity,
    #[error("total price must be a non-negative finite number, got {0}")]
    InvalidPrice(f64),
    #[error("unsupported scroll depth {0}, expected 25, 50, 75 or 100")]
    InvalidScrollDepth(u8),
}

/// Raised while loading an [`AnalyticsConfig`](crate::config::AnalyticsConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("batch size must be at least 1")]
    ZeroBatchSize,
    #[error("batch interval must be at least 1ms")]
    ZeroInterval,
    #[error("failed to parse analytics config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
