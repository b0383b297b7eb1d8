use thiserror::Error;

/// Main error type for cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(
        "Plugin collision for '{name}': already loaded from {cached_url}, requested {requested_url}"
    )]
    PluginCollision {
        name: String,
        cached_url: String,
        requested_url: String,
    },

    #[error("Failed to load plugin '{name}' from {url}: {source}")]
    PluginLoadFailed {
        name: String,
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;
