use std::path::PathBuf;

/// Errors raised while configuring locales or loading translation files.
#[derive(Debug, thiserror::Error)]
pub enum LocaleError {
    /// The locale is not in the configured supported list.
    #[error("unsupported locale '{locale}'")]
    Unsupported { locale: String },

    /// A translation file could not be read.
    #[error("failed to read translations from {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A translation file is not valid JSON.
    #[error("invalid translations in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No translations path is configured.
    #[error("no translations path configured")]
    NoPath,
}
