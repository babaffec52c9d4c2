/// Errors raised while setting up a pipeline or its collaborators.
///
/// Everything that can go wrong for a single read is handled inside the
/// pipeline; only these conditions stop a run before it starts.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The UMI extractor does not expose exactly one UMI region.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The barcode whitelist is empty or its barcodes differ in length.
    #[error("Invalid whitelist: {0}")]
    InvalidWhitelist(String),

    /// Failure opening the output destination or the whitelist.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
