use thiserror::Error;

#[derive(Debug, Error)]
pub enum VigilError {
   #[error("Git command failed: {0}")]
   GitError(String),

   #[error("GitHub request failed (HTTP {status}): {body}")]
   GithubError { status: u16, body: String },

   #[error("Configuration error: {0}")]
   ConfigError(String),

   #[error("Reference error: {0}")]
   ReferenceError(String),

   #[error("Watch configuration error: {0}")]
   WatchContract(String),

   #[error("Extractor failed: {0}")]
   ExtractorError(String),

   #[error("Template render failed: {0}")]
   RenderError(String),

   #[error("Content provider failed for {path} at {revision}: {message}")]
   ProviderError {
      revision: String,
      path:     String,
      message:  String,
   },

   #[error("Run aborted")]
   Aborted,

   #[error("IO error: {0}")]
   IoError(#[from] std::io::Error),

   #[error("JSON error: {0}")]
   JsonError(#[from] serde_json::Error),

   #[error("YAML error: {0}")]
   YamlError(#[from] serde_yaml::Error),

   #[error("HTTP error: {0}")]
   HttpError(#[from] reqwest::Error),

   #[error("{0}")]
   Other(String),
}

impl VigilError {
   /// Whether this failure is a configuration-level contract violation.
   ///
   /// Contract violations surface to the caller; anything else collapses to
   /// an empty extraction at the watch boundary.
   pub const fn is_contract_violation(&self) -> bool {
      matches!(
         self,
         Self::WatchContract(_) | Self::ConfigError(_) | Self::ReferenceError(_)
      )
   }
}

pub type Result<T> = std::result::Result<T, VigilError>;
