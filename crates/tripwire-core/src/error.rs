/// Errors that can occur across the Tripwire workspace.
///
/// Library crates use this type directly; the binary turns it into a
/// `miette::Report` at the boundary so codes and help text are rendered.
///
/// # Examples
///
/// ```
/// use tripwire_core::TripwireError;
///
/// let err = TripwireError::Config("missing token".into());
/// assert!(err.to_string().contains("missing token"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum TripwireError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    #[diagnostic(code(tripwire::io))]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(code(tripwire::config))]
    Config(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    #[diagnostic(code(tripwire::serialization))]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(tripwire::toml))]
    Toml(#[from] toml::de::Error),

    /// None of the known CI providers matched the environment.
    #[error("could not find the type of CI for tripwire to run on")]
    #[diagnostic(
        code(tripwire::no_ci),
        help("run tripwire inside a supported CI job (GitHub Actions, GitLab CI, CircleCI, Travis CI, Jenkins)")
    )]
    NoCiDetected,

    /// A pull request identifier could not be understood.
    #[error("invalid pull request reference: {0}")]
    #[diagnostic(code(tripwire::pull_request))]
    InvalidPullRequest(String),

    /// A network call failed in a way that may succeed on retry.
    #[error("transient network error: {0}")]
    #[diagnostic(code(tripwire::network::transient))]
    TransientNetwork(String),

    /// A network call failed permanently, or retries were exhausted.
    #[error("network error: {0}")]
    #[diagnostic(code(tripwire::network::fatal))]
    FatalNetwork(String),

    /// The renderer was handed inputs it cannot turn into a report.
    #[error("report invariant violated: {0}")]
    #[diagnostic(code(tripwire::render))]
    RenderInvariant(String),
}

impl TripwireError {
    /// Returns `true` for failures that the retry policy should try again.
    ///
    /// # Examples
    ///
    /// ```
    /// use tripwire_core::TripwireError;
    ///
    /// assert!(TripwireError::TransientNetwork("503".into()).is_transient());
    /// assert!(!TripwireError::FatalNetwork("401".into()).is_transient());
    /// ```
    pub fn is_transient(&self) -> bool {
        matches!(self, TripwireError::TransientNetwork(_))
    }
}
