use thiserror::Error;

/// Problems resolving a selection expression against a scene catalog.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Test selection must not be empty.")]
    EmptyExpression,
    #[error("Selection '{expression}' matched no tests.")]
    EmptySelection { expression: String },
    #[error("Invalid selection token '{token}'. Use 'all', '1,3', or '1-4'.")]
    InvalidToken { token: String },
    #[error("Selection '{expression}' references unknown test number {ordinal}.")]
    UnknownOrdinal { expression: String, ordinal: u32 },
    #[error("Unknown scene '{scene}'. Available scenes: {available}.")]
    UnknownScene { scene: String, available: String },
    #[error("Unknown test '{test}' in scene '{scene}'.")]
    UnknownTest { scene: String, test: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No probe registered for {scene}/{test}.")]
    NotFound { scene: String, test: String },
    #[error("Probe already registered for {scene}/{test}.")]
    Duplicate { scene: String, test: String },
}

/// Fatal conditions that abort a worker's current test sequence.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("Authentication failed {attempts} consecutive times; no further attempts are made.")]
    AuthExhausted { attempts: u32 },
    #[error("No tests selected for scene '{scene}'.")]
    NoSelection { scene: String },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
