use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to configure logging: {0}")]
    Logging(String),
}

/// Errors raised while validating or reading tick inputs.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("missing required series: {0}")]
    MissingSeries(&'static str),
    #[error("malformed slot: {0}")]
    MalformedSlot(String),
    #[error("non-monotonic time in series: {0}")]
    NonMonotonic(&'static str),
}

/// Errors raised by an individual simulation task inside the worker pool.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("simulation failed: {0}")]
    SimulationFailed(String),
}

/// Errors raised when a post-condition is violated after post-processing.
#[derive(Debug, Error)]
pub enum ConsistencyError {
    #[error("overlapping windows remain after overlap removal")]
    OverlappingWindows,
    #[error("window invariant violated: {0}")]
    InvariantViolated(&'static str),
}

/// Errors that degrade gracefully rather than aborting the tick.
#[derive(Debug, Error)]
pub enum TransientError {
    #[error("worker pool failed to spawn, falling back to synchronous execution: {0}")]
    PoolSpawnFailed(String),
}

/// Umbrella error type returned by the orchestrator's public entry points.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
    #[error(transparent)]
    Transient(#[from] TransientError),
}
