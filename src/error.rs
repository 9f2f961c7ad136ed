/// Error type for this crate.
///
/// Bucket arithmetic never fails; errors only come from configuration,
/// parsing and scheduler lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// Tier name that does not match any known tier.
    #[error("unknown tier: {0:?}")]
    UnknownTier(String),

    /// Identity was empty.
    #[error("identity must not be empty")]
    EmptyIdentity,

    /// `start` called on a scheduler that is already running.
    #[error("refill scheduler is already running")]
    SchedulerRunning,

    /// The refill thread could not be spawned.
    #[error("failed to spawn refill thread: {0}")]
    Spawn(#[from] std::io::Error),
}
