use thiserror::Error;

pub type Result<T> = std::result::Result<T, WindowError>;

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("window cannot be 0")]
    ZeroWindow,
    #[error("granularity cannot be 0")]
    ZeroGranularity,
    #[error("window size has to be a multiplier of the granularity size")]
    NotMultiple,
    #[error("window has more buckets than can be allocated")]
    TooManyBuckets,
    #[error("failed to start clock thread: {0}")]
    ClockSpawn(#[from] std::io::Error),
}

impl WindowError {
    /// True for the misconfiguration family (zero sizes, non-multiple window).
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            WindowError::ZeroWindow
                | WindowError::ZeroGranularity
                | WindowError::NotMultiple
                | WindowError::TooManyBuckets
        )
    }
}
