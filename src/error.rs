use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("No product found with name {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Whether another download attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Authentication(_) | Self::Transport(_) | Self::Io(_) => true,
            Self::Validation(_) | Self::NotFound(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
