use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Network unreachable: {0}")]
    Unreachable(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported method: {0}")]
    InvalidMethod(String),
}

impl NetworkError {
    /// Classify a reqwest failure. Connection and timeout failures mean
    /// the origin could not be reached at all, which is the offline case.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            NetworkError::Unreachable(err.to_string())
        } else {
            NetworkError::Transport(err)
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, NetworkError::Unreachable(_))
    }
}
