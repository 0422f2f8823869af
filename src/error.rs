use std::fmt;

#[derive(Debug)]
pub enum DiscfitError {
    Config(String),
    Listing(String),
    Queue(String),
    Subprocess(String),
    Io(std::io::Error),
}

impl fmt::Display for DiscfitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscfitError::Config(e) => write!(f, "Configuration error: {}", e),
            DiscfitError::Listing(e) => write!(f, "Listing error: {}", e),
            DiscfitError::Queue(e) => write!(f, "Queue error: {}", e),
            DiscfitError::Subprocess(e) => write!(f, "Subprocess error: {}", e),
            DiscfitError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for DiscfitError {}

impl From<std::io::Error> for DiscfitError {
    fn from(err: std::io::Error) -> Self {
        DiscfitError::Io(err)
    }
}

impl From<serde_json::Error> for DiscfitError {
    fn from(err: serde_json::Error) -> Self {
        DiscfitError::Config(err.to_string())
    }
}
