use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalaxyError {
    #[error("No catalog row matches: {0}")]
    NotFound(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Malformed catalog response: {0}")]
    MalformedResponse(String),

    #[error("HTTP reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON decoding error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Image decoding error: {0}")]
    ImageError(#[from] image::ImageError),
}

impl GalaxyError {
    /// Whether this failure comes from the network layer and may succeed on a retry.
    ///
    /// Server-side errors (5xx) and rate limiting (429) are retryable, other HTTP statuses
    /// are not.
    pub fn is_transport(&self) -> bool {
        use GalaxyError::*;
        match self {
            Transport(_) | Timeout(_) | ReqwestError(_) => true,
            HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl PartialEq for GalaxyError {
    fn eq(&self, other: &Self) -> bool {
        use GalaxyError::*;
        match (self, other) {
            (NotFound(a), NotFound(b)) => a == b,
            (Transport(a), Transport(b)) => a == b,
            (
                HttpStatus {
                    status: s1,
                    url: u1,
                },
                HttpStatus {
                    status: s2,
                    url: u2,
                },
            ) => s1 == s2 && u1 == u2,
            (Timeout(a), Timeout(b)) => a == b,
            (InvalidInput(a), InvalidInput(b)) => a == b,
            (InvalidParameter(a), InvalidParameter(b)) => a == b,
            (InvalidFrame(a), InvalidFrame(b)) => a == b,
            (MalformedResponse(a), MalformedResponse(b)) => a == b,

            // foreign errors are not comparable: same variant means equal
            (ReqwestError(_), ReqwestError(_)) => true,
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,
            (JsonError(_), JsonError(_)) => true,
            (ImageError(_), ImageError(_)) => true,

            _ => false,
        }
    }
}
