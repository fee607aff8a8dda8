use thiserror::Error;

/// Why one candidate (page or image source) failed.
///
/// None of these escape the dispatcher: each is turned into "this candidate
/// failed, try the next one".
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("no candidate urls were supplied")]
    NoCandidates,

    #[error("page is behind a captcha or bot check")]
    Blocked,

    #[error("timed out during {step}")]
    Timeout { step: &'static str },

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("response is not an image (status {status}, content-type '{content_type}')")]
    NotAnImage { status: u16, content_type: String },

    #[error("could not normalize image: {0}")]
    NormalizationFailure(String),

    #[error("no usable image element on the page")]
    NoImageOnPage,

    #[error("browser error: {0}")]
    Browser(String),

    #[error("failed to save image: {0}")]
    Io(#[from] std::io::Error),
}

impl AcquireError {
    pub(crate) fn browser(err: impl std::fmt::Display) -> Self {
        AcquireError::Browser(err.to_string())
    }
}

impl From<reqwest::Error> for AcquireError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AcquireError::Timeout { step: "image download" }
        } else {
            AcquireError::NetworkFailure(err.to_string())
        }
    }
}
