//! Error type shared by the fetch layer, the client and persistence.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{route} returned {status}: {body}")]
    Status {
        route: String,
        status: u16,
        body: String,
    },

    #[error("response for {0} carried no data")]
    MissingData(&'static str),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
