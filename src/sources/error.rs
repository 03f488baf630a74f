use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    // The service answered 200 but the body carries an exception report.
    #[error("Service exception from {url}: {message}")]
    ServiceException { url: String, message: String },

    #[error("Malformed response from {url}: {message}")]
    MalformedResponse { url: String, message: String },

    #[error("Failed to parse JSON data")]
    JsonParse(#[from] serde_json::Error),
}
