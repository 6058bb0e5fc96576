use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error("Request error")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    BadStatus { status: StatusCode, url: String },

    #[error("Cache file error")]
    Io(#[from] std::io::Error),
}
