use reqwest::StatusCode;
use thiserror::Error;

/// Failure retrieving a source page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: StatusCode },
}

/// The page did not have the structure the extractor relies on.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no listing grid found on page (markup changed or a block page was served)")]
    MissingListingGrid,
}

/// The seen-set store was unreachable or rejected a command.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("store responded with HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("store rejected command: {0}")]
    Rejected(String),

    #[error("unexpected store response: {0}")]
    MalformedResponse(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("sqlite connection lock poisoned")]
    LockPoisoned,
}

/// The messaging endpoint could not be reached or refused the message.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("notification endpoint responded with HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
}

/// Errors that abort processing of a whole channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),
}

/// Errors confined to a single listing; the rest of the channel keeps going.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("membership check failed: {0}")]
    MembershipCheck(#[source] StoreError),

    #[error("notification failed: {0}")]
    Notify(#[from] NotifyError),

    #[error("marking as seen failed: {0}")]
    MarkSeen(#[source] StoreError),
}
