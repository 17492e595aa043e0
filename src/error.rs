use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// Broad classification of why a source could not be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Unreachable host, timeout, or an unexpected HTTP status.
    Network,
    /// The response arrived but could not be decoded.
    Parse,
    /// The feed or subreddit does not exist.
    NotFound,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FetchErrorKind::Network => "network",
            FetchErrorKind::Parse => "parse",
            FetchErrorKind::NotFound => "not found",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} error: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Network,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Parse,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::NotFound,
            message: message.into(),
        }
    }

    pub fn timeout(secs: u64) -> Self {
        Self::network(format!("timed out after {}s", secs))
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_status(status: StatusCode, url: &str) -> Self {
        match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                Self::not_found(format!("{} returned {}", url, status))
            }
            _ => Self::network(format!("{} returned {}", url, status)),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
                return Self::not_found(err.to_string());
            }
        }
        if err.is_decode() {
            return Self::parse(err.to_string());
        }
        if err.is_timeout() {
            return Self::network(format!("request timed out: {}", err));
        }
        Self::network(err.to_string())
    }
}

impl From<feed_rs::parser::ParseFeedError> for FetchError {
    fn from(err: feed_rs::parser::ParseFeedError) -> Self {
        Self::parse(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse(err.to_string())
    }
}
