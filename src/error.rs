//! Typed failure for requests against the dashboard API.
//!
//! Everything else in the crate reports errors through `color_eyre::Report`;
//! this type rides inside a report so the retry policy and the fetch wrapper
//! can recover the HTTP status by downcasting.

use color_eyre::Report;
use thiserror::Error;

/// A request to the backend that did not produce a usable response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FetchFailed {
  /// HTTP status, `None` for transport errors and timeouts
  pub status: Option<u16>,
  pub message: String,
  /// Response body, if one was received
  pub body: Option<String>,
}

impl FetchFailed {
  pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
    Self {
      status,
      message: message.into(),
      body: None,
    }
  }

  pub fn with_body(mut self, body: impl Into<String>) -> Self {
    self.body = Some(body.into());
    self
  }

  /// Client errors: bad credentials, malformed request, and the like.
  pub fn is_client_error(&self) -> bool {
    self.status.is_some_and(is_client_error)
  }
}

/// Whether `status` lies in `[400, 500)`.
pub fn is_client_error(status: u16) -> bool {
  (400..500).contains(&status)
}

/// Find the HTTP status carried anywhere in an error chain.
pub fn status_of(err: &Report) -> Option<u16> {
  err.chain().find_map(|cause| {
    if let Some(failed) = cause.downcast_ref::<FetchFailed>() {
      return failed.status;
    }
    cause
      .downcast_ref::<reqwest::Error>()
      .and_then(|e| e.status())
      .map(|s| s.as_u16())
  })
}
