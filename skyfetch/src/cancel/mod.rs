//! Cancellation and timeouts.
//!
//! A [`CancelToken`] marks a logical operation as aborted. Cancelling it:
//!
//! 1. releases every in-flight cache key registered against it, so requests
//!    waiting on those keys are not starved
//! 2. wakes the pipeline, which drops the in-flight transport call and
//!    returns [`FetchError::Cancelled`]
//!
//! [`Supervisor`] bounds an operation's wall-clock time by cancelling its
//! token with [`CancelReason::Timeout`] when a deadline passes.
//!
//! [`FetchError::Cancelled`]: crate::error::FetchError::Cancelled

mod supervisor;
mod token;

pub use supervisor::Supervisor;
pub use token::{CancelReason, CancelToken};
pub(crate) use token::KeyRegistration;
