//! Talking to the remote VOC application.
//!
//! - [`session`] - cookie-keeping clients tracked by a [`SessionRegistry`]
//! - [`auth`] - operator check and login flow
//! - [`submit`] - one form post per record

pub mod auth;
pub mod session;
pub mod submit;

pub use auth::{check_operator, AuthService, LOGIN_MARKER};
pub use session::{SessionGuard, SessionRegistry};
pub use submit::{submit_all, SubmissionFailure, SubmissionReport};
