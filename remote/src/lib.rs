//! Contract for the remote relational store backing the exam app.
//!
//! The remote side is consumed as filtered CRUD over named resources
//! (`topic_tests`, `topic_tests_attempts`, `questions`, `question_reports`)
//! plus one aggregate call for per-topic question counts. [`RemoteStore`]
//! captures exactly what the offline layer needs from it.
//!
//! Enable the `mock` feature to get [`MockRemoteStore`] for tests in
//! downstream crates.

mod error;
mod report;
mod traits;

#[cfg(any(test, feature = "mock"))]
mod mock;

pub use error::{RemoteError, RemoteResult};
pub use report::QuestionReport;
pub use traits::RemoteStore;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockCall, MockRemoteStore};
