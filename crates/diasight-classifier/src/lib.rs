//! Client for the external diabetic retinopathy risk classifier.
//!
//! The classifier is a hosted black box: it accepts a fixed set of numeric
//! clinical features and answers with a predicted risk class, optional
//! per-class probabilities, a confidence and a risk score.
//!
//! - [`vector`]: the request body (fixed key set, every key present)
//! - [`response`]: parsing and validation of the prediction payload
//! - [`client`]: the [`Classifier`] trait and the HTTP implementation
//! - [`mock`]: a scripted classifier for tests and offline use

pub mod client;
pub mod error;
pub mod labels;
pub mod mock;
pub mod response;
pub mod vector;

pub use client::*;
pub use error::*;
pub use labels::*;
pub use mock::*;
pub use response::*;
pub use vector::*;
