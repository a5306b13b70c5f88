//! Feature Vector Validation
//!
//! Checks incoming feature vectors against the column layout of the loaded
//! feature schema before anything reaches the model.

mod error;
mod validator;

pub use error::{ValidationError, ValueFault};
pub use validator::Validator;
