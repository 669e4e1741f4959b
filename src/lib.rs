pub mod config;
pub mod definition;
pub mod error;
pub mod grader;
pub mod http;
pub mod logger;
pub mod result;
pub mod variable;

// Re-export commonly used types
pub use error::{Result, RugradeError};
pub use grader::{Grader, RunAborted};
