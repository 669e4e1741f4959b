pub mod aggregate;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod request;

pub use engine::Grader;
pub use error::{GradeError, RunAborted};
pub use matcher::MatchError;
pub use request::RequestBuilder;
