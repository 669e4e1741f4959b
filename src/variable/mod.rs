pub mod capture;
pub mod resolver;
pub mod types;

pub use capture::CaptureToken;
pub use resolver::VariableResolver;
pub use types::VariableStore;
