pub mod jsonl;
pub mod model;
pub mod printer;
pub mod reporter;
pub mod store;

pub use jsonl::JsonlResultStore;
pub use model::{
    GradingStatus, ProjectResult, ResultRow, RowDetail, ScenarioResult, SectionResult, TestResult,
};
pub use store::{MemoryResultStore, ResultStore, StoreError};
