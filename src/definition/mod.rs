/// 定义模块 - Project / Section / Scenario / Test 层级及其依赖关系
pub mod index;
pub mod loader;
pub mod store;
pub mod types;

pub use index::{DependencyCycle, DependencyIndex, Worklist};
pub use loader::{ProjectSpec, SuiteFormat};
pub use store::{DefinitionStore, SuiteStore};
pub use types::{
    Definition, DefinitionError, DefinitionId, HeaderTemplate, Level, Node, Project,
    RequestTemplate, ResponsePattern, Scenario, Section, Test,
};
