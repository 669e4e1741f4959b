use std::fmt;

use serde::{Deserialize, Serialize};

use crate::definition::index::DependencyCycle;

pub type DefinitionId = u64;

/// 层级：Project → Section → Scenario → Test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Project,
    Section,
    Scenario,
    Test,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Project => "project",
            Level::Section => "section",
            Level::Scenario => "scenario",
            Level::Test => "test",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("{level} {id} not found")]
    NotFound { level: Level, id: DefinitionId },

    #[error("{level} '{name}' depends on unknown sibling '{dependency}'")]
    UnknownDependency {
        level: Level,
        name: String,
        dependency: String,
    },

    #[error("duplicate {level} name '{name}'")]
    DuplicateName { level: Level, name: String },

    #[error(transparent)]
    Cycle(#[from] DependencyCycle),

    #[error("unsupported suite format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid suite: {0}")]
    Invalid(String),

    #[error("failed to read suite: {0}")]
    Io(#[from] std::io::Error),
}

/// 同层兄弟节点间的依赖关系
pub trait Node {
    fn id(&self) -> DefinitionId;
    fn name(&self) -> &str;
    fn level(&self) -> Level;
    fn depends_on(&self) -> Option<DefinitionId>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: DefinitionId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub id: DefinitionId,
    pub name: String,
    pub project_id: DefinitionId,
    pub depends_on: Option<DefinitionId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub id: DefinitionId,
    pub name: String,
    pub section_id: DefinitionId,
    pub depends_on: Option<DefinitionId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Test {
    pub id: DefinitionId,
    pub name: String,
    pub scenario_id: DefinitionId,
    pub depends_on: Option<DefinitionId>,
    pub request: RequestTemplate,
    pub response: ResponsePattern,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderTemplate {
    pub key: String,
    pub value: String,
}

impl HeaderTemplate {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// 请求模板，URL / header / body 中可以出现 `{{name}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTemplate {
    pub method: String,
    /// 相对 URL，拼接在 base URL 之后
    pub url: String,
    #[serde(default)]
    pub headers: Vec<HeaderTemplate>,
    /// 空字符串表示不发送 body
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// 期望响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePattern {
    pub status_code: u16,
    #[serde(default)]
    pub headers: Vec<HeaderTemplate>,
    /// JSON 模式文本，可包含 `$<name>` 捕获和 `{{name}}` 替换
    #[serde(default)]
    pub body: Option<String>,
}

/// Section / Scenario / Test 三层的统一视图
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Section(Section),
    Scenario(Scenario),
    Test(Test),
}

impl Definition {
    pub fn into_section(self) -> Option<Section> {
        match self {
            Definition::Section(section) => Some(section),
            _ => None,
        }
    }

    pub fn into_scenario(self) -> Option<Scenario> {
        match self {
            Definition::Scenario(scenario) => Some(scenario),
            _ => None,
        }
    }

    pub fn into_test(self) -> Option<Test> {
        match self {
            Definition::Test(test) => Some(test),
            _ => None,
        }
    }
}

macro_rules! impl_node {
    ($ty:ty, $level:expr) => {
        impl Node for $ty {
            fn id(&self) -> DefinitionId {
                self.id
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn level(&self) -> Level {
                $level
            }

            fn depends_on(&self) -> Option<DefinitionId> {
                self.depends_on
            }
        }
    };
}

impl_node!(Section, Level::Section);
impl_node!(Scenario, Level::Scenario);
impl_node!(Test, Level::Test);

impl Node for Definition {
    fn id(&self) -> DefinitionId {
        match self {
            Definition::Section(n) => n.id(),
            Definition::Scenario(n) => n.id(),
            Definition::Test(n) => n.id(),
        }
    }

    fn name(&self) -> &str {
        match self {
            Definition::Section(n) => n.name(),
            Definition::Scenario(n) => n.name(),
            Definition::Test(n) => n.name(),
        }
    }

    fn level(&self) -> Level {
        match self {
            Definition::Section(_) => Level::Section,
            Definition::Scenario(_) => Level::Scenario,
            Definition::Test(_) => Level::Test,
        }
    }

    fn depends_on(&self) -> Option<DefinitionId> {
        match self {
            Definition::Section(n) => n.depends_on(),
            Definition::Scenario(n) => n.depends_on(),
            Definition::Test(n) => n.depends_on(),
        }
    }
}
