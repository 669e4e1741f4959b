//! 套件文件加载
//!
//! 一个套件文件描述一个 Project，支持 TOML 与 JSON：
//!
//! ```toml
//! name = "Todo API"
//!
//! [[sections]]
//! name = "Auth"
//!
//! [[sections.scenarios]]
//! name = "Login"
//!
//! [[sections.scenarios.tests]]
//! name = "login"
//! request = { method = "POST", url = "/login", body = '{"user":"a"}' }
//! response = { status_code = 200, body = '{"token":"$<tok>"}' }
//!
//! [[sections.scenarios.tests]]
//! name = "profile"
//! depends_on = "login"
//! request = { method = "GET", url = "/me", headers = [{ key = "Authorization", value = "Bearer {{tok}}" }] }
//! response = { status_code = 200 }
//! ```
//!
//! `depends_on` 引用同一父节点下兄弟的名称，加载时解析为 id。

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::definition::index::DependencyIndex;
use crate::definition::store::SuiteStore;
use crate::definition::types::{
    Definition, DefinitionError, DefinitionId, Level, Project, RequestTemplate, ResponsePattern,
    Scenario, Section, Test,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteFormat {
    Toml,
    Json,
}

impl SuiteFormat {
    /// 按扩展名识别格式
    pub fn from_path(path: &Path) -> Result<Self, DefinitionError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(SuiteFormat::Toml),
            Some("json") => Ok(SuiteFormat::Json),
            _ => Err(DefinitionError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSpec {
    pub name: String,
    #[serde(default)]
    pub sections: Vec<SectionSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionSpec {
    pub name: String,
    #[serde(default)]
    pub depends_on: Option<String>,
    #[serde(default)]
    pub scenarios: Vec<ScenarioSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,
    #[serde(default)]
    pub depends_on: Option<String>,
    #[serde(default)]
    pub tests: Vec<TestSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestSpec {
    pub name: String,
    #[serde(default)]
    pub depends_on: Option<String>,
    pub request: RequestTemplate,
    pub response: ResponsePattern,
}

trait SpecNode {
    fn name(&self) -> &str;
    fn depends_on(&self) -> Option<&str>;
}

macro_rules! impl_spec_node {
    ($($ty:ty),*) => {
        $(impl SpecNode for $ty {
            fn name(&self) -> &str {
                &self.name
            }

            fn depends_on(&self) -> Option<&str> {
                self.depends_on.as_deref()
            }
        })*
    };
}

impl_spec_node!(SectionSpec, ScenarioSpec, TestSpec);

/// 加载过程中暂存的子节点集合，全部校验通过后才写入 store
type Staged = Vec<(DefinitionId, Level, Vec<Definition>)>;

impl SuiteStore {
    /// 从文件加载一个 Project，返回其 id
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<DefinitionId, DefinitionError> {
        let path = path.as_ref();
        let format = SuiteFormat::from_path(path)?;
        let content = fs::read_to_string(path)?;
        self.load_str(&content, format)
    }

    pub fn load_str(
        &mut self,
        content: &str,
        format: SuiteFormat,
    ) -> Result<DefinitionId, DefinitionError> {
        let spec: ProjectSpec = match format {
            SuiteFormat::Toml => {
                toml::from_str(content).map_err(|e| DefinitionError::Invalid(e.to_string()))?
            }
            SuiteFormat::Json => serde_json::from_str(content)
                .map_err(|e| DefinitionError::Invalid(e.to_string()))?,
        };
        self.add_project(spec)
    }

    pub fn add_project(&mut self, spec: ProjectSpec) -> Result<DefinitionId, DefinitionError> {
        let project_id = self.allocate_id();
        let mut staged: Staged = Vec::new();

        let section_ids = self.resolve_siblings(Level::Section, &spec.sections)?;
        let mut sections = Vec::with_capacity(spec.sections.len());

        for (section_spec, (section_id, depends_on)) in spec.sections.iter().zip(section_ids) {
            sections.push(Definition::Section(Section {
                id: section_id,
                name: section_spec.name.clone(),
                project_id,
                depends_on,
            }));

            let scenario_ids = self.resolve_siblings(Level::Scenario, &section_spec.scenarios)?;
            let mut scenarios = Vec::with_capacity(section_spec.scenarios.len());

            for (scenario_spec, (scenario_id, depends_on)) in
                section_spec.scenarios.iter().zip(scenario_ids)
            {
                scenarios.push(Definition::Scenario(Scenario {
                    id: scenario_id,
                    name: scenario_spec.name.clone(),
                    section_id,
                    depends_on,
                }));

                let test_ids = self.resolve_siblings(Level::Test, &scenario_spec.tests)?;
                let tests = scenario_spec
                    .tests
                    .iter()
                    .zip(test_ids)
                    .map(|(test_spec, (test_id, depends_on))| {
                        if test_spec.request.timeout_secs == Some(0) {
                            return Err(DefinitionError::Invalid(format!(
                                "test '{}' timeout_secs must be greater than zero",
                                test_spec.name
                            )));
                        }
                        Ok(Definition::Test(Test {
                            id: test_id,
                            name: test_spec.name.clone(),
                            scenario_id,
                            depends_on,
                            request: test_spec.request.clone(),
                            response: test_spec.response.clone(),
                        }))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                staged.push((scenario_id, Level::Test, tests));
            }
            staged.push((section_id, Level::Scenario, scenarios));
        }
        staged.push((project_id, Level::Section, sections));

        for (_, _, siblings) in &staged {
            DependencyIndex::build(siblings.clone())?;
        }

        self.insert_project(Project {
            id: project_id,
            name: spec.name,
        });
        for (parent, level, siblings) in staged {
            self.insert_children(parent, level, siblings);
        }

        tracing::debug!(project_id, "Suite loaded");
        Ok(project_id)
    }

    /// 为一组兄弟分配 id，并把 `depends_on` 名称解析为 id
    fn resolve_siblings<S: SpecNode>(
        &mut self,
        level: Level,
        specs: &[S],
    ) -> Result<Vec<(DefinitionId, Option<DefinitionId>)>, DefinitionError> {
        let mut by_name: HashMap<&str, DefinitionId> = HashMap::new();
        let mut ids = Vec::with_capacity(specs.len());

        for spec in specs {
            let id = self.allocate_id();
            if by_name.insert(spec.name(), id).is_some() {
                return Err(DefinitionError::DuplicateName {
                    level,
                    name: spec.name().to_string(),
                });
            }
            ids.push(id);
        }

        specs
            .iter()
            .zip(ids)
            .map(|(spec, id)| {
                let depends_on = spec
                    .depends_on()
                    .map(|dep| {
                        by_name.get(dep).copied().ok_or_else(|| {
                            DefinitionError::UnknownDependency {
                                level,
                                name: spec.name().to_string(),
                                dependency: dep.to_string(),
                            }
                        })
                    })
                    .transpose()?;
                Ok((id, depends_on))
            })
            .collect()
    }
}
