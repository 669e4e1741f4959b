use std::collections::HashMap;

use crate::definition::types::{Definition, DefinitionError, DefinitionId, Level, Node, Project};

/// 只读的定义来源
pub trait DefinitionStore: Send + Sync {
    fn get_project(&self, id: DefinitionId) -> Result<Project, DefinitionError>;

    /// `parent` 下 `level` 层的全部直接子节点，按定义顺序
    fn children_of(
        &self,
        parent: DefinitionId,
        level: Level,
    ) -> Result<Vec<Definition>, DefinitionError>;

    /// 依赖 `node` 的同层节点，按定义顺序
    fn dependents_of(
        &self,
        node: DefinitionId,
        level: Level,
    ) -> Result<Vec<Definition>, DefinitionError>;

    /// 没有依赖的子节点
    fn roots_of(
        &self,
        parent: DefinitionId,
        level: Level,
    ) -> Result<Vec<Definition>, DefinitionError> {
        Ok(self
            .children_of(parent, level)?
            .into_iter()
            .filter(|d| d.depends_on().is_none())
            .collect())
    }
}

/// 内存中的定义存储，由套件文件加载
#[derive(Debug, Default)]
pub struct SuiteStore {
    projects: Vec<Project>,
    children: HashMap<(Level, DefinitionId), Vec<Definition>>,
    next_id: DefinitionId,
}

impl SuiteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    /// 分配下一个定义 id，从 1 开始
    pub(crate) fn allocate_id(&mut self) -> DefinitionId {
        self.next_id += 1;
        self.next_id
    }

    pub(crate) fn insert_project(&mut self, project: Project) {
        self.projects.push(project);
    }

    pub(crate) fn insert_children(
        &mut self,
        parent: DefinitionId,
        level: Level,
        children: Vec<Definition>,
    ) {
        self.children.insert((level, parent), children);
    }
}

impl DefinitionStore for SuiteStore {
    fn get_project(&self, id: DefinitionId) -> Result<Project, DefinitionError> {
        self.projects
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(DefinitionError::NotFound {
                level: Level::Project,
                id,
            })
    }

    fn children_of(
        &self,
        parent: DefinitionId,
        level: Level,
    ) -> Result<Vec<Definition>, DefinitionError> {
        Ok(self
            .children
            .get(&(level, parent))
            .cloned()
            .unwrap_or_default())
    }

    fn dependents_of(
        &self,
        node: DefinitionId,
        level: Level,
    ) -> Result<Vec<Definition>, DefinitionError> {
        // 依赖只能指向同一父节点下的兄弟，找到 node 所在的兄弟集合即可
        let siblings = self
            .children
            .iter()
            .filter(|((l, _), _)| *l == level)
            .map(|(_, nodes)| nodes)
            .find(|nodes| nodes.iter().any(|n| n.id() == node));

        Ok(siblings
            .map(|nodes| {
                nodes
                    .iter()
                    .filter(|n| n.depends_on() == Some(node))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
