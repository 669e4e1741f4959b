use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::definition::{
    Definition, DefinitionError, DefinitionId, DefinitionStore, DependencyCycle, DependencyIndex,
    Level, Node, Test,
};
use crate::error::RugradeError;
use crate::grader::aggregate;
use crate::grader::error::{GradeError, RunAborted};
use crate::grader::matcher;
use crate::grader::request::RequestBuilder;
use crate::http::Transport;
use crate::result::{
    GradingStatus, ProjectResult, ResultRow, ResultStore, ScenarioResult, SectionResult,
    StoreError, TestResult,
};
use crate::variable::VariableStore;

const TEST_PASSED: &str = "Test passed successfully!";

/// 评测引擎
///
/// 每一层的兄弟节点按依赖森林调度：工作队列从根节点开始，
/// 节点通过后把它的直接依赖者追加到队尾。依赖没有通过的节点不执行，
/// 也不产生结果行。
///
/// 引擎本身不持有运行期状态，变量表随每个 Section 新建，
/// 同一个 `Grader` 可以同时跑多次评测。
pub struct Grader {
    definitions: Arc<dyn DefinitionStore>,
    results: Arc<dyn ResultStore>,
    transport: Arc<dyn Transport>,
    base_url: String,
}

impl Grader {
    pub fn new(
        definitions: Arc<dyn DefinitionStore>,
        results: Arc<dyn ResultStore>,
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            definitions,
            results,
            transport,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 评测一个项目，返回完整的结果树
    ///
    /// 只有项目不存在、存在依赖环、项目结果行无法创建或保存时才会中止；
    /// 其余错误都记录在对应节点上。
    pub async fn run_project_grading(
        &self,
        project_id: DefinitionId,
        user_id: u64,
    ) -> Result<ProjectResult, RunAborted> {
        let project = self
            .definitions
            .get_project(project_id)
            .map_err(|e| match e {
                DefinitionError::NotFound { .. } => {
                    RunAborted::new(RugradeError::ProjectNotFound(project_id))
                }
                other => RunAborted::new(other),
            })?;

        self.preflight(project.id)
            .map_err(|cycle| RunAborted::new(RugradeError::DependsOnCycle(cycle.to_string())))?;

        info!(project = %project.name, user_id, base_url = %self.base_url, "Starting grading run");

        let mut result = ProjectResult::processing(&project, user_id);
        self.results.create(&result.row()).map_err(RunAborted::new)?;

        let fetched = self
            .grade_sections(project.id, &result.id, &mut result.sections)
            .await;
        let outcome = aggregate::project_outcome(&result.sections);
        result.status = outcome.status;
        result.message = outcome.message;
        if let Err(e) = fetched {
            fail(&mut result.status, &mut result.message, &e);
        }

        if let Err(e) = self.results.save(&result.row()) {
            mark_unsaved(&mut result.status, &mut result.message, &e);
            return Err(RunAborted::new(e).with_partial(result));
        }

        info!(
            project = %project.name,
            status = result.status.as_str(),
            "{}", result.message
        );
        Ok(result)
    }

    /// 在创建任何结果行之前检查所有兄弟集合是否无环
    ///
    /// 读取失败的兄弟集合在这里跳过，遍历到时记在对应节点上。
    fn preflight(&self, project_id: DefinitionId) -> Result<(), DependencyCycle> {
        for section in self.checked_children(project_id, Level::Section)? {
            for scenario in self.checked_children(section.id(), Level::Scenario)? {
                self.checked_children(scenario.id(), Level::Test)?;
            }
        }
        Ok(())
    }

    fn checked_children(
        &self,
        parent: DefinitionId,
        level: Level,
    ) -> Result<Vec<Definition>, DependencyCycle> {
        let children = match self.definitions.children_of(parent, level) {
            Ok(children) => children,
            Err(e) => {
                debug!(%level, parent, error = %e, "Preflight could not load siblings");
                return Ok(Vec::new());
            }
        };
        DependencyIndex::build(children.clone())?;
        Ok(children)
    }

    /// 取出一层兄弟节点并建立依赖索引
    fn load_siblings<T: Node + Clone>(
        &self,
        parent: DefinitionId,
        level: Level,
        convert: fn(Definition) -> Option<T>,
    ) -> Result<DependencyIndex<T>, GradeError> {
        let nodes = self
            .definitions
            .children_of(parent, level)?
            .into_iter()
            .filter_map(|definition| {
                let found = definition.level();
                let name = definition.name().to_string();
                let node = convert(definition);
                if node.is_none() {
                    warn!(expected = %level, %found, name = %name, "Skipping definition of unexpected level");
                }
                node
            })
            .collect();

        Ok(DependencyIndex::build(nodes).map_err(DefinitionError::from)?)
    }

    async fn grade_sections(
        &self,
        project_id: DefinitionId,
        parent_id: &str,
        out: &mut Vec<SectionResult>,
    ) -> Result<(), GradeError> {
        let index = self.load_siblings(project_id, Level::Section, Definition::into_section)?;
        let mut worklist = index.worklist();

        while let Some(section) = worklist.next() {
            let mut result = SectionResult::processing(&section);
            if !self.create_row(&result.row(parent_id)) {
                continue;
            }
            info!(section = %section.name, "Grading section");

            // 变量表只在这个 Section 内可见
            let mut variables = VariableStore::new();
            let fetched = self
                .grade_scenarios(section.id, &result.id, &mut variables, &mut result.scenarios)
                .await;

            let outcome = aggregate::section_outcome(&result.scenarios);
            result.status = outcome.status;
            result.message = outcome.message;
            result.total_scenarios = outcome.total_scenarios;
            result.passed_scenarios = outcome.passed_scenarios;
            result.score = outcome.score;
            if let Err(e) = fetched {
                fail(&mut result.status, &mut result.message, &e);
            }

            if let Err(e) = self.results.save(&result.row(parent_id)) {
                mark_unsaved(&mut result.status, &mut result.message, &e);
            }
            info!(
                section = %section.name,
                status = result.status.as_str(),
                variables = variables.len(),
                "{}", result.message
            );

            if result.status.is_passed() {
                worklist.extend(index.dependents_of(section.id).iter().cloned());
            }
            out.push(result);
        }

        Ok(())
    }

    async fn grade_scenarios(
        &self,
        section_id: DefinitionId,
        parent_id: &str,
        variables: &mut VariableStore,
        out: &mut Vec<ScenarioResult>,
    ) -> Result<(), GradeError> {
        let index = self.load_siblings(section_id, Level::Scenario, Definition::into_scenario)?;
        let mut worklist = index.worklist();

        while let Some(scenario) = worklist.next() {
            let mut result = ScenarioResult::processing(&scenario);
            if !self.create_row(&result.row(parent_id)) {
                continue;
            }
            debug!(scenario = %scenario.name, "Grading scenario");

            let fetched = self
                .grade_tests(scenario.id, &result.id, variables, &mut result.tests)
                .await;

            let outcome = aggregate::scenario_outcome(&result.tests);
            result.status = outcome.status;
            result.message = outcome.message;
            if let Err(e) = fetched {
                fail(&mut result.status, &mut result.message, &e);
            }

            if let Err(e) = self.results.save(&result.row(parent_id)) {
                mark_unsaved(&mut result.status, &mut result.message, &e);
            }
            debug!(scenario = %scenario.name, status = result.status.as_str(), "{}", result.message);

            if result.status.is_passed() {
                worklist.extend(index.dependents_of(scenario.id).iter().cloned());
            }
            out.push(result);
        }

        Ok(())
    }

    async fn grade_tests(
        &self,
        scenario_id: DefinitionId,
        parent_id: &str,
        variables: &mut VariableStore,
        out: &mut Vec<TestResult>,
    ) -> Result<(), GradeError> {
        let index = self.load_siblings(scenario_id, Level::Test, Definition::into_test)?;
        let mut worklist = index.worklist();

        while let Some(test) = worklist.next() {
            let mut result = TestResult::processing(&test);
            if !self.create_row(&result.row(parent_id)) {
                continue;
            }

            let captured = self.execute_test(&test, variables, &mut result).await;

            match self.results.save(&result.row(parent_id)) {
                Ok(()) => {
                    if let Some(captured) = captured {
                        *variables = captured;
                    }
                }
                Err(e) => mark_unsaved(&mut result.status, &mut result.message, &e),
            }
            debug!(test = %test.name, status = result.status.as_str(), "{}", result.message);

            if result.status.is_passed() {
                worklist.extend(index.dependents_of(test.id).iter().cloned());
            }
            out.push(result);
        }

        Ok(())
    }

    /// 发送请求并匹配响应
    ///
    /// 通过时返回带有本次捕获的变量表，由调用方在结果保存成功后提交。
    async fn execute_test(
        &self,
        test: &Test,
        variables: &VariableStore,
        result: &mut TestResult,
    ) -> Option<VariableStore> {
        let request = match RequestBuilder::build(&test.request, &self.base_url, variables) {
            Ok(request) => request,
            Err(e) => {
                fail(&mut result.status, &mut result.message, &GradeError::from(e));
                return None;
            }
        };
        debug!(test = %test.name, method = %request.method, url = %request.url, "Sending request");

        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                fail(&mut result.status, &mut result.message, &GradeError::from(e));
                return None;
            }
        };

        result.actual_status_code = Some(response.status.code());
        result.actual_response_body = Some(response.body.clone());
        result.duration_ms = Some(u64::try_from(response.duration.as_millis()).unwrap_or(u64::MAX));

        match matcher::match_response(&test.response, &response, variables) {
            Ok(captured) => {
                result.status = GradingStatus::Passed;
                result.message = TEST_PASSED.to_string();
                Some(captured)
            }
            Err(e) => {
                fail(&mut result.status, &mut result.message, &GradeError::from(e));
                None
            }
        }
    }

    /// 创建失败的节点整棵子树都不执行
    fn create_row(&self, row: &ResultRow) -> bool {
        match self.results.create(row) {
            Ok(_) => true,
            Err(e) => {
                error!(level = %row.level, name = %row.name, error = %e, "Failed to create result row, skipping node");
                false
            }
        }
    }
}

fn fail(status: &mut GradingStatus, message: &mut String, err: &GradeError) {
    *status = GradingStatus::Failed;
    *message = err.to_string();
}

fn mark_unsaved(status: &mut GradingStatus, message: &mut String, err: &StoreError) {
    error!(error = %err, "Failed to save result row");
    *status = GradingStatus::Failed;
    message.push_str(&format!(" (failed to save result: {})", err));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Project, Scenario, Section};
    use crate::http::{Request, Response, TransportError};
    use crate::result::MemoryResultStore;
    use async_trait::async_trait;

    struct NoNetwork;

    #[async_trait]
    impl Transport for NoNetwork {
        async fn execute(&self, _request: Request) -> Result<Response, TransportError> {
            Err(TransportError::Connection("offline".to_string()))
        }
    }

    /// 手工构造的定义：Section 下两个互相依赖的 Scenario
    struct CyclicDefinitions;

    impl DefinitionStore for CyclicDefinitions {
        fn get_project(&self, id: DefinitionId) -> Result<Project, DefinitionError> {
            match id {
                1 => Ok(Project {
                    id: 1,
                    name: "cyclic".to_string(),
                }),
                _ => Err(DefinitionError::NotFound {
                    level: Level::Project,
                    id,
                }),
            }
        }

        fn children_of(
            &self,
            parent: DefinitionId,
            level: Level,
        ) -> Result<Vec<Definition>, DefinitionError> {
            let scenario = |id, name: &str, depends_on| {
                Definition::Scenario(Scenario {
                    id,
                    name: name.to_string(),
                    section_id: 2,
                    depends_on: Some(depends_on),
                })
            };
            Ok(match (level, parent) {
                (Level::Section, 1) => vec![Definition::Section(Section {
                    id: 2,
                    name: "only".to_string(),
                    project_id: 1,
                    depends_on: None,
                })],
                (Level::Scenario, 2) => vec![scenario(3, "a", 4), scenario(4, "b", 3)],
                _ => Vec::new(),
            })
        }

        fn dependents_of(
            &self,
            _node: DefinitionId,
            _level: Level,
        ) -> Result<Vec<Definition>, DefinitionError> {
            Ok(Vec::new())
        }
    }

    /// Scenario 读取总是失败的定义
    struct BrokenScenarios;

    impl DefinitionStore for BrokenScenarios {
        fn get_project(&self, id: DefinitionId) -> Result<Project, DefinitionError> {
            CyclicDefinitions.get_project(id)
        }

        fn children_of(
            &self,
            parent: DefinitionId,
            level: Level,
        ) -> Result<Vec<Definition>, DefinitionError> {
            match level {
                Level::Scenario => Err(DefinitionError::NotFound {
                    level: Level::Section,
                    id: parent,
                }),
                _ => CyclicDefinitions.children_of(parent, level),
            }
        }

        fn dependents_of(
            &self,
            _node: DefinitionId,
            _level: Level,
        ) -> Result<Vec<Definition>, DefinitionError> {
            Ok(Vec::new())
        }
    }

    fn grader(results: Arc<MemoryResultStore>) -> Grader {
        Grader::new(
            Arc::new(CyclicDefinitions),
            results,
            Arc::new(NoNetwork),
            "http://localhost",
        )
    }

    #[tokio::test]
    async fn test_cycle_aborts_before_any_row() {
        let results = Arc::new(MemoryResultStore::new());
        let err = grader(results.clone())
            .run_project_grading(1, 1)
            .await
            .unwrap_err();

        match err.reason {
            RugradeError::DependsOnCycle(path) => assert!(path.contains("a -> b -> a")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.partial.is_none());
        assert!(results.rows().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_project_aborts() {
        let results = Arc::new(MemoryResultStore::new());
        let err = grader(results.clone())
            .run_project_grading(9, 1)
            .await
            .unwrap_err();

        assert!(matches!(err.reason, RugradeError::ProjectNotFound(9)));
        assert!(results.rows().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_child_fetch_error_fails_only_that_node() {
        let results = Arc::new(MemoryResultStore::new());
        let grader = Grader::new(
            Arc::new(BrokenScenarios),
            results.clone(),
            Arc::new(NoNetwork),
            "http://localhost",
        );

        let project = grader.run_project_grading(1, 1).await.unwrap();

        assert_eq!(project.status, GradingStatus::Failed);
        assert_eq!(project.message, "Some sections failed.");
        assert_eq!(project.sections.len(), 1);
        let section = &project.sections[0];
        assert_eq!(section.status, GradingStatus::Failed);
        assert!(section.message.contains("failed to load definitions"));
        assert!(section.scenarios.is_empty());
        // project + section
        assert_eq!(results.rows().unwrap().len(), 2);
    }
}
