use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::definition::{DefinitionId, Level, Project, Scenario, Section, Test};

/// 评测状态：创建时为 Processing，子节点全部结束后写入一次终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradingStatus {
    Processing,
    Passed,
    Failed,
}

impl GradingStatus {
    pub fn is_passed(&self) -> bool {
        matches!(self, GradingStatus::Passed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GradingStatus::Processing => "processing",
            GradingStatus::Passed => "passed",
            GradingStatus::Failed => "failed",
        }
    }
}

/// 持久化的一行结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    /// 唯一 ID (UUID)
    pub id: String,
    pub parent_id: Option<String>,
    pub level: Level,
    pub definition_id: DefinitionId,
    pub name: String,
    pub status: GradingStatus,
    pub message: String,
    pub detail: RowDetail,
    pub updated_at: DateTime<Utc>,
}

/// 各层特有的字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowDetail {
    Project {
        user_id: u64,
    },
    Section {
        total_scenarios: u32,
        passed_scenarios: u32,
        score: f64,
    },
    Scenario,
    Test {
        expected_status_code: u16,
        actual_status_code: Option<u16>,
        expected_response_body: Option<String>,
        actual_response_body: Option<String>,
        duration_ms: Option<u64>,
    },
}

const PROCESSING_MESSAGE: &str = "Processing...";

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectResult {
    pub id: String,
    pub project_id: DefinitionId,
    pub project_name: String,
    pub user_id: u64,
    pub status: GradingStatus,
    pub message: String,
    pub sections: Vec<SectionResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionResult {
    pub id: String,
    pub section_id: DefinitionId,
    pub section_name: String,
    pub status: GradingStatus,
    pub message: String,
    pub total_scenarios: u32,
    pub passed_scenarios: u32,
    /// 通过的 Scenario 百分比，[0, 100]
    pub score: f64,
    pub scenarios: Vec<ScenarioResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub id: String,
    pub scenario_id: DefinitionId,
    pub scenario_name: String,
    pub status: GradingStatus,
    pub message: String,
    pub tests: Vec<TestResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: String,
    pub test_id: DefinitionId,
    pub test_name: String,
    pub status: GradingStatus,
    pub message: String,
    pub expected_status_code: u16,
    pub actual_status_code: Option<u16>,
    pub expected_response_body: Option<String>,
    pub actual_response_body: Option<String>,
    pub duration_ms: Option<u64>,
}

impl ProjectResult {
    pub fn processing(project: &Project, user_id: u64) -> Self {
        Self {
            id: new_id(),
            project_id: project.id,
            project_name: project.name.clone(),
            user_id,
            status: GradingStatus::Processing,
            message: PROCESSING_MESSAGE.to_string(),
            sections: Vec::new(),
        }
    }

    pub fn row(&self) -> ResultRow {
        ResultRow {
            id: self.id.clone(),
            parent_id: None,
            level: Level::Project,
            definition_id: self.project_id,
            name: self.project_name.clone(),
            status: self.status,
            message: self.message.clone(),
            detail: RowDetail::Project {
                user_id: self.user_id,
            },
            updated_at: Utc::now(),
        }
    }

    /// 所有已执行的 Test 结果
    pub fn tests(&self) -> impl Iterator<Item = &TestResult> {
        self.sections
            .iter()
            .flat_map(|s| &s.scenarios)
            .flat_map(|s| &s.tests)
    }
}

impl SectionResult {
    pub fn processing(section: &Section) -> Self {
        Self {
            id: new_id(),
            section_id: section.id,
            section_name: section.name.clone(),
            status: GradingStatus::Processing,
            message: PROCESSING_MESSAGE.to_string(),
            total_scenarios: 0,
            passed_scenarios: 0,
            score: 0.0,
            scenarios: Vec::new(),
        }
    }

    pub fn row(&self, parent_id: &str) -> ResultRow {
        ResultRow {
            id: self.id.clone(),
            parent_id: Some(parent_id.to_string()),
            level: Level::Section,
            definition_id: self.section_id,
            name: self.section_name.clone(),
            status: self.status,
            message: self.message.clone(),
            detail: RowDetail::Section {
                total_scenarios: self.total_scenarios,
                passed_scenarios: self.passed_scenarios,
                score: self.score,
            },
            updated_at: Utc::now(),
        }
    }
}

impl ScenarioResult {
    pub fn processing(scenario: &Scenario) -> Self {
        Self {
            id: new_id(),
            scenario_id: scenario.id,
            scenario_name: scenario.name.clone(),
            status: GradingStatus::Processing,
            message: PROCESSING_MESSAGE.to_string(),
            tests: Vec::new(),
        }
    }

    pub fn row(&self, parent_id: &str) -> ResultRow {
        ResultRow {
            id: self.id.clone(),
            parent_id: Some(parent_id.to_string()),
            level: Level::Scenario,
            definition_id: self.scenario_id,
            name: self.scenario_name.clone(),
            status: self.status,
            message: self.message.clone(),
            detail: RowDetail::Scenario,
            updated_at: Utc::now(),
        }
    }
}

impl TestResult {
    pub fn processing(test: &Test) -> Self {
        Self {
            id: new_id(),
            test_id: test.id,
            test_name: test.name.clone(),
            status: GradingStatus::Processing,
            message: PROCESSING_MESSAGE.to_string(),
            expected_status_code: test.response.status_code,
            actual_status_code: None,
            expected_response_body: test.response.body.clone(),
            actual_response_body: None,
            duration_ms: None,
        }
    }

    pub fn row(&self, parent_id: &str) -> ResultRow {
        ResultRow {
            id: self.id.clone(),
            parent_id: Some(parent_id.to_string()),
            level: Level::Test,
            definition_id: self.test_id,
            name: self.test_name.clone(),
            status: self.status,
            message: self.message.clone(),
            detail: RowDetail::Test {
                expected_status_code: self.expected_status_code,
                actual_status_code: self.actual_status_code,
                expected_response_body: self.expected_response_body.clone(),
                actual_response_body: self.actual_response_body.clone(),
                duration_ms: self.duration_ms,
            },
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&GradingStatus::Passed).unwrap(),
            r#""passed""#
        );
        assert!(GradingStatus::Passed.is_passed());
        assert!(!GradingStatus::Processing.is_passed());
    }

    #[test]
    fn test_row_detail_is_tagged() {
        let section = Section {
            id: 3,
            name: "Auth".to_string(),
            project_id: 1,
            depends_on: None,
        };
        let result = SectionResult::processing(&section);
        let row = result.row("parent");

        assert_eq!(row.level, Level::Section);
        assert_eq!(row.parent_id.as_deref(), Some("parent"));
        assert_eq!(row.status, GradingStatus::Processing);

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["detail"]["kind"], "section");
        assert_eq!(json["level"], "section");
    }

    #[test]
    fn test_processing_rows_get_distinct_ids() {
        let project = Project {
            id: 1,
            name: "p".to_string(),
        };
        let a = ProjectResult::processing(&project, 1);
        let b = ProjectResult::processing(&project, 1);
        assert_ne!(a.id, b.id);
    }
}
