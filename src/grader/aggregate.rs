use crate::result::{GradingStatus, ScenarioResult, SectionResult, TestResult};

/// 汇总后的终态
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub status: GradingStatus,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionOutcome {
    pub status: GradingStatus,
    pub message: String,
    pub total_scenarios: u32,
    pub passed_scenarios: u32,
    pub score: f64,
}

fn status_of(passed: bool) -> GradingStatus {
    if passed {
        GradingStatus::Passed
    } else {
        GradingStatus::Failed
    }
}

fn count(total: usize) -> u32 {
    u32::try_from(total).unwrap_or(u32::MAX)
}

/// 任一已执行的 Test 失败则 Scenario 失败
pub fn scenario_outcome(tests: &[TestResult]) -> Outcome {
    let failed = tests.iter().filter(|t| !t.status.is_passed()).count();
    let message = if failed == 0 {
        "All tests passed.".to_string()
    } else {
        format!("{}/{} tests failed.", failed, tests.len())
    };
    Outcome {
        status: status_of(failed == 0),
        message,
    }
}

/// 得分为通过的 Scenario 百分比，没有执行任何 Scenario 时为 100
pub fn section_outcome(scenarios: &[ScenarioResult]) -> SectionOutcome {
    let total = count(scenarios.len());
    let passed = count(scenarios.iter().filter(|s| s.status.is_passed()).count());
    let score = if total == 0 {
        100.0
    } else {
        f64::from(passed) / f64::from(total) * 100.0
    };

    let message = if passed == total {
        format!("All {} scenarios passed. Score: {:.2}%", total, score)
    } else {
        format!(
            "{}/{} scenarios passed. Score: {:.2}%",
            passed, total, score
        )
    };

    SectionOutcome {
        status: status_of(passed == total),
        message,
        total_scenarios: total,
        passed_scenarios: passed,
        score,
    }
}

pub fn project_outcome(sections: &[SectionResult]) -> Outcome {
    let failed = sections.iter().any(|s| !s.status.is_passed());
    let message = if failed {
        "Some sections failed."
    } else {
        "All sections passed."
    };
    Outcome {
        status: status_of(!failed),
        message: message.to_string(),
    }
}
