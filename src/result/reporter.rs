use crate::result::model::{GradingStatus, ProjectResult, ScenarioResult, SectionResult, TestResult};
use colored::{ColoredString, Colorize};
use std::fmt::Write;
use std::time::Duration;

/// 终端输出评测结果树
pub struct GradeReporter {
    verbose: bool,
}

fn symbol(status: GradingStatus) -> ColoredString {
    match status {
        GradingStatus::Passed => "✓".green(),
        GradingStatus::Failed => "✗".red(),
        GradingStatus::Processing => "…".yellow(),
    }
}

impl GradeReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// 打印评测开始
    pub fn print_header(&self, project: &str, base_url: &str) {
        println!("\nGrading {} against {}...\n", project.bold(), base_url);
    }

    pub fn print_project(&self, result: &ProjectResult) {
        print!("{}", self.render(result));
    }

    /// 渲染整棵结果树
    pub fn render(&self, result: &ProjectResult) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} {} - {}",
            symbol(result.status),
            result.project_name.bold(),
            result.message
        );
        for section in &result.sections {
            self.render_section(&mut out, section);
        }
        out
    }

    fn render_section(&self, out: &mut String, section: &SectionResult) {
        let _ = writeln!(
            out,
            "  {} {} - {}",
            symbol(section.status),
            section.section_name.bold(),
            section.message
        );
        for scenario in &section.scenarios {
            self.render_scenario(out, scenario);
        }
    }

    fn render_scenario(&self, out: &mut String, scenario: &ScenarioResult) {
        let _ = writeln!(
            out,
            "    {} {} - {}",
            symbol(scenario.status),
            scenario.scenario_name,
            scenario.message.dimmed()
        );
        for test in &scenario.tests {
            self.render_test(out, test);
        }
    }

    fn render_test(&self, out: &mut String, test: &TestResult) {
        let duration = test
            .duration_ms
            .map(|ms| format!(" ({}ms)", ms))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "      {} {}{}",
            symbol(test.status),
            test.test_name,
            duration.dimmed()
        );

        if test.status == GradingStatus::Failed {
            let _ = writeln!(out, "        {}: {}", "Error".red().bold(), test.message);
        }

        // 失败时或 verbose 模式下显示期望与实际
        if self.verbose || test.status == GradingStatus::Failed {
            let actual = test
                .actual_status_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "        status: expected {}, actual {}",
                test.expected_status_code, actual
            );
            if let Some(body) = &test.actual_response_body
                && !body.is_empty()
            {
                let _ = writeln!(out, "        body: {}", body.dimmed());
            }
        }
    }

    /// 打印评测摘要
    pub fn print_summary(&self, result: &ProjectResult, elapsed: Duration) {
        let sections_passed = result
            .sections
            .iter()
            .filter(|s| s.status.is_passed())
            .count();
        let tests_total = result.tests().count();
        let tests_passed = result.tests().filter(|t| t.status.is_passed()).count();

        println!("\n{}", "━".repeat(50));
        println!("{}", "Summary".bold());
        println!("{}", "━".repeat(50));
        println!(
            "  {}: {} passed, {} total",
            "Sections".bold(),
            sections_passed.to_string().green(),
            result.sections.len()
        );
        println!(
            "  {}: {} passed, {} failed, {} run",
            "Tests".bold(),
            tests_passed.to_string().green(),
            (tests_total - tests_passed).to_string().red(),
            tests_total
        );
        println!("  {}: {:.3}s", "Duration".bold(), elapsed.as_secs_f64());
        println!();
    }
}

impl Default for GradeReporter {
    fn default() -> Self {
        Self::new(false)
    }
}
