use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use rugrade::config::{ConfigLoader, Profile, Settings};
use rugrade::definition::SuiteStore;
use rugrade::grader::Grader;
use rugrade::http::Client;
use rugrade::result::printer;
use rugrade::result::reporter::GradeReporter;
use rugrade::result::{JsonlResultStore, MemoryResultStore, ResultStore};

pub type Result<T> = std::result::Result<T, anyhow::Error>;

const DEFAULT_RESULTS_FILE: &str = ".rugrade/results.jsonl";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 对目标 API 运行一个评测套件
    Grade(GradeArgs),

    /// 列出最近的评测结果
    Results {
        /// JSONL 结果文件
        #[arg(long, value_name = "FILE")]
        results: Option<PathBuf>,

        /// 显示条数
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(clap::Args, Debug)]
pub struct GradeArgs {
    /// 套件文件 (.toml / .json)
    pub suite: PathBuf,

    /// 被评测 API 的 base URL，覆盖配置文件
    #[arg(long)]
    pub base_url: Option<String>,

    /// 使用 rugrade.toml 中的某个环境
    #[arg(short, long)]
    pub env: Option<String>,

    /// 记录在结果中的用户 ID
    #[arg(long)]
    pub user: Option<u64>,

    /// 默认请求超时（秒）
    #[arg(long)]
    pub timeout: Option<u64>,

    /// 结果追加写入的 JSONL 文件，不指定则只保存在内存
    #[arg(long, value_name = "FILE")]
    pub results: Option<PathBuf>,

    /// 以 JSON 输出结果树
    #[arg(long)]
    pub json: bool,

    /// 显示所有 Test 的响应详情
    #[arg(short, long)]
    pub verbose: bool,
}

impl GradeArgs {
    fn overrides(&self) -> Profile {
        Profile {
            base_url: self.base_url.clone(),
            timeout_secs: self.timeout,
            results_file: self
                .results
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            user_id: self.user,
        }
    }
}

fn load_settings(args: &GradeArgs) -> Result<Settings> {
    let config = ConfigLoader::find_and_load()?.unwrap_or_default();
    Ok(ConfigLoader::build_settings(
        &config,
        args.env.as_deref(),
        &args.overrides(),
    )?)
}

/// 运行评测，返回项目是否通过
pub async fn grade(args: GradeArgs) -> Result<bool> {
    let settings = load_settings(&args)?;

    let mut suite = SuiteStore::new();
    let project_id = suite
        .load_file(&args.suite)
        .with_context(|| format!("failed to load suite {}", args.suite.display()))?;
    let project_name = suite
        .projects()
        .iter()
        .find(|p| p.id == project_id)
        .map(|p| p.name.clone())
        .ok_or_else(|| anyhow!("suite {} has no project", args.suite.display()))?;

    let results: Arc<dyn ResultStore> = match &settings.results_file {
        Some(path) => Arc::new(JsonlResultStore::new(path)),
        None => Arc::new(MemoryResultStore::new()),
    };
    let client = Client::new(settings.timeout)?;
    let grader = Grader::new(
        Arc::new(suite),
        results,
        Arc::new(client),
        settings.base_url.clone(),
    );

    let reporter = GradeReporter::new(args.verbose);
    if !args.json {
        reporter.print_header(&project_name, grader.base_url());
    }

    let started = Instant::now();
    match grader
        .run_project_grading(project_id, settings.user_id)
        .await
    {
        Ok(result) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                reporter.print_project(&result);
                reporter.print_summary(&result, started.elapsed());
            }
            Ok(result.status.is_passed())
        }
        Err(aborted) => {
            if let Some(partial) = &aborted.partial {
                if args.json {
                    println!("{}", serde_json::to_string_pretty(partial)?);
                } else {
                    reporter.print_project(partial);
                }
            }
            Err(aborted.into())
        }
    }
}

/// 列出结果文件中最近的项目评测
pub fn results(path: Option<PathBuf>, limit: usize) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => ConfigLoader::find_and_load()?
            .and_then(|c| c.grader.results_file)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_FILE)),
    };
    let store = JsonlResultStore::new(path);
    printer::list_results(&store, limit)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grade_args() {
        let cli = Cli::try_parse_from([
            "rugrade",
            "grade",
            "suite.toml",
            "--base-url",
            ":3000",
            "--user",
            "7",
            "--timeout",
            "5",
            "--json",
            "-v",
        ])
        .unwrap();

        let Commands::Grade(args) = cli.command else {
            panic!("expected grade command");
        };
        assert_eq!(args.suite, PathBuf::from("suite.toml"));
        assert!(args.json);
        assert!(args.verbose);

        let overrides = args.overrides();
        assert_eq!(overrides.base_url.as_deref(), Some(":3000"));
        assert_eq!(overrides.user_id, Some(7));
        assert_eq!(overrides.timeout_secs, Some(5));
        assert_eq!(overrides.results_file, None);
    }

    #[test]
    fn test_parse_results_args() {
        let cli = Cli::try_parse_from(["rugrade", "results", "--results", "out.jsonl", "-n", "5"])
            .unwrap();
        match cli.command {
            Commands::Results { results, limit } => {
                assert_eq!(results, Some(PathBuf::from("out.jsonl")));
                assert_eq!(limit, 5);
            }
            _ => panic!("expected results command"),
        }
    }

    #[test]
    fn test_grade_requires_suite() {
        assert!(Cli::try_parse_from(["rugrade", "grade"]).is_err());
    }
}
