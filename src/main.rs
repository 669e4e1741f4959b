mod cli;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // 初始化日志系统
    rugrade::logger::init_logger();

    let cli = Cli::parse();
    match cli.command {
        Commands::Grade(args) => {
            if cli::grade(args).await? {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Results { results, limit } => {
            cli::results(results, limit)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
