use crate::http::types::normalize_base_url;
use crate::variable::VariableResolver;
use crate::{Result, RugradeError};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 一组可选的评测参数，`[grader]` 与 `[environments.<name>]` 共用
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct Profile {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub results_file: Option<String>,
    pub user_id: Option<u64>,
}

/// 完整的配置文件 `rugrade.toml`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct GraderConfig {
    #[serde(default)]
    pub grader: Profile,

    #[serde(default)]
    pub environments: HashMap<String, Profile>,
}

impl GraderConfig {
    /// 获取指定环境
    pub fn get_environment(&self, env_name: &str) -> Option<&Profile> {
        self.environments.get(env_name)
    }
}

/// 合并后的最终设置
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// 已规范化，不带结尾 `/`
    pub base_url: String,
    pub timeout: Duration,
    /// `None` 时结果只保存在内存中
    pub results_file: Option<PathBuf>,
    pub user_id: u64,
}

/// 配置文件加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 配置文件名
    const CONFIG_FILE: &'static str = "rugrade.toml";
    const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// 从指定路径加载配置文件
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<GraderConfig> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&content)?)
    }

    /// 查找并加载配置文件
    /// 查找顺序：
    /// 1. 当前目录及其父目录
    /// 2. 用户配置目录 ~/.config/rugrade/
    pub fn find_and_load() -> Result<Option<GraderConfig>> {
        match Self::find_config_file() {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading config");
                Self::load_from_path(path).map(Some)
            }
            None => Ok(None),
        }
    }

    fn find_config_file() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            let config_path = current.join(Self::CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }

            // 尝试父目录
            if !current.pop() {
                break;
            }
        }

        let home = dirs::home_dir()?;
        let config_path = home.join(".config").join("rugrade").join(Self::CONFIG_FILE);
        config_path.exists().then_some(config_path)
    }

    /// 合并设置
    ///
    /// 优先级：CLI 覆盖 > 指定环境 > `[grader]` > 默认值。
    /// 字符串值中的 `${VAR}` 会从系统环境变量解析。
    pub fn build_settings(
        config: &GraderConfig,
        env_name: Option<&str>,
        overrides: &Profile,
    ) -> Result<Settings> {
        let env = match env_name {
            Some(name) => Some(config.get_environment(name).ok_or_else(|| {
                RugradeError::Config(format!("unknown environment: {}", name))
            })?),
            None => None,
        };

        let layers: Vec<&Profile> = [Some(overrides), env, Some(&config.grader)]
            .into_iter()
            .flatten()
            .collect();

        let base_url = layers
            .iter()
            .find_map(|p| p.base_url.as_deref())
            .map(VariableResolver::resolve_env_vars)
            .ok_or_else(|| RugradeError::Config("no base URL configured".to_string()))?;

        let timeout_secs = layers
            .iter()
            .find_map(|p| p.timeout_secs)
            .unwrap_or(Self::DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(RugradeError::Config(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        let results_file = layers
            .iter()
            .find_map(|p| p.results_file.as_deref())
            .map(|p| PathBuf::from(VariableResolver::resolve_env_vars(p)));

        let user_id = layers.iter().find_map(|p| p.user_id).unwrap_or_default();

        Ok(Settings {
            base_url: normalize_base_url(&base_url)?,
            timeout: Duration::from_secs(timeout_secs),
            results_file,
            user_id,
        })
    }
}
