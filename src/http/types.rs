use std::fmt;
use std::str::FromStr;

use crate::{Result, RugradeError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 不支持的 HTTP 方法
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported HTTP method: {0}")]
pub struct UnsupportedMethod(pub String);

/// 评测支持的 HTTP 方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl FromStr for Method {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            _ => Err(UnsupportedMethod(s.to_string())),
        }
    }
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Url {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Url {
    /// 默认 host，当 URL 中未指定 host 时使用
    const DEFAULT_HOST: &'static str = "localhost";
    /// 默认 scheme，当 URL 中未指定 scheme 时使用
    const DEFAULT_SCHEME: &'static str = "http";

    pub fn parse(s: &str) -> Result<Self> {
        let input = s.trim();

        // 处理各种简化格式:
        // 1. ":3000" -> "http://localhost:3000"
        // 2. "localhost:3000" -> "http://localhost:3000"
        // 3. "https://:8080" -> "https://localhost:8080"
        let normalized = if input.starts_with(':') {
            format!("{}://{}{}", Self::DEFAULT_SCHEME, Self::DEFAULT_HOST, input)
        } else if !input.contains("://") {
            format!("{}://{}", Self::DEFAULT_SCHEME, input)
        } else if let Some(pos) = input.find("://") {
            let after_scheme = &input[pos + 3..];
            if after_scheme.starts_with(':') {
                format!("{}://{}{}", &input[..pos], Self::DEFAULT_HOST, after_scheme)
            } else {
                input.to_string()
            }
        } else {
            input.to_string()
        };

        let url = url::Url::parse(&normalized)?;
        if url.query().is_some() || url.fragment().is_some() {
            return Err(RugradeError::Config(format!(
                "base URL must not carry a query or fragment: {}",
                input
            )));
        }

        let default_port = Self::default_port(url.scheme());

        Ok(Url {
            scheme: url.scheme().to_string(),
            host: url
                .host()
                .map(|h| h.to_string())
                .unwrap_or_else(|| Self::DEFAULT_HOST.to_string()),
            port: url.port().unwrap_or(default_port),
            path: url.path().trim_end_matches('/').to_string(),
        })
    }

    fn default_port(scheme: &str) -> u16 {
        match scheme {
            "https" => 443,
            _ => 80,
        }
    }
}

/// 作为 base URL 输出：不带结尾 `/`，默认端口省略
impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)?;

        if self.port != Self::default_port(&self.scheme) {
            write!(f, ":{}", self.port)?;
        }

        write!(f, "{}", self.path)
    }
}

/// 规范化 base URL，供 `baseURL + relativeURL` 拼接
pub fn normalize_base_url(input: &str) -> Result<String> {
    Ok(Url::parse(input)?.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status(u16);

impl Status {
    pub fn new(code: u16) -> Self {
        Self(code)
    }

    pub fn code(&self) -> u16 {
        self.0
    }
}
