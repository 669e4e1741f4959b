//! 响应匹配
//!
//! 期望模式采用子集语义：期望对象中的键必须出现在实际对象中，
//! 实际对象多出的键忽略。数组长度必须相等，元素按多重集匹配，与顺序无关。
//! 叶子按规范文本比较（见 [`VariableResolver::render`]）。
//!
//! 捕获写入一份临时变量表，整个 Test 通过后才由调用方提交。

use serde_json::Value;
use thiserror::Error;

use crate::definition::ResponsePattern;
use crate::http::Response;
use crate::variable::{CaptureToken, VariableResolver, VariableStore};

/// 匹配失败，带出错位置
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    #[error("status code mismatch: expected {expected}, got {actual}")]
    StatusMismatch { expected: u16, actual: u16 },

    #[error("missing response header '{name}'")]
    HeaderMissing { name: String },

    #[error("header '{name}' mismatch: expected '{expected}', got '{actual}'")]
    HeaderMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("malformed {side} JSON body: {message}")]
    MalformedJson { side: &'static str, message: String },

    #[error("missing key '{key}' at {path}")]
    MissingKey { path: String, key: String },

    #[error("array length mismatch at {path}: expected {expected}, got {actual}")]
    LengthMismatch {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("no matching element for {path}[{index}]")]
    ElementNotFound { path: String, index: usize },

    #[error("null mismatch at {path}: expected {expected}, got {actual}")]
    NullMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("type mismatch at {path}: expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("value mismatch at {path}: expected '{expected}', got '{actual}'")]
    ValueMismatch {
        path: String,
        expected: String,
        actual: String,
    },
}

const ROOT_PATH: &str = "$";

/// 比较实际响应与期望模式
///
/// 依次检查状态码、header、body，第一个失败即返回。
/// 成功时返回 `variables` 加上本次全部捕获后的新变量表。
pub fn match_response(
    expected: &ResponsePattern,
    response: &Response,
    variables: &VariableStore,
) -> Result<VariableStore, MatchError> {
    let actual_status = response.status.code();
    if actual_status != expected.status_code {
        return Err(MatchError::StatusMismatch {
            expected: expected.status_code,
            actual: actual_status,
        });
    }

    let mut scratch = variables.clone();
    match_headers(expected, response, &mut scratch)?;

    if let Some(pattern) = expected.body.as_deref()
        && !pattern.trim().is_empty()
    {
        let actual = parse_body(&response.body, "actual")?;
        let expected = parse_body(pattern, "expected")?;
        match_json(&expected, &actual, ROOT_PATH, &mut scratch)?;
    }

    Ok(scratch)
}

fn parse_body(text: &str, side: &'static str) -> Result<Value, MatchError> {
    serde_json::from_str(text).map_err(|e| MatchError::MalformedJson {
        side,
        message: e.to_string(),
    })
}

fn match_headers(
    expected: &ResponsePattern,
    response: &Response,
    variables: &mut VariableStore,
) -> Result<(), MatchError> {
    for header in &expected.headers {
        let name = VariableResolver::substitute(&header.key, variables);
        let values = response.header_values(&name);
        let Some(first) = values.first() else {
            return Err(MatchError::HeaderMissing { name });
        };

        if let Some(var) = CaptureToken::parse(&header.value) {
            tracing::debug!(variable = var, header = %name, "Captured header value");
            variables.insert(var, Value::String(first.to_string()));
            continue;
        }

        let wanted = VariableResolver::substitute(&header.value, variables);
        if !values.iter().any(|v| *v == wanted) {
            return Err(MatchError::HeaderMismatch {
                name,
                expected: wanted,
                actual: values.join(", "),
            });
        }
    }
    Ok(())
}

/// 递归比较两个 JSON 值，捕获写入 `variables`
pub fn match_json(
    expected: &Value,
    actual: &Value,
    path: &str,
    variables: &mut VariableStore,
) -> Result<(), MatchError> {
    // 捕获先于 null 检查，null 也可以被捕获
    if let Value::String(s) = expected
        && let Some(var) = CaptureToken::parse(s)
    {
        tracing::debug!(variable = var, path, "Captured value");
        variables.insert(var, actual.clone());
        return Ok(());
    }

    match (expected, actual) {
        (Value::Null, Value::Null) => Ok(()),
        (Value::Null, _) | (_, Value::Null) => Err(MatchError::NullMismatch {
            path: path.to_string(),
            expected: VariableResolver::render(expected),
            actual: VariableResolver::render(actual),
        }),
        (Value::Object(expected), Value::Object(actual)) => {
            for (key, expected_value) in expected {
                let key = VariableResolver::substitute(key, variables);
                let Some(actual_value) = actual.get(&key) else {
                    return Err(MatchError::MissingKey {
                        path: path.to_string(),
                        key,
                    });
                };
                match_json(
                    expected_value,
                    actual_value,
                    &format!("{}.{}", path, key),
                    variables,
                )?;
            }
            Ok(())
        }
        (Value::Array(expected), Value::Array(actual)) => {
            match_array(expected, actual, path, variables)
        }
        (Value::Object(_) | Value::Array(_), _) | (_, Value::Object(_) | Value::Array(_)) => {
            Err(MatchError::TypeMismatch {
                path: path.to_string(),
                expected: kind(expected),
                actual: kind(actual),
            })
        }
        _ => {
            let expected_text = match expected {
                Value::String(s) => VariableResolver::substitute(s, variables),
                other => VariableResolver::render(other),
            };
            let actual_text = VariableResolver::render(actual);
            if expected_text == actual_text {
                Ok(())
            } else {
                Err(MatchError::ValueMismatch {
                    path: path.to_string(),
                    expected: expected_text,
                    actual: actual_text,
                })
            }
        }
    }
}

/// 多重集匹配：每个期望元素取第一个尚未占用且能匹配的实际元素。
/// 每次尝试在变量表副本上进行，只有被接受的那次尝试的捕获会保留。
fn match_array(
    expected: &[Value],
    actual: &[Value],
    path: &str,
    variables: &mut VariableStore,
) -> Result<(), MatchError> {
    if expected.len() != actual.len() {
        return Err(MatchError::LengthMismatch {
            path: path.to_string(),
            expected: expected.len(),
            actual: actual.len(),
        });
    }

    let mut consumed = vec![false; actual.len()];
    for (index, expected_item) in expected.iter().enumerate() {
        let accepted = actual.iter().enumerate().find_map(|(j, actual_item)| {
            if consumed[j] {
                return None;
            }
            let mut trial = variables.clone();
            match_json(
                expected_item,
                actual_item,
                &format!("{}[{}]", path, j),
                &mut trial,
            )
            .ok()
            .map(|()| (j, trial))
        });

        match accepted {
            Some((j, trial)) => {
                consumed[j] = true;
                *variables = trial;
            }
            None => {
                return Err(MatchError::ElementNotFound {
                    path: path.to_string(),
                    index,
                });
            }
        }
    }

    Ok(())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
