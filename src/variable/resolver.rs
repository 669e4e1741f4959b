use crate::variable::types::VariableStore;
use regex::{Captures, Regex};
use serde_json::{Number, Value};
use std::sync::OnceLock;

/// 变量替换器
pub struct VariableResolver;

impl VariableResolver {
    /// 替换文本中的所有 {{variable}} 占位符
    ///
    /// 未定义的变量保持占位符原样，不报错。
    pub fn substitute(text: &str, store: &VariableStore) -> String {
        static VAR_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = VAR_REGEX.get_or_init(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").unwrap());

        re.replace_all(text, |caps: &Captures| {
            store
                .render(&caps[1])
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
    }

    /// 解析并替换系统环境变量 ${VAR}，用于配置文件
    pub fn resolve_env_vars(text: &str) -> String {
        static ENV_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = ENV_REGEX.get_or_init(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

        re.replace_all(text, |caps: &Captures| {
            let env_name = &caps[1];
            std::env::var(env_name).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string()
    }

    /// JSON 值的规范文本形式
    ///
    /// 叶子比较和 `{{name}}` 替换都基于这个渲染结果：
    /// - 字符串：原文，不带引号
    /// - 布尔：`true` / `false`
    /// - 数字：整数值渲染为整数（`1.0` -> `1`），其他为最短浮点形式
    /// - null：`null`
    /// - 数组 / 对象：紧凑 JSON
    pub fn render(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => render_number(n),
            other => other.to_string(),
        }
    }
}

// 超过 2^53 的浮点数已无法精确表示整数，保留浮点形式
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

fn render_number(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() <= MAX_EXACT_INTEGER => format!("{}", f as i64),
        Some(f) => format!("{}", f),
        None => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_substitute_simple() {
        let mut store = VariableStore::new();
        store.insert("tok", json!("abc123"));

        let output = VariableResolver::substitute("Bearer {{tok}}", &store);
        assert_eq!(output, "Bearer abc123");
    }

    #[test]
    fn test_substitute_multiple_and_repeated() {
        let mut store = VariableStore::new();
        store.insert("id", json!(7));
        store.insert("kind", json!("users"));

        let output = VariableResolver::substitute("/{{kind}}/{{id}}/{{id}}", &store);
        assert_eq!(output, "/users/7/7");
    }

    #[test]
    fn test_substitute_missing_variable() {
        let store = VariableStore::new();

        let output = VariableResolver::substitute("{{missing}}/path", &store);
        // 未找到的变量保持原样
        assert_eq!(output, "{{missing}}/path");
    }

    #[test]
    fn test_substitute_inserts_raw_text() {
        let mut store = VariableStore::new();
        store.insert("name", json!("O\"Brien"));
        store.insert("obj", json!({"a": 1}));

        // body 模板按纯文本替换，不做 JSON 转义
        let output = VariableResolver::substitute(r#"{"n":"{{name}}","o":{{obj}}}"#, &store);
        assert_eq!(output, r#"{"n":"O"Brien","o":{"a":1}}"#);
    }

    #[test]
    fn test_render_canonical_forms() {
        assert_eq!(VariableResolver::render(&json!("abc")), "abc");
        assert_eq!(VariableResolver::render(&json!(true)), "true");
        assert_eq!(VariableResolver::render(&json!(null)), "null");
        assert_eq!(VariableResolver::render(&json!(42)), "42");
        assert_eq!(VariableResolver::render(&json!(-3)), "-3");
        assert_eq!(VariableResolver::render(&json!(1.0)), "1");
        assert_eq!(VariableResolver::render(&json!(2.5)), "2.5");
        assert_eq!(VariableResolver::render(&json!([1, "a"])), r#"[1,"a"]"#);
    }

    #[test]
    fn test_resolve_env_vars() {
        unsafe {
            std::env::set_var("RUGRADE_TEST_VAR", "test_value");
        }

        let output = VariableResolver::resolve_env_vars("Value: ${RUGRADE_TEST_VAR}");
        assert_eq!(output, "Value: test_value");

        unsafe {
            std::env::remove_var("RUGRADE_TEST_VAR");
        }
    }

    #[test]
    fn test_resolve_env_vars_missing() {
        let input = "Value: ${RUGRADE_NONEXISTENT_VAR}";
        let output = VariableResolver::resolve_env_vars(input);
        // 未找到的环境变量保持原样
        assert_eq!(output, "Value: ${RUGRADE_NONEXISTENT_VAR}");
    }
}
