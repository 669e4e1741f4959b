use serde_json::Value;
use std::collections::HashMap;

use crate::variable::resolver::VariableResolver;

/// 变量存储：作用域为单个 Section 的一次执行
///
/// 每个 Section 开始时新建，结束时丢弃，不跨 Section 共享也不持久化。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableStore {
    /// 变量映射表，值保留原始 JSON 类型
    variables: HashMap<String, Value>,
}

impl VariableStore {
    /// 创建新的空变量存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入变量（覆盖同名旧值）
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.variables.insert(key.into(), value);
    }

    /// 获取变量的 JSON 值
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// 获取变量的文本渲染，用于 `{{name}}` 替换
    pub fn render(&self, key: &str) -> Option<String> {
        self.get(key).map(VariableResolver::render)
    }

    /// 变量数量
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
