use std::sync::{Mutex, MutexGuard};

use thiserror::Error;

use crate::definition::Level;
use crate::result::model::ResultRow;

/// 结果存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("result store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize result: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("result store unavailable: {0}")]
    Unavailable(String),
}

/// 结果行的写入端
///
/// `create` 写入一行新的 Processing 结果并返回其 ID，
/// `save` 以同一 ID 覆盖该行。实现需要支持并发的评测任务。
pub trait ResultStore: Send + Sync {
    fn create(&self, row: &ResultRow) -> Result<String, StoreError>;

    fn save(&self, row: &ResultRow) -> Result<(), StoreError>;

    /// 统计某一层中满足条件的行（每个 ID 只算最新版本）
    fn count(
        &self,
        level: Level,
        predicate: &dyn Fn(&ResultRow) -> bool,
    ) -> Result<usize, StoreError>;
}

/// 内存中的结果存储，未配置结果文件时使用
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    rows: Mutex<Vec<ResultRow>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按创建顺序返回所有行的当前版本
    pub fn rows(&self) -> Result<Vec<ResultRow>, StoreError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<ResultRow>>, StoreError> {
        self.rows
            .lock()
            .map_err(|_| StoreError::Unavailable("result store lock poisoned".to_string()))
    }
}

impl ResultStore for MemoryResultStore {
    fn create(&self, row: &ResultRow) -> Result<String, StoreError> {
        self.lock()?.push(row.clone());
        Ok(row.id.clone())
    }

    fn save(&self, row: &ResultRow) -> Result<(), StoreError> {
        let mut rows = self.lock()?;
        match rows.iter_mut().find(|r| r.id == row.id) {
            Some(existing) => *existing = row.clone(),
            None => rows.push(row.clone()),
        }
        Ok(())
    }

    fn count(
        &self,
        level: Level,
        predicate: &dyn Fn(&ResultRow) -> bool,
    ) -> Result<usize, StoreError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|r| r.level == level && predicate(r))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Scenario;
    use crate::result::model::{GradingStatus, ScenarioResult};

    fn scenario_row() -> ResultRow {
        let scenario = Scenario {
            id: 4,
            name: "login".to_string(),
            section_id: 1,
            depends_on: None,
        };
        ScenarioResult::processing(&scenario).row("parent")
    }

    #[test]
    fn test_create_then_save_overwrites() {
        let store = MemoryResultStore::new();
        let mut row = scenario_row();

        let id = store.create(&row).unwrap();
        assert_eq!(id, row.id);

        row.status = GradingStatus::Passed;
        row.message = "All tests passed.".to_string();
        store.save(&row).unwrap();

        let rows = store.rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, GradingStatus::Passed);
    }

    #[test]
    fn test_count_filters_by_level_and_predicate() {
        let store = MemoryResultStore::new();
        let mut passed = scenario_row();
        passed.status = GradingStatus::Passed;
        store.create(&passed).unwrap();
        store.create(&scenario_row()).unwrap();

        let total = store.count(Level::Scenario, &|_| true).unwrap();
        let ok = store
            .count(Level::Scenario, &|r| r.status.is_passed())
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(ok, 1);
        assert_eq!(store.count(Level::Test, &|_| true).unwrap(), 0);
    }
}
