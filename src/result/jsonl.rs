use super::model::{ResultRow, RowDetail};
use super::store::{ResultStore, StoreError};
use crate::definition::Level;
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

// 超过该大小时在读取时折叠被覆盖的旧版本
const COMPACTION_THRESHOLD_BYTES: u64 = 4 * 1024 * 1024;

/// 追加写的 JSONL 结果文件
///
/// 每次 `create` / `save` 追加一行完整快照，读取时同一 ID 以最后一行为准。
/// 多个进程可以同时写同一个文件。
pub struct JsonlResultStore {
    file_path: PathBuf,
}

impl JsonlResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn ensure_dir(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.file_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// 追加一行快照
    ///
    /// 写入期间持有 `fs2` 排他锁，跨进程的追加不会交错。
    fn append(&self, row: &ResultRow) -> Result<(), StoreError> {
        self.ensure_dir()?;
        let json = serde_json::to_string(row)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        file.lock_exclusive()?;
        writeln!(file, "{}", json)?;
        drop(file);

        Ok(())
    }

    /// 所有行的最新版本，按首次写入顺序
    pub fn rows(&self) -> Result<Vec<ResultRow>, StoreError> {
        if !self.file_path.exists() {
            return Ok(Vec::new());
        }

        // 读路径上做压缩，写路径保持只追加
        self.compact_if_needed()?;

        let file = fs::File::open(&self.file_path)?;
        file.lock_shared()?;
        Ok(latest_snapshots(BufReader::new(&file)))
    }

    /// 最近 N 次项目评测，按时间从旧到新
    pub fn latest_projects(&self, n: usize) -> Result<Vec<ResultRow>, StoreError> {
        let projects: Vec<ResultRow> = self
            .rows()?
            .into_iter()
            .filter(|r| r.level == Level::Project)
            .collect();
        let skip = projects.len().saturating_sub(n);
        Ok(projects.into_iter().skip(skip).collect())
    }

    /// 某次评测的用户 ID
    pub fn user_of(row: &ResultRow) -> Option<u64> {
        match row.detail {
            RowDetail::Project { user_id } => Some(user_id),
            _ => None,
        }
    }

    fn compact_if_needed(&self) -> Result<(), StoreError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.file_path)?;

        if file.metadata()?.len() < COMPACTION_THRESHOLD_BYTES {
            return Ok(());
        }

        file.lock_exclusive()?;

        // 拿到锁后再检查一次，可能别的进程刚压缩完
        if file.metadata()?.len() < COMPACTION_THRESHOLD_BYTES {
            return Ok(());
        }

        let rows = latest_snapshots(BufReader::new(&file));
        tracing::debug!(
            path = %self.file_path.display(),
            rows = rows.len(),
            "Compacting result file"
        );

        // 截断后在同一个句柄上重写，锁一直有效
        file.set_len(0)?;
        let mut file = file;
        file.seek(SeekFrom::Start(0))?;

        let mut writer = std::io::BufWriter::new(file);
        for row in &rows {
            writeln!(writer, "{}", serde_json::to_string(row)?)?;
        }
        writer.flush()?;

        Ok(())
    }
}

/// 折叠快照：同一 ID 保留最后一行，顺序取首次出现的位置。
/// 无法解析的行跳过。
fn latest_snapshots(reader: impl BufRead) -> Vec<ResultRow> {
    let mut order: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<ResultRow> = Vec::new();

    for line in reader.lines().map_while(|l| l.ok()) {
        if line.trim().is_empty() {
            continue;
        }
        let Ok(row) = serde_json::from_str::<ResultRow>(&line) else {
            continue;
        };
        match order.get(&row.id) {
            Some(&pos) => rows[pos] = row,
            None => {
                order.insert(row.id.clone(), rows.len());
                rows.push(row);
            }
        }
    }

    rows
}

impl ResultStore for JsonlResultStore {
    fn create(&self, row: &ResultRow) -> Result<String, StoreError> {
        self.append(row)?;
        Ok(row.id.clone())
    }

    fn save(&self, row: &ResultRow) -> Result<(), StoreError> {
        self.append(row)
    }

    fn count(
        &self,
        level: Level,
        predicate: &dyn Fn(&ResultRow) -> bool,
    ) -> Result<usize, StoreError> {
        Ok(self
            .rows()?
            .iter()
            .filter(|r| r.level == level && predicate(r))
            .count())
    }
}
