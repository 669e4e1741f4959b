use super::jsonl::JsonlResultStore;
use super::model::{GradingStatus, ResultRow};
use super::store::ResultStore;
use crate::Result;
use crate::definition::Level;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, Table};

/// 最近的项目评测列表
pub fn list_results(store: &JsonlResultStore, limit: usize) -> Result<()> {
    let rows = store.latest_projects(limit)?;
    println!("{}", results_table(&rows));

    let total = store.count(Level::Project, &|_| true)?;
    let passed = store.count(Level::Project, &|r| r.status.is_passed())?;
    println!("{} of {} recorded runs passed", passed, total);
    Ok(())
}

pub fn results_table(rows: &[ResultRow]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["ID", "Time", "Project", "User", "Status", "Message"]);

    // 最新的在最上面
    for row in rows.iter().rev() {
        let status_color = match row.status {
            GradingStatus::Passed => Color::Green,
            GradingStatus::Failed => Color::Red,
            GradingStatus::Processing => Color::Yellow,
        };
        let user = JsonlResultStore::user_of(row)
            .map(|u| u.to_string())
            .unwrap_or_default();

        table.add_row(vec![
            Cell::new(row.id.get(..8).unwrap_or(&row.id)),
            Cell::new(row.updated_at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(&row.name),
            Cell::new(user),
            Cell::new(row.status.as_str()).fg(status_color),
            Cell::new(&row.message).add_attribute(Attribute::Dim),
        ]);
    }

    table
}
