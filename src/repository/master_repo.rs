// ==========================================
// 生产实绩分析系统 - 品目主数据仓储
// ==========================================
// 职责: item_master 表的全量替换与快照读取
// 说明: 快照为只读内存副本,作为协作者显式注入分析/编排
// ==========================================

use crate::domain::master::{InMemoryMasterData, MasterEntry};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct SqliteItemMaster {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteItemMaster {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 全量替换主数据（单事务: 先清空再写入）
    ///
    /// # 返回
    /// - Ok(n): 写入条数
    pub fn replace_all(&self, entries: &[MasterEntry]) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let deleted = tx.execute("DELETE FROM item_master", [])?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO item_master (item_code, standard_cost) VALUES (?1, ?2)",
            )?;
            for entry in entries {
                written += stmt.execute(params![entry.item_code, entry.standard_cost])?;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(deleted, written, "品目主数据已全量替换");
        Ok(written)
    }

    /// 读取全部主数据
    pub fn list_all(&self) -> RepositoryResult<Vec<MasterEntry>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT item_code, standard_cost FROM item_master ORDER BY item_code")?;
        let entries = stmt
            .query_map([], |row| {
                Ok(MasterEntry {
                    item_code: row.get(0)?,
                    standard_cost: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// 生成只读内存快照
    pub fn snapshot(&self) -> RepositoryResult<InMemoryMasterData> {
        Ok(InMemoryMasterData::from_entries(self.list_all()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::domain::master::MasterDataLookup;

    fn master() -> SqliteItemMaster {
        let conn = db::open_in_memory().unwrap();
        db::apply_migrations(&conn).unwrap();
        SqliteItemMaster::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn entry(code: &str, cost: Option<f64>) -> MasterEntry {
        MasterEntry {
            item_code: code.to_string(),
            standard_cost: cost,
        }
    }

    #[test]
    fn test_replace_all_is_full_refresh() {
        let repo = master();
        repo.replace_all(&[entry("A", Some(1.0)), entry("B", Some(2.0))])
            .unwrap();
        repo.replace_all(&[entry("C", None)]).unwrap();

        let snapshot = repo.snapshot().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.lookup("A").is_none());
        assert_eq!(snapshot.lookup("C").unwrap().standard_cost, None);
    }

    #[test]
    fn test_empty_snapshot() {
        let repo = master();
        assert!(repo.snapshot().unwrap().is_empty());
    }
}
