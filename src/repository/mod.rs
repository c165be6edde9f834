// ==========================================
// 生产实绩分析系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod import_batch_repo;
pub mod master_repo;
pub mod production_repo;
pub mod staging_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use import_batch_repo::{BatchStatus, ImportBatch, ImportBatchRepository};
pub use master_repo::SqliteItemMaster;
pub use production_repo::{ProductionStore, RecordFilter, SqliteProductionStore};
pub use staging_repo::{SqliteStagingStore, StagingWriteCounts};
