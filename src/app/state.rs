// ==========================================
// 生产实绩分析系统 - 应用状态
// ==========================================
// 职责: 持有单一 SQLite 连接与各仓储; 按配置构造编排器/分析器
// 说明: 同一时刻只有一个运行（外部调度保证）,连接以 Arc<Mutex> 共享
// ==========================================

use crate::config::settings::AppSettings;
use crate::db;
use crate::domain::master::InMemoryMasterData;
use crate::engine::{
    AgingParams, AmountSummaryAnalyzer, ErrorDetector, InventoryAgingAnalyzer,
};
use crate::importer::master_sync::MasterSync;
use crate::importer::staging_loader::{StagingLoader, StagingPaths};
use crate::importer::ImportError;
use crate::pipeline::{IngestionOrchestrator, RetryPolicy};
use crate::repository::{
    ImportBatchRepository, RepositoryResult, SqliteItemMaster, SqliteProductionStore,
    SqliteStagingStore,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct AppState {
    pub settings: AppSettings,
    pub store: Arc<SqliteProductionStore>,
    pub item_master: Arc<SqliteItemMaster>,
    pub import_batches: Arc<ImportBatchRepository>,
    pub staging: Arc<SqliteStagingStore>,
}

impl AppState {
    /// 打开配置中的数据库并执行迁移
    pub fn new(settings: AppSettings) -> rusqlite::Result<Self> {
        info!(db_path = %settings.db_path.display(), "打开数据库");
        let conn = db::open_and_migrate(&settings.db_path)?;
        Ok(Self::from_connection(settings, conn))
    }

    /// 从已迁移的连接构造（测试可传入内存库）
    pub fn from_connection(settings: AppSettings, conn: Connection) -> Self {
        let conn = Arc::new(Mutex::new(conn));
        Self {
            settings,
            store: Arc::new(SqliteProductionStore::from_connection(conn.clone())),
            item_master: Arc::new(SqliteItemMaster::from_connection(conn.clone())),
            import_batches: Arc::new(ImportBatchRepository::from_connection(conn.clone())),
            staging: Arc::new(SqliteStagingStore::from_connection(conn)),
        }
    }

    /// 当前主数据快照
    pub fn master_snapshot(&self) -> RepositoryResult<InMemoryMasterData> {
        self.item_master.snapshot()
    }

    /// 按配置构造导入编排器
    pub fn orchestrator(&self) -> RepositoryResult<IngestionOrchestrator> {
        let master = Arc::new(self.master_snapshot()?);
        Ok(IngestionOrchestrator::new(
            self.store.clone(),
            master,
            self.settings.file_type_table(),
        )
        .with_file_type(&self.settings.export_file_type)
        .with_retry_policy(RetryPolicy::from_settings(&self.settings.retry))
        .with_mrp_controller_prefix(self.settings.mrp_controller_prefix.clone()))
    }

    /// 按配置构造主数据同步器
    pub fn master_sync(&self) -> Result<MasterSync<'_>, ImportError> {
        let table = self.settings.file_type_table();
        let file_type = table
            .get(&self.settings.master_file_type)
            .cloned()
            .ok_or_else(|| ImportError::UnknownFileType(self.settings.master_file_type.clone()))?;
        Ok(MasterSync::new(
            &self.item_master,
            file_type,
            self.settings.master_plant.clone(),
        ))
    }

    /// 按配置构造仕掛/在库装载器
    pub fn staging_loader(&self) -> StagingLoader<'_> {
        StagingLoader::new(&self.staging, self.settings.file_type_table())
    }

    /// 配置中的仕掛/在库文件路径
    pub fn staging_paths(&self) -> StagingPaths {
        let staging = &self.settings.staging;
        StagingPaths {
            wip_details: staging.wip_details_path.clone(),
            zp58: staging.zp58_path.clone(),
            zp02: staging.zp02_path.clone(),
            storage_locations: staging.storage_locations_path.clone(),
            zs65: staging.zs65_path.clone(),
        }
    }

    pub fn error_detector<'m>(&self, master: &'m InMemoryMasterData) -> ErrorDetector<'m> {
        ErrorDetector::new(master, self.settings.recognized_mrp_controllers.iter().cloned())
    }

    pub fn aging_analyzer(&self, reference_date: NaiveDate) -> InventoryAgingAnalyzer {
        InventoryAgingAnalyzer::new(AgingParams::new(reference_date, &self.settings.aging))
    }

    pub fn amount_analyzer(&self) -> AmountSummaryAnalyzer {
        AmountSummaryAnalyzer::new(self.settings.recognized_mrp_controllers.clone())
    }
}
