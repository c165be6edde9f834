// ==========================================
// 生产实绩分析系统 - 品目主数据
// ==========================================
// 职责: 定义品目主数据条目与只读查询接口
// 红线: 主数据以显式注入的只读协作者提供,不使用全局缓存
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// MasterEntry - 品目主数据条目
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterEntry {
    pub item_code: String,
    pub standard_cost: Option<f64>, // 標準原価
}

// ==========================================
// MasterDataLookup Trait
// ==========================================
// 用途: ErrorDetector 交叉校验 / 金额派生
// 实现者: InMemoryMasterData
pub trait MasterDataLookup: Send + Sync {
    /// 按品目代码查询主数据
    fn lookup(&self, item_code: &str) -> Option<&MasterEntry>;

    /// 主数据是否为空
    fn is_empty(&self) -> bool;
}

// ==========================================
// InMemoryMasterData - 内存主数据快照
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct InMemoryMasterData {
    entries: HashMap<String, MasterEntry>,
}

impl InMemoryMasterData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = MasterEntry>,
    {
        let entries = entries
            .into_iter()
            .map(|e| (e.item_code.clone(), e))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl MasterDataLookup for InMemoryMasterData {
    fn lookup(&self, item_code: &str) -> Option<&MasterEntry> {
        self.entries.get(item_code.trim())
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
