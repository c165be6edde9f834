// ==========================================
// 生产实绩分析系统 - 应用层
// ==========================================
// 职责: 从配置装配共享连接、仓储、编排器与分析器
// ==========================================

pub mod state;

pub use state::AppState;
