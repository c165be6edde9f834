// ==========================================
// 生产实绩分析系统 - 有界重试策略
// ==========================================
// 职责: 文件临时不可访问（被占用/挂载未就绪）时的有限次重试
// 说明: 等待通过 Sleeper 注入,测试中不依赖真实时间
// ==========================================

use crate::config::settings::RetrySettings;
use std::time::Duration;
use tracing::warn;

// ==========================================
// Sleeper Trait
// ==========================================
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// 阻塞当前线程
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// ==========================================
// RetryPolicy - 固定间隔有界重试
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32, // 含首次尝试
    pub backoff: Duration,  // 每次失败后的固定等待
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(settings.max_attempts, Duration::from_secs(settings.backoff_secs))
    }

    /// 执行操作,失败时按策略重试
    ///
    /// # 参数
    /// - `sleeper`: 两次尝试之间的等待实现
    /// - `op`: 被重试的操作,参数为当前尝试序号（1 起）
    ///
    /// # 返回
    /// - Ok(T): 某次尝试成功
    /// - Err((E, attempts)): 全部尝试失败,携带最后一次错误与尝试次数
    pub fn run<T, E, F>(&self, sleeper: &dyn Sleeper, mut op: F) -> Result<T, (E, u32)>
    where
        E: std::fmt::Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= max_attempts => return Err((e, attempt)),
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts,
                        backoff_ms = self.backoff.as_millis() as u64,
                        error = %e,
                        "操作失败,等待后重试"
                    );
                    sleeper.sleep(self.backoff);
                    attempt += 1;
                }
            }
        }
    }
}
