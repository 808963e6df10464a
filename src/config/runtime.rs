use super::{ConfigError, ConfigResult};
use crate::impl_default;
use serde::{Deserialize, Serialize};

/// 嵌入引擎的种类；构造时选定，之后调用方不再区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// QuickJS (rquickjs)
    QuickJs,
}

impl Default for EngineKind {
    fn default() -> Self {
        EngineKind::QuickJs
    }
}

/// 引擎运行时限制
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeLimits {
    /// 引擎堆内存上限（字节），None 表示不限制
    pub memory_limit: Option<usize>,

    /// 最大栈大小（字节）
    pub max_stack_size: usize,

    /// 触发引擎 GC 的分配阈值（字节）
    pub gc_threshold: Option<usize>,
}

impl_default!(RuntimeLimits {
    memory_limit: None,
    max_stack_size: 4 * 1024 * 1024,
    gc_threshold: None,
});

impl RuntimeLimits {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_stack_size < 64 * 1024 {
            return Err(ConfigError::ValidationError(
                "max_stack_size must be at least 64 KiB".to_string(),
            ));
        }
        if let Some(limit) = self.memory_limit {
            if limit < 1024 * 1024 {
                return Err(ConfigError::ValidationError(
                    "memory_limit must be at least 1 MiB".to_string(),
                ));
            }
        }
        if self.gc_threshold == Some(0) {
            return Err(ConfigError::ValidationError(
                "gc_threshold must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// 待执行任务（Promise 回调）配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// 单次 run_pending_jobs 最多执行的任务数，None 表示一直执行到队列为空
    pub max_jobs_per_drain: Option<usize>,
}

impl_default!(JobConfig {
    max_jobs_per_drain: None,
});

impl JobConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_jobs_per_drain == Some(0) {
            return Err(ConfigError::ValidationError(
                "max_jobs_per_drain must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
