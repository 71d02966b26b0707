//! 统一错误类型定义.
//!
//! 码流送入, 缓冲区管理与反变换共用的错误类型, 支持跨 crate 传播.

use thiserror::Error;

/// avcs 统一错误类型
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AvcError {
    /// 无效参数 (前置条件不满足, 不修改任何状态)
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 解码引擎尚未初始化
    #[error("解码引擎未初始化")]
    NotInitialized,

    /// 内存分配失败 (缓冲区增长失败, 原有状态保持不变)
    #[error("内存分配失败: {0}")]
    OutOfMemory(String),

    /// 外部解码引擎初始化失败
    #[error("解码引擎初始化失败: {0}")]
    EngineInitFailed(String),

    /// 反变换结果超出 [-512, 511]
    #[error("反变换结果超出有效范围 [-512, 511]")]
    RangeViolation,

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

/// avcs 统一 Result 类型
pub type AvcResult<T> = Result<T, AvcError>;
