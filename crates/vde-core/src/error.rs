//! 统一错误类型定义.
//!
//! 比特流读取、NAL 提取与参数集解析共用的底层错误类型.
//! 语法层面的一致性错误由 vde-codec 单独建模.

use thiserror::Error;

/// VDE 底层统一错误类型
#[derive(Debug, Error)]
pub enum VdeError {
    /// 无效参数 (调用方传入的值不合法)
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 无效数据 (损坏的码流, 字段超出范围等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 不支持的语法或配置
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 功能未实现
    #[error("功能未实现: {0}")]
    NotImplemented(String),

    /// 读取越过缓冲区末尾
    #[error("已到达流末尾")]
    Eof,

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 内存预留失败
    #[error("内存分配失败: {0}")]
    OutOfMemory(String),

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

/// VDE 底层统一 Result 类型
pub type VdeResult<T> = Result<T, VdeError>;
