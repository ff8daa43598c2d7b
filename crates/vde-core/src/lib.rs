//! # vde-core
//!
//! VDE 的底层基础设施: 按位读取/写入比特流 (含 Exp-Golomb 编码) 与统一错误类型.

pub mod bitreader;
pub mod bitwriter;
pub mod error;

// 重导出常用类型
pub use bitreader::BitReader;
pub use bitwriter::BitWriter;
pub use error::{VdeError, VdeResult};
