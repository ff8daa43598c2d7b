//! # vde
//!
//! 面向硬件视频解码引擎的 H.264 前端: 解析 slice 头, 维护参考帧缓冲 (DPB),
//! 构造参考图像列表, 再把一帧交给解码引擎.
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use vde::codec::h264::{DecoderConfig, H264Decoder, SoftwareEngine};
//!
//! let data = std::fs::read("input.h264").unwrap();
//! let mut decoder = H264Decoder::new(DecoderConfig::default());
//! let mut engine = SoftwareEngine::new();
//! for frame in decoder.decode_annex_b(data, &mut engine).unwrap() {
//!     println!("#{} {} poc={}", frame.index, frame.slice_type, frame.pic_order_cnt);
//! }
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `vde-core` | 位流读写与基础错误 |
//! | `vde-codec` | H.264 参数集, slice 头, DPB, 参考列表, 解码循环 |

/// 位流读写与基础错误
pub use vde_core as core;

/// H.264 解析与 DPB 管理
pub use vde_codec as codec;

/// 获取 vde 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
