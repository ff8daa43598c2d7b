//! # vde-codec
//!
//! VDE 的 H.264 前端: 解析 SPS/PPS/slice 头, 管理参考帧缓冲 (DPB) 与参考列表,
//! 驱动外部解码引擎逐帧解码.
//!
//! ## 使用示例
//!
//! ```rust
//! use vde_codec::h264::{DecoderConfig, H264Decoder, SoftwareEngine};
//!
//! let mut decoder = H264Decoder::new(DecoderConfig::default());
//! let mut engine = SoftwareEngine::new();
//! // 空码流不产生任何帧
//! let frames = decoder.decode_annex_b(Vec::<u8>::new(), &mut engine).unwrap();
//! assert!(frames.is_empty());
//! ```

pub mod h264;

// 重导出常用类型
pub use h264::{DecodeEngine, DecoderConfig, H264Decoder, H264Error, H264Result};
