//! H.264 slice 头解析与参考帧缓冲管理.
//!
//! 本模块不重建图像: 它解析参数集与 slice 头, 维护 DPB 与参考列表,
//! 然后把一帧的全部状态交给 [`DecodeEngine`] 解码.

pub mod alloc;
pub mod config;
pub mod decoder;
pub mod dpb;
pub mod engine;
pub mod error;
pub mod nal;
pub mod parameter_sets;
pub mod poc;
pub mod pps;
pub mod ref_list;
pub mod report;
pub mod scaling;
pub mod slice_header;
mod slice_parse;
pub mod sps;
pub mod vui;

pub use alloc::{FrameAllocator, LinearAllocator};
pub use config::{AuxBufferPolicy, DecoderConfig};
pub use decoder::{DecodedFrame, H264Decoder, NalOutcome};
pub use dpb::{DPB_SLOTS, Dpb, FrameBuffers, FrameSlot, SlotId};
pub use engine::{DecodeEngine, DecodeJob, EngineRecord, SoftwareEngine};
pub use error::{ConformanceError, EngineError, H264Error, H264Result, UnimplementedFeature};
pub use nal::{AnnexBNal, AnnexBReader, NalUnit, NalUnitType, split_annex_b};
pub use parameter_sets::ParameterSets;
pub use poc::PocState;
pub use pps::{Pps, SliceGroupMap, parse_pps};
pub use ref_list::{RefList, RefListKind, UnderfillPolicy};
pub use report::{format_frames_list, log_frames_list};
pub use slice_header::{ListModification, PredWeight, SliceHeader, SliceType};
pub use sps::{Sps, parse_sps};
