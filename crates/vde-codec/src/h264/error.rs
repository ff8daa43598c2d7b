//! H.264 解码错误类型.
//!
//! 三类致命错误需要区分:
//! - [`ConformanceError`]: 码流不符合规范或已损坏, 调用方应停止该码流;
//! - [`UnimplementedFeature`]: 语法可识别但功能未实现, 相关位已被正确消耗;
//! - [`EngineError`]: 解码引擎报告失败或超时, 需要外部复位引擎.

use thiserror::Error;
use vde_core::VdeError;

use super::ref_list::RefListKind;
use super::slice_header::SliceType;

/// 码流一致性错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConformanceError {
    /// pic_parameter_set_id 超出 0..=255
    #[error("pic_parameter_set_id 超出范围, pps_id={pps_id}")]
    PpsIdOutOfRange { pps_id: u32 },

    /// 引用了未解析 (无效) 的 PPS
    #[error("PPS 无效或尚未解析, pps_id={pps_id}")]
    InvalidPps { pps_id: u32 },

    /// PPS 引用了未解析 (无效) 的 SPS
    #[error("SPS 无效或尚未解析, sps_id={sps_id}")]
    InvalidSps { sps_id: u32 },

    /// slice_type 超出 0..=9
    #[error("slice_type 非法, value={raw}")]
    MalformedSliceType { raw: u32 },

    /// SI/SP slice 不受支持
    #[error("不支持的 slice 类型: {slice_type}")]
    UnsupportedSliceType { slice_type: SliceType },

    /// frame_num 跳变超过容差, 且 SPS 不允许间隙
    #[error("frame_num 间隙过大, prev_frame_num={prev_frame_num}, frame_num={frame_num}")]
    FrameNumGap { prev_frame_num: u32, frame_num: u32 },

    /// 列表修改命令指向的 frame_num 不在列表中
    #[error("ref_pic_list_modification 未找到目标帧, list={list}, pic_num={pic_num}")]
    ModificationTargetMissing { list: RefListKind, pic_num: u32 },

    /// 列表修改命令匹配到多个帧
    #[error(
        "ref_pic_list_modification 匹配到多个帧, list={list}, pic_num={pic_num}, matches={matches}"
    )]
    ModificationTargetAmbiguous {
        list: RefListKind,
        pic_num: u32,
        matches: usize,
    },

    /// 列表修改的写入位置超出列表长度
    #[error("ref_pic_list_modification 索引越界, list={list}, ref_idx={ref_idx}, len={len}")]
    ModificationIndexOverflow {
        list: RefListKind,
        ref_idx: usize,
        len: usize,
    },

    /// modification_of_pic_nums_idc 非法
    #[error("modification_of_pic_nums_idc 非法, value={idc}")]
    MalformedModificationIdc { idc: u32 },

    /// MMCO1 指向的 frame_num 不在 DPB 中
    #[error("MMCO1 未找到目标帧, pic_num={pic_num}")]
    MarkingTargetMissing { pic_num: u32 },

    /// MMCO1 匹配到多个 DPB 帧
    #[error("MMCO1 匹配到多个帧, pic_num={pic_num}, matches={matches}")]
    MarkingTargetAmbiguous { pic_num: u32, matches: usize },

    /// memory_management_control_operation 非法
    #[error("memory_management_control_operation 非法, op={op}")]
    MalformedMemoryManagementOp { op: u32 },

    /// 滑动窗口只支持 pic_order_cnt_type 0 和 2
    #[error("滑动窗口不支持的 pic_order_cnt_type, value={poc_type}")]
    UnsupportedPocType { poc_type: u32 },

    /// 构造出的参考列表不足声明的活动参考数
    #[error("参考帧不足, list={list}, achieved={achieved}, declared={declared}")]
    InsufficientReferences {
        list: RefListKind,
        achieved: usize,
        declared: usize,
    },

    /// 尚未解析任何 slice, 没有活动参数集
    #[error("没有活动的 SPS/PPS")]
    NoActiveParameterSets,
}

/// 可识别但未实现的语法
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnimplementedFeature {
    /// 非零 redundant_pic_cnt
    #[error("redundant_pic_cnt={count} 未实现")]
    RedundantPicCnt { count: u32 },

    /// IDR 的 long_term_reference_flag
    #[error("长期参考帧未实现")]
    LongTermReference,

    /// 长期参考帧的列表修改 (modification_of_pic_nums_idc == 2)
    #[error("长期参考帧列表修改未实现, long_term_pic_num={long_term_pic_num}")]
    LongTermModification { long_term_pic_num: u32 },

    /// 加权预测
    #[error("pred_weight_table 未实现")]
    WeightedPrediction,

    /// MMCO 2/3/4/5/6
    #[error("memory_management_control_operation={op} 未实现")]
    MemoryManagementOp { op: u32 },
}

/// 解码引擎错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// 等待解码完成超时
    #[error("解码超时, frame={frame}")]
    Timeout { frame: u32 },

    /// 引擎报告失败
    #[error("解码失败: {0}")]
    Failed(String),
}

/// H.264 解码统一错误类型
#[derive(Debug, Error)]
pub enum H264Error {
    /// 底层比特流或参数集错误
    #[error("H264: {0}")]
    Bitstream(#[from] VdeError),

    /// 码流一致性错误
    #[error("H264: 码流不合规: {0}")]
    Conformance(#[from] ConformanceError),

    /// 可识别但未实现的语法
    #[error("H264: {0}")]
    Unimplemented(#[from] UnimplementedFeature),

    /// 解码引擎错误
    #[error("H264: 引擎错误: {0}")]
    Engine(#[from] EngineError),
}

impl H264Error {
    /// 是否为 "功能未实现" 类错误 (码流本身可能合法)
    pub fn is_unimplemented(&self) -> bool {
        matches!(self, Self::Unimplemented(_))
    }

    /// 获取一致性错误 (若是)
    pub fn as_conformance(&self) -> Option<&ConformanceError> {
        match self {
            Self::Conformance(err) => Some(err),
            _ => None,
        }
    }
}

/// H.264 解码统一 Result 类型
pub type H264Result<T> = Result<T, H264Error>;
