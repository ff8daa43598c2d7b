//! H.264 slice 头数据类型.
//!
//! 解析逻辑见 `slice_parse`, 这里只定义解析结果. 每个 slice 开始解析前
//! 头部被重置为 [`SliceHeader::default`].

use serde::Serialize;

use super::error::ConformanceError;

/// slice 类型 (slice_type % 5)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum SliceType {
    #[default]
    P,
    B,
    I,
    SP,
    SI,
}

impl SliceType {
    /// 由原始 slice_type (0..=9) 得到归一化类型
    pub fn from_raw(raw: u32) -> Result<Self, ConformanceError> {
        match raw {
            0 | 5 => Ok(Self::P),
            1 | 6 => Ok(Self::B),
            2 | 7 => Ok(Self::I),
            3 | 8 => Ok(Self::SP),
            4 | 9 => Ok(Self::SI),
            _ => Err(ConformanceError::MalformedSliceType { raw }),
        }
    }

    /// 是否使用帧间预测 (需要参考列表)
    pub fn is_inter(self) -> bool {
        matches!(self, Self::P | Self::B | Self::SP)
    }
}

impl std::fmt::Display for SliceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::P => "P",
            Self::B => "B",
            Self::I => "I",
            Self::SP => "SP",
            Self::SI => "SI",
        };
        f.pad(name)
    }
}

/// 一条参考列表修改命令 (modification_of_pic_nums_idc 0/1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ListModification {
    pub idc: u32,
    pub abs_diff_pic_num_minus1: u32,
    /// 命令作用后的 frame_num
    pub pic_num: u32,
}

/// pred_weight_table 中单个参考索引的权重
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PredWeight {
    pub luma_weight_flag: bool,
    pub luma_weight: i32,
    pub luma_offset: i32,
    pub chroma_weight_flag: bool,
    /// [Cb, Cr]
    pub chroma_weight: [i32; 2],
    pub chroma_offset: [i32; 2],
}

/// slice 头
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SliceHeader {
    pub first_mb_in_slice: u32,
    pub slice_type: SliceType,
    /// 原始 slice_type (0..=9)
    pub raw_slice_type: u32,
    pub pps_id: u32,
    pub colour_plane_id: u32,
    pub frame_num: u32,
    pub field_pic: bool,
    pub bottom_field: bool,
    /// 仅 IDR 图像存在
    pub idr_pic_id: Option<u32>,
    pub pic_order_cnt_lsb: u32,
    pub delta_pic_order_cnt_bottom: i32,
    pub delta_pic_order_cnt: [i32; 2],
    pub redundant_pic_cnt: u32,
    pub direct_spatial_mv_pred: bool,
    pub num_ref_idx_active_override: bool,
    /// num_ref_idx_l0_active_minus1 + 1
    pub num_ref_idx_l0_active: u32,
    /// num_ref_idx_l1_active_minus1 + 1
    pub num_ref_idx_l1_active: u32,
    pub modifications_l0: Vec<ListModification>,
    pub modifications_l1: Vec<ListModification>,
    pub luma_log2_weight_denom: u32,
    pub chroma_log2_weight_denom: u32,
    pub pred_weight_l0: Vec<PredWeight>,
    pub pred_weight_l1: Vec<PredWeight>,
    pub no_output_of_prior_pics: bool,
    pub long_term_reference: bool,
    pub adaptive_ref_pic_marking: bool,
    /// MMCO1 标记为 "不再参考" 的 picNumX
    pub unused_pic_nums: Vec<u32>,
    pub cabac_init_idc: u32,
    pub slice_qp_delta: i32,
    pub sp_for_switch: bool,
    pub slice_qs_delta: i32,
    pub disable_deblocking_filter_idc: u32,
    pub slice_alpha_c0_offset_div2: i32,
    pub slice_beta_offset_div2: i32,
    pub slice_group_change_cycle: u32,
    /// 推导出的图像顺序计数 (POC 类型 1/2 为 0)
    pub pic_order_cnt: i32,
    /// 头部消耗的总位数
    pub header_bits: usize,
}

impl SliceHeader {
    pub fn is_idr(&self) -> bool {
        self.idr_pic_id.is_some()
    }

    /// 引擎使用的 B 帧标志: 仅原始 slice_type == 1
    pub fn is_b_frame(&self) -> bool {
        self.raw_slice_type == 1
    }
}
