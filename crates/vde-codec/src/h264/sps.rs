//! H.264 SPS (Sequence Parameter Set) 解析.
//!
//! 除 slice 头解析需要的字段 (frame_num 位宽, POC 类型, 参考帧数量等) 外,
//! 也保存解码引擎配置所需的 profile/level, 图像尺寸与可选的 VUI.

use bitflags::bitflags;
use serde::Serialize;
use vde_core::{BitReader, VdeError, VdeResult};

use super::scaling::{ScalingMatrix, parse_scaling_matrix};
use super::vui::{Vui, parse_vui};

/// Baseline profile 的 profile_idc
pub const PROFILE_BASELINE: u8 = 66;

/// max_num_ref_frames 上限
pub const MAX_NUM_REF_FRAMES: u32 = 16;

bitflags! {
    /// constraint_set0..5_flag
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
    pub struct ConstraintFlags: u8 {
        const SET0 = 0x80;
        const SET1 = 0x40;
        const SET2 = 0x20;
        const SET3 = 0x10;
        const SET4 = 0x08;
        const SET5 = 0x04;
    }
}

/// 帧裁剪偏移
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameCrop {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

/// SPS 解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sps {
    /// profile_idc (66=Baseline, 77=Main, 100=High)
    pub profile_idc: u8,
    pub constraint_flags: ConstraintFlags,
    /// level_idc (30=3.0, 41=4.1)
    pub level_idc: u8,
    /// seq_parameter_set_id (0..=31)
    pub sps_id: u32,
    /// 0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4
    pub chroma_format_idc: u32,
    pub separate_colour_plane: bool,
    pub bit_depth_luma: u32,
    pub bit_depth_chroma: u32,
    pub qpprime_y_zero_transform_bypass: bool,
    /// seq_scaling_matrix_present_flag 为 1 时的量化矩阵
    pub scaling_matrix: Option<ScalingMatrix>,
    /// log2_max_frame_num_minus4 + 4
    pub log2_max_frame_num: u32,
    /// pic_order_cnt_type (0, 1, 2)
    pub poc_type: u32,
    /// log2_max_pic_order_cnt_lsb_minus4 + 4, 仅 poc_type == 0
    pub log2_max_poc_lsb: u32,
    pub delta_pic_order_always_zero: bool,
    pub offset_for_non_ref_pic: i32,
    pub offset_for_top_to_bottom_field: i32,
    pub offset_for_ref_frame: Vec<i32>,
    pub max_num_ref_frames: u32,
    pub gaps_in_frame_num_allowed: bool,
    /// pic_width_in_mbs_minus1 + 1
    pub pic_width_in_mbs: u32,
    /// pic_height_in_map_units_minus1 + 1
    pub pic_height_in_map_units: u32,
    pub frame_mbs_only: bool,
    pub mb_adaptive_frame_field: bool,
    pub direct_8x8_inference: bool,
    pub crop: Option<FrameCrop>,
    pub vui: Option<Vui>,
}

impl Sps {
    /// MaxFrameNum = 2^log2_max_frame_num
    pub fn max_frame_num(&self) -> u32 {
        1 << self.log2_max_frame_num
    }

    /// MaxPicOrderCntLsb = 2^log2_max_poc_lsb
    pub fn max_poc_lsb(&self) -> u32 {
        1 << self.log2_max_poc_lsb
    }

    /// ChromaArrayType: 独立颜色平面时为 0
    pub fn chroma_array_type(&self) -> u32 {
        if self.separate_colour_plane {
            0
        } else {
            self.chroma_format_idc
        }
    }

    /// 帧高度 (宏块)
    pub fn frame_height_in_mbs(&self) -> u32 {
        let field_factor = if self.frame_mbs_only { 1 } else { 2 };
        self.pic_height_in_map_units.saturating_mul(field_factor)
    }

    /// 每帧宏块总数
    pub fn total_mbs(&self) -> u32 {
        self.pic_width_in_mbs.saturating_mul(self.frame_height_in_mbs())
    }

    /// 亮度宽高 (像素, 未裁剪)
    pub fn coded_size(&self) -> (u32, u32) {
        (
            self.pic_width_in_mbs.saturating_mul(16),
            self.frame_height_in_mbs().saturating_mul(16),
        )
    }

    pub fn is_baseline(&self) -> bool {
        self.profile_idc == PROFILE_BASELINE
    }

    /// level_idc 对应的引擎级别编码, 未知级别为 0
    pub fn level_index(&self) -> u32 {
        match self.level_idc {
            11 => 2,
            12 => 3,
            13 => 4,
            20 => 5,
            21 => 6,
            22 => 7,
            30 => 8,
            31 => 9,
            32 => 10,
            40 => 11,
            41 => 12,
            42 => 13,
            50 => 14,
            51 => 15,
            _ => 0,
        }
    }
}

/// 是否带 chroma_format_idc 等扩展字段的 profile
fn has_chroma_format_fields(profile_idc: u8) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134 | 135
    )
}

fn check_range(name: &str, value: u32, max: u32) -> VdeResult<u32> {
    if value > max {
        return Err(VdeError::InvalidData(format!(
            "H264: {} 超出范围, value={}",
            name, value
        )));
    }
    Ok(value)
}

/// 从 RBSP 解析 SPS
pub fn parse_sps(rbsp: &[u8]) -> VdeResult<Sps> {
    if rbsp.len() < 4 {
        return Err(VdeError::InvalidData("H264: SPS RBSP 太短".into()));
    }
    let mut br = BitReader::new(rbsp);

    let profile_idc = br.read_bits(8)? as u8;
    let constraint_flags = ConstraintFlags::from_bits_truncate(br.read_bits(8)? as u8);
    let level_idc = br.read_bits(8)? as u8;
    let sps_id = check_range("seq_parameter_set_id", br.read_ue()?, 31)?;

    let mut sps = Sps {
        profile_idc,
        constraint_flags,
        level_idc,
        sps_id,
        chroma_format_idc: 1,
        bit_depth_luma: 8,
        bit_depth_chroma: 8,
        ..Default::default()
    };

    if has_chroma_format_fields(profile_idc) {
        sps.chroma_format_idc = check_range("chroma_format_idc", br.read_ue()?, 3)?;
        if sps.chroma_format_idc == 3 {
            sps.separate_colour_plane = br.read_flag()?;
        }
        sps.bit_depth_luma = check_range("bit_depth_luma_minus8", br.read_ue()?, 6)? + 8;
        sps.bit_depth_chroma = check_range("bit_depth_chroma_minus8", br.read_ue()?, 6)? + 8;
        sps.qpprime_y_zero_transform_bypass = br.read_flag()?;
        if br.read_flag()? {
            let count_8x8 = if sps.chroma_format_idc == 3 { 6 } else { 2 };
            sps.scaling_matrix = Some(parse_scaling_matrix(&mut br, 6, count_8x8)?);
        }
    }

    sps.log2_max_frame_num = check_range("log2_max_frame_num_minus4", br.read_ue()?, 12)? + 4;

    sps.poc_type = check_range("pic_order_cnt_type", br.read_ue()?, 2)?;
    match sps.poc_type {
        0 => {
            sps.log2_max_poc_lsb =
                check_range("log2_max_pic_order_cnt_lsb_minus4", br.read_ue()?, 12)? + 4;
        }
        1 => {
            sps.delta_pic_order_always_zero = br.read_flag()?;
            sps.offset_for_non_ref_pic = br.read_se()?;
            sps.offset_for_top_to_bottom_field = br.read_se()?;
            let cycle = check_range("num_ref_frames_in_pic_order_cnt_cycle", br.read_ue()?, 255)?;
            sps.offset_for_ref_frame = (0..cycle)
                .map(|_| br.read_se())
                .collect::<VdeResult<Vec<_>>>()?;
        }
        _ => {}
    }

    sps.max_num_ref_frames = check_range("max_num_ref_frames", br.read_ue()?, MAX_NUM_REF_FRAMES)?;
    sps.gaps_in_frame_num_allowed = br.read_flag()?;
    sps.pic_width_in_mbs = br.read_ue()? + 1;
    sps.pic_height_in_map_units = br.read_ue()? + 1;
    sps.frame_mbs_only = br.read_flag()?;
    if !sps.frame_mbs_only {
        sps.mb_adaptive_frame_field = br.read_flag()?;
    }
    sps.direct_8x8_inference = br.read_flag()?;

    if br.read_flag()? {
        sps.crop = Some(FrameCrop {
            left: br.read_ue()?,
            right: br.read_ue()?,
            top: br.read_ue()?,
            bottom: br.read_ue()?,
        });
    }

    if br.read_flag()? {
        sps.vui = Some(parse_vui(&mut br)?);
    }

    log::debug!(
        "H264: SPS id={} profile={} level={} {}x{} mbs, max_ref={}, poc_type={}, log2_max_frame_num={}",
        sps.sps_id,
        sps.profile_idc,
        sps.level_idc,
        sps.pic_width_in_mbs,
        sps.frame_height_in_mbs(),
        sps.max_num_ref_frames,
        sps.poc_type,
        sps.log2_max_frame_num
    );

    Ok(sps)
}
