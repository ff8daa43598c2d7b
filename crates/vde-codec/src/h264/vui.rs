//! SPS 中的 VUI (Video Usability Information) 参数.
//!
//! VUI 只作为信息记录保存, 不影响 slice 头解析和 DPB 管理.

use serde::Serialize;
use vde_core::{BitReader, VdeError, VdeResult};

/// aspect_ratio_idc == Extended_SAR 时显式给出 sar_width/sar_height
const EXTENDED_SAR: u8 = 255;

/// cpb_cnt_minus1 的上限 (ITU-T H.264 E.2.2)
const MAX_CPB_CNT: u32 = 32;

/// 像素宽高比
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AspectRatio {
    pub idc: u8,
    /// 仅 Extended_SAR 时有值
    pub sar: Option<(u16, u16)>,
}

/// 视频信号类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VideoSignalType {
    pub video_format: u8,
    pub full_range: bool,
    /// (colour_primaries, transfer_characteristics, matrix_coefficients)
    pub colour_description: Option<(u8, u8, u8)>,
}

/// 时间信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimingInfo {
    pub num_units_in_tick: u32,
    pub time_scale: u32,
    pub fixed_frame_rate: bool,
}

impl TimingInfo {
    /// 帧率 (time_scale / (2 * num_units_in_tick)), 参数非法时为 None
    pub fn frame_rate(&self) -> Option<f64> {
        if self.num_units_in_tick == 0 || self.time_scale == 0 {
            return None;
        }
        Some(f64::from(self.time_scale) / (2.0 * f64::from(self.num_units_in_tick)))
    }
}

/// HRD 单个调度参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CpbSchedule {
    pub bit_rate_value_minus1: u32,
    pub cpb_size_value_minus1: u32,
    pub cbr: bool,
}

/// HRD 参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HrdParameters {
    pub bit_rate_scale: u8,
    pub cpb_size_scale: u8,
    pub schedules: Vec<CpbSchedule>,
    pub initial_cpb_removal_delay_length_minus1: u8,
    pub cpb_removal_delay_length_minus1: u8,
    pub dpb_output_delay_length_minus1: u8,
    pub time_offset_length: u8,
}

/// 码流限制参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BitstreamRestriction {
    pub motion_vectors_over_pic_boundaries: bool,
    pub max_bytes_per_pic_denom: u32,
    pub max_bits_per_mb_denom: u32,
    pub log2_max_mv_length_horizontal: u32,
    pub log2_max_mv_length_vertical: u32,
    pub max_num_reorder_frames: u32,
    pub max_dec_frame_buffering: u32,
}

/// VUI 参数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Vui {
    pub aspect_ratio: Option<AspectRatio>,
    pub overscan_appropriate: Option<bool>,
    pub video_signal: Option<VideoSignalType>,
    /// (chroma_sample_loc_type_top_field, chroma_sample_loc_type_bottom_field)
    pub chroma_loc: Option<(u32, u32)>,
    pub timing: Option<TimingInfo>,
    pub nal_hrd: Option<HrdParameters>,
    pub vcl_hrd: Option<HrdParameters>,
    /// 仅在存在任一 HRD 时出现
    pub low_delay_hrd: Option<bool>,
    pub pic_struct_present: bool,
    pub bitstream_restriction: Option<BitstreamRestriction>,
}

/// 解析 vui_parameters()
pub fn parse_vui(br: &mut BitReader) -> VdeResult<Vui> {
    let mut vui = Vui::default();

    if br.read_flag()? {
        let idc = br.read_bits(8)? as u8;
        let sar = if idc == EXTENDED_SAR {
            Some((br.read_bits(16)? as u16, br.read_bits(16)? as u16))
        } else {
            None
        };
        vui.aspect_ratio = Some(AspectRatio { idc, sar });
    }

    if br.read_flag()? {
        vui.overscan_appropriate = Some(br.read_flag()?);
    }

    if br.read_flag()? {
        let video_format = br.read_bits(3)? as u8;
        let full_range = br.read_flag()?;
        let colour_description = if br.read_flag()? {
            Some((
                br.read_bits(8)? as u8,
                br.read_bits(8)? as u8,
                br.read_bits(8)? as u8,
            ))
        } else {
            None
        };
        vui.video_signal = Some(VideoSignalType {
            video_format,
            full_range,
            colour_description,
        });
    }

    if br.read_flag()? {
        vui.chroma_loc = Some((br.read_ue()?, br.read_ue()?));
    }

    if br.read_flag()? {
        vui.timing = Some(TimingInfo {
            num_units_in_tick: br.read_bits(32)?,
            time_scale: br.read_bits(32)?,
            fixed_frame_rate: br.read_flag()?,
        });
    }

    if br.read_flag()? {
        vui.nal_hrd = Some(parse_hrd(br)?);
    }
    if br.read_flag()? {
        vui.vcl_hrd = Some(parse_hrd(br)?);
    }
    if vui.nal_hrd.is_some() || vui.vcl_hrd.is_some() {
        vui.low_delay_hrd = Some(br.read_flag()?);
    }

    vui.pic_struct_present = br.read_flag()?;

    if br.read_flag()? {
        vui.bitstream_restriction = Some(BitstreamRestriction {
            motion_vectors_over_pic_boundaries: br.read_flag()?,
            max_bytes_per_pic_denom: br.read_ue()?,
            max_bits_per_mb_denom: br.read_ue()?,
            log2_max_mv_length_horizontal: br.read_ue()?,
            log2_max_mv_length_vertical: br.read_ue()?,
            max_num_reorder_frames: br.read_ue()?,
            max_dec_frame_buffering: br.read_ue()?,
        });
    }

    Ok(vui)
}

fn parse_hrd(br: &mut BitReader) -> VdeResult<HrdParameters> {
    let cpb_cnt = br.read_ue()? + 1;
    if cpb_cnt > MAX_CPB_CNT {
        return Err(VdeError::InvalidData(format!(
            "H264: cpb_cnt_minus1 超出范围, value={}",
            cpb_cnt - 1
        )));
    }
    let bit_rate_scale = br.read_bits(4)? as u8;
    let cpb_size_scale = br.read_bits(4)? as u8;
    let mut schedules = Vec::with_capacity(cpb_cnt as usize);
    for _ in 0..cpb_cnt {
        schedules.push(CpbSchedule {
            bit_rate_value_minus1: br.read_ue()?,
            cpb_size_value_minus1: br.read_ue()?,
            cbr: br.read_flag()?,
        });
    }
    Ok(HrdParameters {
        bit_rate_scale,
        cpb_size_scale,
        schedules,
        initial_cpb_removal_delay_length_minus1: br.read_bits(5)? as u8,
        cpb_removal_delay_length_minus1: br.read_bits(5)? as u8,
        dpb_output_delay_length_minus1: br.read_bits(5)? as u8,
        time_offset_length: br.read_bits(5)? as u8,
    })
}
