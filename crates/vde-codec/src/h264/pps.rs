//! H.264 PPS (Picture Parameter Set) 解析.

use serde::Serialize;
use vde_core::{BitReader, VdeError, VdeResult};

use super::parameter_sets::ParameterSets;
use super::scaling::{ScalingMatrix, parse_scaling_matrix};

/// slice group 映射参数 (仅保存原始语法值, 不生成宏块映射)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SliceGroupMap {
    /// 类型 0: 交错
    Interleaved { run_length_minus1: Vec<u32> },
    /// 类型 1: 分散
    Dispersed,
    /// 类型 2: 前景与剩余
    Foreground {
        top_left: Vec<u32>,
        bottom_right: Vec<u32>,
    },
    /// 类型 3..=5: 盒形/光栅/擦除变化
    Changing {
        map_type: u32,
        change_direction: bool,
        change_rate_minus1: u32,
    },
    /// 类型 6: 显式指定
    Explicit { slice_group_id: Vec<u32> },
}

impl SliceGroupMap {
    /// slice_group_map_type
    pub fn map_type(&self) -> u32 {
        match self {
            Self::Interleaved { .. } => 0,
            Self::Dispersed => 1,
            Self::Foreground { .. } => 2,
            Self::Changing { map_type, .. } => *map_type,
            Self::Explicit { .. } => 6,
        }
    }

    /// 是否为会在 slice 头携带 slice_group_change_cycle 的类型 (3..=5)
    pub fn is_changing(&self) -> bool {
        matches!(self, Self::Changing { .. })
    }
}

/// PPS 解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pps {
    /// pic_parameter_set_id (0..=255)
    pub pps_id: u32,
    /// seq_parameter_set_id (0..=31)
    pub sps_id: u32,
    /// entropy_coding_mode_flag: true 为 CABAC
    pub entropy_coding_mode: bool,
    pub bottom_field_pic_order_in_frame_present: bool,
    pub num_slice_groups_minus1: u32,
    /// num_slice_groups_minus1 > 0 时存在
    pub slice_group_map: Option<SliceGroupMap>,
    /// num_ref_idx_l0_default_active_minus1 + 1
    pub num_ref_idx_l0_default_active: u32,
    /// num_ref_idx_l1_default_active_minus1 + 1
    pub num_ref_idx_l1_default_active: u32,
    pub weighted_pred: bool,
    /// 0: 默认, 1: 显式, 2: 隐式
    pub weighted_bipred_idc: u32,
    pub pic_init_qp: i32,
    pub pic_init_qs: i32,
    pub chroma_qp_index_offset: i32,
    pub deblocking_filter_control_present: bool,
    pub constrained_intra_pred: bool,
    pub redundant_pic_cnt_present: bool,
    pub transform_8x8_mode: bool,
    pub scaling_matrix: Option<ScalingMatrix>,
    /// 未出现时等于 chroma_qp_index_offset
    pub second_chroma_qp_index_offset: i32,
}

impl Pps {
    /// 当前 PPS 的 slice_group_map_type, 单 slice group 时为 None
    pub fn slice_group_map_type(&self) -> Option<u32> {
        self.slice_group_map.as_ref().map(SliceGroupMap::map_type)
    }
}

fn read_ranged_ue(br: &mut BitReader, name: &str, max: u32) -> VdeResult<u32> {
    let value = br.read_ue()?;
    if value > max {
        return Err(VdeError::InvalidData(format!(
            "H264: {} 超出范围, value={}",
            name, value
        )));
    }
    Ok(value)
}

fn read_ranged_se(br: &mut BitReader, name: &str, min: i32, max: i32) -> VdeResult<i32> {
    let value = br.read_se()?;
    if !(min..=max).contains(&value) {
        return Err(VdeError::InvalidData(format!(
            "H264: {} 超出范围, value={}",
            name, value
        )));
    }
    Ok(value)
}

/// 从 RBSP 解析 PPS
///
/// `params` 用于查找被引用的 SPS 的 chroma_format_idc, 以确定 8x8 量化矩阵数量;
/// SPS 尚未到达时按 4:2:0 处理.
pub fn parse_pps(rbsp: &[u8], params: &ParameterSets) -> VdeResult<Pps> {
    if rbsp.is_empty() {
        return Err(VdeError::InvalidData("H264: PPS RBSP 为空".into()));
    }
    let mut br = BitReader::new(rbsp);

    let pps_id = read_ranged_ue(&mut br, "pic_parameter_set_id", 255)?;
    let sps_id = read_ranged_ue(&mut br, "seq_parameter_set_id", 31)?;
    let entropy_coding_mode = br.read_flag()?;
    let bottom_field_pic_order_in_frame_present = br.read_flag()?;

    let num_slice_groups_minus1 = read_ranged_ue(&mut br, "num_slice_groups_minus1", 7)?;
    let slice_group_map = if num_slice_groups_minus1 > 0 {
        Some(parse_slice_group_map(&mut br, num_slice_groups_minus1)?)
    } else {
        None
    };

    let num_ref_idx_l0_default_active =
        read_ranged_ue(&mut br, "num_ref_idx_l0_default_active_minus1", 31)? + 1;
    let num_ref_idx_l1_default_active =
        read_ranged_ue(&mut br, "num_ref_idx_l1_default_active_minus1", 31)? + 1;
    let weighted_pred = br.read_flag()?;
    let weighted_bipred_idc = br.read_bits(2)?;
    if weighted_bipred_idc > 2 {
        return Err(VdeError::InvalidData(format!(
            "H264: weighted_bipred_idc 非法, value={}",
            weighted_bipred_idc
        )));
    }
    let pic_init_qp = 26 + read_ranged_se(&mut br, "pic_init_qp_minus26", -26, 25)?;
    let pic_init_qs = 26 + read_ranged_se(&mut br, "pic_init_qs_minus26", -26, 25)?;
    let chroma_qp_index_offset = read_ranged_se(&mut br, "chroma_qp_index_offset", -12, 12)?;
    let deblocking_filter_control_present = br.read_flag()?;
    let constrained_intra_pred = br.read_flag()?;
    let redundant_pic_cnt_present = br.read_flag()?;

    let mut pps = Pps {
        pps_id,
        sps_id,
        entropy_coding_mode,
        bottom_field_pic_order_in_frame_present,
        num_slice_groups_minus1,
        slice_group_map,
        num_ref_idx_l0_default_active,
        num_ref_idx_l1_default_active,
        weighted_pred,
        weighted_bipred_idc,
        pic_init_qp,
        pic_init_qs,
        chroma_qp_index_offset,
        deblocking_filter_control_present,
        constrained_intra_pred,
        redundant_pic_cnt_present,
        transform_8x8_mode: false,
        scaling_matrix: None,
        second_chroma_qp_index_offset: chroma_qp_index_offset,
    };

    if br.more_rbsp_data() {
        pps.transform_8x8_mode = br.read_flag()?;
        if br.read_flag()? {
            let chroma_format_idc = params.sps(sps_id).map_or(1, |sps| sps.chroma_format_idc);
            let count_8x8 = match (pps.transform_8x8_mode, chroma_format_idc) {
                (false, _) => 0,
                (true, 3) => 6,
                (true, _) => 2,
            };
            pps.scaling_matrix = Some(parse_scaling_matrix(&mut br, 6, count_8x8)?);
        }
        pps.second_chroma_qp_index_offset =
            read_ranged_se(&mut br, "second_chroma_qp_index_offset", -12, 12)?;
    }

    log::debug!(
        "H264: PPS id={} sps_id={} cabac={} slice_groups={} ref_idx_default=({}, {}), weighted=({}, {})",
        pps.pps_id,
        pps.sps_id,
        pps.entropy_coding_mode,
        pps.num_slice_groups_minus1 + 1,
        pps.num_ref_idx_l0_default_active,
        pps.num_ref_idx_l1_default_active,
        pps.weighted_pred,
        pps.weighted_bipred_idc
    );

    Ok(pps)
}

fn parse_slice_group_map(br: &mut BitReader, num_slice_groups_minus1: u32) -> VdeResult<SliceGroupMap> {
    let map_type = read_ranged_ue(br, "slice_group_map_type", 6)?;
    let map = match map_type {
        0 => SliceGroupMap::Interleaved {
            run_length_minus1: (0..=num_slice_groups_minus1)
                .map(|_| br.read_ue())
                .collect::<VdeResult<_>>()?,
        },
        1 => SliceGroupMap::Dispersed,
        2 => {
            let mut top_left = Vec::with_capacity(num_slice_groups_minus1 as usize);
            let mut bottom_right = Vec::with_capacity(num_slice_groups_minus1 as usize);
            for _ in 0..num_slice_groups_minus1 {
                top_left.push(br.read_ue()?);
                bottom_right.push(br.read_ue()?);
            }
            SliceGroupMap::Foreground {
                top_left,
                bottom_right,
            }
        }
        3..=5 => SliceGroupMap::Changing {
            map_type,
            change_direction: br.read_flag()?,
            change_rate_minus1: br.read_ue()?,
        },
        _ => {
            let pic_size_in_map_units = br.read_ue()? as usize + 1;
            // Ceil(Log2(num_slice_groups_minus1 + 1))
            let id_bits = 32 - num_slice_groups_minus1.leading_zeros();
            let mut slice_group_id = Vec::with_capacity(pic_size_in_map_units.min(1 << 16));
            for _ in 0..pic_size_in_map_units {
                slice_group_id.push(br.read_bits(id_bits)?);
            }
            SliceGroupMap::Explicit { slice_group_id }
        }
    };
    Ok(map)
}
