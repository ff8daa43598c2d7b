//! slice 头解析.
//!
//! 解析过程中同时完成 DPB 相关的副作用: IDR 清空 DPB, frame_num 回绕标记,
//! 写入当前图像, 构造默认参考列表并应用列表修改, MMCO1 标记待删除帧.

use log::{Level, debug};
use vde_core::{BitReader, VdeError, VdeResult};

use super::decoder::H264Decoder;
use super::dpb::Dpb;
use super::error::{ConformanceError, H264Result, UnimplementedFeature};
use super::nal::NalUnit;
use super::pps::SliceGroupMap;
use super::ref_list::{MAX_REF_LIST_LEN, RefList};
use super::report::log_frames_list;
use super::slice_header::{ListModification, PredWeight, SliceHeader, SliceType};

/// 正在读取的 ref_pic_list_modification 部分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModificationList {
    L0,
    L1,
}

impl H264Decoder {
    /// 解析一个 slice 头, 结果保存在 [`H264Decoder::slice_header`]
    ///
    /// 成功返回时 DPB 位置 0 为当前图像, 当前 slice 类型对应的参考列表
    /// 已构造完成. 出错时解码器状态可能已部分更新, 调用方应停止该码流.
    pub fn parse_slice_header(&mut self, nal: &NalUnit) -> H264Result<()> {
        let rbsp = nal.rbsp();
        let mut br = BitReader::new(&rbsp);

        self.sh = SliceHeader::default();
        self.list_p0.clear();
        self.list_b0.clear();
        self.list_b1.clear();
        let sh = &mut self.sh;

        sh.first_mb_in_slice = br.read_ue()?;
        sh.raw_slice_type = br.read_ue()?;
        sh.slice_type = SliceType::from_raw(sh.raw_slice_type)?;
        sh.pps_id = br.read_ue()?;
        if sh.pps_id > 255 {
            return Err(ConformanceError::PpsIdOutOfRange { pps_id: sh.pps_id }.into());
        }
        let pps = self
            .params
            .pps(sh.pps_id)
            .ok_or(ConformanceError::InvalidPps { pps_id: sh.pps_id })?;
        let sps = self
            .params
            .sps(pps.sps_id)
            .ok_or(ConformanceError::InvalidSps { sps_id: pps.sps_id })?;
        self.active_pps = Some(sh.pps_id);

        if sps.separate_colour_plane {
            sh.colour_plane_id = br.read_bits(2)?;
        }
        sh.frame_num = br.read_bits(sps.log2_max_frame_num)?;
        if !sps.frame_mbs_only {
            sh.field_pic = br.read_flag()?;
            if sh.field_pic {
                sh.bottom_field = br.read_flag()?;
            }
        }

        let idr = nal.nal_type.is_idr();
        if idr {
            sh.idr_pic_id = Some(br.read_ue()?);
            self.dpb.flush();
        }

        let bottom_delta_present = pps.bottom_field_pic_order_in_frame_present && !sh.field_pic;
        match sps.poc_type {
            0 => {
                if idr {
                    self.poc.reset();
                }
                sh.pic_order_cnt_lsb = br.read_bits(sps.log2_max_poc_lsb)?;
                if bottom_delta_present {
                    sh.delta_pic_order_cnt_bottom = br.read_se()?;
                }
                sh.pic_order_cnt = self.poc.derive(sh.pic_order_cnt_lsb, sps.max_poc_lsb());
            }
            1 if !sps.delta_pic_order_always_zero => {
                sh.delta_pic_order_cnt[0] = br.read_se()?;
                if bottom_delta_present {
                    sh.delta_pic_order_cnt[1] = br.read_se()?;
                }
            }
            _ => {}
        }

        if pps.redundant_pic_cnt_present {
            sh.redundant_pic_cnt = br.read_ue()?;
            if sh.redundant_pic_cnt != 0 {
                return Err(UnimplementedFeature::RedundantPicCnt {
                    count: sh.redundant_pic_cnt,
                }
                .into());
            }
        }

        match sh.slice_type {
            SliceType::SP | SliceType::SI => {
                return Err(ConformanceError::UnsupportedSliceType {
                    slice_type: sh.slice_type,
                }
                .into());
            }
            SliceType::P | SliceType::B => {
                let is_b = sh.slice_type == SliceType::B;
                if is_b {
                    sh.direct_spatial_mv_pred = br.read_flag()?;
                }
                sh.num_ref_idx_active_override = br.read_flag()?;
                if sh.num_ref_idx_active_override {
                    sh.num_ref_idx_l0_active =
                        read_ref_idx_count(&mut br, "num_ref_idx_l0_active_minus1")?;
                    if is_b {
                        sh.num_ref_idx_l1_active =
                            read_ref_idx_count(&mut br, "num_ref_idx_l1_active_minus1")?;
                    }
                } else {
                    sh.num_ref_idx_l0_active = pps.num_ref_idx_l0_default_active;
                    sh.num_ref_idx_l1_active = pps.num_ref_idx_l1_default_active;
                }
            }
            SliceType::I => {}
        }

        debug!(
            "H264: slice first_mb = {} slice_type = {} pps_id = {} frame_num = {} idr_pic_id = {:?} pic_order_cnt_lsb = {} num_ref_idx_active = {}/{}",
            sh.first_mb_in_slice,
            sh.raw_slice_type,
            sh.pps_id,
            sh.frame_num,
            sh.idr_pic_id,
            sh.pic_order_cnt_lsb,
            sh.num_ref_idx_l0_active,
            sh.num_ref_idx_l1_active
        );

        if !sps.gaps_in_frame_num_allowed && !idr && sh.frame_num != self.prev_frame_num {
            let expected = (self.prev_frame_num + 1) % sps.max_frame_num();
            if sh.frame_num.abs_diff(expected) > 1 {
                return Err(ConformanceError::FrameNumGap {
                    prev_frame_num: self.prev_frame_num,
                    frame_num: sh.frame_num,
                }
                .into());
            }
        }
        self.prev_frame_num = sh.frame_num;

        if sh.frame_num == 0 {
            self.dpb.mark_wrap();
        }

        let current = self.dpb.current_mut();
        current.frame_dec_num = self.frames_decoded;
        current.frame_num = sh.frame_num;
        current.pic_order_cnt = sh.pic_order_cnt;
        current.is_b_frame = sh.is_b_frame();
        current.sps_id = Some(sps.sps_id);
        current.empty = false;

        let dump_level = if self.config.dump_dpb {
            Level::Info
        } else {
            Level::Debug
        };
        log_frames_list(
            dump_level,
            "DPB",
            &self.dpb,
            self.dpb.order(),
            Some(sps.max_num_ref_frames as usize + 1),
        );

        let policy = self.config.ref_list_underfill;
        match sh.slice_type {
            SliceType::P => {
                self.list_p0.set(self.dpb.build_p_list0(sps.poc_type));
                self.list_p0
                    .force_len(sh.num_ref_idx_l0_active as usize, policy)?;
            }
            SliceType::B => {
                self.list_b0.set(self.dpb.build_b_list0());
                self.list_b0
                    .force_len(sh.num_ref_idx_l0_active as usize, policy)?;
                self.list_b1.set(self.dpb.build_b_list1());
                self.list_b1
                    .force_len(sh.num_ref_idx_l1_active as usize, policy)?;
            }
            _ => {}
        }

        let max_frame_num = sps.max_frame_num();
        if sh.slice_type.is_inter() {
            let is_b = sh.slice_type == SliceType::B;
            let (l0, l1) = if is_b {
                (&mut self.list_b0, Some(&mut self.list_b1))
            } else {
                (&mut self.list_p0, None)
            };
            parse_ref_pic_list_modification(&mut br, sh, &self.dpb, l0, l1, max_frame_num)?;
            if is_b {
                log_list(&self.dpb, &self.list_b0);
                log_list(&self.dpb, &self.list_b1);
            } else {
                log_list(&self.dpb, &self.list_p0);
            }
        }

        let weighted = match sh.slice_type {
            SliceType::P => pps.weighted_pred,
            SliceType::B => pps.weighted_bipred_idc == 1,
            _ => false,
        };
        if weighted {
            parse_pred_weight_table(&mut br, sh, sps.chroma_array_type())?;
            // header_bits 记录权重表之后的位置
            sh.header_bits = br.bits_read();
            return Err(UnimplementedFeature::WeightedPrediction.into());
        }

        if nal.ref_idc != 0 {
            parse_dec_ref_pic_marking(&mut br, sh, &mut self.dpb, idr, max_frame_num)?;
        }

        if pps.entropy_coding_mode && !matches!(sh.slice_type, SliceType::I | SliceType::SI) {
            sh.cabac_init_idc = read_ue_max(&mut br, "cabac_init_idc", 2)?;
        }

        sh.slice_qp_delta = br.read_se()?;
        if matches!(sh.slice_type, SliceType::SP | SliceType::SI) {
            if sh.slice_type == SliceType::SP {
                sh.sp_for_switch = br.read_flag()?;
            }
            sh.slice_qs_delta = br.read_se()?;
        }

        if pps.deblocking_filter_control_present {
            sh.disable_deblocking_filter_idc =
                read_ue_max(&mut br, "disable_deblocking_filter_idc", 2)?;
            if sh.disable_deblocking_filter_idc != 1 {
                sh.slice_alpha_c0_offset_div2 = br.read_se()?;
                sh.slice_beta_offset_div2 = br.read_se()?;
            }
        }

        if pps
            .slice_group_map
            .as_ref()
            .is_some_and(SliceGroupMap::is_changing)
        {
            let bits = u32::BITS - (pps.num_slice_groups_minus1 + 1).leading_zeros();
            sh.slice_group_change_cycle = br.read_bits(bits)?;
        }

        sh.header_bits = br.bits_read();
        debug!(
            "H264: slice_qp_delta = {} disable_deblocking_filter_idc = {} pic_order_cnt = {} header_bits = {}",
            sh.slice_qp_delta, sh.disable_deblocking_filter_idc, sh.pic_order_cnt, sh.header_bits
        );
        Ok(())
    }
}

fn read_ue_max(br: &mut BitReader, name: &str, max: u32) -> VdeResult<u32> {
    let value = br.read_ue()?;
    if value > max {
        return Err(VdeError::InvalidData(format!(
            "H264: {} 超出范围, value={}",
            name, value
        )));
    }
    Ok(value)
}

/// 读取 num_ref_idx_lX_active_minus1, 返回活动参考数
fn read_ref_idx_count(br: &mut BitReader, name: &str) -> VdeResult<u32> {
    Ok(read_ue_max(br, name, MAX_REF_LIST_LEN as u32 - 1)? + 1)
}

fn log_list(dpb: &Dpb, list: &RefList) {
    log_frames_list(
        Level::Debug,
        &list.kind().to_string(),
        dpb,
        list.entries(),
        None,
    );
}

/// ref_pic_list_modification(): L0, B slice 再读 L1
fn parse_ref_pic_list_modification(
    br: &mut BitReader,
    sh: &mut SliceHeader,
    dpb: &Dpb,
    l0: &mut RefList,
    mut l1: Option<&mut RefList>,
    max_frame_num: u32,
) -> H264Result<()> {
    let frame_num = sh.frame_num;
    let mut state = Some(ModificationList::L0);
    while let Some(current) = state {
        let (list, records) = match current {
            ModificationList::L0 => (&mut *l0, &mut sh.modifications_l0),
            ModificationList::L1 => match l1.as_deref_mut() {
                Some(list) => (list, &mut sh.modifications_l1),
                None => break,
            },
        };
        if br.read_flag()? {
            apply_modifications(br, dpb, list, records, frame_num, max_frame_num)?;
        }
        state = match current {
            ModificationList::L0 if l1.is_some() => Some(ModificationList::L1),
            _ => None,
        };
    }
    Ok(())
}

/// 读取并执行一个列表的修改命令, 直到 idc == 3
///
/// picNum 预测值从当前 frame_num 开始, 每个列表独立.
fn apply_modifications(
    br: &mut BitReader,
    dpb: &Dpb,
    list: &mut RefList,
    records: &mut Vec<ListModification>,
    frame_num: u32,
    max_frame_num: u32,
) -> H264Result<()> {
    let mask = max_frame_num - 1;
    let mut pred = frame_num;
    let mut ref_idx = 0usize;
    loop {
        let idc = br.read_ue()?;
        match idc {
            0 | 1 => {
                let abs_diff_pic_num_minus1 = br.read_ue()?;
                let diff = abs_diff_pic_num_minus1.wrapping_add(1);
                let next = if idc == 0 {
                    pred.wrapping_sub(diff)
                } else {
                    pred.wrapping_add(diff)
                };
                pred = next & mask;
                list.move_to(dpb, pred, ref_idx)?;
                debug!(
                    "H264: {} modification idc = {} abs_diff_pic_num_minus1 = {} -> ref_idx {} = frame_num {}",
                    list.kind(),
                    idc,
                    abs_diff_pic_num_minus1,
                    ref_idx,
                    pred
                );
                records.push(ListModification {
                    idc,
                    abs_diff_pic_num_minus1,
                    pic_num: pred,
                });
                ref_idx += 1;
            }
            2 => {
                let long_term_pic_num = br.read_ue()?;
                return Err(UnimplementedFeature::LongTermModification { long_term_pic_num }.into());
            }
            3 => return Ok(()),
            _ => return Err(ConformanceError::MalformedModificationIdc { idc }.into()),
        }
    }
}

/// pred_weight_table(): 只读取并保存, 不参与解码
fn parse_pred_weight_table(
    br: &mut BitReader,
    sh: &mut SliceHeader,
    chroma_array_type: u32,
) -> VdeResult<()> {
    sh.luma_log2_weight_denom = read_ue_max(br, "luma_log2_weight_denom", 7)?;
    if chroma_array_type != 0 {
        sh.chroma_log2_weight_denom = read_ue_max(br, "chroma_log2_weight_denom", 7)?;
    }
    sh.pred_weight_l0 = parse_weights(br, sh.num_ref_idx_l0_active, chroma_array_type)?;
    if sh.slice_type == SliceType::B {
        sh.pred_weight_l1 = parse_weights(br, sh.num_ref_idx_l1_active, chroma_array_type)?;
    }
    Ok(())
}

fn parse_weights(
    br: &mut BitReader,
    count: u32,
    chroma_array_type: u32,
) -> VdeResult<Vec<PredWeight>> {
    (0..count)
        .map(|_| {
            let mut weight = PredWeight {
                luma_weight_flag: br.read_flag()?,
                ..Default::default()
            };
            if weight.luma_weight_flag {
                weight.luma_weight = br.read_se()?;
                weight.luma_offset = br.read_se()?;
            }
            if chroma_array_type != 0 {
                weight.chroma_weight_flag = br.read_flag()?;
                if weight.chroma_weight_flag {
                    for j in 0..2 {
                        weight.chroma_weight[j] = br.read_se()?;
                        weight.chroma_offset[j] = br.read_se()?;
                    }
                }
            }
            Ok(weight)
        })
        .collect()
}

/// dec_ref_pic_marking(): 仅支持滑动窗口与 MMCO1
fn parse_dec_ref_pic_marking(
    br: &mut BitReader,
    sh: &mut SliceHeader,
    dpb: &mut Dpb,
    idr: bool,
    max_frame_num: u32,
) -> H264Result<()> {
    if idr {
        sh.no_output_of_prior_pics = br.read_flag()?;
        sh.long_term_reference = br.read_flag()?;
        if sh.long_term_reference {
            return Err(UnimplementedFeature::LongTermReference.into());
        }
        return Ok(());
    }

    sh.adaptive_ref_pic_marking = br.read_flag()?;
    if !sh.adaptive_ref_pic_marking {
        return Ok(());
    }

    let mask = max_frame_num - 1;
    loop {
        let op = br.read_ue()?;
        match op {
            0 => return Ok(()),
            1 => {
                let difference_of_pic_nums_minus1 = br.read_ue()?;
                let pic_num = sh
                    .frame_num
                    .wrapping_sub(difference_of_pic_nums_minus1.wrapping_add(1))
                    & mask;
                dpb.mark_for_removal(pic_num)?;
                debug!("H264: MMCO1 frame_num = {} 标记为不再参考", pic_num);
                sh.unused_pic_nums.push(pic_num);
            }
            2..=6 => {
                // 消耗命令参数后再报告
                let args = match op {
                    3 => 2,
                    5 => 0,
                    _ => 1,
                };
                for _ in 0..args {
                    br.read_ue()?;
                }
                return Err(UnimplementedFeature::MemoryManagementOp { op }.into());
            }
            _ => return Err(ConformanceError::MalformedMemoryManagementOp { op }.into()),
        }
    }
}
