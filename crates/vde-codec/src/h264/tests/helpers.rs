use bytes::Bytes;
use vde_core::BitWriter;

use super::super::{
    DecoderConfig, H264Decoder, NalOutcome, NalUnit, Pps, PredWeight, SliceGroupMap,
    SoftwareEngine, Sps,
};

pub fn build_test_sps() -> Sps {
    Sps {
        profile_idc: 77,
        level_idc: 30,
        sps_id: 0,
        chroma_format_idc: 1,
        bit_depth_luma: 8,
        bit_depth_chroma: 8,
        log2_max_frame_num: 4,
        poc_type: 0,
        log2_max_poc_lsb: 5,
        max_num_ref_frames: 4,
        pic_width_in_mbs: 11,
        pic_height_in_map_units: 9,
        frame_mbs_only: true,
        direct_8x8_inference: true,
        ..Default::default()
    }
}

pub fn build_test_pps() -> Pps {
    Pps {
        pps_id: 0,
        sps_id: 0,
        num_ref_idx_l0_default_active: 1,
        num_ref_idx_l1_default_active: 1,
        pic_init_qp: 26,
        pic_init_qs: 26,
        deblocking_filter_control_present: true,
        ..Default::default()
    }
}

pub fn build_test_decoder() -> H264Decoder {
    build_decoder_with(DecoderConfig::default(), build_test_sps(), build_test_pps())
}

pub fn build_decoder_with(config: DecoderConfig, sps: Sps, pps: Pps) -> H264Decoder {
    let mut dec = H264Decoder::new(config);
    dec.params_mut().insert_sps(sps);
    dec.params_mut().insert_pps(pps);
    dec
}

/// 测试用 slice 头字段, 只覆盖测试参数集会用到的语法
#[derive(Debug, Clone, Default)]
pub struct SliceBits {
    pub raw_slice_type: u32,
    pub pps_id: u32,
    /// SPS 分离色彩平面时写入
    pub colour_plane_id: u32,
    pub frame_num: u32,
    /// 场图像: Some(bottom_field_flag), 仅 frame_mbs_only=false 时写入
    pub field: Option<bool>,
    pub idr_pic_id: Option<u32>,
    pub poc_lsb: u32,
    pub delta_pic_order_cnt_bottom: i32,
    /// POC 类型 1 的 delta_pic_order_cnt[0..2]
    pub delta_pic_order_cnt: [i32; 2],
    pub redundant_pic_cnt: u32,
    /// 覆盖活动参考数 (l0, l1)
    pub num_ref_idx_override: Option<(u32, u32)>,
    /// (idc, 参数), 末尾的 idc=3 自动追加
    pub modifications_l0: Option<Vec<(u32, u32)>>,
    pub modifications_l1: Option<Vec<(u32, u32)>>,
    /// 显式权重表, None 时按活动参考数写全零标志
    pub weights: Option<WeightBits>,
    pub long_term_reference: bool,
    /// (op, 参数), 末尾的 op=0 自动追加
    pub mmco: Option<Vec<(u32, Vec<u32>)>>,
    pub slice_qp_delta: i32,
    pub disable_deblocking_filter_idc: u32,
    /// (slice_alpha_c0_offset_div2, slice_beta_offset_div2)
    pub deblocking_offsets: (i32, i32),
    pub slice_group_change_cycle: u32,
}

/// pred_weight_table() 内容
#[derive(Debug, Clone, Default)]
pub struct WeightBits {
    pub luma_log2_denom: u32,
    pub chroma_log2_denom: u32,
    pub l0: Vec<PredWeight>,
    pub l1: Vec<PredWeight>,
}

/// 写出的 slice 头及其关键位置
#[derive(Debug, Clone)]
pub struct SliceRbsp {
    pub rbsp: Vec<u8>,
    /// 头部总位数 (不含 rbsp_trailing_bits)
    pub header_bits: usize,
    /// 权重表结束时的位数
    pub weights_end_bits: Option<usize>,
}

impl SliceBits {
    pub fn idr_i(idr_pic_id: u32) -> Self {
        Self {
            raw_slice_type: 7,
            idr_pic_id: Some(idr_pic_id),
            ..Default::default()
        }
    }

    pub fn i(frame_num: u32, poc_lsb: u32) -> Self {
        Self {
            raw_slice_type: 2,
            frame_num,
            poc_lsb,
            ..Default::default()
        }
    }

    pub fn p(frame_num: u32, poc_lsb: u32) -> Self {
        Self {
            raw_slice_type: 0,
            frame_num,
            poc_lsb,
            ..Default::default()
        }
    }

    pub fn b(frame_num: u32, poc_lsb: u32) -> Self {
        Self {
            raw_slice_type: 1,
            frame_num,
            poc_lsb,
            ..Default::default()
        }
    }
}

fn write_modifications(bw: &mut BitWriter, cmds: &Option<Vec<(u32, u32)>>) {
    let Some(cmds) = cmds else {
        bw.write_flag(false);
        return;
    };
    bw.write_flag(true);
    for &(idc, value) in cmds {
        bw.write_ue(idc);
        if idc != 3 {
            bw.write_ue(value);
        }
    }
    bw.write_ue(3);
}

fn write_weights(bw: &mut BitWriter, weights: &[PredWeight], chroma_array_type: u32) {
    for weight in weights {
        bw.write_flag(weight.luma_weight_flag);
        if weight.luma_weight_flag {
            bw.write_se(weight.luma_weight);
            bw.write_se(weight.luma_offset);
        }
        if chroma_array_type != 0 {
            bw.write_flag(weight.chroma_weight_flag);
            if weight.chroma_weight_flag {
                for j in 0..2 {
                    bw.write_se(weight.chroma_weight[j]);
                    bw.write_se(weight.chroma_offset[j]);
                }
            }
        }
    }
}

/// 按解析器的读取顺序写出 slice 头 RBSP, 返回 (RBSP, 头部位数)
pub fn build_slice_rbsp(sps: &Sps, pps: &Pps, nal_ref_idc: u8, bits: &SliceBits) -> (Vec<u8>, usize) {
    let out = write_slice_rbsp(sps, pps, nal_ref_idc, bits);
    (out.rbsp, out.header_bits)
}

/// 同 [`build_slice_rbsp`], 另外记录权重表结束位置
pub fn write_slice_rbsp(sps: &Sps, pps: &Pps, nal_ref_idc: u8, bits: &SliceBits) -> SliceRbsp {
    let mut bw = BitWriter::new();
    bw.write_ue(0); // first_mb_in_slice
    bw.write_ue(bits.raw_slice_type);
    bw.write_ue(bits.pps_id);
    if sps.separate_colour_plane {
        bw.write_bits(bits.colour_plane_id, 2);
    }
    bw.write_bits(bits.frame_num, sps.log2_max_frame_num);
    if !sps.frame_mbs_only {
        bw.write_flag(bits.field.is_some());
        if let Some(bottom) = bits.field {
            bw.write_flag(bottom);
        }
    }
    if let Some(idr_pic_id) = bits.idr_pic_id {
        bw.write_ue(idr_pic_id);
    }
    let bottom_present = pps.bottom_field_pic_order_in_frame_present && bits.field.is_none();
    match sps.poc_type {
        0 => {
            bw.write_bits(bits.poc_lsb, sps.log2_max_poc_lsb);
            if bottom_present {
                bw.write_se(bits.delta_pic_order_cnt_bottom);
            }
        }
        1 if !sps.delta_pic_order_always_zero => {
            bw.write_se(bits.delta_pic_order_cnt[0]);
            if bottom_present {
                bw.write_se(bits.delta_pic_order_cnt[1]);
            }
        }
        _ => {}
    }
    if pps.redundant_pic_cnt_present {
        bw.write_ue(bits.redundant_pic_cnt);
    }

    let slice_type = bits.raw_slice_type % 5;
    let is_b = slice_type == 1;
    let mut weights_end_bits = None;
    if slice_type == 0 || is_b {
        if is_b {
            bw.write_flag(true); // direct_spatial_mv_pred
        }
        match bits.num_ref_idx_override {
            Some((l0, l1)) => {
                bw.write_flag(true);
                bw.write_ue(l0 - 1);
                if is_b {
                    bw.write_ue(l1 - 1);
                }
            }
            None => bw.write_flag(false),
        }
        write_modifications(&mut bw, &bits.modifications_l0);
        if is_b {
            write_modifications(&mut bw, &bits.modifications_l1);
        }

        let weighted = if is_b {
            pps.weighted_bipred_idc == 1
        } else {
            pps.weighted_pred
        };
        if weighted {
            let chroma_array_type = sps.chroma_array_type();
            let table = bits.weights.clone().unwrap_or_else(|| {
                let (l0, l1) = bits.num_ref_idx_override.unwrap_or((
                    pps.num_ref_idx_l0_default_active,
                    pps.num_ref_idx_l1_default_active,
                ));
                WeightBits {
                    l0: vec![PredWeight::default(); l0 as usize],
                    l1: vec![PredWeight::default(); l1 as usize],
                    ..Default::default()
                }
            });
            bw.write_ue(table.luma_log2_denom);
            if chroma_array_type != 0 {
                bw.write_ue(table.chroma_log2_denom);
            }
            write_weights(&mut bw, &table.l0, chroma_array_type);
            if is_b {
                write_weights(&mut bw, &table.l1, chroma_array_type);
            }
            weights_end_bits = Some(bw.bits_written());
        }
    }

    if nal_ref_idc != 0 {
        if bits.idr_pic_id.is_some() {
            bw.write_flag(false); // no_output_of_prior_pics
            bw.write_flag(bits.long_term_reference);
        } else {
            match &bits.mmco {
                Some(ops) => {
                    bw.write_flag(true);
                    for (op, args) in ops {
                        bw.write_ue(*op);
                        for &arg in args {
                            bw.write_ue(arg);
                        }
                    }
                    bw.write_ue(0);
                }
                None => bw.write_flag(false),
            }
        }
    }

    if pps.entropy_coding_mode && slice_type != 2 {
        bw.write_ue(0); // cabac_init_idc
    }
    bw.write_se(bits.slice_qp_delta);
    if pps.deblocking_filter_control_present {
        bw.write_ue(bits.disable_deblocking_filter_idc);
        if bits.disable_deblocking_filter_idc != 1 {
            bw.write_se(bits.deblocking_offsets.0);
            bw.write_se(bits.deblocking_offsets.1);
        }
    }
    if pps
        .slice_group_map
        .as_ref()
        .is_some_and(SliceGroupMap::is_changing)
    {
        let width = u32::BITS - (pps.num_slice_groups_minus1 + 1).leading_zeros();
        bw.write_bits(bits.slice_group_change_cycle, width);
    }
    let header_bits = bw.bits_written();
    bw.write_trailing_bits();
    SliceRbsp {
        rbsp: bw.finish(),
        header_bits,
        weights_end_bits,
    }
}

/// 插入防竞争字节
pub fn add_emulation_prevention(rbsp: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rbsp.len() + 4);
    let mut zeros = 0usize;
    for &byte in rbsp {
        if zeros >= 2 && byte <= 0x03 {
            out.push(0x03);
            zeros = 0;
        }
        zeros = if byte == 0x00 { zeros + 1 } else { 0 };
        out.push(byte);
    }
    out
}

/// 由 RBSP 构造 NAL 单元 (含头部字节)
pub fn build_nal(nal_type: u8, nal_ref_idc: u8, rbsp: &[u8]) -> NalUnit {
    let mut data = vec![(nal_ref_idc << 5) | nal_type];
    data.extend(add_emulation_prevention(rbsp));
    NalUnit::parse(Bytes::from(data)).expect("测试构造 NAL 失败")
}

/// 按当前参数集构造 slice NAL
pub fn build_slice_nal(dec: &H264Decoder, nal_ref_idc: u8, bits: &SliceBits) -> NalUnit {
    let pps = dec.params().pps(bits.pps_id).expect("测试 PPS 不存在").clone();
    let sps = dec.params().sps(pps.sps_id).expect("测试 SPS 不存在").clone();
    let (rbsp, _) = build_slice_rbsp(&sps, &pps, nal_ref_idc, bits);
    let nal_type = if bits.idr_pic_id.is_some() { 5 } else { 1 };
    build_nal(nal_type, nal_ref_idc, &rbsp)
}

/// 解码一个参考 slice, 必须成功
pub fn decode_ok(dec: &mut H264Decoder, engine: &mut SoftwareEngine, bits: &SliceBits) {
    let nal = build_slice_nal(dec, 3, bits);
    match dec.decode_nal(&nal, engine) {
        Ok(NalOutcome::Frame(_)) => {}
        Ok(other) => panic!("slice 应产生解码帧, actual={:?}", other),
        Err(err) => panic!("slice 解码失败: {}", err),
    }
}

/// 解码 IDR 加若干非 IDR I 帧参考, POC lsb 依次为 0, 4, 8, ...
pub fn decode_reference_chain(dec: &mut H264Decoder, engine: &mut SoftwareEngine, count: u32) {
    decode_ok(dec, engine, &SliceBits::idr_i(0));
    for frame_num in 1..count {
        decode_ok(dec, engine, &SliceBits::i(frame_num, frame_num * 4));
    }
}

/// Baseline SPS RBSP (无 VUI)
pub fn build_sps_rbsp(sps: &Sps) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(u32::from(sps.profile_idc), 8);
    bw.write_bits(u32::from(sps.constraint_flags.bits()), 8);
    bw.write_bits(u32::from(sps.level_idc), 8);
    bw.write_ue(sps.sps_id);
    bw.write_ue(sps.log2_max_frame_num - 4);
    bw.write_ue(sps.poc_type);
    if sps.poc_type == 0 {
        bw.write_ue(sps.log2_max_poc_lsb - 4);
    }
    bw.write_ue(sps.max_num_ref_frames);
    bw.write_flag(sps.gaps_in_frame_num_allowed);
    bw.write_ue(sps.pic_width_in_mbs - 1);
    bw.write_ue(sps.pic_height_in_map_units - 1);
    bw.write_flag(true); // frame_mbs_only
    bw.write_flag(sps.direct_8x8_inference);
    bw.write_flag(false); // cropping
    bw.write_flag(false); // vui
    bw.write_trailing_bits();
    bw.finish()
}

/// PPS RBSP (单 slice group, 无扩展字段)
pub fn build_pps_rbsp(pps: &Pps) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_ue(pps.pps_id);
    bw.write_ue(pps.sps_id);
    bw.write_flag(pps.entropy_coding_mode);
    bw.write_flag(pps.bottom_field_pic_order_in_frame_present);
    bw.write_ue(0); // num_slice_groups_minus1
    bw.write_ue(pps.num_ref_idx_l0_default_active - 1);
    bw.write_ue(pps.num_ref_idx_l1_default_active - 1);
    bw.write_flag(pps.weighted_pred);
    bw.write_bits(pps.weighted_bipred_idc, 2);
    bw.write_se(pps.pic_init_qp - 26);
    bw.write_se(pps.pic_init_qs - 26);
    bw.write_se(pps.chroma_qp_index_offset);
    bw.write_flag(pps.deblocking_filter_control_present);
    bw.write_flag(pps.constrained_intra_pred);
    bw.write_flag(pps.redundant_pic_cnt_present);
    bw.write_trailing_bits();
    bw.finish()
}

/// 拼接 Annex B 字节流, 首个 NAL 使用 4 字节起始码
pub fn build_annex_b(nals: &[&NalUnit]) -> Vec<u8> {
    let mut stream = Vec::new();
    for (idx, nal) in nals.iter().enumerate() {
        if idx == 0 {
            stream.push(0x00);
        }
        stream.extend_from_slice(&[0x00, 0x00, 0x01]);
        stream.extend_from_slice(&nal.data);
    }
    stream
}
