//! H.264 解码循环.
//!
//! [`H264Decoder`] 持有全部跨 NAL 的状态: 参数集, DPB, 三个参考列表,
//! POC 预测值与解码计数. 每个 slice 的处理顺序:
//! 1. 解析 slice 头, 构造当前图像与参考列表;
//! 2. 首次解码时为全部帧槽分配缓冲;
//! 3. 调用解码引擎;
//! 4. 生成解码完成记录;
//! 5. 删除 MMCO1 标记的帧, 参考图像执行滑动窗口.

use bytes::Bytes;
use log::{debug, info, warn};
use serde::Serialize;

use super::alloc::{FrameAllocator, LinearAllocator};
use super::config::DecoderConfig;
use super::dpb::Dpb;
use super::engine::{DecodeEngine, DecodeJob};
use super::error::{ConformanceError, EngineError, H264Result};
use super::nal::{AnnexBNal, AnnexBReader, NalUnit, NalUnitType};
use super::parameter_sets::ParameterSets;
use super::poc::PocState;
use super::pps::{Pps, parse_pps};
use super::ref_list::{RefList, RefListKind};
use super::slice_header::{SliceHeader, SliceType};
use super::sps::{Sps, parse_sps};

/// 一帧解码完成后的通知记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedFrame {
    /// 解码序号 (frame_dec_num)
    pub index: u32,
    pub slice_type: SliceType,
    pub frame_num: u32,
    pub pic_order_cnt: i32,
    pub idr: bool,
    pub reference: bool,
    /// 当前图像亮度缓冲地址
    pub luma_address: u32,
    /// 引擎报告的消耗字节数
    pub consumed: usize,
    /// MMCO1 删除的参考帧数量
    pub removed: usize,
    /// 滑动窗口淘汰的参考帧 frame_num
    pub evicted_frame_num: Option<u32>,
    /// 处理完成后的参考帧数量
    pub dpb_size: usize,
}

/// 单个 NAL 的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NalOutcome {
    Sps { sps_id: u32 },
    Pps { pps_id: u32 },
    Frame(DecodedFrame),
    /// 本解码器不处理的 NAL
    Skipped(NalUnitType),
}

/// H.264 解码器上下文
pub struct H264Decoder {
    pub(super) config: DecoderConfig,
    pub(super) params: ParameterSets,
    allocator: Box<dyn FrameAllocator + Send>,
    /// 已分配缓冲对应的每帧宏块数
    allocated_mbs: Option<u32>,
    pub(super) dpb: Dpb,
    pub(super) sh: SliceHeader,
    pub(super) poc: PocState,
    pub(super) prev_frame_num: u32,
    pub(super) frames_decoded: u32,
    pub(super) active_pps: Option<u32>,
    pub(super) list_p0: RefList,
    pub(super) list_b0: RefList,
    pub(super) list_b1: RefList,
}

impl Default for H264Decoder {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}

impl H264Decoder {
    /// 使用线性分配器创建解码器, 地址范围取自配置
    pub fn new(config: DecoderConfig) -> Self {
        let allocator = LinearAllocator::new(config.base_address, config.memory_size);
        Self::with_allocator(config, Box::new(allocator))
    }

    pub fn with_allocator(
        config: DecoderConfig,
        allocator: Box<dyn FrameAllocator + Send>,
    ) -> Self {
        Self {
            config,
            params: ParameterSets::new(),
            allocator,
            allocated_mbs: None,
            dpb: Dpb::new(),
            sh: SliceHeader::default(),
            poc: PocState::default(),
            prev_frame_num: 0,
            frames_decoded: 0,
            active_pps: None,
            list_p0: RefList::new(RefListKind::PList0),
            list_b0: RefList::new(RefListKind::BList0),
            list_b1: RefList::new(RefListKind::BList1),
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn params(&self) -> &ParameterSets {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParameterSets {
        &mut self.params
    }

    pub fn dpb(&self) -> &Dpb {
        &self.dpb
    }

    /// 最近一次解析的 slice 头
    pub fn slice_header(&self) -> &SliceHeader {
        &self.sh
    }

    pub fn poc_state(&self) -> &PocState {
        &self.poc
    }

    pub fn prev_frame_num(&self) -> u32 {
        self.prev_frame_num
    }

    pub fn frames_decoded(&self) -> u32 {
        self.frames_decoded
    }

    pub fn list(&self, kind: RefListKind) -> &RefList {
        match kind {
            RefListKind::PList0 => &self.list_p0,
            RefListKind::BList0 => &self.list_b0,
            RefListKind::BList1 => &self.list_b1,
        }
    }

    /// 最近一个 slice 使用的 PPS
    pub fn active_pps(&self) -> Option<&Pps> {
        self.active_pps.and_then(|id| self.params.pps(id))
    }

    /// 最近一个 slice 使用的 SPS
    pub fn active_sps(&self) -> Option<&Sps> {
        self.active_pps().and_then(|pps| self.params.sps(pps.sps_id))
    }

    /// 处理一个 NAL 单元
    pub fn decode_nal(
        &mut self,
        nal: &NalUnit,
        engine: &mut dyn DecodeEngine,
    ) -> H264Result<NalOutcome> {
        match nal.nal_type {
            NalUnitType::Sps => {
                let sps = parse_sps(&nal.rbsp())?;
                let sps_id = sps.sps_id;
                if self.params.insert_sps(sps) {
                    debug!("H264: 覆盖 SPS, sps_id={}", sps_id);
                }
                Ok(NalOutcome::Sps { sps_id })
            }
            NalUnitType::Pps => {
                let pps = parse_pps(&nal.rbsp(), &self.params)?;
                let pps_id = pps.pps_id;
                if self.params.insert_pps(pps) {
                    debug!("H264: 覆盖 PPS, pps_id={}", pps_id);
                }
                Ok(NalOutcome::Pps { pps_id })
            }
            slice if slice.is_slice() => {
                self.decode_slice(nal, engine).map(NalOutcome::Frame)
            }
            other => {
                debug!("H264: 忽略 NAL, type={}", other);
                Ok(NalOutcome::Skipped(other))
            }
        }
    }

    /// 解码整个 Annex B 字节流, 返回全部解码完成记录
    ///
    /// 每帧解码后按引擎消耗的字节数移动游标, 再查找下一个 NAL.
    pub fn decode_annex_b(
        &mut self,
        data: impl Into<Bytes>,
        engine: &mut dyn DecodeEngine,
    ) -> H264Result<Vec<DecodedFrame>> {
        let mut reader = AnnexBReader::new(data);
        let mut frames = Vec::new();
        while let Some(AnnexBNal { offset, unit }) = reader.next_nal()? {
            if let NalOutcome::Frame(frame) = self.decode_nal(&unit, engine)? {
                reader.seek(offset + frame.consumed);
                frames.push(frame);
            }
        }
        info!(
            "H264: 码流结束, 共解码 {} 帧 (引擎: {})",
            frames.len(),
            engine.name()
        );
        Ok(frames)
    }

    fn decode_slice(
        &mut self,
        nal: &NalUnit,
        engine: &mut dyn DecodeEngine,
    ) -> H264Result<DecodedFrame> {
        self.parse_slice_header(nal)?;
        self.ensure_buffers()?;

        let (consumed, max_num_ref_frames, poc_type) = {
            let (sps, pps) = active_sets(&self.params, self.active_pps)?;
            let job = DecodeJob {
                frame_index: self.frames_decoded,
                nal,
                header: &self.sh,
                sps,
                pps,
                dpb: &self.dpb,
                list_p0: &self.list_p0,
                list_b0: &self.list_b0,
                list_b1: &self.list_b1,
            };
            let consumed = engine.decode(&job)?;
            if consumed == 0 {
                return Err(EngineError::Failed("引擎未消耗任何字节".into()).into());
            }
            self.frames_decoded = self.frames_decoded.saturating_add(1);
            (consumed, sps.max_num_ref_frames as usize, sps.poc_type)
        };

        let current = self.dpb.current();
        let mut frame = DecodedFrame {
            index: current.frame_dec_num,
            slice_type: self.sh.slice_type,
            frame_num: current.frame_num,
            pic_order_cnt: current.pic_order_cnt,
            idr: self.sh.is_idr(),
            reference: nal.is_reference(),
            luma_address: current.buffers.luma,
            consumed,
            removed: 0,
            evicted_frame_num: None,
            dpb_size: 0,
        };

        frame.removed = self.dpb.purge();
        if nal.is_reference() {
            frame.evicted_frame_num = self
                .dpb
                .slide(max_num_ref_frames, poc_type)?
                .map(|id| self.dpb.slot(id).frame_num);
        }
        frame.dpb_size = self.dpb.size();

        info!(
            "H264: 帧 #{} 解码完成, type={} frame_num={} poc={} ref={} dpb_size={}",
            frame.index,
            frame.slice_type,
            frame.frame_num,
            frame.pic_order_cnt,
            frame.reference,
            frame.dpb_size
        );
        Ok(frame)
    }

    /// 首个 slice 为全部帧槽分配缓冲; 图像变大时重新分配
    fn ensure_buffers(&mut self) -> H264Result<()> {
        let (sps, _) = active_sets(&self.params, self.active_pps)?;
        let total_mbs = sps.total_mbs();
        match self.allocated_mbs {
            Some(allocated) if allocated >= total_mbs => return Ok(()),
            Some(allocated) => warn!(
                "H264: 图像尺寸增大, 重新分配帧缓冲, mbs {} -> {}",
                allocated, total_mbs
            ),
            None => {}
        }

        let with_aux = self.config.aux_buffers.wants_aux(sps.is_baseline());
        let buffers = self.allocator.allocate_dpb(sps, with_aux)?;
        debug!(
            "H264: 分配帧缓冲, {} 个帧槽, mbs={}, aux={}",
            buffers.len(),
            total_mbs,
            with_aux
        );
        self.dpb.assign_buffers(&buffers);
        self.allocated_mbs = Some(total_mbs);
        Ok(())
    }
}

/// 由活动 PPS id 查找 (SPS, PPS)
fn active_sets(params: &ParameterSets, active_pps: Option<u32>) -> H264Result<(&Sps, &Pps)> {
    let pps = active_pps
        .and_then(|id| params.pps(id))
        .ok_or(ConformanceError::NoActiveParameterSets)?;
    let sps = params
        .sps(pps.sps_id)
        .ok_or(ConformanceError::NoActiveParameterSets)?;
    Ok((sps, pps))
}
