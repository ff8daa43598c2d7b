//! 解码引擎接口.
//!
//! 硬件引擎读取解析好的 slice 头, 活动参数集, DPB 与参考列表,
//! 解码一帧后报告从 NAL 起始处消耗的字节数.

use super::dpb::Dpb;
use super::error::EngineError;
use super::nal::NalUnit;
use super::pps::Pps;
use super::ref_list::RefList;
use super::slice_header::{SliceHeader, SliceType};
use super::sps::Sps;

/// 一次解码任务, 只借用解码器状态
#[derive(Debug, Clone, Copy)]
pub struct DecodeJob<'a> {
    /// 本次解码的序号 (从 0 开始)
    pub frame_index: u32,
    pub nal: &'a NalUnit,
    pub header: &'a SliceHeader,
    pub sps: &'a Sps,
    pub pps: &'a Pps,
    pub dpb: &'a Dpb,
    pub list_p0: &'a RefList,
    pub list_b0: &'a RefList,
    pub list_b1: &'a RefList,
}

impl<'a> DecodeJob<'a> {
    /// 当前 slice 类型使用的参考列表
    pub fn active_lists(&self) -> Vec<&'a RefList> {
        match self.header.slice_type {
            SliceType::P => vec![self.list_p0],
            SliceType::B => vec![self.list_b0, self.list_b1],
            _ => Vec::new(),
        }
    }

    /// 引擎使用的参考帧 POC 列表, 按活动列表顺序
    pub fn list_pocs(&self) -> Vec<Vec<i32>> {
        self.active_lists()
            .into_iter()
            .map(|list| {
                list.entries()
                    .iter()
                    .map(|&id| self.dpb.slot(id).pic_order_cnt)
                    .collect()
            })
            .collect()
    }
}

/// 解码引擎
pub trait DecodeEngine {
    fn name(&self) -> &str;

    /// 同步解码一帧, 成功时返回消耗的字节数
    fn decode(&mut self, job: &DecodeJob<'_>) -> Result<usize, EngineError>;
}

/// 软件引擎解码记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRecord {
    pub frame_index: u32,
    pub slice_type: SliceType,
    pub frame_num: u32,
    pub pic_order_cnt: i32,
    pub level_index: u32,
    pub list_pocs: Vec<Vec<i32>>,
}

/// 软件引擎: 不重建图像, 只校验交给引擎的状态并记录
#[derive(Debug, Default)]
pub struct SoftwareEngine {
    records: Vec<EngineRecord>,
}

impl SoftwareEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[EngineRecord] {
        &self.records
    }

    fn validate(job: &DecodeJob<'_>) -> Result<(), EngineError> {
        let current = job.dpb.current();
        if current.empty {
            return Err(EngineError::Failed("当前帧槽为空".into()));
        }
        let max = job.sps.max_num_ref_frames as usize;
        if job.dpb.size() > max {
            return Err(EngineError::Failed(format!(
                "DPB 参考帧数量超出上限, size={}, max_num_ref_frames={}",
                job.dpb.size(),
                max
            )));
        }

        let declared = [
            job.header.num_ref_idx_l0_active,
            job.header.num_ref_idx_l1_active,
        ];
        for (list, declared) in job.active_lists().into_iter().zip(declared) {
            if list.len() != declared as usize {
                return Err(EngineError::Failed(format!(
                    "{} 长度 {} 与活动参考数 {} 不一致",
                    list.kind(),
                    list.len(),
                    declared
                )));
            }
            if let Some(&id) = list.entries().iter().find(|&&id| job.dpb.slot(id).empty) {
                return Err(EngineError::Failed(format!(
                    "{} 引用了空帧槽 {}",
                    list.kind(),
                    id.index()
                )));
            }
        }
        Ok(())
    }
}

impl DecodeEngine for SoftwareEngine {
    fn name(&self) -> &str {
        "software"
    }

    fn decode(&mut self, job: &DecodeJob<'_>) -> Result<usize, EngineError> {
        Self::validate(job)?;
        let current = job.dpb.current();
        self.records.push(EngineRecord {
            frame_index: job.frame_index,
            slice_type: job.header.slice_type,
            frame_num: current.frame_num,
            pic_order_cnt: current.pic_order_cnt,
            level_index: job.sps.level_index(),
            list_pocs: job.list_pocs(),
        });
        Ok(job.nal.data.len())
    }
}
