//! SPS/PPS 存储.
//!
//! 32 个 SPS 槽与 256 个 PPS 槽, 空槽即 "无效". 同 id 的新参数集直接覆盖旧值.

use super::pps::Pps;
use super::sps::Sps;

/// SPS 槽数量 (seq_parameter_set_id 0..=31)
pub const MAX_SPS_COUNT: usize = 32;
/// PPS 槽数量 (pic_parameter_set_id 0..=255)
pub const MAX_PPS_COUNT: usize = 256;

/// 参数集存储
#[derive(Debug, Clone)]
pub struct ParameterSets {
    sps: Vec<Option<Sps>>,
    pps: Vec<Option<Pps>>,
}

impl Default for ParameterSets {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterSets {
    pub fn new() -> Self {
        Self {
            sps: vec![None; MAX_SPS_COUNT],
            pps: vec![None; MAX_PPS_COUNT],
        }
    }

    /// 保存 SPS, 返回是否覆盖了已有的同 id SPS
    pub fn insert_sps(&mut self, sps: Sps) -> bool {
        let id = sps.sps_id as usize;
        self.sps[id].replace(sps).is_some()
    }

    /// 保存 PPS, 返回是否覆盖了已有的同 id PPS
    pub fn insert_pps(&mut self, pps: Pps) -> bool {
        let id = pps.pps_id as usize;
        self.pps[id].replace(pps).is_some()
    }

    pub fn sps(&self, id: u32) -> Option<&Sps> {
        self.sps.get(id as usize).and_then(Option::as_ref)
    }

    pub fn pps(&self, id: u32) -> Option<&Pps> {
        self.pps.get(id as usize).and_then(Option::as_ref)
    }

    /// 已保存的 SPS 数量
    pub fn sps_count(&self) -> usize {
        self.sps.iter().flatten().count()
    }

    /// 已保存的 PPS 数量
    pub fn pps_count(&self) -> usize {
        self.pps.iter().flatten().count()
    }
}
