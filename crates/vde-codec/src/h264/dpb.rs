//! 参考帧缓冲 (Decoded Picture Buffer) 管理.
//!
//! 17 个帧槽一次性分配, 以 [`SlotId`] 寻址. DPB 顺序保存在 `order` 中:
//! - 位置 0: 当前正在解码的图像;
//! - 位置 `1..=size`: 参考帧, 越靠前越新;
//! - `size` 之后: 空槽.
//!
//! 所有重排都只是对 `order` 的置换, 帧槽本身不移动.

use serde::Serialize;

use super::error::ConformanceError;

/// 帧槽总数: 16 个参考帧 + 1 个当前图像
pub const DPB_SLOTS: usize = 17;

/// 帧槽标识 (arena 下标)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SlotId(usize);

impl SlotId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// 帧槽关联的硬件缓冲地址, 由外部分配器给出
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameBuffers {
    pub luma: u32,
    pub chroma_u: u32,
    pub chroma_v: u32,
    /// 宏块辅助数据, Baseline profile 不需要
    pub aux: Option<u32>,
}

/// 帧槽
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameSlot {
    pub id: SlotId,
    pub frame_num: u32,
    /// frame_num 回绕后仍保留的旧参考帧
    pub frame_num_wrap: bool,
    /// 解码序号
    pub frame_dec_num: u32,
    pub pic_order_cnt: i32,
    pub is_b_frame: bool,
    pub empty: bool,
    pub marked_for_removal: bool,
    pub buffers: FrameBuffers,
    /// 解码该帧时的 SPS
    pub sps_id: Option<u32>,
}

impl FrameSlot {
    fn new(id: SlotId) -> Self {
        Self {
            id,
            frame_num: 0,
            frame_num_wrap: false,
            frame_dec_num: 0,
            pic_order_cnt: 0,
            is_b_frame: false,
            empty: true,
            marked_for_removal: false,
            buffers: FrameBuffers::default(),
            sps_id: None,
        }
    }

    /// 清空帧槽, 同时清除删除/回绕标记
    fn clear(&mut self) {
        self.empty = true;
        self.marked_for_removal = false;
        self.frame_num_wrap = false;
    }
}

/// 参考帧缓冲
#[derive(Debug, Clone)]
pub struct Dpb {
    slots: Vec<FrameSlot>,
    order: Vec<SlotId>,
    size: usize,
}

impl Default for Dpb {
    fn default() -> Self {
        Self::new()
    }
}

impl Dpb {
    pub fn new() -> Self {
        let order: Vec<SlotId> = (0..DPB_SLOTS).map(SlotId).collect();
        Self {
            slots: order.iter().map(|&id| FrameSlot::new(id)).collect(),
            order,
            size: 0,
        }
    }

    /// 参考帧数量 (不含位置 0)
    pub fn size(&self) -> usize {
        self.size
    }

    /// 完整 DPB 顺序 (17 项)
    pub fn order(&self) -> &[SlotId] {
        &self.order
    }

    pub fn slot(&self, id: SlotId) -> &FrameSlot {
        &self.slots[id.0]
    }

    pub fn slot_mut(&mut self, id: SlotId) -> &mut FrameSlot {
        &mut self.slots[id.0]
    }

    /// DPB 顺序中第 `pos` 个帧槽
    pub fn slot_at(&self, pos: usize) -> &FrameSlot {
        self.slot(self.order[pos])
    }

    /// 当前图像 (位置 0)
    pub fn current(&self) -> &FrameSlot {
        self.slot_at(0)
    }

    pub fn current_mut(&mut self) -> &mut FrameSlot {
        let id = self.order[0];
        self.slot_mut(id)
    }

    /// 参考帧 (位置 `1..=size`)
    pub fn references(&self) -> &[SlotId] {
        &self.order[1..=self.size]
    }

    /// 为所有帧槽设置缓冲地址, 按 arena 下标顺序
    pub fn assign_buffers(&mut self, buffers: &[FrameBuffers]) {
        for (slot, &buf) in self.slots.iter_mut().zip(buffers) {
            slot.buffers = buf;
        }
    }

    /// 清空全部参考帧 (IDR)
    pub fn flush(&mut self) {
        for pos in 1..=self.size {
            let id = self.order[pos];
            self.slots[id.0].clear();
        }
        log::debug!("DPB: flush, 清除 {} 个参考帧", self.size);
        self.size = 0;
    }

    /// frame_num 回绕: 所有参考帧打上回绕标记
    pub fn mark_wrap(&mut self) {
        for pos in 1..=self.size {
            let id = self.order[pos];
            self.slots[id.0].frame_num_wrap = true;
        }
    }

    /// MMCO1: 把 frame_num == `pic_num` 的唯一参考帧标记为待删除
    pub fn mark_for_removal(&mut self, pic_num: u32) -> Result<SlotId, ConformanceError> {
        let matches: Vec<SlotId> = self
            .references()
            .iter()
            .copied()
            .filter(|&id| {
                let slot = self.slot(id);
                !slot.empty && slot.frame_num == pic_num
            })
            .collect();
        match matches.as_slice() {
            [] => Err(ConformanceError::MarkingTargetMissing { pic_num }),
            [id] => {
                self.slots[id.0].marked_for_removal = true;
                Ok(*id)
            }
            _ => Err(ConformanceError::MarkingTargetAmbiguous {
                pic_num,
                matches: matches.len(),
            }),
        }
    }

    /// 删除被标记的参考帧, 剩余参考帧保持相对顺序, 返回删除数量
    pub fn purge(&mut self) -> usize {
        let mut removed = 0;
        let mut pos = 1;
        while pos <= self.size {
            let id = self.order[pos];
            if !self.slots[id.0].marked_for_removal {
                pos += 1;
                continue;
            }
            let slot = &mut self.slots[id.0];
            log::debug!(
                "DPB: 删除参考帧 frame_num = {} pic_order_cnt = {}",
                slot.frame_num,
                slot.pic_order_cnt
            );
            slot.clear();
            // 空槽移到参考帧末尾
            self.order[pos..=self.size].rotate_left(1);
            self.size -= 1;
            removed += 1;
        }
        removed
    }

    /// 滑动窗口: 当前图像成为最新参考帧, 窗口末尾的帧被淘汰
    ///
    /// 只支持 pic_order_cnt_type 0 和 2. 返回被淘汰的帧槽.
    pub fn slide(
        &mut self,
        max_num_ref_frames: usize,
        poc_type: u32,
    ) -> Result<Option<SlotId>, ConformanceError> {
        if !matches!(poc_type, 0 | 2) {
            return Err(ConformanceError::UnsupportedPocType { poc_type });
        }
        let max = max_num_ref_frames.min(DPB_SLOTS - 1);

        self.order[..=max].rotate_right(1);
        let evicted_id = self.order[0];
        let evicted = &mut self.slots[evicted_id.0];
        let evicted = if evicted.empty {
            None
        } else {
            log::debug!(
                "DPB: 淘汰参考帧 frame_num = {} pic_order_cnt = {}",
                evicted.frame_num,
                evicted.pic_order_cnt
            );
            evicted.clear();
            Some(evicted_id)
        };

        if self.size < max {
            self.size += 1;
        }
        Ok(evicted)
    }

    /// P 帧默认 L0 列表
    ///
    /// POC 类型 2 直接使用 DPB 顺序; 否则按 POC 从高到低排列.
    pub fn build_p_list0(&self, poc_type: u32) -> Vec<SlotId> {
        if poc_type == 2 {
            return self
                .references()
                .iter()
                .copied()
                .filter(|&id| !self.slot(id).empty)
                .collect();
        }
        let mut list = Vec::with_capacity(self.size);
        self.extend_descending(&mut list, None);
        list
    }

    /// B 帧默认 L0 列表: 先取 POC 小于当前图像的 (降序), 再取大于的 (升序)
    pub fn build_b_list0(&self) -> Vec<SlotId> {
        let current = self.current().pic_order_cnt;
        let mut list = Vec::with_capacity(self.size);
        self.extend_descending(&mut list, Some(current));
        self.extend_ascending(&mut list, current);
        list
    }

    /// B 帧默认 L1 列表: 先取 POC 大于当前图像的 (升序), 再取小于的 (降序)
    pub fn build_b_list1(&self) -> Vec<SlotId> {
        let current = self.current().pic_order_cnt;
        let mut list = Vec::with_capacity(self.size);
        self.extend_ascending(&mut list, current);
        self.extend_descending(&mut list, Some(current));
        list
    }

    /// 反复选取 POC 严格小于上限的最大者, `ceiling` 为 None 表示无上限
    fn extend_descending(&self, list: &mut Vec<SlotId>, mut ceiling: Option<i32>) {
        while let Some(id) = self.highest_poc_below(ceiling) {
            list.push(id);
            ceiling = Some(self.slot(id).pic_order_cnt);
        }
    }

    /// 反复选取 POC 严格大于下限的最小者
    fn extend_ascending(&self, list: &mut Vec<SlotId>, mut floor: i32) {
        while let Some(id) = self.lowest_poc_above(floor) {
            list.push(id);
            floor = self.slot(id).pic_order_cnt;
        }
    }

    /// 从左到右扫描, 相同 POC 取最先出现者
    fn highest_poc_below(&self, ceiling: Option<i32>) -> Option<SlotId> {
        let mut best: Option<(SlotId, i32)> = None;
        for &id in self.references() {
            let slot = self.slot(id);
            if slot.empty || ceiling.is_some_and(|c| slot.pic_order_cnt >= c) {
                continue;
            }
            if best.is_none_or(|(_, poc)| slot.pic_order_cnt > poc) {
                best = Some((id, slot.pic_order_cnt));
            }
        }
        best.map(|(id, _)| id)
    }

    fn lowest_poc_above(&self, floor: i32) -> Option<SlotId> {
        let mut best: Option<(SlotId, i32)> = None;
        for &id in self.references() {
            let slot = self.slot(id);
            if slot.empty || slot.pic_order_cnt <= floor {
                continue;
            }
            if best.is_none_or(|(_, poc)| slot.pic_order_cnt < poc) {
                best = Some((id, slot.pic_order_cnt));
            }
        }
        best.map(|(id, _)| id)
    }

    /// 在位置 0 写入一帧后执行滑动窗口 (POC 类型 0)
    #[cfg(test)]
    pub(crate) fn push_reference(
        &mut self,
        frame_num: u32,
        pic_order_cnt: i32,
        max_num_ref_frames: usize,
    ) -> Option<SlotId> {
        let current = self.current_mut();
        current.frame_num = frame_num;
        current.pic_order_cnt = pic_order_cnt;
        current.empty = false;
        self.slide(max_num_ref_frames, 0)
            .expect("POC 类型 0 滑动窗口不应失败")
    }
}
