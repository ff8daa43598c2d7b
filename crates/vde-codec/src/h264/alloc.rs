//! 帧缓冲地址分配.
//!
//! 只分配地址, 不映射内存. 每个序列第一次解码时为全部帧槽分配一次.

use vde_core::{VdeError, VdeResult};

use super::dpb::{DPB_SLOTS, FrameBuffers};
use super::sps::Sps;

/// 帧缓冲分配器
pub trait FrameAllocator {
    /// 为一帧分配亮度/色度/辅助数据缓冲
    fn allocate_frame(&mut self, sps: &Sps, with_aux: bool) -> VdeResult<FrameBuffers>;

    /// 为全部帧槽分配
    fn allocate_dpb(&mut self, sps: &Sps, with_aux: bool) -> VdeResult<Vec<FrameBuffers>> {
        (0..DPB_SLOTS)
            .map(|_| self.allocate_frame(sps, with_aux))
            .collect()
    }
}

/// 线性分配器: 从基地址起顺序预留, 从不释放
#[derive(Debug, Clone)]
pub struct LinearAllocator {
    next: u64,
    end: u64,
}

impl LinearAllocator {
    pub fn new(base: u32, size: u32) -> Self {
        Self {
            next: u64::from(base),
            end: u64::from(base) + u64::from(size),
        }
    }

    /// 下一次预留的起始地址 (未对齐)
    pub fn next_address(&self) -> u64 {
        self.next
    }

    /// 按 `align` 对齐预留 `size` 字节
    pub fn reserve(&mut self, size: u32, align: u32) -> VdeResult<u32> {
        if align == 0 || !align.is_power_of_two() {
            return Err(VdeError::InvalidArgument(format!(
                "对齐值必须为 2 的幂, align={}",
                align
            )));
        }
        let align = u64::from(align);
        let start = (self.next + align - 1) & !(align - 1);
        let next = start + u64::from(size);
        if next > self.end {
            return Err(VdeError::OutOfMemory(format!(
                "帧缓冲空间不足, 需要 0x{:X} 字节, 剩余 0x{:X}",
                size,
                self.end.saturating_sub(start)
            )));
        }
        self.next = next;
        Ok(start as u32)
    }
}

impl FrameAllocator for LinearAllocator {
    fn allocate_frame(&mut self, sps: &Sps, with_aux: bool) -> VdeResult<FrameBuffers> {
        let total_mbs = sps.total_mbs();
        let luma_size = total_mbs.checked_mul(256).ok_or_else(|| {
            VdeError::InvalidData(format!("H264: 图像过大, total_mbs={}", total_mbs))
        })?;
        let chroma_size = luma_size / 4;
        Ok(FrameBuffers {
            luma: self.reserve(luma_size, 0x100)?,
            chroma_u: self.reserve(chroma_size, 0x100)?,
            chroma_v: self.reserve(chroma_size, 0x100)?,
            aux: if with_aux {
                Some(self.reserve(total_mbs * 64, 4)?)
            } else {
                None
            },
        })
    }
}
