//! 比特流读取器.
//!
//! 按大端位序 (MSB first) 从 RBSP 缓冲区读取定长字段 `u(n)`,
//! 以及 H.264 语法中大量使用的 Exp-Golomb 变长字段 `ue(v)` / `se(v)`.
//!
//! 读取永远不会越过缓冲区末尾, 越界时返回 [`VdeError::Eof`].

use crate::{VdeError, VdeResult};

/// Exp-Golomb 码允许的最大前导零个数 (对应 32 位码值)
const MAX_EXP_GOLOMB_ZEROS: u32 = 31;

/// 比特流读取器
///
/// # 示例
/// ```
/// use vde_core::bitreader::BitReader;
///
/// // 1 | 010 | 011 => ue: 0, 1, 2
/// let data = [0b1010_0110];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_ue().unwrap(), 0);
/// assert_eq!(br.read_ue().unwrap(), 1);
/// assert_eq!(br.read_ue().unwrap(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    /// 已消耗的总位数
    pos: usize,
}

impl<'a> BitReader<'a> {
    /// 创建新的比特流读取器, 游标位于第一个字节的最高位
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// 已读取的总位数
    pub fn bits_read(&self) -> usize {
        self.pos
    }

    /// 剩余可读位数
    pub fn bits_left(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.pos)
    }

    /// 是否已读完
    pub fn is_eof(&self) -> bool {
        self.bits_left() == 0
    }

    /// 当前游标所在字节 (未对齐时向下取整)
    pub fn byte_position(&self) -> usize {
        self.pos / 8
    }

    /// 当前是否位于字节边界
    pub fn is_byte_aligned(&self) -> bool {
        self.pos % 8 == 0
    }

    /// 读取 1 个位
    pub fn read_bit(&mut self) -> VdeResult<u32> {
        let byte = *self.data.get(self.pos / 8).ok_or(VdeError::Eof)?;
        let bit = (byte >> (7 - (self.pos % 8))) & 1;
        self.pos += 1;
        Ok(u32::from(bit))
    }

    /// 读取 1 位标志
    pub fn read_flag(&mut self) -> VdeResult<bool> {
        Ok(self.read_bit()? == 1)
    }

    /// 读取 `u(n)`, n 最多 32 位
    pub fn read_bits(&mut self, n: u32) -> VdeResult<u32> {
        if n > 32 {
            return Err(VdeError::InvalidArgument(format!(
                "read_bits: n={} 超过 32 位",
                n
            )));
        }
        if n as usize > self.bits_left() {
            return Err(VdeError::Eof);
        }

        let mut value = 0u64;
        let mut remaining = n;
        while remaining > 0 {
            let offset = (self.pos % 8) as u32;
            let take = remaining.min(8 - offset);
            let byte = u32::from(self.data[self.pos / 8]);
            let chunk = (byte >> (8 - offset - take)) & ((1 << take) - 1);
            value = (value << take) | u64::from(chunk);
            self.pos += take as usize;
            remaining -= take;
        }
        Ok(value as u32)
    }

    /// 读取无符号 Exp-Golomb 值 `ue(v)`
    pub fn read_ue(&mut self) -> VdeResult<u32> {
        let mut zeros = 0u32;
        while self.read_bit()? == 0 {
            zeros += 1;
            if zeros > MAX_EXP_GOLOMB_ZEROS {
                return Err(VdeError::InvalidData("Exp-Golomb 前导零过多".into()));
            }
        }
        if zeros == 0 {
            return Ok(0);
        }
        let suffix = u64::from(self.read_bits(zeros)?);
        let value = (1u64 << zeros) - 1 + suffix;
        u32::try_from(value)
            .map_err(|_| VdeError::InvalidData(format!("Exp-Golomb 值溢出, value={}", value)))
    }

    /// 读取有符号 Exp-Golomb 值 `se(v)`
    ///
    /// 映射: 0→0, 1→1, 2→-1, 3→2, 4→-2 ...
    pub fn read_se(&mut self) -> VdeResult<i32> {
        let code = i64::from(self.read_ue()?);
        let magnitude = (code + 1) / 2;
        let value = if code & 1 == 0 { -magnitude } else { magnitude };
        i32::try_from(value)
            .map_err(|_| VdeError::InvalidData(format!("Exp-Golomb 有符号值溢出, value={}", value)))
    }

    /// 窥视 N 个位, 不移动游标
    pub fn peek_bits(&self, n: u32) -> VdeResult<u32> {
        self.clone().read_bits(n)
    }

    /// 跳过 N 个位
    pub fn skip_bits(&mut self, n: usize) -> VdeResult<()> {
        if n > self.bits_left() {
            return Err(VdeError::Eof);
        }
        self.pos += n;
        Ok(())
    }

    /// 判断 RBSP 是否仍有语法数据 (排除 rbsp_trailing_bits 与尾部填充零)
    pub fn more_rbsp_data(&self) -> bool {
        let Some(last) = self.data.iter().rposition(|&b| b != 0) else {
            return false;
        };
        // 停止位: 最后一个非零字节中最低的置位位
        let stop_bit_pos = last * 8 + 7 - self.data[last].trailing_zeros() as usize;
        self.pos < stop_bit_pos
    }
}
