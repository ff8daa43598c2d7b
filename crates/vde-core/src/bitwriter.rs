//! 比特流写入器.
//!
//! 与 [`BitReader`](crate::bitreader::BitReader) 对应, 按大端位序写入
//! 定长字段与 Exp-Golomb 字段. 主要用于构造语法测试数据.

/// 比特流写入器
///
/// # 示例
/// ```
/// use vde_core::bitwriter::BitWriter;
///
/// let mut bw = BitWriter::new();
/// bw.write_ue(0);
/// bw.write_ue(1);
/// bw.write_bits(0b1011, 4);
/// assert_eq!(bw.bits_written(), 8);
/// assert_eq!(bw.finish(), vec![0b1010_1011]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    data: Vec<u8>,
    /// 已写入的总位数
    bit_len: usize,
}

impl BitWriter {
    /// 创建空写入器
    pub fn new() -> Self {
        Self::default()
    }

    /// 已写入的总位数
    pub fn bits_written(&self) -> usize {
        self.bit_len
    }

    /// 写入 1 个位
    pub fn write_bit(&mut self, bit: u32) {
        if self.bit_len % 8 == 0 {
            self.data.push(0);
        }
        if bit & 1 != 0 {
            let last = self.data.len() - 1;
            self.data[last] |= 0x80 >> (self.bit_len % 8);
        }
        self.bit_len += 1;
    }

    /// 写入 1 位标志
    pub fn write_flag(&mut self, flag: bool) {
        self.write_bit(u32::from(flag));
    }

    /// 写入 `u(n)`: 值的低 n 位, 高位在前
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32, "write_bits: n={} 超过 32 位", n);
        for shift in (0..n).rev() {
            self.write_bit((value >> shift) & 1);
        }
    }

    /// 写入 `ue(v)`
    pub fn write_ue(&mut self, value: u32) {
        let code = u64::from(value) + 1;
        let len = 64 - code.leading_zeros();
        for _ in 1..len {
            self.write_bit(0);
        }
        for shift in (0..len).rev() {
            self.write_bit(((code >> shift) & 1) as u32);
        }
    }

    /// 写入 `se(v)`
    pub fn write_se(&mut self, value: i32) {
        let magnitude = i64::from(value).unsigned_abs();
        let code = if value > 0 {
            magnitude * 2 - 1
        } else {
            magnitude * 2
        };
        self.write_ue(code as u32);
    }

    /// 写入 rbsp_trailing_bits: 停止位 1 加对齐零
    pub fn write_trailing_bits(&mut self) {
        self.write_bit(1);
        while self.bit_len % 8 != 0 {
            self.write_bit(0);
        }
    }

    /// 完成写入, 返回字节数据 (未满字节以 0 填充)
    pub fn finish(self) -> Vec<u8> {
        self.data
    }
}
