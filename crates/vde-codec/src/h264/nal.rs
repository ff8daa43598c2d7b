//! H.264 NAL 单元提取.
//!
//! 输入为 Annex B 字节流, NAL 单元之间以起始码分隔:
//! - 3 字节起始码: `00 00 01`
//! - 4 字节起始码: `00 00 00 01`
//!
//! [`AnnexBReader`] 维护一个字节游标. 解码引擎返回已消耗的字节数后,
//! 解码循环通过 [`AnnexBReader::seek`] 推进游标, 再定位下一个 NAL.

use bytes::Bytes;
use vde_core::{VdeError, VdeResult};

/// NAL 单元类型 (nal_unit_type)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalUnitType {
    /// 非 IDR 图像的 slice
    NonIdrSlice,
    /// 数据分区 A/B/C
    DataPartition(u8),
    /// IDR 图像的 slice
    IdrSlice,
    /// 增补增强信息
    Sei,
    /// 序列参数集
    Sps,
    /// 图像参数集
    Pps,
    /// 访问单元分隔符
    AccessUnitDelimiter,
    /// 序列结束 / 流结束
    EndOfSequence,
    EndOfStream,
    /// 填充数据
    Filler,
    /// 其它类型, 解码循环忽略
    Other(u8),
}

impl From<u8> for NalUnitType {
    fn from(id: u8) -> Self {
        match id {
            1 => Self::NonIdrSlice,
            2..=4 => Self::DataPartition(id),
            5 => Self::IdrSlice,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::AccessUnitDelimiter,
            10 => Self::EndOfSequence,
            11 => Self::EndOfStream,
            12 => Self::Filler,
            _ => Self::Other(id),
        }
    }
}

impl NalUnitType {
    /// nal_unit_type 编号
    pub fn id(self) -> u8 {
        match self {
            Self::NonIdrSlice => 1,
            Self::DataPartition(id) => id,
            Self::IdrSlice => 5,
            Self::Sei => 6,
            Self::Sps => 7,
            Self::Pps => 8,
            Self::AccessUnitDelimiter => 9,
            Self::EndOfSequence => 10,
            Self::EndOfStream => 11,
            Self::Filler => 12,
            Self::Other(id) => id,
        }
    }

    /// 是否为本解码器处理的 slice (类型 1 或 5)
    pub fn is_slice(self) -> bool {
        matches!(self, Self::NonIdrSlice | Self::IdrSlice)
    }

    /// 是否为 IDR slice
    pub fn is_idr(self) -> bool {
        matches!(self, Self::IdrSlice)
    }
}

impl std::fmt::Display for NalUnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonIdrSlice => write!(f, "Slice"),
            Self::DataPartition(id) => write!(f, "DataPartition({id})"),
            Self::IdrSlice => write!(f, "IDR"),
            Self::Sei => write!(f, "SEI"),
            Self::Sps => write!(f, "SPS"),
            Self::Pps => write!(f, "PPS"),
            Self::AccessUnitDelimiter => write!(f, "AUD"),
            Self::EndOfSequence => write!(f, "EndOfSeq"),
            Self::EndOfStream => write!(f, "EndOfStream"),
            Self::Filler => write!(f, "Filler"),
            Self::Other(id) => write!(f, "Other({id})"),
        }
    }
}

/// NAL 单元
#[derive(Debug, Clone)]
pub struct NalUnit {
    /// nal_unit_type
    pub nal_type: NalUnitType,
    /// nal_ref_idc (0-3), 非零表示参考图像
    pub ref_idc: u8,
    /// 原始数据 (不含起始码, 含 1 字节头部)
    pub data: Bytes,
}

impl NalUnit {
    /// 解析 NAL 头部
    pub fn parse(data: Bytes) -> VdeResult<Self> {
        let Some(&header) = data.first() else {
            return Err(VdeError::InvalidData("H264: NAL 单元为空".into()));
        };
        if header & 0x80 != 0 {
            return Err(VdeError::InvalidData(format!(
                "H264: forbidden_zero_bit 非法, header=0x{:02X}",
                header
            )));
        }
        Ok(Self {
            nal_type: NalUnitType::from(header & 0x1F),
            ref_idc: (header >> 5) & 0x03,
            data,
        })
    }

    /// 是否为参考图像
    pub fn is_reference(&self) -> bool {
        self.ref_idc != 0
    }

    /// 去掉头部字节与防竞争字节后的 RBSP, 数据为空时返回空
    pub fn rbsp(&self) -> Vec<u8> {
        remove_emulation_prevention(self.data.get(1..).unwrap_or_default())
    }
}

/// 从字节流中定位到的 NAL 单元
#[derive(Debug, Clone)]
pub struct AnnexBNal {
    /// NAL 头部字节在流中的偏移
    pub offset: usize,
    pub unit: NalUnit,
}

/// Annex B 字节流读取器
#[derive(Debug, Clone)]
pub struct AnnexBReader {
    data: Bytes,
    pos: usize,
}

impl AnnexBReader {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }

    /// 当前游标 (字节偏移)
    pub fn position(&self) -> usize {
        self.pos
    }

    /// 流总长度
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 移动游标, 超出流末尾时停在末尾
    pub fn seek(&mut self, offset: usize) {
        self.pos = offset.min(self.data.len());
    }

    /// 从游标处定位下一个 NAL 单元, 游标移到该 NAL 末尾
    ///
    /// 流中再无起始码时返回 `Ok(None)`.
    pub fn next_nal(&mut self) -> VdeResult<Option<AnnexBNal>> {
        loop {
            let Some((_, start)) = find_start_code(&self.data, self.pos) else {
                self.pos = self.data.len();
                return Ok(None);
            };
            let end = find_start_code(&self.data, start)
                .map_or(self.data.len(), |(code_pos, _)| code_pos);
            self.pos = end;

            let mut trimmed = end;
            while trimmed > start && self.data[trimmed - 1] == 0x00 {
                trimmed -= 1;
            }
            // 连续起始码之间没有数据
            if trimmed == start {
                continue;
            }

            let unit = NalUnit::parse(self.data.slice(start..trimmed))?;
            return Ok(Some(AnnexBNal {
                offset: start,
                unit,
            }));
        }
    }
}

/// 一次性切分 Annex B 字节流, 跳过无法解析的 NAL
pub fn split_annex_b(data: impl Into<Bytes>) -> Vec<NalUnit> {
    let mut reader = AnnexBReader::new(data);
    let mut units = Vec::new();
    loop {
        match reader.next_nal() {
            Ok(Some(nal)) => units.push(nal.unit),
            Ok(None) => break,
            Err(err) => log::warn!("H264: 跳过非法 NAL, pos={}, err={}", reader.position(), err),
        }
    }
    units
}

/// 查找 `from` 之后的第一个起始码, 返回 (起始码位置, 负载起始位置)
///
/// 4 字节起始码的首个零字节计入起始码.
fn find_start_code(data: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i + 2 < data.len() {
        if data[i] == 0x00 && data[i + 1] == 0x00 && data[i + 2] == 0x01 {
            let code_pos = if i > from && data[i - 1] == 0x00 {
                i - 1
            } else {
                i
            };
            return Some((code_pos, i + 3));
        }
        i += 1;
    }
    None
}

/// 移除防竞争字节: `00 00 03` → `00 00`
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut rbsp = Vec::with_capacity(data.len());
    let mut zeros = 0usize;
    for &byte in data {
        if zeros >= 2 && byte == 0x03 {
            zeros = 0;
            continue;
        }
        zeros = if byte == 0x00 { zeros + 1 } else { 0 };
        rbsp.push(byte);
    }
    rbsp
}
