//! 量化矩阵 (scaling_list) 语法.
//!
//! 解码引擎只需要知道矩阵是否存在以及其原始系数, 这里不做回退规则展开:
//! 未出现的列表保存为 `None`, 由使用方按 ITU-T H.264 表 7-2 回退.

use serde::Serialize;
use vde_core::{BitReader, VdeError, VdeResult};

/// 单个量化列表
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ScalingList {
    /// useDefaultScalingMatrixFlag: 使用默认矩阵
    Default,
    /// 显式系数 (zigzag 顺序)
    Explicit(Vec<u8>),
}

/// 一组量化矩阵 (SPS 或 PPS 中的 scaling matrix)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScalingMatrix {
    /// 6 个 4x4 列表
    pub lists_4x4: Vec<Option<ScalingList>>,
    /// 8x8 列表, 数量由色度格式和 transform_8x8_mode 决定 (0, 2 或 6)
    pub lists_8x8: Vec<Option<ScalingList>>,
}

/// 解析 scaling_list(), `size` 为 16 或 64
pub fn parse_scaling_list(br: &mut BitReader, size: usize) -> VdeResult<ScalingList> {
    let mut coeffs = Vec::with_capacity(size);
    let mut last_scale = 8i32;
    let mut next_scale = 8i32;

    for j in 0..size {
        if next_scale != 0 {
            let delta_scale = br.read_se()?;
            if !(-128..=127).contains(&delta_scale) {
                return Err(VdeError::InvalidData(format!(
                    "H264: delta_scale 超出范围, value={}",
                    delta_scale
                )));
            }
            next_scale = (last_scale + delta_scale + 256) % 256;
            if j == 0 && next_scale == 0 {
                // 剩余系数不再编码
                return Ok(ScalingList::Default);
            }
        }
        let scale = if next_scale == 0 {
            last_scale
        } else {
            next_scale
        };
        coeffs.push(scale as u8);
        last_scale = scale;
    }

    Ok(ScalingList::Explicit(coeffs))
}

/// 解析 `count_4x4` 个 4x4 与 `count_8x8` 个 8x8 列表, 每个前置 present 标志
pub fn parse_scaling_matrix(
    br: &mut BitReader,
    count_4x4: usize,
    count_8x8: usize,
) -> VdeResult<ScalingMatrix> {
    let mut lists_4x4 = Vec::with_capacity(count_4x4);
    for _ in 0..count_4x4 {
        lists_4x4.push(parse_optional_list(br, 16)?);
    }
    let mut lists_8x8 = Vec::with_capacity(count_8x8);
    for _ in 0..count_8x8 {
        lists_8x8.push(parse_optional_list(br, 64)?);
    }
    Ok(ScalingMatrix {
        lists_4x4,
        lists_8x8,
    })
}

fn parse_optional_list(br: &mut BitReader, size: usize) -> VdeResult<Option<ScalingList>> {
    if br.read_flag()? {
        parse_scaling_list(br, size).map(Some)
    } else {
        Ok(None)
    }
}
