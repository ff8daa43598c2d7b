//! H.264 解码器配置.

use serde::{Deserialize, Serialize};

use super::ref_list::UnderfillPolicy;

/// 帧缓冲默认基地址
pub const DEFAULT_BASE_ADDRESS: u32 = 0x2F60_0000;
/// 帧缓冲默认可用空间
pub const DEFAULT_MEMORY_SIZE: u32 = 0x0800_0000;

/// 宏块辅助数据缓冲策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuxBufferPolicy {
    /// Baseline profile 不分配, 其它 profile 分配
    #[default]
    Auto,
    Always,
    Never,
}

impl AuxBufferPolicy {
    /// 给定 profile 是否需要辅助数据缓冲
    pub fn wants_aux(self, baseline: bool) -> bool {
        match self {
            Self::Auto => !baseline,
            Self::Always => true,
            Self::Never => false,
        }
    }
}

/// 解码器配置, 可从 JSON 读取, 缺省字段使用默认值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// 参考列表长度不足时的处理方式
    pub ref_list_underfill: UnderfillPolicy,
    /// 每个 slice 头解析后输出 DPB 内容
    pub dump_dpb: bool,
    pub aux_buffers: AuxBufferPolicy,
    /// 帧缓冲分配起始地址
    pub base_address: u32,
    /// 帧缓冲可用空间 (字节)
    pub memory_size: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            ref_list_underfill: UnderfillPolicy::Reject,
            dump_dpb: false,
            aux_buffers: AuxBufferPolicy::Auto,
            base_address: DEFAULT_BASE_ADDRESS,
            memory_size: DEFAULT_MEMORY_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_partial_json_uses_defaults() {
        let cfg: DecoderConfig =
            serde_json::from_str(r#"{"ref_list_underfill": "repeat-last", "dump_dpb": true}"#)
                .unwrap();
        assert_eq!(cfg.ref_list_underfill, UnderfillPolicy::RepeatLast);
        assert!(cfg.dump_dpb);
        assert_eq!(cfg.aux_buffers, AuxBufferPolicy::Auto);
        assert_eq!(cfg.base_address, DEFAULT_BASE_ADDRESS);
    }

    #[test]
    fn test_config_rejects_unknown_policy() {
        let result: Result<DecoderConfig, _> =
            serde_json::from_str(r#"{"ref_list_underfill": "ignore"}"#);
        assert!(result.is_err(), "未知的 underfill 策略应解析失败");
    }

    #[test]
    fn test_aux_policy() {
        assert!(!AuxBufferPolicy::Auto.wants_aux(true));
        assert!(AuxBufferPolicy::Auto.wants_aux(false));
        assert!(AuxBufferPolicy::Always.wants_aux(true));
        assert!(!AuxBufferPolicy::Never.wants_aux(false));
    }
}
