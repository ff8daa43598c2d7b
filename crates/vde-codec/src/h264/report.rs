//! 帧列表调试输出.
//!
//! 只读取 DPB, 不修改任何状态.

use super::dpb::{Dpb, SlotId};

/// 分隔线, 出现在 `delim` 下标之前
pub const DELIMITER: &str = "----------------------";

/// 格式化一个帧列表, 每个帧槽一行
///
/// `delim` 通常是 DPB 中 `max_num_ref_frames + 1` 或列表的活动参考数,
/// 用于区分有效部分与其后的内容.
pub fn format_frames_list(dpb: &Dpb, ids: &[SlotId], delim: Option<usize>) -> Vec<String> {
    let mut lines = Vec::with_capacity(ids.len() + 1);
    for (idx, &id) in ids.iter().enumerate() {
        if delim == Some(idx) {
            lines.push(DELIMITER.to_string());
        }
        let frame = dpb.slot(id);
        if frame.empty {
            lines.push(format!("frame[{}]: empty", idx));
            continue;
        }
        lines.push(format!(
            "frame[{}]: paddr = 0x{:08X} frame_num = {} frame_dec_num = {} is_B_frame = {} frame_num_wrap = {} pic_order_cnt = {}",
            idx,
            frame.buffers.luma,
            frame.frame_num,
            frame.frame_dec_num,
            u8::from(frame.is_b_frame),
            u8::from(frame.frame_num_wrap),
            frame.pic_order_cnt
        ));
    }
    lines
}

/// 按给定日志级别输出帧列表
pub fn log_frames_list(
    level: log::Level,
    title: &str,
    dpb: &Dpb,
    ids: &[SlotId],
    delim: Option<usize>,
) {
    if !log::log_enabled!(level) {
        return;
    }
    log::log!(level, "{}:", title);
    for line in format_frames_list(dpb, ids, delim) {
        log::log!(level, "{}", line);
    }
}
