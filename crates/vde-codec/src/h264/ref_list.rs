//! 参考图像列表.
//!
//! 列表只保存 [`SlotId`], 帧数据始终从 [`Dpb`] 读取.

use serde::{Deserialize, Serialize};

use super::dpb::{Dpb, SlotId};
use super::error::ConformanceError;

/// 列表最大长度 (num_ref_idx_active_minus1 <= 31)
pub const MAX_REF_LIST_LEN: usize = 32;

/// 三个参考列表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RefListKind {
    /// P slice 的 L0
    PList0,
    /// B slice 的 L0
    BList0,
    /// B slice 的 L1
    BList1,
}

impl std::fmt::Display for RefListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::PList0 => "P-L0",
            Self::BList0 => "B-L0",
            Self::BList1 => "B-L1",
        };
        f.write_str(name)
    }
}

/// 构造出的列表短于声明长度时的处理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnderfillPolicy {
    /// 视为码流错误
    #[default]
    Reject,
    /// 告警并重复最后一个参考帧补齐
    RepeatLast,
}

/// 参考列表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefList {
    kind: RefListKind,
    entries: Vec<SlotId>,
}

impl RefList {
    pub fn new(kind: RefListKind) -> Self {
        Self {
            kind,
            entries: Vec::with_capacity(MAX_REF_LIST_LEN),
        }
    }

    pub fn kind(&self) -> RefListKind {
        self.kind
    }

    pub fn entries(&self) -> &[SlotId] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// 用默认构造结果替换列表内容
    pub fn set(&mut self, entries: Vec<SlotId>) {
        self.entries = entries;
    }

    /// 把列表长度强制为 slice 声明的活动参考数
    pub fn force_len(
        &mut self,
        declared: usize,
        policy: UnderfillPolicy,
    ) -> Result<(), ConformanceError> {
        let achieved = self.entries.len();
        if achieved >= declared {
            self.entries.truncate(declared);
            return Ok(());
        }

        let underfill = ConformanceError::InsufficientReferences {
            list: self.kind,
            achieved,
            declared,
        };
        match (policy, self.entries.last().copied()) {
            (UnderfillPolicy::RepeatLast, Some(last)) => {
                log::warn!("H264: {}, 以最后一个参考帧补齐", underfill);
                self.entries.resize(declared, last);
                Ok(())
            }
            _ => Err(underfill),
        }
    }

    /// 短期参考帧列表修改: 把 frame_num == `pic_num` 的帧移到 `ref_idx`
    ///
    /// 列表中必须恰好有一个帧槽匹配 (补齐产生的重复项按同一帧计算).
    pub fn move_to(
        &mut self,
        dpb: &Dpb,
        pic_num: u32,
        ref_idx: usize,
    ) -> Result<(), ConformanceError> {
        if ref_idx >= self.entries.len() {
            return Err(ConformanceError::ModificationIndexOverflow {
                list: self.kind,
                ref_idx,
                len: self.entries.len(),
            });
        }

        let mut found: Option<(usize, SlotId)> = None;
        let mut matches = 0;
        for (idx, &id) in self.entries.iter().enumerate() {
            if dpb.slot(id).frame_num != pic_num {
                continue;
            }
            match found {
                None => {
                    found = Some((idx, id));
                    matches = 1;
                }
                Some((_, first)) if first != id => matches += 1,
                Some(_) => {}
            }
        }

        let Some((from, id)) = found else {
            return Err(ConformanceError::ModificationTargetMissing {
                list: self.kind,
                pic_num,
            });
        };
        if matches > 1 {
            return Err(ConformanceError::ModificationTargetAmbiguous {
                list: self.kind,
                pic_num,
                matches,
            });
        }

        self.entries.remove(from);
        self.entries.insert(ref_idx, id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Dpb, RefList) {
        let mut dpb = Dpb::new();
        for (frame_num, poc) in [(0, 2), (1, 6), (2, 10)] {
            dpb.push_reference(frame_num, poc, 4);
        }
        let mut list = RefList::new(RefListKind::PList0);
        list.set(dpb.build_p_list0(0));
        (dpb, list)
    }

    fn frame_nums(dpb: &Dpb, list: &RefList) -> Vec<u32> {
        list.entries()
            .iter()
            .map(|&id| dpb.slot(id).frame_num)
            .collect()
    }

    #[test]
    fn test_force_len_truncates() {
        let (dpb, mut list) = setup();
        list.force_len(2, UnderfillPolicy::Reject).unwrap();
        let pocs: Vec<i32> = list
            .entries()
            .iter()
            .map(|&id| dpb.slot(id).pic_order_cnt)
            .collect();
        assert_eq!(pocs, vec![10, 6]);
    }

    #[test]
    fn test_force_len_underfill_reject() {
        let (_, mut list) = setup();
        assert_eq!(
            list.force_len(5, UnderfillPolicy::Reject),
            Err(ConformanceError::InsufficientReferences {
                list: RefListKind::PList0,
                achieved: 3,
                declared: 5
            })
        );
    }

    #[test]
    fn test_force_len_underfill_repeat_last() {
        let (dpb, mut list) = setup();
        list.force_len(5, UnderfillPolicy::RepeatLast).unwrap();
        assert_eq!(frame_nums(&dpb, &list), vec![2, 1, 0, 0, 0]);
    }

    #[test]
    fn test_force_len_empty_list_always_fails() {
        let mut list = RefList::new(RefListKind::BList1);
        assert!(list.force_len(1, UnderfillPolicy::RepeatLast).is_err());
    }

    #[test]
    fn test_move_to_front() {
        let (dpb, mut list) = setup();
        list.move_to(&dpb, 0, 0).unwrap();
        assert_eq!(frame_nums(&dpb, &list), vec![0, 2, 1]);
        list.move_to(&dpb, 1, 1).unwrap();
        assert_eq!(frame_nums(&dpb, &list), vec![0, 1, 2]);
    }

    #[test]
    fn test_move_to_missing_target() {
        let (dpb, mut list) = setup();
        assert_eq!(
            list.move_to(&dpb, 7, 0),
            Err(ConformanceError::ModificationTargetMissing {
                list: RefListKind::PList0,
                pic_num: 7
            })
        );
    }

    #[test]
    fn test_move_to_ambiguous_target() {
        let mut dpb = Dpb::new();
        dpb.push_reference(4, 0, 4);
        dpb.push_reference(4, 2, 4);
        let mut list = RefList::new(RefListKind::BList0);
        list.set(dpb.build_p_list0(0));
        assert_eq!(
            list.move_to(&dpb, 4, 0),
            Err(ConformanceError::ModificationTargetAmbiguous {
                list: RefListKind::BList0,
                pic_num: 4,
                matches: 2
            })
        );
    }

    #[test]
    fn test_move_to_padded_duplicates_count_once() {
        let (dpb, mut list) = setup();
        list.force_len(4, UnderfillPolicy::RepeatLast).unwrap();
        list.move_to(&dpb, 0, 0).unwrap();
        assert_eq!(frame_nums(&dpb, &list), vec![0, 2, 1, 0]);
    }

    #[test]
    fn test_move_to_index_overflow() {
        let (dpb, mut list) = setup();
        assert_eq!(
            list.move_to(&dpb, 0, 3),
            Err(ConformanceError::ModificationIndexOverflow {
                list: RefListKind::PList0,
                ref_idx: 3,
                len: 3
            })
        );
    }
}
