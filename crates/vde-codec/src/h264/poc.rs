//! pic_order_cnt_type == 0 的 POC 推导.

/// POC 推导的跨 slice 状态 (prevPicOrderCntMsb / prevPicOrderCntLsb)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PocState {
    prev_msb: i32,
    prev_lsb: i32,
}

impl PocState {
    /// IDR 图像时重置预测值
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn prev_msb(&self) -> i32 {
        self.prev_msb
    }

    pub fn prev_lsb(&self) -> i32 {
        self.prev_lsb
    }

    /// 由 pic_order_cnt_lsb 推导 POC, 并更新预测值
    ///
    /// `max_lsb` 为 MaxPicOrderCntLsb. lsb 相对上一 slice 回绕超过半个周期时,
    /// MSB 加减一个周期.
    pub fn derive(&mut self, lsb: u32, max_lsb: u32) -> i32 {
        let lsb = lsb as i32;
        let max_lsb = max_lsb as i32;
        let half = max_lsb / 2;

        let msb = if lsb < self.prev_lsb && self.prev_lsb - lsb >= half {
            self.prev_msb + max_lsb
        } else if lsb > self.prev_lsb && lsb - self.prev_lsb > half {
            self.prev_msb - max_lsb
        } else {
            self.prev_msb
        };

        self.prev_msb = msb;
        self.prev_lsb = lsb;
        msb | lsb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poc_wraps_forward() {
        let mut poc = PocState {
            prev_msb: 0,
            prev_lsb: 14,
        };
        assert_eq!(poc.derive(2, 16), 18);
        assert_eq!(poc.prev_msb(), 16);
        assert_eq!(poc.prev_lsb(), 2);
    }

    #[test]
    fn test_poc_wraps_backward() {
        let mut poc = PocState {
            prev_msb: 16,
            prev_lsb: 2,
        };
        // 14 - 2 = 12 > 8: 视为上一周期的图像
        assert_eq!(poc.derive(14, 16), 14);
        assert_eq!(poc.prev_msb(), 0);
    }

    #[test]
    fn test_poc_half_period_boundary() {
        let mut poc = PocState {
            prev_msb: 0,
            prev_lsb: 10,
        };
        // 差值恰为一半: 向前回绕
        assert_eq!(poc.derive(2, 16), 18);

        let mut poc = PocState {
            prev_msb: 32,
            prev_lsb: 2,
        };
        // 差值恰为一半: 不向后回绕
        assert_eq!(poc.derive(10, 16), 42);
    }

    #[test]
    fn test_poc_reset() {
        let mut poc = PocState::default();
        poc.derive(6, 16);
        poc.derive(1, 16);
        assert_ne!(poc, PocState::default());
        poc.reset();
        assert_eq!(poc.derive(4, 16), 4);
    }
}
