//! ループ周波数トラッカー
//!
//! 実測dtから周波数を1Hzのローパスで追跡し、フィルタ設定時の周波数から
//! 3%以上ずれた場合に再設定を要求します。再設定は1秒に1回まで、かつ
//! 走行中（または初回）のみ行います。

use embassy_time::{Duration, Instant};

use crate::filters::Ema;
use libm::fabsf;

/// 周波数ローパスのカットオフ [Hz]
const FREQUENCY_CUTOFF: f32 = 1.0;

/// 再設定の最小間隔（エンゲージ直後の安定待ちも兼ねる）
const SETTLE_TIME: Duration = Duration::from_secs(1);

/// 再設定を行う相対誤差
const DRIFT_THRESHOLD: f32 = 0.03;

#[derive(Debug, Clone)]
pub struct FrequencyTracker {
    /// 直近のdt [ms]
    pub dt_ms: f32,
    frequency: Ema,
    /// フィルタが現在設定されている周波数 [Hz]
    filter_frequency: f32,
    last_update: Instant,
    first: bool,
    running: bool,
    /// 再設定回数
    pub recalculations: u32,
}

impl FrequencyTracker {
    /// # 引数
    /// * `frequency` - 公称ループ周波数 [Hz]
    /// * `now` - 現在時刻
    pub fn new(frequency: f32, now: Instant) -> Self {
        let mut ema = Ema::new();
        ema.configure(FREQUENCY_CUTOFF, frequency);
        ema.reset(frequency);
        Self {
            dt_ms: 0.0,
            frequency: ema,
            filter_frequency: frequency,
            last_update: now,
            first: true,
            running: false,
            recalculations: 0,
        }
    }

    /// 毎ティックのdtを反映
    pub fn update(&mut self, dt: f32) {
        if !(dt > 0.0) || !dt.is_finite() {
            return;
        }
        self.dt_ms = dt * 1000.0;
        self.frequency.update(1.0 / dt);
    }

    /// 再設定が必要か確認し、必要ならコールバックを呼ぶ
    ///
    /// # 引数
    /// * `running` - 走行中か
    /// * `now` - 現在時刻
    /// * `reconfigure` - 新しい周波数を受け取るコールバック
    pub fn check<F: FnMut(f32)>(&mut self, running: bool, now: Instant, mut reconfigure: F) {
        if !self.running && running {
            // エンゲージ直後は周波数が落ち着くまで待つ
            self.last_update = now;
        }
        self.running = running;

        let frequency = self.frequency.value;
        if (running || self.first)
            && now.saturating_duration_since(self.last_update) > SETTLE_TIME
            && fabsf(1.0 - frequency / self.filter_frequency) > DRIFT_THRESHOLD
        {
            info!(
                "Loop frequency drifted: {}Hz -> {}Hz",
                self.filter_frequency, frequency
            );
            reconfigure(frequency);
            self.filter_frequency = frequency;
            self.frequency.configure(FREQUENCY_CUTOFF, frequency);
            self.last_update = now;
            self.first = false;
            self.recalculations += 1;
        }
    }

    /// 追跡中の周波数 [Hz]
    pub fn frequency(&self) -> f32 {
        self.frequency.value
    }

    /// フィルタが設定されている周波数 [Hz]
    pub fn filter_frequency(&self) -> f32 {
        self.filter_frequency
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_ms(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn test_stable_frequency_never_recalculates() {
        let mut ft = FrequencyTracker::new(832.0, at_ms(0));
        let mut calls = 0;
        for n in 0..3000u64 {
            ft.update(1.0 / 832.0);
            ft.check(true, at_ms(n), |_| calls += 1);
        }
        assert_eq!(calls, 0);
        assert_eq!(ft.recalculations, 0);
    }

    #[test]
    fn test_first_recalculation_without_running() {
        let mut ft = FrequencyTracker::new(832.0, at_ms(0));
        let mut new_frequency = None;
        for n in 0..3000u64 {
            ft.update(1.0 / 1000.0);
            ft.check(false, at_ms(n), |f| new_frequency = Some(f));
        }
        let f = new_frequency.unwrap_or(0.0);
        assert!(f > 832.0 * 1.03);
        assert_eq!(ft.recalculations, 1);
        assert_eq!(ft.filter_frequency(), f);
    }

    #[test]
    fn test_idle_after_first_does_not_recalculate() {
        let mut ft = FrequencyTracker::new(832.0, at_ms(0));
        for n in 0..3000u64 {
            ft.update(1.0 / 1000.0);
            ft.check(false, at_ms(n), |_| {});
        }
        let recalcs = ft.recalculations;

        for n in 3000..8000u64 {
            ft.update(1.0 / 500.0);
            ft.check(false, at_ms(n), |_| {});
        }
        assert_eq!(ft.recalculations, recalcs);
    }

    #[test]
    fn test_waits_after_engage() {
        let mut ft = FrequencyTracker::new(832.0, at_ms(0));
        ft.first = false;
        for n in 0..5000u64 {
            ft.update(1.0 / 1000.0);
            ft.check(false, at_ms(n), |_| {});
        }
        assert_eq!(ft.recalculations, 0);

        ft.check(true, at_ms(5000), |_| {});
        ft.check(true, at_ms(5900), |_| {});
        assert_eq!(ft.recalculations, 0);
        ft.check(true, at_ms(6100), |_| {});
        assert_eq!(ft.recalculations, 1);
    }

    #[test]
    fn test_records_dt_and_ignores_bad_samples() {
        let mut ft = FrequencyTracker::new(832.0, at_ms(0));
        ft.update(0.002);
        assert!((ft.dt_ms - 2.0).abs() < 1e-4);
        let before = ft.frequency();
        ft.update(0.0);
        ft.update(f32::NAN);
        assert_eq!(ft.frequency(), before);
    }
}
