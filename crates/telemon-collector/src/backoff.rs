use rand::Rng;
use std::time::Duration;

/// 指数退避，带 [0, min) 的均匀抖动
///
/// 连接成功后调用 reset() 归零。
#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            attempt: 0,
        }
    }

    /// 下一次等待时长：min, 2*min, 4*min ... 封顶 max
    pub fn next(&mut self) -> Duration {
        let shift = self.attempt.min(32);
        self.attempt = self.attempt.saturating_add(1);
        let base_ms = (self.min.as_millis() as u64).saturating_mul(1u64 << shift);
        let capped = Duration::from_millis(base_ms).min(self.max);
        capped + self.jitter()
    }

    /// 认证失败时直接跳到最大退避
    pub fn saturated(&mut self) -> Duration {
        self.attempt = 32;
        self.max + self.jitter()
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn max_delay(&self) -> Duration {
        self.max
    }

    fn jitter(&self) -> Duration {
        let span = self.min.as_millis() as u64;
        if span == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..span))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(120))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut backoff = Backoff::new(Duration::from_secs(2), Duration::from_secs(120));

        let first = backoff.next();
        assert!(first >= Duration::from_secs(2));
        assert!(first < Duration::from_secs(4));

        let second = backoff.next();
        assert!(second >= Duration::from_secs(4));
        assert!(second < Duration::from_secs(6));

        for _ in 0..20 {
            backoff.next();
        }
        let capped = backoff.next();
        assert!(capped >= Duration::from_secs(120));
        assert!(capped < Duration::from_secs(122));
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::new(Duration::from_secs(2), Duration::from_secs(120));
        for _ in 0..5 {
            backoff.next();
        }
        backoff.reset();
        let delay = backoff.next();
        assert!(delay < Duration::from_secs(4));
    }

    #[test]
    fn test_saturated_hits_max() {
        let mut backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(120));
        let delay = backoff.saturated();
        assert!(delay >= Duration::from_secs(120));
        assert!(delay < Duration::from_secs(125));
    }
}
