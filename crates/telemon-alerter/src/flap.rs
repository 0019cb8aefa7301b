use std::collections::{HashMap, HashSet};
use std::time::Duration;
use telemon_core::EntityKey;
use tokio::time::Instant;
use tracing::{info, warn};

/// 翻动检测：窗口内触发次数达到阈值的实体被标记为 flapping，
/// 其个体告警被抑制，直到窗口内的历史降回阈值以下
///
/// 只被引擎循环这一个所有者访问，不需要内部锁。
/// 时间戳用单调时钟，测试里可以用暂停时钟驱动。
pub struct FlapDetector {
    threshold: usize,
    window: Duration,
    history: HashMap<EntityKey, Vec<Instant>>,
    flapping: HashSet<EntityKey>,
}

impl FlapDetector {
    pub fn new(threshold: usize, window: Duration) -> Self {
        Self {
            threshold,
            window,
            history: HashMap::new(),
            flapping: HashSet::new(),
        }
    }

    /// 记录一次触发，返回 (是否 flapping, 是否刚进入 flapping)
    pub fn record_change(&mut self, key: &EntityKey) -> (bool, bool) {
        let now = Instant::now();
        let cutoff = now.checked_sub(self.window);

        let timestamps = self.history.entry(key.clone()).or_default();
        if let Some(cutoff) = cutoff {
            timestamps.retain(|ts| *ts > cutoff);
        }
        timestamps.push(now);

        if timestamps.len() >= self.threshold {
            let was_flapping = self.flapping.contains(key);
            self.flapping.insert(key.clone());
            if !was_flapping {
                warn!(device = %key.device, entity = %key.entity, changes = timestamps.len(), "flapping detected");
                return (true, true);
            }
            return (true, false);
        }

        (false, false)
    }

    pub fn is_flapping(&self, key: &EntityKey) -> bool {
        self.flapping.contains(key)
    }

    /// flapping 实体是否已稳定；是则摘掉标记并返回 true
    pub fn check_stable(&mut self, key: &EntityKey) -> bool {
        if !self.flapping.contains(key) {
            return false;
        }

        let now = Instant::now();
        let cutoff = now.checked_sub(self.window);
        let recent = self
            .history
            .get(key)
            .map(|timestamps| match cutoff {
                Some(cutoff) => timestamps.iter().filter(|ts| **ts > cutoff).count(),
                None => timestamps.len(),
            })
            .unwrap_or(0);

        if recent < self.threshold {
            self.flapping.remove(key);
            info!(device = %key.device, entity = %key.entity, "flapping stopped");
            return true;
        }
        false
    }

    /// 周期性清掉窗口外的陈旧历史
    pub fn cleanup(&mut self) {
        let now = Instant::now();
        let Some(cutoff) = now.checked_sub(self.window) else {
            return;
        };

        self.history.retain(|key, timestamps| {
            timestamps.retain(|ts| *ts > cutoff);
            if timestamps.is_empty() {
                self.flapping.remove(key);
                false
            } else {
                true
            }
        });
    }
}
