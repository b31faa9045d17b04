use std::collections::HashMap;
use std::hash::Hash;

pub struct RateLimiter<K> {
    limit: usize,
    duration: i64,
    history: HashMap<K, Vec<i64>>,
}

impl<K: Eq + Hash> RateLimiter<K> {
    pub fn new(limit: usize, duration: i64) -> Self {
        Self { limit, duration, history: HashMap::new() }
    }

    /// records a use at `time` (unix seconds), or returns the remaining cooldown
    pub fn update_rate_limit(&mut self, key: K, time: i64) -> Option<i64> {
        let history = self.history.entry(key).or_default();

        if history.len() >= self.limit {
            history.truncate(self.limit);
            if let Some(&last_time) = history.last() {
                if time - last_time < self.duration {
                    return Some(self.duration - (time - last_time));
                }
            }
        }

        history.insert(0, time);
        None
    }
}

pub struct RateLimits {
    pub rate_limit_exceeded: RateLimiter<u64>,
    pub photos: RateLimiter<u64>,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self { rate_limit_exceeded: RateLimiter::new(1, 20), photos: RateLimiter::new(3, 60) }
    }
}
