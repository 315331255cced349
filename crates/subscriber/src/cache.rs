//! LatestValueCache - 每个 topic 的最新帧
//!
//! Copy-on-write map behind an `ArcSwap`: the receiver publishes a new map
//! per update, readers load the current one without taking a lock. An entry
//! is replaced whole, so a reader never sees a half-updated frame.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use contracts::{ArrayFrame, TopicKey};

/// 缓存条目
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// 最新解码帧
    pub frame: Arc<ArrayFrame>,
    /// 全局递增的写入序号
    pub sequence: u64,
    /// 写入时间
    pub received_at: Instant,
}

impl CacheEntry {
    pub fn age(&self) -> Duration {
        self.received_at.elapsed()
    }
}

type SlotMap = HashMap<TopicKey, CacheEntry>;

/// topic → 最新帧
#[derive(Debug, Default)]
pub struct LatestValueCache {
    slots: ArcSwap<SlotMap>,
    sequence: AtomicU64,
}

impl LatestValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot for `topic`, returning the entry's sequence number
    pub fn store(&self, topic: TopicKey, frame: ArrayFrame) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = CacheEntry {
            frame: Arc::new(frame),
            sequence,
            received_at: Instant::now(),
        };
        self.slots.rcu(|current| {
            let mut next = SlotMap::clone(current);
            next.insert(topic.clone(), entry.clone());
            next
        });
        sequence
    }

    pub fn get(&self, topic: &str) -> Option<CacheEntry> {
        self.slots.load().get(topic).cloned()
    }

    /// Consistent read-only view of every slot
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            slots: self.slots.load_full(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn topics(&self) -> Vec<TopicKey> {
        self.slots.load().keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.slots.store(Arc::new(SlotMap::new()));
    }
}

/// 缓存快照 (不可变)
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    slots: Arc<SlotMap>,
}

impl CacheSnapshot {
    pub fn get(&self, topic: &str) -> Option<&CacheEntry> {
        self.slots.get(topic)
    }

    /// Latest frame for `topic`
    pub fn frame(&self, topic: &str) -> Option<&ArrayFrame> {
        self.slots.get(topic).map(|entry| entry.frame.as_ref())
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.slots.contains_key(topic)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TopicKey, &CacheEntry)> {
        self.slots.iter()
    }

    /// Topics sorted by name
    pub fn topics(&self) -> Vec<TopicKey> {
        let mut topics: Vec<_> = self.slots.keys().cloned().collect();
        topics.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        topics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(values: &[f32]) -> ArrayFrame {
        ArrayFrame::from_f32(vec![values.len() as u32], values).unwrap()
    }

    #[test]
    fn test_store_overwrites() {
        let cache = LatestValueCache::new();
        let first = cache.store("cam0".into(), frame(&[1.0]));
        let second = cache.store("cam0".into(), frame(&[2.0]));

        assert!(second > first);
        assert_eq!(cache.len(), 1);
        let entry = cache.get("cam0").unwrap();
        assert_eq!(entry.sequence, second);
        assert_eq!(entry.frame.to_f32_vec(), Some(vec![2.0]));
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let cache = LatestValueCache::new();
        cache.store("left".into(), frame(&[1.0]));
        let snapshot = cache.snapshot();

        cache.store("left".into(), frame(&[5.0]));
        cache.store("right".into(), frame(&[6.0]));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.frame("left").unwrap().to_f32_vec(), Some(vec![1.0]));
        assert!(!snapshot.contains("right"));
        assert_eq!(cache.snapshot().topics(), vec![TopicKey::from("left"), "right".into()]);
    }

    #[test]
    fn test_clear() {
        let cache = LatestValueCache::new();
        cache.store(TopicKey::anonymous(), frame(&[1.0]));
        assert!(!cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("").is_none());
    }

    #[test]
    fn test_concurrent_reader_sees_whole_frames() {
        let cache = Arc::new(LatestValueCache::new());
        let writer = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for i in 0..500u32 {
                    let n = (i % 7 + 1) as usize;
                    cache.store("cam0".into(), frame(&vec![i as f32; n]));
                }
            })
        };

        for _ in 0..500 {
            if let Some(entry) = cache.get("cam0") {
                let values = entry.frame.to_f32_vec().unwrap();
                assert_eq!(values.len(), entry.frame.element_count());
                assert!(values.iter().all(|v| *v == values[0]));
            }
        }
        writer.join().unwrap();
    }
}
