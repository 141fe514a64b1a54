use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::iou_tracker::{Detection, IouTracker};

/// One `IouTracker` per logical video stream.
///
/// Updates for the same stream are serialized by the map lock, so two
/// requests never interleave inside one tracker update. Streams are
/// created lazily on first use and dropped once they go `idle_ttl` without
/// a frame; a dropped stream starts over with fresh ids.
pub struct StreamTrackers {
    trackers: Mutex<HashMap<String, StreamState>>,
    iou_keep: f64,
    miss_ttl: u32,
    idle_ttl: Duration,
}

struct StreamState {
    tracker: IouTracker,
    last_frame: Instant,
}

impl StreamTrackers {
    pub fn new(iou_keep: f64, miss_ttl: u32, idle_ttl: Duration) -> Self {
        Self {
            trackers: Mutex::new(HashMap::new()),
            iou_keep,
            miss_ttl,
            idle_ttl,
        }
    }

    /// Advances `stream`'s tracker by one frame and returns the track id of
    /// each detection in input order. Other streams idle at `now` are
    /// evicted.
    pub fn update(&self, stream: &str, detections: &[Detection], now: Instant) -> Vec<u64> {
        let mut trackers = self.trackers.lock().unwrap_or_else(|e| e.into_inner());
        let before = trackers.len();
        trackers.retain(|name, state| {
            name == stream || now.saturating_duration_since(state.last_frame) < self.idle_ttl
        });
        if trackers.len() < before {
            log::debug!("Evicted {} idle stream trackers", before - trackers.len());
        }

        let state = trackers
            .entry(stream.to_string())
            .or_insert_with(|| StreamState {
                tracker: IouTracker::new(self.iou_keep, self.miss_ttl),
                last_frame: now,
            });
        state.last_frame = now;
        state.tracker.update(detections, now)
    }

    /// Live tracks in `stream`, zero for an unknown stream.
    pub fn live_tracks(&self, stream: &str) -> usize {
        self.trackers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(stream)
            .map_or(0, |state| state.tracker.len())
    }

    pub fn stream_count(&self) -> usize {
        self.trackers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::bbox::BBox;
    use std::sync::Arc;
    use std::thread;

    const IDLE: Duration = Duration::from_secs(300);

    fn det(x: i32) -> Detection {
        Detection {
            bbox: BBox::new(x, 0, 50, 50),
            label: "Unknown".into(),
            confidence: 0.0,
        }
    }

    #[test]
    fn test_streams_have_independent_id_sequences() {
        let trackers = StreamTrackers::new(0.3, 6, IDLE);
        assert_eq!(trackers.update("cam1", &[det(0)], Instant::now()), vec![1]);
        assert_eq!(trackers.update("cam2", &[det(300)], Instant::now()), vec![1]);
        assert_eq!(trackers.stream_count(), 2);
    }

    #[test]
    fn test_detection_in_other_stream_does_not_refresh_track() {
        let trackers = StreamTrackers::new(0.3, 0, IDLE);
        trackers.update("cam1", &[det(0)], Instant::now());
        trackers.update("cam2", &[det(0)], Instant::now());
        // cam1 sees nothing: its track expires even though cam2 saw the same box.
        trackers.update("cam1", &[], Instant::now());
        assert_eq!(trackers.live_tracks("cam1"), 0);
        assert_eq!(trackers.live_tracks("cam2"), 1);
    }

    #[test]
    fn test_idle_streams_are_evicted() {
        let trackers = StreamTrackers::new(0.3, 6, Duration::from_secs(10));
        let t0 = Instant::now();
        trackers.update("cam1", &[det(0)], t0);
        trackers.update("cam2", &[det(0)], t0 + Duration::from_secs(5));
        assert_eq!(trackers.stream_count(), 2);

        trackers.update("cam2", &[det(0)], t0 + Duration::from_secs(10));
        assert_eq!(trackers.stream_count(), 1);
        assert_eq!(trackers.live_tracks("cam1"), 0);
        assert_eq!(trackers.live_tracks("cam2"), 1);
    }

    #[test]
    fn test_active_stream_is_never_evicted_by_its_own_update() {
        let trackers = StreamTrackers::new(0.3, 6, Duration::from_secs(10));
        let t0 = Instant::now();
        assert_eq!(trackers.update("cam1", &[det(0)], t0), vec![1]);
        // Long gap: the stream's own frame refreshes it rather than evicting.
        let ids = trackers.update("cam1", &[det(0)], t0 + Duration::from_secs(60));
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_concurrent_updates_allocate_distinct_ids() {
        let trackers = Arc::new(StreamTrackers::new(0.3, 100, IDLE));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let trackers = trackers.clone();
                thread::spawn(move || trackers.update("shared", &[det(i * 100)], Instant::now()))
            })
            .collect();
        let mut ids: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=8).collect::<Vec<u64>>());
    }
}
