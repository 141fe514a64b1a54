use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

struct Entry<T> {
    at: Instant,
    payload: T,
}

type Slot<T> = Arc<Mutex<Option<Entry<T>>>>;

/// Coalesces bursts of fast-path requests per stream.
///
/// A request that arrives within `window` of the last computed response for
/// its stream gets that response back unchanged, without recomputing. The
/// stream's slot stays locked from the freshness check until the new
/// response is stored, so concurrent callers in one window recompute at
/// most once. Different streams never share or block each other's slots.
/// Slots whose payload has aged out of the window are dropped when another
/// request comes in, so idle streams don't accumulate.
pub struct ThrottleCache<T> {
    window: Duration,
    slots: Mutex<HashMap<String, Slot<T>>>,
}

impl<T: Clone> ThrottleCache<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns the cached payload for `stream` if it is younger than the
    /// window, otherwise runs `compute`, stores its result stamped `now` and
    /// returns it. The flag is `true` on a cache hit.
    pub fn get_or_compute<F>(&self, stream: &str, now: Instant, compute: F) -> (T, bool)
    where
        F: FnOnce() -> T,
    {
        let slot = self.slot(stream, now);
        let mut entry = slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = entry.as_ref() {
            if now.saturating_duration_since(cached.at) < self.window {
                log::debug!("Fast path throttled for stream {stream}");
                return (cached.payload.clone(), true);
            }
        }
        let payload = compute();
        *entry = Some(Entry {
            at: now,
            payload: payload.clone(),
        });
        (payload, false)
    }

    /// Streams currently holding a slot.
    pub fn stream_count(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn slot(&self, stream: &str, now: Instant) -> Slot<T> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.retain(|key, slot| key == stream || !self.is_stale(slot, now));
        slots.entry(stream.to_string()).or_default().clone()
    }

    /// A slot nobody else holds whose payload can no longer be served.
    /// Handles are only cloned under the map lock, so a strong count of one
    /// means no request is using it.
    fn is_stale(&self, slot: &Slot<T>, now: Instant) -> bool {
        if Arc::strong_count(slot) > 1 {
            return false;
        }
        match slot.try_lock() {
            Ok(entry) => entry
                .as_ref()
                .map_or(true, |e| now.saturating_duration_since(e.at) >= self.window),
            Err(_) => false,
        }
    }
}
