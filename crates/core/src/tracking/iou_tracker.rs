/// Greedy IoU multi-object tracker for labeled face detections.
///
/// Each incoming detection claims the not-yet-claimed live track it overlaps
/// most, provided the IoU reaches `iou_keep`; otherwise it opens a new track.
/// Tracks left unclaimed accumulate misses and expire once the count exceeds
/// `miss_ttl`. Track ids increase monotonically and are never reused.
use std::time::Instant;

use crate::shared::bbox::BBox;

/// Tracker input: one labeled face in the current frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    pub label: String,
    pub confidence: f32,
}

#[derive(Clone, Debug)]
pub struct Track {
    pub track_id: u64,
    pub bbox: BBox,
    pub miss_count: u32,
    pub label: String,
    pub confidence: f32,
    pub last_seen: Instant,
}

impl Track {
    /// Alive but not matched on the most recent frame.
    pub fn is_stale(&self) -> bool {
        self.miss_count > 0
    }
}

pub struct IouTracker {
    /// Creation order; ties between equally-overlapping tracks go to the older one.
    tracks: Vec<Track>,
    next_id: u64,
    iou_keep: f64,
    miss_ttl: u32,
}

impl IouTracker {
    pub fn new(iou_keep: f64, miss_ttl: u32) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            iou_keep,
            miss_ttl,
        }
    }

    /// Advances one frame. Returns the track id assigned to each detection,
    /// in input order. Call on every frame, including frames with no
    /// detections, so unmatched tracks age out.
    pub fn update(&mut self, detections: &[Detection], now: Instant) -> Vec<u64> {
        let num_existing = self.tracks.len();
        let mut claimed = vec![false; num_existing];
        let mut assigned = Vec::with_capacity(detections.len());

        for det in detections {
            match self.best_unclaimed(&det.bbox, &claimed) {
                Some(ti) => {
                    claimed[ti] = true;
                    self.apply_match(ti, det, now);
                    assigned.push(self.tracks[ti].track_id);
                }
                None => assigned.push(self.create_track(det, now)),
            }
        }

        self.age_unclaimed(&claimed);
        assigned
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn best_unclaimed(&self, bbox: &BBox, claimed: &[bool]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (ti, track) in self.tracks.iter().enumerate().take(claimed.len()) {
            if claimed[ti] {
                continue;
            }
            let iou = track.bbox.iou(bbox);
            if iou > best.map_or(0.0, |(_, b)| b) {
                best = Some((ti, iou));
            }
        }
        best.filter(|&(_, iou)| iou >= self.iou_keep)
            .map(|(ti, _)| ti)
    }

    fn apply_match(&mut self, ti: usize, det: &Detection, now: Instant) {
        let track = &mut self.tracks[ti];
        track.bbox = det.bbox;
        track.label = det.label.clone();
        track.confidence = det.confidence;
        track.miss_count = 0;
        track.last_seen = now;
    }

    fn create_track(&mut self, det: &Detection, now: Instant) -> u64 {
        let track_id = self.next_id;
        self.next_id += 1;
        log::debug!("New track {track_id} ({})", det.label);
        self.tracks.push(Track {
            track_id,
            bbox: det.bbox,
            miss_count: 0,
            label: det.label.clone(),
            confidence: det.confidence,
            last_seen: now,
        });
        track_id
    }

    fn age_unclaimed(&mut self, claimed: &[bool]) {
        for (track, was_claimed) in self.tracks.iter_mut().zip(claimed) {
            if !*was_claimed {
                track.miss_count += 1;
            }
        }
        let miss_ttl = self.miss_ttl;
        self.tracks.retain(|t| {
            let keep = t.miss_count <= miss_ttl;
            if !keep {
                log::debug!("Track {} expired after {} misses", t.track_id, t.miss_count);
            }
            keep
        });
    }
}
