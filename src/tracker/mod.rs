//! CentroidTracker - Nearest-Centroid Multi-Object Tracking
//!
//! ## Responsibilities
//!
//! - Turn per-frame detections into persistent track identities
//! - Greedy nearest-unused match below a per-instance distance threshold
//! - Remove tracks unobserved for longer than the staleness timeout
//!
//! Two independent instances are driven per pipeline: one for people and
//! one for flagged object classes. Track maps are private to the instance;
//! the per-frame `update` and the explicit `mark_*` setters are the only
//! mutation paths.

use std::collections::HashMap;

/// Match threshold for people tracks (px)
pub const PEOPLE_MATCH_THRESHOLD_PX: f64 = 90.0;

/// Match threshold for flagged-object tracks (px)
pub const OBJECT_MATCH_THRESHOLD_PX: f64 = 80.0;

/// Seconds a track may go unobserved before removal
pub const STALE_TIMEOUT_SECS: f64 = 10.0;

/// 2D centroid position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Midpoint of a bounding box
    pub fn centroid(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new((x1 + x2) / 2.0, (y1 + y2) / 2.0)
    }
}

/// A detection observed in the current frame
#[derive(Debug, Clone)]
pub struct Observation {
    pub position: Point,
    /// Object class name; people observations carry none
    pub label: Option<String>,
}

impl Observation {
    pub fn at(position: Point) -> Self {
        Self {
            position,
            label: None,
        }
    }

    pub fn labeled(position: Point, label: impl Into<String>) -> Self {
        Self {
            position,
            label: Some(label.into()),
        }
    }
}

/// A persisted identity across frames
#[derive(Debug, Clone)]
pub struct Track {
    pub id: u64,
    pub position: Point,
    pub previous_position: Point,
    pub start_time: f64,
    pub last_seen: f64,
    /// Sticky: a running event already fired for this track
    pub running: bool,
    /// Sticky: a loitering event already fired for this track
    pub loitered: bool,
    /// Sticky: an unattended-object event already fired for this track
    pub flagged: bool,
    pub label: Option<String>,
}

impl Track {
    /// Seconds since this track was first observed
    pub fn dwell(&self, now: f64) -> f64 {
        now - self.start_time
    }

    /// Distance covered since the previous processed frame
    pub fn step_distance(&self) -> f64 {
        self.position.distance(&self.previous_position)
    }
}

/// Nearest-centroid multi-object tracker
pub struct CentroidTracker {
    tracks: HashMap<u64, Track>,
    next_id: u64,
    match_threshold: f64,
    stale_secs: f64,
}

impl CentroidTracker {
    /// Create a tracker with the given match threshold
    pub fn new(match_threshold: f64) -> Self {
        Self {
            tracks: HashMap::new(),
            next_id: 1,
            match_threshold,
            stale_secs: STALE_TIMEOUT_SECS,
        }
    }

    /// Tracker preconfigured for people detections
    pub fn for_people() -> Self {
        Self::new(PEOPLE_MATCH_THRESHOLD_PX)
    }

    /// Tracker preconfigured for flagged object classes
    pub fn for_objects() -> Self {
        Self::new(OBJECT_MATCH_THRESHOLD_PX)
    }

    /// Assign detections to tracks and sweep stale ones.
    ///
    /// Detections are matched greedily in input order to the nearest
    /// not-yet-used track below the match threshold; ties go to the first
    /// track encountered. Unmatched detections spawn new tracks with a
    /// fresh monotonically increasing id. After assignment, every track
    /// with `now - last_seen > stale_secs` is removed, visited or not.
    ///
    /// Returns the track ids assigned this frame, in detection order.
    pub fn update(&mut self, detections: &[Observation], now: f64) -> Vec<u64> {
        let mut assigned = Vec::with_capacity(detections.len());
        let mut used: Vec<u64> = Vec::new();

        for det in detections {
            let mut best: Option<(u64, f64)> = None;
            let mut ids: Vec<u64> = self.tracks.keys().copied().collect();
            ids.sort_unstable(); // deterministic iteration for tie-breaking
            for id in ids {
                if used.contains(&id) {
                    continue;
                }
                let d = det.position.distance(&self.tracks[&id].position);
                if best.map_or(true, |(_, bd)| d < bd) {
                    best = Some((id, d));
                }
            }

            let matched_id = match best {
                Some((id, d)) if d < self.match_threshold => Some(id),
                _ => None,
            };

            if let Some(id) = matched_id {
                if let Some(track) = self.tracks.get_mut(&id) {
                    track.previous_position = track.position;
                    track.position = det.position;
                    track.last_seen = now;
                }
                used.push(id);
                assigned.push(id);
            } else {
                let id = self.next_id;
                self.next_id += 1;
                self.tracks.insert(
                    id,
                    Track {
                        id,
                        position: det.position,
                        previous_position: det.position,
                        start_time: now,
                        last_seen: now,
                        running: false,
                        loitered: false,
                        flagged: false,
                        label: det.label.clone(),
                    },
                );
                used.push(id);
                assigned.push(id);
            }
        }

        let stale_secs = self.stale_secs;
        self.tracks.retain(|_, t| now - t.last_seen <= stale_secs);

        assigned
    }

    /// Look up a track by id
    pub fn get(&self, id: u64) -> Option<&Track> {
        self.tracks.get(&id)
    }

    /// Iterate all live tracks
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    /// Number of live tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Set the sticky running flag. Returns false if already set.
    pub fn mark_running(&mut self, id: u64) -> bool {
        self.mark(id, |t| &mut t.running)
    }

    /// Set the sticky loitered flag. Returns false if already set.
    pub fn mark_loitered(&mut self, id: u64) -> bool {
        self.mark(id, |t| &mut t.loitered)
    }

    /// Set the sticky unattended flag. Returns false if already set.
    pub fn mark_flagged(&mut self, id: u64) -> bool {
        self.mark(id, |t| &mut t.flagged)
    }

    fn mark(&mut self, id: u64, field: impl Fn(&mut Track) -> &mut bool) -> bool {
        match self.tracks.get_mut(&id) {
            Some(track) => {
                let flag = field(track);
                if *flag {
                    false
                } else {
                    *flag = true;
                    true
                }
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(x: f64, y: f64) -> Observation {
        Observation::at(Point::new(x, y))
    }

    #[test]
    fn test_detection_within_threshold_keeps_id() {
        let mut tracker = CentroidTracker::for_people();
        let a = tracker.update(&[obs(100.0, 100.0)], 0.0);
        let b = tracker.update(&[obs(105.0, 100.0)], 2.0);
        let c = tracker.update(&[obs(110.0, 100.0)], 4.0);
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_detection_beyond_threshold_spawns_new_id() {
        let mut tracker = CentroidTracker::for_people();
        let a = tracker.update(&[obs(100.0, 100.0)], 0.0);
        let b = tracker.update(&[obs(300.0, 100.0)], 2.0);
        assert_ne!(a[0], b[0]);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_ids_monotonic() {
        let mut tracker = CentroidTracker::for_people();
        let ids = tracker.update(&[obs(0.0, 0.0), obs(500.0, 0.0), obs(0.0, 500.0)], 0.0);
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_two_detections_do_not_share_a_track() {
        let mut tracker = CentroidTracker::for_people();
        tracker.update(&[obs(100.0, 100.0)], 0.0);
        // Both detections are within threshold of track 1; greedy order
        // gives the first one the existing id, the second a new one.
        let ids = tracker.update(&[obs(101.0, 100.0), obs(110.0, 100.0)], 2.0);
        assert_eq!(ids[0], 1);
        assert_ne!(ids[1], 1);
    }

    #[test]
    fn test_stale_track_removed_exactly_after_timeout() {
        let mut tracker = CentroidTracker::for_people();
        tracker.update(&[obs(100.0, 100.0)], 0.0);

        // 10s unobserved is still within the timeout
        tracker.update(&[], 10.0);
        assert_eq!(tracker.len(), 1);

        // beyond it the track goes, even though it was never revisited
        tracker.update(&[], 10.1);
        assert_eq!(tracker.len(), 0);
    }

    #[test]
    fn test_previous_position_advances_on_match() {
        let mut tracker = CentroidTracker::for_people();
        let ids = tracker.update(&[obs(100.0, 100.0)], 0.0);
        tracker.update(&[obs(150.0, 100.0)], 2.0);

        let track = tracker.get(ids[0]).unwrap();
        assert_eq!(track.previous_position, Point::new(100.0, 100.0));
        assert_eq!(track.position, Point::new(150.0, 100.0));
        assert!((track.step_distance() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_new_track_has_zero_step() {
        let mut tracker = CentroidTracker::for_people();
        let ids = tracker.update(&[obs(100.0, 100.0)], 0.0);
        assert_eq!(tracker.get(ids[0]).unwrap().step_distance(), 0.0);
    }

    #[test]
    fn test_mark_flags_sticky() {
        let mut tracker = CentroidTracker::for_people();
        let ids = tracker.update(&[obs(100.0, 100.0)], 0.0);

        assert!(tracker.mark_running(ids[0]));
        assert!(!tracker.mark_running(ids[0]));
        assert!(tracker.mark_loitered(ids[0]));
        assert!(!tracker.mark_loitered(ids[0]));
    }

    #[test]
    fn test_object_tracker_carries_label() {
        let mut tracker = CentroidTracker::for_objects();
        let ids = tracker.update(
            &[Observation::labeled(Point::new(50.0, 50.0), "Backpack")],
            0.0,
        );
        assert_eq!(tracker.get(ids[0]).unwrap().label.as_deref(), Some("Backpack"));
    }
}
