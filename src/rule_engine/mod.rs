//! RuleEngine - Behavioral Heuristics
//!
//! ## Responsibilities
//!
//! - Evaluate tracker state once per processed frame against five
//!   independent heuristics
//! - Produce candidate events for the deduplicator to commit
//!
//! Perimeter breach is re-evaluated every frame; running, loitering and
//! unattended-object fire once per track lifetime via the tracker's sticky
//! flags; altercation uses a shared hysteresis counter that needs sustained
//! proximity before firing.

use crate::models::Severity;
use crate::tracker::{CentroidTracker, Point};

/// Distance from a frame edge that counts as the perimeter (px)
pub const PERIMETER_MARGIN_PX: f64 = 40.0;

/// Instantaneous speed above which a person is considered running (px/s)
pub const RUN_SPEED_PX_PER_SEC: f64 = 220.0;

/// Dwell time after which a person is loitering (s)
pub const LOITER_SECS: f64 = 12.0;

/// Centroid distance below which two people count as a close pair (px)
pub const CLOSE_DISTANCE_PX: f64 = 80.0;

/// Consecutive close-pair frames required before an altercation fires
pub const ALTERCATION_MIN_HITS: u32 = 3;

/// Dwell time after which a flagged object is unattended (s)
pub const UNATTENDED_SECS: f64 = 12.0;

/// A candidate event awaiting dedup/commit
#[derive(Debug, Clone)]
pub struct CandidateEvent {
    pub event_type: &'static str,
    pub description: String,
    pub location: &'static str,
    pub status: Severity,
    pub confidence: f32,
}

/// Frame dimensions for the perimeter heuristic
#[derive(Debug, Clone, Copy)]
pub struct FrameDims {
    pub width: f64,
    pub height: f64,
}

/// Evaluates the five heuristics over tracker state
pub struct RuleEngine {
    altercation_hits: u32,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self { altercation_hits: 0 }
    }

    /// Current hysteresis counter value (never negative)
    pub fn altercation_hits(&self) -> u32 {
        self.altercation_hits
    }

    /// Run all heuristics for one processed frame.
    ///
    /// `assigned_people` are the track ids matched this frame, `dt` the
    /// effective elapsed time between samples from the FrameSampler.
    pub fn evaluate(
        &mut self,
        people: &mut CentroidTracker,
        objects: &mut CentroidTracker,
        assigned_people: &[u64],
        dims: FrameDims,
        dt: f64,
        now: f64,
    ) -> Vec<CandidateEvent> {
        let mut candidates = Vec::new();

        // 1) Perimeter breach
        for &id in assigned_people {
            let Some(track) = people.get(id) else { continue };
            if near_edge(track.position, dims) {
                candidates.push(CandidateEvent {
                    event_type: "Perimeter Breach Attempt",
                    description: "Movement detected near boundary perimeter".to_string(),
                    location: "Zone D - Perimeter",
                    status: Severity::Warning,
                    confidence: 60.0,
                });
            }
        }

        // 2) Running
        for &id in assigned_people {
            let speed = match people.get(id) {
                Some(track) => track.step_distance() / dt,
                None => continue,
            };
            if speed > RUN_SPEED_PX_PER_SEC && people.mark_running(id) {
                tracing::debug!(track_id = id, speed_px_s = speed, "Running threshold exceeded");
                candidates.push(CandidateEvent {
                    event_type: "Running Detection",
                    description: "Individual moving at unusually high speed (possible running)"
                        .to_string(),
                    location: "Zone A - Corridor",
                    status: Severity::Suspicious,
                    confidence: 85.0,
                });
            }
        }

        // 3) Loitering
        let loiterers: Vec<u64> = people
            .tracks()
            .filter(|t| !t.loitered && t.dwell(now) >= LOITER_SECS)
            .map(|t| t.id)
            .collect();
        for id in loiterers {
            if people.mark_loitered(id) {
                candidates.push(CandidateEvent {
                    event_type: "Abnormal Behavior",
                    description: "Unusual loitering detected for extended duration".to_string(),
                    location: "Zone B - Storage",
                    status: Severity::Suspicious,
                    confidence: 80.0,
                });
            }
        }

        // 4) Altercation hysteresis
        let positions: Vec<Point> = assigned_people
            .iter()
            .filter_map(|id| people.get(*id).map(|t| t.position))
            .collect();
        if close_pair_present(&positions) {
            self.altercation_hits += 1;
        } else {
            self.altercation_hits = self.altercation_hits.saturating_sub(1);
        }
        if self.altercation_hits >= ALTERCATION_MIN_HITS {
            self.altercation_hits = 0;
            candidates.push(CandidateEvent {
                event_type: "Possible Altercation",
                description:
                    "Two or more individuals remain in close proximity (potential conflict)"
                        .to_string(),
                location: "Zone A - Main Hall",
                status: Severity::Warning,
                confidence: 72.0,
            });
        }

        // 5) Unattended object
        let unattended: Vec<(u64, String)> = objects
            .tracks()
            .filter(|t| !t.flagged && t.dwell(now) >= UNATTENDED_SECS)
            .map(|t| (t.id, t.label.clone().unwrap_or_else(|| "Object".to_string())))
            .collect();
        for (id, label) in unattended {
            if objects.mark_flagged(id) {
                candidates.push(CandidateEvent {
                    event_type: "Unattended Object",
                    description: format!("Stationary {label} detected for extended period"),
                    location: "Zone C - Entrance",
                    status: Severity::Suspicious,
                    confidence: 70.0,
                });
            }
        }

        candidates
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn near_edge(p: Point, dims: FrameDims) -> bool {
    p.x < PERIMETER_MARGIN_PX
        || p.y < PERIMETER_MARGIN_PX
        || p.x > dims.width - PERIMETER_MARGIN_PX
        || p.y > dims.height - PERIMETER_MARGIN_PX
}

fn close_pair_present(positions: &[Point]) -> bool {
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            if positions[i].distance(&positions[j]) < CLOSE_DISTANCE_PX {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Observation;

    const DIMS: FrameDims = FrameDims {
        width: 640.0,
        height: 480.0,
    };

    fn obs(x: f64, y: f64) -> Observation {
        Observation::at(Point::new(x, y))
    }

    fn step(
        engine: &mut RuleEngine,
        people: &mut CentroidTracker,
        objects: &mut CentroidTracker,
        detections: &[Observation],
        now: f64,
    ) -> Vec<CandidateEvent> {
        let assigned = people.update(detections, now);
        objects.update(&[], now);
        engine.evaluate(people, objects, &assigned, DIMS, 2.0, now)
    }

    #[test]
    fn test_perimeter_breach_fires_every_frame() {
        let mut engine = RuleEngine::new();
        let mut people = CentroidTracker::for_people();
        let mut objects = CentroidTracker::for_objects();

        for i in 0..3 {
            let events = step(
                &mut engine,
                &mut people,
                &mut objects,
                &[obs(10.0, 240.0)],
                i as f64 * 2.0,
            );
            assert_eq!(events.len(), 1, "frame {i}");
            assert_eq!(events[0].event_type, "Perimeter Breach Attempt");
        }
    }

    #[test]
    fn test_center_position_is_not_a_breach() {
        let mut engine = RuleEngine::new();
        let mut people = CentroidTracker::for_people();
        let mut objects = CentroidTracker::for_objects();

        let events = step(&mut engine, &mut people, &mut objects, &[obs(320.0, 240.0)], 0.0);
        assert!(events.is_empty());
    }

    #[test]
    fn test_running_fires_once_per_track() {
        let mut engine = RuleEngine::new();
        // wide match threshold so a fast mover stays on one track
        let mut people = CentroidTracker::new(500.0);
        let mut objects = CentroidTracker::for_objects();

        step(&mut engine, &mut people, &mut objects, &[obs(320.0, 240.0)], 0.0);

        // 200px step at dt=0.5s = 400px/s, above the 220px/s threshold
        let assigned = people.update(&[obs(520.0, 240.0)], 2.0);
        let events = engine.evaluate(&mut people, &mut objects, &assigned, DIMS, 0.5, 2.0);
        let running: Vec<_> = events
            .iter()
            .filter(|e| e.event_type == "Running Detection")
            .collect();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].confidence, 85.0);

        // same condition again: sticky flag suppresses a second event
        let assigned = people.update(&[obs(320.0, 240.0)], 4.0);
        let events = engine.evaluate(&mut people, &mut objects, &assigned, DIMS, 0.5, 4.0);
        assert!(events.iter().all(|e| e.event_type != "Running Detection"));
    }

    #[test]
    fn test_loitering_fires_after_dwell() {
        let mut engine = RuleEngine::new();
        let mut people = CentroidTracker::for_people();
        let mut objects = CentroidTracker::for_objects();

        let mut fired = 0;
        for i in 0..8 {
            let now = i as f64 * 2.0; // crosses 12s dwell at i=6
            let events = step(&mut engine, &mut people, &mut objects, &[obs(320.0, 240.0)], now);
            fired += events
                .iter()
                .filter(|e| e.event_type == "Abnormal Behavior")
                .count();
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_new_track_can_loiter_again() {
        let mut engine = RuleEngine::new();
        let mut people = CentroidTracker::for_people();
        let mut objects = CentroidTracker::for_objects();

        for i in 0..7 {
            step(&mut engine, &mut people, &mut objects, &[obs(320.0, 240.0)], i as f64 * 2.0);
        }

        // let the track go stale, then a fresh id at the same spot
        step(&mut engine, &mut people, &mut objects, &[], 30.0);
        let mut fired = 0;
        for i in 0..8 {
            let now = 32.0 + i as f64 * 2.0;
            let events = step(&mut engine, &mut people, &mut objects, &[obs(320.0, 240.0)], now);
            fired += events
                .iter()
                .filter(|e| e.event_type == "Abnormal Behavior")
                .count();
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_altercation_hysteresis() {
        let mut engine = RuleEngine::new();
        let mut people = CentroidTracker::for_people();
        let mut objects = CentroidTracker::for_objects();

        let pair = [obs(300.0, 240.0), obs(340.0, 240.0)]; // 40px apart

        let e1 = step(&mut engine, &mut people, &mut objects, &pair, 0.0);
        let e2 = step(&mut engine, &mut people, &mut objects, &pair, 2.0);
        assert!(e1.iter().chain(&e2).all(|e| e.event_type != "Possible Altercation"));
        assert_eq!(engine.altercation_hits(), 2);

        // 3rd close frame fires exactly one event and resets the counter
        let e3 = step(&mut engine, &mut people, &mut objects, &pair, 4.0);
        assert_eq!(
            e3.iter().filter(|e| e.event_type == "Possible Altercation").count(),
            1
        );
        assert_eq!(engine.altercation_hits(), 0);

        // a 4th close frame alone does not immediately refire
        let e4 = step(&mut engine, &mut people, &mut objects, &pair, 6.0);
        assert!(e4.iter().all(|e| e.event_type != "Possible Altercation"));
        assert_eq!(engine.altercation_hits(), 1);
    }

    #[test]
    fn test_altercation_counter_decays_with_floor() {
        let mut engine = RuleEngine::new();
        let mut people = CentroidTracker::for_people();
        let mut objects = CentroidTracker::for_objects();

        let apart = [obs(100.0, 240.0), obs(500.0, 240.0)];
        step(&mut engine, &mut people, &mut objects, &apart, 0.0);
        step(&mut engine, &mut people, &mut objects, &apart, 2.0);
        assert_eq!(engine.altercation_hits(), 0);
    }

    #[test]
    fn test_unattended_object_fires_once() {
        let mut engine = RuleEngine::new();
        let mut people = CentroidTracker::for_people();
        let mut objects = CentroidTracker::for_objects();

        let mut fired = Vec::new();
        for i in 0..8 {
            let now = i as f64 * 2.0;
            people.update(&[], now);
            objects.update(
                &[Observation::labeled(Point::new(200.0, 200.0), "Suitcase")],
                now,
            );
            let events = engine.evaluate(&mut people, &mut objects, &[], DIMS, 2.0, now);
            fired.extend(
                events
                    .into_iter()
                    .filter(|e| e.event_type == "Unattended Object"),
            );
        }
        assert_eq!(fired.len(), 1);
        assert!(fired[0].description.contains("Suitcase"));
        assert_eq!(fired[0].confidence, 70.0);
    }
}
