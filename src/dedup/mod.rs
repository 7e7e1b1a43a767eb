//! Deduplicator - Time-Windowed Commit Suppression
//!
//! ## Responsibilities
//!
//! - Gate candidate events/alerts before they reach a log
//! - Per-label cooldown with optional global (any-label) window,
//!   confidence floor and excluded labels
//! - Per-identity cooldown for re-alert suppression
//!
//! State is a map of last-emitted timestamps keyed by label or identity,
//! bounded by the label/identity cardinality of the pipeline.

use std::collections::{HashMap, HashSet};

/// Per-label cooldown policy
#[derive(Debug, Clone)]
pub struct LabelCooldown {
    same_label_window: f64,
    global_window: Option<f64>,
    min_confidence: f32,
    excluded: HashSet<String>,
    last_by_label: HashMap<String, f64>,
    last_any: Option<f64>,
}

impl LabelCooldown {
    /// Cooldown suppressing the same label within `same_label_window` seconds
    pub fn new(same_label_window: f64) -> Self {
        Self {
            same_label_window,
            global_window: None,
            min_confidence: 0.0,
            excluded: HashSet::new(),
            last_by_label: HashMap::new(),
            last_any: None,
        }
    }

    /// Also suppress if *any* label committed within `window` seconds
    pub fn with_global_window(mut self, window: f64) -> Self {
        self.global_window = Some(window);
        self
    }

    /// Reject candidates below this confidence (percent)
    pub fn with_min_confidence(mut self, confidence: f32) -> Self {
        self.min_confidence = confidence;
        self
    }

    /// Never commit this label (reserved/benign classes)
    pub fn with_excluded_label(mut self, label: impl Into<String>) -> Self {
        self.excluded.insert(label.into());
        self
    }

    /// Decide whether a candidate may commit, recording it if allowed
    pub fn allow(&mut self, label: &str, confidence: f32, now: f64) -> bool {
        if self.excluded.contains(label) {
            return false;
        }
        if confidence < self.min_confidence {
            return false;
        }
        if let Some(window) = self.global_window {
            if let Some(last) = self.last_any {
                if now - last < window {
                    return false;
                }
            }
        }
        if let Some(&last) = self.last_by_label.get(label) {
            if now - last < self.same_label_window {
                return false;
            }
        }

        self.last_by_label.insert(label.to_string(), now);
        self.last_any = Some(now);
        true
    }
}

/// Per-identity cooldown policy
#[derive(Debug, Clone)]
pub struct IdentityCooldown {
    window: f64,
    last_by_identity: HashMap<i64, f64>,
}

impl IdentityCooldown {
    pub fn new(window: f64) -> Self {
        Self {
            window,
            last_by_identity: HashMap::new(),
        }
    }

    /// Decide whether re-alerting this identity is allowed, recording it if so
    pub fn allow(&mut self, identity: i64, now: f64) -> bool {
        if let Some(&last) = self.last_by_identity.get(&identity) {
            if now - last < self.window {
                return false;
            }
        }
        self.last_by_identity.insert(identity, now);
        true
    }
}
