// Breathing patterns and the phase state machine

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Inhale/hold/exhale timings repeated for a number of cycles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreathingPattern {
    pub name: String,
    pub inhale_seconds: f64,
    pub hold_seconds: f64,
    pub exhale_seconds: f64,
    pub total_cycles: u32,
}

/// Built-in preset identifiers, in display order
pub const PRESET_IDS: [&str; 3] = ["4-7-8", "4-4-6", "3-3-3"];

impl BreathingPattern {
    pub fn new(inhale_seconds: f64, hold_seconds: f64, exhale_seconds: f64, total_cycles: u32) -> Self {
        Self {
            name: "Custom".to_string(),
            inhale_seconds,
            hold_seconds,
            exhale_seconds,
            total_cycles,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Look up a built-in preset by id (`4-7-8`, `4-4-6`, `3-3-3`)
    pub fn preset(id: &str, cycles: u32) -> Option<Self> {
        let pattern = match id {
            "4-7-8" => Self::new(4.0, 7.0, 8.0, cycles).named("4-7-8 Calming"),
            "4-4-6" => Self::new(4.0, 4.0, 6.0, cycles).named("4-4-6 Balanced"),
            "3-3-3" => Self::new(3.0, 3.0, 3.0, cycles).named("3-3-3 Quick"),
            _ => return None,
        };
        Some(pattern)
    }

    pub fn presets(cycles: u32) -> Vec<Self> {
        PRESET_IDS
            .iter()
            .filter_map(|id| Self::preset(id, cycles))
            .collect()
    }

    /// Reject zero cycles and any duration that is not finite, positive and
    /// representable as a `Duration`.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.total_cycles == 0 {
            return Err(SessionError::InvalidPattern {
                reason: "total_cycles must be at least 1".to_string(),
            });
        }

        for (label, value) in [
            ("inhale", self.inhale_seconds),
            ("hold", self.hold_seconds),
            ("exhale", self.exhale_seconds),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SessionError::InvalidPattern {
                    reason: format!("{} duration must be finite and positive, got {}", label, value),
                });
            }
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(SessionError::InvalidPattern {
                    reason: format!("{} duration {} is too long", label, value),
                });
            }
        }
        Ok(())
    }

    /// Timer length for a timed phase; `None` for Ready, Complete and
    /// durations that do not fit a `Duration`.
    pub fn phase_duration(&self, phase: BreathingPhase) -> Option<Duration> {
        let seconds = match phase {
            BreathingPhase::Inhale => self.inhale_seconds,
            BreathingPhase::Hold => self.hold_seconds,
            BreathingPhase::Exhale => self.exhale_seconds,
            BreathingPhase::Ready | BreathingPhase::Complete => return None,
        };
        Duration::try_from_secs_f64(seconds).ok()
    }

    pub fn cycle_seconds(&self) -> f64 {
        self.inhale_seconds + self.hold_seconds + self.exhale_seconds
    }

    pub fn total_seconds(&self) -> f64 {
        self.cycle_seconds() * self.total_cycles as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreathingPhase {
    Ready,
    Inhale,
    Hold,
    Exhale,
    Complete,
}

impl BreathingPhase {
    /// Next phase and cycle index after this phase's timer fires.
    ///
    /// Exhale on the last cycle completes; Ready and Complete are terminal
    /// for the timer and map to themselves.
    pub fn advance(self, cycle: u32, total_cycles: u32) -> (BreathingPhase, u32) {
        match self {
            BreathingPhase::Inhale => (BreathingPhase::Hold, cycle),
            BreathingPhase::Hold => (BreathingPhase::Exhale, cycle),
            BreathingPhase::Exhale if cycle < total_cycles => (BreathingPhase::Inhale, cycle + 1),
            BreathingPhase::Exhale => (BreathingPhase::Complete, cycle),
            other => (other, cycle),
        }
    }

    pub fn guidance(&self) -> &'static str {
        match self {
            BreathingPhase::Ready => "Get comfortable and focus",
            BreathingPhase::Inhale => "Breathe in slowly...",
            BreathingPhase::Hold => "Hold your breath...",
            BreathingPhase::Exhale => "Breathe out slowly...",
            BreathingPhase::Complete => "Well done! How do you feel?",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BreathingPhase::Ready => "ready",
            BreathingPhase::Inhale => "inhale",
            BreathingPhase::Hold => "hold",
            BreathingPhase::Exhale => "exhale",
            BreathingPhase::Complete => "complete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let presets = BreathingPattern::presets(5);
        let names: Vec<_> = presets.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["4-7-8 Calming", "4-4-6 Balanced", "3-3-3 Quick"]);
        assert!(presets.iter().all(|p| p.total_cycles == 5 && p.validate().is_ok()));
        assert_eq!(BreathingPattern::preset("4-7-8", 5).unwrap().cycle_seconds(), 19.0);
        assert!(BreathingPattern::preset("5-5-5", 5).is_none());
    }

    #[test]
    fn test_validation() {
        assert!(BreathingPattern::new(4.0, 4.0, 6.0, 0).validate().is_err());
        assert!(BreathingPattern::new(0.0, 4.0, 6.0, 1).validate().is_err());
        assert!(BreathingPattern::new(4.0, -1.0, 6.0, 1).validate().is_err());
        assert!(BreathingPattern::new(4.0, 4.0, f64::NAN, 1).validate().is_err());
        assert!(BreathingPattern::new(4.0, f64::INFINITY, 6.0, 1).validate().is_err());
        assert!(BreathingPattern::new(0.5, 0.5, 0.5, 1).validate().is_ok());
    }

    #[test]
    fn test_oversized_duration_rejected() {
        let pattern = BreathingPattern::new(1e20, 1.0, 1.0, 1);
        assert!(matches!(
            pattern.validate(),
            Err(SessionError::InvalidPattern { .. })
        ));
        assert_eq!(pattern.phase_duration(BreathingPhase::Inhale), None);
    }

    #[test]
    fn test_advance_walks_cycles() {
        let mut phase = BreathingPhase::Inhale;
        let mut cycle = 1;
        let mut visited = vec![(phase, cycle)];
        while phase != BreathingPhase::Complete {
            (phase, cycle) = phase.advance(cycle, 2);
            visited.push((phase, cycle));
        }

        use BreathingPhase::*;
        assert_eq!(
            visited,
            vec![
                (Inhale, 1),
                (Hold, 1),
                (Exhale, 1),
                (Inhale, 2),
                (Hold, 2),
                (Exhale, 2),
                (Complete, 2)
            ]
        );
    }

    #[test]
    fn test_phase_durations() {
        let pattern = BreathingPattern::new(4.0, 7.0, 8.0, 1);
        assert_eq!(
            pattern.phase_duration(BreathingPhase::Hold),
            Some(Duration::from_secs(7))
        );
        assert_eq!(pattern.phase_duration(BreathingPhase::Ready), None);
        assert_eq!(pattern.phase_duration(BreathingPhase::Complete), None);
    }

    #[test]
    fn test_guidance_text() {
        assert_eq!(BreathingPhase::Inhale.guidance(), "Breathe in slowly...");
        assert_eq!(BreathingPhase::Complete.guidance(), "Well done! How do you feel?");
    }
}
