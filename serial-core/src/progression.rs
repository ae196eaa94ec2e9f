//! Pure pacing math: narrative stages, per-stage delta caps, and
//! expected progression ranges.
//!
//! Every threshold here is a tunable policy constant, not a measured
//! truth. The tables are sized so early chapters move slowly and the
//! climax permits larger swings.

use crate::state::Dimension;
use serde::{Deserialize, Serialize};

/// Narrative stage, derived from chapter position within the target
/// chapter count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Introduction,
    Rising,
    Climax,
    Resolution,
}

impl Stage {
    /// All stages in story order.
    pub const ALL: [Stage; 4] = [
        Stage::Introduction,
        Stage::Rising,
        Stage::Climax,
        Stage::Resolution,
    ];

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Introduction => "introduction",
            Stage::Rising => "rising",
            Stage::Climax => "climax",
            Stage::Resolution => "resolution",
        }
    }

    /// Maximum permitted single-chapter increase for a progression
    /// dimension in this stage.
    pub fn max_delta(&self, dimension: Dimension) -> u8 {
        match (self, dimension) {
            (Stage::Introduction, Dimension::Physical) => 8,
            (Stage::Introduction, Dimension::Emotional) => 10,
            (Stage::Introduction, Dimension::Social) => 10,
            (Stage::Introduction, Dimension::Plot) => 12,
            (Stage::Rising, Dimension::Physical) => 15,
            (Stage::Rising, Dimension::Emotional) => 18,
            (Stage::Rising, Dimension::Social) => 15,
            (Stage::Rising, Dimension::Plot) => 20,
            (Stage::Climax, Dimension::Physical) => 25,
            (Stage::Climax, Dimension::Emotional) => 30,
            (Stage::Climax, Dimension::Social) => 25,
            (Stage::Climax, Dimension::Plot) => 35,
            (Stage::Resolution, Dimension::Physical) => 15,
            (Stage::Resolution, Dimension::Emotional) => 20,
            (Stage::Resolution, Dimension::Social) => 15,
            (Stage::Resolution, Dimension::Plot) => 25,
        }
    }

    /// Ceiling a progression scalar should stay under while in this
    /// stage, regardless of chapter position.
    pub fn ceiling(&self) -> u8 {
        match self {
            Stage::Introduction => 40,
            Stage::Rising => 70,
            Stage::Climax => 95,
            Stage::Resolution => 100,
        }
    }

    /// Emotional tones appropriate to this stage.
    pub fn allowed_emotions(&self) -> &'static [&'static str] {
        match self {
            Stage::Introduction => &["curious", "guarded", "hopeful", "uneasy", "wistful"],
            Stage::Rising => &["conflicted", "longing", "tense", "warm", "wary"],
            Stage::Climax => &["anguished", "desperate", "devoted", "furious", "resolute"],
            Stage::Resolution => &["bittersweet", "content", "peaceful", "tender", "triumphant"],
        }
    }

    /// Beat keywords suggested to the generator in this stage.
    pub fn suggested_beats(&self) -> &'static [&'static str] {
        match self {
            Stage::Introduction => &[
                "chance meeting",
                "first impression",
                "quiet observation",
                "small kindness",
            ],
            Stage::Rising => &[
                "forced proximity",
                "growing trust",
                "jealous misread",
                "shared secret",
            ],
            Stage::Climax => &[
                "confession",
                "impossible choice",
                "open confrontation",
                "sacrifice",
            ],
            Stage::Resolution => &["aftermath", "new equilibrium", "quiet promise", "reunion"],
        }
    }
}

/// Slack around the ideal progression line when computing expected
/// ranges.
const RANGE_SLACK: u8 = 20;

/// Compute the stage for a chapter position.
///
/// Proportion thresholds: <=30% introduction, <=60% rising, <=80%
/// climax, else resolution.
pub fn stage_of(chapter: u32, target_chapters: u32) -> Stage {
    let target = target_chapters.max(1);
    let ratio = chapter as f32 / target as f32;
    if ratio <= 0.30 {
        Stage::Introduction
    } else if ratio <= 0.60 {
        Stage::Rising
    } else if ratio <= 0.80 {
        Stage::Climax
    } else {
        Stage::Resolution
    }
}

/// Bounds a progression scalar should lie within at the given chapter.
///
/// The ideal line is linear from 0 to 100 across the novel; the high
/// bound is additionally capped by the stage ceiling so a scalar cannot
/// legitimately max out during the introduction.
pub fn expected_range(chapter: u32, target_chapters: u32, dimension: Dimension) -> (u8, u8) {
    let _ = dimension; // all dimensions currently share one ideal line
    let target = target_chapters.max(1);
    let ideal = ((chapter.min(target) as u64 * 100) / target as u64) as u8;
    let stage = stage_of(chapter, target);
    let low = ideal.saturating_sub(RANGE_SLACK);
    let high = ideal.saturating_add(RANGE_SLACK).min(stage.ceiling());
    (low, high.max(low))
}

/// Direction a pacing correction should take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacingDirection {
    SlowDown,
    SpeedUp,
}

/// Result of comparing a current level against the expected range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingAdjustment {
    /// Whether any correction is needed.
    pub needed: bool,
    /// Which way to correct, when needed.
    pub direction: Option<PacingDirection>,
    /// Concrete suggestions for the next chapter.
    pub suggestions: Vec<String>,
}

impl PacingAdjustment {
    fn none() -> Self {
        Self {
            needed: false,
            direction: None,
            suggestions: Vec::new(),
        }
    }
}

/// Compare a current progression level against the expected range for a
/// chapter position and suggest a correction.
pub fn suggest_pacing_adjustment(
    chapter: u32,
    target_chapters: u32,
    dimension: Dimension,
    current: u8,
) -> PacingAdjustment {
    let (low, high) = expected_range(chapter, target_chapters, dimension);
    let name = dimension.name();

    if current > high {
        PacingAdjustment {
            needed: true,
            direction: Some(PacingDirection::SlowDown),
            suggestions: vec![
                format!("{name} progression is at {current}, above the expected high of {high}"),
                format!("hold {name} development steady; spend the chapter on consequences"),
                "shift focus to a secondary thread or character".to_string(),
            ],
        }
    } else if current < low {
        PacingAdjustment {
            needed: true,
            direction: Some(PacingDirection::SpeedUp),
            suggestions: vec![
                format!("{name} progression is at {current}, below the expected low of {low}"),
                format!("advance the {name} thread with a concrete, on-page development"),
                "raise stakes so the thread cannot stay static".to_string(),
            ],
        }
    } else {
        PacingAdjustment::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_thresholds() {
        // target 20: 30% = 6, 60% = 12, 80% = 16
        assert_eq!(stage_of(1, 20), Stage::Introduction);
        assert_eq!(stage_of(6, 20), Stage::Introduction);
        assert_eq!(stage_of(7, 20), Stage::Rising);
        assert_eq!(stage_of(12, 20), Stage::Rising);
        assert_eq!(stage_of(13, 20), Stage::Climax);
        assert_eq!(stage_of(16, 20), Stage::Climax);
        assert_eq!(stage_of(17, 20), Stage::Resolution);
        assert_eq!(stage_of(20, 20), Stage::Resolution);
    }

    #[test]
    fn test_stage_of_zero_target() {
        // Degenerate target never divides by zero.
        assert_eq!(stage_of(1, 0), Stage::Resolution);
    }

    #[test]
    fn test_max_delta_grows_toward_climax() {
        for dimension in Dimension::ALL {
            assert!(
                Stage::Introduction.max_delta(dimension) < Stage::Climax.max_delta(dimension),
                "{} cap should grow toward the climax",
                dimension.name()
            );
        }
        assert_eq!(Stage::Introduction.max_delta(Dimension::Emotional), 10);
    }

    #[test]
    fn test_expected_range_respects_stage_ceiling() {
        // Chapter 2 of 20 is deep introduction: high is ideal + slack.
        let (low, high) = expected_range(2, 20, Dimension::Emotional);
        assert_eq!(low, 0);
        assert_eq!(high, 30);

        // Chapter 6 of 20: ideal 30, slack would allow 50 but the
        // introduction ceiling caps at 40.
        let (_, high) = expected_range(6, 20, Dimension::Emotional);
        assert_eq!(high, 40);

        // Final chapter reaches the full scale.
        let (low, high) = expected_range(20, 20, Dimension::Plot);
        assert_eq!(low, 80);
        assert_eq!(high, 100);
    }

    #[test]
    fn test_adjustment_too_fast() {
        let adjustment = suggest_pacing_adjustment(2, 20, Dimension::Emotional, 80);
        assert!(adjustment.needed);
        assert_eq!(adjustment.direction, Some(PacingDirection::SlowDown));
        assert!(!adjustment.suggestions.is_empty());
    }

    #[test]
    fn test_adjustment_too_slow() {
        let adjustment = suggest_pacing_adjustment(15, 20, Dimension::Plot, 10);
        assert!(adjustment.needed);
        assert_eq!(adjustment.direction, Some(PacingDirection::SpeedUp));
    }

    #[test]
    fn test_adjustment_in_range() {
        let adjustment = suggest_pacing_adjustment(10, 20, Dimension::Social, 45);
        assert!(!adjustment.needed);
        assert!(adjustment.direction.is_none());
        assert!(adjustment.suggestions.is_empty());
    }
}
