//! Compliance score calculation.

use serde::{Deserialize, Serialize};

use super::types::SeverityCounts;

/// Baseline assumed for the realistic model before deductions.
const REALISTIC_BASELINE: f64 = 82.0;
/// Lowest score the realistic model reports.
const REALISTIC_FLOOR: f64 = 35.0;
/// Highest score the realistic model reports.
const REALISTIC_CEILING: f64 = 92.0;

/// Formula used to turn severity counts into a 0-100 score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringModel {
    /// Baseline 82, deductions 5/3/1.5/0.5, clamped to 35..=92.
    ///
    /// HIPAA has hundreds of controls and a scan only sees a subset, so the
    /// score never reaches the extremes.
    #[default]
    Realistic,
    /// 100 minus 20/10/5/2 per critical/high/medium/low, floored at zero.
    Weighted,
}

impl ScoringModel {
    /// Compute the compliance score for the given counts.
    #[must_use]
    pub fn score(self, counts: &SeverityCounts) -> f64 {
        let c = f64::from(counts.critical);
        let h = f64::from(counts.high);
        let m = f64::from(counts.medium);
        let l = f64::from(counts.low);

        match self {
            Self::Weighted => (100.0 - (c * 20.0 + h * 10.0 + m * 5.0 + l * 2.0)).max(0.0),
            Self::Realistic => {
                let deduction = c * 5.0 + h * 3.0 + m * 1.5 + l * 0.5;
                (REALISTIC_BASELINE - deduction)
                    .clamp(REALISTIC_FLOOR, REALISTIC_CEILING)
                    .trunc()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(critical: u32, high: u32, medium: u32, low: u32) -> SeverityCounts {
        SeverityCounts {
            critical,
            high,
            medium,
            low,
        }
    }

    #[test]
    fn test_weighted_score() {
        assert!((ScoringModel::Weighted.score(&counts(0, 0, 0, 0)) - 100.0).abs() < f64::EPSILON);
        assert!((ScoringModel::Weighted.score(&counts(1, 2, 1, 1)) - 53.0).abs() < f64::EPSILON);
        assert!(ScoringModel::Weighted.score(&counts(10, 0, 0, 0)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_realistic_score_matches_reference_scan() {
        // Three critical, three high and one medium: 82 - (15 + 9 + 1.5) = 56.5.
        let score = ScoringModel::Realistic.score(&counts(3, 3, 1, 0));
        assert!((score - 56.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_realistic_score_bounds() {
        assert!((ScoringModel::Realistic.score(&counts(0, 0, 0, 0)) - 82.0).abs() < f64::EPSILON);
        assert!((ScoringModel::Realistic.score(&counts(20, 0, 0, 0)) - 35.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_scoring_model_deserialize() {
        let model: ScoringModel = serde_json::from_str("\"weighted\"").unwrap();
        assert_eq!(model, ScoringModel::Weighted);
        assert_eq!(ScoringModel::default(), ScoringModel::Realistic);
    }
}
