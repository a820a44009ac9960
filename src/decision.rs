//! Authentication decision mapping
//!
//! Maps a similarity score and a security level to a verdict. Similarity is
//! reported on a 0-100 scale against the level's threshold. The lockout
//! short-circuit happens upstream in the engine, before any similarity is
//! computed.

use crate::similarity::SimilarityScore;
use crate::types::{AuthDecision, SecurityLevel};

/// Decision engine applying the security-level threshold table
pub struct DecisionEngine;

impl DecisionEngine {
    /// Similarity on the 0-100 scale used by the threshold table
    pub fn score(similarity: f64) -> f64 {
        (similarity * 100.0).clamp(0.0, 100.0)
    }

    /// Map a completed comparison to an accept/reject decision
    pub fn decide(
        score: &SimilarityScore,
        confidence: f64,
        level: SecurityLevel,
    ) -> AuthDecision {
        if Self::score(score.overall) >= level.threshold() {
            AuthDecision::Accepted {
                similarity: score.overall,
                confidence,
            }
        } else {
            AuthDecision::Rejected {
                similarity: score.overall,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_score(overall: f64) -> SimilarityScore {
        SimilarityScore {
            overall,
            frequency: overall,
            time: overall,
            statistical: overall,
            variability: overall,
            temporal_multiplier: 1.0,
        }
    }

    #[test]
    fn test_accept_at_threshold() {
        let decision = DecisionEngine::decide(&make_score(0.80), 0.9, SecurityLevel::Medium);
        assert!(decision.is_accepted());
    }

    #[test]
    fn test_reject_below_threshold() {
        let decision = DecisionEngine::decide(&make_score(0.79), 0.9, SecurityLevel::Medium);
        assert_eq!(decision, AuthDecision::Rejected { similarity: 0.79 });
    }

    #[test]
    fn test_levels_gate_progressively() {
        let score = make_score(0.85);
        assert!(DecisionEngine::decide(&score, 0.9, SecurityLevel::Low).is_accepted());
        assert!(DecisionEngine::decide(&score, 0.9, SecurityLevel::Medium).is_accepted());
        assert!(!DecisionEngine::decide(&score, 0.9, SecurityLevel::High).is_accepted());
        assert!(!DecisionEngine::decide(&score, 0.9, SecurityLevel::Maximum).is_accepted());
    }

    #[test]
    fn test_score_scale() {
        assert!((DecisionEngine::score(0.85) - 85.0).abs() < 1e-9);
        assert_eq!(DecisionEngine::score(1.2), 100.0);
        assert_eq!(DecisionEngine::score(-0.1), 0.0);
    }

    #[test]
    fn test_accepted_carries_similarity_and_confidence() {
        let decision = DecisionEngine::decide(&make_score(0.95), 0.82, SecurityLevel::Maximum);
        assert_eq!(
            decision,
            AuthDecision::Accepted {
                similarity: 0.95,
                confidence: 0.82,
            }
        );
    }
}
