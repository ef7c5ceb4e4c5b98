//! Route quality scores on a 0–100 scale.
//!
//! Both scores are weighted averages of linear penalties that bottom out at
//! zero, so they never increase as distance or duration grow.

use serde::{Deserialize, Serialize};

use super::RouteQuote;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteScoring {
    /// Points lost per kilometre.
    pub distance_penalty_per_km: f64,
    /// Points lost per minute.
    pub duration_penalty_per_minute: f64,
    /// Points lost per turn-by-turn step (ranking only).
    pub step_penalty: f64,
    pub distance_weight: f64,
    pub duration_weight: f64,
}

impl Default for RouteScoring {
    fn default() -> Self {
        Self {
            distance_penalty_per_km: 2.0,
            duration_penalty_per_minute: 1.5,
            step_penalty: 2.0,
            distance_weight: 0.4,
            duration_weight: 0.6,
        }
    }
}

/// Used when a quote has no steps to rank on.
const ASSUMED_STEP_COUNT: usize = 10;

fn non_negative(v: f64) -> f64 {
    if v.is_finite() {
        v.max(0.0)
    } else {
        0.0
    }
}

fn component(value: f64, penalty: f64) -> f64 {
    (100.0 - value * non_negative(penalty)).clamp(0.0, 100.0)
}

impl RouteScoring {
    /// Score from distance and duration only. Non-finite input scores zero;
    /// negative input counts as zero so the score stays monotone.
    pub fn score(&self, distance_km: f64, duration_minutes: f64) -> u8 {
        if !distance_km.is_finite() || !duration_minutes.is_finite() {
            return 0;
        }
        let (dw, tw) = self.normalized_weights();
        let raw = component(distance_km.max(0.0), self.distance_penalty_per_km) * dw
            + component(duration_minutes.max(0.0), self.duration_penalty_per_minute) * tw;
        raw.round().clamp(0.0, 100.0) as u8
    }

    /// Ranking score that also prefers routes with fewer steps.
    pub fn ranking_score(&self, quote: &RouteQuote) -> f64 {
        let steps = if quote.steps.is_empty() {
            ASSUMED_STEP_COUNT
        } else {
            quote.steps.len()
        };
        let base = f64::from(self.score(quote.distance_km, quote.duration_minutes));
        let complexity = component(steps as f64, self.step_penalty);
        base * 0.8 + complexity * 0.2
    }

    fn normalized_weights(&self) -> (f64, f64) {
        let (a, b) = (
            non_negative(self.distance_weight),
            non_negative(self.duration_weight),
        );
        let total = a + b;
        if total <= 0.0 {
            (0.5, 0.5)
        } else {
            (a / total, b / total)
        }
    }
}

/// Pick the highest-ranked quote. Ties keep the earlier quote.
pub fn select_best_route<'a>(
    quotes: &'a [RouteQuote],
    scoring: &RouteScoring,
) -> Option<&'a RouteQuote> {
    let mut best: Option<(&RouteQuote, f64)> = None;
    for quote in quotes {
        let score = scoring.ranking_score(quote);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((quote, score)),
        }
    }
    best.map(|(quote, _)| quote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RouteStep;

    fn quote(distance_km: f64, duration_minutes: f64, steps: usize) -> RouteQuote {
        RouteQuote {
            polyline: Vec::new(),
            distance_km,
            duration_minutes,
            steps: (0..steps)
                .map(|i| RouteStep {
                    instruction: format!("step {i}"),
                    distance_m: 100.0,
                    coordinate: None,
                })
                .collect(),
            score: 0,
            provider: "test".to_string(),
            fallback: false,
        }
    }

    #[test]
    fn default_weights_match_reference_formula() {
        let scoring = RouteScoring::default();
        // distance 10 km -> 80, duration 20 min -> 70; 0.4*80 + 0.6*70 = 74
        assert_eq!(scoring.score(10.0, 20.0), 74);
        assert_eq!(scoring.score(0.0, 0.0), 100);
        assert_eq!(scoring.score(500.0, 500.0), 0);
    }

    #[test]
    fn score_never_increases_with_distance_or_duration() {
        let scoring = RouteScoring::default();
        let mut previous = u8::MAX;
        for step in 0..200 {
            let value = f64::from(step) * 0.37;
            let score = scoring.score(value, 12.0);
            assert!(score <= previous);
            previous = score;
        }
        let mut previous = u8::MAX;
        for step in 0..200 {
            let value = f64::from(step) * 0.41;
            let score = scoring.score(3.0, value);
            assert!(score <= previous);
            previous = score;
        }
    }

    #[test]
    fn bad_input_scores_zero() {
        let scoring = RouteScoring::default();
        assert_eq!(scoring.score(f64::NAN, 1.0), 0);
        assert_eq!(scoring.score(1.0, f64::INFINITY), 0);
    }

    #[test]
    fn negative_input_scores_like_zero() {
        let scoring = RouteScoring::default();
        assert_eq!(scoring.score(-0.001, 0.0), scoring.score(0.0, 0.0));
        assert_eq!(scoring.score(-3.0, 12.0), scoring.score(0.0, 12.0));
        assert!(scoring.score(-0.001, 0.0) >= scoring.score(0.001, 0.0));
    }

    #[test]
    fn negative_weights_are_ignored() {
        let scoring = RouteScoring {
            distance_weight: -5.0,
            duration_weight: 1.0,
            ..RouteScoring::default()
        };
        // only duration counts: 100 - 10 * 1.5 = 85
        assert_eq!(scoring.score(40.0, 10.0), 85);
    }

    #[test]
    fn best_route_prefers_fewer_steps_on_equal_cost() {
        let quotes = vec![quote(5.0, 10.0, 12), quote(5.0, 10.0, 3)];
        let best = select_best_route(&quotes, &RouteScoring::default()).unwrap();
        assert_eq!(best.steps.len(), 3);
    }

    #[test]
    fn best_route_of_empty_slice_is_none() {
        assert!(select_best_route(&[], &RouteScoring::default()).is_none());
    }
}
