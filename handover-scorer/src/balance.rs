//! Operator backlog penalty applied on top of a vehicle score.

use handover_core::{OperatorBacklog, ScoreCard};

/// Spreads demand across operators by penalising busy inboxes.
///
/// The penalty only lowers the score; it never changes eligibility.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadBalancer {
    /// Largest penalty applied, whatever the backlog.
    pub cap: f64,
    /// Points deducted per `NEW` inbox row.
    pub new_weight: f64,
    /// Points deducted per `CONTACTED` inbox row.
    pub contacted_weight: f64,
}

impl Default for LoadBalancer {
    fn default() -> Self {
        Self {
            cap: 12.0,
            new_weight: 1.6,
            contacted_weight: 0.6,
        }
    }
}

impl LoadBalancer {
    /// Penalty for an operator carrying `backlog`.
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "weights are fractional")]
    pub fn penalty(&self, backlog: OperatorBacklog) -> f64 {
        let raw = f64::from(backlog.new) * self.new_weight
            + f64::from(backlog.contacted) * self.contacted_weight;
        raw.min(self.cap)
    }

    /// Deduct the backlog penalty from `card`, flooring at zero, and record it.
    ///
    /// The resulting score is rounded to two decimal places.
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "scores are fractional")]
    pub fn apply(&self, mut card: ScoreCard, backlog: OperatorBacklog) -> ScoreCard {
        let penalty = self.penalty(backlog);
        let balanced = (card.score - penalty).max(0.0);
        card.score = (balanced * 100.0).round() / 100.0;
        card.reasons.push(format!(
            "op_load:new={},contacted={} (penalty -{penalty:.1})",
            backlog.new, backlog.contacted
        ));
        card
    }
}
