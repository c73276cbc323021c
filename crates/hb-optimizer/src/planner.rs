//! Bracket planning: the geometric schedule of the Hyperband outer loop.
//!
//! Given the maximum resource any configuration may receive (`max_iter`) and
//! the downsampling rate `eta`, the planner fixes `s_max + 1` brackets. Bracket
//! `s` starts `n` configurations at resource `r = max_iter / eta^s`; every rung
//! keeps `floor(n_i / eta)` survivors and multiplies their resource by `eta`.
//!
//! | s | n (81, 3) | r |
//! |---|-----------|---|
//! | 4 | 81 | 1 |
//! | 3 | 27 | 3 |
//! | 2 | 9 | 9 |
//! | 1 | 6 | 27 |
//! | 0 | 5 | 81 |

use hb_types::{config_error, HbResult};
use serde::{Deserialize, Serialize};

/// One successive-halving run with a fixed starting point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    /// Bracket index; the bracket has `s + 1` rungs.
    pub s: usize,
    /// Number of configurations sampled at rung 0.
    pub n: usize,
    /// Resource allotted to each configuration at rung 0 (may be fractional).
    pub r: f64,
    pub eta: f64,
    pub max_iter: u64,
}

impl Bracket {
    pub fn rung_count(&self) -> usize {
        self.s + 1
    }

    /// `n_i = n * eta^(-i)`, the nominal number of configurations at rung `i`.
    pub fn rung_size(&self, i: usize) -> f64 {
        self.n as f64 / self.eta.powi(i as i32)
    }

    /// `r_i = r * eta^i`, the cumulative resource target at rung `i`.
    ///
    /// Evaluated as `max_iter / eta^(s - i)` so the last rung lands exactly on
    /// `max_iter`.
    pub fn rung_resource(&self, i: usize) -> f64 {
        self.max_iter as f64 / self.eta.powi(self.s as i32 - i as i32)
    }

    /// Resource target handed to the objective: `floor(r_i)`.
    pub fn target_resource(&self, i: usize) -> u64 {
        self.rung_resource(i).floor() as u64
    }

    /// How many configurations advance out of rung `i`: `floor(n_i / eta)`.
    pub fn promotions(&self, i: usize) -> usize {
        (self.n as f64 / self.eta.powi(i as i32 + 1)).floor() as usize
    }

    /// Nominal resource units spent by the bracket if every rung were full.
    pub fn planned_resource(&self) -> f64 {
        (0..self.rung_count())
            .map(|i| self.rung_size(i) * self.rung_resource(i))
            .sum()
    }
}

/// The deterministic bracket schedule for a `(max_iter, eta)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketPlan {
    max_iter: u64,
    eta: f64,
    s_max: usize,
    budget: u64,
}

impl BracketPlan {
    /// Compute `s_max` and the per-bracket budget `B`.
    ///
    /// Fails fast when `eta <= 1` or `max_iter < 1`, where the logarithm is
    /// undefined or the schedule degenerates.
    pub fn new(max_iter: u64, eta: f64) -> HbResult<Self> {
        if max_iter < 1 {
            return Err(config_error!("max_iter must be at least 1, got {max_iter}"));
        }
        if !eta.is_finite() || eta <= 1.0 {
            return Err(config_error!("eta must be a finite number greater than 1, got {eta}"));
        }

        let s_max = floor_log(max_iter, eta)?;
        let budget = (s_max as u64 + 1)
            .checked_mul(max_iter)
            .ok_or_else(|| config_error!("bracket budget overflows for max_iter={max_iter}, eta={eta}"))?;

        Ok(Self {
            max_iter,
            eta,
            s_max,
            budget,
        })
    }

    pub fn max_iter(&self) -> u64 {
        self.max_iter
    }

    pub fn eta(&self) -> f64 {
        self.eta
    }

    /// `floor(log_eta(max_iter))`.
    pub fn s_max(&self) -> usize {
        self.s_max
    }

    /// `B = (s_max + 1) * max_iter`.
    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Bracket `s`, or `None` when `s > s_max`.
    pub fn bracket(&self, s: usize) -> Option<Bracket> {
        if s > self.s_max {
            return None;
        }
        // B / max_iter is exactly s_max + 1, so the inner floor is integer division.
        let per_bracket = (self.budget / self.max_iter) as usize / (s + 1);
        let n = (per_bracket as f64 * self.eta.powi(s as i32)).ceil() as usize;
        let r = self.max_iter as f64 / self.eta.powi(s as i32);
        Some(Bracket {
            s,
            n,
            r,
            eta: self.eta,
            max_iter: self.max_iter,
        })
    }

    /// All brackets, from the most exploratory (`s_max`) down to `0`.
    pub fn brackets(&self) -> impl Iterator<Item = Bracket> + '_ {
        (0..=self.s_max).rev().filter_map(move |s| self.bracket(s))
    }
}

/// Exact `floor(log_eta(max_iter))`.
///
/// The quotient of logarithms can land just below an integer (`ln 243 / ln 3`
/// evaluates to 4.999...), so the estimate is corrected against powers of eta.
fn floor_log(max_iter: u64, eta: f64) -> HbResult<usize> {
    let target = max_iter as f64;
    let estimate = (target.ln() / eta.ln()).floor();
    if estimate > i32::MAX as f64 - 1.0 {
        return Err(config_error!("eta {eta} is too close to 1 for max_iter {max_iter}"));
    }

    let mut s = estimate.max(0.0) as i32;
    while eta.powi(s + 1) <= target {
        s += 1;
    }
    while s > 0 && eta.powi(s) > target {
        s -= 1;
    }
    Ok(s as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_types::HbError;

    #[test]
    fn s_max_and_budget_for_81_by_3() {
        let plan = BracketPlan::new(81, 3.0).unwrap();
        assert_eq!(plan.s_max(), 4);
        assert_eq!(plan.budget(), 405);
    }

    #[test]
    fn s_max_and_budget_for_27_by_3() {
        let plan = BracketPlan::new(27, 3.0).unwrap();
        assert_eq!(plan.s_max(), 3);
        assert_eq!(plan.budget(), 108);
    }

    #[test]
    fn s_max_is_exact_where_logs_drift() {
        // ln(243) / ln(3) is slightly below 5 in floating point.
        let plan = BracketPlan::new(243, 3.0).unwrap();
        assert_eq!(plan.s_max(), 5);
        let plan = BracketPlan::new(1000, 10.0).unwrap();
        assert_eq!(plan.s_max(), 3);
    }

    #[test]
    fn schedule_for_81_by_3() {
        let plan = BracketPlan::new(81, 3.0).unwrap();
        let brackets: Vec<(usize, usize, f64)> = plan.brackets().map(|b| (b.s, b.n, b.r)).collect();
        assert_eq!(
            brackets,
            vec![(4, 81, 1.0), (3, 27, 3.0), (2, 9, 9.0), (1, 6, 27.0), (0, 5, 81.0)]
        );
    }

    #[test]
    fn largest_bracket_rungs_for_81_by_3() {
        let plan = BracketPlan::new(81, 3.0).unwrap();
        let bracket = plan.bracket(4).unwrap();
        let targets: Vec<u64> = (0..bracket.rung_count()).map(|i| bracket.target_resource(i)).collect();
        let promotions: Vec<usize> = (0..bracket.rung_count()).map(|i| bracket.promotions(i)).collect();
        assert_eq!(targets, vec![1, 3, 9, 27, 81]);
        assert_eq!(promotions, vec![27, 9, 3, 1, 0]);
    }

    #[test]
    fn single_rung_bracket_for_27_by_3() {
        let plan = BracketPlan::new(27, 3.0).unwrap();
        let bracket = plan.bracket(0).unwrap();
        assert_eq!(bracket.n, 4);
        assert_eq!(bracket.r, 27.0);
        assert_eq!(bracket.rung_count(), 1);
        assert_eq!(bracket.target_resource(0), 27);
    }

    #[test]
    fn last_rung_is_exactly_max_iter_for_non_power_max_iter() {
        // r * eta with r = 7/3 rounds to 6.999... and would floor to 6.
        let plan = BracketPlan::new(7, 3.0).unwrap();
        assert_eq!(plan.s_max(), 1);
        let bracket = plan.bracket(1).unwrap();
        assert_eq!(bracket.target_resource(0), 2);
        assert_eq!(bracket.rung_resource(1), 7.0);
        assert_eq!(bracket.target_resource(1), 7);
    }

    #[test]
    fn out_of_range_bracket_is_none() {
        let plan = BracketPlan::new(81, 3.0).unwrap();
        assert!(plan.bracket(5).is_none());
    }

    #[test]
    fn max_iter_of_one_gives_a_single_bracket() {
        let plan = BracketPlan::new(1, 3.0).unwrap();
        assert_eq!(plan.s_max(), 0);
        let brackets: Vec<Bracket> = plan.brackets().collect();
        assert_eq!(brackets.len(), 1);
        assert_eq!(brackets[0].n, 1);
        assert_eq!(brackets[0].target_resource(0), 1);
    }

    #[test]
    fn invalid_parameters_fail_fast() {
        for eta in [1.0, 0.5, -3.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(BracketPlan::new(81, eta), Err(HbError::Config(_))), "eta={eta}");
        }
        assert!(matches!(BracketPlan::new(0, 3.0), Err(HbError::Config(_))));
    }

    #[test]
    fn every_bracket_spends_roughly_the_same_budget() {
        let plan = BracketPlan::new(81, 3.0).unwrap();
        for bracket in plan.brackets() {
            let spent = bracket.planned_resource();
            assert!(spent <= 2.0 * plan.budget() as f64, "s={} spent {spent}", bracket.s);
            assert!(spent >= 0.5 * plan.budget() as f64, "s={} spent {spent}", bracket.s);
        }
    }
}
