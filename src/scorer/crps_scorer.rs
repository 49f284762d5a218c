use chrono::Duration;

use crate::error::{AppError, Result};
use crate::scorer::crps::{change_series, crps_ensemble, step_count};
use crate::types::{
    Increment, LedgerRow, PricePath, PricePoint, ScoreLedger, ScoreSummary, Timestamp,
    OVERALL_LABEL,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringHorizon {
    pub label: String,
    pub duration: Duration,
}

impl ScoringHorizon {
    pub fn new(label: impl Into<String>, duration: Duration) -> Self {
        Self { label: label.into(), duration }
    }
}

/// Multi-horizon CRPS over price changes.
///
/// For each horizon the ensemble and the realized path are turned into
/// change series over `floor(horizon / cadence)` steps and every change
/// window is scored. Totals are plain sums in row order, so
/// `overall_total` is exactly the sum of the per-horizon totals.
#[derive(Debug, Clone)]
pub struct CrpsScorer {
    horizons: Vec<ScoringHorizon>,
    cadence: Duration,
}

impl CrpsScorer {
    pub fn new(horizons: Vec<ScoringHorizon>, cadence: Duration) -> Self {
        Self { horizons, cadence }
    }

    pub fn horizons(&self) -> &[ScoringHorizon] {
        &self.horizons
    }

    pub fn score(
        &self,
        participant_id: &str,
        evaluated_at: Timestamp,
        ensemble: &[PricePath],
        realized: &[PricePoint],
    ) -> Result<(ScoreLedger, ScoreSummary)> {
        let n = check_shape(ensemble, realized)?;

        let simulated: Vec<Vec<f64>> = ensemble
            .iter()
            .map(|path| path.iter().map(|p| p.price).collect())
            .collect();
        let observed: Vec<f64> = realized.iter().map(|p| p.price).collect();

        let mut rows = Vec::new();
        let mut per_horizon_total = Vec::with_capacity(self.horizons.len());
        let mut overall_total = 0.0;

        for horizon in &self.horizons {
            let steps = step_count(horizon.duration, self.cadence, n)?;
            let sim_changes: Vec<Vec<f64>> =
                simulated.iter().map(|prices| change_series(prices, steps)).collect();
            let real_changes = change_series(&observed, steps);

            let mut horizon_total = 0.0;
            let mut column = vec![0.0; sim_changes.len()];
            for (t, &obs) in real_changes.iter().enumerate() {
                for (slot, changes) in column.iter_mut().zip(&sim_changes) {
                    *slot = changes[t];
                }
                let score = crps_ensemble(obs, &mut column)?;
                horizon_total += score;
                rows.push(LedgerRow {
                    label: horizon.label.clone(),
                    increment: Increment::Index(t + 1),
                    score,
                });
            }

            rows.push(LedgerRow {
                label: horizon.label.clone(),
                increment: Increment::Total,
                score: horizon_total,
            });
            per_horizon_total.push((horizon.label.clone(), horizon_total));
            overall_total += horizon_total;
        }

        rows.push(LedgerRow {
            label: OVERALL_LABEL.to_string(),
            increment: Increment::Total,
            score: overall_total,
        });

        let ledger = ScoreLedger {
            participant_id: participant_id.to_string(),
            evaluated_at,
            rows,
        };
        let summary = ScoreSummary {
            participant_id: participant_id.to_string(),
            per_horizon_total,
            overall_total,
        };
        Ok((ledger, summary))
    }
}

/// Returns the shared path length N.
fn check_shape(ensemble: &[PricePath], realized: &[PricePoint]) -> Result<usize> {
    let Some(first) = ensemble.first() else {
        return Err(AppError::DimensionMismatch("empty ensemble".to_string()));
    };
    let n = first.len();
    if n == 0 {
        return Err(AppError::DimensionMismatch("ensemble paths have no points".to_string()));
    }
    if let Some((m, path)) = ensemble.iter().enumerate().find(|(_, p)| p.len() != n) {
        return Err(AppError::DimensionMismatch(format!(
            "path {m} has {} points, path 0 has {n}",
            path.len()
        )));
    }
    if realized.len() != n {
        return Err(AppError::DimensionMismatch(format!(
            "realized path has {} points, ensemble has {n}",
            realized.len()
        )));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SCORING_HORIZONS;
    use chrono::{TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 11, 20, 0, 0, 0).unwrap()
    }

    fn path(prices: &[f64]) -> PricePath {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| PricePoint::new(t0() + Duration::minutes(5 * i as i64), p))
            .collect()
    }

    /// Deterministic wiggle so paths differ without pulling in an RNG.
    fn wavy(n: usize, phase: f64, amp: f64) -> Vec<f64> {
        (0..n)
            .map(|i| 90_000.0 + amp * ((i as f64) * 0.37 + phase).sin() + 3.0 * i as f64)
            .collect()
    }

    fn default_scorer() -> CrpsScorer {
        let horizons = SCORING_HORIZONS
            .iter()
            .map(|&(l, s)| ScoringHorizon::new(l, Duration::seconds(s)))
            .collect();
        CrpsScorer::new(horizons, Duration::minutes(5))
    }

    fn small_scorer() -> CrpsScorer {
        CrpsScorer::new(
            vec![
                ScoringHorizon::new("5min", Duration::minutes(5)),
                ScoringHorizon::new("15min", Duration::minutes(15)),
            ],
            Duration::minutes(5),
        )
    }

    #[test]
    fn overall_is_exact_sum_of_interval_scores() {
        let n = 289;
        let ensemble: Vec<PricePath> =
            (0..25).map(|m| path(&wavy(n, m as f64, 40.0 + m as f64))).collect();
        let realized = path(&wavy(n, 0.5, 55.0));

        let (ledger, summary) = default_scorer().score("m", t0(), &ensemble, &realized).unwrap();

        let mut overall = 0.0;
        for (label, total) in &summary.per_horizon_total {
            let mut sum = 0.0;
            let mut count = 0;
            for row in ledger.rows.iter().filter(|r| &r.label == label) {
                if let Increment::Index(_) = row.increment {
                    sum += row.score;
                    count += 1;
                }
            }
            assert_eq!(sum, *total, "horizon {label}");
            overall += sum;

            let steps = SCORING_HORIZONS.iter().find(|&&(l, _)| l == label.as_str()).unwrap().1 / 300;
            assert_eq!(count, n - steps as usize, "horizon {label}");
        }
        assert_eq!(overall, summary.overall_total);
        assert_eq!(ledger.overall_total(), Some(summary.overall_total));
    }

    #[test]
    fn ledger_row_layout() {
        let ensemble = vec![path(&[1.0, 2.0, 4.0, 7.0]), path(&[1.0, 1.0, 1.0, 1.0])];
        let realized = path(&[1.0, 3.0, 3.0, 5.0]);
        let (ledger, summary) = small_scorer().score("m", t0(), &ensemble, &realized).unwrap();

        let layout: Vec<(String, Increment)> =
            ledger.rows.iter().map(|r| (r.label.clone(), r.increment)).collect();
        assert_eq!(
            layout,
            vec![
                ("5min".to_string(), Increment::Index(1)),
                ("5min".to_string(), Increment::Index(2)),
                ("5min".to_string(), Increment::Index(3)),
                ("5min".to_string(), Increment::Total),
                ("15min".to_string(), Increment::Index(1)),
                ("15min".to_string(), Increment::Total),
                ("Overall".to_string(), Increment::Total),
            ]
        );
        assert_eq!(summary.per_horizon_total.len(), 2);
        assert!(ledger.rows.iter().all(|r| r.score >= 0.0));
    }

    #[test]
    fn perfect_point_forecast_scores_zero() {
        let prices = wavy(40, 1.0, 25.0);
        let ensemble = vec![path(&prices); 8];
        let realized = path(&prices);
        let (_, summary) = small_scorer().score("m", t0(), &ensemble, &realized).unwrap();
        assert_eq!(summary.overall_total, 0.0);
    }

    #[test]
    fn worse_forecast_has_higher_loss() {
        let realized_prices = wavy(40, 0.0, 30.0);
        let realized = path(&realized_prices);
        let good = vec![path(&wavy(40, 0.1, 30.0)), path(&wavy(40, -0.1, 30.0))];
        let bad = vec![path(&wavy(40, 2.0, 90.0)), path(&wavy(40, 3.0, 90.0))];

        let scorer = small_scorer();
        let (_, good_summary) = scorer.score("g", t0(), &good, &realized).unwrap();
        let (_, bad_summary) = scorer.score("b", t0(), &bad, &realized).unwrap();
        assert!(bad_summary.overall_total > good_summary.overall_total);
    }

    #[test]
    fn non_divisible_horizon_floors_step_count() {
        // 7 minutes at 5-minute cadence → 1 step, same as the 5-minute horizon.
        let floored = CrpsScorer::new(
            vec![ScoringHorizon::new("7min", Duration::minutes(7))],
            Duration::minutes(5),
        );
        let exact = CrpsScorer::new(
            vec![ScoringHorizon::new("5min", Duration::minutes(5))],
            Duration::minutes(5),
        );
        let ensemble = vec![path(&[1.0, 2.0, 4.0, 7.0]), path(&[2.0, 2.0, 3.0, 3.0])];
        let realized = path(&[1.0, 3.0, 3.0, 5.0]);

        let (a, sa) = floored.score("m", t0(), &ensemble, &realized).unwrap();
        let (_, sb) = exact.score("m", t0(), &ensemble, &realized).unwrap();
        assert_eq!(a.rows.len(), 3 + 1 + 1);
        assert_eq!(sa.overall_total, sb.overall_total);
    }

    #[test]
    fn shape_errors_are_dimension_mismatch() {
        let scorer = small_scorer();
        let realized = path(&[1.0, 2.0, 3.0, 4.0]);

        let err = scorer.score("m", t0(), &[], &realized).unwrap_err();
        assert!(matches!(err, AppError::DimensionMismatch(_)));

        let ragged = vec![path(&[1.0, 2.0, 3.0, 4.0]), path(&[1.0, 2.0, 3.0])];
        let err = scorer.score("m", t0(), &ragged, &realized).unwrap_err();
        assert!(matches!(err, AppError::DimensionMismatch(_)));

        let ensemble = vec![path(&[1.0, 2.0, 3.0, 4.0])];
        let short = path(&[1.0, 2.0, 3.0]);
        let err = scorer.score("m", t0(), &ensemble, &short).unwrap_err();
        assert!(matches!(err, AppError::DimensionMismatch(_)));
    }

    #[test]
    fn horizon_longer_than_path_is_rejected() {
        let ensemble = vec![path(&[1.0, 2.0, 3.0])];
        let realized = path(&[1.0, 2.0, 3.0]);
        // 15 minutes = 3 steps on a 3-point path.
        let err = small_scorer().score("m", t0(), &ensemble, &realized).unwrap_err();
        assert!(matches!(err, AppError::DimensionMismatch(_)));
    }
}
