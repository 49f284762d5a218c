//! Ensemble CRPS and the change-series transform it is applied to.

use chrono::Duration;

use crate::error::{AppError, Result};

/// Whole cadence steps in `horizon`, floored.
///
/// Fails unless `1 <= steps < path_len`, i.e. the horizon yields at least
/// one change window.
pub fn step_count(horizon: Duration, cadence: Duration, path_len: usize) -> Result<usize> {
    let cadence_secs = cadence.num_seconds();
    if cadence_secs <= 0 {
        return Err(AppError::DimensionMismatch(format!(
            "cadence must be positive, got {cadence_secs}s"
        )));
    }
    let steps = horizon.num_seconds().div_euclid(cadence_secs);
    if steps < 1 || steps as usize >= path_len {
        return Err(AppError::DimensionMismatch(format!(
            "horizon {}s at cadence {cadence_secs}s gives {steps} steps for {path_len} points",
            horizon.num_seconds()
        )));
    }
    Ok(steps as usize)
}

/// `prices[t + steps] - prices[t]` for every window that fits.
pub fn change_series(prices: &[f64], steps: usize) -> Vec<f64> {
    prices.windows(steps + 1).map(|w| w[steps] - w[0]).collect()
}

/// CRPS of an ensemble forecast against one observation.
///
/// `E|X - y| - ½ E|X - X'|` with the expectation over the empirical
/// ensemble distribution. The pair term uses the sorted form
/// `Σ_i (2i - M + 1) x_(i)` folded into pairwise differences, so a point
/// mass at the observation scores exactly zero. Sorts `ensemble` in place.
pub fn crps_ensemble(observation: f64, ensemble: &mut [f64]) -> Result<f64> {
    let m = ensemble.len();
    if m == 0 {
        return Err(AppError::DimensionMismatch("empty ensemble".to_string()));
    }
    if !observation.is_finite() || ensemble.iter().any(|x| !x.is_finite()) {
        return Err(AppError::InvalidInput(
            "non-finite value in ensemble or observation".to_string(),
        ));
    }

    ensemble.sort_by(f64::total_cmp);

    let m_f = m as f64;
    let abs_error = ensemble.iter().map(|x| (x - observation).abs()).sum::<f64>() / m_f;

    // Σ_{i,j} |x_i - x_j| / 2 = Σ_{i < M/2} (M - 1 - 2i) (x_(M-1-i) - x_(i))
    let spread = (0..m / 2)
        .map(|i| (m - 1 - 2 * i) as f64 * (ensemble[m - 1 - i] - ensemble[i]))
        .sum::<f64>()
        / (m_f * m_f);

    Ok((abs_error - spread).max(0.0))
}
