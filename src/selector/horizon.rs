use std::sync::Arc;

use chrono::Duration;

use crate::config::{DEFAULT_HORIZON_SECS, DEFAULT_LOOKBACK_SECS};
use crate::types::{ForecastRecord, Timestamp};

/// When a stored forecast becomes eligible for scoring, and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    /// Maturity period after submission.
    pub horizon: Duration,
    /// Maximum age of the horizon end at evaluation time.
    pub lookback: Duration,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            horizon: Duration::seconds(DEFAULT_HORIZON_SECS),
            lookback: Duration::seconds(DEFAULT_LOOKBACK_SECS),
        }
    }
}

/// `None` when the horizon runs past the representable range: never matures.
pub fn horizon_end(record: &ForecastRecord, policy: &SelectionPolicy) -> Option<Timestamp> {
    record.submitted_at.checked_add_signed(policy.horizon)
}

fn is_eligible(record: &ForecastRecord, now: Timestamp, policy: &SelectionPolicy) -> bool {
    let Some(end) = horizon_end(record, policy) else {
        return false;
    };
    // A lookback reaching before the representable range has no lower bound.
    let within_lookback = match now.checked_sub_signed(policy.lookback) {
        Some(oldest) => end >= oldest,
        None => true,
    };
    end <= now && within_lookback && record.path_len() > 0
}

/// Picks the one record eligible for scoring at `now`.
///
/// Eligible: horizon elapsed, horizon end inside the lookback window, and
/// points present. Among those the most recently matured wins; ties go to
/// the later submission, then to the later append. `None` means the
/// participant contributes nothing this cycle.
pub fn select_eligible<'a>(
    records: &'a [Arc<ForecastRecord>],
    now: Timestamp,
    policy: &SelectionPolicy,
) -> Option<&'a Arc<ForecastRecord>> {
    records
        .iter()
        .filter(|r| is_eligible(r, now, policy))
        .max_by_key(|r| (horizon_end(r, policy), r.submitted_at, r.seq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::forecast_store::tests::{day_path, t0};
    use crate::state::{ForecastStore, MemoryForecastStore};
    use chrono::TimeZone;
    use chrono::Utc;

    fn at(d: u32, h: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 11, d, h, 0, 0).unwrap()
    }

    fn record(seq: u64, submitted_at: Timestamp) -> Arc<ForecastRecord> {
        Arc::new(ForecastRecord {
            seq,
            participant_id: "miner_123".to_string(),
            submitted_at,
            paths: vec![day_path(submitted_at)],
        })
    }

    #[test]
    fn no_records_selects_nothing() {
        let policy = SelectionPolicy::default();
        for now in [at(20, 0), at(22, 0), at(30, 0)] {
            assert!(select_eligible(&[], now, &policy).is_none());
        }
    }

    #[tokio::test]
    async fn elapsed_horizon_within_lookback_returns_full_path() {
        let store = MemoryForecastStore::new(Duration::minutes(5));
        store.append("miner_123", t0(), vec![day_path(t0())]).await.unwrap();
        let records = store.records_for("miner_123").await.unwrap();

        let chosen = select_eligible(&records, at(22, 0), &SelectionPolicy::default())
            .expect("record should be eligible");
        let path = &chosen.paths[0];
        assert_eq!(path.len(), 288);
        assert_eq!(path[0].time, t0());
        assert_eq!(path[0].price, 90_000.0);
        assert_eq!(path[287].time, Utc.with_ymd_and_hms(2024, 11, 20, 23, 55, 0).unwrap());
        assert_eq!(path[287].price, 233_500.0);
    }

    #[test]
    fn beyond_lookback_selects_nothing() {
        let records = vec![record(1, t0())];
        assert!(select_eligible(&records, at(30, 0), &SelectionPolicy::default()).is_none());
    }

    #[test]
    fn horizon_not_elapsed_selects_nothing() {
        let records = vec![record(1, t0())];
        assert!(select_eligible(&records, at(20, 12), &SelectionPolicy::default()).is_none());
    }

    #[test]
    fn window_edges_are_inclusive() {
        let policy = SelectionPolicy::default();
        let records = vec![record(1, t0())];
        // horizon ends exactly now
        assert!(select_eligible(&records, at(21, 0), &policy).is_some());
        // horizon ended exactly lookback ago
        assert!(select_eligible(&records, at(26, 0), &policy).is_some());
        assert!(select_eligible(&records, at(26, 1), &policy).is_none());
    }

    #[test]
    fn later_maturing_record_wins_once_elapsed() {
        let policy = SelectionPolicy::default();
        let records = vec![record(1, t0()), record(2, at(20, 12))];

        let chosen = select_eligible(&records, at(21, 15), &policy).unwrap();
        assert_eq!(chosen.submitted_at, at(20, 12));
        assert_eq!(chosen.paths[0][0].time, at(20, 12));
        assert_eq!(
            chosen.paths[0][287].time,
            Utc.with_ymd_and_hms(2024, 11, 21, 11, 55, 0).unwrap()
        );

        // Stable across repeated calls and input order.
        let reversed: Vec<_> = records.iter().rev().cloned().collect();
        for _ in 0..5 {
            assert_eq!(select_eligible(&records, at(21, 15), &policy).unwrap().seq, 2);
            assert_eq!(select_eligible(&reversed, at(21, 15), &policy).unwrap().seq, 2);
        }
    }

    #[test]
    fn overlapping_record_not_yet_mature_is_skipped() {
        let policy = SelectionPolicy::default();
        let records = vec![record(1, t0()), record(2, at(20, 12))];

        let chosen = select_eligible(&records, at(21, 3), &policy).unwrap();
        assert_eq!(chosen.seq, 1);
        assert_eq!(chosen.paths[0][0].time, t0());
    }

    #[test]
    fn equal_horizon_end_prefers_later_append() {
        let policy = SelectionPolicy::default();
        let records = vec![record(7, t0()), record(3, t0()), record(9, t0())];
        let chosen = select_eligible(&records, at(22, 0), &policy).unwrap();
        assert_eq!(chosen.seq, 9);
    }

    #[test]
    fn record_without_points_is_never_eligible() {
        let policy = SelectionPolicy::default();
        let empty = Arc::new(ForecastRecord {
            seq: 5,
            participant_id: "miner_123".to_string(),
            submitted_at: at(20, 12),
            paths: vec![],
        });
        let records = vec![record(1, t0()), empty];
        assert_eq!(select_eligible(&records, at(22, 0), &policy).unwrap().seq, 1);
    }

    #[test]
    fn oversized_windows_do_not_overflow() {
        let records = vec![record(1, t0())];

        let unbounded = SelectionPolicy {
            horizon: Duration::hours(24),
            lookback: Duration::seconds(9_000_000_000_000),
        };
        assert_eq!(select_eligible(&records, at(30, 0), &unbounded).unwrap().seq, 1);

        let never = SelectionPolicy {
            horizon: Duration::MAX,
            lookback: Duration::days(5),
        };
        assert!(select_eligible(&records, at(30, 0), &never).is_none());
    }
}
