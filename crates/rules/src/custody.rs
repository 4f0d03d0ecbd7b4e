//! Chain-of-custody gap detection.
//!
//! Entries are ordered by timestamp before any interval is measured, so the
//! result depends only on the set of timestamps, never on the order entries
//! were recorded in. A gap is an interval between adjacent entries that
//! strictly exceeds the threshold.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use custos_core::config::DEFAULT_CUSTODY_GAP_HOURS;
use custos_core::CustodyEntry;

/// One over-threshold interval between adjacent custody entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustodyGap {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub from_custodian: String,
    pub to_custodian: String,
    #[serde(skip)]
    pub elapsed: TimeDelta,
}

impl CustodyGap {
    pub fn hours(&self) -> f64 {
        self.elapsed.num_seconds() as f64 / 3600.0
    }
}

/// Derived custody facts exposed to rules under `evidence.custody`.
#[derive(Debug, Clone, PartialEq)]
pub struct CustodySummary {
    pub entry_count: usize,
    pub gap_count: usize,
    /// Longest interval between adjacent entries, whether or not it is a gap.
    pub max_interval: Option<TimeDelta>,
}

impl CustodySummary {
    pub fn has_gap(&self) -> bool {
        self.gap_count > 0
    }

    pub fn max_interval_hours(&self) -> Option<f64> {
        self.max_interval.map(|d| d.num_seconds() as f64 / 3600.0)
    }
}

/// Detects custody timeline gaps against a fixed threshold.
#[derive(Debug, Clone, Copy)]
pub struct ChainOfCustodyAnalyzer {
    threshold: TimeDelta,
}

impl ChainOfCustodyAnalyzer {
    pub fn new(threshold_hours: u32) -> Self {
        Self {
            threshold: TimeDelta::hours(i64::from(threshold_hours)),
        }
    }

    pub fn threshold(&self) -> TimeDelta {
        self.threshold
    }

    /// True when any adjacent pair (by timestamp) is further apart than the threshold.
    pub fn has_gap(&self, entries: &[CustodyEntry]) -> bool {
        intervals(entries).any(|(_, _, elapsed)| elapsed > self.threshold)
    }

    /// Every over-threshold interval, in timestamp order.
    pub fn find_gaps(&self, entries: &[CustodyEntry]) -> Vec<CustodyGap> {
        intervals(entries)
            .filter(|(_, _, elapsed)| *elapsed > self.threshold)
            .map(|(a, b, elapsed)| CustodyGap {
                from: a.timestamp,
                to: b.timestamp,
                from_custodian: a.custodian.clone(),
                to_custodian: b.custodian.clone(),
                elapsed,
            })
            .collect()
    }

    pub fn summarize(&self, entries: &[CustodyEntry]) -> CustodySummary {
        let mut gap_count = 0;
        let mut max_interval: Option<TimeDelta> = None;
        for (_, _, elapsed) in intervals(entries) {
            if elapsed > self.threshold {
                gap_count += 1;
            }
            max_interval = Some(max_interval.map_or(elapsed, |m| m.max(elapsed)));
        }
        CustodySummary {
            entry_count: entries.len(),
            gap_count,
            max_interval,
        }
    }
}

impl Default for ChainOfCustodyAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_CUSTODY_GAP_HOURS)
    }
}

/// Convenience form of [`ChainOfCustodyAnalyzer::has_gap`].
pub fn has_gap(entries: &[CustodyEntry], threshold_hours: u32) -> bool {
    ChainOfCustodyAnalyzer::new(threshold_hours).has_gap(entries)
}

/// Adjacent pairs in timestamp order with their elapsed time.
fn intervals(
    entries: &[CustodyEntry],
) -> impl Iterator<Item = (&CustodyEntry, &CustodyEntry, TimeDelta)> + '_ {
    let mut sorted: Vec<&CustodyEntry> = entries.iter().collect();
    // Stable sort keeps equal timestamps adjacent with zero elapsed time.
    sorted.sort_by_key(|e| e.timestamp);
    let pairs: Vec<_> = sorted
        .windows(2)
        .map(|w| (w[0], w[1], w[1].timestamp - w[0].timestamp))
        .collect();
    pairs.into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use custos_core::CustodyAction;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap()
    }

    fn at(hours: i64, who: &str) -> CustodyEntry {
        CustodyEntry::new(t0() + TimeDelta::hours(hours), who, CustodyAction::Transferred)
    }

    #[test]
    fn fewer_than_two_entries_never_gap() {
        assert!(!has_gap(&[], 0));
        assert!(!has_gap(&[at(0, "a")], 0));
        assert!(!has_gap(&[at(500, "a")], 1));
    }

    #[test]
    fn gaps_within_threshold_do_not_report() {
        let entries = vec![at(0, "a"), at(10, "b"), at(30, "c")];
        assert!(!has_gap(&entries, 24));
    }

    #[test]
    fn gap_over_threshold_reports() {
        let entries = vec![at(0, "a"), at(30, "b")];
        assert!(has_gap(&entries, 24));
    }

    #[test]
    fn exactly_threshold_is_not_a_gap() {
        let entries = vec![at(0, "a"), at(24, "b")];
        assert!(!has_gap(&entries, 24));
    }

    #[test]
    fn order_of_entries_does_not_matter() {
        let ordered = vec![at(0, "a"), at(10, "b"), at(40, "c"), at(41, "d")];
        let analyzer = ChainOfCustodyAnalyzer::default();
        let expected = analyzer.has_gap(&ordered);
        assert!(expected);

        let permutations = [[3, 1, 0, 2], [2, 3, 1, 0], [1, 0, 3, 2], [0, 2, 1, 3]];
        for perm in permutations {
            let shuffled: Vec<CustodyEntry> = perm.iter().map(|&i| ordered[i].clone()).collect();
            assert_eq!(analyzer.has_gap(&shuffled), expected);
            assert_eq!(analyzer.summarize(&shuffled), analyzer.summarize(&ordered));
        }
    }

    #[test]
    fn out_of_order_recording_is_sorted_first() {
        // Recorded order has a 30h jump, chronological order does not.
        let entries = vec![at(0, "a"), at(30, "c"), at(15, "b")];
        assert!(!has_gap(&entries, 24));
    }

    #[test]
    fn identical_timestamps_have_zero_interval() {
        let entries = vec![at(5, "a"), at(5, "b")];
        let summary = ChainOfCustodyAnalyzer::new(0).summarize(&entries);
        assert_eq!(summary.gap_count, 0);
        assert_eq!(summary.max_interval, Some(TimeDelta::zero()));
    }

    #[test]
    fn find_gaps_reports_each_interval() {
        let entries = vec![at(100, "d"), at(0, "a"), at(30, "b"), at(40, "c")];
        let gaps = ChainOfCustodyAnalyzer::new(24).find_gaps(&entries);
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0].from_custodian, "a");
        assert_eq!(gaps[0].to_custodian, "b");
        assert_eq!(gaps[0].hours(), 30.0);
        assert_eq!(gaps[1].from_custodian, "c");
        assert_eq!(gaps[1].hours(), 60.0);

        let summary = ChainOfCustodyAnalyzer::new(24).summarize(&entries);
        assert_eq!(summary.entry_count, 4);
        assert_eq!(summary.gap_count, 2);
        assert!(summary.has_gap());
        assert_eq!(summary.max_interval_hours(), Some(60.0));
    }
}
