//! Aggregated pass/fail/skip counts.
//!
//! [`ResultStats`] is what every node of the result tree reports and what
//! the exporter writes into the `count` elements. Folding is a plain sum, so
//! stats of any node equal the sum of the stats of its descendants.
//!
//! # Counting rules
//!
//! | Result | Counted in |
//! |--------|------------|
//! | `PASSED` | `passed` |
//! | `FAILED` | `failed` |
//! | `SKIPPED` | `skipped` |
//! | `SCHEDULED`, `IN_PROGRESS` | `skipped` and `pending` |
//! | `CANCELLED` | `cancelled` |
//!
//! `pending` is a subset of `skipped`; it is tracked only so that
//! [`ResultStats::summary_result`] can tell a running run from a skipped one.

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::Serialize;

use crate::model::TestCaseResult;

/// Test case counts for a subtree, optionally restricted to some devices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResultStats {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
    /// Cases that have not concluded yet (already included in `skipped`).
    pub pending: usize,
}

impl ResultStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of cases counted.
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.cancelled
    }

    /// Adds one case result. `None` (no case on that device) counts nothing.
    pub fn add_result(mut self, result: Option<TestCaseResult>) -> Self {
        match result {
            Some(TestCaseResult::Passed) => self.passed += 1,
            Some(TestCaseResult::Failed) => self.failed += 1,
            Some(TestCaseResult::Skipped) => self.skipped += 1,
            Some(TestCaseResult::Cancelled) => self.cancelled += 1,
            Some(TestCaseResult::Scheduled | TestCaseResult::InProgress) => {
                self.skipped += 1;
                self.pending += 1;
            }
            None => {}
        }
        self
    }

    /// Worst outcome among the counted cases.
    ///
    /// Priority is FAILED, CANCELLED, IN_PROGRESS, PASSED, SKIPPED. Returns
    /// `None` when nothing was counted.
    pub fn summary_result(&self) -> Option<TestCaseResult> {
        if self.failed > 0 {
            Some(TestCaseResult::Failed)
        } else if self.cancelled > 0 {
            Some(TestCaseResult::Cancelled)
        } else if self.pending > 0 {
            Some(TestCaseResult::InProgress)
        } else if self.passed > 0 {
            Some(TestCaseResult::Passed)
        } else if self.skipped > 0 {
            Some(TestCaseResult::Skipped)
        } else {
            None
        }
    }

    /// One-line summary such as `"1 failed, 3 passed, 2 skipped"`.
    ///
    /// Cancelled cases are reported with the skipped ones. An empty run reads
    /// `"0 passed"`.
    pub fn summary_text(&self) -> String {
        let skipped = self.skipped + self.cancelled;
        let mut parts = Vec::new();
        if self.failed > 0 {
            parts.push(format!("{} failed", self.failed));
        }
        if self.passed > 0 {
            parts.push(format!("{} passed", self.passed));
        }
        if skipped > 0 {
            parts.push(format!("{} skipped", skipped));
        }
        if parts.is_empty() {
            return "0 passed".to_string();
        }
        parts.join(", ")
    }

    /// Headline for a finished run.
    pub fn title(&self) -> &'static str {
        if self.failed > 0 {
            "Tests Failed"
        } else if self.cancelled > 0 {
            "Tests Cancelled"
        } else {
            "Tests Passed"
        }
    }
}

impl Add for ResultStats {
    type Output = ResultStats;

    fn add(mut self, rhs: ResultStats) -> ResultStats {
        self += rhs;
        self
    }
}

impl AddAssign for ResultStats {
    fn add_assign(&mut self, rhs: ResultStats) {
        self.passed += rhs.passed;
        self.failed += rhs.failed;
        self.skipped += rhs.skipped;
        self.cancelled += rhs.cancelled;
        self.pending += rhs.pending;
    }
}

impl Sum for ResultStats {
    fn sum<I: Iterator<Item = ResultStats>>(iter: I) -> Self {
        iter.fold(ResultStats::default(), Add::add)
    }
}

impl FromIterator<TestCaseResult> for ResultStats {
    fn from_iter<I: IntoIterator<Item = TestCaseResult>>(iter: I) -> Self {
        iter.into_iter()
            .fold(ResultStats::default(), |acc, r| acc.add_result(Some(r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting_rules() {
        let stats: ResultStats = TestCaseResult::ALL.into_iter().collect();
        assert_eq!(stats.passed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 3);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.total(), 6);
    }

    #[test]
    fn test_none_counts_nothing() {
        let stats = ResultStats::new().add_result(None);
        assert_eq!(stats, ResultStats::default());
        assert_eq!(stats.summary_result(), None);
    }

    #[test]
    fn test_summary_priority() {
        let passed_and_failed: ResultStats =
            [TestCaseResult::Passed, TestCaseResult::Failed].into_iter().collect();
        assert_eq!(
            passed_and_failed.summary_result(),
            Some(TestCaseResult::Failed)
        );

        let cancelled: ResultStats = [TestCaseResult::Passed, TestCaseResult::Cancelled]
            .into_iter()
            .collect();
        assert_eq!(cancelled.summary_result(), Some(TestCaseResult::Cancelled));

        let running: ResultStats = [TestCaseResult::Passed, TestCaseResult::InProgress]
            .into_iter()
            .collect();
        assert_eq!(running.summary_result(), Some(TestCaseResult::InProgress));

        let skipped: ResultStats = [TestCaseResult::Skipped].into_iter().collect();
        assert_eq!(skipped.summary_result(), Some(TestCaseResult::Skipped));
    }

    #[test]
    fn test_sum() {
        let a: ResultStats = [TestCaseResult::Passed].into_iter().collect();
        let b: ResultStats = [TestCaseResult::Failed, TestCaseResult::Passed]
            .into_iter()
            .collect();
        let total: ResultStats = vec![a, b].into_iter().sum();
        assert_eq!(total.passed, 2);
        assert_eq!(total.failed, 1);
        assert_eq!(total, a + b);
    }

    #[test]
    fn test_summary_text() {
        assert_eq!(ResultStats::new().summary_text(), "0 passed");

        let stats: ResultStats = [
            TestCaseResult::Failed,
            TestCaseResult::Passed,
            TestCaseResult::Passed,
            TestCaseResult::Cancelled,
        ]
        .into_iter()
        .collect();
        assert_eq!(stats.summary_text(), "1 failed, 2 passed, 1 skipped");
        assert_eq!(stats.title(), "Tests Failed");
    }
}
