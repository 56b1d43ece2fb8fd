//! The in-memory result tree.
//!
//! ```text
//! ResultsTree                      per-device TestSuiteResult
//! ├── SuiteNode "com.example.FooTest"
//! │   ├── TestCaseRow "testA"     { device id -> TestCase }
//! │   └── TestCaseRow "testB"     { device id -> TestCase }
//! └── SuiteNode "com.example.BarTest"
//!     └── TestCaseRow "testC"     { device id -> TestCase }
//! ```
//!
//! Every node implements [`TestResults`], so durations, stats and the
//! per-device result can be asked of any level. Aggregates are computed on
//! demand from the leaves; nothing is cached.
//!
//! Children are kept in insertion order, which is the order the exporter
//! walks them in.

use std::time::Duration;

use indexmap::IndexMap;

use crate::model::{Device, TestCase, TestCaseResult, TestSuiteResult};
use crate::stats::ResultStats;

/// Queries every node of the result tree answers.
pub trait TestResults {
    /// Sum of the durations of all cases below this node, on all devices.
    fn total_duration(&self) -> Duration;

    /// Stats over all devices.
    fn result_stats(&self) -> ResultStats;

    /// Stats restricted to one device.
    fn result_stats_for(&self, device: &Device) -> ResultStats;

    /// Time spent on `device`, or `None` if nothing below this node ran there.
    fn duration(&self, device: &Device) -> Option<Duration>;

    /// Result on `device`, or `None` if nothing below this node ran there.
    fn test_case_result(&self, device: &Device) -> Option<TestCaseResult>;
}

/// One test method, holding its result on every device it ran on.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCaseRow {
    package_name: String,
    class_name: String,
    method_name: String,
    cases: IndexMap<String, TestCase>,
}

impl TestCaseRow {
    fn new(case: &TestCase) -> Self {
        Self {
            package_name: case.package_name.clone(),
            class_name: case.class_name.clone(),
            method_name: case.method_name.clone(),
            cases: IndexMap::new(),
        }
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// The execution of this method on `device`.
    pub fn test_case(&self, device: &Device) -> Option<&TestCase> {
        self.cases.get(device.id())
    }

    /// All executions, keyed by device id.
    pub fn test_cases(&self) -> impl Iterator<Item = (&str, &TestCase)> {
        self.cases.iter().map(|(id, case)| (id.as_str(), case))
    }
}

impl TestResults for TestCaseRow {
    fn total_duration(&self) -> Duration {
        self.cases.values().filter_map(TestCase::duration).sum()
    }

    fn result_stats(&self) -> ResultStats {
        self.cases
            .values()
            .fold(ResultStats::new(), |acc, case| acc.add_result(Some(case.result)))
    }

    fn result_stats_for(&self, device: &Device) -> ResultStats {
        ResultStats::new().add_result(self.test_case_result(device))
    }

    fn duration(&self, device: &Device) -> Option<Duration> {
        self.test_case(device).and_then(TestCase::duration)
    }

    fn test_case_result(&self, device: &Device) -> Option<TestCaseResult> {
        self.test_case(device).map(|case| case.result)
    }
}

/// All methods of one test class.
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteNode {
    package_name: String,
    class_name: String,
    rows: IndexMap<String, TestCaseRow>,
}

impl SuiteNode {
    fn new(case: &TestCase) -> Self {
        Self {
            package_name: case.package_name.clone(),
            class_name: case.class_name.clone(),
            rows: IndexMap::new(),
        }
    }

    /// Fully qualified class name.
    pub fn name(&self) -> String {
        if self.package_name.is_empty() {
            self.class_name.clone()
        } else {
            format!("{}.{}", self.package_name, self.class_name)
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &TestCaseRow> {
        self.rows.values()
    }
}

impl TestResults for SuiteNode {
    fn total_duration(&self) -> Duration {
        self.rows().map(TestResults::total_duration).sum()
    }

    fn result_stats(&self) -> ResultStats {
        self.rows().map(TestResults::result_stats).sum()
    }

    fn result_stats_for(&self, device: &Device) -> ResultStats {
        self.rows().map(|row| row.result_stats_for(device)).sum()
    }

    fn duration(&self, device: &Device) -> Option<Duration> {
        sum_durations(self.rows().map(|row| row.duration(device)))
    }

    fn test_case_result(&self, device: &Device) -> Option<TestCaseResult> {
        self.result_stats_for(device).summary_result()
    }
}

/// Root of the result tree.
///
/// Populate it with [`add_test_case`](Self::add_test_case) as results
/// arrive and [`set_suite_result`](Self::set_suite_result) when a device
/// finishes. The exporter only reads it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsTree {
    suites: IndexMap<String, SuiteNode>,
    suite_results: IndexMap<String, TestSuiteResult>,
}

impl ResultsTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `case` as the execution of its method on `device`.
    ///
    /// The suite and row are created on first sight. Recording the same
    /// method twice for a device replaces the earlier execution.
    pub fn add_test_case(&mut self, device: &Device, case: TestCase) {
        let suite = self
            .suites
            .entry(case.full_class_name())
            .or_insert_with(|| SuiteNode::new(&case));
        let row = suite
            .rows
            .entry(case.method_name.clone())
            .or_insert_with(|| TestCaseRow::new(&case));
        row.cases.insert(device.id().to_string(), case);
    }

    /// Records (or clears) the final suite outcome reported for `device`.
    pub fn set_suite_result(&mut self, device: &Device, result: Option<TestSuiteResult>) {
        match result {
            Some(result) => {
                self.suite_results.insert(device.id().to_string(), result);
            }
            None => {
                self.suite_results.shift_remove(device.id());
            }
        }
    }

    /// Suite outcome for `device`.
    ///
    /// The recorded outcome wins; otherwise it is derived from the device's
    /// aggregate result, which yields `None` while the device has no
    /// concluded cases.
    pub fn suite_result(&self, device: &Device) -> Option<TestSuiteResult> {
        if let Some(result) = self.suite_results.get(device.id()) {
            return Some(*result);
        }
        self.test_case_result(device)
            .and_then(TestSuiteResult::from_test_case_result)
    }

    pub fn suites(&self) -> impl Iterator<Item = &SuiteNode> {
        self.suites.values()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }

    /// Cases that ran on `device`, in tree order.
    pub fn test_cases<'a>(&'a self, device: &'a Device) -> impl Iterator<Item = &'a TestCase> + 'a {
        self.suites()
            .flat_map(|suite| suite.rows())
            .filter_map(move |row| row.test_case(device))
    }

    /// First case (with its device id) that has not concluded.
    ///
    /// The exporter does not reject such trees; callers that want a strict
    /// precondition check can use this before exporting.
    pub fn first_non_terminal(&self) -> Option<(&str, &TestCase)> {
        self.suites()
            .flat_map(|suite| suite.rows())
            .flat_map(|row| row.test_cases())
            .find(|(_, case)| !case.result.is_terminal())
    }
}

impl TestResults for ResultsTree {
    fn total_duration(&self) -> Duration {
        self.suites().map(TestResults::total_duration).sum()
    }

    fn result_stats(&self) -> ResultStats {
        self.suites().map(TestResults::result_stats).sum()
    }

    fn result_stats_for(&self, device: &Device) -> ResultStats {
        self.suites().map(|suite| suite.result_stats_for(device)).sum()
    }

    fn duration(&self, device: &Device) -> Option<Duration> {
        sum_durations(self.suites().map(|suite| suite.duration(device)))
    }

    fn test_case_result(&self, device: &Device) -> Option<TestCaseResult> {
        match self.suite_results.get(device.id()) {
            Some(result) => Some(result.to_test_case_result()),
            None => self.result_stats_for(device).summary_result(),
        }
    }
}

/// Sums the present durations; `None` if none is present.
fn sum_durations(durations: impl Iterator<Item = Option<Duration>>) -> Option<Duration> {
    durations.flatten().fold(None, |acc, d| Some(acc.unwrap_or_default() + d))
}
