//! Value objects shared by the exporter, the importer and the result tree.
//!
//! Everything here is plain data: devices, test cases and test suites as
//! reported by an instrumented test run. None of these types know about XML;
//! the wire names they carry (`as_str`/`FromStr`) are the enum names used in
//! the `androidTestMatrix` section.
//!
//! # Example
//!
//! ```
//! use testmatrix::model::{Device, DeviceType, TestCase, TestCaseResult};
//!
//! let device = Device::new("emulator-5554", "Pixel 6", DeviceType::LocalEmulator, 33)
//!     .with_additional_info("processor", "x86_64");
//!
//! let case = TestCase::new("com.example", "FooTest", "testA")
//!     .with_result(TestCaseResult::Passed)
//!     .with_timestamps(1_000, Some(1_120));
//!
//! assert_eq!(case.full_name(), "com.example.FooTest.testA");
//! assert_eq!(device.additional_info().len(), 1);
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Error returned when parsing one of the enums in this module from its
/// wire name fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// The kind of target a test run executed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceType {
    /// An emulator started on the local machine.
    LocalEmulator,
    /// A physical device connected to the local machine.
    LocalPhysicalDevice,
    /// An emulator managed by the build system.
    LocalGradleManagedEmulator,
}

impl DeviceType {
    /// Returns the wire name of this device type.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::LocalEmulator => "LOCAL_EMULATOR",
            DeviceType::LocalPhysicalDevice => "LOCAL_PHYSICAL_DEVICE",
            DeviceType::LocalGradleManagedEmulator => "LOCAL_GRADLE_MANAGED_EMULATOR",
        }
    }
}

impl FromStr for DeviceType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOCAL_EMULATOR" => Ok(DeviceType::LocalEmulator),
            "LOCAL_PHYSICAL_DEVICE" => Ok(DeviceType::LocalPhysicalDevice),
            "LOCAL_GRADLE_MANAGED_EMULATOR" => Ok(DeviceType::LocalGradleManagedEmulator),
            other => Err(ParseEnumError::new("device type", other)),
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A physical or virtual execution target.
///
/// Devices are created once per run and never change afterwards; the
/// builder methods consume `self` so a finished `Device` is effectively
/// immutable.
///
/// The `additional_info` map keeps insertion order, which is also the order
/// in which the exporter writes `additionalInfo` elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    id: String,
    name: String,
    device_type: DeviceType,
    version: u32,
    #[serde(default)]
    additional_info: IndexMap<String, String>,
}

impl Device {
    /// Creates a device.
    ///
    /// # Arguments
    ///
    /// * `id` - Opaque identifier, unique within a run (e.g. an adb serial)
    /// * `name` - Human-readable name
    /// * `device_type` - Kind of target
    /// * `version` - Platform API level
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        device_type: DeviceType,
        version: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            device_type,
            version,
            additional_info: IndexMap::new(),
        }
    }

    /// Adds an entry to the additional info map.
    ///
    /// Re-inserting an existing key replaces its value but keeps the
    /// key's original position.
    pub fn with_additional_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_info.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    /// Platform API level.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn additional_info(&self) -> &IndexMap<String, String> {
        &self.additional_info
    }

    pub(crate) fn insert_additional_info(&mut self, key: String, value: String) {
        self.additional_info.insert(key, value);
    }
}

/// Status of a single test case on a single device.
///
/// Only [`Passed`](Self::Passed), [`Failed`](Self::Failed),
/// [`Skipped`](Self::Skipped) and [`Cancelled`](Self::Cancelled) are
/// terminal. A completed export must not contain the other two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestCaseResult {
    Passed,
    Failed,
    Skipped,
    Cancelled,
    Scheduled,
    InProgress,
}

impl TestCaseResult {
    /// All variants, in declaration order.
    pub const ALL: [TestCaseResult; 6] = [
        TestCaseResult::Passed,
        TestCaseResult::Failed,
        TestCaseResult::Skipped,
        TestCaseResult::Cancelled,
        TestCaseResult::Scheduled,
        TestCaseResult::InProgress,
    ];

    /// Returns true if the test case has concluded.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TestCaseResult::Passed
                | TestCaseResult::Failed
                | TestCaseResult::Skipped
                | TestCaseResult::Cancelled
        )
    }

    /// Returns the enum name (`"PASSED"`, `"IN_PROGRESS"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            TestCaseResult::Passed => "PASSED",
            TestCaseResult::Failed => "FAILED",
            TestCaseResult::Skipped => "SKIPPED",
            TestCaseResult::Cancelled => "CANCELLED",
            TestCaseResult::Scheduled => "SCHEDULED",
            TestCaseResult::InProgress => "IN_PROGRESS",
        }
    }
}

impl FromStr for TestCaseResult {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TestCaseResult::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("test case result", s))
    }
}

impl fmt::Display for TestCaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall outcome of one device's test suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestSuiteResult {
    Passed,
    Failed,
    /// The instrumentation process died before the suite completed.
    Aborted,
    Cancelled,
}

impl TestSuiteResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestSuiteResult::Passed => "PASSED",
            TestSuiteResult::Failed => "FAILED",
            TestSuiteResult::Aborted => "ABORTED",
            TestSuiteResult::Cancelled => "CANCELLED",
        }
    }

    /// Converts a suite outcome to the case result shown at the root of the
    /// tree. Aborted suites are presented as cancelled.
    pub fn to_test_case_result(self) -> TestCaseResult {
        match self {
            TestSuiteResult::Passed => TestCaseResult::Passed,
            TestSuiteResult::Failed => TestCaseResult::Failed,
            TestSuiteResult::Aborted | TestSuiteResult::Cancelled => TestCaseResult::Cancelled,
        }
    }

    /// Derives a suite outcome from a terminal aggregate case result.
    ///
    /// Returns `None` for results that have not concluded.
    pub fn from_test_case_result(result: TestCaseResult) -> Option<Self> {
        match result {
            TestCaseResult::Failed => Some(TestSuiteResult::Failed),
            TestCaseResult::Cancelled => Some(TestSuiteResult::Cancelled),
            TestCaseResult::Passed | TestCaseResult::Skipped => Some(TestSuiteResult::Passed),
            TestCaseResult::Scheduled | TestCaseResult::InProgress => None,
        }
    }
}

impl FromStr for TestSuiteResult {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASSED" => Ok(TestSuiteResult::Passed),
            "FAILED" => Ok(TestSuiteResult::Failed),
            "ABORTED" => Ok(TestSuiteResult::Aborted),
            "CANCELLED" => Ok(TestSuiteResult::Cancelled),
            other => Err(ParseEnumError::new("test suite result", other)),
        }
    }
}

impl fmt::Display for TestSuiteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution of a test method on one device.
///
/// Text fields use the empty string for "not available".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub package_name: String,
    pub class_name: String,
    pub method_name: String,
    pub result: TestCaseResult,
    pub start_timestamp_millis: Option<i64>,
    pub end_timestamp_millis: Option<i64>,
    #[serde(default)]
    pub logcat: String,
    #[serde(default)]
    pub error_stack_trace: String,
    #[serde(default)]
    pub benchmark: String,
}

impl TestCase {
    /// Creates a scheduled test case whose id is its full name.
    pub fn new(
        package_name: impl Into<String>,
        class_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> Self {
        let mut case = Self {
            id: String::new(),
            package_name: package_name.into(),
            class_name: class_name.into(),
            method_name: method_name.into(),
            result: TestCaseResult::Scheduled,
            start_timestamp_millis: None,
            end_timestamp_millis: None,
            logcat: String::new(),
            error_stack_trace: String::new(),
            benchmark: String::new(),
        };
        case.id = case.full_name();
        case
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_result(mut self, result: TestCaseResult) -> Self {
        self.result = result;
        self
    }

    /// Sets start and (optional) end timestamps in milliseconds since epoch.
    pub fn with_timestamps(mut self, start: i64, end: Option<i64>) -> Self {
        self.start_timestamp_millis = Some(start);
        self.end_timestamp_millis = end;
        self
    }

    pub fn with_logcat(mut self, logcat: impl Into<String>) -> Self {
        self.logcat = logcat.into();
        self
    }

    pub fn with_error_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.error_stack_trace = trace.into();
        self
    }

    pub fn with_benchmark(mut self, benchmark: impl Into<String>) -> Self {
        self.benchmark = benchmark.into();
        self
    }

    /// Returns `package.Class.method`, skipping empty components.
    pub fn full_name(&self) -> String {
        [
            self.package_name.as_str(),
            self.class_name.as_str(),
            self.method_name.as_str(),
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(".")
    }

    /// Returns `package.Class`, the name of the suite this case belongs to.
    pub fn full_class_name(&self) -> String {
        if self.package_name.is_empty() {
            self.class_name.clone()
        } else {
            format!("{}.{}", self.package_name, self.class_name)
        }
    }

    /// Wall-clock duration of this case.
    ///
    /// `None` if the case never started. A case without an end timestamp
    /// is still running and is measured up to now.
    pub fn duration(&self) -> Option<Duration> {
        let start = self.start_timestamp_millis?;
        let end = self
            .end_timestamp_millis
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
        let millis = end.saturating_sub(start).max(0);
        Some(Duration::from_millis(u64::try_from(millis).unwrap_or_default()))
    }
}

/// A device's test suite as announced to listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSuite {
    pub id: String,
    pub name: String,
    pub test_case_count: usize,
    pub result: Option<TestSuiteResult>,
}

impl TestSuite {
    pub fn new(id: impl Into<String>, name: impl Into<String>, test_case_count: usize) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            test_case_count,
            result: None,
        }
    }

    pub fn with_result(mut self, result: TestSuiteResult) -> Self {
        self.result = Some(result);
        self
    }
}
