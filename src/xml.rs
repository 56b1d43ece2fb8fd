//! XML export and replay of test results.
//!
//! The document has two halves. The first one (`count`, `config`, `suite`,
//! `test`, `output`) is the generic test-history vocabulary understood by
//! other tools; the second one, `androidTestMatrix`, is a flattened copy of
//! the per-device results that [`XmlImporter`] replays.
//!
//! ```xml
//! <testrun duration="200" footerText="Generated by testmatrix on 1/2/26, 3:04 PM" name="app">
//!     <count name="total" value="2"/>
//!     <count name="failed" value="1"/>
//!     <count name="passed" value="1"/>
//!     <config configId="AndroidTestRunConfigurationType" name="app"/>
//!     <suite name="com.example.FooTest" duration="200" status="failed">
//!         <test name="testB" duration="80" status="failed">
//!             <output type="stderr">java.lang.AssertionError</output>
//!         </test>
//!     </suite>
//!     <androidTestMatrix executionDuration="250">
//!         <device id="emulator-5554" deviceName="Pixel 6" deviceType="LOCAL_EMULATOR" version="33"/>
//!         <testsuite deviceId="emulator-5554" testCount="2" result="FAILED">
//!             <testcase id="..." methodName="testB" className="FooTest" packageName="com.example" result="failed" .../>
//!         </testsuite>
//!     </androidTestMatrix>
//! </testrun>
//! ```
//!
//! # Status vocabularies
//!
//! Two overlapping label sets are in use and are deliberately kept apart:
//!
//! | Per-test status ([`status_label`]) | | Summary count ([`CountLabel`]) | |
//! |---|---|---|---|
//! | `FAILED` | `failed` | failed cases | `failed` |
//! | `PASSED` | `passed` | passed cases | `passed` |
//! | `SKIPPED` | `ignored` | skipped cases | `ignored` |
//! | `CANCELLED`, `IN_PROGRESS`, `SCHEDULED` | `skipped` | cancelled cases | `skipped` |

pub mod export;
pub mod import;
pub mod sink;

pub use export::{ExportError, XmlExporter, footer_text};
pub use import::{ImportError, ReplayHandle, ReplaySummary, XmlImporter, XmlSource};
pub use sink::{ContentHandler, XmlSink};

use crate::model::TestCaseResult;
use crate::stats::ResultStats;

/// Element names.
pub mod tag {
    pub const TEST_RUN: &str = "testrun";
    pub const COUNT: &str = "count";
    pub const CONFIG: &str = "config";
    pub const SUITE: &str = "suite";
    pub const TEST: &str = "test";
    pub const OUTPUT: &str = "output";
    pub const ANDROID_TEST_MATRIX: &str = "androidTestMatrix";
    pub const DEVICE: &str = "device";
    pub const ADDITIONAL_INFO: &str = "additionalInfo";
    pub const TEST_SUITE: &str = "testsuite";
    pub const TEST_CASE: &str = "testcase";
}

/// Attribute names.
pub mod attr {
    pub const DURATION: &str = "duration";
    pub const FOOTER_TEXT: &str = "footerText";
    pub const NAME: &str = "name";
    pub const VALUE: &str = "value";
    pub const STATUS: &str = "status";
    pub const TYPE: &str = "type";
    pub const CONFIG_ID: &str = "configId";
    pub const EXECUTION_DURATION: &str = "executionDuration";
    pub const ID: &str = "id";
    pub const DEVICE_NAME: &str = "deviceName";
    pub const DEVICE_TYPE: &str = "deviceType";
    pub const VERSION: &str = "version";
    pub const KEY: &str = "key";
    pub const DEVICE_ID: &str = "deviceId";
    pub const TEST_COUNT: &str = "testCount";
    pub const RESULT: &str = "result";
    pub const METHOD_NAME: &str = "methodName";
    pub const CLASS_NAME: &str = "className";
    pub const PACKAGE_NAME: &str = "packageName";
    pub const LOGCAT: &str = "logcat";
    pub const ERROR_STACK_TRACE: &str = "errorStackTrace";
    pub const START_TIMESTAMP_MILLIS: &str = "startTimestampMillis";
    pub const END_TIMESTAMP_MILLIS: &str = "endTimestampMillis";
    pub const BENCHMARK: &str = "benchmark";
}

/// Values of the `type` attribute of `output` elements.
pub mod output_type {
    pub const STDOUT: &str = "stdout";
    pub const STDERR: &str = "stderr";
}

/// Per-test status label, used for `suite@status`, `test@status` and
/// `testcase@result`.
pub fn status_label(result: TestCaseResult) -> &'static str {
    match result {
        TestCaseResult::Failed => "failed",
        TestCaseResult::Passed => "passed",
        TestCaseResult::Skipped => "ignored",
        TestCaseResult::InProgress | TestCaseResult::Cancelled | TestCaseResult::Scheduled => {
            "skipped"
        }
    }
}

/// Reads a `testcase@result` value back.
///
/// `"skipped"` is written for both `CANCELLED` and `IN_PROGRESS`; since only
/// concluded cases are exported it always resolves to `CANCELLED`. Terminal
/// enum names (`"PASSED"`, ...) are accepted as well. Anything else,
/// including non-terminal enum names, yields `None`.
pub fn parse_status_label(label: &str) -> Option<TestCaseResult> {
    match label {
        "passed" => Some(TestCaseResult::Passed),
        "failed" => Some(TestCaseResult::Failed),
        "ignored" => Some(TestCaseResult::Skipped),
        "skipped" => Some(TestCaseResult::Cancelled),
        other => other
            .parse::<TestCaseResult>()
            .ok()
            .filter(TestCaseResult::is_terminal),
    }
}

/// Names of the summary `count` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountLabel {
    Total,
    Failed,
    /// Skipped cases.
    Ignored,
    /// Cancelled cases.
    Skipped,
    Passed,
}

impl CountLabel {
    /// Emission order.
    pub const ALL: [CountLabel; 5] = [
        CountLabel::Total,
        CountLabel::Failed,
        CountLabel::Ignored,
        CountLabel::Skipped,
        CountLabel::Passed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CountLabel::Total => "total",
            CountLabel::Failed => "failed",
            CountLabel::Ignored => "ignored",
            CountLabel::Skipped => "skipped",
            CountLabel::Passed => "passed",
        }
    }

    /// The stat this label reports.
    pub fn value(&self, stats: &ResultStats) -> usize {
        match self {
            CountLabel::Total => stats.total(),
            CountLabel::Failed => stats.failed,
            CountLabel::Ignored => stats.skipped,
            CountLabel::Skipped => stats.cancelled,
            CountLabel::Passed => stats.passed,
        }
    }

    /// Zero-valued counts are omitted, except `total`.
    pub fn is_written(&self, stats: &ResultStats) -> bool {
        *self == CountLabel::Total || self.value(stats) > 0
    }
}

/// Milliseconds as written in `duration`-like attributes.
pub(crate) fn millis(duration: std::time::Duration) -> String {
    duration.as_millis().to_string()
}
