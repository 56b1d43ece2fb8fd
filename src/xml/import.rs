//! Replay of exported `testrun` documents.
//!
//! Only the `androidTestMatrix` section is read. Its elements are fed, in
//! document order, through a [`ReplayStateMachine`] that turns them into
//! [`TestResultListener`] notifications, so a consumer cannot tell a replayed
//! run from a live one (except that every case starts and finishes at once).
//!
//! Import happens in two passes over the source:
//!
//! 1. [`XmlImporter::is_test_matrix`] reads just far enough to see whether
//!    the root element has an `androidTestMatrix` child. Documents without
//!    one are not ours and are rejected without touching the listener.
//! 2. [`XmlImporter::import`] then spawns the replay on the tokio runtime
//!    and hands back a [`ReplayHandle`].

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tokio::io::{AsyncBufRead, BufReader};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{attr, parse_status_label, tag};
use crate::listener::TestResultListener;
use crate::model::{Device, DeviceType, TestCase, TestSuite, TestSuiteResult};

/// Errors that can occur while importing.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The source could not be opened or read.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The document is not well-formed XML.
    #[error("Malformed XML: {0}")]
    Xml(quick_xml::Error),

    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("<{element}> has invalid {attribute}={value:?}")]
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },

    /// A `testsuite` refers to a device that was not described before it.
    #[error("Test suite refers to undeclared device '{0}'")]
    UndeclaredDevice(String),

    #[error("Device '{0}' is declared more than once")]
    DuplicateDevice(String),

    #[error("Unexpected <{element}> while {state}")]
    UnexpectedElement { element: String, state: &'static str },

    /// The document ended inside `androidTestMatrix`.
    #[error("Document ends before androidTestMatrix is closed")]
    Truncated,

    /// The replay task panicked or was aborted.
    #[error("Replay task failed: {0}")]
    Join(#[from] JoinError),
}

impl ImportError {
    /// Returns true for errors caused by the content of the document, as
    /// opposed to I/O or task failures.
    pub fn is_format_error(&self) -> bool {
        !matches!(self, ImportError::Io(_) | ImportError::Join(_))
    }
}

impl From<quick_xml::Error> for ImportError {
    fn from(err: quick_xml::Error) -> Self {
        match err {
            quick_xml::Error::Io(err) => {
                ImportError::Io(io::Error::new(err.kind(), err.to_string()))
            }
            other => ImportError::Xml(other),
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for ImportError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        ImportError::Xml(err.into())
    }
}

/// Where a document is read from.
///
/// A source can be opened any number of times; the importer opens it once to
/// sniff the format and once more for the replay.
#[derive(Debug, Clone)]
pub enum XmlSource {
    File(PathBuf),
    Bytes(Arc<[u8]>),
}

type SourceReader = Reader<Box<dyn AsyncBufRead + Unpin + Send>>;

impl XmlSource {
    async fn open(&self) -> Result<SourceReader, ImportError> {
        let inner: Box<dyn AsyncBufRead + Unpin + Send> = match self {
            XmlSource::File(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
            XmlSource::Bytes(bytes) => Box::new(io::Cursor::new(Arc::clone(bytes))),
        };
        let mut reader = Reader::from_reader(inner);
        let config = reader.config_mut();
        config.trim_text(true);
        config.expand_empty_elements = true;
        Ok(reader)
    }
}

impl From<PathBuf> for XmlSource {
    fn from(path: PathBuf) -> Self {
        XmlSource::File(path)
    }
}

impl From<Vec<u8>> for XmlSource {
    fn from(bytes: Vec<u8>) -> Self {
        XmlSource::Bytes(bytes.into())
    }
}

impl From<String> for XmlSource {
    fn from(text: String) -> Self {
        XmlSource::Bytes(text.into_bytes().into())
    }
}

impl fmt::Display for XmlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XmlSource::File(path) => write!(f, "{}", path.display()),
            XmlSource::Bytes(bytes) => write!(f, "<{} bytes in memory>", bytes.len()),
        }
    }
}

/// Counters for a finished (or cancelled) replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub devices: usize,
    pub suites: usize,
    pub test_cases: usize,
    /// The replay was stopped through [`ReplayHandle::cancel`].
    pub cancelled: bool,
}

/// A replay running in the background.
#[derive(Debug)]
pub struct ReplayHandle {
    task: JoinHandle<Result<ReplaySummary, ImportError>>,
    cancellation_token: CancellationToken,
}

impl ReplayHandle {
    /// Asks the replay to stop before the next `testcase`.
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the replay to end.
    pub async fn join(self) -> Result<ReplaySummary, ImportError> {
        self.task.await?
    }
}

/// Imports a `testrun` document into a [`TestResultListener`].
pub struct XmlImporter {
    source: XmlSource,
    cancellation_token: CancellationToken,
}

impl XmlImporter {
    pub fn new(source: impl Into<XmlSource>) -> Self {
        Self {
            source: source.into(),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Uses `token` to stop the replay; [`ReplayHandle::cancel`] cancels
    /// the same token.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Returns true if the root element has an `androidTestMatrix` child.
    ///
    /// Stops reading at that child, so only a prefix of a valid document is
    /// ever checked here.
    pub async fn is_test_matrix(&self) -> Result<bool, ImportError> {
        let mut reader = self.source.open().await?;
        let mut buf = Vec::new();
        let mut depth = 0usize;
        loop {
            match reader.read_event_into_async(&mut buf).await? {
                Event::Start(start) => {
                    depth += 1;
                    if depth == 2 && start.name().as_ref() == tag::ANDROID_TEST_MATRIX.as_bytes() {
                        return Ok(true);
                    }
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(false);
                    }
                }
                Event::Eof => return Ok(false),
                _ => {}
            }
            buf.clear();
        }
    }

    /// Starts replaying the document into `listener`.
    ///
    /// Returns `Ok(None)` without calling the listener if the document has no
    /// `androidTestMatrix`. Otherwise the replay runs on a spawned task and
    /// this returns as soon as it is scheduled; errors found during the
    /// replay are reported through [`ReplayHandle::join`]. Notifications
    /// delivered before an error are not taken back. The listener's
    /// `on_run_finished` is called once the replay stops, however it stops.
    pub async fn import(
        self,
        listener: Arc<dyn TestResultListener>,
    ) -> Result<Option<ReplayHandle>, ImportError> {
        if !self.is_test_matrix().await? {
            debug!("{} has no androidTestMatrix, not importing", self.source);
            return Ok(None);
        }

        let XmlImporter {
            source,
            cancellation_token,
        } = self;
        let token = cancellation_token.clone();
        let task = tokio::spawn(async move {
            info!("Replaying test results from {}", source);
            let result = replay(&source, listener.clone(), token).await;
            listener.on_run_finished().await;
            match &result {
                Ok(summary) => info!(
                    "Replayed {} test cases from {} devices{}",
                    summary.test_cases,
                    summary.devices,
                    if summary.cancelled { " (cancelled)" } else { "" }
                ),
                Err(e) => error!("Failed to replay {}: {}", source, e),
            }
            result
        });

        Ok(Some(ReplayHandle {
            task,
            cancellation_token,
        }))
    }
}

async fn replay(
    source: &XmlSource,
    listener: Arc<dyn TestResultListener>,
    token: CancellationToken,
) -> Result<ReplaySummary, ImportError> {
    let mut reader = source.open().await?;
    let mut machine = ReplayStateMachine::new(listener, token);
    let mut buf = Vec::new();
    loop {
        let flow = match reader.read_event_into_async(&mut buf).await? {
            Event::Start(start) => {
                let name = element_name(&start);
                let attributes = Attributes::from_start(&start)?;
                machine.start_element(&name, attributes).await?
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                machine.end_element(&name).await?;
                ControlFlow::Continue(())
            }
            Event::Eof => break,
            _ => ControlFlow::Continue(()),
        };
        if flow.is_break() {
            return Ok(machine.cancelled());
        }
        buf.clear();
    }
    machine.finish()
}

fn element_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

/// The attributes of one element, unescaped.
#[derive(Debug, Default)]
pub(crate) struct Attributes {
    element: &'static str,
    values: HashMap<String, String>,
}

impl Attributes {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, ImportError> {
        let mut values = HashMap::new();
        for attribute in start.attributes() {
            let attribute = attribute?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value()?.into_owned();
            values.insert(key, value);
        }
        Ok(Self { element: "", values })
    }

    /// Names the element in error messages.
    fn on(mut self, element: &'static str) -> Self {
        self.element = element;
        self
    }

    fn required(&self, attribute: &'static str) -> Result<String, ImportError> {
        self.values
            .get(attribute)
            .cloned()
            .ok_or(ImportError::MissingAttribute {
                element: self.element,
                attribute,
            })
    }

    /// Missing attributes read as the empty string.
    fn optional(&self, attribute: &str) -> String {
        self.values.get(attribute).cloned().unwrap_or_default()
    }

    fn parse<T: std::str::FromStr>(&self, attribute: &'static str) -> Result<T, ImportError> {
        let value = self.required(attribute)?;
        self.parse_value(attribute, value)
    }

    fn parse_optional<T: std::str::FromStr>(
        &self,
        attribute: &'static str,
    ) -> Result<Option<T>, ImportError> {
        match self.values.get(attribute) {
            Some(value) if !value.trim().is_empty() => {
                self.parse_value(attribute, value.clone()).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn parse_value<T: std::str::FromStr>(
        &self,
        attribute: &'static str,
        value: String,
    ) -> Result<T, ImportError> {
        value.trim().parse().map_err(|_| ImportError::InvalidAttribute {
            element: self.element,
            attribute,
            value,
        })
    }
}

/// Where the replay is in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayState {
    /// Outside `androidTestMatrix`.
    Idle,
    /// Inside `androidTestMatrix`, between its children.
    InMatrix,
    /// Inside a `device` element.
    InDevice { device_id: String },
    /// Inside a `testsuite` element.
    InSuite { device_id: String, suite: TestSuite },
}

impl ReplayState {
    fn describe(&self) -> &'static str {
        match self {
            ReplayState::Idle => "outside androidTestMatrix",
            ReplayState::InMatrix => "in androidTestMatrix",
            ReplayState::InDevice { .. } => "in device",
            ReplayState::InSuite { .. } => "in testsuite",
        }
    }
}

/// Turns the element events of an `androidTestMatrix` section into listener
/// notifications.
///
/// Feed it `start_element`/`end_element` in document order and call
/// [`finish`](Self::finish) at end of input. Elements outside the matrix are
/// ignored.
///
/// `device` and `testsuite` only open directly inside `androidTestMatrix`.
/// A `device` that starts inside another `device` or a `testsuite`, or a
/// `testsuite` that starts inside a `device`, is an
/// [`ImportError::UnexpectedElement`] instead of a transition, since the
/// open element would never be closed out.
pub struct ReplayStateMachine {
    state: ReplayState,
    devices: IndexMap<String, Device>,
    listener: Arc<dyn TestResultListener>,
    cancellation_token: CancellationToken,
    summary: ReplaySummary,
}

impl ReplayStateMachine {
    pub fn new(listener: Arc<dyn TestResultListener>, cancellation_token: CancellationToken) -> Self {
        Self {
            state: ReplayState::Idle,
            devices: IndexMap::new(),
            listener,
            cancellation_token,
            summary: ReplaySummary::default(),
        }
    }

    pub fn state(&self) -> &ReplayState {
        &self.state
    }

    /// Devices described so far, in document order.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// Handles an element start. Returns `Break` if the replay was
    /// cancelled and should stop here.
    pub(crate) async fn start_element(
        &mut self,
        name: &str,
        attributes: Attributes,
    ) -> Result<ControlFlow<()>, ImportError> {
        let state = std::mem::replace(&mut self.state, ReplayState::Idle);
        let (next, flow) = match (state, name) {
            (ReplayState::Idle, tag::ANDROID_TEST_MATRIX) => {
                let attributes = attributes.on(tag::ANDROID_TEST_MATRIX);
                if let Some(millis) = attributes.parse_optional::<u64>(attr::EXECUTION_DURATION)? {
                    self.listener
                        .set_execution_duration(Duration::from_millis(millis))
                        .await;
                }
                debug!("Entering androidTestMatrix");
                (ReplayState::InMatrix, ControlFlow::Continue(()))
            }
            (ReplayState::Idle, other) => {
                debug!("Ignoring <{}> outside androidTestMatrix", other);
                (ReplayState::Idle, ControlFlow::Continue(()))
            }
            (ReplayState::InMatrix, tag::DEVICE) => {
                let device = parse_device(attributes.on(tag::DEVICE))?;
                let device_id = device.id().to_string();
                if self.devices.contains_key(&device_id) {
                    return Err(ImportError::DuplicateDevice(device_id));
                }
                debug!("Registered device {}", device_id);
                self.devices.insert(device_id.clone(), device);
                (ReplayState::InDevice { device_id }, ControlFlow::Continue(()))
            }
            (ReplayState::InDevice { device_id }, tag::ADDITIONAL_INFO) => {
                let attributes = attributes.on(tag::ADDITIONAL_INFO);
                let key = attributes.required(attr::KEY)?;
                let value = attributes.optional(attr::VALUE);
                if let Some(device) = self.devices.get_mut(&device_id) {
                    device.insert_additional_info(key, value);
                }
                (ReplayState::InDevice { device_id }, ControlFlow::Continue(()))
            }
            (ReplayState::InMatrix, tag::TEST_SUITE) => {
                let attributes = attributes.on(tag::TEST_SUITE);
                let device_id = attributes.required(attr::DEVICE_ID)?;
                let device = self
                    .devices
                    .get(&device_id)
                    .ok_or_else(|| ImportError::UndeclaredDevice(device_id.clone()))?;
                let test_count = attributes.parse::<usize>(attr::TEST_COUNT)?;
                let mut suite = TestSuite::new(device.id(), device.name(), test_count);
                suite.result = attributes.parse_optional::<TestSuiteResult>(attr::RESULT)?;

                debug!("Starting suite of {} test cases on {}", test_count, device_id);
                self.listener.on_test_suite_started(device, &suite).await;
                self.summary.suites += 1;
                (
                    ReplayState::InSuite { device_id, suite },
                    ControlFlow::Continue(()),
                )
            }
            (ReplayState::InSuite { device_id, suite }, tag::TEST_CASE) => {
                if self.cancellation_token.is_cancelled() {
                    debug!("Replay cancelled before a test case on {}", device_id);
                    (
                        ReplayState::InSuite { device_id, suite },
                        ControlFlow::Break(()),
                    )
                } else {
                    let case = parse_test_case(attributes.on(tag::TEST_CASE))?;
                    let device = self
                        .devices
                        .get(&device_id)
                        .ok_or_else(|| ImportError::UndeclaredDevice(device_id.clone()))?;
                    self.listener.on_test_case_started(device, &suite, &case).await;
                    self.listener.on_test_case_finished(device, &suite, &case).await;
                    self.summary.test_cases += 1;
                    (
                        ReplayState::InSuite { device_id, suite },
                        ControlFlow::Continue(()),
                    )
                }
            }
            (
                state,
                element @ (tag::ANDROID_TEST_MATRIX
                | tag::DEVICE
                | tag::ADDITIONAL_INFO
                | tag::TEST_SUITE
                | tag::TEST_CASE),
            ) => {
                return Err(ImportError::UnexpectedElement {
                    element: element.to_string(),
                    state: state.describe(),
                });
            }
            (state, other) => {
                debug!("Ignoring unknown element <{}> {}", other, state.describe());
                (state, ControlFlow::Continue(()))
            }
        };
        self.state = next;
        Ok(flow)
    }

    /// Handles an element end.
    pub(crate) async fn end_element(&mut self, name: &str) -> Result<(), ImportError> {
        let state = std::mem::replace(&mut self.state, ReplayState::Idle);
        self.state = match (state, name) {
            (ReplayState::InDevice { device_id }, tag::DEVICE) => {
                if let Some(device) = self.devices.get(&device_id) {
                    debug!("Device {} described, scheduling its suite", device_id);
                    self.listener.on_test_suite_scheduled(device).await;
                    self.summary.devices += 1;
                }
                ReplayState::InMatrix
            }
            (ReplayState::InSuite { device_id, suite }, tag::TEST_SUITE) => {
                if let Some(device) = self.devices.get(&device_id) {
                    self.listener.on_test_suite_finished(device, &suite).await;
                }
                ReplayState::InMatrix
            }
            (ReplayState::InMatrix, tag::ANDROID_TEST_MATRIX) => {
                debug!("Leaving androidTestMatrix");
                ReplayState::Idle
            }
            // Leaves with no end transition.
            (state @ ReplayState::InDevice { .. }, tag::ADDITIONAL_INFO)
            | (state @ ReplayState::InSuite { .. }, tag::TEST_CASE) => state,
            (ReplayState::Idle, _) => ReplayState::Idle,
            (
                state,
                element @ (tag::ANDROID_TEST_MATRIX
                | tag::DEVICE
                | tag::ADDITIONAL_INFO
                | tag::TEST_SUITE
                | tag::TEST_CASE),
            ) => {
                return Err(ImportError::UnexpectedElement {
                    element: format!("/{element}"),
                    state: state.describe(),
                });
            }
            (state, _) => state,
        };
        Ok(())
    }

    /// Ends the replay at end of input.
    pub fn finish(self) -> Result<ReplaySummary, ImportError> {
        match self.state {
            ReplayState::Idle => Ok(self.summary),
            _ => Err(ImportError::Truncated),
        }
    }

    fn cancelled(self) -> ReplaySummary {
        ReplaySummary {
            cancelled: true,
            ..self.summary
        }
    }
}

fn parse_device(attributes: Attributes) -> Result<Device, ImportError> {
    Ok(Device::new(
        attributes.required(attr::ID)?,
        attributes.required(attr::DEVICE_NAME)?,
        attributes.parse::<DeviceType>(attr::DEVICE_TYPE)?,
        attributes.parse::<u32>(attr::VERSION)?,
    ))
}

fn parse_test_case(attributes: Attributes) -> Result<TestCase, ImportError> {
    let label = attributes.required(attr::RESULT)?;
    let result = parse_status_label(&label).ok_or_else(|| ImportError::InvalidAttribute {
        element: tag::TEST_CASE,
        attribute: attr::RESULT,
        value: label,
    })?;

    let mut case = TestCase::new(
        attributes.required(attr::PACKAGE_NAME)?,
        attributes.required(attr::CLASS_NAME)?,
        attributes.required(attr::METHOD_NAME)?,
    )
    .with_id(attributes.required(attr::ID)?)
    .with_result(result)
    .with_logcat(attributes.optional(attr::LOGCAT))
    .with_error_stack_trace(attributes.optional(attr::ERROR_STACK_TRACE))
    .with_benchmark(attributes.optional(attr::BENCHMARK));
    case.start_timestamp_millis = attributes.parse_optional(attr::START_TIMESTAMP_MILLIS)?;
    case.end_timestamp_millis = attributes.parse_optional(attr::END_TIMESTAMP_MILLIS)?;
    Ok(case)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::ResultsTreeBuilder;
    use crate::model::TestCaseResult;
    use crate::tree::TestResults;

    const MATRIX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testrun duration="200" footerText="footer" name="app">
    <count name="total" value="2"/>
    <androidTestMatrix executionDuration="250">
        <device id="d1" deviceName="Pixel" deviceType="LOCAL_EMULATOR" version="33">
            <additionalInfo key="processor" value="x86_64"/>
        </device>
        <testsuite deviceId="d1" testCount="2" result="FAILED">
            <testcase id="p.C.a" methodName="a" className="C" packageName="p" result="passed" startTimestampMillis="0" endTimestampMillis="120"/>
            <testcase id="p.C.b" methodName="b" className="C" packageName="p" result="failed" errorStackTrace="boom &amp; bust"/>
        </testsuite>
    </androidTestMatrix>
</testrun>
"#;

    async fn run(xml: &str) -> (Result<ReplaySummary, ImportError>, Arc<ResultsTreeBuilder>) {
        let builder = Arc::new(ResultsTreeBuilder::new());
        let handle = XmlImporter::new(xml.to_string())
            .import(builder.clone())
            .await
            .unwrap()
            .expect("document has a matrix");
        (handle.join().await, builder)
    }

    #[tokio::test]
    async fn test_sniff() {
        assert!(XmlImporter::new(MATRIX.to_string()).is_test_matrix().await.unwrap());

        let junit = r#"<testsuites><testsuite name="x"><androidTestMatrix/></testsuite></testsuites>"#;
        assert!(!XmlImporter::new(junit.to_string()).is_test_matrix().await.unwrap());
    }

    #[tokio::test]
    async fn test_replay_builds_tree() {
        let (result, builder) = run(MATRIX).await;
        let summary = result.unwrap();
        assert_eq!(
            summary,
            ReplaySummary {
                devices: 1,
                suites: 1,
                test_cases: 2,
                cancelled: false
            }
        );

        let run = builder.snapshot().await;
        assert_eq!(run.execution_duration, Some(Duration::from_millis(250)));
        let device = &run.devices[0];
        assert_eq!(device.additional_info()["processor"], "x86_64");

        let stats = run.tree.result_stats_for(device);
        assert_eq!((stats.passed, stats.failed), (1, 1));
        let failed = run
            .tree
            .test_cases(device)
            .find(|case| case.method_name == "b")
            .unwrap();
        assert_eq!(failed.result, TestCaseResult::Failed);
        assert_eq!(failed.error_stack_trace, "boom & bust");
        assert_eq!(failed.start_timestamp_millis, None);
        assert_eq!(run.tree.suite_result(device), Some(TestSuiteResult::Failed));
    }

    #[tokio::test]
    async fn test_missing_attribute() {
        let xml = r#"<testrun><androidTestMatrix>
            <device id="d1" deviceName="Pixel" version="33"/>
        </androidTestMatrix></testrun>"#;
        let (result, _) = run(xml).await;
        assert!(matches!(
            result,
            Err(ImportError::MissingAttribute {
                element: "device",
                attribute: "deviceType"
            })
        ));
    }

    #[tokio::test]
    async fn test_invalid_result_label() {
        let xml = r#"<testrun><androidTestMatrix>
            <device id="d1" deviceName="Pixel" deviceType="LOCAL_EMULATOR" version="33"/>
            <testsuite deviceId="d1" testCount="1">
                <testcase id="x" methodName="m" className="C" packageName="p" result="IN_PROGRESS"/>
            </testsuite>
        </androidTestMatrix></testrun>"#;
        let (result, _) = run(xml).await;
        let err = result.unwrap_err();
        assert!(err.is_format_error());
        assert!(matches!(err, ImportError::InvalidAttribute { attribute: "result", .. }));
    }

    #[tokio::test]
    async fn test_testcase_outside_suite() {
        let xml = r#"<testrun><androidTestMatrix>
            <testcase id="x" methodName="m" className="C" packageName="p" result="passed"/>
        </androidTestMatrix></testrun>"#;
        let (result, _) = run(xml).await;
        assert!(matches!(
            result,
            Err(ImportError::UnexpectedElement { state: "in androidTestMatrix", .. })
        ));
    }

    #[tokio::test]
    async fn test_nested_device_and_suite_rejected() {
        let device_in_device = r#"<testrun><androidTestMatrix>
            <device id="d1" deviceName="Pixel" deviceType="LOCAL_EMULATOR" version="33">
                <device id="d2" deviceName="Nexus" deviceType="LOCAL_EMULATOR" version="30"/>
            </device>
        </androidTestMatrix></testrun>"#;
        let suite_in_device = r#"<testrun><androidTestMatrix>
            <device id="d1" deviceName="Pixel" deviceType="LOCAL_EMULATOR" version="33">
                <testsuite deviceId="d1" testCount="0"/>
            </device>
        </androidTestMatrix></testrun>"#;
        let device_in_suite = r#"<testrun><androidTestMatrix>
            <device id="d1" deviceName="Pixel" deviceType="LOCAL_EMULATOR" version="33"/>
            <testsuite deviceId="d1" testCount="0">
                <device id="d2" deviceName="Nexus" deviceType="LOCAL_EMULATOR" version="30"/>
            </testsuite>
        </androidTestMatrix></testrun>"#;

        for (xml, element, state) in [
            (device_in_device, "device", "in device"),
            (suite_in_device, "testsuite", "in device"),
            (device_in_suite, "device", "in testsuite"),
        ] {
            let (result, _) = run(xml).await;
            let err = result.unwrap_err();
            assert!(err.is_format_error());
            assert!(
                matches!(&err, ImportError::UnexpectedElement { element: e, state: s } if e == element && *s == state),
                "{err}"
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_elements_ignored() {
        let xml = r#"<testrun><androidTestMatrix>
            <extension kind="new"/>
            <device id="d1" deviceName="Pixel" deviceType="LOCAL_EMULATOR" version="33"/>
        </androidTestMatrix></testrun>"#;
        let (result, _) = run(xml).await;
        assert_eq!(result.unwrap().devices, 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let err = XmlImporter::new(PathBuf::from("/nonexistent/run.xml"))
            .is_test_matrix()
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Io(_)));
        assert!(!err.is_format_error());
    }
}
