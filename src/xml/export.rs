//! Streaming export of a [`ResultsTree`].
//!
//! The exporter walks the tree once, in a fixed order, and emits each
//! element as soon as its attributes are known. The output order is part of
//! the format: tools diff these files, so a reimplementation must not
//! reorder or "normalize" anything.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use testmatrix::model::{Device, DeviceType, TestCase, TestCaseResult};
//! use testmatrix::run_config::StaticRunConfiguration;
//! use testmatrix::tree::ResultsTree;
//! use testmatrix::xml::XmlExporter;
//!
//! let device = Device::new("emulator-5554", "Pixel 6", DeviceType::LocalEmulator, 33);
//! let mut tree = ResultsTree::new();
//! tree.add_test_case(
//!     &device,
//!     TestCase::new("com.example", "FooTest", "testA")
//!         .with_result(TestCaseResult::Passed)
//!         .with_timestamps(0, Some(120)),
//! );
//!
//! let devices = [device];
//! let run_configuration = StaticRunConfiguration::new("app");
//! let xml = XmlExporter::new(&tree, &devices, &run_configuration, Duration::from_millis(150))
//!     .export_to_string(4)?;
//! assert!(xml.contains(r#"<count name="total" value="1"/>"#));
//! # Ok::<(), testmatrix::xml::ExportError>(())
//! ```

use std::io::Write;
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::debug;

use super::sink::{ContentHandler, XmlSink};
use super::{CountLabel, attr, millis, output_type, status_label, tag};
use crate::model::{Device, TestCase};
use crate::run_config::{ConfigElement, RunConfiguration};
use crate::stats::ResultStats;
use crate::tree::{ResultsTree, TestResults};

/// Errors that can occur while exporting.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Writing to the destination failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The XML writer rejected an event.
    #[error("Failed to write XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Strict mode found a case that has not concluded.
    #[error("Test case {test} on device {device_id} has not finished")]
    NonTerminalResult { device_id: String, test: String },

    /// The output was not valid UTF-8 (only for string output).
    #[error("Exported XML is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Builds the default `footerText` attribute.
pub fn footer_text(product_name: &str, at: DateTime<Local>) -> String {
    format!(
        "Generated by {} on {}",
        product_name,
        at.format("%-m/%-d/%y, %-I:%M %p")
    )
}

/// Writes a [`ResultsTree`] as a `testrun` document.
///
/// `devices` is the list of devices that took part in the run, in the order
/// their sections are written. The tree is only read.
pub struct XmlExporter<'a> {
    tree: &'a ResultsTree,
    devices: &'a [Device],
    run_configuration: &'a dyn RunConfiguration,
    execution_duration: Duration,
    footer_text: String,
    strict: bool,
}

impl<'a> XmlExporter<'a> {
    /// Creates an exporter.
    ///
    /// # Arguments
    ///
    /// * `tree` - Results to export
    /// * `devices` - Participating devices, in output order
    /// * `run_configuration` - Configuration the run was started from
    /// * `execution_duration` - Wall-clock duration of the whole run
    pub fn new(
        tree: &'a ResultsTree,
        devices: &'a [Device],
        run_configuration: &'a dyn RunConfiguration,
        execution_duration: Duration,
    ) -> Self {
        Self {
            tree,
            devices,
            run_configuration,
            execution_duration,
            footer_text: footer_text(env!("CARGO_PKG_NAME"), Local::now()),
            strict: false,
        }
    }

    /// Uses `product_name` in the footer, dated now.
    pub fn with_product_name(mut self, product_name: &str) -> Self {
        self.footer_text = footer_text(product_name, Local::now());
        self
    }

    /// Overrides the footer text entirely.
    pub fn with_footer_text(mut self, footer_text: impl Into<String>) -> Self {
        self.footer_text = footer_text.into();
        self
    }

    /// Rejects trees that still contain scheduled or running cases.
    ///
    /// By default such cases are exported in the `suite`/`test` section and
    /// silently left out of `androidTestMatrix`.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn run_configuration_name(&self) -> &str {
        self.run_configuration.name()
    }

    /// Exports to `writer`, indenting by `indent` spaces (0 for none).
    pub fn export_to_writer<W: Write>(&self, writer: W, indent: usize) -> Result<W, ExportError> {
        let mut sink = if indent == 0 {
            XmlSink::new(writer)
        } else {
            XmlSink::with_indent(writer, indent)
        };
        self.export(&mut sink)?;
        Ok(sink.into_inner())
    }

    pub fn export_to_string(&self, indent: usize) -> Result<String, ExportError> {
        let bytes = self.export_to_writer(Vec::new(), indent)?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Emits the whole document into `handler`.
    pub fn export<H: ContentHandler + ?Sized>(&self, handler: &mut H) -> Result<(), ExportError> {
        if self.strict
            && let Some((device_id, case)) = self.tree.first_non_terminal()
        {
            return Err(ExportError::NonTerminalResult {
                device_id: device_id.to_string(),
                test: case.full_name(),
            });
        }

        let stats = self.tree.result_stats();
        let duration = millis(self.tree.total_duration());

        handler.start_document()?;
        element(
            handler,
            tag::TEST_RUN,
            &[
                (attr::DURATION, duration.as_str()),
                (attr::FOOTER_TEXT, self.footer_text.as_str()),
                (attr::NAME, self.run_configuration.name()),
            ],
            |h| {
                self.write_counts(h, &stats)?;
                self.write_config(h)?;
                self.write_results(h)?;
                self.write_test_matrix(h)
            },
        )?;
        handler.end_document()?;

        debug!(
            "Exported {} test cases from {} devices",
            stats.total(),
            self.devices.len()
        );
        Ok(())
    }

    fn write_counts<H: ContentHandler + ?Sized>(
        &self,
        handler: &mut H,
        stats: &ResultStats,
    ) -> Result<(), ExportError> {
        for label in CountLabel::ALL {
            if !label.is_written(stats) {
                continue;
            }
            let value = label.value(stats).to_string();
            element(
                handler,
                tag::COUNT,
                &[(attr::NAME, label.as_str()), (attr::VALUE, value.as_str())],
                |_| Ok(()),
            )?;
        }
        Ok(())
    }

    fn write_config<H: ContentHandler + ?Sized>(&self, handler: &mut H) -> Result<(), ExportError> {
        let mut config = ConfigElement::new(tag::CONFIG);
        self.run_configuration.write_external(&mut config);
        config.set_attribute(attr::CONFIG_ID, self.run_configuration.type_id());
        config.set_attribute(attr::NAME, self.run_configuration.name());
        write_config_element(handler, &config)
    }

    fn write_results<H: ContentHandler + ?Sized>(
        &self,
        handler: &mut H,
    ) -> Result<(), ExportError> {
        if let [device] = self.devices {
            return self.write_suites(handler, device);
        }

        for device in self.devices {
            let (Some(duration), Some(result)) = (
                self.tree.duration(device),
                self.tree.test_case_result(device),
            ) else {
                debug!("No results for device {}, skipping", device.id());
                continue;
            };
            let duration = millis(duration);
            element(
                handler,
                tag::SUITE,
                &[
                    (attr::NAME, device.name()),
                    (attr::DURATION, duration.as_str()),
                    (attr::STATUS, status_label(result)),
                ],
                |h| self.write_suites(h, device),
            )?;
        }
        Ok(())
    }

    fn write_suites<H: ContentHandler + ?Sized>(
        &self,
        handler: &mut H,
        device: &Device,
    ) -> Result<(), ExportError> {
        for suite in self.tree.suites() {
            let (Some(duration), Some(result)) =
                (suite.duration(device), suite.test_case_result(device))
            else {
                continue;
            };
            let name = suite.name();
            let duration = millis(duration);
            element(
                handler,
                tag::SUITE,
                &[
                    (attr::NAME, name.as_str()),
                    (attr::DURATION, duration.as_str()),
                    (attr::STATUS, status_label(result)),
                ],
                |h| {
                    for row in suite.rows() {
                        let Some(case) = row.test_case(device) else {
                            continue;
                        };
                        let Some(duration) = case.duration() else {
                            continue;
                        };
                        write_test(h, case, duration)?;
                    }
                    Ok(())
                },
            )?;
        }
        Ok(())
    }

    fn write_test_matrix<H: ContentHandler + ?Sized>(
        &self,
        handler: &mut H,
    ) -> Result<(), ExportError> {
        let execution_duration = millis(self.execution_duration);
        element(
            handler,
            tag::ANDROID_TEST_MATRIX,
            &[(attr::EXECUTION_DURATION, execution_duration.as_str())],
            |h| {
                for device in self.devices {
                    write_device(h, device)?;
                }
                for device in self.devices {
                    self.write_device_suite(h, device)?;
                }
                Ok(())
            },
        )
    }

    fn write_device_suite<H: ContentHandler + ?Sized>(
        &self,
        handler: &mut H,
        device: &Device,
    ) -> Result<(), ExportError> {
        let concluded = self
            .tree
            .test_case_result(device)
            .is_some_and(|result| result.is_terminal());
        let suite_result = self.tree.suite_result(device);
        let (true, Some(suite_result)) = (concluded, suite_result) else {
            debug!(
                "Result of device {} is undetermined, leaving it out of the matrix",
                device.id()
            );
            return Ok(());
        };

        let cases: Vec<&TestCase> = self
            .tree
            .test_cases(device)
            .filter(|case| case.result.is_terminal())
            .collect();
        let test_count = cases.len().to_string();

        element(
            handler,
            tag::TEST_SUITE,
            &[
                (attr::DEVICE_ID, device.id()),
                (attr::TEST_COUNT, test_count.as_str()),
                (attr::RESULT, suite_result.as_str()),
            ],
            |h| {
                for case in cases {
                    write_test_case(h, case)?;
                }
                Ok(())
            },
        )
    }
}

/// Emits `name` with `attributes`, the content written by `body`, and the
/// matching end tag.
fn element<H, F>(
    handler: &mut H,
    name: &str,
    attributes: &[(&str, &str)],
    body: F,
) -> Result<(), ExportError>
where
    H: ContentHandler + ?Sized,
    F: FnOnce(&mut H) -> Result<(), ExportError>,
{
    handler.start_element(name, attributes)?;
    body(handler)?;
    handler.end_element(name)
}

fn write_config_element<H: ContentHandler + ?Sized>(
    handler: &mut H,
    config: &ConfigElement,
) -> Result<(), ExportError> {
    let attributes: Vec<(&str, &str)> = config.attributes().collect();
    element(handler, config.name(), &attributes, |h| {
        if !config.text().is_empty() {
            h.characters(config.text())?;
        }
        for child in config.children() {
            write_config_element(h, child)?;
        }
        Ok(())
    })
}

fn write_test<H: ContentHandler + ?Sized>(
    handler: &mut H,
    case: &TestCase,
    duration: Duration,
) -> Result<(), ExportError> {
    let duration = millis(duration);
    element(
        handler,
        tag::TEST,
        &[
            (attr::NAME, case.method_name.as_str()),
            (attr::DURATION, duration.as_str()),
            (attr::STATUS, status_label(case.result)),
        ],
        |h| {
            write_output(h, output_type::STDERR, &case.error_stack_trace)?;
            write_output(h, output_type::STDOUT, &case.benchmark)?;
            write_output(h, output_type::STDOUT, &case.logcat)
        },
    )
}

fn write_output<H: ContentHandler + ?Sized>(
    handler: &mut H,
    output_type: &str,
    text: &str,
) -> Result<(), ExportError> {
    if text.trim().is_empty() {
        return Ok(());
    }
    element(handler, tag::OUTPUT, &[(attr::TYPE, output_type)], |h| {
        h.characters(text)
    })
}

fn write_device<H: ContentHandler + ?Sized>(
    handler: &mut H,
    device: &Device,
) -> Result<(), ExportError> {
    let version = device.version().to_string();
    element(
        handler,
        tag::DEVICE,
        &[
            (attr::ID, device.id()),
            (attr::DEVICE_NAME, device.name()),
            (attr::DEVICE_TYPE, device.device_type().as_str()),
            (attr::VERSION, version.as_str()),
        ],
        |h| {
            for (key, value) in device.additional_info() {
                element(
                    h,
                    tag::ADDITIONAL_INFO,
                    &[(attr::KEY, key.as_str()), (attr::VALUE, value.as_str())],
                    |_| Ok(()),
                )?;
            }
            Ok(())
        },
    )
}

fn write_test_case<H: ContentHandler + ?Sized>(
    handler: &mut H,
    case: &TestCase,
) -> Result<(), ExportError> {
    let start = case.start_timestamp_millis.map(|t| t.to_string());
    let end = case.end_timestamp_millis.map(|t| t.to_string());

    let mut attributes: Vec<(&str, &str)> = vec![
        (attr::ID, case.id.as_str()),
        (attr::METHOD_NAME, case.method_name.as_str()),
        (attr::CLASS_NAME, case.class_name.as_str()),
        (attr::PACKAGE_NAME, case.package_name.as_str()),
        (attr::RESULT, status_label(case.result)),
    ];
    let optional = [
        (attr::LOGCAT, Some(case.logcat.as_str())),
        (attr::ERROR_STACK_TRACE, Some(case.error_stack_trace.as_str())),
        (attr::START_TIMESTAMP_MILLIS, start.as_deref()),
        (attr::END_TIMESTAMP_MILLIS, end.as_deref()),
        (attr::BENCHMARK, Some(case.benchmark.as_str())),
    ];
    attributes.extend(
        optional
            .into_iter()
            .filter_map(|(name, value)| value.filter(|v| !v.trim().is_empty()).map(|v| (name, v))),
    );

    element(handler, tag::TEST_CASE, &attributes, |_| Ok(()))
}
