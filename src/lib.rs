//! testmatrix: export and replay of multi-device instrumented test results.
//!
//! A run of instrumented tests on several devices is collected into a
//! [`ResultsTree`](tree::ResultsTree). The tree can be written as a `testrun`
//! XML document and, later, replayed from that document into any
//! [`TestResultListener`](listener::TestResultListener) as if the run were
//! happening again.
//!
//! # Architecture
//!
//! The main components are:
//!
//! - **Model**: Devices, test cases and suites ([`model`])
//! - **Stats**: Result counting and summary rules ([`stats`])
//! - **Tree**: Per-suite, per-method, per-device results ([`tree`])
//! - **XML**: The exporter and the replaying importer ([`xml`])
//! - **Listener**: Consumers of replayed notifications ([`listener`])
//! - **History**: Saved runs on disk ([`history`])
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use testmatrix::listener::ResultsTreeBuilder;
//! use testmatrix::xml::XmlImporter;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let builder = Arc::new(ResultsTreeBuilder::new());
//!     let importer = XmlImporter::new(std::path::PathBuf::from("run.xml"));
//!     if let Some(handle) = importer.import(builder.clone()).await? {
//!         handle.join().await?;
//!     }
//!     let run = builder.snapshot().await;
//!     println!("{} devices", run.devices.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod history;
pub mod listener;
pub mod model;
pub mod run_config;
pub mod stats;
pub mod tree;
pub mod xml;

// Re-export commonly used types
pub use config::{Config, load_config};
pub use listener::{ResultsTreeBuilder, TestResultListener};
pub use model::{Device, DeviceType, TestCase, TestCaseResult, TestSuite, TestSuiteResult};
pub use stats::ResultStats;
pub use tree::{ResultsTree, TestResults};
pub use xml::{XmlExporter, XmlImporter};
