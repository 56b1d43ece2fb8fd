//! Consumers of test progress notifications.
//!
//! A [`TestResultListener`] is told about devices, suites and cases in the
//! order they happen. The importer drives listeners when replaying a saved
//! run; [`ResultsTreeBuilder`] turns the notifications back into a
//! [`ResultsTree`] and [`ConsoleListener`] renders them in the terminal.

pub mod console;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::model::{Device, TestCase, TestSuite};
use crate::tree::ResultsTree;

pub use console::{ConsoleListener, print_summary};

/// Receives test progress notifications.
///
/// For each device, `on_test_suite_scheduled` comes first, then
/// `on_test_suite_started`, a `started`/`finished` pair per case, and
/// finally `on_test_suite_finished`. `on_run_finished` comes last, exactly
/// once, whether the run completed, was cancelled or failed. Devices are not
/// guaranteed a suite. Calls are never concurrent.
#[async_trait]
pub trait TestResultListener: Send + Sync {
    /// A device has been described and will run a suite.
    async fn on_test_suite_scheduled(&self, device: &Device);

    async fn on_test_suite_started(&self, device: &Device, suite: &TestSuite);

    async fn on_test_case_started(&self, device: &Device, suite: &TestSuite, case: &TestCase);

    async fn on_test_case_finished(&self, device: &Device, suite: &TestSuite, case: &TestCase);

    async fn on_test_suite_finished(&self, device: &Device, suite: &TestSuite);

    /// Overrides the wall-clock duration of the whole run.
    async fn set_execution_duration(&self, duration: Duration);

    /// No notifications follow.
    async fn on_run_finished(&self);
}

#[async_trait]
impl<L: TestResultListener + ?Sized> TestResultListener for Arc<L> {
    async fn on_test_suite_scheduled(&self, device: &Device) {
        (**self).on_test_suite_scheduled(device).await;
    }

    async fn on_test_suite_started(&self, device: &Device, suite: &TestSuite) {
        (**self).on_test_suite_started(device, suite).await;
    }

    async fn on_test_case_started(&self, device: &Device, suite: &TestSuite, case: &TestCase) {
        (**self).on_test_case_started(device, suite, case).await;
    }

    async fn on_test_case_finished(&self, device: &Device, suite: &TestSuite, case: &TestCase) {
        (**self).on_test_case_finished(device, suite, case).await;
    }

    async fn on_test_suite_finished(&self, device: &Device, suite: &TestSuite) {
        (**self).on_test_suite_finished(device, suite).await;
    }

    async fn set_execution_duration(&self, duration: Duration) {
        (**self).set_execution_duration(duration).await;
    }

    async fn on_run_finished(&self) {
        (**self).on_run_finished().await;
    }
}

/// A listener that ignores everything.
pub struct NullListener;

#[async_trait]
impl TestResultListener for NullListener {
    async fn on_test_suite_scheduled(&self, _device: &Device) {}
    async fn on_test_suite_started(&self, _device: &Device, _suite: &TestSuite) {}
    async fn on_test_case_started(&self, _device: &Device, _suite: &TestSuite, _case: &TestCase) {}
    async fn on_test_case_finished(&self, _device: &Device, _suite: &TestSuite, _case: &TestCase) {}
    async fn on_test_suite_finished(&self, _device: &Device, _suite: &TestSuite) {}
    async fn set_execution_duration(&self, _duration: Duration) {}
    async fn on_run_finished(&self) {}
}

/// Forwards every notification to several listeners, in order.
pub struct MultiListener {
    listeners: Vec<Box<dyn TestResultListener>>,
}

impl MultiListener {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn with_listener<L: TestResultListener + 'static>(mut self, listener: L) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }
}

impl Default for MultiListener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TestResultListener for MultiListener {
    async fn on_test_suite_scheduled(&self, device: &Device) {
        for listener in &self.listeners {
            listener.on_test_suite_scheduled(device).await;
        }
    }

    async fn on_test_suite_started(&self, device: &Device, suite: &TestSuite) {
        for listener in &self.listeners {
            listener.on_test_suite_started(device, suite).await;
        }
    }

    async fn on_test_case_started(&self, device: &Device, suite: &TestSuite, case: &TestCase) {
        for listener in &self.listeners {
            listener.on_test_case_started(device, suite, case).await;
        }
    }

    async fn on_test_case_finished(&self, device: &Device, suite: &TestSuite, case: &TestCase) {
        for listener in &self.listeners {
            listener.on_test_case_finished(device, suite, case).await;
        }
    }

    async fn on_test_suite_finished(&self, device: &Device, suite: &TestSuite) {
        for listener in &self.listeners {
            listener.on_test_suite_finished(device, suite).await;
        }
    }

    async fn set_execution_duration(&self, duration: Duration) {
        for listener in &self.listeners {
            listener.set_execution_duration(duration).await;
        }
    }

    async fn on_run_finished(&self) {
        for listener in &self.listeners {
            listener.on_run_finished().await;
        }
    }
}

/// What a [`ResultsTreeBuilder`] has collected.
#[derive(Debug, Clone, Default)]
pub struct ReplayedRun {
    pub tree: ResultsTree,
    /// Devices in the order they were scheduled.
    pub devices: Vec<Device>,
    pub execution_duration: Option<Duration>,
}

/// Rebuilds a [`ResultsTree`] from notifications.
#[derive(Debug, Default)]
pub struct ResultsTreeBuilder {
    run: Mutex<ReplayedRun>,
}

impl ResultsTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything received so far.
    pub async fn snapshot(&self) -> ReplayedRun {
        self.run.lock().await.clone()
    }

    pub async fn into_run(self) -> ReplayedRun {
        self.run.into_inner()
    }
}

#[async_trait]
impl TestResultListener for ResultsTreeBuilder {
    async fn on_test_suite_scheduled(&self, device: &Device) {
        let mut run = self.run.lock().await;
        if !run.devices.iter().any(|d| d.id() == device.id()) {
            run.devices.push(device.clone());
        }
    }

    async fn on_test_suite_started(&self, _device: &Device, _suite: &TestSuite) {}

    async fn on_test_case_started(&self, device: &Device, _suite: &TestSuite, case: &TestCase) {
        self.run.lock().await.tree.add_test_case(device, case.clone());
    }

    async fn on_test_case_finished(&self, device: &Device, _suite: &TestSuite, case: &TestCase) {
        self.run.lock().await.tree.add_test_case(device, case.clone());
    }

    async fn on_test_suite_finished(&self, device: &Device, suite: &TestSuite) {
        self.run
            .lock()
            .await
            .tree
            .set_suite_result(device, suite.result);
    }

    async fn set_execution_duration(&self, duration: Duration) {
        self.run.lock().await.execution_duration = Some(duration);
    }

    async fn on_run_finished(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeviceType, TestCaseResult, TestSuiteResult};
    use crate::tree::TestResults;

    fn device() -> Device {
        Device::new("d1", "Pixel", DeviceType::LocalEmulator, 33)
    }

    async fn drive(listener: &dyn TestResultListener, device: &Device) {
        let suite = TestSuite::new("s", "suite", 2).with_result(TestSuiteResult::Failed);
        listener.on_test_suite_scheduled(device).await;
        listener.on_test_suite_started(device, &suite).await;
        for (method, result) in [("a", TestCaseResult::Passed), ("b", TestCaseResult::Failed)] {
            let case = TestCase::new("p", "C", method).with_result(result);
            listener.on_test_case_started(device, &suite, &case).await;
            listener.on_test_case_finished(device, &suite, &case).await;
        }
        listener.on_test_suite_finished(device, &suite).await;
        listener.set_execution_duration(Duration::from_secs(2)).await;
        listener.on_run_finished().await;
    }

    #[tokio::test]
    async fn test_builder_collects_run() {
        let d1 = device();
        let builder = ResultsTreeBuilder::new();
        drive(&builder, &d1).await;

        let run = builder.into_run().await;
        assert_eq!(run.devices, vec![d1.clone()]);
        assert_eq!(run.execution_duration, Some(Duration::from_secs(2)));
        assert_eq!(run.tree.result_stats_for(&d1).total(), 2);
        assert_eq!(run.tree.suite_result(&d1), Some(TestSuiteResult::Failed));
    }

    #[tokio::test]
    async fn test_multi_listener_forwards() {
        let first = Arc::new(ResultsTreeBuilder::new());
        let second = Arc::new(ResultsTreeBuilder::new());
        let multi = MultiListener::new()
            .with_listener(NullListener)
            .with_listener(first.clone())
            .with_listener(second.clone());

        let d1 = device();
        drive(&multi, &d1).await;

        for builder in [first, second] {
            let run = builder.snapshot().await;
            assert_eq!(run.tree.result_stats().failed, 1);
        }
    }
}
