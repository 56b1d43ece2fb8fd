//! Terminal rendering of a run.

use std::time::Duration;

use async_trait::async_trait;
use console::{StyledObject, style};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Mutex;

use super::TestResultListener;
use crate::model::{Device, TestCase, TestCaseResult, TestSuite};
use crate::stats::ResultStats;

#[derive(Default)]
struct ConsoleState {
    progress: Option<ProgressBar>,
    scheduled: usize,
    stats: ResultStats,
    execution_duration: Option<Duration>,
    done: bool,
}

/// Shows a progress bar while a run is reported, and a summary when the run
/// ends.
pub struct ConsoleListener {
    state: Mutex<ConsoleState>,
    verbose: bool,
}

impl ConsoleListener {
    /// With `verbose`, passed cases are listed as well.
    pub fn new(verbose: bool) -> Self {
        Self {
            state: Mutex::new(ConsoleState::default()),
            verbose,
        }
    }

    /// Stats over all cases finished so far.
    pub async fn stats(&self) -> ResultStats {
        self.state.lock().await.stats
    }
}

fn result_label(result: TestCaseResult) -> StyledObject<&'static str> {
    match result {
        TestCaseResult::Passed => style("PASS").green(),
        TestCaseResult::Failed => style("FAIL").red(),
        TestCaseResult::Skipped | TestCaseResult::Cancelled => style("SKIP").yellow(),
        TestCaseResult::Scheduled | TestCaseResult::InProgress => style("RUN ").dim(),
    }
}

fn new_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(template) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(template.progress_chars("#>-"));
    }
    pb
}

#[async_trait]
impl TestResultListener for ConsoleListener {
    async fn on_test_suite_scheduled(&self, _device: &Device) {
        self.state.lock().await.scheduled += 1;
    }

    async fn on_test_suite_started(&self, device: &Device, suite: &TestSuite) {
        let mut state = self.state.lock().await;
        if state.progress.is_none() {
            state.progress = Some(new_progress_bar());
        }
        if let Some(pb) = &state.progress {
            pb.inc_length(suite.test_case_count as u64);
            pb.set_message(device.name().to_string());
        }
    }

    async fn on_test_case_started(&self, _device: &Device, _suite: &TestSuite, _case: &TestCase) {}

    async fn on_test_case_finished(&self, device: &Device, _suite: &TestSuite, case: &TestCase) {
        let mut state = self.state.lock().await;
        state.stats = state.stats.add_result(Some(case.result));
        let Some(pb) = &state.progress else {
            return;
        };
        pb.inc(1);
        if self.verbose || case.result != TestCaseResult::Passed {
            pb.println(format!(
                "{} {} [{}]",
                result_label(case.result),
                case.full_name(),
                device.name()
            ));
        }
    }

    async fn on_test_suite_finished(&self, device: &Device, suite: &TestSuite) {
        let state = self.state.lock().await;
        if self.verbose
            && let Some(pb) = &state.progress
        {
            let result = suite
                .result
                .map(|result| result.to_string())
                .unwrap_or_else(|| "done".to_string());
            pb.println(format!("{} finished: {}", device.name(), result));
        }
    }

    async fn set_execution_duration(&self, duration: Duration) {
        self.state.lock().await.execution_duration = Some(duration);
    }

    async fn on_run_finished(&self) {
        let mut state = self.state.lock().await;
        if state.done {
            return;
        }
        state.done = true;
        if let Some(pb) = state.progress.take() {
            pb.finish_and_clear();
        }
        print_summary(&state.stats, state.scheduled, state.execution_duration);
    }
}

/// Prints the headline and counts of a finished run.
pub fn print_summary(stats: &ResultStats, device_count: usize, duration: Option<Duration>) {
    let title = match stats.title() {
        "Tests Failed" => style(stats.title()).red().bold(),
        "Tests Cancelled" => style(stats.title()).yellow().bold(),
        _ => style(stats.title()).green().bold(),
    };

    println!();
    println!("{}: {}", title, stats.summary_text());
    println!(
        "  {} tests on {} device{}",
        stats.total(),
        device_count,
        if device_count == 1 { "" } else { "s" }
    );
    println!("  Passed:  {}", style(stats.passed).green());
    println!("  Failed:  {}", style(stats.failed).red());
    println!("  Skipped: {}", style(stats.skipped + stats.cancelled).yellow());
    if stats.pending > 0 {
        println!("  Pending: {}", style(stats.pending).dim());
    }
    if let Some(duration) = duration {
        println!("  Duration: {:?}", duration);
    }
}
