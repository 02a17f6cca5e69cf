use buildwatch_model::{
    data::{ScanSummary, Vulnerabilities},
    resources::TaskRun,
};
use kube::ResourceExt;
use serde::Deserialize;

/// Name of the task result carrying the image scan report.
pub const SCAN_RESULT: &str = "CLAIR_SCAN_RESULT";

#[derive(Deserialize)]
struct ScanReport {
    vulnerabilities: Vulnerabilities,
}

/// Sum up the scan reports of all task runs.
///
/// Returns `None` if no task run reported a (readable) scan result.
pub fn scan_summary(task_runs: &[TaskRun]) -> Option<ScanSummary> {
    let mut summary = ScanSummary::default();

    for task_run in task_runs {
        let Some(value) = task_run.result(SCAN_RESULT) else {
            continue;
        };

        let report: ScanReport = match serde_json::from_str(value) {
            Ok(report) => report,
            Err(err) => {
                log::warn!("Ignoring malformed scan result of {}: {err}", task_run.name_any());
                continue;
            }
        };

        let total = &mut summary.vulnerabilities;
        total.critical = total.critical.saturating_add(report.vulnerabilities.critical);
        total.high = total.high.saturating_add(report.vulnerabilities.high);
        total.medium = total.medium.saturating_add(report.vulnerabilities.medium);
        total.low = total.low.saturating_add(report.vulnerabilities.low);
        summary.task_runs.push(task_run.name_any());
    }

    (!summary.task_runs.is_empty()).then_some(summary)
}
