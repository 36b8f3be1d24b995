/// Publishes the end-of-run summary.
use crate::error::ReportError;
use crate::report::model::Report;
use crate::report::sli::SliTargets;
use crate::runtime::summary::SummaryData;
use std::path::{Path, PathBuf};

/// Turns the aggregate statistics into a report and persists the snapshot.
#[derive(Debug, Clone)]
pub struct Reporter {
    targets: SliTargets,
    artifact_path: Option<PathBuf>,
}

impl Reporter {
    /// Reporter that only builds the report.
    pub fn new(targets: SliTargets) -> Self {
        Self {
            targets,
            artifact_path: None,
        }
    }

    /// Also write the full snapshot as pretty JSON to `path`.
    pub fn with_artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = Some(path.into());
        self
    }

    pub fn artifact_path(&self) -> Option<&Path> {
        self.artifact_path.as_deref()
    }

    /// Build the report and write the artifact.
    ///
    /// The report is built first, so a summary missing required values
    /// leaves no artifact behind.
    ///
    /// # Errors
    ///
    /// Returns `ReportError` if an aggregate is missing or the artifact
    /// cannot be written.
    pub fn publish(&self, summary: &SummaryData) -> Result<Report, ReportError> {
        let report = Report::from_summary(summary, &self.targets)?;

        if let Some(path) = &self.artifact_path {
            summary.write_to(path)?;
            tracing::info!(path = %path.display(), "summary written");
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::model::fixtures;
    use crate::runtime::metrics::HTTP_REQ_DURATION;

    #[test]
    fn writes_artifact_after_building_report() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested").join("load_test_results.json");
        let reporter = Reporter::new(SliTargets::default()).with_artifact(&path);

        let summary = fixtures::summary(6.0, 250.0, 0.0005);
        let report = reporter.publish(&summary).expect("publishes");

        assert!(report.verdict.passed);
        let restored = SummaryData::from_file(&path).expect("artifact parses");
        assert_eq!(restored, summary);
    }

    #[test]
    fn missing_metric_leaves_no_artifact() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("load_test_results.json");
        let reporter = Reporter::new(SliTargets::default()).with_artifact(&path);

        let mut summary = fixtures::summary(6.0, 250.0, 0.0);
        summary.metrics.remove(HTTP_REQ_DURATION);

        assert!(matches!(
            reporter.publish(&summary),
            Err(ReportError::MissingMetric { .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn without_artifact_nothing_is_written() {
        let reporter = Reporter::new(SliTargets::default());
        assert!(reporter.artifact_path().is_none());
        reporter
            .publish(&fixtures::summary(6.0, 250.0, 0.0))
            .expect("publishes");
    }
}
