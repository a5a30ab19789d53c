//! Tests for validation report types.

use super::*;

/// An empty report is valid.
#[test]
fn test_empty_report_is_valid() {
    assert!(ValidationReport::new().is_valid());
}

/// Warnings do not invalidate a report; errors do.
#[test]
fn test_severity_split() {
    let mut report = ValidationReport::new();
    report.add_issue(ValidationIssue {
        message: "unusual priority band".to_string(),
        parameter: Some("priority".to_string()),
        severity: IssueSeverity::Warning,
    });
    assert!(report.is_valid());

    report.add_issue(ValidationIssue {
        message: "empty id".to_string(),
        parameter: Some("id".to_string()),
        severity: IssueSeverity::Error,
    });
    assert!(!report.is_valid());
    assert_eq!(report.errors().len(), 1);
    assert_eq!(report.warnings().len(), 1);
}
