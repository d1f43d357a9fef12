//! Data-quality validation.
//!
//! Every check runs and the findings merge; nothing short-circuits except the
//! date checks for a column whose values never parse. Validation issues are
//! data, not errors: the report always comes back `Ok`, and only the overall
//! verdict tells a caller whether processing should proceed.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    data::{Dataset, coerce_numeric, coerce_timestamp},
    profile::SchemaProfile,
};

const MAX_COLUMNS: usize = 50;
const MIN_COLUMNS: usize = 2;
const EXCESSIVE_NULL_PERCENT: f64 = 50.0;
const HIGH_NULL_PERCENT: f64 = 20.0;
const MIN_DATE_SPAN_DAYS: i64 = 30;
const EPOCH_FLOOR_YEAR: i32 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    EmptyFile,
    TooManyColumns,
    TooFewColumns,
    ExcessiveMissingValues,
    HighMissingValues,
    MissingValues,
    InvalidDates,
    FutureDates,
    VeryOldDates,
    ShortDateRange,
    NegativeValues,
    ManyZeros,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub kind: IssueKind,
    pub column: Option<String>,
    pub message: String,
    pub suggestion: String,
}

impl ValidationIssue {
    fn new(
        severity: Severity,
        kind: IssueKind,
        column: Option<&str>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            kind,
            column: column.map(str::to_string),
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub total_issues: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub issues: Vec<ValidationIssue>,
    pub summary: String,
}

/// Runs every check against the current clock.
pub fn validate(dataset: &Dataset, profile: &SchemaProfile) -> ValidationReport {
    validate_at(dataset, profile, Utc::now().naive_utc())
}

/// Runs every check against a fixed "now", keeping the validator
/// deterministic under test.
pub fn validate_at(
    dataset: &Dataset,
    profile: &SchemaProfile,
    now: NaiveDateTime,
) -> ValidationReport {
    let mut issues = Vec::new();

    check_structure(dataset, &mut issues);
    check_missing_values(profile, &mut issues);
    if let Some(date_column) = profile.suggested_date_column.as_deref() {
        check_date_range(dataset, date_column, now, &mut issues);
    }
    check_numeric_values(dataset, profile, &mut issues);

    let errors = issues
        .iter()
        .filter(|i| i.severity == Severity::Error)
        .count();
    let warnings = issues
        .iter()
        .filter(|i| i.severity == Severity::Warning)
        .count();
    let infos = issues
        .iter()
        .filter(|i| i.severity == Severity::Info)
        .count();

    let summary = if errors > 0 {
        format!("File has {errors} error(s) that must be fixed before processing")
    } else if warnings > 0 {
        format!("File is valid but has {warnings} warning(s)")
    } else {
        "File validation passed with no issues".to_string()
    };

    ValidationReport {
        is_valid: errors == 0,
        total_issues: issues.len(),
        errors,
        warnings,
        infos,
        issues,
        summary,
    }
}

fn check_structure(dataset: &Dataset, issues: &mut Vec<ValidationIssue>) {
    if dataset.row_count() == 0 {
        issues.push(ValidationIssue::new(
            Severity::Error,
            IssueKind::EmptyFile,
            None,
            "File contains no data rows",
            "Upload a file with at least one data row",
        ));
    }

    let column_count = dataset.column_count();
    if column_count > MAX_COLUMNS {
        issues.push(ValidationIssue::new(
            Severity::Warning,
            IssueKind::TooManyColumns,
            None,
            format!("File has {column_count} columns, which is unusual"),
            "Ensure the first row contains column headers",
        ));
    }
    if column_count < MIN_COLUMNS {
        issues.push(ValidationIssue::new(
            Severity::Error,
            IssueKind::TooFewColumns,
            None,
            format!("File has less than {MIN_COLUMNS} columns"),
            "Sales data typically has date, SKU, and quantity columns",
        ));
    }
}

fn check_missing_values(profile: &SchemaProfile, issues: &mut Vec<ValidationIssue>) {
    for column in &profile.columns {
        let pct = column.null_percentage;
        let name = column.name.as_str();
        if pct > EXCESSIVE_NULL_PERCENT {
            issues.push(ValidationIssue::new(
                Severity::Error,
                IssueKind::ExcessiveMissingValues,
                Some(name),
                format!("Column \"{name}\" has {pct:.1}% missing values"),
                "This column may not be useful for analysis",
            ));
        } else if pct > HIGH_NULL_PERCENT {
            issues.push(ValidationIssue::new(
                Severity::Warning,
                IssueKind::HighMissingValues,
                Some(name),
                format!("Column \"{name}\" has {pct:.1}% missing values"),
                "Consider filling missing values or removing this column",
            ));
        } else if pct > 0.0 {
            issues.push(ValidationIssue::new(
                Severity::Info,
                IssueKind::MissingValues,
                Some(name),
                format!("Column \"{name}\" has {pct:.1}% missing values"),
                "Missing values will be handled during processing",
            ));
        }
    }
}

fn check_date_range(
    dataset: &Dataset,
    date_column: &str,
    now: NaiveDateTime,
    issues: &mut Vec<ValidationIssue>,
) {
    let Some(column) = dataset.column(date_column) else {
        return;
    };

    let parsed: Vec<NaiveDateTime> = column.non_null().filter_map(coerce_timestamp).collect();
    if parsed.is_empty() {
        issues.push(ValidationIssue::new(
            Severity::Error,
            IssueKind::InvalidDates,
            Some(date_column),
            format!("Could not parse dates in column \"{date_column}\""),
            "Ensure dates are in YYYY-MM-DD format",
        ));
        return;
    }

    let min_date = parsed.iter().min().copied().unwrap_or(now);
    let max_date = parsed.iter().max().copied().unwrap_or(now);

    if max_date > now {
        let future_count = parsed.iter().filter(|d| **d > now).count();
        issues.push(ValidationIssue::new(
            Severity::Warning,
            IssueKind::FutureDates,
            Some(date_column),
            format!("{future_count} rows have future dates"),
            "Future dates may indicate data entry errors",
        ));
    }

    let epoch_floor = NaiveDate::from_ymd_opt(EPOCH_FLOOR_YEAR, 1, 1)
        .map(|d| d.and_time(NaiveTime::MIN))
        .unwrap_or(now);
    if min_date < epoch_floor {
        let old_count = parsed.iter().filter(|d| **d < epoch_floor).count();
        issues.push(ValidationIssue::new(
            Severity::Warning,
            IssueKind::VeryOldDates,
            Some(date_column),
            format!("{old_count} rows have dates before year {EPOCH_FLOOR_YEAR}"),
            "Old dates may indicate incorrect data",
        ));
    }

    let span_days = (max_date - min_date).num_days();
    if span_days < MIN_DATE_SPAN_DAYS {
        issues.push(ValidationIssue::new(
            Severity::Warning,
            IssueKind::ShortDateRange,
            Some(date_column),
            format!("Data spans only {span_days} days"),
            "Forecasting works best with at least 3 months of data",
        ));
    }
}

fn check_numeric_values(
    dataset: &Dataset,
    profile: &SchemaProfile,
    issues: &mut Vec<ValidationIssue>,
) {
    let row_count = dataset.row_count();
    for column_profile in &profile.columns {
        if !column_profile.detected_type.is_numeric() {
            continue;
        }
        let Some(column) = dataset.column(&column_profile.name) else {
            continue;
        };
        let name = column_profile.name.as_str();
        let numbers: Vec<f64> = column.non_null().filter_map(coerce_numeric).collect();

        let negative_count = numbers.iter().filter(|n| **n < 0.0).count();
        if negative_count > 0 {
            issues.push(ValidationIssue::new(
                Severity::Info,
                IssueKind::NegativeValues,
                Some(name),
                format!("{negative_count} rows have negative values in \"{name}\""),
                "Negative values may be valid for returns/discounts",
            ));
        }

        let zero_count = numbers.iter().filter(|n| **n == 0.0).count();
        if zero_count * 2 > row_count {
            issues.push(ValidationIssue::new(
                Severity::Warning,
                IssueKind::ManyZeros,
                Some(name),
                format!("More than 50% of values in \"{name}\" are zero"),
                "Many zeros may indicate missing data coded as zero",
            ));
        }
    }
}
