use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::pipeline::processing::rating::registry::spec_for;
use crate::types::{FusedFilm, Source, SourceTable};

/// First year a film can plausibly carry (Roundhay Garden Scene)
pub const EARLIEST_FILM_YEAR: i32 = 1888;

/// Quality assessment of one table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAssessment {
    /// Name of the assessed table
    pub table: String,
    /// The quality gate decision
    pub decision: QualityDecision,
    /// Overall quality score (0.0 to 1.0)
    pub quality_score: f64,
    /// Specific quality issues found
    pub issues: Vec<QualityIssue>,
    /// The quality rule set version used
    pub rule_version: String,
    pub assessed_at: DateTime<Utc>,
}

/// Quality Gate decision for a table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum QualityDecision {
    /// Table meets quality standards
    Accept,
    /// Table has quality concerns but proceeds with warnings
    AcceptWithWarnings,
    /// Table fails quality checks; flagged for review, the run still proceeds
    Quarantine,
}

/// Individual quality issue found during assessment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityIssue {
    /// The type of quality issue
    pub issue_type: QualityIssueType,
    /// Severity level of the issue
    pub severity: QualitySeverity,
    /// Human-readable description of the issue
    pub description: String,
    /// Column that triggered this issue
    pub field: Option<String>,
    /// Number of affected rows
    pub affected_rows: usize,
}

/// Types of quality issues that can be detected
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum QualityIssueType {
    /// Missing required data
    MissingData,
    /// Data outside expected ranges
    OutOfRange,
    /// Duplicate detection concerns
    DuplicationConcern,
}

/// Severity levels for quality issues
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
pub enum QualitySeverity {
    /// Minor issue, table can proceed
    Info,
    /// Notable issue worth flagging
    Warning,
    /// Significant issue requiring attention
    Error,
    /// Critical issue requiring quarantine
    Critical,
}

/// Trait for implementing Quality Gate assessment logic
pub trait QualityGate {
    /// Assess a per-source table before fusion
    fn assess_source(&self, table: &SourceTable) -> QualityAssessment;

    /// Assess a fused wide table
    fn assess_fused(&self, name: &str, films: &[FusedFilm]) -> QualityAssessment;
}

/// Configuration for Quality Gate assessment rules
#[derive(Debug, Clone)]
pub struct QualityGateConfig {
    /// Minimum quality score for acceptance
    pub min_quality_score: f64,
    /// Rule version identifier
    pub rule_version: String,
    pub min_year: i32,
    /// Latest plausible release year (one year of tolerance past today)
    pub max_year: i32,
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            min_quality_score: 0.5,
            rule_version: "v1.0.0".to_string(),
            min_year: EARLIEST_FILM_YEAR,
            max_year: Utc::now().year() + 1,
        }
    }
}

/// Default Quality Gate implementation with configurable rules
pub struct DefaultQualityGate {
    pub config: QualityGateConfig,
}

impl DefaultQualityGate {
    pub fn new() -> Self {
        Self {
            config: QualityGateConfig::default(),
        }
    }

    pub fn with_config(config: QualityGateConfig) -> Self {
        Self { config }
    }

    fn year_issue<I>(&self, years: I) -> Option<QualityIssue>
    where
        I: Iterator<Item = Option<i32>>,
    {
        let bad = years
            .filter(|y| match y {
                Some(year) => *year < self.config.min_year || *year > self.config.max_year,
                None => true,
            })
            .count();

        (bad > 0).then(|| QualityIssue {
            issue_type: QualityIssueType::OutOfRange,
            severity: QualitySeverity::Warning,
            description: format!(
                "{} rows with invalid year (<{} or >{} or missing)",
                bad, self.config.min_year, self.config.max_year
            ),
            field: Some("year".to_string()),
            affected_rows: bad,
        })
    }

    fn range_issue<I>(
        column: &str,
        values: I,
        (low, high): (f64, f64),
        severity: QualitySeverity,
    ) -> Option<QualityIssue>
    where
        I: Iterator<Item = Option<f64>>,
    {
        let bad = values.flatten().filter(|v| *v < low || *v > high).count();

        (bad > 0).then(|| QualityIssue {
            issue_type: QualityIssueType::OutOfRange,
            severity,
            description: format!("{} values outside {}-{} in {}", bad, low, high, column),
            field: Some(column.to_string()),
            affected_rows: bad,
        })
    }

    fn duplicate_issue<'a, I>(keys: I) -> Option<QualityIssue>
    where
        I: Iterator<Item = (&'a str, Option<i32>)>,
    {
        let mut counts: HashMap<(&str, Option<i32>), usize> = HashMap::new();
        for key in keys {
            *counts.entry(key).or_default() += 1;
        }
        let duplicated: usize = counts.values().filter(|c| **c > 1).sum();

        (duplicated > 0).then(|| QualityIssue {
            issue_type: QualityIssueType::DuplicationConcern,
            severity: QualitySeverity::Info,
            description: format!("{} rows are duplicated on (title, year)", duplicated),
            field: Some("title".to_string()),
            affected_rows: duplicated,
        })
    }

    /// Calculate overall quality score based on issues
    fn calculate_quality_score(&self, issues: &[QualityIssue]) -> f64 {
        let mut score: f64 = 1.0;

        for issue in issues {
            let deduction = match issue.severity {
                QualitySeverity::Info => 0.01,
                QualitySeverity::Warning => 0.05,
                QualitySeverity::Error => 0.15,
                QualitySeverity::Critical => 0.30,
            };
            score = (score - deduction).max(0.0);
        }

        score
    }

    /// Determine quality decision based on score and issues
    fn determine_decision(&self, quality_score: f64, issues: &[QualityIssue]) -> QualityDecision {
        if issues.iter().any(|i| i.severity == QualitySeverity::Critical) {
            return QualityDecision::Quarantine;
        }

        if quality_score < self.config.min_quality_score {
            return QualityDecision::Quarantine;
        }

        if issues.iter().any(|i| i.severity >= QualitySeverity::Warning) {
            return QualityDecision::AcceptWithWarnings;
        }

        QualityDecision::Accept
    }

    fn finish(&self, table: &str, issues: Vec<QualityIssue>) -> QualityAssessment {
        let quality_score = self.calculate_quality_score(&issues);
        let decision = self.determine_decision(quality_score, &issues);

        QualityAssessment {
            table: table.to_string(),
            decision,
            quality_score,
            issues,
            rule_version: self.config.rule_version.clone(),
            assessed_at: Utc::now(),
        }
    }

    fn empty_issue(table: &str) -> QualityIssue {
        QualityIssue {
            issue_type: QualityIssueType::MissingData,
            severity: QualitySeverity::Critical,
            description: format!("{} is empty", table),
            field: None,
            affected_rows: 0,
        }
    }
}

impl QualityGate for DefaultQualityGate {
    fn assess_source(&self, table: &SourceTable) -> QualityAssessment {
        let rows = &table.observations;
        if rows.is_empty() {
            return self.finish(&table.name, vec![Self::empty_issue(&table.name)]);
        }

        let mut issues = Vec::new();

        let untitled = rows.iter().filter(|o| o.title.trim().is_empty()).count();
        if untitled > 0 {
            issues.push(QualityIssue {
                issue_type: QualityIssueType::MissingData,
                severity: QualitySeverity::Warning,
                description: format!("{} rows without a title", untitled),
                field: Some("title".to_string()),
                affected_rows: untitled,
            });
        }

        issues.extend(self.year_issue(rows.iter().map(|o| o.year)));

        let spec = spec_for(table.source);
        issues.extend(Self::range_issue(
            spec.rating_column,
            rows.iter().map(|o| o.rating),
            spec.native_range,
            QualitySeverity::Warning,
        ));

        issues.extend(Self::duplicate_issue(
            rows.iter().map(|o| (o.title.as_str(), o.year)),
        ));

        self.finish(&table.name, issues)
    }

    fn assess_fused(&self, name: &str, films: &[FusedFilm]) -> QualityAssessment {
        if films.is_empty() {
            return self.finish(name, vec![Self::empty_issue(name)]);
        }

        let mut issues = Vec::new();
        issues.extend(self.year_issue(films.iter().map(|f| f.resolved_year)));

        for source in Source::ALL {
            let spec = spec_for(source);
            issues.extend(Self::range_issue(
                spec.rating_column,
                films.iter().map(|f| f.ratings_raw.get(source)),
                spec.native_range,
                QualitySeverity::Warning,
            ));
            // Normalized values outside 0-10 mean rescaling itself went wrong
            issues.extend(Self::range_issue(
                spec.norm_column,
                films.iter().map(|f| f.ratings_norm.get(source)),
                (0.0, 10.0),
                QualitySeverity::Error,
            ));
        }
        issues.extend(Self::range_issue(
            "superscore_mean",
            films.iter().map(|f| f.superscore_mean),
            (0.0, 10.0),
            QualitySeverity::Error,
        ));
        issues.extend(Self::range_issue(
            "superscore_median",
            films.iter().map(|f| f.superscore_median),
            (0.0, 10.0),
            QualitySeverity::Error,
        ));

        issues.extend(Self::duplicate_issue(
            films.iter().map(|f| (f.norm_title.as_str(), f.resolved_year)),
        ));

        self.finish(name, issues)
    }
}

impl Default for DefaultQualityGate {
    fn default() -> Self {
        Self::new()
    }
}
