//! Findings produced by issue detection.

use serde::{Deserialize, Serialize};

/// Finding severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Classification of a rule.
///
/// Structural problems would prevent a successful build and are always
/// errors; style problems are always warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCategory {
    Structural,
    Style,
}

impl FindingCategory {
    pub fn severity(&self) -> Severity {
        match self {
            FindingCategory::Structural => Severity::Error,
            FindingCategory::Style => Severity::Warning,
        }
    }
}

/// A single detected issue tied to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Stable identifier: `kind:file` or `kind:file#subject`
    pub id: String,
    /// Rule id that produced the finding
    pub kind: String,
    pub category: FindingCategory,
    /// Relative path of the affected file (may not exist yet)
    pub file: String,
    pub message: String,
    pub severity: Severity,
    pub auto_fixable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Rule-specific discriminator (import specifier, manifest key, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl Finding {
    pub fn new(
        kind: impl Into<String>,
        category: FindingCategory,
        file: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let kind = kind.into();
        let file = file.into();
        Self {
            id: Self::make_id(&kind, &file, None),
            kind,
            category,
            file,
            message: message.into(),
            severity: category.severity(),
            auto_fixable: false,
            suggested_fix: None,
            line: None,
            subject: None,
        }
    }

    pub fn make_id(kind: &str, file: &str, subject: Option<&str>) -> String {
        match subject {
            Some(subject) => format!("{}:{}#{}", kind, file, subject),
            None => format!("{}:{}", kind, file),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        let subject = subject.into();
        self.id = Self::make_id(&self.kind, &self.file, Some(&subject));
        self.subject = Some(subject);
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_suggested_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }

    pub fn with_auto_fixable(mut self, auto_fixable: bool) -> Self {
        self.auto_fixable = auto_fixable;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Ordering key used to keep finding lists deterministic.
    pub fn sort_key(&self) -> (&str, &str, &str, usize) {
        (
            self.file.as_str(),
            self.kind.as_str(),
            self.subject.as_deref().unwrap_or(""),
            self.line.unwrap_or(0),
        )
    }
}

/// Sort findings by file, then rule id, then subject, then line.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}
