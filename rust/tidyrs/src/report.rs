//! Diagnostic messages passed to a document's report filter.

use std::ffi::c_int;
use std::fmt;

/// Severity of a diagnostic (`TidyReportLevel`, tidy-html5 numbering).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReportLevel {
    Info,
    Warning,
    Config,
    Access,
    Error,
    BadDocument,
    Fatal,
    DialogueSummary,
    DialogueInfo,
    DialogueFootnote,
    Other(c_int),
}

impl ReportLevel {
    pub fn from_raw(raw: c_int) -> Self {
        match raw {
            350 => ReportLevel::Info,
            351 => ReportLevel::Warning,
            352 => ReportLevel::Config,
            353 => ReportLevel::Access,
            354 => ReportLevel::Error,
            355 => ReportLevel::BadDocument,
            356 => ReportLevel::Fatal,
            357 => ReportLevel::DialogueSummary,
            358 => ReportLevel::DialogueInfo,
            359 => ReportLevel::DialogueFootnote,
            other => ReportLevel::Other(other),
        }
    }

    /// Errors and worse suppress output unless `force-output` is set.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            ReportLevel::Error | ReportLevel::BadDocument | ReportLevel::Fatal
        )
    }
}

/// One diagnostic as handed to the report filter.
#[derive(Clone, Copy, Debug)]
pub struct Report<'a> {
    pub level: ReportLevel,
    pub line: u32,
    pub column: u32,
    pub message: &'a str,
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {} column {} - {:?}: {}",
            self.line, self.column, self.level, self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        assert_eq!(ReportLevel::from_raw(351), ReportLevel::Warning);
        assert!(ReportLevel::from_raw(354).is_error());
        assert!(!ReportLevel::Info.is_error());
        assert_eq!(ReportLevel::from_raw(7), ReportLevel::Other(7));
    }

    #[test]
    fn test_display() {
        let report = Report {
            level: ReportLevel::Warning,
            line: 3,
            column: 9,
            message: "missing <!DOCTYPE> declaration",
        };
        assert_eq!(
            report.to_string(),
            "line 3 column 9 - Warning: missing <!DOCTYPE> declaration"
        );
    }
}
