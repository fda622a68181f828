//! Aggregated problem reports.
//!
//! Every pass and the source parser push into one [`ProblemReport`] instead
//! of stopping at the first problem, so a single report lists all of them.

use ariadne::{Config, Label, Report, ReportKind, Source};
use serde::Serialize;
use std::fmt;
use std::ops::Range;

/// One semantic or syntactic problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Problem {
    pub message: String,
    /// Byte range into the source unit, if known.
    pub span: Option<Range<usize>>,
    /// Full name of the definition the problem was found in.
    pub definition: Option<String>,
}

impl Problem {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
            definition: None,
        }
    }

    pub fn with_span(mut self, span: Range<usize>) -> Self {
        self.span = Some(span);
        self
    }

    pub fn in_definition(mut self, full_name: impl Into<String>) -> Self {
        self.definition = Some(full_name.into());
        self
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.definition {
            Some(definition) => write!(f, "{definition}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProblemReport {
    problems: Vec<Problem>,
}

impl ProblemReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, problem: Problem) {
        self.problems.push(problem);
    }

    pub fn extend(&mut self, other: ProblemReport) {
        self.problems.extend(other.problems);
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    /// Renders every problem against its source text with ariadne.
    pub fn render(&self, filename: &str, source_code: &str) -> String {
        let mut rendered = String::new();
        for problem in &self.problems {
            let Some(span) = problem.span.clone() else {
                rendered.push_str(&problem.to_string());
                rendered.push('\n');
                continue;
            };
            let mut report_bytes = Vec::new();
            let written = Report::build(ReportKind::Error, (filename, span.clone()))
                .with_config(Config::default().with_color(false))
                .with_message(problem.to_string())
                .with_label(Label::new((filename, span)).with_message(&problem.message))
                .finish()
                .write((filename, Source::from(source_code)), &mut report_bytes);
            match written {
                Ok(()) => rendered.push_str(&String::from_utf8_lossy(&report_bytes)),
                Err(_) => {
                    rendered.push_str(&problem.to_string());
                    rendered.push('\n');
                }
            }
        }
        rendered
    }
}

/// One problem per line.
impl fmt::Display for ProblemReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, problem) in self.problems.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{problem}")?;
        }
        Ok(())
    }
}

impl FromIterator<Problem> for ProblemReport {
    fn from_iter<T: IntoIterator<Item = Problem>>(iter: T) -> Self {
        Self {
            problems: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_lines() {
        let report: ProblemReport = [
            Problem::new("undefined name 'a'").in_definition("demo.x"),
            Problem::new("undefined name 'b'"),
        ]
        .into_iter()
        .collect();
        assert_eq!(report.to_string(), "demo.x: undefined name 'a'\nundefined name 'b'");
    }

    #[test]
    fn test_render_mentions_filename() {
        let mut report = ProblemReport::new();
        report.push(Problem::new("undefined name 'nope'").with_span(4..8));
        let rendered = report.render("demo.canto", "x = nope");
        assert!(rendered.contains("demo.canto"));
        assert!(rendered.contains("undefined name 'nope'"));
    }
}
