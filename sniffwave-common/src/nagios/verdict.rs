use std::fmt;

/// Monitoring-plugin state, ordered by escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl Severity {
    /// Process exit code for this state.
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
            Severity::Unknown => "UNKNOWN",
        }
    }

    /// Combine two sub-check states; the more severe one wins.
    pub fn resolve(self, other: Severity) -> Severity {
        self.max(other)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One performance measurement, rendered `'label'=value;warn;crit`.
#[derive(Debug, Clone, PartialEq)]
pub struct PerfData {
    pub label: String,
    pub value: f64,
    pub warning: Option<String>,
    pub critical: Option<String>,
}

impl PerfData {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
            warning: None,
            critical: None,
        }
    }

    pub fn with_warning(mut self, warning: impl fmt::Display) -> Self {
        self.warning = Some(warning.to_string());
        self
    }

    pub fn with_critical(mut self, critical: impl fmt::Display) -> Self {
        self.critical = Some(critical.to_string());
        self
    }
}

impl fmt::Display for PerfData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}'={};{};{}",
            self.label,
            self.value,
            self.warning.as_deref().unwrap_or_default(),
            self.critical.as_deref().unwrap_or_default()
        )
    }
}

/// Result of a health check run.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub severity: Severity,
    pub summary: String,
    pub perfdata: Vec<PerfData>,
    /// One line per channel.
    pub details: Vec<String>,
}

impl Verdict {
    /// Verdict for a check that could not be evaluated at all.
    pub fn unknown(reason: impl fmt::Display) -> Self {
        Self {
            severity: Severity::Unknown,
            summary: format!("{} - {}", Severity::Unknown, reason),
            perfdata: Vec::new(),
            details: Vec::new(),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary)?;
        for (idx, perf) in self.perfdata.iter().enumerate() {
            let sep = if idx == 0 { " | " } else { " " };
            write!(f, "{}{}", sep, perf)?;
        }
        for line in &self.details {
            write!(f, "\n{}", line)?;
        }
        Ok(())
    }
}
