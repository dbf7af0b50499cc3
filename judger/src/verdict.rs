use std::fmt::Display;

use serde::Serialize;

/// Outcome classification of one sandboxed attempt
///
/// Only [`Verdict::Accepted`] is a success, every other verdict ends the attempt.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Waiting,
    Compiling,
    Accepted,
    WrongAnswer,
    RuntimeError,
    TimeLimitExceeded,
    IdlenessLimitExceeded,
    MemoryLimitExceeded,
    OutputLimitExceeded,
    Point,
    CompileError,
    TestCaseError,
    JudgeError,
    SystemError,
    Finished,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Verdict::Waiting => "Waiting",
            Verdict::Compiling => "Compiling",
            Verdict::Accepted => "Accepted",
            Verdict::WrongAnswer => "Wrong Answer",
            Verdict::RuntimeError => "Runtime Error",
            Verdict::TimeLimitExceeded => "Time Limit Exceeded",
            Verdict::IdlenessLimitExceeded => "Idleness Limit Exceeded",
            Verdict::MemoryLimitExceeded => "Memory Limit Exceeded",
            Verdict::OutputLimitExceeded => "Output Limit Exceeded",
            Verdict::Point => "Point",
            Verdict::CompileError => "Compile Error",
            Verdict::TestCaseError => "Testcase Error",
            Verdict::JudgeError => "Judge Error",
            Verdict::SystemError => "System Error",
            Verdict::Finished => "Finished",
        };
        write!(f, "{}", text)
    }
}

/// Heads of the files a caller asked to see
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub stdout: String,
    pub checker_out: String,
}

/// Result of one sandboxed invocation
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub verdict: Verdict,
    /// cpu time in milliseconds
    pub time: u64,
    /// wall time in milliseconds
    pub real_time: u64,
    /// peak memory in KiB
    pub memory: u64,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,
}

impl RunResult {
    pub fn report_mut(&mut self) -> &mut Report {
        self.report.get_or_insert_with(Default::default)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn only_accepted_succeeds() {
        assert!(Verdict::Accepted.is_accepted());
        assert!(!Verdict::Point.is_accepted());
        assert!(!Verdict::Finished.is_accepted());
    }

    #[test]
    fn report_is_created_on_demand() {
        let mut result = RunResult {
            verdict: Verdict::Accepted,
            time: 0,
            real_time: 0,
            memory: 0,
            exit_code: 0,
            signal: None,
            message: None,
            report: None,
        };
        result.report_mut().stdout = "2".to_owned();
        assert_eq!(result.report.unwrap().stdout, "2");
    }
}
