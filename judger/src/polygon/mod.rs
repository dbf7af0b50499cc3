//! Build the testcases of a problem from its generators and model solution

use serde::{Deserialize, Serialize};

mod build;

pub use build::build;

/// A program of the problem, its source stored remotely as `<problem>/<fullname>`
#[derive(Deserialize, Debug, Clone)]
pub struct BuildCode {
    pub id: u32,
    pub name: String,
    pub language: String,
    pub fullname: String,
}

/// Where the input of one testcase comes from
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TestcaseConfig {
    /// a static file at `<problem>/static/<filename>`
    File {
        filename: String,
        #[serde(default)]
        example: bool,
    },
    /// the output of a generator run with `args`
    Generator {
        generator: u32,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        example: bool,
    },
}

#[derive(Deserialize, Debug, Clone)]
pub struct BuildTask {
    pub problem: String,
    pub version: u32,
    pub checker: BuildCode,
    pub validator: BuildCode,
    pub solution: BuildCode,
    #[serde(default)]
    pub generators: Vec<BuildCode>,
    pub testcases: Vec<TestcaseConfig>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Start,
    Compile,
    CompileError,
    Download,
    GenIn,
    Validate,
    GenAns,
    Upload,
    End,
    Error,
}

/// Progress notification of a build
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct BuildMessage {
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// program being compiled or run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// 1-based index into the testcases
    #[serde(skip_serializing_if = "Option::is_none")]
    pub testcase: Option<usize>,
}

impl BuildMessage {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            message: None,
            name: None,
            testcase: None,
        }
    }
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_owned());
        self
    }
    pub fn testcase(mut self, index: usize) -> Self {
        self.testcase = Some(index);
        self
    }
    pub fn message(mut self, message: String) -> Self {
        self.message = Some(message);
        self
    }
}
