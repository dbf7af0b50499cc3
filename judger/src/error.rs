use crate::{langs::LoadError, sandbox::RunArgsBuilderError, verdict::Verdict};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unsupported language <{0}>")]
    UnsupportedLanguage(String),
    #[error("{0}")]
    Compile(String),
    #[error("Testcase error: `{0}`")]
    TestCase(String),
    #[error("Judge error: `{0}`")]
    Judge(String),
    #[error("System error: `{0}`")]
    System(String),
    #[error("IO error: `{0}`")]
    Io(#[from] std::io::Error),
    #[error("Incomplete sandbox arguments: `{0}`")]
    RunArgs(#[from] RunArgsBuilderError),
    #[error("Fail to load language table: `{0}`")]
    Langs(#[from] LoadError),
}

impl Error {
    /// the verdict an orchestrator reports when an attempt ends with this error
    pub fn verdict(&self) -> Verdict {
        match self {
            Error::Compile(_) => Verdict::CompileError,
            Error::TestCase(_) => Verdict::TestCaseError,
            Error::Judge(_) => Verdict::JudgeError,
            Error::UnsupportedLanguage(_)
            | Error::System(_)
            | Error::Io(_)
            | Error::RunArgs(_)
            | Error::Langs(_) => Verdict::SystemError,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verdict_class() {
        assert_eq!(
            Error::Compile("a.cpp:1: error".to_owned()).verdict(),
            Verdict::CompileError
        );
        assert_eq!(
            Error::TestCase("missing 1.in".to_owned()).verdict(),
            Verdict::TestCaseError
        );
        assert_eq!(Error::Judge(String::new()).verdict(), Verdict::JudgeError);
        assert_eq!(
            Error::UnsupportedLanguage("brainfuck".to_owned()).verdict(),
            Verdict::SystemError
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "nsjail");
        assert_eq!(Error::from(io).verdict(), Verdict::SystemError);
    }
}
