use std::str::FromStr;

use super::LoadError;

/// default output name of a compile step
pub static DEFAULT_OUT: &str = "compile.out";

/// Variables a template may refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Var {
    SourceFile,
    CompiledFile,
    ExecutableFile,
}

impl Var {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "sourceFile" => Some(Var::SourceFile),
            "compiledFile" => Some(Var::CompiledFile),
            "executableFile" => Some(Var::ExecutableFile),
            _ => None,
        }
    }
    pub fn name(&self) -> &'static str {
        match self {
            Var::SourceFile => "sourceFile",
            Var::CompiledFile => "compiledFile",
            Var::ExecutableFile => "executableFile",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Var(Var),
}

/// A command line argument with placeholders, parsed once when the profile is loaded
///
/// Substituted values are spliced into an already split argument, they are
/// never parsed again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template(Vec<Segment>);

impl FromStr for Template {
    type Err = LoadError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut segments = Vec::new();
        let mut rest = raw;
        while let Some(start) = rest.find("${") {
            if start > 0 {
                segments.push(Segment::Text(rest[..start].to_owned()));
            }
            let tail = &rest[start + 2..];
            let end = tail
                .find('}')
                .ok_or_else(|| LoadError::Unclosed(raw.to_owned()))?;
            let var = Var::from_name(&tail[..end])
                .ok_or_else(|| LoadError::Placeholder(tail[..end].to_owned()))?;
            segments.push(Segment::Var(var));
            rest = &tail[end + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_owned()));
        }
        Ok(Self(segments))
    }
}

/// Values bound to [`Var`] when resolving a [`Template`]
#[derive(Debug, Default, Clone, Copy)]
pub struct Vars<'a> {
    pub source_file: &'a str,
    pub compiled_file: &'a str,
    pub executable_file: &'a str,
}

impl<'a> Vars<'a> {
    fn get(&self, var: Var) -> &'a str {
        match var {
            Var::SourceFile => self.source_file,
            Var::CompiledFile => self.compiled_file,
            Var::ExecutableFile => self.executable_file,
        }
    }
}

impl Template {
    pub fn resolve(&self, vars: &Vars) -> String {
        self.0
            .iter()
            .map(|segment| match segment {
                Segment::Text(text) => text.as_str(),
                Segment::Var(var) => vars.get(*var),
            })
            .collect()
    }
    pub(super) fn vars(&self) -> impl Iterator<Item = Var> + '_ {
        self.0.iter().filter_map(|segment| match segment {
            Segment::Var(var) => Some(*var),
            Segment::Text(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileStep {
    pub command: String,
    pub args: Vec<Template>,
    /// file the step leaves in the compile directory
    pub out: String,
}

impl CompileStep {
    pub fn bind(&self, source_file: &str) -> Vec<String> {
        let vars = Vars {
            source_file,
            compiled_file: &self.out,
            ..Default::default()
        };
        self.args.iter().map(|arg| arg.resolve(&vars)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execute {
    pub command: Template,
    pub args: Vec<Template>,
}

/// Static description of how to build and start a program of one language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LangProfile {
    pub id: String,
    pub source: String,
    pub compile: Vec<CompileStep>,
    pub extension: String,
    pub execute: Execute,
}

impl LangProfile {
    /// check the invariants every profile must hold
    ///
    /// 1. at least one compile step
    /// 2. compile steps use `${sourceFile}`/`${compiledFile}` only
    /// 3. the execute command uses `${executableFile}` only
    pub fn check(self) -> Result<Self, LoadError> {
        if self.compile.is_empty() {
            return Err(LoadError::NoCompileStep(self.id));
        }
        for step in &self.compile {
            if let Some(var) = step
                .args
                .iter()
                .flat_map(Template::vars)
                .find(|var| *var == Var::ExecutableFile)
            {
                return Err(LoadError::Misplaced(self.id, "compile", var.name()));
            }
        }
        if let Some(var) = std::iter::once(&self.execute.command)
            .chain(self.execute.args.iter())
            .flat_map(Template::vars)
            .find(|var| *var != Var::ExecutableFile)
        {
            return Err(LoadError::Misplaced(self.id, "execute", var.name()));
        }
        Ok(self)
    }
    /// name of the artifact the last compile step leaves behind
    pub fn artifact(&self) -> &str {
        self.compile
            .last()
            .map(|step| step.out.as_str())
            .unwrap_or(DEFAULT_OUT)
    }
    /// resolve the execute command for an artifact named `executable_file`
    pub fn bind_execute(&self, executable_file: &str) -> (String, Vec<String>) {
        let vars = Vars {
            executable_file,
            ..Default::default()
        };
        (
            self.execute.command.resolve(&vars),
            self.execute
                .args
                .iter()
                .map(|arg| arg.resolve(&vars))
                .collect(),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_template() {
        let template: Template = "./${executableFile}".parse().unwrap();
        let vars = Vars {
            executable_file: "a1b2.bin",
            ..Default::default()
        };
        assert_eq!(template.resolve(&vars), "./a1b2.bin");

        let template: Template = "-o".parse().unwrap();
        assert_eq!(template.resolve(&vars), "-o");
    }

    #[test]
    fn reject_unknown_placeholder() {
        assert!(matches!(
            "${HOME}/.bashrc".parse::<Template>(),
            Err(LoadError::Placeholder(x)) if x == "HOME"
        ));
        assert!(matches!(
            "${sourceFile".parse::<Template>(),
            Err(LoadError::Unclosed(_))
        ));
    }

    #[test]
    fn substituted_value_is_not_reparsed() {
        let template: Template = "${executableFile}".parse().unwrap();
        let vars = Vars {
            executable_file: "${sourceFile}",
            ..Default::default()
        };
        assert_eq!(template.resolve(&vars), "${sourceFile}");
    }

    #[test]
    fn misplaced_placeholder() {
        let profile = LangProfile {
            id: "bad".to_owned(),
            source: "sub.c".to_owned(),
            compile: vec![CompileStep {
                command: "/usr/bin/gcc".to_owned(),
                args: vec!["${executableFile}".parse().unwrap()],
                out: DEFAULT_OUT.to_owned(),
            }],
            extension: "bin".to_owned(),
            execute: Execute {
                command: "./${executableFile}".parse().unwrap(),
                args: vec![],
            },
        };
        assert!(matches!(
            profile.check(),
            Err(LoadError::Misplaced(_, "compile", "executableFile"))
        ));
    }
}
