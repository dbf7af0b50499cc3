use std::collections::BTreeMap;

use serde::Deserialize;

use super::{
    spec::{CompileStep, Execute, LangProfile, Template, DEFAULT_OUT},
    LoadError,
};

/// language table as written in toml
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTable {
    #[serde(default)]
    pub lang: BTreeMap<String, RawLang>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawLang {
    pub source: String,
    pub extension: String,
    pub compile: Vec<RawCompile>,
    pub execute: RawExecute,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCompile {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub out: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawExecute {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

fn parse_all(args: Vec<String>) -> Result<Vec<Template>, LoadError> {
    args.iter().map(|arg| arg.parse()).collect()
}

impl RawLang {
    pub fn into_profile(self, id: String) -> Result<LangProfile, LoadError> {
        let compile = self
            .compile
            .into_iter()
            .map(|step| {
                Ok(CompileStep {
                    command: step.command,
                    args: parse_all(step.args)?,
                    out: step.out.unwrap_or_else(|| DEFAULT_OUT.to_owned()),
                })
            })
            .collect::<Result<Vec<_>, LoadError>>()?;

        LangProfile {
            id,
            source: self.source,
            compile,
            extension: self.extension,
            execute: Execute {
                command: self.execute.command.parse()?,
                args: parse_all(self.execute.args)?,
            },
        }
        .check()
    }
}

impl RawTable {
    pub fn from_str(content: &str) -> Result<Self, LoadError> {
        Ok(toml::from_str(content)?)
    }
    pub fn into_profiles(self) -> Result<Vec<LangProfile>, LoadError> {
        self.lang
            .into_iter()
            .map(|(id, lang)| lang.into_profile(id))
            .collect()
    }
}
