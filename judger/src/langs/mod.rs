use std::{collections::BTreeMap, path::Path, sync::Arc};

use thiserror::Error;
use tokio::fs;

use crate::error::Error;

mod raw;
pub mod spec;

pub use spec::{CompileStep, Execute, LangProfile, Template, Var, Vars};

static BUILTIN: &str = include_str!("builtin.toml");

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("`{0}`")]
    Serde(#[from] toml::de::Error),
    #[error("`{0}`")]
    Io(#[from] std::io::Error),
    #[error("Unknown placeholder `${{{0}}}`")]
    Placeholder(String),
    #[error("Unclosed placeholder in `{0}`")]
    Unclosed(String),
    #[error("Language <{0}> uses `${{{2}}}` in its {1} command")]
    Misplaced(String, &'static str, &'static str),
    #[error("Language <{0}> has no compile step")]
    NoCompileStep(String),
}

/// Registry of language profiles
///
/// Built once at startup, then shared behind an [`Arc`] while judging.
/// [`Langs::set`] takes `&mut self`, so registration can't race with lookups.
#[derive(Debug, Default, Clone)]
pub struct Langs {
    table: BTreeMap<String, Arc<LangProfile>>,
}

impl Langs {
    /// registry holding the built-in table
    pub fn builtin() -> Result<Self, LoadError> {
        let mut langs = Self::default();
        langs.extend_from_str(BUILTIN)?;
        Ok(langs)
    }
    /// add (or override) every profile of a toml table
    pub fn extend_from_str(&mut self, content: &str) -> Result<(), LoadError> {
        for profile in raw::RawTable::from_str(content)?.into_profiles()? {
            self.set(profile.id.clone(), profile);
        }
        Ok(())
    }
    pub async fn extend_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        log::trace!("Loading languages from {}", path.as_ref().to_string_lossy());
        let content = fs::read_to_string(path.as_ref()).await?;
        self.extend_from_str(&content)
    }
    pub fn get(&self, id: &str) -> Result<Arc<LangProfile>, Error> {
        self.table
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnsupportedLanguage(id.to_owned()))
    }
    pub fn set(&mut self, id: impl Into<String>, mut profile: LangProfile) {
        let id = id.into();
        profile.id = id.clone();
        if self.table.insert(id.clone(), Arc::new(profile)).is_some() {
            log::debug!("Language <{}> overridden", id);
        }
    }
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }
}
