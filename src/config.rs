use std::{env, ffi::OsString, path::PathBuf};

use crate::{diagnostics::Result, throw};

/// Installation prefix the default search path is derived from.
pub const PREFIX: &str = match option_env!("RESIN_PREFIX") {
    Some(prefix) => prefix,
    None => "/usr/local",
};

pub const SEARCH_PATH_ENV: &str = "RESIN_PATH";

pub const SCRIPT_SUFFIX: &str = ".rsn";

pub fn default_search_path() -> Vec<String> {
    vec![format!("{PREFIX}/lib/resin"), format!("{PREFIX}/share/resin")]
}

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub search_path: Vec<String>,
    pub arguments: Vec<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            search_path: default_search_path(),
            arguments: Vec::new(),
        }
    }
}

impl HostConfig {
    /// Defaults with the directories of `RESIN_PATH` placed in front.
    pub fn from_env() -> Result<Self> {
        let config = Self::default();
        match env::var_os(SEARCH_PATH_ENV) {
            Some(value) => config.with_env_path(&value),
            None => Ok(config),
        }
    }

    fn with_env_path(self, value: &OsString) -> Result<Self> {
        let mut dirs = Vec::new();
        for dir in env::split_paths(value) {
            if dir.as_os_str().is_empty() {
                continue;
            }
            match dir.into_os_string().into_string() {
                Ok(dir) => dirs.push(dir),
                Err(raw) => throw!(
                    Config,
                    "{SEARCH_PATH_ENV} entry '{}' is not valid UTF-8",
                    raw.to_string_lossy()
                ),
            }
        }
        tracing::debug!(?dirs, "search path entries from {SEARCH_PATH_ENV}");
        Ok(self.with_search_dirs(dirs))
    }

    /// Places `dirs` in front of the current entries, keeping their order.
    pub fn with_search_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut front: Vec<String> = dirs.into_iter().map(Into::into).collect();
        front.append(&mut self.search_path);
        self.search_path = front;
        self
    }

    pub fn with_include_dirs(self, dirs: Vec<PathBuf>) -> Result<Self> {
        let mut converted = Vec::with_capacity(dirs.len());
        for dir in dirs {
            match dir.into_os_string().into_string() {
                Ok(dir) => converted.push(dir),
                Err(raw) => throw!(
                    Config,
                    "include directory '{}' is not valid UTF-8",
                    raw.to_string_lossy()
                ),
            }
        }
        Ok(self.with_search_dirs(converted))
    }

    pub fn with_arguments(mut self, arguments: Vec<String>) -> Self {
        self.arguments = arguments;
        self
    }
}
