//! TOML document loading and saving

use crate::{Error, NormalizedPath, Result, io};
use serde::{Serialize, de::DeserializeOwned};

/// Document store for the TOML files in a store root.
///
/// The format is checked against the file extension so a misnamed path
/// fails loudly instead of being parsed as the wrong thing. Saves go
/// through [`io::write_atomic`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigStore;

impl ConfigStore {
    pub fn new() -> Self {
        Self
    }

    /// Load a document, returning `None` when the file does not exist.
    pub fn load_if_exists<T: DeserializeOwned>(&self, path: &NormalizedPath) -> Result<Option<T>> {
        match io::read_text_if_exists(path)? {
            Some(content) => self.parse(path, &content).map(Some),
            None => Ok(None),
        }
    }

    /// Parse already-read content as the document at `path`.
    pub fn parse<T: DeserializeOwned>(&self, path: &NormalizedPath, content: &str) -> Result<T> {
        check_format(path)?;
        toml::from_str(content).map_err(|e| Error::ConfigParse {
            path: path.to_native(),
            format: "TOML".into(),
            message: e.to_string(),
        })
    }

    /// Serialize a document for `path`.
    pub fn render<T: Serialize>(&self, path: &NormalizedPath, value: &T) -> Result<String> {
        check_format(path)?;
        toml::to_string_pretty(value).map_err(|e| Error::ConfigSerialize {
            path: path.to_native(),
            format: "TOML".into(),
            message: e.to_string(),
        })
    }

    /// Save a document to a file atomically.
    pub fn save<T: Serialize>(&self, path: &NormalizedPath, value: &T) -> Result<()> {
        let content = self.render(path, value)?;
        io::write_atomic(path, content.as_bytes())
    }
}

fn check_format(path: &NormalizedPath) -> Result<()> {
    let extension = path.extension().unwrap_or("");
    if extension.eq_ignore_ascii_case("toml") {
        Ok(())
    } else {
        Err(Error::UnsupportedFormat {
            extension: extension.to_string(),
        })
    }
}
