//! Error type shared by the solution patcher and the `.vcxproj` synthesizer.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("IO error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The project document lacks an element the synthesizer depends on.
    #[error("Malformed project: {0}")]
    Structure(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Condition error: {0}")]
    Condition(String),

    /// One or more project files failed while a solution was being patched.
    #[error("{} project file(s) failed: {}", failed.len(), list_paths(failed))]
    Batch { failed: Vec<PathBuf> },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn structure(message: impl Into<String>) -> Self {
        Self::Structure(message.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

fn list_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
