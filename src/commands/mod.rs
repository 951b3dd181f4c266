use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::rchain::api_docs::ApiDocsError;
use crate::rchain::chains::ChainError;
use crate::rchain::loaders::LoaderError;
use crate::rchain::provider::ChatModelError;

pub mod api;
pub mod ask;
pub mod config;
pub mod options;
pub mod output;
pub mod pdf;
pub mod wiki;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Chat(#[from] ChatModelError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error(transparent)]
    ApiDocs(#[from] ApiDocsError),
    #[error("Failed to read {what} from stdin: {source}")]
    Stdin {
        what: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("Failed to create output directory '{}': {source}", path.display())]
    SaveDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write output file '{}': {source}", path.display())]
    SaveWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Uses the argument when given, otherwise reads all of stdin. Blank input is an error.
pub(crate) fn read_input(arg: Option<String>, what: &'static str) -> Result<String, CliError> {
    let text = match arg {
        Some(text) => text,
        None => {
            let mut stdin = io::stdin();
            if stdin.is_terminal() {
                return Err(missing_input(what));
            }
            let mut buffer = String::new();
            stdin
                .read_to_string(&mut buffer)
                .map_err(|source| CliError::Stdin { what, source })?;
            buffer
        }
    };

    if text.trim().is_empty() {
        return Err(missing_input(what));
    }
    Ok(text)
}

fn missing_input(what: &'static str) -> CliError {
    CliError::Usage(format!(
        "No {what} provided. Pass it as an argument or pipe it on stdin."
    ))
}
