//! Error taxonomy shared by the pipeline.
//!
//! Every failure is one of three classes, each with a fixed recovery policy:
//!
//! | class          | examples                              | policy              |
//! |----------------|---------------------------------------|---------------------|
//! | configuration  | missing API key, bad chunk settings   | fail fast           |
//! | service        | embedding / vector store / LLM errors | report and continue |
//! | data           | unreadable PDF, empty question        | report and continue |
//!
//! "Continue" applies to interactive surfaces (the chat loop keeps its session).
//! Ingestion is all-or-nothing: any error ends the run.

use crate::config::ConfigError;
use crate::index::IndexError;
use crate::voice::VoiceError;
use crate::watcher::WatchError;

/// Failure of a call to a hosted service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{service} request failed: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("{service} response could not be decoded: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
    #[error("{service} returned no {what}")]
    Empty {
        service: &'static str,
        what: &'static str,
    },
    #[error("Ollama request failed: {0}")]
    Ollama(#[from] ollama_rs::error::OllamaError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Configuration,
    Service,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Stop the process with a non-zero exit code.
    FailFast,
    /// Show the error and keep going (the current turn is lost).
    ReportAndContinue,
}

impl ErrorClass {
    pub fn recovery(self) -> Recovery {
        match self {
            ErrorClass::Configuration => Recovery::FailFast,
            ErrorClass::Service | ErrorClass::Data => Recovery::ReportAndContinue,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Watch(#[from] WatchError),
    #[error(transparent)]
    Voice(#[from] VoiceError),
    #[error("question is empty")]
    EmptyQuestion,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Config(_) | Error::Watch(_) => ErrorClass::Configuration,
            Error::Service(_) => ErrorClass::Service,
            Error::Index(e) => e.class(),
            Error::Voice(e) => e.class(),
            Error::EmptyQuestion => ErrorClass::Data,
        }
    }

    pub fn recovery(&self) -> Recovery {
        self.class().recovery()
    }
}
