use thiserror::Error;

use crate::templates::EntityKind;

/// A subscription row that cannot be placed in the hierarchy at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataIntegrityError {
    #[error("record {record} is missing required field `{field}`")]
    MissingField { record: String, field: &'static str },
}

/// A field that failed to parse and was replaced by a safe default.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataCoercionError {
    #[error("`{raw}` is not a number, coerced to 0")]
    Number { raw: String },
    #[error("`{raw}` is not a date, dropped")]
    Date { raw: String },
    #[error("`{raw}` is not a flag, dropped")]
    Flag { raw: String },
}

#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("token endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("access token not found in token response")]
    MissingToken,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("remote store returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Fatal outcome of a submission job. Chunks delivered before the failure stay
/// delivered; `completed_chunks` says how many.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthenticationError),
    #[error("reauthentication for chunk {chunk} failed after {completed_chunks} delivered chunks: {source}")]
    Reauthentication {
        chunk: usize,
        completed_chunks: usize,
        #[source]
        source: AuthenticationError,
    },
    #[error("chunk {chunk} (items {start}:{end}) could not be delivered after {completed_chunks} delivered chunks: {source}")]
    Transport {
        chunk: usize,
        start: usize,
        end: usize,
        completed_chunks: usize,
        #[source]
        source: TransportError,
    },
    #[error("chunk {chunk} response is not a per-item outcome list: {source}")]
    MalformedResponse {
        chunk: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("chunk {chunk} could not be serialized: {source}")]
    Serialize {
        chunk: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("no template registered for entity kind `{0}`")]
    MissingTemplate(EntityKind),
    #[error("entity kind `{0}` only appears nested inside another document")]
    NotTopLevel(EntityKind),
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read template {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("template `{kind}` is not valid JSON: {source}")]
    Parse {
        kind: EntityKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("template `{0}` must be a JSON object or a non-empty array of objects")]
    Shape(EntityKind),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable `{0}` must be set")]
    Missing(&'static str),
    #[error("environment variable `{key}` has invalid value `{value}`")]
    Invalid { key: &'static str, value: String },
}

/// Failure of one pipeline stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}
