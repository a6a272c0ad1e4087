use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort startup: configuration loading, function
/// registration and processor construction.
///
/// Per-message failures (a rejected filter, a failing user function, a
/// routed message produced mid-chain) are not represented here; they are
/// logged and the message is dropped.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid topic rule `{0}`")]
    InvalidTopic(String),
    #[error("function `{0}` is already registered")]
    DuplicateName(String),
    #[error("function `{0}` is not registered")]
    UnknownFunction(String),
    #[error("function `{function}` takes {expected} configured argument(s), config gives {given}")]
    ArityMismatch {
        function: String,
        expected: usize,
        given: usize,
    },
    #[error("function `{function}` has no parameter named `{argument}`")]
    UnexpectedArgument { function: String, argument: String },
    #[error("topic `{topic}` does not match pattern `{pattern}`")]
    CompositionMismatch { pattern: String, topic: String },
    #[error("sink template `{template}` references `{{{placeholder}}}`, which the source pattern does not capture")]
    UnboundSinkPlaceholder {
        template: String,
        placeholder: String,
    },
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Mqtt(#[from] rumqttc::ClientError),
}
