//! Error taxonomy shared by every WLU crate.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code, message and context carried by each [`WluError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable snake_case identifier tests and callers match on.
    pub code: String,
    /// What went wrong.
    pub message: String,
    /// Labels locating the failure: dataset, task id, run id, step.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// How to fix it, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Payload with empty context and no hint.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds or replaces one context label.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Attaches a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if !self.context.is_empty() {
            let pairs: Vec<String> = self.context.iter().map(|(k, v)| format!("{k}={v}")).collect();
            write!(f, " ({})", pairs.join(", "))?;
        }
        match &self.hint {
            Some(hint) => write!(f, "; hint: {hint}"),
            None => Ok(()),
        }
    }
}

/// Failure families of the experiment engine. Serialized with the family
/// name as tag so persisted errors stay matchable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum WluError {
    /// A train/test split cannot be satisfied for an environment.
    #[error("split error: {0}")]
    Split(ErrorInfo),
    /// Fit, predict or evaluate failed.
    #[error("model error: {0}")]
    Model(ErrorInfo),
    /// Opening, closing or logging to a tracked run failed.
    #[error("tracking error: {0}")]
    Tracking(ErrorInfo),
    /// A dataset could not be read or has the wrong shape.
    #[error("data error: {0}")]
    Data(ErrorInfo),
    /// Flags, config file or planning inputs are invalid.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Encoding or decoding a payload failed.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
    /// A task saw its cancellation token between phases.
    #[error("cancelled: {0}")]
    Cancelled(ErrorInfo),
}

impl WluError {
    /// Payload of any family.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            WluError::Split(info)
            | WluError::Model(info)
            | WluError::Tracking(info)
            | WluError::Data(info)
            | WluError::Config(info)
            | WluError::Serde(info)
            | WluError::Cancelled(info) => info,
        }
    }

    /// Same error with one more context label.
    pub fn with_context(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let wrap = |info: ErrorInfo| info.with_context(key, value);
        match self {
            WluError::Split(info) => WluError::Split(wrap(info)),
            WluError::Model(info) => WluError::Model(wrap(info)),
            WluError::Tracking(info) => WluError::Tracking(wrap(info)),
            WluError::Data(info) => WluError::Data(wrap(info)),
            WluError::Config(info) => WluError::Config(wrap(info)),
            WluError::Serde(info) => WluError::Serde(wrap(info)),
            WluError::Cancelled(info) => WluError::Cancelled(wrap(info)),
        }
    }

    /// Model failure from any displayable cause.
    pub fn model(code: &str, err: impl ToString) -> Self {
        WluError::Model(ErrorInfo::new(code, err.to_string()))
    }

    /// Tracking failure from any displayable cause.
    pub fn tracking(code: &str, err: impl ToString) -> Self {
        WluError::Tracking(ErrorInfo::new(code, err.to_string()))
    }

    /// Serialization failure from any displayable cause.
    pub fn serde(code: &str, err: impl ToString) -> Self {
        WluError::Serde(ErrorInfo::new(code, err.to_string()))
    }

    /// True for failures of the tracking backend, which tasks tolerate.
    pub fn is_tracking(&self) -> bool {
        matches!(self, WluError::Tracking(_))
    }

    /// Lower-case family name, as used in the serialized tag.
    pub fn family(&self) -> &'static str {
        match self {
            WluError::Split(_) => "split",
            WluError::Model(_) => "model",
            WluError::Tracking(_) => "tracking",
            WluError::Data(_) => "data",
            WluError::Config(_) => "config",
            WluError::Serde(_) => "serde",
            WluError::Cancelled(_) => "cancelled",
        }
    }

    /// Re-files a failure raised inside a model step as a model error.
    ///
    /// Code, message, context and hint are kept and the source family is
    /// recorded under `family`. Model and cancellation errors pass through.
    pub fn into_model(self) -> Self {
        match self {
            WluError::Model(_) | WluError::Cancelled(_) => self,
            other => {
                let family = other.family();
                let info = other.info().clone().with_context("family", family);
                WluError::Model(info)
            }
        }
    }
}
