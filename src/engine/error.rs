use crate::engine::accessor::MemberKey;

use thiserror::Error;

/// Failure reading or writing one member.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("no accessor registered for {0}")]
    NoAccessor(MemberKey),

    #[error("{key} expects a {expected} object, found {found}")]
    WrongType {
        key: MemberKey,
        expected: String,
        found: String,
    },

    #[error("{0} is read-only")]
    ReadOnly(MemberKey),

    #[error("accessing {key} failed: {message}")]
    Failed { key: MemberKey, message: String },
}

impl AccessError {
    pub fn failed(key: &MemberKey, message: impl Into<String>) -> Self {
        Self::Failed {
            key: key.clone(),
            message: message.into(),
        }
    }
}

/// Terminal failure of one chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("{path}: value feeding `{member}` is {found}, not an object")]
    NotAnObject {
        path: String,
        member: String,
        found: String,
    },
}

/// Binding construction failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("{path} does not end in a settable member (`{member}`)")]
    NotSettable { path: String, member: String },

    #[error(transparent)]
    Access(#[from] AccessError),
}
