use thiserror::Error;

use crate::slot::SlotKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("malformed slot '{text}': {reason}")]
    Malformed { text: String, reason: &'static str },
    #[error("slot '{slot}' is not of kind {expected}")]
    WrongKind { slot: String, expected: SlotKind },
    #[error("invalid capdata: {0}")]
    InvalidCapData(String),
}

impl SlotError {
    pub(crate) fn malformed(text: &str, reason: &'static str) -> Self {
        SlotError::Malformed {
            text: text.to_string(),
            reason,
        }
    }
}
