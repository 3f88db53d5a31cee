//! Structural message statistics.

use serde::{Deserialize, Serialize};

pub const MSG_LENGTH: &str = "msg_length";
pub const SPECIAL_CHARS: &str = "special_chars";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralStats {
    /// Characters (not bytes) in the message
    pub msg_length: usize,
    /// Characters outside `[a-zA-Z0-9]` that are not whitespace
    pub special_chars: usize,
}

impl StructuralStats {
    pub fn from_message(message: &str) -> Self {
        let mut s = StructuralStats::default();
        for c in message.chars() {
            s.msg_length += 1;
            if !c.is_ascii_alphanumeric() && !c.is_whitespace() {
                s.special_chars += 1;
            }
        }
        s
    }

    pub fn to_vector(&self) -> [f64; 2] {
        [self.msg_length as f64, self.special_chars as f64]
    }
}
