//! Shared small types used across Virus/Tool/Event/activation mask: the
//! queue-effect codes (§4.7, §6) and the "carry prior state" sentinel (§6).

use crate::error::EngineError;

/// Sentinel meaning "carry the prior state" / "use the declared default",
/// distinct from any valid state id. The upstream C++ source uses `-99`;
/// this crate keeps that constant for interoperability with ported fixtures.
pub const UNCHANGED_STATE: i32 = -99;

/// The five legal queue-effect codes from spec §4.7/§6. Negative variants
/// are the exact inverse of their positive counterpart (decrement instead of
/// increment).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEffect {
    NoOne,
    OnlySelf,
    Everyone,
    NegOnlySelf,
    NegEveryone,
}

impl QueueEffect {
    /// The `{-2,-1,0,1,2}` wire encoding named in spec §6.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            QueueEffect::NoOne => 0,
            QueueEffect::OnlySelf => 1,
            QueueEffect::Everyone => 2,
            QueueEffect::NegOnlySelf => -1,
            QueueEffect::NegEveryone => -2,
        }
    }

    /// Parses a wire code, failing with `InvalidQueueOp` outside the five
    /// legal values.
    pub fn from_code(code: i32) -> Result<Self, EngineError> {
        match code {
            0 => Ok(QueueEffect::NoOne),
            1 => Ok(QueueEffect::OnlySelf),
            2 => Ok(QueueEffect::Everyone),
            -1 => Ok(QueueEffect::NegOnlySelf),
            -2 => Ok(QueueEffect::NegEveryone),
            other => Err(EngineError::InvalidQueueOp(format!(
                "queue-effect code {other} is outside the five legal values"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_legal_codes() {
        for c in [-2, -1, 0, 1, 2] {
            let effect = QueueEffect::from_code(c).unwrap();
            assert_eq!(effect.code(), c);
        }
    }

    #[test]
    fn rejects_illegal_codes() {
        assert!(QueueEffect::from_code(3).is_err());
        assert!(QueueEffect::from_code(-3).is_err());
    }
}
