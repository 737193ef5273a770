//! Payment status state machine.

use serde::{Deserialize, Serialize};

use crate::error::ParseEnumError;

/// The status of a payment.
///
/// ```text
/// Pending ──┬──► Success
///           └──► Failed
/// ```
///
/// Both `Success` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

/// The outcome reported by the gateway for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Success,
    Failed,
}

impl PaymentOutcome {
    /// The status a pending payment moves to under this outcome.
    pub fn target_status(&self) -> PaymentStatus {
        match self {
            PaymentOutcome::Success => PaymentStatus::Success,
            PaymentOutcome::Failed => PaymentStatus::Failed,
        }
    }
}

/// What applying an outcome to a payment did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The payment was pending and moved to `to`.
    Applied {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// The payment was already terminal; nothing changes.
    AlreadySettled(PaymentStatus),
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// Decides the transition for an outcome given the current status.
    ///
    /// Only a pending payment moves. A settled payment is reported as such,
    /// whatever the outcome, so that redelivered notifications are no-ops.
    pub fn apply(&self, outcome: PaymentOutcome) -> Transition {
        match self {
            PaymentStatus::Pending => Transition::Applied {
                from: *self,
                to: outcome.target_status(),
            },
            settled => Transition::AlreadySettled(*settled),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "success" => Ok(PaymentStatus::Success),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(ParseEnumError::new("payment status", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_moves_to_outcome() {
        assert_eq!(
            PaymentStatus::Pending.apply(PaymentOutcome::Success),
            Transition::Applied {
                from: PaymentStatus::Pending,
                to: PaymentStatus::Success
            }
        );
        assert_eq!(
            PaymentStatus::Pending.apply(PaymentOutcome::Failed),
            Transition::Applied {
                from: PaymentStatus::Pending,
                to: PaymentStatus::Failed
            }
        );
    }

    #[test]
    fn test_terminal_states_do_not_move() {
        for settled in [PaymentStatus::Success, PaymentStatus::Failed] {
            assert!(settled.is_terminal());
            for outcome in [PaymentOutcome::Success, PaymentOutcome::Failed] {
                assert_eq!(settled.apply(outcome), Transition::AlreadySettled(settled));
            }
        }
        assert!(!PaymentStatus::Pending.is_terminal());
    }

    #[test]
    fn test_parse() {
        assert_eq!("success".parse(), Ok(PaymentStatus::Success));
        assert_eq!(
            "abandoned".parse::<PaymentStatus>(),
            Err(ParseEnumError::new("payment status", "abandoned"))
        );
    }
}
