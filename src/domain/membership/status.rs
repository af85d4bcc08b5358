//! Membership status state machine.
//!
//! Defines the Verband membership states and the transitions the lifecycle
//! operations are allowed to perform.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Verband membership status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MembershipStatus {
    /// Registered but the signature is still missing.
    #[serde(rename = "ausstehend_unterschrift")]
    PendingSignature,

    /// Signed (or no signature required), waiting for payment.
    #[serde(rename = "ausstehend")]
    Pending,

    /// Paid or fee-exempt, inside a contract period.
    #[serde(rename = "aktiv")]
    Active,

    /// Past the minimum term, running without a fixed contract period.
    #[serde(rename = "vertragsfrei")]
    ContractFree,

    /// Cancelled. Terminal.
    #[serde(rename = "gekuendigt")]
    Cancelled,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::PendingSignature => "ausstehend_unterschrift",
            MembershipStatus::Pending => "ausstehend",
            MembershipStatus::Active => "aktiv",
            MembershipStatus::ContractFree => "vertragsfrei",
            MembershipStatus::Cancelled => "gekuendigt",
        }
    }

    /// Renewal is only offered to memberships that are running.
    pub fn is_renewable(&self) -> bool {
        matches!(self, MembershipStatus::Active | MembershipStatus::ContractFree)
    }

    /// Payment confirmation and fee exemption promote these to `aktiv`.
    pub fn awaits_activation(&self) -> bool {
        matches!(self, MembershipStatus::Pending)
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ausstehend_unterschrift" => Ok(MembershipStatus::PendingSignature),
            "ausstehend" => Ok(MembershipStatus::Pending),
            "aktiv" => Ok(MembershipStatus::Active),
            "vertragsfrei" => Ok(MembershipStatus::ContractFree),
            "gekuendigt" => Ok(MembershipStatus::Cancelled),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

impl StateMachine for MembershipStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use MembershipStatus::*;
        matches!(
            (self, target),
            // Signing
            (PendingSignature, Pending)
                | (PendingSignature, Cancelled)
            // Payment confirmation / fee exemption
                | (Pending, Active)
                | (Pending, Cancelled)
            // Renewal, administrative switch, cancellation
                | (Active, Active)
                | (Active, ContractFree)
                | (Active, Cancelled)
                | (ContractFree, Active)
                | (ContractFree, Cancelled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use MembershipStatus::*;
        match self {
            PendingSignature => vec![Pending, Cancelled],
            Pending => vec![Active, Cancelled],
            Active => vec![Active, ContractFree, Cancelled],
            ContractFree => vec![Active, Cancelled],
            Cancelled => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [MembershipStatus; 5] = [
        MembershipStatus::PendingSignature,
        MembershipStatus::Pending,
        MembershipStatus::Active,
        MembershipStatus::ContractFree,
        MembershipStatus::Cancelled,
    ];

    #[test]
    fn pending_signature_moves_to_pending_on_signing() {
        let result = MembershipStatus::PendingSignature.transition_to(MembershipStatus::Pending);
        assert_eq!(result, Ok(MembershipStatus::Pending));
    }

    #[test]
    fn pending_signature_cannot_skip_to_active() {
        assert!(!MembershipStatus::PendingSignature.can_transition_to(&MembershipStatus::Active));
    }

    #[test]
    fn pending_moves_to_active() {
        assert!(MembershipStatus::Pending.can_transition_to(&MembershipStatus::Active));
    }

    #[test]
    fn active_can_renew_into_itself() {
        assert!(MembershipStatus::Active.can_transition_to(&MembershipStatus::Active));
    }

    #[test]
    fn active_and_contract_free_switch_both_ways() {
        assert!(MembershipStatus::Active.can_transition_to(&MembershipStatus::ContractFree));
        assert!(MembershipStatus::ContractFree.can_transition_to(&MembershipStatus::Active));
    }

    #[test]
    fn every_non_terminal_status_can_be_cancelled() {
        for status in ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(
                status.can_transition_to(&MembershipStatus::Cancelled),
                "{:?} should be cancellable",
                status
            );
        }
    }

    #[test]
    fn cancelled_is_terminal() {
        assert!(MembershipStatus::Cancelled.is_terminal());
        for target in ALL {
            assert!(!MembershipStatus::Cancelled.can_transition_to(&target));
        }
    }

    #[test]
    fn only_running_memberships_are_renewable() {
        let renewable: Vec<_> = ALL.iter().filter(|s| s.is_renewable()).collect();
        assert_eq!(
            renewable,
            vec![&MembershipStatus::Active, &MembershipStatus::ContractFree]
        );
    }

    #[test]
    fn valid_transitions_match_can_transition_to() {
        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.valid_transitions().contains(&to),
                    from.can_transition_to(&to),
                    "{:?} -> {:?}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn serde_uses_german_names() {
        let json = serde_json::to_string(&MembershipStatus::PendingSignature).unwrap();
        assert_eq!(json, "\"ausstehend_unterschrift\"");
        let parsed: MembershipStatus = serde_json::from_str("\"vertragsfrei\"").unwrap();
        assert_eq!(parsed, MembershipStatus::ContractFree);
    }

    #[test]
    fn from_str_agrees_with_as_str() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<MembershipStatus>(), Ok(status));
        }
        assert!("expired".parse::<MembershipStatus>().is_err());
    }
}
