//! Offers: approval through the offer chain, then delivery to the candidate.

use std::str::FromStr;

use crate::applications::status::ApplicationStatus;
use crate::approvals::ChainState;
use crate::models::UnknownVariant;

pub mod handlers;
pub mod letter;

/// Where an offer stands. Approval states come from the offer chain; the rest
/// follow once the letter goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferStatus {
    Review(ChainState),
    Sent,
    Accepted,
    Declined,
}

impl OfferStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OfferStatus::Review(state) => state.as_str(),
            OfferStatus::Sent => "sent",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Declined => "declined",
        }
    }

    /// Still in flight: only one such offer may exist per application.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            OfferStatus::Review(ChainState::Pending(_) | ChainState::Approved) | OfferStatus::Sent
        )
    }

    /// The candidate can see the offer and its letter.
    pub fn is_released(self) -> bool {
        matches!(
            self,
            OfferStatus::Sent | OfferStatus::Accepted | OfferStatus::Declined
        )
    }

    /// A letter has been rendered for the offer.
    pub fn has_letter(self) -> bool {
        self.is_released() || self == OfferStatus::Review(ChainState::Approved)
    }

    /// What an in-flight offer becomes when its application closes without it.
    pub fn voided_by(application: ApplicationStatus) -> Option<OfferStatus> {
        match application {
            ApplicationStatus::Rejected => Some(OfferStatus::Review(ChainState::Rejected)),
            ApplicationStatus::Withdrawn => Some(OfferStatus::Declined),
            _ => None,
        }
    }

    pub fn active_values() -> Vec<&'static str> {
        let mut values: Vec<&'static str> = crate::approvals::OFFER_CHAIN
            .stages()
            .iter()
            .map(|stage| ChainState::Pending(*stage).as_str())
            .collect();
        values.push(ChainState::Approved.as_str());
        values.push(OfferStatus::Sent.as_str());
        values
    }
}

impl FromStr for OfferStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(OfferStatus::Sent),
            "accepted" => Ok(OfferStatus::Accepted),
            "declined" => Ok(OfferStatus::Declined),
            other => ChainState::from_str(other)
                .map(OfferStatus::Review)
                .map_err(|_| UnknownVariant {
                    kind: "OfferStatus",
                    value: other.to_string(),
                }),
        }
    }
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approvals::{ApprovalStage, OFFER_CHAIN};

    #[test]
    fn test_parses_chain_and_delivery_states() {
        assert_eq!(
            "pending_hr".parse::<OfferStatus>().unwrap(),
            OfferStatus::Review(ChainState::Pending(ApprovalStage::Hr))
        );
        assert_eq!("sent".parse::<OfferStatus>().unwrap(), OfferStatus::Sent);
        assert!("signed".parse::<OfferStatus>().is_err());
    }

    #[test]
    fn test_active_states() {
        assert!(OfferStatus::Review(OFFER_CHAIN.initial()).is_active());
        assert!(OfferStatus::Review(ChainState::Approved).is_active());
        assert!(OfferStatus::Sent.is_active());
        assert!(!OfferStatus::Review(ChainState::Rejected).is_active());
        assert!(!OfferStatus::Accepted.is_active());
        assert!(!OfferStatus::Declined.is_active());
    }

    #[test]
    fn test_active_values_match_is_active() {
        let values = OfferStatus::active_values();
        assert_eq!(values, vec!["pending_hr", "pending_coo", "approved", "sent"]);
        for value in values {
            assert!(value.parse::<OfferStatus>().unwrap().is_active());
        }
    }

    #[test]
    fn test_letter_visibility() {
        assert!(OfferStatus::Review(ChainState::Approved).has_letter());
        assert!(!OfferStatus::Review(ChainState::Approved).is_released());
        assert!(OfferStatus::Sent.is_released());
        assert!(!OfferStatus::Review(OFFER_CHAIN.initial()).has_letter());
    }

    #[test]
    fn test_closing_an_application_voids_its_offer() {
        assert_eq!(
            OfferStatus::voided_by(ApplicationStatus::Rejected),
            Some(OfferStatus::Review(ChainState::Rejected))
        );
        assert_eq!(
            OfferStatus::voided_by(ApplicationStatus::Withdrawn),
            Some(OfferStatus::Declined)
        );
        for status in [ApplicationStatus::Interviewing, ApplicationStatus::Hired] {
            assert_eq!(OfferStatus::voided_by(status), None);
        }
        for status in [ApplicationStatus::Rejected, ApplicationStatus::Withdrawn] {
            assert!(!OfferStatus::voided_by(status).unwrap().is_active());
        }
    }
}
