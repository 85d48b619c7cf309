//! Hiring pipeline states and the moves allowed between them.

use crate::models::text_enum;

text_enum! {
    pub enum ApplicationStatus {
        Applied => "applied",
        Shortlisted => "shortlisted",
        Interviewing => "interviewing",
        OfferPending => "offer_pending",
        Offered => "offered",
        Hired => "hired",
        OfferDeclined => "offer_declined",
        Rejected => "rejected",
        Withdrawn => "withdrawn",
    }
}

impl ApplicationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Hired
                | ApplicationStatus::OfferDeclined
                | ApplicationStatus::Rejected
                | ApplicationStatus::Withdrawn
        )
    }

    pub fn can_transition_to(self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        matches!(
            (self, next),
            (Applied, Shortlisted | Rejected | Withdrawn)
                | (Shortlisted, Interviewing | Rejected | Withdrawn)
                | (Interviewing, OfferPending | Rejected | Withdrawn)
                | (OfferPending, Offered | Interviewing | Rejected | Withdrawn)
                | (Offered, Hired | OfferDeclined | Withdrawn)
        )
    }

    /// States only the offer workflow may enter.
    pub fn is_offer_managed(self) -> bool {
        matches!(
            self,
            ApplicationStatus::OfferPending
                | ApplicationStatus::Offered
                | ApplicationStatus::Hired
                | ApplicationStatus::OfferDeclined
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::Shortlisted => "Shortlisted",
            ApplicationStatus::Interviewing => "Interviewing",
            ApplicationStatus::OfferPending => "Offer in review",
            ApplicationStatus::Offered => "Offer extended",
            ApplicationStatus::Hired => "Hired",
            ApplicationStatus::OfferDeclined => "Offer declined",
            ApplicationStatus::Rejected => "Not selected",
            ApplicationStatus::Withdrawn => "Withdrawn",
        }
    }
}
