//! Approval chains for requisitions and offers.
//!
//! A chain is an ordered list of stages, each owned by one role. The state of a
//! subject under approval is `pending_<stage>`, `approved` or `rejected`, and
//! the only way to move it is `ChainState::apply`, which enforces stage order:
//! HR cannot decide a requisition still waiting on its HOD.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::AppError;
use crate::models::text_enum;
use crate::models::user::Role;
use crate::models::UnknownVariant;

pub mod history;

text_enum! {
    pub enum ApprovalStage {
        Hod => "hod",
        Hr => "hr",
        Coo => "coo",
    }
}

impl ApprovalStage {
    /// The role that decides this stage.
    pub fn owner(self) -> Role {
        match self {
            ApprovalStage::Hod => Role::Hod,
            ApprovalStage::Hr => Role::Hr,
            ApprovalStage::Coo => Role::Coo,
        }
    }
}

text_enum! {
    pub enum Decision {
        Approved => "approved",
        Rejected => "rejected",
    }
}

text_enum! {
    pub enum SubjectKind {
        Requisition => "requisition",
        Offer => "offer",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalChain {
    stages: &'static [ApprovalStage],
}

/// Raised by a sub-recruiter; HOD, then HR, then COO sign off.
pub const REQUISITION_CHAIN: ApprovalChain = ApprovalChain {
    stages: &[ApprovalStage::Hod, ApprovalStage::Hr, ApprovalStage::Coo],
};

/// Compensation is checked by HR, then signed off by the COO.
pub const OFFER_CHAIN: ApprovalChain = ApprovalChain {
    stages: &[ApprovalStage::Hr, ApprovalStage::Coo],
};

impl ApprovalChain {
    pub fn initial(&self) -> ChainState {
        ChainState::Pending(self.stages[0])
    }

    pub fn stages(&self) -> &'static [ApprovalStage] {
        self.stages
    }

    fn next_after(&self, stage: ApprovalStage) -> Option<ApprovalStage> {
        let idx = self.stages.iter().position(|s| *s == stage)?;
        self.stages.get(idx + 1).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ChainState {
    Pending(ApprovalStage),
    Approved,
    Rejected,
}

impl ChainState {
    pub fn as_str(self) -> &'static str {
        match self {
            ChainState::Pending(ApprovalStage::Hod) => "pending_hod",
            ChainState::Pending(ApprovalStage::Hr) => "pending_hr",
            ChainState::Pending(ApprovalStage::Coo) => "pending_coo",
            ChainState::Approved => "approved",
            ChainState::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ChainState::Pending(_))
    }

    pub fn pending_stage(self) -> Option<ApprovalStage> {
        match self {
            ChainState::Pending(stage) => Some(stage),
            _ => None,
        }
    }

    /// Applies `decision` by `actor`. Admins may decide any pending stage.
    pub fn apply(
        self,
        chain: &ApprovalChain,
        actor: Role,
        decision: Decision,
    ) -> Result<Transition, TransitionError> {
        let stage = match self {
            ChainState::Pending(stage) => stage,
            terminal => return Err(TransitionError::AlreadyDecided(terminal)),
        };
        if !chain.stages.contains(&stage) {
            return Err(TransitionError::NotInChain(stage));
        }
        if actor != stage.owner() && actor != Role::Admin {
            return Err(TransitionError::OutOfTurn {
                expected: stage.owner(),
                actual: actor,
            });
        }
        let next = match decision {
            Decision::Rejected => ChainState::Rejected,
            Decision::Approved => chain
                .next_after(stage)
                .map(ChainState::Pending)
                .unwrap_or(ChainState::Approved),
        };
        Ok(Transition { stage, next })
    }
}

impl FromStr for ChainState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(ChainState::Approved),
            "rejected" => Ok(ChainState::Rejected),
            other => other
                .strip_prefix("pending_")
                .and_then(|stage| ApprovalStage::from_str(stage).ok())
                .map(ChainState::Pending)
                .ok_or_else(|| UnknownVariant {
                    kind: "ChainState",
                    value: other.to_string(),
                }),
        }
    }
}

impl From<ChainState> for String {
    fn from(state: ChainState) -> Self {
        state.as_str().to_string()
    }
}

impl TryFrom<String> for ChainState {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::fmt::Display for ChainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stage that was decided and the resulting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub stage: ApprovalStage,
    pub next: ChainState,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("already {0}; no further decisions accepted")]
    AlreadyDecided(ChainState),

    #[error("awaiting {expected} approval; {actual} cannot decide this stage")]
    OutOfTurn { expected: Role, actual: Role },

    #[error("stage {0} is not part of this approval chain")]
    NotInChain(ApprovalStage),
}

impl From<TransitionError> for AppError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::AlreadyDecided(_) => AppError::Conflict(e.to_string()),
            TransitionError::OutOfTurn { .. } => AppError::UnprocessableEntity(e.to_string()),
            TransitionError::NotInChain(_) => AppError::Internal(anyhow::anyhow!(e)),
        }
    }
}

/// Body of a decision request.
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: Decision,
    pub comment: Option<String>,
}

impl DecisionRequest {
    /// Rejections must say why.
    pub fn validate(&self) -> Result<Option<String>, AppError> {
        let comment = self
            .comment
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        if self.decision == Decision::Rejected && comment.is_none() {
            return Err(AppError::Validation(
                "a comment is required when rejecting".to_string(),
            ));
        }
        Ok(comment)
    }
}

/// Chain states a role is expected to act on, for dashboards and inbox queries.
pub fn pending_states_for(chain: &ApprovalChain, role: Role) -> Vec<ChainState> {
    chain
        .stages()
        .iter()
        .filter(|stage| role == Role::Admin || stage.owner() == role)
        .map(|stage| ChainState::Pending(*stage))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requisition_happy_path() {
        let chain = REQUISITION_CHAIN;
        let s0 = chain.initial();
        assert_eq!(s0, ChainState::Pending(ApprovalStage::Hod));

        let t1 = s0.apply(&chain, Role::Hod, Decision::Approved).unwrap();
        assert_eq!(t1.stage, ApprovalStage::Hod);
        assert_eq!(t1.next, ChainState::Pending(ApprovalStage::Hr));

        let t2 = t1.next.apply(&chain, Role::Hr, Decision::Approved).unwrap();
        assert_eq!(t2.next, ChainState::Pending(ApprovalStage::Coo));

        let t3 = t2.next.apply(&chain, Role::Coo, Decision::Approved).unwrap();
        assert_eq!(t3.next, ChainState::Approved);
        assert!(t3.next.is_terminal());
    }

    #[test]
    fn test_hr_cannot_jump_ahead_of_hod() {
        let err = REQUISITION_CHAIN
            .initial()
            .apply(&REQUISITION_CHAIN, Role::Hr, Decision::Approved)
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::OutOfTurn {
                expected: Role::Hod,
                actual: Role::Hr
            }
        );
        assert!(err.to_string().contains("awaiting hod approval"));
    }

    #[test]
    fn test_rejection_is_terminal() {
        let state = ChainState::Pending(ApprovalStage::Hr);
        let t = state
            .apply(&REQUISITION_CHAIN, Role::Hr, Decision::Rejected)
            .unwrap();
        assert_eq!(t.next, ChainState::Rejected);

        let err = t
            .next
            .apply(&REQUISITION_CHAIN, Role::Coo, Decision::Approved)
            .unwrap_err();
        assert_eq!(err, TransitionError::AlreadyDecided(ChainState::Rejected));
    }

    #[test]
    fn test_offer_chain_starts_at_hr_and_skips_hod() {
        let state = OFFER_CHAIN.initial();
        assert_eq!(state, ChainState::Pending(ApprovalStage::Hr));
        let t = state.apply(&OFFER_CHAIN, Role::Hr, Decision::Approved).unwrap();
        assert_eq!(t.next, ChainState::Pending(ApprovalStage::Coo));
        let t = t.next.apply(&OFFER_CHAIN, Role::Coo, Decision::Approved).unwrap();
        assert_eq!(t.next, ChainState::Approved);
    }

    #[test]
    fn test_offer_chain_rejects_foreign_stage() {
        let err = ChainState::Pending(ApprovalStage::Hod)
            .apply(&OFFER_CHAIN, Role::Hod, Decision::Approved)
            .unwrap_err();
        assert_eq!(err, TransitionError::NotInChain(ApprovalStage::Hod));
    }

    #[test]
    fn test_admin_can_override_any_pending_stage() {
        let t = ChainState::Pending(ApprovalStage::Coo)
            .apply(&REQUISITION_CHAIN, Role::Admin, Decision::Approved)
            .unwrap();
        assert_eq!(t.stage, ApprovalStage::Coo);
        assert_eq!(t.next, ChainState::Approved);
    }

    #[test]
    fn test_state_text_round_trip() {
        for s in [
            "pending_hod",
            "pending_hr",
            "pending_coo",
            "approved",
            "rejected",
        ] {
            assert_eq!(s.parse::<ChainState>().unwrap().as_str(), s);
        }
        assert!("pending_ceo".parse::<ChainState>().is_err());
        assert!("sent".parse::<ChainState>().is_err());
    }

    #[test]
    fn test_rejection_requires_comment() {
        let req = DecisionRequest {
            decision: Decision::Rejected,
            comment: Some("   ".to_string()),
        };
        assert!(req.validate().is_err());

        let req = DecisionRequest {
            decision: Decision::Approved,
            comment: None,
        };
        assert_eq!(req.validate().unwrap(), None);
    }

    #[test]
    fn test_pending_states_for_role() {
        assert_eq!(
            pending_states_for(&REQUISITION_CHAIN, Role::Hr),
            vec![ChainState::Pending(ApprovalStage::Hr)]
        );
        assert_eq!(pending_states_for(&OFFER_CHAIN, Role::Hod), vec![]);
        assert_eq!(pending_states_for(&OFFER_CHAIN, Role::Admin).len(), 2);
    }
}
