use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::text_enum;

text_enum! {
    /// Documents every new hire must submit before their joining date.
    pub enum DocType {
        IdProof => "id_proof",
        AddressProof => "address_proof",
        EducationCertificate => "education_certificate",
        PreviousEmployment => "previous_employment",
        BankDetails => "bank_details",
        SignedOfferLetter => "signed_offer_letter",
    }
}

impl DocType {
    pub fn label(self) -> &'static str {
        match self {
            DocType::IdProof => "ID proof",
            DocType::AddressProof => "address proof",
            DocType::EducationCertificate => "education certificate",
            DocType::PreviousEmployment => "previous employment letter",
            DocType::BankDetails => "bank details",
            DocType::SignedOfferLetter => "signed offer letter",
        }
    }
}

text_enum! {
    pub enum DocStatus {
        Pending => "pending",
        Submitted => "submitted",
        Approved => "approved",
        Rejected => "rejected",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OnboardingDocumentRow {
    pub id: Uuid,
    pub application_id: Uuid,
    pub doc_type: String,
    pub status: String,
    pub s3_key: Option<String>,
    pub file_name: Option<String>,
    pub reviewer_id: Option<Uuid>,
    pub review_comment: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
