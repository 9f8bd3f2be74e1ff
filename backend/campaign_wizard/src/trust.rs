//! Trust score shown on the review step and submitted with the campaign.

pub const IDENTITY_DOCUMENT_POINTS: u8 = 50;
pub const PROOF_OF_NEED_POINTS: u8 = 30;
pub const CONFIRMATION_POINTS: u8 = 20;

/// The three independent signals the score is built from. A document
/// counts when it is attached or when a restored preview exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrustInputs {
    pub identity_document: bool,
    pub proof_of_need: bool,
    pub confirmed: bool,
}

/// Always computed from scratch; the result lies in `0..=100`.
pub fn trust_score(inputs: TrustInputs) -> u8 {
    let mut score = 0;
    if inputs.identity_document {
        score += IDENTITY_DOCUMENT_POINTS;
    }
    if inputs.proof_of_need {
        score += PROOF_OF_NEED_POINTS;
    }
    if inputs.confirmed {
        score += CONFIRMATION_POINTS;
    }
    score
}
