//! Wizard steps and the declarative per-step validation table.
//!
//! Each step declares the [`Rule`]s guarding its forward transition.
//! Validation only ever looks at the rules of the step being left, so a
//! half-finished later step never blocks an earlier one.

use chrono::NaiveDate;
use serde::Serialize;

use crate::fields::{CampaignFields, Category};

pub const TITLE_MAX_LEN: usize = 100;
pub const SHORT_DESCRIPTION_MAX_LEN: usize = 200;

/// The five ordered stages of the wizard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    #[default]
    BasicInfo,
    Story,
    Verification,
    Settings,
    Review,
}

impl WizardStep {
    pub const ALL: [WizardStep; 5] = [
        Self::BasicInfo,
        Self::Story,
        Self::Verification,
        Self::Settings,
        Self::Review,
    ];

    /// 1-based position shown to the user.
    pub fn number(&self) -> u8 {
        match self {
            Self::BasicInfo => 1,
            Self::Story => 2,
            Self::Verification => 3,
            Self::Settings => 4,
            Self::Review => 5,
        }
    }

    pub fn next(&self) -> Option<Self> {
        match self {
            Self::BasicInfo => Some(Self::Story),
            Self::Story => Some(Self::Verification),
            Self::Verification => Some(Self::Settings),
            Self::Settings => Some(Self::Review),
            Self::Review => None,
        }
    }

    pub fn previous(&self) -> Option<Self> {
        match self {
            Self::BasicInfo => None,
            Self::Story => Some(Self::BasicInfo),
            Self::Verification => Some(Self::Story),
            Self::Settings => Some(Self::Verification),
            Self::Review => Some(Self::Settings),
        }
    }
}

/// An inline message attached to one form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Free-text fields referenced by the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Title,
    ShortDescription,
    WhyRaising,
    WhoBenefits,
    HowFundsUsed,
}

impl TextField {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::ShortDescription => "shortDescription",
            Self::WhyRaising => "whyRaising",
            Self::WhoBenefits => "whoBenefits",
            Self::HowFundsUsed => "howFundsUsed",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::ShortDescription => "Short description",
            Self::WhyRaising => "Why you are raising funds",
            Self::WhoBenefits => "Who benefits",
            Self::HowFundsUsed => "How funds will be used",
        }
    }

    fn value<'a>(&self, fields: &'a CampaignFields) -> &'a str {
        match self {
            Self::Title => &fields.title,
            Self::ShortDescription => &fields.short_description,
            Self::WhyRaising => &fields.why_raising,
            Self::WhoBenefits => &fields.who_benefits,
            Self::HowFundsUsed => &fields.how_funds_used,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required(TextField),
    MaxLen(TextField, usize),
    CategoryChosen,
    CustomCategoryWhenOther,
    PositiveGoal,
    EndDate,
    CoverImage,
    GovernmentId,
    MinimumDonation,
    BankDetails,
    UpiId,
}

const BASIC_INFO_RULES: &[Rule] = &[
    Rule::Required(TextField::Title),
    Rule::MaxLen(TextField::Title, TITLE_MAX_LEN),
    Rule::CategoryChosen,
    Rule::CustomCategoryWhenOther,
    Rule::PositiveGoal,
    Rule::EndDate,
    Rule::Required(TextField::ShortDescription),
    Rule::MaxLen(TextField::ShortDescription, SHORT_DESCRIPTION_MAX_LEN),
    Rule::CoverImage,
];

const STORY_RULES: &[Rule] = &[
    Rule::Required(TextField::WhyRaising),
    Rule::Required(TextField::WhoBenefits),
    Rule::Required(TextField::HowFundsUsed),
];

const VERIFICATION_RULES: &[Rule] = &[Rule::GovernmentId];

const SETTINGS_RULES: &[Rule] = &[Rule::MinimumDonation, Rule::BankDetails, Rule::UpiId];

pub fn rules_for(step: WizardStep) -> &'static [Rule] {
    match step {
        WizardStep::BasicInfo => BASIC_INFO_RULES,
        WizardStep::Story => STORY_RULES,
        WizardStep::Verification => VERIFICATION_RULES,
        WizardStep::Settings => SETTINGS_RULES,
        WizardStep::Review => &[],
    }
}

/// Everything the rules look at: scalar fields plus which uploads exist,
/// either freshly selected or restored as a preview.
#[derive(Debug, Clone, Copy)]
pub struct StepInput<'a> {
    pub fields: &'a CampaignFields,
    pub has_cover_image: bool,
    pub has_government_id: bool,
}

pub fn validate_step(step: WizardStep, input: &StepInput<'_>) -> Vec<FieldError> {
    let mut errors = Vec::new();
    for rule in rules_for(step) {
        check(*rule, input, &mut errors);
    }
    errors
}

/// Validate every step in order, stopping at the first one that fails.
pub fn validate_all(
    input: &StepInput<'_>,
) -> std::result::Result<(), (WizardStep, Vec<FieldError>)> {
    for step in WizardStep::ALL {
        let errors = validate_step(step, input);
        if !errors.is_empty() {
            return Err((step, errors));
        }
    }
    Ok(())
}

fn check(rule: Rule, input: &StepInput<'_>, errors: &mut Vec<FieldError>) {
    let fields = input.fields;
    match rule {
        Rule::Required(field) => {
            if field.value(fields).trim().is_empty() {
                errors.push(FieldError::new(
                    field.name(),
                    format!("{} is required", field.label()),
                ));
            }
        }
        Rule::MaxLen(field, max) => {
            if field.value(fields).trim().chars().count() > max {
                errors.push(FieldError::new(
                    field.name(),
                    format!("{} must be at most {max} characters", field.label()),
                ));
            }
        }
        Rule::CategoryChosen => {
            if fields.category.is_none() {
                errors.push(FieldError::new("category", "Please select a category"));
            }
        }
        Rule::CustomCategoryWhenOther => {
            if fields.category == Some(Category::Other) && fields.custom_category.trim().is_empty()
            {
                errors.push(FieldError::new(
                    "customCategory",
                    "Please describe the category",
                ));
            }
        }
        Rule::PositiveGoal => match fields.goal_amount {
            Some(goal) if goal.is_finite() && goal > 0.0 => {}
            Some(_) => errors.push(FieldError::new(
                "goalAmount",
                "Goal amount must be greater than zero",
            )),
            None => errors.push(FieldError::new("goalAmount", "Goal amount is required")),
        },
        Rule::EndDate => {
            if fields.end_date.trim().is_empty() {
                errors.push(FieldError::new("endDate", "End date is required"));
            } else if NaiveDate::parse_from_str(fields.end_date.trim(), "%Y-%m-%d").is_err() {
                errors.push(FieldError::new("endDate", "End date must be a valid date"));
            }
        }
        Rule::CoverImage => {
            if !input.has_cover_image {
                errors.push(FieldError::new("coverImage", "Cover image is required"));
            }
        }
        Rule::GovernmentId => {
            if !input.has_government_id {
                errors.push(FieldError::new(
                    "governmentId",
                    "Government ID is required for verification",
                ));
            }
        }
        Rule::MinimumDonation => {
            if let Some(min) = fields.minimum_donation {
                if !min.is_finite() || min < 0.0 {
                    errors.push(FieldError::new(
                        "minimumDonation",
                        "Minimum donation cannot be negative",
                    ));
                } else if fields.goal_amount.is_some_and(|goal| min > goal) {
                    errors.push(FieldError::new(
                        "minimumDonation",
                        "Minimum donation cannot exceed the goal amount",
                    ));
                }
            }
        }
        Rule::BankDetails => {
            if !fields.payment_method.uses_bank() {
                return;
            }
            if !is_account_number(&fields.account_number) {
                errors.push(FieldError::new(
                    "accountNumber",
                    "Account number must be 9 to 18 digits",
                ));
            }
            if !is_ifsc(&fields.ifsc_code) {
                errors.push(FieldError::new("ifscCode", "Enter a valid IFSC code"));
            }
            if fields.account_holder.trim().is_empty() {
                errors.push(FieldError::new(
                    "accountHolder",
                    "Account holder name is required",
                ));
            }
        }
        Rule::UpiId => {
            if fields.payment_method.uses_upi() && !is_upi_id(&fields.upi_id) {
                errors.push(FieldError::new("upiId", "Enter a valid UPI ID"));
            }
        }
    }
}

fn is_account_number(s: &str) -> bool {
    let s = s.trim();
    (9..=18).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
}

/// Four bank letters, a literal `0`, then six alphanumerics.
fn is_ifsc(s: &str) -> bool {
    let s = s.trim().as_bytes();
    s.len() == 11
        && s[..4].iter().all(u8::is_ascii_alphabetic)
        && s[4] == b'0'
        && s[5..].iter().all(u8::is_ascii_alphanumeric)
}

fn is_upi_id(s: &str) -> bool {
    let s = s.trim();
    match s.split_once('@') {
        Some((handle, provider)) => {
            !handle.is_empty()
                && !provider.is_empty()
                && !provider.contains('@')
                && !s.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
