//! Field model for the donation campaign form.
//!
//! [`CampaignFields`] holds every scalar input of the wizard. File inputs
//! live in [`crate::controller::Attachments`] instead, so a [`FormDraft`]
//! cannot carry file data by construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, WizardError};
use crate::steps::FieldError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Medical,
    Education,
    #[serde(rename = "Disaster Relief")]
    DisasterRelief,
    #[serde(rename = "Animal Welfare")]
    Animal,
    Environment,
    #[serde(rename = "Community Development")]
    Community,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Medical => "Medical",
            Self::Education => "Education",
            Self::DisasterRelief => "Disaster Relief",
            Self::Animal => "Animal Welfare",
            Self::Environment => "Environment",
            Self::Community => "Community Development",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Bank,
    Upi,
    Both,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bank => "bank",
            Self::Upi => "upi",
            Self::Both => "both",
        }
    }

    pub fn uses_bank(&self) -> bool {
        matches!(self, Self::Bank | Self::Both)
    }

    pub fn uses_upi(&self) -> bool {
        matches!(self, Self::Upi | Self::Both)
    }
}

/// Every non-file input of the campaign form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CampaignFields {
    // Basic info
    pub title: String,
    pub category: Option<Category>,
    /// Free-text category, required when `category` is `Other`.
    pub custom_category: String,
    #[serde(deserialize_with = "de_opt_number")]
    pub goal_amount: Option<f64>,
    /// `YYYY-MM-DD`
    pub end_date: String,
    pub short_description: String,

    // Story
    pub why_raising: String,
    pub who_benefits: String,
    pub how_funds_used: String,

    // Verification
    pub confirm_accuracy: bool,

    // Settings
    #[serde(deserialize_with = "de_opt_number")]
    pub minimum_donation: Option<f64>,
    pub payment_method: PaymentMethod,
    pub account_number: String,
    pub ifsc_code: String,
    pub account_holder: String,
    pub upi_id: String,
    pub social_share_message: String,
    pub hashtags: String,
    pub location: String,
    pub display_raised_amount: bool,
    pub allow_anonymous: bool,
    pub enable_comments: bool,
}

impl Default for CampaignFields {
    fn default() -> Self {
        Self {
            title: String::new(),
            category: None,
            custom_category: String::new(),
            goal_amount: None,
            end_date: String::new(),
            short_description: String::new(),
            why_raising: String::new(),
            who_benefits: String::new(),
            how_funds_used: String::new(),
            confirm_accuracy: false,
            minimum_donation: None,
            payment_method: PaymentMethod::default(),
            account_number: String::new(),
            ifsc_code: String::new(),
            account_holder: String::new(),
            upi_id: String::new(),
            social_share_message: String::new(),
            hashtags: String::new(),
            location: String::new(),
            display_raised_amount: true,
            allow_anonymous: true,
            enable_comments: true,
        }
    }
}

impl CampaignFields {
    fn text_fields(&self) -> [&str; 14] {
        [
            &self.title,
            &self.custom_category,
            &self.end_date,
            &self.short_description,
            &self.why_raising,
            &self.who_benefits,
            &self.how_funds_used,
            &self.account_number,
            &self.ifsc_code,
            &self.account_holder,
            &self.upi_id,
            &self.social_share_message,
            &self.hashtags,
            &self.location,
        ]
    }

    /// Whether anything the user typed or chose is worth restoring.
    ///
    /// Booleans and enums left at their defaults do not count.
    pub fn has_meaningful_content(&self) -> bool {
        let defaults = Self::default();
        self.text_fields().iter().any(|s| !s.trim().is_empty())
            || self.goal_amount.is_some()
            || self.minimum_donation.is_some()
            || self.category.is_some()
            || self.payment_method != defaults.payment_method
            || self.confirm_accuracy != defaults.confirm_accuracy
            || self.display_raised_amount != defaults.display_raised_amount
            || self.allow_anonymous != defaults.allow_anonymous
            || self.enable_comments != defaults.enable_comments
    }

    /// Merge a JSON object of camelCase field names into the current values.
    ///
    /// The patch is applied all-or-nothing: unknown names or badly typed
    /// values leave `self` untouched. Returns the names that were applied.
    pub fn apply_patch(&mut self, patch: &Map<String, Value>) -> Result<Vec<String>> {
        let Value::Object(mut current) = serde_json::to_value(&*self)? else {
            return Err(WizardError::Json(serde::ser::Error::custom(
                "fields did not serialize to an object",
            )));
        };

        let unknown: Vec<FieldError> = patch
            .keys()
            .filter(|k| !current.contains_key(k.as_str()))
            .map(|k| FieldError::new(k, "Unknown field"))
            .collect();
        if !unknown.is_empty() {
            return Err(WizardError::Validation(unknown));
        }

        for (key, value) in patch {
            current.insert(key.clone(), value.clone());
        }
        *self = serde_json::from_value(Value::Object(current))?;
        Ok(patch.keys().cloned().collect())
    }
}

/// Serializable snapshot of in-progress input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDraft {
    #[serde(flatten)]
    pub fields: CampaignFields,
    pub saved_at: DateTime<Utc>,
}

impl FormDraft {
    pub fn capture(fields: &CampaignFields) -> Self {
        Self {
            fields: fields.clone(),
            saved_at: Utc::now(),
        }
    }
}

/// Numeric inputs arrive either as JSON numbers or as the raw text of an
/// input element; an empty string means "not set".
fn de_opt_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| D::Error::custom("number out of range")),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid number: {s}"))),
        Some(other) => Err(D::Error::custom(format!("expected a number, got {other}"))),
    }
}
