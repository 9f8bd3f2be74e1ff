//! Submission pipeline: multipart payload assembly and the
//! create-donation-event client.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part as FormPart};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::controller::Attachments;
use crate::errors::{Result, WizardError};
use crate::fields::{CampaignFields, Category};
use crate::media::SelectedFile;

pub const GENERIC_FAILURE: &str = "Failed to create donation event";

#[derive(Debug, Clone, PartialEq)]
pub enum PartValue {
    Text(String),
    File(SelectedFile),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub name: String,
    pub value: PartValue,
}

/// Ordered multipart parts; repeated names are allowed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CampaignPayload {
    parts: Vec<Part>,
}

impl CampaignPayload {
    pub fn push_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parts.push(Part {
            name: name.into(),
            value: PartValue::Text(value.into()),
        });
    }

    pub fn push_file(&mut self, name: impl Into<String>, file: SelectedFile) {
        self.parts.push(Part {
            name: name.into(),
            value: PartValue::File(file),
        });
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// First text value sent under `name`.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|p| match &p.value {
            PartValue::Text(v) if p.name == name => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn files(&self, name: &str) -> Vec<&SelectedFile> {
        self.parts
            .iter()
            .filter_map(|p| match &p.value {
                PartValue::File(f) if p.name == name => Some(f),
                _ => None,
            })
            .collect()
    }

    pub fn into_form(self) -> Result<Form> {
        let mut form = Form::new();
        for part in self.parts {
            form = match part.value {
                PartValue::Text(v) => form.text(part.name, v),
                PartValue::File(f) => {
                    let mut file_part = FormPart::bytes(f.bytes).file_name(f.name);
                    if !f.mime.is_empty() {
                        file_part = file_part.mime_str(&f.mime)?;
                    }
                    form.part(part.name, file_part)
                }
            };
        }
        Ok(form)
    }
}

/// Integral amounts are sent without a trailing `.0`.
fn number_text(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Assemble the payload sent to the create-donation-event service.
pub fn build_payload(
    fields: &CampaignFields,
    attachments: &Attachments,
    trust_score: u8,
) -> CampaignPayload {
    let mut payload = CampaignPayload::default();

    payload.push_text("title", fields.title.trim());
    if let Some(category) = fields.category {
        payload.push_text("category", category.as_str());
        if category == Category::Other {
            payload.push_text("customCategory", fields.custom_category.trim());
        }
    }
    if let Some(goal) = fields.goal_amount {
        payload.push_text("goalAmount", number_text(goal));
    }
    payload.push_text("endDate", fields.end_date.trim());
    payload.push_text("shortDescription", fields.short_description.trim());
    payload.push_text("whyRaising", fields.why_raising.trim());
    payload.push_text("whoBenefits", fields.who_benefits.trim());
    payload.push_text("howFundsUsed", fields.how_funds_used.trim());
    payload.push_text("confirmAccuracy", bool_text(fields.confirm_accuracy));
    if let Some(minimum) = fields.minimum_donation {
        payload.push_text("minimumDonation", number_text(minimum));
    }
    payload.push_text("paymentMethod", fields.payment_method.as_str());
    if !fields.account_number.trim().is_empty() {
        payload.push_text("bankDetails[accountNumber]", fields.account_number.trim());
        payload.push_text(
            "bankDetails[ifscCode]",
            fields.ifsc_code.trim().to_ascii_uppercase(),
        );
        payload.push_text("bankDetails[accountHolder]", fields.account_holder.trim());
    }
    payload.push_text("upiId", fields.upi_id.trim());
    payload.push_text("socialShareMessage", fields.social_share_message.trim());
    payload.push_text("hashtags", fields.hashtags.trim());
    payload.push_text("location", fields.location.trim());
    payload.push_text("displayRaisedAmount", bool_text(fields.display_raised_amount));
    payload.push_text("allowAnonymous", bool_text(fields.allow_anonymous));
    payload.push_text("enableComments", bool_text(fields.enable_comments));

    if let Some(cover) = &attachments.cover_image {
        payload.push_file("coverImage", cover.clone());
    }
    for file in &attachments.government_id {
        payload.push_file("governmentId", file.clone());
    }
    for file in &attachments.proof_of_need {
        payload.push_file("proofOfNeed", file.clone());
    }
    for file in &attachments.supporting_media {
        payload.push_file("supportingMedia", file.clone());
    }

    payload.push_text("trustScore", trust_score.to_string());
    payload
}

/// What the service returns for a created event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedEvent {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// The create-donation-event collaborator. Resolves on success, fails with
/// [`WizardError::Submission`] carrying a user-presentable message.
#[async_trait]
pub trait CampaignApi: Send + Sync {
    async fn create_donation_event(&self, payload: CampaignPayload) -> Result<CreatedEvent>;
}

pub struct HttpCampaignApi {
    client: Client,
    url: String,
    token: Option<String>,
}

impl HttpCampaignApi {
    pub fn new(client: Client, url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            url: url.into(),
            token,
        }
    }
}

#[async_trait]
impl CampaignApi for HttpCampaignApi {
    async fn create_donation_event(&self, payload: CampaignPayload) -> Result<CreatedEvent> {
        let mut request = self.client.post(&self.url).multipart(payload.into_form()?);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await.map_err(|e| {
            warn!("Create event request failed: {e}");
            WizardError::Submission(GENERIC_FAILURE.to_string())
        })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            warn!("Create event rejected with {status}: {body}");
            return Err(WizardError::Submission(
                server_message(&body).unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            ));
        }

        debug!("Create event accepted with {status}");
        Ok(parse_created(&body))
    }
}

/// `message` (or `error`) from a JSON error body.
fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .filter(|m| !m.trim().is_empty())
        .map(String::from)
}

/// Services wrap the event differently; accept `{event: {...}}`,
/// `{data: {...}}` or the bare object.
fn parse_created(body: &str) -> CreatedEvent {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return CreatedEvent::default();
    };
    let message = value.get("message").and_then(Value::as_str).map(String::from);
    let inner = value
        .get("event")
        .or_else(|| value.get("data"))
        .unwrap_or(&value);
    let mut created: CreatedEvent = serde_json::from_value(inner.clone()).unwrap_or_default();
    if created.message.is_none() {
        created.message = message;
    }
    created
}
