//! Form state controller: the single owner of the wizard's field values,
//! attachments, previews, current step and trust score.
//!
//! All collaborators (draft store, campaign API, notifier, navigator) are
//! injected through [`WizardDeps`], so the controller runs the same way
//! behind the REST surface and inside tests.
//!
//! ## Persistence
//!
//! Every change to field values or previews schedules a debounced save of
//! both draft regions. Edits are applied in memory immediately; the store
//! lags by at most the debounce window.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::debounce::Debouncer;
use crate::errors::{Result, WizardError};
use crate::fields::{CampaignFields, FormDraft};
use crate::gate::{ConfirmationGate, DocumentSlot, PendingDocument};
use crate::media::{render_preview, CompressionProfile, SelectedFile};
use crate::notify::{Navigator, Notice, Notifier};
use crate::preview::{ImagePreviewCache, Preview};
use crate::steps::{validate_all, validate_step, FieldError, StepInput, WizardStep};
use crate::store::DraftStore;
use crate::submit::{build_payload, CampaignApi, CampaignPayload, CreatedEvent, GENERIC_FAILURE};
use crate::trust::{trust_score, TrustInputs};

pub const MAX_SUPPORTING_MEDIA: usize = 5;

/// File inputs of the form. Never serialized into a draft.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attachments {
    pub cover_image: Option<SelectedFile>,
    /// Single-element list once a document is confirmed.
    pub government_id: Vec<SelectedFile>,
    pub proof_of_need: Vec<SelectedFile>,
    pub supporting_media: Vec<SelectedFile>,
}

pub struct WizardDeps {
    pub drafts: DraftStore,
    pub api: Arc<dyn CampaignApi>,
    pub notifier: Arc<dyn Notifier>,
    pub navigator: Arc<dyn Navigator>,
}

#[derive(Debug, Clone)]
pub struct WizardSettings {
    pub debounce: Duration,
    pub redirect_delay: Duration,
    pub redirect_route: String,
}

impl Default for WizardSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(1),
            redirect_delay: Duration::from_secs(2),
            redirect_route: "/dashboard/ngo".to_string(),
        }
    }
}

impl From<&Config> for WizardSettings {
    fn from(config: &Config) -> Self {
        Self {
            debounce: config.draft_debounce(),
            redirect_delay: config.redirect_delay(),
            redirect_route: config.redirect_route.clone(),
        }
    }
}

/// Result of one supporting-media selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MediaIntake {
    pub added: usize,
    /// Already accepted (same name and size).
    pub duplicates: usize,
    /// Beyond [`MAX_SUPPORTING_MEDIA`]; permanently discarded.
    pub dropped: usize,
    pub unreadable: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDocumentView {
    pub slot: DocumentSlot,
    pub file_name: String,
    pub preview: Preview,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItemView {
    pub name: String,
    pub size: u64,
    pub preview: Preview,
}

/// Serializable snapshot of everything the form renders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardView {
    pub step: WizardStep,
    pub step_number: u8,
    pub fields: CampaignFields,
    pub previews: ImagePreviewCache,
    pub trust_score: u8,
    pub pending_document: Option<PendingDocumentView>,
    pub supporting_media: Vec<MediaItemView>,
    pub errors: Vec<FieldError>,
    pub submitting: bool,
}

pub struct WizardController {
    fields: CampaignFields,
    attachments: Attachments,
    previews: ImagePreviewCache,
    supporting_previews: Vec<Preview>,
    step: WizardStep,
    trust_score: u8,
    gate: ConfirmationGate,
    errors: Vec<FieldError>,
    submitting: bool,
    deps: WizardDeps,
    settings: WizardSettings,
    debouncer: Debouncer,
}

impl WizardController {
    pub fn new(deps: WizardDeps, settings: WizardSettings) -> Self {
        let debouncer = Debouncer::new(settings.debounce);
        Self {
            fields: CampaignFields::default(),
            attachments: Attachments::default(),
            previews: ImagePreviewCache::default(),
            supporting_previews: Vec::new(),
            step: WizardStep::default(),
            trust_score: 0,
            gate: ConfirmationGate::default(),
            errors: Vec::new(),
            submitting: false,
            deps,
            settings,
            debouncer,
        }
    }

    // ─────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn fields(&self) -> &CampaignFields {
        &self.fields
    }

    pub fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    pub fn previews(&self) -> &ImagePreviewCache {
        &self.previews
    }

    pub fn trust_score(&self) -> u8 {
        self.trust_score
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn pending_document(&self) -> Option<&PendingDocument> {
        self.gate.pending()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn api(&self) -> Arc<dyn CampaignApi> {
        self.deps.api.clone()
    }

    pub fn redirect_delay(&self) -> Duration {
        self.settings.redirect_delay
    }

    pub fn view(&self) -> WizardView {
        WizardView {
            step: self.step,
            step_number: self.step.number(),
            fields: self.fields.clone(),
            previews: self.previews.clone(),
            trust_score: self.trust_score,
            pending_document: self.gate.pending().map(|doc| PendingDocumentView {
                slot: doc.slot,
                file_name: doc.file.name.clone(),
                preview: doc.preview.clone(),
            }),
            supporting_media: self
                .attachments
                .supporting_media
                .iter()
                .zip(&self.supporting_previews)
                .map(|(file, preview)| MediaItemView {
                    name: file.name.clone(),
                    size: file.size(),
                    preview: preview.clone(),
                })
                .collect(),
            errors: self.errors.clone(),
            submitting: self.submitting,
        }
    }

    // ─────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────

    /// Restore a previously saved draft. Returns whether one was restored.
    pub async fn mount(&mut self) -> bool {
        let draft = match self.deps.drafts.load().await {
            Ok(draft) => draft,
            Err(e) => {
                warn!("Could not read saved draft: {e}");
                None
            }
        };
        let Some(draft) = draft else {
            return false;
        };

        let images = match self.deps.drafts.load_images().await {
            Ok(images) => images,
            Err(e) => {
                warn!("Could not read saved image previews: {e}");
                None
            }
        };

        self.fields = draft.fields;
        if let Some(images) = images {
            self.previews = images;
        }
        self.recompute_trust_score();
        info!("Restored draft saved at {}", draft.saved_at);
        self.deps
            .notifier
            .notify(Notice::info("Draft restored. Continue where you left off."));
        true
    }

    /// Stop pending background saves.
    pub fn unmount(&self) {
        self.debouncer.shutdown();
    }

    // ─────────────────────────────────────────────────────────
    // Field and file input
    // ─────────────────────────────────────────────────────────

    /// Apply a JSON object of camelCase field values.
    pub fn update_fields(&mut self, patch: &Map<String, Value>) -> Result<()> {
        let changed = self.fields.apply_patch(patch)?;
        self.errors.retain(|e| !changed.contains(&e.field));
        self.recompute_trust_score();
        self.schedule_save();
        Ok(())
    }

    pub async fn select_cover_image(&mut self, file: SelectedFile) -> Result<()> {
        if !file.is_image() {
            return Err(WizardError::Validation(vec![FieldError::new(
                "coverImage",
                "Cover image must be an image file",
            )]));
        }
        let preview = self.preview_or_notify(&file, CompressionProfile::COVER).await?;
        self.attachments.cover_image = Some(file);
        self.previews.cover_image = Some(preview);
        self.errors.retain(|e| e.field != "coverImage");
        self.schedule_save();
        Ok(())
    }

    pub fn remove_cover_image(&mut self) {
        self.attachments.cover_image = None;
        self.previews.cover_image = None;
        self.schedule_save();
    }

    /// Stage a sensitive document; it reaches the form only on
    /// [`confirm_document`](Self::confirm_document).
    pub async fn select_document(&mut self, slot: DocumentSlot, file: SelectedFile) -> Result<()> {
        if !file.is_image() && !file.is_pdf() {
            return Err(WizardError::Validation(vec![FieldError::new(
                slot.field_name(),
                "Upload an image or a PDF",
            )]));
        }
        let preview = self
            .preview_or_notify(&file, CompressionProfile::DOCUMENT)
            .await?;
        debug!("Staged {} for {}", file.name, slot.field_name());
        self.gate.stage(PendingDocument {
            slot,
            file,
            preview,
        });
        Ok(())
    }

    /// Promote the staged document into the form: attachment and preview
    /// are updated together before the gate is back to idle.
    pub fn confirm_document(&mut self) -> Result<DocumentSlot> {
        let Some(PendingDocument {
            slot,
            file,
            preview,
        }) = self.gate.confirm()
        else {
            return Err(WizardError::InvalidTransition(
                "no document is awaiting confirmation".to_string(),
            ));
        };

        match slot {
            DocumentSlot::GovernmentId => {
                self.attachments.government_id = vec![file];
                self.previews.government_id = Some(preview);
            }
            DocumentSlot::ProofOfNeed => {
                self.attachments.proof_of_need = vec![file];
                self.previews.proof_of_need = Some(preview);
            }
        }
        self.errors.retain(|e| e.field != slot.field_name());
        self.recompute_trust_score();
        self.schedule_save();
        Ok(slot)
    }

    /// Discard the staged document. The form is not touched.
    pub fn cancel_document(&mut self) -> bool {
        self.gate.cancel()
    }

    pub fn remove_document(&mut self, slot: DocumentSlot) {
        match slot {
            DocumentSlot::GovernmentId => {
                self.attachments.government_id.clear();
                self.previews.government_id = None;
            }
            DocumentSlot::ProofOfNeed => {
                self.attachments.proof_of_need.clear();
                self.previews.proof_of_need = None;
            }
        }
        self.recompute_trust_score();
        self.schedule_save();
    }

    /// Accept new supporting media, skipping files already accepted and
    /// discarding anything beyond [`MAX_SUPPORTING_MEDIA`].
    pub async fn add_supporting_media(&mut self, files: Vec<SelectedFile>) -> MediaIntake {
        let mut intake = MediaIntake::default();
        for file in files {
            if self
                .attachments
                .supporting_media
                .iter()
                .any(|accepted| accepted.same_file(&file))
            {
                intake.duplicates += 1;
                continue;
            }
            if self.attachments.supporting_media.len() >= MAX_SUPPORTING_MEDIA {
                intake.dropped += 1;
                continue;
            }
            match render_preview(&file, CompressionProfile::SUPPORTING).await {
                Ok(preview) => {
                    self.attachments.supporting_media.push(file);
                    self.supporting_previews.push(preview);
                    intake.added += 1;
                }
                Err(e) => {
                    warn!("Skipping unreadable supporting file {}: {e}", file.name);
                    intake.unreadable += 1;
                }
            }
        }

        if intake.dropped > 0 {
            self.deps.notifier.notify(Notice::warning(format!(
                "You can upload up to {MAX_SUPPORTING_MEDIA} supporting files; {} not added",
                intake.dropped
            )));
        }
        if intake.unreadable > 0 {
            self.deps.notifier.notify(Notice::error(format!(
                "{} supporting file(s) could not be read",
                intake.unreadable
            )));
        }
        intake
    }

    pub fn remove_supporting_media(&mut self, index: usize) -> Option<SelectedFile> {
        if index >= self.attachments.supporting_media.len() {
            return None;
        }
        self.supporting_previews.remove(index);
        Some(self.attachments.supporting_media.remove(index))
    }

    // ─────────────────────────────────────────────────────────
    // Step navigation
    // ─────────────────────────────────────────────────────────

    /// Validate the current step and advance if it passes.
    pub fn handle_next(&mut self) -> bool {
        let errors = validate_step(self.step, &self.step_input());
        if !errors.is_empty() {
            debug!("Step {} blocked by {} error(s)", self.step.number(), errors.len());
            self.errors = errors;
            return false;
        }
        self.errors.clear();
        match self.step.next() {
            Some(next) => {
                self.step = next;
                true
            }
            None => false,
        }
    }

    /// Go back one step. Never validates.
    pub fn handle_previous(&mut self) {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
        }
        self.errors.clear();
    }

    // ─────────────────────────────────────────────────────────
    // Submission
    // ─────────────────────────────────────────────────────────

    /// Validate everything and build the payload. Marks the controller as
    /// submitting until [`complete_submission`](Self::complete_submission).
    pub fn prepare_submission(&mut self) -> Result<CampaignPayload> {
        if self.submitting {
            return Err(WizardError::InvalidTransition(
                "a submission is already in progress".to_string(),
            ));
        }
        if self.step != WizardStep::Review {
            return Err(WizardError::InvalidTransition(
                "campaigns can only be submitted from the review step".to_string(),
            ));
        }
        if let Err((step, errors)) = validate_all(&self.step_input()) {
            self.step = step;
            self.errors = errors.clone();
            self.deps
                .notifier
                .notify(Notice::error("Please fix the highlighted fields"));
            return Err(WizardError::Validation(errors));
        }

        // Recomputed here rather than trusting the last reactive update.
        self.recompute_trust_score();
        self.submitting = true;
        Ok(build_payload(
            &self.fields,
            &self.attachments,
            self.trust_score,
        ))
    }

    /// Apply the collaborator's answer. On success the draft is cleared,
    /// the form reset and navigation scheduled; on failure nothing changes.
    pub async fn complete_submission(
        &mut self,
        result: Result<CreatedEvent>,
    ) -> Result<CreatedEvent> {
        self.submitting = false;
        match result {
            Ok(created) => {
                // A save already in flight must not land after the clear.
                self.debouncer.cancel_and_wait().await;
                if let Err(e) = self.deps.drafts.clear().await {
                    warn!("Could not clear draft after submission: {e}");
                }
                self.reset();
                info!("Donation event created: {:?}", created.id);
                self.deps.notifier.notify(Notice::success(
                    created
                        .message
                        .clone()
                        .unwrap_or_else(|| "Donation event created successfully".to_string()),
                ));
                self.schedule_redirect();
                Ok(created)
            }
            Err(e) => {
                let message = match e {
                    WizardError::Submission(message) => message,
                    other => {
                        warn!("Submission failed: {other}");
                        GENERIC_FAILURE.to_string()
                    }
                };
                self.deps.notifier.notify(Notice::error(message.clone()));
                Err(WizardError::Submission(message))
            }
        }
    }

    pub async fn submit(&mut self) -> Result<CreatedEvent> {
        let payload = self.prepare_submission()?;
        let result = self.deps.api.create_donation_event(payload).await;
        self.complete_submission(result).await
    }

    // ─────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────

    fn step_input(&self) -> StepInput<'_> {
        StepInput {
            fields: &self.fields,
            has_cover_image: self.attachments.cover_image.is_some()
                || self.previews.cover_image.is_some(),
            has_government_id: !self.attachments.government_id.is_empty()
                || self.previews.government_id.is_some(),
        }
    }

    fn recompute_trust_score(&mut self) {
        self.trust_score = trust_score(TrustInputs {
            identity_document: !self.attachments.government_id.is_empty()
                || self.previews.government_id.is_some(),
            proof_of_need: !self.attachments.proof_of_need.is_empty()
                || self.previews.proof_of_need.is_some(),
            confirmed: self.fields.confirm_accuracy,
        });
    }

    async fn preview_or_notify(
        &self,
        file: &SelectedFile,
        profile: CompressionProfile,
    ) -> Result<Preview> {
        render_preview(file, profile).await.map_err(|e| {
            self.deps
                .notifier
                .notify(Notice::error(format!("Could not read {}", file.name)));
            e
        })
    }

    fn schedule_save(&self) {
        let fields = self.fields.clone();
        let images = self.previews.clone();
        let drafts = self.deps.drafts.clone();
        let notifier = self.deps.notifier.clone();
        self.debouncer.schedule(move || async move {
            let report = drafts.persist(&FormDraft::capture(&fields), &images).await;
            if report.images_dropped() {
                notifier.notify(Notice::warning(
                    "Images are too large to keep in your draft; your other details were saved",
                ));
            }
        });
    }

    fn schedule_redirect(&self) {
        let navigator = self.deps.navigator.clone();
        let route = self.settings.redirect_route.clone();
        let delay = self.settings.redirect_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            navigator.navigate(&route);
        });
    }

    fn reset(&mut self) {
        self.fields = CampaignFields::default();
        self.attachments = Attachments::default();
        self.previews = ImagePreviewCache::default();
        self.supporting_previews.clear();
        self.step = WizardStep::default();
        self.errors.clear();
        self.gate.cancel();
        self.recompute_trust_score();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::tests::{noisy_png, png};
    use crate::notify::{NoticeBuffer, NoticeLevel, RouteRecorder};
    use crate::preview::MediaKind;
    use crate::store::{KeyValueStore, MemoryStore, DRAFT_KEY, IMAGES_KEY};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeApi {
        fail_with: Option<String>,
        calls: Mutex<Vec<CampaignPayload>>,
    }

    #[async_trait]
    impl CampaignApi for FakeApi {
        async fn create_donation_event(&self, payload: CampaignPayload) -> Result<CreatedEvent> {
            self.calls.lock().unwrap().push(payload);
            match &self.fail_with {
                Some(message) => Err(WizardError::Submission(message.clone())),
                None => Ok(CreatedEvent {
                    id: Some("evt-1".into()),
                    message: None,
                }),
            }
        }
    }

    struct Harness {
        controller: WizardController,
        backend: Arc<MemoryStore>,
        notices: Arc<NoticeBuffer>,
        routes: Arc<RouteRecorder>,
        api: Arc<FakeApi>,
    }

    fn harness_with(capacity: usize, api: FakeApi) -> Harness {
        let backend = Arc::new(MemoryStore::new(capacity));
        let notices = Arc::new(NoticeBuffer::default());
        let routes = Arc::new(RouteRecorder::default());
        let api = Arc::new(api);
        let controller = WizardController::new(
            WizardDeps {
                drafts: DraftStore::new(backend.clone()),
                api: api.clone(),
                notifier: notices.clone(),
                navigator: routes.clone(),
            },
            WizardSettings::default(),
        );
        Harness {
            controller,
            backend,
            notices,
            routes,
            api,
        }
    }

    fn harness() -> Harness {
        harness_with(5 * 1024 * 1024, FakeApi::default())
    }

    fn patch(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn cover() -> SelectedFile {
        SelectedFile::new("cover.png", "image/png", png(1600, 1200))
    }

    fn pdf(name: &str) -> SelectedFile {
        SelectedFile::new(name, "application/pdf", b"%PDF-1.7 test".to_vec())
    }

    fn basic_info() -> Value {
        json!({
            "title": "Help Build a School",
            "category": "Education",
            "goalAmount": 50000,
            "endDate": "2025-12-31",
            "shortDescription": "Classrooms for 200 children",
        })
    }

    async fn fill_to_review(c: &mut WizardController) {
        c.update_fields(&patch(basic_info())).unwrap();
        c.select_cover_image(cover()).await.unwrap();
        assert!(c.handle_next());
        c.update_fields(&patch(json!({
            "whyRaising": "The old building collapsed",
            "whoBenefits": "200 children",
            "howFundsUsed": "Bricks, roof, teachers",
        })))
        .unwrap();
        assert!(c.handle_next());
        c.select_document(DocumentSlot::GovernmentId, pdf("id.pdf"))
            .await
            .unwrap();
        c.confirm_document().unwrap();
        assert!(c.handle_next());
        c.update_fields(&patch(json!({ "paymentMethod": "upi", "upiId": "school@okbank" })))
            .unwrap();
        assert!(c.handle_next());
        assert_eq!(c.step(), WizardStep::Review);
    }

    #[tokio::test]
    async fn step_one_advances_with_all_required_fields() {
        let mut h = harness();
        h.controller.update_fields(&patch(basic_info())).unwrap();
        h.controller.select_cover_image(cover()).await.unwrap();
        assert!(h.controller.handle_next());
        assert_eq!(h.controller.step(), WizardStep::Story);
        assert!(h.controller.errors().is_empty());
    }

    #[tokio::test]
    async fn step_one_blocks_without_cover_image() {
        let mut h = harness();
        h.controller.update_fields(&patch(basic_info())).unwrap();
        assert!(!h.controller.handle_next());
        assert_eq!(h.controller.step(), WizardStep::BasicInfo);
        assert_eq!(h.controller.errors()[0].field, "coverImage");
    }

    #[tokio::test]
    async fn other_category_blocks_until_described() {
        let mut h = harness();
        h.controller.update_fields(&patch(basic_info())).unwrap();
        h.controller
            .update_fields(&patch(json!({ "category": "Other" })))
            .unwrap();
        h.controller.select_cover_image(cover()).await.unwrap();
        assert!(!h.controller.handle_next());

        h.controller
            .update_fields(&patch(json!({ "customCategory": "Sports" })))
            .unwrap();
        assert!(h.controller.errors().is_empty());
        assert!(h.controller.handle_next());
    }

    #[tokio::test]
    async fn previous_never_validates() {
        let mut h = harness();
        fill_to_review(&mut h.controller).await;
        h.controller
            .update_fields(&patch(json!({ "upiId": "" })))
            .unwrap();
        h.controller.handle_previous();
        assert_eq!(h.controller.step(), WizardStep::Settings);
        h.controller.handle_previous();
        h.controller.handle_previous();
        h.controller.handle_previous();
        h.controller.handle_previous();
        assert_eq!(h.controller.step(), WizardStep::BasicInfo);
    }

    #[tokio::test]
    async fn cancelled_document_leaves_form_untouched() {
        let mut h = harness();
        let before_previews = h.controller.previews().clone();
        h.controller
            .select_document(DocumentSlot::GovernmentId, pdf("id.pdf"))
            .await
            .unwrap();
        assert!(h.controller.pending_document().is_some());
        assert!(h.controller.cancel_document());

        assert!(h.controller.attachments().government_id.is_empty());
        assert_eq!(h.controller.previews(), &before_previews);
        assert_eq!(h.controller.trust_score(), 0);
        assert!(h.controller.pending_document().is_none());
    }

    #[tokio::test]
    async fn confirmed_document_updates_field_and_preview_together() {
        let mut h = harness();
        h.controller
            .select_document(DocumentSlot::ProofOfNeed, pdf("bill.pdf"))
            .await
            .unwrap();
        let slot = h.controller.confirm_document().unwrap();
        assert_eq!(slot, DocumentSlot::ProofOfNeed);
        assert_eq!(h.controller.attachments().proof_of_need.len(), 1);
        assert_eq!(
            h.controller.previews().proof_of_need,
            Some(Preview::NonPreviewable(MediaKind::Pdf))
        );
        assert_eq!(h.controller.trust_score(), 30);
        assert!(matches!(
            h.controller.confirm_document(),
            Err(WizardError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn trust_score_follows_documents_and_checkbox() {
        let mut h = harness();
        assert_eq!(h.controller.trust_score(), 0);

        h.controller
            .select_document(DocumentSlot::GovernmentId, pdf("id.pdf"))
            .await
            .unwrap();
        assert_eq!(h.controller.trust_score(), 0);
        h.controller.confirm_document().unwrap();
        assert_eq!(h.controller.trust_score(), 50);

        h.controller
            .update_fields(&patch(json!({ "confirmAccuracy": true })))
            .unwrap();
        assert_eq!(h.controller.trust_score(), 80);

        h.controller
            .select_document(DocumentSlot::ProofOfNeed, pdf("bill.pdf"))
            .await
            .unwrap();
        h.controller.confirm_document().unwrap();
        assert_eq!(h.controller.trust_score(), 100);

        h.controller.remove_document(DocumentSlot::GovernmentId);
        assert_eq!(h.controller.trust_score(), 50);
    }

    #[tokio::test]
    async fn supporting_media_is_capped_and_deduplicated() {
        let mut h = harness();
        let file = |name: &str| SelectedFile::new(name, "video/mp4", vec![0; 16]);

        let first = h
            .controller
            .add_supporting_media(vec![file("a.mp4"), file("b.mp4"), file("c.mp4")])
            .await;
        assert_eq!(first.added, 3);

        let second = h
            .controller
            .add_supporting_media(vec![
                file("a.mp4"),
                file("d.mp4"),
                file("e.mp4"),
                file("f.mp4"),
                file("g.mp4"),
            ])
            .await;
        assert_eq!(second.duplicates, 1);
        assert_eq!(second.added, 2);
        assert_eq!(second.dropped, 2);
        assert_eq!(h.controller.attachments().supporting_media.len(), 5);

        let warnings: Vec<_> = h
            .notices
            .drain()
            .into_iter()
            .filter(|n| n.level == NoticeLevel::Warning)
            .collect();
        assert_eq!(warnings.len(), 1);

        assert_eq!(
            h.controller.remove_supporting_media(0).map(|f| f.name),
            Some("a.mp4".to_string())
        );
        assert!(h.controller.remove_supporting_media(10).is_none());
        assert_eq!(h.controller.view().supporting_media.len(), 4);
    }

    #[tokio::test]
    async fn unreadable_supporting_media_is_reported_once() {
        let mut h = harness();
        let empty = |name: &str| SelectedFile::new(name, "image/jpeg", Vec::new());

        let intake = h
            .controller
            .add_supporting_media(vec![
                empty("blank-1.jpg"),
                SelectedFile::new("clip.mp4", "video/mp4", vec![0; 16]),
                empty("blank-2.jpg"),
            ])
            .await;
        assert_eq!(intake.added, 1);
        assert_eq!(intake.unreadable, 2);

        let errors: Vec<_> = h
            .notices
            .drain()
            .into_iter()
            .filter(|n| n.level == NoticeLevel::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains('2'));
        assert_eq!(h.controller.attachments().supporting_media.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_produce_one_save_after_the_quiet_period() {
        let mut h = harness();
        for title in ["H", "He", "Hel", "Help"] {
            h.controller
                .update_fields(&patch(json!({ "title": title })))
                .unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        assert!(h.backend.get(DRAFT_KEY).await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let raw = h.backend.get(DRAFT_KEY).await.unwrap().unwrap();
        let saved: FormDraft = serde_json::from_str(&raw).unwrap();
        assert_eq!(saved.fields.title, "Help");
    }

    #[tokio::test(start_paused = true)]
    async fn draft_is_restored_on_next_mount() {
        let mut h = harness();
        h.controller.update_fields(&patch(basic_info())).unwrap();
        h.controller.select_cover_image(cover()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        h.controller.unmount();

        let notices = Arc::new(NoticeBuffer::default());
        let mut reloaded = WizardController::new(
            WizardDeps {
                drafts: DraftStore::new(h.backend.clone()),
                api: h.api.clone(),
                notifier: notices.clone(),
                navigator: h.routes.clone(),
            },
            WizardSettings::default(),
        );
        assert!(reloaded.mount().await);
        assert_eq!(reloaded.step(), WizardStep::BasicInfo);
        assert_eq!(reloaded.fields().title, "Help Build a School");
        assert!(reloaded.attachments().cover_image.is_none());
        assert!(reloaded.previews().cover_image.is_some());
        assert_eq!(notices.drain()[0].level, NoticeLevel::Info);

        // The restored preview satisfies the cover image requirement.
        assert!(reloaded.handle_next());
    }

    #[tokio::test]
    async fn mount_without_draft_stays_quiet() {
        let mut h = harness();
        assert!(!h.controller.mount().await);
        assert!(h.notices.drain().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_previews_warn_once_and_keep_fields() {
        let mut h = harness_with(16 * 1024, FakeApi::default());
        h.controller.update_fields(&patch(basic_info())).unwrap();
        h.controller
            .select_cover_image(SelectedFile::new("cover.png", "image/png", noisy_png(1600, 1200)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(h.backend.get(DRAFT_KEY).await.unwrap().is_some());
        assert!(h.backend.get(IMAGES_KEY).await.unwrap().is_none());
        let notices = h.notices.drain();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_submission_clears_and_resets() {
        let mut h = harness();
        fill_to_review(&mut h.controller).await;
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(h.backend.get(DRAFT_KEY).await.unwrap().is_some());

        let created = h.controller.submit().await.unwrap();
        assert_eq!(created.id.as_deref(), Some("evt-1"));
        assert_eq!(h.controller.step(), WizardStep::BasicInfo);
        assert_eq!(h.controller.fields(), &CampaignFields::default());
        assert!(h.backend.get(DRAFT_KEY).await.unwrap().is_none());
        assert!(h.backend.get(IMAGES_KEY).await.unwrap().is_none());

        let payload = h.api.calls.lock().unwrap()[0].clone();
        assert_eq!(payload.text("trustScore"), Some("50"));
        assert_eq!(payload.files("governmentId").len(), 1);

        assert_eq!(h.routes.last_route(), None);
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(h.routes.last_route().as_deref(), Some("/dashboard/ngo"));
    }

    #[tokio::test]
    async fn failed_submission_preserves_state() {
        let mut h = harness_with(
            5 * 1024 * 1024,
            FakeApi {
                fail_with: Some("Goal exceeds campaign limit".into()),
                ..Default::default()
            },
        );
        fill_to_review(&mut h.controller).await;
        h.notices.drain();

        let err = h.controller.submit().await.unwrap_err();
        assert_eq!(err.to_string(), "Goal exceeds campaign limit");
        assert_eq!(h.controller.step(), WizardStep::Review);
        assert_eq!(h.controller.fields().title, "Help Build a School");
        assert!(!h.controller.is_submitting());

        let notices = h.notices.drain();
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert_eq!(notices[0].message, "Goal exceeds campaign limit");
    }

    #[tokio::test]
    async fn submission_outside_review_is_rejected() {
        let mut h = harness();
        assert!(matches!(
            h.controller.submit().await,
            Err(WizardError::InvalidTransition(_))
        ));
        assert!(h.api.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn in_flight_submission_blocks_a_second_one() {
        let mut h = harness();
        fill_to_review(&mut h.controller).await;
        let _payload = h.controller.prepare_submission().unwrap();
        assert!(h.controller.is_submitting());
        assert!(matches!(
            h.controller.prepare_submission(),
            Err(WizardError::InvalidTransition(_))
        ));
        h.controller
            .complete_submission(Err(WizardError::Submission("offline".into())))
            .await
            .unwrap_err();
        assert!(!h.controller.is_submitting());
    }

    #[tokio::test]
    async fn stale_earlier_step_sends_user_back() {
        let mut h = harness();
        fill_to_review(&mut h.controller).await;
        h.controller
            .update_fields(&patch(json!({ "whyRaising": "" })))
            .unwrap();
        let err = h.controller.submit().await.unwrap_err();
        assert!(matches!(err, WizardError::Validation(_)));
        assert_eq!(h.controller.step(), WizardStep::Story);
        assert!(h.api.calls.lock().unwrap().is_empty());
    }
}
