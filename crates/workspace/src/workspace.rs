use std::sync::Arc;

use adforge_core::error::{AdForgeError, AdForgeResult};
use adforge_core::types::{
    AdCopy, AdTemplate, BrandTone, ChatMessage, ChatThread, GeneratedAd, MediaAsset, Product,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::wizard::WizardStep;

/// The in-progress wizard aggregate. One per active session; never
/// persisted, discarded on abandonment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdData {
    pub product: Option<Product>,
    pub media: Vec<MediaAsset>,
    pub brand_tone: Option<BrandTone>,
    pub additional_context: Option<String>,
    pub call_to_action: Option<String>,
    /// Selection order is preserved for display.
    pub selected_templates: Vec<AdTemplate>,
    pub ad_copies: Vec<AdCopy>,
    pub generated_ads: Vec<GeneratedAd>,
    pub step: WizardStep,
}

/// The visual result of an accepted chat edit, applied to an ad together
/// with its thread message in one mutation.
#[derive(Debug, Clone)]
pub struct AppliedEdit {
    pub final_image_url: String,
    pub textless_image_url: Option<String>,
    pub summary: String,
}

/// Shared handle to the session's [`AdData`].
///
/// All mutation happens under one lock, so every method is atomic from the
/// caller's perspective: an accepted edit never leaves a half-applied
/// visual state, and thread histories are append-only.
#[derive(Clone, Default)]
pub struct AdWorkspace {
    inner: Arc<RwLock<AdData>>,
}

impl AdWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// A point-in-time copy of the aggregate.
    pub fn snapshot(&self) -> AdData {
        self.inner.read().clone()
    }

    // ─── Wizard navigation ──────────────────────────────────────────────

    pub fn current_step(&self) -> WizardStep {
        self.inner.read().step
    }

    /// Advance the wizard. Returns the step now current.
    pub fn go_next(&self) -> WizardStep {
        let mut data = self.inner.write();
        if let Some(next) = data.step.next() {
            data.step = next;
        }
        data.step
    }

    /// Step back. Pure navigation: no ad or thread state is touched.
    pub fn go_back(&self) -> WizardStep {
        let mut data = self.inner.write();
        if let Some(previous) = data.step.previous() {
            data.step = previous;
        }
        data.step
    }

    /// The furthest step justified by the data present, used to resume an
    /// interrupted session where meaningful content ends.
    pub fn resume_step(&self) -> WizardStep {
        let data = self.inner.read();
        if !data.generated_ads.is_empty() {
            WizardStep::Editing
        } else if !data.ad_copies.is_empty() {
            WizardStep::Generation
        } else if !data.selected_templates.is_empty() {
            WizardStep::Copy
        } else if data.product.is_some() {
            WizardStep::Templates
        } else {
            WizardStep::Product
        }
    }

    // ─── Wizard inputs ──────────────────────────────────────────────────

    pub fn set_product(&self, product: Product) {
        self.inner.write().product = Some(product);
    }

    pub fn add_media(&self, asset: MediaAsset) {
        self.inner.write().media.push(asset);
    }

    pub fn set_brand_tone(&self, tone: BrandTone) {
        self.inner.write().brand_tone = Some(tone);
    }

    pub fn set_additional_context(&self, context: impl Into<String>) {
        self.inner.write().additional_context = Some(context.into());
    }

    pub fn set_call_to_action(&self, cta: impl Into<String>) {
        self.inner.write().call_to_action = Some(cta.into());
    }

    /// Select or deselect a template, preserving first-selection order.
    /// Returns whether the template is selected after the call.
    pub fn toggle_template(&self, template: AdTemplate) -> bool {
        let mut data = self.inner.write();
        if let Some(pos) = data
            .selected_templates
            .iter()
            .position(|t| t.id == template.id)
        {
            data.selected_templates.remove(pos);
            false
        } else {
            data.selected_templates.push(template);
            true
        }
    }

    pub fn selected_templates(&self) -> Vec<AdTemplate> {
        self.inner.read().selected_templates.clone()
    }

    // ─── Generated artifacts ────────────────────────────────────────────

    pub fn push_ad_copy(&self, copy: AdCopy) {
        debug!(template_id = %copy.template_id, "ad copy added to workspace");
        self.inner.write().ad_copies.push(copy);
    }

    /// Add an ad, or replace the resident copy with the same id (the
    /// reload path after a session resumes).
    pub fn insert_ad(&self, ad: GeneratedAd) {
        let mut data = self.inner.write();
        if let Some(existing) = data.generated_ads.iter_mut().find(|a| a.id == ad.id) {
            *existing = ad;
        } else {
            data.generated_ads.push(ad);
        }
    }

    pub fn ad(&self, ad_id: &Uuid) -> Option<GeneratedAd> {
        self.inner
            .read()
            .generated_ads
            .iter()
            .find(|a| a.id == *ad_id)
            .cloned()
    }

    pub fn contains_ad(&self, ad_id: &Uuid) -> bool {
        self.inner
            .read()
            .generated_ads
            .iter()
            .any(|a| a.id == *ad_id)
    }

    pub fn ad_count(&self) -> usize {
        self.inner.read().generated_ads.len()
    }

    // ─── Chat threads ───────────────────────────────────────────────────

    /// Open a new edit thread on an ad.
    pub fn create_thread(&self, ad_id: &Uuid, title: impl Into<String>) -> AdForgeResult<ChatThread> {
        let mut data = self.inner.write();
        let ad = data
            .generated_ads
            .iter_mut()
            .find(|a| a.id == *ad_id)
            .ok_or_else(|| AdForgeError::NotFound(format!("ad {ad_id}")))?;

        let thread = ChatThread::new(*ad_id, title);
        ad.threads.push(thread.clone());
        Ok(thread)
    }

    /// Append a message to a thread. The history is append-only; this is
    /// the only message mutation the workspace offers.
    pub fn append_message(
        &self,
        ad_id: &Uuid,
        thread_id: &Uuid,
        message: ChatMessage,
    ) -> AdForgeResult<()> {
        let mut data = self.inner.write();
        let ad = data
            .generated_ads
            .iter_mut()
            .find(|a| a.id == *ad_id)
            .ok_or_else(|| AdForgeError::NotFound(format!("ad {ad_id}")))?;
        let thread = ad
            .thread_mut(thread_id)
            .ok_or_else(|| AdForgeError::NotFound(format!("thread {thread_id}")))?;

        thread.append(message);
        Ok(())
    }

    pub fn thread(&self, ad_id: &Uuid, thread_id: &Uuid) -> Option<ChatThread> {
        self.inner
            .read()
            .generated_ads
            .iter()
            .find(|a| a.id == *ad_id)
            .and_then(|a| a.thread(thread_id))
            .cloned()
    }

    /// Apply an accepted edit: the ad's visual state and the thread's
    /// system message change under one lock, so no reader ever observes a
    /// half-applied edit.
    pub fn apply_edit(
        &self,
        ad_id: &Uuid,
        thread_id: Option<&Uuid>,
        edit: AppliedEdit,
    ) -> AdForgeResult<()> {
        let mut data = self.inner.write();
        let ad = data
            .generated_ads
            .iter_mut()
            .find(|a| a.id == *ad_id)
            .ok_or_else(|| AdForgeError::NotFound(format!("ad {ad_id}")))?;

        ad.final_image_url = Some(edit.final_image_url);
        if edit.textless_image_url.is_some() {
            ad.textless_image_url = edit.textless_image_url;
        }

        if let Some(thread_id) = thread_id {
            if let Some(thread) = ad.thread_mut(thread_id) {
                thread.append(ChatMessage::system(edit.summary));
            }
        }

        info!(%ad_id, "edit applied to ad");
        Ok(())
    }

    /// Abandon the flow: every field resets, nothing is persisted.
    pub fn discard(&self) {
        info!("workspace discarded");
        *self.inner.write() = AdData::default();
    }
}
