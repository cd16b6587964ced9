use crate::controller::{SessionController, UploadOutcome};
use crate::session::UploadStatus;
use crate::traits::{Notifier, TokenSource};
use agrivoice_core::{AssistantError, IncomingMessage, Notice, OutboundMessage};
use agrivoice_providers::disease_detection::{
    DiseaseDetectionConfig, ImageFile, build_disease_detection_request,
};
use agrivoice_providers::parse::{AnalysisResult, parse_analysis, upload_failure_reason};
use agrivoice_providers::runtime::execute;
use std::sync::Arc;

/// Runs the image side-channel next to a live session: spots the
/// assistant's request, uploads the picture, and feeds the analysis back in.
#[derive(Clone)]
pub struct UploadInterjector {
    controller: SessionController,
    auth: Arc<dyn TokenSource>,
    notifier: Arc<dyn Notifier>,
    api_base_url: String,
}

impl UploadInterjector {
    pub fn new(
        controller: SessionController,
        auth: Arc<dyn TokenSource>,
        notifier: Arc<dyn Notifier>,
        api_base_url: impl Into<String>,
    ) -> Self {
        Self {
            controller,
            auth,
            notifier,
            api_base_url: api_base_url.into(),
        }
    }

    /// Returns true when this message made the upload prompt visible.
    pub async fn observe(&self, message: &IncomingMessage) -> bool {
        self.controller.raise_upload_prompt(message).await
    }

    /// Uploads `image` for analysis and hands the result to the session that
    /// was active when the upload began.
    ///
    /// Session events keep flowing while the request is in flight. A failed
    /// upload leaves the session and the upload prompt as they were.
    pub async fn submit_image(&self, image: ImageFile) -> Result<UploadOutcome, AssistantError> {
        let upload = match self.controller.begin_upload(&image.filename).await {
            Ok(u) => u,
            Err(e) => {
                log::warn!("upload refused: {e}");
                self.notifier.notify(Notice::from_error(&e));
                return Err(e);
            }
        };

        let result = match self.analyze(upload.id, &image).await {
            Ok(r) => r,
            Err(e) => {
                log::error!("image upload {} failed: {e}", upload.id);
                self.controller
                    .set_upload_status(upload.id, UploadStatus::Failed)
                    .await;
                self.notifier.notify(Notice::from_error(&e));
                return Err(e);
            }
        };

        log::info!(
            "analysis for upload {} complete: {:?}",
            upload.id,
            result.predicted_disease()
        );
        self.notifier.notify(Notice::analysis_complete());

        self.controller
            .deliver_upload(
                &upload,
                OutboundMessage::synthetic_user(result.conversation_message()),
            )
            .await
    }

    async fn analyze(
        &self,
        upload_id: u64,
        image: &ImageFile,
    ) -> Result<AnalysisResult, AssistantError> {
        let token = match self.auth.bearer_token() {
            Ok(Some(t)) => t,
            Ok(None) => {
                return Err(AssistantError::Unauthenticated(
                    "no bearer token available".into(),
                ));
            }
            Err(e) => return Err(AssistantError::Unauthenticated(format!("{e:#}"))),
        };

        self.controller
            .set_upload_status(upload_id, UploadStatus::Uploading)
            .await;
        self.notifier.notify(Notice::uploading(&image.filename));

        let cfg = DiseaseDetectionConfig {
            api_base_url: self.api_base_url.clone(),
            token,
        };
        let req = build_disease_detection_request(&cfg, image);
        log::debug!("disease detection request: {req:?}");

        let resp = execute(&req)
            .await
            .map_err(|e| AssistantError::upload(format!("{e:#}")))?;
        if !resp.is_success() {
            return Err(AssistantError::upload(upload_failure_reason(
                resp.status,
                &resp.body,
            )));
        }
        parse_analysis(&resp.body).map_err(|e| AssistantError::upload(format!("{e:#}")))
    }
}
