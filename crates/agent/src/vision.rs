//! Image analysis: one multimodal call, no tools, no structured output.

use std::sync::Arc;
use std::time::Instant;

use dentassist_config::AppConfig;
use dentassist_core::error::ProviderError;
use dentassist_core::event::{DomainEvent, EventBus};
use dentassist_core::image::ImagePart;
use dentassist_core::message::Message;
use dentassist_core::provider::{Provider, ProviderRequest};
use tracing::{info, warn};

pub const VISION_PROMPT: &str =
    "You are a dental AI assistant. Analyze dental photos for possible issues.";

/// Sends dental photos plus the patient's symptoms to the vision model.
pub struct ImageAnalyzer {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    event_bus: Arc<EventBus>,
}

impl ImageAnalyzer {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            event_bus,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let mut analyzer = Self::new(provider, &config.vision_model, event_bus);
        analyzer.temperature = config.temperature;
        analyzer.max_tokens = Some(config.max_tokens);
        analyzer
    }

    /// Analyze `images` in light of `symptoms` and return the model's text.
    pub async fn analyze(
        &self,
        images: Vec<ImagePart>,
        symptoms: &str,
    ) -> Result<String, ProviderError> {
        let image_count = images.len();
        let start = Instant::now();

        let mut request = ProviderRequest::new(
            &self.model,
            vec![
                Message::system(VISION_PROMPT),
                Message::user_with_images(format!("Patient symptoms: {symptoms}"), images),
            ],
        );
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;

        let result = self
            .provider
            .complete(request)
            .await
            .map(|response| response.message.content);

        let latency_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(image_count, latency_ms, "Image analysis completed"),
            Err(e) => warn!(image_count, error = %e, "Image analysis failed"),
        }

        self.event_bus.publish(DomainEvent::ImageAnalyzed {
            image_count,
            success: result.is_ok(),
            latency_ms,
            timestamp: chrono::Utc::now(),
        });

        result
    }
}
