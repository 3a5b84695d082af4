use reqwest::Client as HttpClient;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::model::{DetectionResponse, MalformedPrediction, Prediction};
use crate::config::Settings;

const SEGMENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("URL parsing failed: {0}")]
    Url(#[from] url::ParseError),
    #[error("Detection service returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("Malformed detection response: {0}")]
    Malformed(#[from] MalformedPrediction),
}

/// Client for the hosted Roboflow inference endpoints.
#[derive(Clone)]
pub struct RoboflowClient {
    http_client: HttpClient,
    api_key: String,
    segment_url: String,
    detect_url: String,
    pith_model_id: String,
}

impl RoboflowClient {
    pub fn new(settings: &Settings) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key: settings.roboflow_api_key.clone(),
            segment_url: settings.roboflow_segment_url.clone(),
            detect_url: settings.roboflow_detect_url.clone(),
            pith_model_id: settings.pith_model_id.clone(),
        }
    }

    pub fn endpoint(&self, base: &str, model_id: &str) -> Result<Url, DetectionError> {
        let mut url = Url::parse(&format!(
            "{}/{}",
            base.trim_end_matches('/'),
            model_id.trim_start_matches('/')
        ))?;
        url.query_pairs_mut().append_pair("api_key", &self.api_key);
        Ok(url)
    }

    async fn read_predictions(
        response: reqwest::Response,
    ) -> Result<Vec<Prediction>, DetectionError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(DetectionError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: DetectionResponse = response.json().await?;
        Ok(parsed.into_predictions()?)
    }

    /// Polygon segmentation. The image travels base64 encoded as the form body.
    pub async fn segment(
        &self,
        image_data: &[u8],
        model_id: &str,
    ) -> Result<Vec<Prediction>, DetectionError> {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(image_data);
        let url = self.endpoint(&self.segment_url, model_id)?;

        log::debug!("Requesting segmentation from model {}", model_id);
        let response = self
            .http_client
            .post(url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(encoded)
            .timeout(SEGMENT_TIMEOUT)
            .send()
            .await?;

        let predictions = Self::read_predictions(response).await?;
        log::info!(
            "Model {} returned {} predictions",
            model_id,
            predictions.len()
        );
        Ok(predictions)
    }

    /// Pith detection. The image is uploaded as a multipart `file` field.
    pub async fn detect_pith(
        &self,
        image_data: &[u8],
        file_name: &str,
    ) -> Result<Vec<Prediction>, DetectionError> {
        let url = self.endpoint(&self.detect_url, &self.pith_model_id)?;
        let part = Part::bytes(image_data.to_vec()).file_name(file_name.to_string());
        let form = Form::new().part("file", part);

        log::debug!("Requesting pith detection for {}", file_name);
        let response = self.http_client.post(url).multipart(form).send().await?;

        let predictions = Self::read_predictions(response).await?;
        log::info!("Pith model returned {} predictions", predictions.len());
        Ok(predictions)
    }
}
