//! Replicate expression-editor client
//!
//! One gaze image is one prediction: create it (asking the API to wait for
//! the result), poll `urls.get` while it is still running, then download the
//! first output file.

use super::http_retry::{send_with_retry, RetryPolicy};
use super::source::SourceImage;
use crate::grid::GazeCoordinate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

/// Replicate REST API root
pub const DEFAULT_API_BASE: &str = "https://api.replicate.com/v1";

/// `fofr/expression-editor` model version
pub const DEFAULT_MODEL_VERSION: &str =
    "bf913bc90e1c44ba288ba3942a538693b72e8cc7df576f3beebe56adc0a92b86";

/// Environment variable holding the API token
pub const DEFAULT_TOKEN_ENV: &str = "REPLICATE_API_TOKEN";

/// Pupil offsets accepted by the model
pub const PUPIL_LIMIT: f64 = 15.0;

/// Head rotation accepted by the model (degrees)
pub const ROTATION_LIMIT_DEG: f64 = 20.0;

/// Renders one gaze variant of the source image.
///
/// The returned bytes are an encoded image in any format the `image` crate
/// can decode.
pub trait GazeRenderer: Send + Sync {
    fn render(
        &self,
        source: &SourceImage,
        coord: GazeCoordinate,
    ) -> impl Future<Output = crate::Result<Vec<u8>>> + Send;
}

/// Model input for one gaze coordinate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpressionInput {
    pub image: String,
    pub pupil_x: f64,
    pub pupil_y: f64,
    pub rotate_yaw: f64,
    pub rotate_pitch: f64,
}

impl ExpressionInput {
    /// Build the input for `coord`.
    ///
    /// Pupils are clamped to the model range. The head turns with the gaze:
    /// yaw follows `px`, pitch follows `py` inverted, both scaled so a full
    /// pupil offset maps to `head_rotation_deg`.
    pub fn new(image: &str, coord: GazeCoordinate, head_rotation_deg: f64) -> Self {
        let px = coord.px.clamp(-PUPIL_LIMIT, PUPIL_LIMIT);
        let py = coord.py.clamp(-PUPIL_LIMIT, PUPIL_LIMIT);
        let yaw = px / PUPIL_LIMIT * head_rotation_deg;
        let pitch = -(py / PUPIL_LIMIT) * head_rotation_deg;

        Self {
            image: image.to_string(),
            pupil_x: px,
            pupil_y: py,
            rotate_yaw: yaw.clamp(-ROTATION_LIMIT_DEG, ROTATION_LIMIT_DEG),
            rotate_pitch: pitch.clamp(-ROTATION_LIMIT_DEG, ROTATION_LIMIT_DEG),
        }
    }
}

#[derive(Debug, Serialize)]
struct PredictionRequest<'a> {
    version: &'a str,
    input: &'a ExpressionInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PredictionUrls {
    #[serde(default)]
    get: Option<String>,
}

/// Prediction resource as returned by the API
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

impl Prediction {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }

    /// First output URL; the model returns either one URL or a list
    pub fn first_output_url(&self) -> Option<String> {
        match self.output.as_ref()? {
            serde_json::Value::String(url) if !url.is_empty() => Some(url.clone()),
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str())
                .find(|s| !s.is_empty())
                .map(str::to_string),
            _ => None,
        }
    }

    fn poll_url(&self) -> Option<&str> {
        self.urls.as_ref()?.get.as_deref()
    }

    fn error_message(&self) -> String {
        match &self.error {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "no error message".to_string(),
        }
    }
}

/// Connection settings for [`ReplicateClient`]
#[derive(Debug, Clone)]
pub struct ReplicateSettings {
    pub api_base: String,
    pub model_version: String,
    pub token: String,
    pub head_rotation_deg: f64,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub retry: RetryPolicy,
}

impl ReplicateSettings {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            token: token.into(),
            head_rotation_deg: 10.0,
            request_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(1),
            max_wait: Duration::from_secs(300),
            retry: RetryPolicy::default(),
        }
    }
}

/// Read the API token from `var`
pub fn token_from_env(var: &str) -> crate::Result<String> {
    match std::env::var(var) {
        Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(crate::Error::MissingCredentials(format!(
            "{} not set in environment",
            var
        ))),
    }
}

/// HTTP client for the expression-editor model
pub struct ReplicateClient {
    settings: ReplicateSettings,
    client: Client,
}

impl ReplicateClient {
    pub fn new(settings: ReplicateSettings) -> crate::Result<Self> {
        if settings.token.trim().is_empty() {
            return Err(crate::Error::MissingCredentials("empty API token".to_string()));
        }
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &ReplicateSettings {
        &self.settings
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.settings.token)
    }

    async fn create_prediction(&self, input: &ExpressionInput) -> crate::Result<Prediction> {
        let url = format!("{}/predictions", self.settings.api_base.trim_end_matches('/'));
        let body = PredictionRequest {
            version: &self.settings.model_version,
            input,
        };
        let auth = self.auth_header();

        let response = send_with_retry(
            &self.client,
            |c| {
                c.post(&url)
                    .header("Authorization", &auth)
                    .header("Prefer", "wait")
                    .json(&body)
            },
            &self.settings.retry,
            "create prediction",
        )
        .await?;

        Ok(response.json::<Prediction>().await?)
    }

    async fn fetch_prediction(&self, url: &str) -> crate::Result<Prediction> {
        let auth = self.auth_header();
        let response = send_with_retry(
            &self.client,
            |c| c.get(url).header("Authorization", &auth),
            &self.settings.retry,
            "poll prediction",
        )
        .await?;

        Ok(response.json::<Prediction>().await?)
    }

    /// Poll until the prediction reaches a terminal status or `max_wait` elapses
    async fn wait_for(&self, mut prediction: Prediction) -> crate::Result<Prediction> {
        let started = Instant::now();
        while !prediction.is_terminal() {
            if started.elapsed() >= self.settings.max_wait {
                return Err(crate::Error::Service(format!(
                    "prediction {} still '{}' after {:?}",
                    prediction.id, prediction.status, self.settings.max_wait
                )));
            }
            let Some(poll_url) = prediction.poll_url().map(str::to_string) else {
                return Err(crate::Error::Service(format!(
                    "prediction {} is '{}' but has no poll URL",
                    prediction.id, prediction.status
                )));
            };
            tokio::time::sleep(self.settings.poll_interval).await;
            prediction = self.fetch_prediction(&poll_url).await?;
            debug!(id = %prediction.id, status = %prediction.status, "Polled prediction");
        }
        Ok(prediction)
    }

    /// Fetch an output file. The request carries no credentials, so a
    /// 401/403 here is an expired or forbidden file URL and only fails
    /// this coordinate.
    async fn download(&self, url: &str) -> crate::Result<Vec<u8>> {
        let response = send_with_retry(
            &self.client,
            |c| c.get(url),
            &self.settings.retry,
            "download output",
        )
        .await
        .map_err(|e| match e {
            crate::Error::Unauthorized(msg) => crate::Error::Service(msg),
            other => other,
        })?;
        Ok(response.bytes().await?.to_vec())
    }
}

impl GazeRenderer for ReplicateClient {
    async fn render(&self, source: &SourceImage, coord: GazeCoordinate) -> crate::Result<Vec<u8>> {
        let input = ExpressionInput::new(source.input_value(), coord, self.settings.head_rotation_deg);
        let prediction = self.create_prediction(&input).await?;
        debug!(id = %prediction.id, status = %prediction.status, px = coord.px, py = coord.py, "Prediction created");

        let prediction = self.wait_for(prediction).await?;
        match prediction.status.as_str() {
            "succeeded" => {}
            status => {
                return Err(crate::Error::Service(format!(
                    "prediction {} {}: {}",
                    prediction.id,
                    status,
                    prediction.error_message()
                )))
            }
        }

        let url = prediction.first_output_url().ok_or_else(|| {
            crate::Error::Service(format!("no output for {}", coord))
        })?;
        self.download(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_input_center() {
        let input = ExpressionInput::new("img", GazeCoordinate::new(0.0, 0.0), 10.0);
        assert_eq!(input.pupil_x, 0.0);
        assert_eq!(input.rotate_yaw, 0.0);
        assert_eq!(input.rotate_pitch, 0.0);
    }

    #[test]
    fn test_expression_input_rotation_follows_gaze() {
        let input = ExpressionInput::new("img", GazeCoordinate::new(15.0, 15.0), 10.0);
        assert_eq!(input.rotate_yaw, 10.0);
        assert_eq!(input.rotate_pitch, -10.0);

        let input = ExpressionInput::new("img", GazeCoordinate::new(-7.5, -7.5), 10.0);
        assert_eq!(input.rotate_yaw, -5.0);
        assert_eq!(input.rotate_pitch, 5.0);
    }

    #[test]
    fn test_expression_input_clamps_pupils_and_rotation() {
        let input = ExpressionInput::new("img", GazeCoordinate::new(30.0, -40.0), 50.0);
        assert_eq!(input.pupil_x, 15.0);
        assert_eq!(input.pupil_y, -15.0);
        assert_eq!(input.rotate_yaw, 20.0);
        assert_eq!(input.rotate_pitch, 20.0);
    }

    #[test]
    fn test_expression_input_serializes_model_fields() {
        let input = ExpressionInput::new("https://x/face.jpg", GazeCoordinate::new(3.0, 0.0), 10.0);
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["image"], "https://x/face.jpg");
        assert_eq!(json["pupil_x"], 3.0);
        assert_eq!(json["pupil_y"], 0.0);
        assert_eq!(json["rotate_yaw"], 2.0);
    }

    #[test]
    fn test_prediction_output_variants() {
        let single: Prediction =
            serde_json::from_str(r#"{"id":"a","status":"succeeded","output":"https://o/1.webp"}"#).unwrap();
        assert_eq!(single.first_output_url().as_deref(), Some("https://o/1.webp"));

        let list: Prediction =
            serde_json::from_str(r#"{"id":"b","status":"succeeded","output":["https://o/2.webp"]}"#).unwrap();
        assert_eq!(list.first_output_url().as_deref(), Some("https://o/2.webp"));

        let empty: Prediction =
            serde_json::from_str(r#"{"id":"c","status":"succeeded","output":[]}"#).unwrap();
        assert!(empty.first_output_url().is_none());

        let null: Prediction = serde_json::from_str(r#"{"id":"d","status":"starting","output":null}"#).unwrap();
        assert!(null.first_output_url().is_none());
        assert!(!null.is_terminal());
    }

    #[test]
    fn test_prediction_error_message() {
        let failed: Prediction =
            serde_json::from_str(r#"{"id":"e","status":"failed","error":"NSFW content"}"#).unwrap();
        assert!(failed.is_terminal());
        assert_eq!(failed.error_message(), "NSFW content");
    }

    #[test]
    fn test_client_requires_token() {
        let result = ReplicateClient::new(ReplicateSettings::new("  "));
        assert!(matches!(result, Err(crate::Error::MissingCredentials(_))));
    }

    #[test]
    fn test_token_from_env_missing() {
        let result = token_from_env("GAZE_GRID_TEST_TOKEN_THAT_IS_NEVER_SET");
        assert!(matches!(result, Err(crate::Error::MissingCredentials(_))));
    }
}
