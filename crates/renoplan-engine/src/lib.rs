use std::env;
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, Rgb, RgbImage};
use renoplan_contracts::dashboard::GeneratedImage;
use renoplan_contracts::error::{AssetGenerationError, PlanGenerationError, ServiceError};
use renoplan_contracts::intake::ImageAsset;
use renoplan_contracts::plan::{
    Co2Metric, FundingBadge, RenovationPhase, RenovationPlan, RoiMetric,
};
use renoplan_contracts::property::PropertyDetails;
use renoplan_contracts::request::build_plan_request;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

pub const DEFAULT_PLAN_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_S: f64 = 90.0;
const MIN_TIMEOUT_S: f64 = 5.0;
const MAX_TIMEOUT_S: f64 = 300.0;

const VISUALIZATION_ASPECT_RATIO: &str = "16:9";
const BLUEPRINT_ASPECT_RATIO: &str = "4:3";

/// Host hook for credential resolution. `api_key` reports a credential that
/// is already selected; `request_api_key` lets an interactive host prompt
/// for one. With no hook supplied the environment is treated as the
/// already-selected credential.
pub trait CredentialSource: Send + Sync {
    fn api_key(&self) -> Option<String>;

    fn request_api_key(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentialSource;

impl CredentialSource for EnvCredentialSource {
    fn api_key(&self) -> Option<String> {
        non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"))
    }
}

fn resolve_credential(source: &dyn CredentialSource) -> Result<String, ServiceError> {
    source
        .api_key()
        .or_else(|| source.request_api_key())
        .ok_or(ServiceError::MissingCredential)
}

/// Discrete image-quality settings accepted by the image service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResolutionTier {
    Standard,
    #[default]
    High,
    Ultra,
}

impl ResolutionTier {
    pub fn label(&self) -> &'static str {
        match self {
            ResolutionTier::Standard => "1K",
            ResolutionTier::High => "2K",
            ResolutionTier::Ultra => "4K",
        }
    }
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ResolutionTier {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1k" | "standard" => Ok(ResolutionTier::Standard),
            "2k" | "high" => Ok(ResolutionTier::High),
            "4k" | "ultra" => Ok(ResolutionTier::Ultra),
            _ => Err(format!(
                "unknown resolution tier '{raw}' (expected 1K, 2K, or 4K)"
            )),
        }
    }
}

/// Plan Generation Client: one `generateContent` call per invocation,
/// constrained by the declared response schema. No internal retries; the
/// caller decides whether to re-invoke.
pub struct PlanService {
    api_base: String,
    model: String,
    timeout: Duration,
    http: Result<HttpClient, String>,
    credentials: Box<dyn CredentialSource>,
}

impl PlanService {
    pub fn new() -> Self {
        Self::with_credentials(Box::new(EnvCredentialSource))
    }

    pub fn with_credentials(credentials: Box<dyn CredentialSource>) -> Self {
        Self {
            api_base: resolve_api_base(),
            model: DEFAULT_PLAN_MODEL.to_string(),
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_S),
            http: build_http_client(),
            credentials,
        }
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Clamped to the supported range; non-finite values are ignored and the
    /// current timeout stays in effect.
    pub fn set_timeout_seconds(&mut self, seconds: f64) {
        if !seconds.is_finite() {
            return;
        }
        self.timeout = Duration::from_secs_f64(seconds.clamp(MIN_TIMEOUT_S, MAX_TIMEOUT_S));
    }

    pub fn timeout_seconds(&self) -> f64 {
        self.timeout.as_secs_f64()
    }

    /// Generates a plan for the property from its photos, all-or-nothing.
    /// Preconditions (non-empty address, at least one image) are the
    /// caller's to check via `validate_plan_inputs`.
    pub fn generate_plan(
        &self,
        details: &PropertyDetails,
        images: &[ImageAsset],
    ) -> Result<RenovationPlan, PlanGenerationError> {
        let api_key = resolve_credential(self.credentials.as_ref())?;
        let payload = build_plan_request(details, images).to_payload();
        let endpoint = endpoint_for_model(&self.api_base, &self.model);

        let response = http_client(&self.http)?
            .post(&endpoint)
            .query(&[("key", api_key.as_str())])
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .map_err(|err| transport_error("plan", &endpoint, &err))?;
        let envelope = response_json("plan", response)?;
        plan_from_envelope(&envelope)
    }
}

impl Default for PlanService {
    fn default() -> Self {
        Self::new()
    }
}

/// Asset Generation Client: stateless, idempotent per input, one request
/// per invocation. No caching, no dedup, no rate limiting; concurrent calls
/// for different phases share no mutable state.
pub struct AssetService {
    api_base: String,
    model: String,
    timeout: Duration,
    http: Result<HttpClient, String>,
    credentials: Box<dyn CredentialSource>,
}

impl AssetService {
    pub fn new() -> Self {
        Self::with_credentials(Box::new(EnvCredentialSource))
    }

    pub fn with_credentials(credentials: Box<dyn CredentialSource>) -> Self {
        Self {
            api_base: resolve_api_base(),
            model: DEFAULT_IMAGE_MODEL.to_string(),
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_S),
            http: build_http_client(),
            credentials,
        }
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Clamped to the supported range; non-finite values are ignored and the
    /// current timeout stays in effect.
    pub fn set_timeout_seconds(&mut self, seconds: f64) {
        if !seconds.is_finite() {
            return;
        }
        self.timeout = Duration::from_secs_f64(seconds.clamp(MIN_TIMEOUT_S, MAX_TIMEOUT_S));
    }

    pub fn timeout_seconds(&self) -> f64 {
        self.timeout.as_secs_f64()
    }

    /// Photorealistic after-renovation visualization for one phase, 16:9 at
    /// the requested quality tier.
    pub fn generate_visualization(
        &self,
        phase_description: &str,
        building_style: &str,
        tier: ResolutionTier,
    ) -> Result<GeneratedImage, AssetGenerationError> {
        let prompt = visualization_prompt(phase_description, building_style);
        self.generate_image(&prompt, VISUALIZATION_ASPECT_RATIO, tier)
    }

    /// Technical schematic for one phase; always the lowest tier since line
    /// drawings gain nothing from 4K.
    pub fn generate_blueprint(
        &self,
        phase_name: &str,
        phase_description: &str,
        building_style: &str,
    ) -> Result<GeneratedImage, AssetGenerationError> {
        let prompt = blueprint_prompt(phase_name, phase_description, building_style);
        self.generate_image(&prompt, BLUEPRINT_ASPECT_RATIO, ResolutionTier::Standard)
    }

    fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: &str,
        tier: ResolutionTier,
    ) -> Result<GeneratedImage, AssetGenerationError> {
        let api_key = resolve_credential(self.credentials.as_ref())?;
        let payload = image_payload(prompt, aspect_ratio, tier);
        let endpoint = endpoint_for_model(&self.api_base, &self.model);

        let response = http_client(&self.http)?
            .post(&endpoint)
            .query(&[("key", api_key.as_str())])
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .map_err(|err| transport_error("image", &endpoint, &err))?;
        let envelope = response_json("image", response)?;
        image_from_envelope(&envelope)
    }
}

impl Default for AssetService {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts and parses the plan from a `generateContent` envelope.
pub fn plan_from_envelope(envelope: &Value) -> Result<RenovationPlan, PlanGenerationError> {
    let text = extract_candidate_text(envelope);
    RenovationPlan::from_response_text(&text)
}

/// The first inline image across all candidate parts, or `NoImageProduced`.
pub fn image_from_envelope(envelope: &Value) -> Result<GeneratedImage, AssetGenerationError> {
    extract_inline_image(envelope).ok_or(AssetGenerationError::NoImageProduced)
}

/// Decodes a generated image payload to raw bytes for writing to disk.
pub fn decode_image(image: &GeneratedImage) -> Result<Vec<u8>, AssetGenerationError> {
    BASE64
        .decode(image.base64_data.as_bytes())
        .map_err(|err| AssetGenerationError::BadImageData {
            detail: err.to_string(),
        })
}

fn image_payload(prompt: &str, aspect_ratio: &str, tier: ResolutionTier) -> Value {
    json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "responseModalities": ["IMAGE"],
            "imageConfig": {
                "aspectRatio": aspect_ratio,
                "imageSize": tier.label(),
            },
        }
    })
}

fn visualization_prompt(phase_description: &str, building_style: &str) -> String {
    format!(
        "Photorealistic architectural visualization of a renovated {building_style} building \
         after the following renovation work: {phase_description}. Golden-hour daylight, \
         high detail, no people, no text overlays."
    )
}

fn blueprint_prompt(phase_name: &str, phase_description: &str, building_style: &str) -> String {
    format!(
        "Technical architectural blueprint for the renovation phase '{phase_name}' of a \
         {building_style} building: {phase_description}. White line work on blue background, \
         orthographic projection, dimension annotations, schematic drawing style, \
         not photorealistic."
    )
}

fn extract_candidate_text(envelope: &Value) -> String {
    let Some(candidates) = envelope.get("candidates").and_then(Value::as_array) else {
        return String::new();
    };
    for candidate in candidates {
        let parts = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array);
        let Some(parts) = parts else { continue };
        let mut text = String::new();
        for part in parts {
            if let Some(chunk) = part.get("text").and_then(Value::as_str) {
                text.push_str(chunk);
            }
        }
        if !text.trim().is_empty() {
            return text;
        }
    }
    String::new()
}

fn extract_inline_image(envelope: &Value) -> Option<GeneratedImage> {
    let candidates = envelope.get("candidates").and_then(Value::as_array)?;
    for candidate in candidates {
        let parts = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array);
        let Some(parts) = parts else { continue };
        for part in parts {
            let Some(inline) = part.get("inlineData").or_else(|| part.get("inline_data")) else {
                continue;
            };
            let data = inline.get("data").and_then(Value::as_str).unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .unwrap_or("image/png")
                .to_string();
            return Some(GeneratedImage {
                mime_type,
                base64_data: data.to_string(),
            });
        }
    }
    None
}

/// Deterministic offline plan, schema-conformant, seeded by the address.
/// Stands in for the live service in tests and `--dryrun` runs.
pub fn dryrun_plan(details: &PropertyDetails) -> RenovationPlan {
    let seed = stable_seed(&details.address);
    let styles = [
        "Gründerzeit Altbau",
        "post-war apartment block",
        "1970s row house",
        "brick industrial conversion",
    ];
    let building_style = styles[(seed % styles.len() as u64) as usize].to_string();

    let phase_templates: [(&str, f64, f64, &str); 4] = [
        (
            "Building envelope & insulation",
            0.32,
            8.0,
            "Insulate facade and roof, seal thermal bridges.",
        ),
        (
            "Windows & doors",
            0.18,
            4.0,
            "Replace old glazing with triple-glazed units.",
        ),
        (
            "Heating & ventilation",
            0.35,
            9.0,
            "Install a heat pump and decentralized ventilation.",
        ),
        (
            "Interior finishes",
            0.15,
            5.0,
            "Repair surfaces and repaint after the technical phases.",
        ),
    ];
    let phases: Vec<RenovationPhase> = phase_templates
        .iter()
        .map(|(name, share, weeks, description)| RenovationPhase {
            name: (*name).to_string(),
            duration_weeks: *weeks,
            cost_estimate: (details.budget_eur * share).round(),
            description: (*description).to_string(),
        })
        .collect();

    let total_cost: f64 = phases.iter().map(|phase| phase.cost_estimate).sum();
    let total_duration_weeks: f64 = phases.iter().map(|phase| phase.duration_weeks).sum();

    let annual_saving_eur = details.floor_area_sqm * 14.0;
    let roi_projection = (1..=10)
        .map(|year| RoiMetric {
            year,
            value: (annual_saving_eur * f64::from(year)).round(),
        })
        .collect();

    let co2_savings = vec![
        Co2Metric {
            category: "Heating".to_string(),
            saving_tons: round2(details.floor_area_sqm * 0.021),
            description: "Heat pump replaces fossil heating.".to_string(),
        },
        Co2Metric {
            category: "Hot water".to_string(),
            saving_tons: round2(details.floor_area_sqm * 0.006),
            description: "Efficient hot-water generation.".to_string(),
        },
        Co2Metric {
            category: "Electricity".to_string(),
            saving_tons: round2(details.floor_area_sqm * 0.004),
            description: "Lower auxiliary power demand.".to_string(),
        },
    ];

    let funding = vec![
        FundingBadge {
            name: "KfW 261".to_string(),
            amount: "up to 150,000 EUR per unit".to_string(),
            description: "Federal loan with repayment grant for efficiency renovations."
                .to_string(),
        },
        FundingBadge {
            name: "BAFA BEG EM".to_string(),
            amount: "15-20% of eligible costs".to_string(),
            description: "Grant for individual measures such as heat pumps and insulation."
                .to_string(),
        },
    ];

    RenovationPlan {
        summary: format!(
            "Staged energetic renovation for {}: from efficiency class {} toward class B \
             in roughly {:.0} weeks, prioritizing envelope and heating.",
            details.address, details.efficiency_class, total_duration_weeks
        ),
        building_style,
        phases,
        roi_projection,
        co2_savings,
        funding,
        total_cost,
        total_duration_weeks,
    }
}

/// Deterministic flat-color PNG seeded by the prompt. Offline stand-in for
/// the image service.
pub fn dryrun_image(
    width: u32,
    height: u32,
    prompt: &str,
) -> Result<GeneratedImage, AssetGenerationError> {
    let digest = Sha256::digest(prompt.as_bytes());
    let mut canvas = RgbImage::new(width.max(1), height.max(1));
    for pixel in canvas.pixels_mut() {
        *pixel = Rgb([digest[0], digest[1], digest[2]]);
    }
    let mut bytes = Cursor::new(Vec::new());
    canvas
        .write_to(&mut bytes, ImageFormat::Png)
        .map_err(|err| AssetGenerationError::BadImageData {
            detail: err.to_string(),
        })?;
    Ok(GeneratedImage {
        mime_type: "image/png".to_string(),
        base64_data: BASE64.encode(bytes.into_inner()),
    })
}

/// Short stable id for artifact filenames.
pub fn short_id(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(&digest[..4])
}

fn stable_seed(text: &str) -> u64 {
    let digest = Sha256::digest(text.as_bytes());
    u64::from_be_bytes(digest[..8].try_into().unwrap_or_default())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn endpoint_for_model(api_base: &str, model: &str) -> String {
    let trimmed = model.trim();
    let model_path = if trimmed.starts_with("models/") {
        trimmed.to_string()
    } else {
        format!("models/{trimmed}")
    };
    format!("{api_base}/{model_path}:generateContent")
}

// Client construction is infallible in practice, but a broken TLS backend
// surfaces here; hold the error and report it as a transport failure on
// first use instead of panicking at construction.
fn build_http_client() -> Result<HttpClient, String> {
    HttpClient::builder()
        .build()
        .map_err(|err| format!("http client init failed: {err}"))
}

fn http_client(http: &Result<HttpClient, String>) -> Result<&HttpClient, ServiceError> {
    http.as_ref()
        .map_err(|detail| ServiceError::Transport(detail.clone()))
}

fn resolve_api_base() -> String {
    env::var("GEMINI_API_BASE")
        .ok()
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
}

fn transport_error(label: &str, endpoint: &str, err: &reqwest::Error) -> ServiceError {
    ServiceError::Transport(format!("{label} request failed ({endpoint}): {err}"))
}

fn response_json(label: &str, response: HttpResponse) -> Result<Value, ServiceError> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|err| ServiceError::Transport(format!("{label} response body read failed: {err}")))?;
    if !status.is_success() {
        return Err(ServiceError::Http {
            status: status.as_u16(),
            detail: truncate_text(&body, 512),
        });
    }
    serde_json::from_str(&body)
        .map_err(|_| ServiceError::Transport(format!("{label} returned an invalid JSON envelope")))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
