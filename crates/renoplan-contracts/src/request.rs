use serde_json::{json, Value};

use crate::intake::ImageAsset;
use crate::property::PropertyDetails;
use crate::schema::plan_response_schema;

/// Low-randomness sampling: the plan should be analytical and repeatable,
/// not creative.
pub const PLAN_TEMPERATURE: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImagePart {
    pub mime_type: String,
    pub data: String,
}

/// A composite plan request: the ordered image payloads plus the instruction
/// text that embeds the property facts verbatim. Pure data; no I/O happens
/// until a client submits it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRequest {
    pub image_parts: Vec<InlineImagePart>,
    pub instruction: String,
}

impl PlanRequest {
    /// Full `generateContent` request body: image parts in intake order, the
    /// instruction last, and the declared response schema constraining the
    /// output to machine-parseable JSON.
    pub fn to_payload(&self) -> Value {
        let mut parts: Vec<Value> = self
            .image_parts
            .iter()
            .map(|part| {
                json!({
                    "inlineData": {
                        "mimeType": part.mime_type,
                        "data": part.data,
                    }
                })
            })
            .collect();
        parts.push(json!({ "text": self.instruction }));

        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "temperature": PLAN_TEMPERATURE,
                "responseMimeType": "application/json",
                "responseSchema": plan_response_schema(),
            }
        })
    }
}

/// Builds the composite request. Preconditions (non-empty address, at least
/// one image) are checked by the caller via `validate_plan_inputs`.
pub fn build_plan_request(details: &PropertyDetails, images: &[ImageAsset]) -> PlanRequest {
    let image_parts = images
        .iter()
        .map(|asset| InlineImagePart {
            mime_type: asset.mime_type.clone(),
            data: asset.base64_data.clone(),
        })
        .collect();
    PlanRequest {
        image_parts,
        instruction: plan_instruction(details),
    }
}

fn plan_instruction(details: &PropertyDetails) -> String {
    format!(
        "You are an experienced renovation planner for existing residential buildings. \
         Analyze the attached property photos and produce a complete renovation plan.\n\n\
         Property facts:\n\
         - Address: {address}\n\
         - Floor area: {floor_area} sqm\n\
         - Renovation budget: {budget} EUR\n\
         - Current energy efficiency class: {class}\n\n\
         Identify the building style from the photos. Order the phases as a realistic \
         construction sequence, stay within the budget, and include ROI projections, \
         CO2 savings, and applicable German funding programs. Respond with \
         machine-parseable JSON conforming exactly to the declared response schema.",
        address = details.address,
        floor_area = details.floor_area_sqm,
        budget = details.budget_eur,
        class = details.efficiency_class,
    )
}
