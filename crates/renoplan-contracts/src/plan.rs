use serde::{Deserialize, Serialize};

use crate::error::PlanGenerationError;

/// One ordered renovation stage. Order is the construction sequence as
/// returned by the service and is preserved as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenovationPhase {
    pub name: String,
    pub duration_weeks: f64,
    pub cost_estimate: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiMetric {
    pub year: u32,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Co2Metric {
    pub category: String,
    pub saving_tons: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingBadge {
    pub name: String,
    pub amount: String,
    pub description: String,
}

/// The AI-generated renovation plan. Created whole on a successful
/// generation call and replaced wholesale on regeneration; never patched.
///
/// `total_cost` and `total_duration_weeks` are the plan's own declared
/// aggregates. They are not reconciled against the per-phase values, and ROI
/// years and CO2 savings are taken as returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenovationPlan {
    pub summary: String,
    pub building_style: String,
    pub phases: Vec<RenovationPhase>,
    pub roi_projection: Vec<RoiMetric>,
    pub co2_savings: Vec<Co2Metric>,
    pub funding: Vec<FundingBadge>,
    pub total_cost: f64,
    #[serde(rename = "totalDuration")]
    pub total_duration_weeks: f64,
}

impl RenovationPlan {
    /// Parses the service response text into a plan, all-or-nothing. A blank
    /// response is `EmptyResponse`; anything that fails strict decoding
    /// (including a missing required field) is `MalformedPayload`.
    pub fn from_response_text(text: &str) -> Result<Self, PlanGenerationError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(PlanGenerationError::EmptyResponse);
        }
        let body = strip_code_fence(trimmed);
        serde_json::from_str(body).map_err(|err| PlanGenerationError::MalformedPayload {
            detail: err.to_string(),
        })
    }
}

// Models occasionally wrap JSON output in a markdown fence even when asked
// not to; tolerate that one decoration.
fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let inner = inner
        .strip_prefix("json")
        .or_else(|| inner.strip_prefix("JSON"))
        .unwrap_or(inner);
    let inner = inner.trim_start();
    inner
        .strip_suffix("```")
        .map(str::trim)
        .unwrap_or_else(|| inner.trim())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::RenovationPlan;
    use crate::error::PlanGenerationError;

    fn sample_response() -> serde_json::Value {
        json!({
            "summary": "Full energetic renovation in three phases.",
            "buildingStyle": "Gründerzeit Altbau",
            "phases": [
                {
                    "name": "Building envelope",
                    "durationWeeks": 10,
                    "costEstimate": 120000.5,
                    "description": "Insulate facade and roof."
                },
                {
                    "name": "Heating",
                    "durationWeeks": 16,
                    "costEstimate": 59999.5,
                    "description": "Replace gas boiler with a heat pump."
                }
            ],
            "roiProjection": [
                { "year": 1, "value": 7200.0 },
                { "year": 2, "value": 14400.0 }
            ],
            "co2Savings": [
                {
                    "category": "Heating",
                    "savingTons": 12.4,
                    "description": "Heat pump replaces gas."
                }
            ],
            "funding": [
                {
                    "name": "KfW 261",
                    "amount": "up to 150,000 EUR",
                    "description": "Federal loan for efficiency renovations."
                }
            ],
            "totalCost": 180000,
            "totalDuration": 26
        })
    }

    #[test]
    fn well_formed_response_parses_without_coercion_loss() {
        let text = sample_response().to_string();
        let plan = RenovationPlan::from_response_text(&text).unwrap();

        assert_eq!(plan.summary, "Full energetic renovation in three phases.");
        assert_eq!(plan.building_style, "Gründerzeit Altbau");
        assert_eq!(plan.phases.len(), 2);
        assert_eq!(plan.phases[0].duration_weeks, 10.0);
        assert_eq!(plan.phases[0].cost_estimate, 120000.5);
        assert_eq!(plan.phases[1].cost_estimate, 59999.5);
        assert_eq!(plan.roi_projection[1].year, 2);
        assert_eq!(plan.roi_projection[1].value, 14400.0);
        assert_eq!(plan.co2_savings[0].saving_tons, 12.4);
        assert_eq!(plan.funding[0].amount, "up to 150,000 EUR");
        assert_eq!(plan.total_cost, 180000.0);
        assert_eq!(plan.total_duration_weeks, 26.0);
    }

    #[test]
    fn serialization_round_trip_preserves_the_plan() {
        let plan = RenovationPlan::from_response_text(&sample_response().to_string()).unwrap();
        let encoded = serde_json::to_string(&plan).unwrap();
        let decoded = RenovationPlan::from_response_text(&encoded).unwrap();
        assert_eq!(decoded, plan);
    }

    #[test]
    fn serialized_field_names_match_the_wire_contract() {
        let plan = RenovationPlan::from_response_text(&sample_response().to_string()).unwrap();
        let value = serde_json::to_value(&plan).unwrap();
        for key in [
            "summary",
            "buildingStyle",
            "phases",
            "roiProjection",
            "co2Savings",
            "funding",
            "totalCost",
            "totalDuration",
        ] {
            assert!(value.get(key).is_some(), "missing wire field {key}");
        }
        assert!(value["phases"][0].get("durationWeeks").is_some());
        assert!(value["co2Savings"][0].get("savingTons").is_some());
    }

    #[test]
    fn empty_response_is_its_own_error_kind() {
        assert_eq!(
            RenovationPlan::from_response_text(""),
            Err(PlanGenerationError::EmptyResponse)
        );
        assert_eq!(
            RenovationPlan::from_response_text("   \n "),
            Err(PlanGenerationError::EmptyResponse)
        );
    }

    #[test]
    fn malformed_payload_never_yields_a_partial_plan() {
        let result = RenovationPlan::from_response_text("{\"summary\": \"only a summary\"}");
        assert!(matches!(
            result,
            Err(PlanGenerationError::MalformedPayload { .. })
        ));

        let result = RenovationPlan::from_response_text("The property looks lovely!");
        assert!(matches!(
            result,
            Err(PlanGenerationError::MalformedPayload { .. })
        ));
    }

    #[test]
    fn missing_required_field_is_malformed() {
        let mut incomplete = sample_response();
        incomplete.as_object_mut().unwrap().remove("totalCost");
        let result = RenovationPlan::from_response_text(&incomplete.to_string());
        assert!(matches!(
            result,
            Err(PlanGenerationError::MalformedPayload { .. })
        ));
    }

    #[test]
    fn fenced_json_is_tolerated() {
        let fenced = format!("```json\n{}\n```", sample_response());
        let plan = RenovationPlan::from_response_text(&fenced).unwrap();
        assert_eq!(plan.phases.len(), 2);

        let bare_fence = format!("```\n{}\n```", sample_response());
        assert!(RenovationPlan::from_response_text(&bare_fence).is_ok());
    }
}
