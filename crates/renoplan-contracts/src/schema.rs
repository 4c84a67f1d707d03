use serde_json::{json, Value};

/// The structured-output schema declared with every plan request. This is
/// the binding contract between the system and the generation service: the
/// field names here must match the `RenovationPlan` wire names exactly, or
/// the service output stops being parseable.
pub fn plan_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": { "type": "STRING" },
            "buildingStyle": { "type": "STRING" },
            "phases": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "durationWeeks": { "type": "NUMBER" },
                        "costEstimate": { "type": "NUMBER" },
                        "description": { "type": "STRING" }
                    },
                    "required": ["name", "durationWeeks", "costEstimate", "description"]
                }
            },
            "roiProjection": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "year": { "type": "NUMBER" },
                        "value": { "type": "NUMBER" }
                    },
                    "required": ["year", "value"]
                }
            },
            "co2Savings": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "category": { "type": "STRING" },
                        "savingTons": { "type": "NUMBER" },
                        "description": { "type": "STRING" }
                    },
                    "required": ["category", "savingTons", "description"]
                }
            },
            "funding": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "amount": { "type": "STRING" },
                        "description": { "type": "STRING" }
                    },
                    "required": ["name", "amount", "description"]
                }
            },
            "totalCost": { "type": "NUMBER" },
            "totalDuration": { "type": "NUMBER" }
        },
        "required": [
            "summary",
            "buildingStyle",
            "phases",
            "roiProjection",
            "co2Savings",
            "funding",
            "totalCost",
            "totalDuration"
        ]
    })
}
