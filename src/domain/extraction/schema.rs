//! JSON schema sent to the model as the strict structured-output contract.

use serde_json::{json, Value};

/// Name under which the schema is registered with the model API.
pub const EXTRACTION_SCHEMA_NAME: &str = "lead_extraction";

/// Returns the extraction schema.
///
/// Every property is listed in `required`; absent information must be sent
/// as `null` (or an empty array for `preferences`).
pub fn extraction_schema() -> Value {
    let nullable_string = json!({ "type": ["string", "null"] });

    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["userInfo", "shouldUpdateLead", "leadScore"],
        "properties": {
            "userInfo": {
                "type": "object",
                "additionalProperties": false,
                "required": [
                    "name", "phone", "email", "location", "company", "intent",
                    "urgency", "budget", "preferences", "followUpNeeded", "confidence"
                ],
                "properties": {
                    "name": nullable_string,
                    "phone": nullable_string,
                    "email": nullable_string,
                    "location": nullable_string,
                    "company": nullable_string,
                    "intent": {
                        "type": ["string", "null"],
                        "enum": ["inquiry", "booking", "order", "support", null]
                    },
                    "urgency": {
                        "type": ["string", "null"],
                        "enum": ["low", "medium", "high", null]
                    },
                    "budget": nullable_string,
                    "preferences": { "type": "array", "items": { "type": "string" } },
                    "followUpNeeded": { "type": "boolean" },
                    "confidence": { "type": "number" }
                }
            },
            "shouldUpdateLead": { "type": "boolean" },
            "leadScore": { "type": "number" }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required(value: &Value) -> Vec<&str> {
        value["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect()
    }

    #[test]
    fn every_property_is_required() {
        let schema = extraction_schema();
        for object in [&schema, &schema["properties"]["userInfo"]] {
            let mut props: Vec<&str> = object["properties"]
                .as_object()
                .unwrap()
                .keys()
                .map(String::as_str)
                .collect();
            let mut req = required(object);
            props.sort_unstable();
            req.sort_unstable();
            assert_eq!(props, req);
            assert_eq!(object["additionalProperties"], Value::Bool(false));
        }
    }

    #[test]
    fn intent_enum_matches_domain() {
        let schema = extraction_schema();
        let intents = &schema["properties"]["userInfo"]["properties"]["intent"]["enum"];
        assert_eq!(intents.as_array().unwrap().len(), 5);
    }
}
