use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

/// Trait for types that can be requested as Gemini structured output.
///
/// Automatically implemented for any type that implements `JsonSchema + DeserializeOwned`.
pub trait ResponseSchema: JsonSchema + DeserializeOwned {
    /// Generate a Gemini-compatible response schema for this type.
    ///
    /// Gemini's `responseSchema` accepts an OpenAPI-style subset of JSON
    /// Schema:
    /// 1. No `$ref` references — everything fully inlined
    /// 2. No `additionalProperties`, `$schema`, or `definitions` keys
    /// 3. Optional fields expressed as `nullable: true`, never `type: [T, "null"]`
    fn response_schema() -> serde_json::Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        inline_refs(&mut value);

        if let serde_json::Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
        }

        sanitize_schemas(&mut value);

        value
    }

    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> ResponseSchema for T {}

fn sanitize_schemas(value: &mut serde_json::Value) {
    if let serde_json::Value::Object(map) = value {
        // Only touch maps that are schema objects, not `properties` maps
        // whose keys are arbitrary field names.
        let is_schema = map
            .get("type")
            .map_or(false, |t| t.is_string() || t.is_array())
            || map.contains_key("enum");

        if is_schema {
            map.remove("additionalProperties");
            map.remove("title");
            map.remove("format");

            // schemars renders Option<T> as `"type": [T, "null"]`; Gemini
            // wants a single type plus `nullable: true`.
            if let Some(serde_json::Value::Array(types)) = map.get("type").cloned() {
                if types.iter().any(|t| t == "null") {
                    if let Some(concrete) = types.iter().find(|t| *t != "null") {
                        map.insert("type".to_string(), concrete.clone());
                        map.insert("nullable".to_string(), serde_json::Value::Bool(true));
                    }
                }
            }
        }

        for (_, v) in map.iter_mut() {
            sanitize_schemas(v);
        }
    } else if let serde_json::Value::Array(arr) = value {
        for item in arr.iter_mut() {
            sanitize_schemas(item);
        }
    }
}

fn inline_refs(value: &mut serde_json::Value) {
    let definitions = if let serde_json::Value::Object(map) = value {
        map.get("definitions").cloned()
    } else {
        None
    };

    if let Some(defs) = definitions {
        inline_refs_recursive(value, &defs);
    }
}

fn inline_refs_recursive(value: &mut serde_json::Value, definitions: &serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(ref_path)) = map.get("$ref").cloned() {
                if ref_path.starts_with("#/definitions/") {
                    let type_name = ref_path.trim_start_matches("#/definitions/");
                    if let Some(def) = definitions.get(type_name) {
                        *value = def.clone();
                        inline_refs_recursive(value, definitions);
                        return;
                    }
                }
            }

            if let Some(serde_json::Value::Array(all_of)) = map.get("allOf").cloned() {
                if all_of.len() == 1 {
                    *value = all_of.into_iter().next().unwrap();
                    inline_refs_recursive(value, definitions);
                    return;
                }
            }

            for (_, v) in map.iter_mut() {
                inline_refs_recursive(v, definitions);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                inline_refs_recursive(item, definitions);
            }
        }
        _ => {}
    }
}
