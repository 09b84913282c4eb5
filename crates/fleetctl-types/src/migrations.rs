//! Transparent migrations applied on first observation of a legacy object
//! (spec.md 6: "A legacy field name (`providerConfig`) must be transparently
//! renamed to the current name (`providerSpec`)... historical provider
//! rename (`packet` -> `equinixmetal`) follows the same migration pattern").

use serde_json::Value;

/// Renames the legacy `providerConfig` key to `providerSpec` in a raw
/// Machine JSON document, in place. Idempotent: a document already using
/// `providerSpec` is left untouched.
pub fn migrate_provider_config_field(doc: &mut Value) {
    if let Some(obj) = doc.get_mut("spec").and_then(Value::as_object_mut) {
        if !obj.contains_key("providerSpec") {
            if let Some(legacy) = obj.remove("providerConfig") {
                obj.insert("providerSpec".to_string(), legacy);
            }
        }
    }
}

/// Renames the historical `packet` cloud-provider discriminator to its
/// current name `equinixmetal`, in place.
pub fn migrate_packet_provider_name(doc: &mut Value) {
    let Some(provider_spec) = doc
        .get_mut("spec")
        .and_then(|s| s.get_mut("providerSpec"))
        .and_then(Value::as_object_mut)
    else {
        return;
    };
    if provider_spec.get("cloudProvider").and_then(Value::as_str) == Some("packet") {
        provider_spec.insert(
            "cloudProvider".to_string(),
            Value::String("equinix-metal".to_string()),
        );
    }
}

/// Applies every known migration, in a fixed order, to a raw document read
/// from the store before it is deserialized into a typed object.
pub fn apply_all(doc: &mut Value) {
    migrate_provider_config_field(doc);
    migrate_packet_provider_name(doc);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_config_is_renamed_to_provider_spec() {
        let mut doc = json!({"spec": {"providerConfig": {"cloudProvider": "aws"}}});
        migrate_provider_config_field(&mut doc);
        assert!(doc["spec"].get("providerConfig").is_none());
        assert_eq!(doc["spec"]["providerSpec"]["cloudProvider"], "aws");
    }

    #[test]
    fn migration_is_idempotent_when_already_current() {
        let mut doc = json!({"spec": {"providerSpec": {"cloudProvider": "aws"}}});
        let before = doc.clone();
        migrate_provider_config_field(&mut doc);
        assert_eq!(doc, before);
    }

    #[test]
    fn packet_is_renamed_to_equinix_metal() {
        let mut doc = json!({"spec": {"providerSpec": {"cloudProvider": "packet"}}});
        migrate_packet_provider_name(&mut doc);
        assert_eq!(doc["spec"]["providerSpec"]["cloudProvider"], "equinix-metal");
    }
}
