//! Serialized state payloads embedded into HTML.

use serde_json::Value;

/// Neutralize `<`, `>` and `&` inside JSON destined for a `<script>` body.
/// The replacements are JSON string escapes, so the payload stays valid JSON
/// while `</script>` and comment-open sequences can no longer appear.
pub fn escape_for_script(json: &str) -> String {
    let mut escaped = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => escaped.push_str("\\u003c"),
            '>' => escaped.push_str("\\u003e"),
            '&' => escaped.push_str("\\u0026"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Script tag exposing an entity snapshot to the client bundle, so the first
/// paint does not repeat the fetch the edge already did.
pub fn preloaded_state_script(value: &Value) -> String {
    format!(
        "<script>window.__PRELOADED_STATE__ = {};</script>",
        escape_for_script(&value.to_string())
    )
}

/// Organization structured-data block appended to the homepage head.
pub fn organization_jsonld(site_name: &str, public_base: &str, parent_org_url: &str) -> String {
    let document = serde_json::json!({
        "@context": "https://schema.org",
        "@type": "Organization",
        "name": site_name,
        "url": public_base,
        "parentOrganization": {
            "@type": "Organization",
            "url": parent_org_url,
        },
    });
    format!(
        "<script type=\"application/ld+json\">{}</script>",
        escape_for_script(&document.to_string())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_breaking_sequences_are_neutralized() {
        let value = serde_json::json!({"body": "</script><script>alert(1)</script>"});
        let script = preloaded_state_script(&value);
        assert!(!script[8..script.len() - 9].contains("</script>"));
        assert!(script.contains("\\u003c/script\\u003e"));
    }

    #[test]
    fn test_escaped_payload_is_still_valid_json() {
        let value = serde_json::json!({"t": "a <b> & c"});
        let escaped = escape_for_script(&value.to_string());
        let parsed: Value = serde_json::from_str(&escaped).unwrap();
        assert_eq!(parsed["t"], "a <b> & c");
    }

    #[test]
    fn test_preloaded_state_shape() {
        let value = serde_json::json!({"id": 7});
        assert_eq!(
            preloaded_state_script(&value),
            "<script>window.__PRELOADED_STATE__ = {\"id\":7};</script>"
        );
    }

    #[test]
    fn test_organization_jsonld_mentions_both_urls() {
        let script = organization_jsonld(
            "Example Markets",
            "https://www.example.com",
            "https://www.example-holdings.com",
        );
        assert!(script.contains("application/ld+json"));
        assert!(script.contains("https://www.example.com"));
        assert!(script.contains("https://www.example-holdings.com"));
        assert!(script.contains("\"@type\":\"Organization\""));
    }
}
