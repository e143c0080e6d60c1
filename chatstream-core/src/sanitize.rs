//! Content sanitizer for a single message.

use serde_json::Value;

use crate::model::{ContentPart, MessageContent};

/// Validates a message's `content` value.
///
/// Strings pass through untouched, even when empty; whether an empty string is
/// acceptable is the caller's decision. Arrays are filtered part by part and
/// yield `None` when nothing usable remains. Any other JSON type is rejected.
pub fn sanitize_content(content: &Value) -> Option<MessageContent> {
    match content {
        Value::String(s) => Some(MessageContent::Text(s.clone())),
        Value::Array(parts) => {
            let cleaned: Vec<ContentPart> = parts.iter().filter_map(sanitize_part).collect();
            if cleaned.is_empty() {
                None
            } else {
                Some(MessageContent::Parts(cleaned))
            }
        }
        _ => None,
    }
}

fn sanitize_part(part: &Value) -> Option<ContentPart> {
    let obj = part.as_object()?;
    match obj.get("type")?.as_str()? {
        "text" => {
            let text = obj.get("text")?.as_str()?;
            (!text.is_empty()).then(|| ContentPart::text(text))
        }
        "image_url" => {
            let url = obj.get("image_url")?.get("url")?.as_str()?;
            // blank check only; the original url is forwarded as-is
            (!url.trim().is_empty()).then(|| ContentPart::image_url(url))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strings_pass_through_unchanged() {
        assert_eq!(sanitize_content(&json!("hi")), Some(MessageContent::Text("hi".into())));
        assert_eq!(sanitize_content(&json!("")), Some(MessageContent::Text(String::new())));
        assert_eq!(sanitize_content(&json!("  ")), Some(MessageContent::Text("  ".into())));
    }

    #[test]
    fn non_string_non_array_is_rejected() {
        assert_eq!(sanitize_content(&Value::Null), None);
        assert_eq!(sanitize_content(&json!(42)), None);
        assert_eq!(sanitize_content(&json!({"type": "text", "text": "hi"})), None);
    }

    #[test]
    fn drops_empty_text_and_blank_urls() {
        let content = json!([
            {"type": "text", "text": ""},
            {"type": "image_url", "image_url": {"url": " "}},
            {"type": "text", "text": "hi"}
        ]);
        assert_eq!(
            sanitize_content(&content),
            Some(MessageContent::Parts(vec![ContentPart::text("hi")]))
        );
    }

    #[test]
    fn keeps_untrimmed_image_url() {
        let content = json!([{"type": "image_url", "image_url": {"url": "  data:image/png;base64,AAA "}}]);
        assert_eq!(
            sanitize_content(&content),
            Some(MessageContent::Parts(vec![ContentPart::image_url(
                "  data:image/png;base64,AAA "
            )]))
        );
    }

    #[test]
    fn skips_unrecognized_shapes_in_order() {
        let content = json!([
            "bare string",
            null,
            {"text": "no type"},
            {"type": "audio", "data": "..."},
            {"type": "text", "text": 7},
            {"type": "image_url", "image_url": "https://flat/url"},
            {"type": "image_url", "image_url": {"url": 1}},
            {"type": "text", "text": "a"},
            {"type": "image_url", "image_url": {"url": "https://x/y.png"}},
            {"type": "text", "text": "b"}
        ]);
        assert_eq!(
            sanitize_content(&content),
            Some(MessageContent::Parts(vec![
                ContentPart::text("a"),
                ContentPart::image_url("https://x/y.png"),
                ContentPart::text("b"),
            ]))
        );
    }

    #[test]
    fn all_filtered_is_absent_not_empty_list() {
        assert_eq!(sanitize_content(&json!([])), None);
        assert_eq!(sanitize_content(&json!([{"type": "text", "text": ""}])), None);
    }
}
