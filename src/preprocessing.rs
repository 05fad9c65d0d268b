use crate::domain::{NormalizedRecord, PostKind, PostRecord};

/// Turns raw post metadata into a record the feature extractor can consume.
///
/// Never fails: missing or malformed values are defaulted, not rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    pub fn preprocess(&self, record: &PostRecord) -> NormalizedRecord {
        let post_id = record.id.as_deref().unwrap_or("unknown");
        tracing::debug!(target: "preprocessing", tweet_id = %post_id, "preprocessing post");

        let id = present(&record.id);
        let text = present(&record.text);
        let raw_kind = present(&record.tweet_type);
        for (field, value) in [("id", &id), ("text", &text), ("tweet_type", &raw_kind)] {
            if value.is_none() {
                tracing::warn!(
                    target: "preprocessing",
                    tweet_id = %post_id,
                    field,
                    "post is missing field"
                );
            }
        }

        let tweet_type = match raw_kind.as_deref() {
            Some(raw) => PostKind::parse(raw).unwrap_or_else(|| {
                tracing::warn!(
                    target: "preprocessing",
                    tweet_id = %post_id,
                    tweet_type = %raw.to_uppercase(),
                    fallback = %PostKind::default(),
                    "unknown post kind, using fallback"
                );
                PostKind::default()
            }),
            None => PostKind::default(),
        };

        NormalizedRecord {
            id,
            created_at: present(&record.created_at),
            text,
            tweet_type,
            image_url: present(&record.image_url),
            quoted_text: present(&record.quoted_text),
        }
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tweet_type: Option<&str>) -> PostRecord {
        PostRecord {
            id: Some("T1".into()),
            created_at: Some("2025-01-01".into()),
            text: Some("hello".into()),
            tweet_type: tweet_type.map(str::to_string),
            image_url: None,
            quoted_text: None,
        }
    }

    #[test]
    fn lowercase_kind_is_uppercased() {
        let normalized = Preprocessor::new().preprocess(&record(Some("quote")));
        assert_eq!(normalized.tweet_type, PostKind::Quote);

        let normalized = Preprocessor::new().preprocess(&record(Some("single")));
        assert_eq!(normalized.tweet_type.as_str(), "SINGLE");
    }

    #[test]
    fn unknown_kind_falls_back_to_single() {
        let normalized = Preprocessor::new().preprocess(&record(Some("BOGUS")));
        assert_eq!(normalized.tweet_type, PostKind::Single);
    }

    #[test]
    fn missing_fields_become_explicit_absent_values() {
        let normalized = Preprocessor::new().preprocess(&PostRecord::default());
        assert_eq!(normalized.id, None);
        assert_eq!(normalized.text, None);
        assert_eq!(normalized.image_url, None);
        assert_eq!(normalized.quoted_text, None);
        assert_eq!(normalized.created_at, None);
        assert_eq!(normalized.tweet_type, PostKind::Single);
        assert_eq!(normalized.post_id(), "unknown");
    }

    #[test]
    fn preprocessing_is_idempotent() {
        let preprocessor = Preprocessor::new();
        let inputs = [
            record(Some("reply")),
            record(Some("BOGUS")),
            record(None),
            PostRecord::default(),
            PostRecord {
                text: Some("  ".into()),
                image_url: Some("https://pbs.twimg.com/media/x.jpg".into()),
                ..record(Some("repost"))
            },
        ];
        for input in inputs {
            let once = preprocessor.preprocess(&input);
            let twice = preprocessor.preprocess(&PostRecord::from(once.clone()));
            assert_eq!(once, twice);
        }
    }
}
