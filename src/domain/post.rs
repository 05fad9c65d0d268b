use std::fmt;

use serde::{Deserialize, Serialize};

/// How a post relates to other content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PostKind {
    #[default]
    Single,
    Reply,
    Quote,
    Retweet,
}

impl PostKind {
    pub const ALL: [PostKind; 4] = [
        PostKind::Single,
        PostKind::Reply,
        PostKind::Quote,
        PostKind::Retweet,
    ];

    /// Case-insensitive lookup. `ORIGINAL` and `REPOST` are accepted as
    /// aliases of `SINGLE` and `RETWEET`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "SINGLE" | "ORIGINAL" => Some(Self::Single),
            "REPLY" => Some(Self::Reply),
            "QUOTE" => Some(Self::Quote),
            "RETWEET" | "REPOST" => Some(Self::Retweet),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "SINGLE",
            Self::Reply => "REPLY",
            Self::Quote => "QUOTE",
            Self::Retweet => "RETWEET",
        }
    }
}

impl fmt::Display for PostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Post metadata as received over the wire. Every field is optional at the
/// type level; which ones are required is decided by transport validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub tweet_type: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub quoted_text: Option<String>,
}

impl PostRecord {
    /// True when at least one of text, quoted text or image reference carries a value.
    pub fn has_content(&self) -> bool {
        [&self.text, &self.quoted_text, &self.image_url]
            .into_iter()
            .any(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

/// A [`PostRecord`] after preprocessing: absent values are explicit `null`s
/// and the post kind is always a member of [`PostKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub id: Option<String>,
    pub created_at: Option<String>,
    pub text: Option<String>,
    pub tweet_type: PostKind,
    pub image_url: Option<String>,
    pub quoted_text: Option<String>,
}

impl NormalizedRecord {
    pub fn post_id(&self) -> &str {
        self.id.as_deref().unwrap_or("unknown")
    }
}

impl From<NormalizedRecord> for PostRecord {
    fn from(record: NormalizedRecord) -> Self {
        Self {
            id: record.id,
            created_at: record.created_at,
            text: record.text,
            tweet_type: Some(record.tweet_type.as_str().to_string()),
            image_url: record.image_url,
            quoted_text: record.quoted_text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive_and_accepts_aliases() {
        assert_eq!(PostKind::parse("quote"), Some(PostKind::Quote));
        assert_eq!(PostKind::parse(" Reply "), Some(PostKind::Reply));
        assert_eq!(PostKind::parse("original"), Some(PostKind::Single));
        assert_eq!(PostKind::parse("REPOST"), Some(PostKind::Retweet));
        assert_eq!(PostKind::parse("BOGUS"), None);
    }

    #[test]
    fn normalized_record_serializes_absent_fields_as_null() {
        let record = NormalizedRecord {
            id: Some("T1".into()),
            created_at: None,
            text: None,
            tweet_type: PostKind::Quote,
            image_url: None,
            quoted_text: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["tweet_type"], "QUOTE");
        assert!(value.as_object().unwrap().contains_key("image_url"));
        assert!(value["image_url"].is_null());
    }

    #[test]
    fn blank_fields_do_not_count_as_content() {
        let record = PostRecord {
            id: Some("T1".into()),
            text: Some("   ".into()),
            ..Default::default()
        };
        assert!(!record.has_content());
        let record = PostRecord {
            image_url: Some("https://example.com/a.jpg".into()),
            ..record
        };
        assert!(record.has_content());
    }
}
