use thiserror::Error;

use crate::{
    config::ValidationMode,
    domain::{PostKind, PostRecord},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("unknown tweet_type {0:?}; expected one of SINGLE, REPLY, QUOTE, RETWEET")]
    UnknownPostKind(String),
    #[error("post has no content: one of text, quoted_text or image_url is required")]
    NoContent,
}

/// Transport-level checks on an incoming post. Anything rejected here never
/// reaches the prediction pipeline.
///
/// Both modes require an id and some content. Only strict mode checks
/// `tweet_type`; lenient mode lets preprocessing default it to SINGLE.
pub fn validate(record: &PostRecord, mode: ValidationMode) -> Result<(), ValidationError> {
    if is_blank(&record.id) {
        return Err(ValidationError::MissingField("id"));
    }

    if mode == ValidationMode::Strict {
        match record.tweet_type.as_deref().filter(|v| !v.trim().is_empty()) {
            None => return Err(ValidationError::MissingField("tweet_type")),
            Some(raw) if PostKind::parse(raw).is_none() => {
                return Err(ValidationError::UnknownPostKind(raw.to_string()))
            }
            Some(_) => {}
        }
    }

    if !record.has_content() {
        return Err(ValidationError::NoContent);
    }
    Ok(())
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post() -> PostRecord {
        PostRecord {
            id: Some("T1".into()),
            created_at: Some("2025-01-01".into()),
            text: Some("hello".into()),
            tweet_type: Some("single".into()),
            image_url: None,
            quoted_text: None,
        }
    }

    #[test]
    fn complete_post_passes_both_modes() {
        assert_eq!(validate(&post(), ValidationMode::Strict), Ok(()));
        assert_eq!(validate(&post(), ValidationMode::Lenient), Ok(()));
    }

    #[test]
    fn blank_id_is_rejected_in_both_modes() {
        let record = PostRecord {
            id: Some("  ".into()),
            ..post()
        };
        for mode in [ValidationMode::Strict, ValidationMode::Lenient] {
            assert_eq!(
                validate(&record, mode),
                Err(ValidationError::MissingField("id"))
            );
        }
    }

    #[test]
    fn strict_mode_requires_a_known_kind() {
        let missing = PostRecord {
            tweet_type: None,
            ..post()
        };
        assert_eq!(
            validate(&missing, ValidationMode::Strict),
            Err(ValidationError::MissingField("tweet_type"))
        );

        let bogus = PostRecord {
            tweet_type: Some("BOGUS".into()),
            ..post()
        };
        assert_eq!(
            validate(&bogus, ValidationMode::Strict),
            Err(ValidationError::UnknownPostKind("BOGUS".into()))
        );
        assert_eq!(validate(&bogus, ValidationMode::Lenient), Ok(()));
    }

    #[test]
    fn both_modes_require_some_content() {
        let empty = PostRecord {
            text: None,
            ..post()
        };
        for mode in [ValidationMode::Strict, ValidationMode::Lenient] {
            assert_eq!(validate(&empty, mode), Err(ValidationError::NoContent));
        }

        let id_only = PostRecord {
            id: Some("T1".into()),
            created_at: None,
            text: None,
            tweet_type: None,
            image_url: None,
            quoted_text: None,
        };
        assert_eq!(
            validate(&id_only, ValidationMode::Lenient),
            Err(ValidationError::NoContent)
        );

        let image_only = PostRecord {
            image_url: Some("https://pbs.twimg.com/media/a.jpg".into()),
            ..empty
        };
        assert_eq!(validate(&image_only, ValidationMode::Strict), Ok(()));
    }
}
