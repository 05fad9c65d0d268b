use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use url::Url;

use super::{
    cache::FeatureCache,
    lexicon,
    text::{self, tokens},
    FeatureConfig, FeatureExtractionError, FeatureExtractor,
};
use crate::domain::{FeatureVector, NormalizedRecord, PostKind};

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "png", "gif", "webp"];
const KNOWN_IMAGE_HOSTS: [&str; 2] = ["twimg.com", "twitter.com"];

pub struct TweetFeatureExtractor {
    config: FeatureConfig,
    names: Vec<String>,
    cache: Option<FeatureCache>,
}

impl TweetFeatureExtractor {
    pub fn new(config: FeatureConfig) -> Result<Self, FeatureExtractionError> {
        if config.batch_size == 0 {
            return Err(FeatureExtractionError::InvalidConfig(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if config.use_embeddings && config.text_embedding_dim == 0 && config.image_embedding_dim == 0
        {
            return Err(FeatureExtractionError::InvalidConfig(
                "embeddings are enabled but both embedding dimensions are zero".to_string(),
            ));
        }
        if !config.device.eq_ignore_ascii_case("cpu") {
            tracing::warn!(
                target: "features",
                device = %config.device,
                "accelerator not available for built-in extractor, running on cpu"
            );
        }

        let cache = config
            .use_cache
            .then(|| FeatureCache::new(config.cache_capacity));
        let mut extractor = Self {
            config,
            names: Vec::new(),
            cache,
        };
        extractor.names = extractor.compute(&empty_record()).names().map(str::to_string).collect();

        tracing::info!(
            target: "features",
            features = extractor.names.len(),
            structural = extractor.config.use_structural,
            text = extractor.config.use_text,
            image = extractor.config.use_image,
            emotional = extractor.config.use_emotional,
            embeddings = extractor.config.use_embeddings,
            batch_size = extractor.config.batch_size,
            cache = extractor.cache.is_some(),
            "feature extractor initialized"
        );
        Ok(extractor)
    }

    pub fn cache(&self) -> Option<&FeatureCache> {
        self.cache.as_ref()
    }

    fn check_size(&self, record: &NormalizedRecord) -> Result<(), FeatureExtractionError> {
        let limit = self.config.max_text_chars;
        for (field, value) in [("text", &record.text), ("quoted_text", &record.quoted_text)] {
            let chars = value.as_deref().map_or(0, |v| v.chars().count());
            if chars > limit {
                return Err(FeatureExtractionError::InputTooLarge {
                    field,
                    chars,
                    limit,
                });
            }
        }
        Ok(())
    }

    fn compute(&self, record: &NormalizedRecord) -> FeatureVector {
        let mut out = FeatureVector::with_capacity(self.names.len());
        if self.config.use_structural {
            structural(record, &mut out);
        }
        if self.config.use_text {
            text_group(record.text.as_deref().unwrap_or(""), &mut out);
        }
        if self.config.use_image {
            image(record.image_url.as_deref(), &mut out);
        }
        if self.config.use_emotional {
            emotional(record, &mut out);
        }
        if self.config.use_embeddings {
            let mut words = tokens(record.text.as_deref().unwrap_or(""));
            words.extend(tokens(record.quoted_text.as_deref().unwrap_or("")));
            hashed_embedding("text_emb", &words, self.config.text_embedding_dim, &mut out);
            let image_tokens = record
                .image_url
                .as_deref()
                .map(image_url_tokens)
                .unwrap_or_default();
            hashed_embedding(
                "image_emb",
                &image_tokens,
                self.config.image_embedding_dim,
                &mut out,
            );
        }
        out
    }

    fn from_values(&self, values: Vec<f64>) -> FeatureVector {
        let mut out = FeatureVector::with_capacity(values.len());
        for (name, value) in self.names.iter().zip(values) {
            out.push(name.clone(), value);
        }
        out
    }
}

impl FeatureExtractor for TweetFeatureExtractor {
    fn feature_names(&self) -> &[String] {
        &self.names
    }

    fn extract(&self, record: &NormalizedRecord) -> Result<FeatureVector, FeatureExtractionError> {
        self.check_size(record)?;

        if let Some(cache) = &self.cache {
            if let Some(values) = cache.get(record) {
                tracing::debug!(target: "features", tweet_id = %record.post_id(), "feature cache hit");
                return Ok(self.from_values(values));
            }
        }

        let features = self.compute(record);
        if let Some((name, _)) = features
            .names()
            .zip(features.values())
            .find(|(_, value)| !value.is_finite())
        {
            return Err(FeatureExtractionError::NonFinite {
                feature: name.to_string(),
            });
        }
        debug_assert!(features.names().eq(self.names.iter().map(String::as_str)));

        if let Some(cache) = &self.cache {
            cache.insert(record, features.values());
        }
        tracing::debug!(
            target: "features",
            tweet_id = %record.post_id(),
            features = self.names.len(),
            "features extracted"
        );
        Ok(features)
    }
}

fn empty_record() -> NormalizedRecord {
    NormalizedRecord {
        id: None,
        created_at: None,
        text: None,
        tweet_type: PostKind::default(),
        image_url: None,
        quoted_text: None,
    }
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn structural(record: &NormalizedRecord, out: &mut FeatureVector) {
    out.push("has_text", flag(record.text.is_some()));
    out.push("has_quoted_text", flag(record.quoted_text.is_some()));
    out.push("has_image", flag(record.image_url.is_some()));
    out.push(
        "quoted_char_count",
        record.quoted_text.as_deref().map_or(0, |q| q.chars().count()) as f64,
    );
    for kind in PostKind::ALL {
        out.push(
            format!("kind_{}", kind.as_str().to_lowercase()),
            flag(record.tweet_type == kind),
        );
    }

    let (hour, weekday) = match record.created_at.as_deref().and_then(parse_timestamp) {
        Some((hour, weekday)) => (hour.map_or(-1.0, f64::from), f64::from(weekday)),
        None => (-1.0, -1.0),
    };
    out.push("created_hour", hour);
    out.push("created_weekday", weekday);
}

/// Returns the hour (when the value carries a time) and the weekday, Monday = 0.
fn parse_timestamp(raw: &str) -> Option<(Option<u32>, u32)> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some((Some(ts.hour()), ts.weekday().num_days_from_monday()));
    }
    for format in [
        "%Y-%m-%d %H:%M:%S%.f %:z",
        "%Y-%m-%d %H:%M:%S%.f %z",
        "%a %b %d %H:%M:%S %z %Y",
    ] {
        if let Ok(ts) = DateTime::parse_from_str(raw, format) {
            return Some((Some(ts.hour()), ts.weekday().num_days_from_monday()));
        }
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some((Some(ts.hour()), ts.weekday().num_days_from_monday()));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| (None, date.weekday().num_days_from_monday()))
}

fn text_group(body: &str, out: &mut FeatureVector) {
    let stats = text::text_stats(body);
    out.push("text_char_count", stats.chars as f64);
    out.push("text_word_count", stats.words as f64);
    out.push("text_avg_word_length", stats.avg_word_len);
    out.push("text_uppercase_ratio", stats.uppercase_ratio);
    out.push("text_exclamation_count", stats.exclamations as f64);
    out.push("text_question_count", stats.questions as f64);
    out.push("text_hashtag_count", stats.hashtags as f64);
    out.push("text_mention_count", stats.mentions as f64);
    out.push("text_url_count", stats.urls as f64);
    out.push("text_emoji_count", stats.emoji as f64);
}

fn image(raw: Option<&str>, out: &mut FeatureVector) {
    let parsed = raw.and_then(|r| Url::parse(r).ok());
    let extension = parsed
        .as_ref()
        .and_then(|u| u.path().rsplit('.').next().map(str::to_ascii_lowercase))
        .map(|ext| if ext == "jpeg" { "jpg".to_string() } else { ext });
    let host = parsed.as_ref().and_then(|u| u.host_str().map(str::to_ascii_lowercase));

    out.push("image_present", flag(raw.is_some()));
    out.push("image_valid_url", flag(parsed.is_some()));
    out.push("image_url_length", raw.map_or(0, str::len) as f64);
    for ext in IMAGE_EXTENSIONS {
        out.push(format!("image_ext_{ext}"), flag(extension.as_deref() == Some(ext)));
    }
    let known_host = host.as_deref().is_some_and(|h| {
        KNOWN_IMAGE_HOSTS
            .iter()
            .any(|known| h == *known || h.ends_with(&format!(".{known}")))
    });
    out.push("image_known_host", flag(known_host));
}

fn emotional(record: &NormalizedRecord, out: &mut FeatureVector) {
    let mut words = tokens(record.text.as_deref().unwrap_or(""));
    words.extend(tokens(record.quoted_text.as_deref().unwrap_or("")));
    let scores = lexicon::score(&words);
    out.push("emotion_positive", scores.positive);
    out.push("emotion_negative", scores.negative);
    out.push("emotion_anger", scores.anger);
    out.push("emotion_joy", scores.joy);
    out.push("emotion_fear", scores.fear);
    out.push("emotion_polarity", scores.polarity);
}

fn image_url_tokens(raw: &str) -> Vec<String> {
    match Url::parse(raw) {
        Ok(url) => {
            let mut parts: Vec<String> = url
                .host_str()
                .map(|h| vec![h.to_ascii_lowercase()])
                .unwrap_or_default();
            if let Some(segments) = url.path_segments() {
                parts.extend(
                    segments
                        .flat_map(|s| s.split('.'))
                        .filter(|s| !s.is_empty())
                        .map(str::to_ascii_lowercase),
                );
            }
            parts
        }
        Err(_) => tokens(raw),
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Signed feature hashing into `dim` buckets, L2-normalised.
fn hashed_embedding(prefix: &str, words: &[String], dim: usize, out: &mut FeatureVector) {
    let mut buckets = vec![0.0_f64; dim];
    if dim > 0 {
        for word in words {
            let hash = fnv1a(word.as_bytes());
            let index = (hash % dim as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            buckets[index] += sign;
        }
        let norm = buckets.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            buckets.iter_mut().for_each(|v| *v /= norm);
        }
    }
    for (i, value) in buckets.into_iter().enumerate() {
        out.push(format!("{prefix}_{i}"), value);
    }
}
