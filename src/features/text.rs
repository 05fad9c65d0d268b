use once_cell::sync::Lazy;
use regex::Regex;

static URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s]+").expect("valid url regex"));
static HASHTAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\w&])#(\w+)").expect("valid hashtag regex"));
static MENTION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\w@])@(\w{1,15})").expect("valid mention regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextStats {
    pub chars: usize,
    pub words: usize,
    pub avg_word_len: f64,
    pub uppercase_ratio: f64,
    pub exclamations: usize,
    pub questions: usize,
    pub hashtags: usize,
    pub mentions: usize,
    pub urls: usize,
    pub emoji: usize,
}

pub fn text_stats(text: &str) -> TextStats {
    let words: Vec<&str> = text.split_whitespace().collect();
    let word_chars: usize = words.iter().map(|w| w.chars().count()).sum();
    let letters = text.chars().filter(|c| c.is_alphabetic()).count();
    let uppercase = text.chars().filter(|c| c.is_uppercase()).count();

    TextStats {
        chars: text.chars().count(),
        words: words.len(),
        avg_word_len: ratio(word_chars, words.len()),
        uppercase_ratio: ratio(uppercase, letters),
        exclamations: text.matches('!').count(),
        questions: text.matches('?').count(),
        hashtags: HASHTAG_REGEX.find_iter(text).count(),
        mentions: MENTION_REGEX.find_iter(text).count(),
        urls: URL_REGEX.find_iter(text).count(),
        emoji: text.chars().filter(|c| is_emoji(*c)).count(),
    }
}

/// Lowercased alphanumeric tokens, with urls removed.
pub fn tokens(text: &str) -> Vec<String> {
    let stripped = URL_REGEX.replace_all(text, " ");
    stripped
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\'').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x1F300..=0x1FAFF | 0x2600..=0x27BF | 0x1F000..=0x1F2FF | 0xFE0F)
}

pub fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
