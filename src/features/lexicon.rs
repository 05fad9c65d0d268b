use std::collections::HashMap;

use once_cell::sync::Lazy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Positive,
    Negative,
    Anger,
    Joy,
    Fear,
}

const POSITIVE: &[&str] = &[
    "good", "great", "love", "amazing", "awesome", "best", "happy", "excellent", "win",
    "wonderful", "nice", "thanks", "thank", "beautiful", "fantastic", "bullish", "excited",
    "congrats", "perfect", "cool",
];
const NEGATIVE: &[&str] = &[
    "bad", "worst", "hate", "terrible", "awful", "sad", "lose", "loss", "poor", "ugly",
    "scam", "fail", "failed", "broken", "wrong", "bearish", "crash", "dump", "rug", "never",
];
const ANGER: &[&str] = &[
    "angry", "furious", "rage", "hate", "mad", "annoyed", "outraged", "disgusting", "idiot",
    "stupid",
];
const JOY: &[&str] = &[
    "joy", "happy", "lol", "fun", "glad", "delighted", "celebrate", "yay", "smile", "laugh",
];
const FEAR: &[&str] = &[
    "afraid", "scared", "fear", "panic", "worried", "anxious", "terrified", "risk", "danger",
    "warning",
];

static LEXICON: Lazy<HashMap<&'static str, Vec<Emotion>>> = Lazy::new(|| {
    let mut map: HashMap<&'static str, Vec<Emotion>> = HashMap::new();
    for (words, emotion) in [
        (POSITIVE, Emotion::Positive),
        (NEGATIVE, Emotion::Negative),
        (ANGER, Emotion::Anger),
        (JOY, Emotion::Joy),
        (FEAR, Emotion::Fear),
    ] {
        for word in words {
            map.entry(*word).or_default().push(emotion);
        }
    }
    map
});

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EmotionScores {
    pub positive: f64,
    pub negative: f64,
    pub anger: f64,
    pub joy: f64,
    pub fear: f64,
    /// (positive - negative) / (positive + negative) over raw hits, 0 when neither occurs.
    pub polarity: f64,
}

/// Scores are the share of tokens carrying each emotion.
pub fn score(tokens: &[String]) -> EmotionScores {
    let mut counts: HashMap<Emotion, usize> = HashMap::new();
    for token in tokens {
        if let Some(emotions) = LEXICON.get(token.as_str()) {
            for emotion in emotions {
                *counts.entry(*emotion).or_default() += 1;
            }
        }
    }

    let count = |emotion: Emotion| counts.get(&emotion).copied().unwrap_or(0);
    let share = |emotion: Emotion| super::text::ratio(count(emotion), tokens.len());
    let (pos, neg) = (count(Emotion::Positive), count(Emotion::Negative));
    let polarity = if pos + neg == 0 {
        0.0
    } else {
        (pos as f64 - neg as f64) / (pos + neg) as f64
    };

    EmotionScores {
        positive: share(Emotion::Positive),
        negative: share(Emotion::Negative),
        anger: share(Emotion::Anger),
        joy: share(Emotion::Joy),
        fear: share(Emotion::Fear),
        polarity,
    }
}
