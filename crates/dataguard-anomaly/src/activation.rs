// Activation gate - decides whether a user request asks for a data quality check

// phrases that turn on outlier analysis (matched case-insensitively as substrings)
const ACTIVATION_PHRASES: &[&str] = &[
    "quality check",
    "anomalies",
    "anomaly",
    "outliers",
    "outlier",
    "unusual values",
    "unusual value",
    "data issues",
    "data issue",
    "data quality",
    "bad data",
    "incorrect data",
    "suspicious values",
    "suspicious value",
    "extreme values",
    "extreme value",
];

/// True when the utterance mentions any activation phrase.
pub fn should_activate(utterance: &str) -> bool {
    let lower = utterance.to_lowercase();
    let hit = ACTIVATION_PHRASES.iter().find(|phrase| lower.contains(*phrase));
    if let Some(phrase) = hit {
        tracing::debug!(phrase, "anomaly analysis activated");
    }
    hit.is_some()
}
