use thiserror::Error;

/// Why a configured rule was discarded at compile time.
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("group rule #{index} has no name")]
    MissingName { index: usize },

    #[error("group rule '{name}' has no include patterns")]
    NoPatterns { name: String },

    #[error("rule '{name}': invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        name: String,
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },

    #[error("rule '{name}': unsupported regex flag '{flag}'")]
    UnsupportedFlag { name: String, flag: char },
}
