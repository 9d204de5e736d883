use async_trait::async_trait;
use rand::prelude::IndexedRandom;

/// Result type for content lookups
pub type ContentResult<T> = Result<T, ContentError>;

/// Errors that can occur during content lookups
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("No content available for category {category} in language {language}")]
    Exhausted { category: String, language: String },
}

/// What kind of fallback string is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCategory {
    /// A creative prompt, used when the player-submitted pool is exhausted.
    Prompt,
    /// A secret extra instruction for the twist holder.
    Twist,
    /// A placeholder artifact for a subject who never delivered one.
    Placeholder,
}

impl ContentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCategory::Prompt => "prompt",
            ContentCategory::Twist => "twist",
            ContentCategory::Placeholder => "placeholder",
        }
    }
}

/// Asynchronous lookup of random fallback prompts, twists and placeholders
/// by category and language.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    async fn random(&self, category: ContentCategory, language: &str) -> ContentResult<String>;

    fn name(&self) -> &str;
}

const PROMPTS_EN: &[&str] = &[
    "a hedgehog opening a jam jar",
    "the last day of summer",
    "a lighthouse keeper's lunch break",
    "two umbrellas falling in love",
    "a robot learning to whistle",
    "the world's smallest parade",
    "breakfast on the moon",
    "a cat running a post office",
    "the museum of lost socks",
    "a dragon at a job interview",
];

const PROMPTS_DE: &[&str] = &[
    "ein Igel öffnet ein Marmeladenglas",
    "der letzte Sommertag",
    "Mittagspause eines Leuchtturmwärters",
    "zwei verliebte Regenschirme",
    "ein Roboter lernt pfeifen",
    "die kleinste Parade der Welt",
    "Frühstück auf dem Mond",
    "eine Katze leitet ein Postamt",
    "das Museum der verlorenen Socken",
    "ein Drache beim Vorstellungsgespräch",
];

const TWISTS_EN: &[&str] = &[
    "everything must be upside down",
    "include at least three eyes",
    "use only straight lines",
    "hide a banana somewhere",
    "make it look delicious",
    "it is secretly raining",
];

const TWISTS_DE: &[&str] = &[
    "alles muss auf dem Kopf stehen",
    "mindestens drei Augen einbauen",
    "nur gerade Linien verwenden",
    "irgendwo eine Banane verstecken",
    "es muss lecker aussehen",
    "es regnet heimlich",
];

const PLACEHOLDERS_EN: &[&str] = &[
    "[the subject left before capturing anything]",
    "[a suspiciously empty frame]",
    "[artifact lost in transit]",
];

const PLACEHOLDERS_DE: &[&str] = &[
    "[das Motiv ist vor der Aufnahme verschwunden]",
    "[ein verdächtig leerer Rahmen]",
    "[Artefakt unterwegs verloren]",
];

/// Built-in provider backed by static word lists. Keeps rounds playable
/// without any external service.
pub struct BuiltinContent;

impl BuiltinContent {
    fn pool(category: ContentCategory, language: &str) -> &'static [&'static str] {
        match (category, language) {
            (ContentCategory::Prompt, "de") => PROMPTS_DE,
            (ContentCategory::Prompt, _) => PROMPTS_EN,
            (ContentCategory::Twist, "de") => TWISTS_DE,
            (ContentCategory::Twist, _) => TWISTS_EN,
            (ContentCategory::Placeholder, "de") => PLACEHOLDERS_DE,
            (ContentCategory::Placeholder, _) => PLACEHOLDERS_EN,
        }
    }
}

#[async_trait]
impl ContentProvider for BuiltinContent {
    async fn random(&self, category: ContentCategory, language: &str) -> ContentResult<String> {
        let pool = Self::pool(category, language);
        let mut rng = rand::rng();
        pool.choose(&mut rng)
            .map(|s| s.to_string())
            .ok_or_else(|| ContentError::Exhausted {
                category: category.as_str().to_string(),
                language: language.to_string(),
            })
    }

    fn name(&self) -> &str {
        "builtin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builtin_serves_every_category() {
        let provider = BuiltinContent;
        for category in [
            ContentCategory::Prompt,
            ContentCategory::Twist,
            ContentCategory::Placeholder,
        ] {
            let text = provider.random(category, "en").await.unwrap();
            assert!(!text.is_empty());
        }
    }

    #[tokio::test]
    async fn test_builtin_language_fallback() {
        let provider = BuiltinContent;
        // Unknown language falls back to the English pool.
        let text = provider.random(ContentCategory::Prompt, "fr").await.unwrap();
        assert!(PROMPTS_EN.contains(&text.as_str()));
    }
}
