//! Lookup tables the prompt renderer draws from.

use std::collections::BTreeMap;

use crate::data::models::Intensity;

/// Immutable roast vocabulary, built once and handed to the generator.
#[derive(Debug, Clone, PartialEq)]
pub struct RoastTables {
    pub app_contexts: BTreeMap<String, String>,
    pub category_focus: BTreeMap<String, String>,
    pub intensity_instructions: BTreeMap<Intensity, String>,
    pub hinglish_phrases: Vec<String>,
    pub cultural_references: Vec<String>,
}

const APP_CONTEXTS: &[(&str, &str)] = &[
    ("Instagram", "their endless scrolling through perfectly curated lives and food photos"),
    ("TikTok", "their addiction to short-form videos and dance trends"),
    ("YouTube", "their rabbit hole of random videos and procrastination"),
    ("Twitter", "their obsession with hot takes and social media drama"),
    ("Reddit", "their deep dives into random communities and endless comment threads"),
    ("Facebook", "their endless scrolling through family drama and old friends' updates"),
    ("Snapchat", "their obsession with streaks and disappearing messages"),
    ("WhatsApp", "their endless group chat notifications and forwarded messages"),
    ("LinkedIn", "their professional networking that turned into mindless scrolling"),
];

const CATEGORY_FOCUS: &[(&str, &str)] = &[
    ("health", "how this screen time is affecting their physical and mental well-being"),
    ("career", "how this is impacting their productivity and professional goals"),
    ("social_life", "how this is affecting their real-world relationships and social skills"),
    ("finance", "the opportunity cost and how they could be making money instead"),
    ("laziness", "their procrastination habits and avoidance of responsibilities"),
    ("productivity", "how this is killing their focus and getting things done"),
    ("relationships", "how this is affecting their personal relationships"),
    ("fitness", "how this sedentary behavior is impacting their physical fitness"),
    ("sleep", "how late-night scrolling is ruining their sleep schedule"),
];

const INTENSITY_INSTRUCTIONS: &[(Intensity, &str)] = &[
    (
        Intensity::Light,
        "Keep it playful and gentle, like a friendly tease between friends. Use humor that makes them smile rather than cringe.",
    ),
    (
        Intensity::Medium,
        "Make it witty and clever with a good balance of humor and reality check. Include some sass but keep it entertaining.",
    ),
    (
        Intensity::Brutal,
        "Go all out with savage humor! Be ruthlessly funny and don't hold back. Make it hilariously harsh but still entertaining.",
    ),
];

const HINGLISH_PHRASES: &[&str] = &[
    "Yaar", "Bhai", "Arre", "Kya baat hai", "Sach mein", "Bilkul", "Bas kar", "Chill maar",
    "Tension mat le", "Paisa vasool", "Time pass", "Bindaas", "Jugaad", "Funda", "Scene", "Vibe",
];

const CULTURAL_REFERENCES: &[&str] = &[
    "Sharma ji ka beta", "Ghar wale", "Padosi", "Relatives", "College friends",
    "Office colleagues", "Gym jaana", "Cooking skills", "Traffic", "Metro", "Rickshaw",
];

impl RoastTables {
    pub fn builtin() -> Self {
        Self {
            app_contexts: owned_pairs(APP_CONTEXTS),
            category_focus: owned_pairs(CATEGORY_FOCUS),
            intensity_instructions: INTENSITY_INSTRUCTIONS
                .iter()
                .map(|(intensity, text)| (*intensity, text.to_string()))
                .collect(),
            hinglish_phrases: HINGLISH_PHRASES.iter().map(|s| s.to_string()).collect(),
            cultural_references: CULTURAL_REFERENCES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn app_context(&self, app: &str) -> Option<&str> {
        self.app_contexts.get(app).map(String::as_str)
    }

    /// The table's own spelling of `app` with its context, ignoring case
    /// and surrounding whitespace.
    pub fn find_app(&self, app: &str) -> Option<(&str, &str)> {
        let wanted = app.trim();
        self.app_contexts
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
            .map(|(name, context)| (name.as_str(), context.as_str()))
    }

    pub fn focus(&self, category: &str) -> Option<&str> {
        self.category_focus.get(category).map(String::as_str)
    }

    pub fn instruction(&self, intensity: Intensity) -> Option<&str> {
        self.intensity_instructions.get(&intensity).map(String::as_str)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.category_focus.keys().map(String::as_str)
    }
}

impl Default for RoastTables {
    fn default() -> Self {
        Self::builtin()
    }
}

fn owned_pairs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::KNOWN_APPS;

    #[test]
    fn every_known_app_has_a_context() {
        let tables = RoastTables::builtin();
        for app in KNOWN_APPS {
            assert!(tables.app_context(app).is_some(), "missing context for {app}");
        }
        assert_eq!(tables.app_contexts.len(), KNOWN_APPS.len());
    }

    #[test]
    fn every_intensity_has_an_instruction() {
        let tables = RoastTables::builtin();
        for intensity in Intensity::ALL {
            assert!(tables.instruction(intensity).is_some());
        }
        assert_eq!(tables.categories().count(), 9);
    }
}
