use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::models::{DayOfWeek, Intensity, UsageCategory};
use crate::error::{Result, RoastError};
use crate::roast::tables::RoastTables;

/// How many Hinglish phrases and cultural references a prompt lists.
const PHRASES_IN_PROMPT: usize = 10;
const REFERENCES_IN_PROMPT: usize = 8;

/// Text sent to the generation API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoastPrompt(String);

impl RoastPrompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RoastPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Optional per-user detail appended to a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserContext {
    pub day_of_week: DayOfWeek,
    pub usage_category: Option<UsageCategory>,
}

impl UserContext {
    fn describe(&self) -> String {
        let mut parts = vec![format!("Day: {}", self.day_of_week)];
        if let Some(category) = self.usage_category {
            parts.push(format!("Usage Pattern: {category}"));
        }
        let day_type = if self.day_of_week.is_weekend() { "weekend" } else { "weekday" };
        parts.push(format!("Day Type: {day_type}"));
        parts.join(", ")
    }
}

/// Renders roast prompts from the lookup tables. Rendering is pure.
#[derive(Debug, Clone, Default)]
pub struct RoastGenerator {
    tables: RoastTables,
}

impl RoastGenerator {
    pub fn new(tables: RoastTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &RoastTables {
        &self.tables
    }

    pub fn render(
        &self,
        app_name: &str,
        predicted_minutes: u32,
        roast_category: &str,
        intensity: &str,
    ) -> Result<RoastPrompt> {
        self.build(app_name, predicted_minutes, roast_category, intensity, None)
    }

    /// Like [`render`](Self::render), with a line describing the day and
    /// usage pattern.
    pub fn render_with_context(
        &self,
        app_name: &str,
        predicted_minutes: u32,
        roast_category: &str,
        intensity: &str,
        context: UserContext,
    ) -> Result<RoastPrompt> {
        self.build(app_name, predicted_minutes, roast_category, intensity, Some(context))
    }

    fn build(
        &self,
        app_name: &str,
        minutes: u32,
        roast_category: &str,
        intensity: &str,
        context: Option<UserContext>,
    ) -> Result<RoastPrompt> {
        let (app, app_context) = self
            .tables
            .find_app(app_name)
            .ok_or_else(|| RoastError::UnknownApp(app_name.to_string()))?;
        let focus = self
            .tables
            .focus(roast_category)
            .ok_or_else(|| RoastError::UnknownCategory(roast_category.to_string()))?;
        let intensity: Intensity = intensity.parse()?;
        let instruction = self
            .tables
            .instruction(intensity)
            .ok_or_else(|| RoastError::UnknownIntensity(intensity.to_string()))?;

        let duration = format_duration(minutes);
        let mut prompt = format!(
            "Generate a {intensity} intensity, witty, and funny roast in Hinglish (Hindi-English mix) \
             for a user who is predicted to spend {duration} on {app}.\n\
             \n\
             ROAST REQUIREMENTS:\n\
             - Intensity Level: {level} - {instruction}\n\
             - Primary Focus: {focus}\n\
             - App Context: Target {app_context}\n\
             - Language Style: Hinglish (mix Hindi and English naturally, like how young Indians speak)\n\
             - Tone: Humorous, relatable, and entertaining\n\
             - Length: 2-3 sentences maximum\n\
             \n\
             CONTEXT DETAILS:\n\
             - Predicted Usage Time: {minutes} minutes ({duration})\n\
             - App: {app}\n\
             - Roast Category: {roast_category}\n\
             - Focus on the irony and humor of spending this much time on {app}",
            level = intensity.as_str().to_uppercase(),
        );

        if let Some(context) = context {
            prompt.push_str(&format!("\n- Additional Context: {}", context.describe()));
        }

        let phrases = leading(&self.tables.hinglish_phrases, PHRASES_IN_PROMPT);
        let references = leading(&self.tables.cultural_references, REFERENCES_IN_PROMPT);
        prompt.push_str(&format!(
            "\n\n\
             STYLE GUIDELINES:\n\
             - Use popular Hinglish phrases and expressions\n\
             - Include relatable references to Indian culture/lifestyle\n\
             - Make it sound like a friend roasting another friend\n\
             - Avoid offensive content, keep it fun and entertaining\n\
             - Use emojis sparingly but effectively\n\
             \n\
             HINGLISH PHRASES TO CONSIDER:\n\
             {phrases}\n\
             \n\
             CULTURAL REFERENCES TO USE:\n\
             {references}\n\
             \n\
             Generate a roast that will make the user laugh while also making them think \
             about their {app} usage habits!"
        ));

        Ok(RoastPrompt(prompt))
    }
}

fn leading(items: &[String], n: usize) -> String {
    items.iter().take(n).map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// `"H hour(s) M minute(s)"`, always with both parts.
pub fn format_duration(minutes: u32) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    format!(
        "{hours} {} {rest} {}",
        if hours == 1 { "hour" } else { "hours" },
        if rest == 1 { "minute" } else { "minutes" }
    )
}
