//! Song briefs and the amendments applied to them by tweaks.
//!
//! A brief is immutable once stored. Tweaks append a [`TweakAmendment`]; the
//! most recent amendment overrides the brief's free-text fields when a
//! prompt is built.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::wire_enum::wire_enum;
use super::{CustomizationId, UserId};

/// Maximum characters accepted for a recipient or author name.
pub const NAME_MAX_CHARS: usize = 60;
/// Maximum characters accepted for any free-text field.
pub const FREE_TEXT_MAX_CHARS: usize = 500;
/// Maximum number of moods in one brief.
pub const MAX_MOODS: usize = 3;

wire_enum! {
    /// Occasion the song is written for.
    pub enum Occasion / ParseOccasionError ("occasion") {
        Birthday => "birthday",
        Anniversary => "anniversary",
        Wedding => "wedding",
        ValentinesDay => "valentines_day",
        MothersDay => "mothers_day",
        FathersDay => "fathers_day",
        Graduation => "graduation",
        Retirement => "retirement",
        Christmas => "christmas",
        JustBecause => "just_because",
    }
}

impl Occasion {
    /// Human-readable label used in prompts and e-mails.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Birthday => "Birthday",
            Self::Anniversary => "Anniversary",
            Self::Wedding => "Wedding",
            Self::ValentinesDay => "Valentine's Day",
            Self::MothersDay => "Mother's Day",
            Self::FathersDay => "Father's Day",
            Self::Graduation => "Graduation",
            Self::Retirement => "Retirement",
            Self::Christmas => "Christmas",
            Self::JustBecause => "Just Because",
        }
    }
}

wire_enum! {
    /// Emotional colour requested for the song.
    pub enum Mood / ParseMoodError ("mood") {
        Happy => "happy",
        Romantic => "romantic",
        Nostalgic => "nostalgic",
        Funny => "funny",
        Heartfelt => "heartfelt",
        Upbeat => "upbeat",
        Calm => "calm",
        Epic => "epic",
    }
}

wire_enum! {
    /// Musical genre requested for the song.
    pub enum Genre / ParseGenreError ("genre") {
        Pop => "pop",
        Rock => "rock",
        Acoustic => "acoustic",
        Country => "country",
        Jazz => "jazz",
        RnB => "rnb",
        HipHop => "hip_hop",
        Folk => "folk",
        Electronic => "electronic",
        Classical => "classical",
    }
}

impl Genre {
    /// Human-readable label used in prompts.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pop => "pop",
            Self::Rock => "rock",
            Self::Acoustic => "acoustic",
            Self::Country => "country",
            Self::Jazz => "jazz",
            Self::RnB => "R&B",
            Self::HipHop => "hip-hop",
            Self::Folk => "folk",
            Self::Electronic => "electronic",
            Self::Classical => "classical",
        }
    }
}

/// Target song length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum SongLength {
    Short,
    Standard,
    Extended,
}

impl SongLength {
    /// Length in whole seconds.
    #[must_use]
    pub const fn seconds(self) -> u32 {
        match self {
            Self::Short => 60,
            Self::Standard => 90,
            Self::Extended => 120,
        }
    }

    /// Length in milliseconds, as requested from the generation provider.
    #[must_use]
    pub const fn duration_ms(self) -> u32 {
        self.seconds() * 1000
    }
}

/// Error returned for a length other than 60, 90 or 120 seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("song length must be 60, 90 or 120 seconds, got {0}")]
pub struct InvalidSongLength(pub u32);

impl TryFrom<u32> for SongLength {
    type Error = InvalidSongLength;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            60 => Ok(Self::Short),
            90 => Ok(Self::Standard),
            120 => Ok(Self::Extended),
            other => Err(InvalidSongLength(other)),
        }
    }
}

impl From<SongLength> for u32 {
    fn from(value: SongLength) -> Self {
        value.seconds()
    }
}

/// Validation failures for a brief or an amendment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustomizationValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("{field} has an unknown value: {value}")]
    UnknownValue { field: &'static str, value: String },
    #[error("choose between 1 and {MAX_MOODS} moods")]
    MoodCount,
    #[error(transparent)]
    Length(#[from] InvalidSongLength),
    #[error("a tweak must change at least one field")]
    EmptyAmendment,
}

impl CustomizationValidationError {
    /// Request field the error refers to, in camelCase.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::Empty { field }
            | Self::TooLong { field, .. }
            | Self::UnknownValue { field, .. } => field,
            Self::MoodCount => "moods",
            Self::Length(_) => "lengthSeconds",
            Self::EmptyAmendment => "specialMemories",
        }
    }
}

/// Unvalidated brief as received from a client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomizationDraft {
    pub recipient_name: String,
    pub author_name: String,
    pub occasion: String,
    pub length_seconds: u32,
    pub moods: Vec<String>,
    pub genre: String,
    pub special_memories: Option<String>,
    pub things_to_avoid: Option<String>,
    pub pronunciation: Option<String>,
    pub occasion_date: Option<NaiveDate>,
}

/// A validated song brief.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomizationBrief {
    pub recipient_name: String,
    pub author_name: String,
    pub occasion: Occasion,
    pub length: SongLength,
    pub moods: Vec<Mood>,
    pub genre: Genre,
    pub special_memories: Option<String>,
    pub things_to_avoid: Option<String>,
    pub pronunciation: Option<String>,
    pub occasion_date: Option<NaiveDate>,
}

impl TryFrom<CustomizationDraft> for CustomizationBrief {
    type Error = CustomizationValidationError;

    fn try_from(draft: CustomizationDraft) -> Result<Self, Self::Error> {
        let recipient_name = required_text("recipientName", &draft.recipient_name, NAME_MAX_CHARS)?;
        let author_name = required_text("authorName", &draft.author_name, NAME_MAX_CHARS)?;
        let occasion = parse_token("occasion", &draft.occasion)?;
        let genre = parse_token("genre", &draft.genre)?;
        let length = SongLength::try_from(draft.length_seconds)?;

        let mut moods: Vec<Mood> = Vec::with_capacity(draft.moods.len());
        for raw in &draft.moods {
            let mood = parse_token("moods", raw)?;
            if !moods.contains(&mood) {
                moods.push(mood);
            }
        }
        if moods.is_empty() || moods.len() > MAX_MOODS {
            return Err(CustomizationValidationError::MoodCount);
        }

        Ok(Self {
            recipient_name,
            author_name,
            occasion,
            length,
            moods,
            genre,
            special_memories: optional_text("specialMemories", draft.special_memories)?,
            things_to_avoid: optional_text("thingsToAvoid", draft.things_to_avoid)?,
            pronunciation: optional_text("pronunciation", draft.pronunciation)?,
            occasion_date: draft.occasion_date,
        })
    }
}

/// A stored brief with its latest amendment, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customization {
    pub id: CustomizationId,
    pub user_id: UserId,
    pub brief: CustomizationBrief,
    pub latest_tweak: Option<TweakAmendment>,
    pub created_at: DateTime<Utc>,
}

impl Customization {
    /// Special memories after applying the latest amendment.
    #[must_use]
    pub fn special_memories(&self) -> Option<&str> {
        self.amended(|t| t.special_memories.as_deref(), self.brief.special_memories.as_deref())
    }

    /// Avoid-list after applying the latest amendment.
    #[must_use]
    pub fn things_to_avoid(&self) -> Option<&str> {
        self.amended(|t| t.things_to_avoid.as_deref(), self.brief.things_to_avoid.as_deref())
    }

    /// Pronunciation hint after applying the latest amendment.
    #[must_use]
    pub fn pronunciation(&self) -> Option<&str> {
        self.amended(|t| t.pronunciation.as_deref(), self.brief.pronunciation.as_deref())
    }

    fn amended<'a>(
        &'a self,
        pick: impl Fn(&'a TweakAmendment) -> Option<&'a str>,
        original: Option<&'a str>,
    ) -> Option<&'a str> {
        self.latest_tweak.as_ref().and_then(pick).or(original)
    }
}

/// Free-text changes requested by a tweak. Absent fields keep the original.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TweakAmendment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_memories: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub things_to_avoid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<String>,
}

impl TweakAmendment {
    /// Validate and normalise an amendment. Blank fields are dropped and at
    /// least one field must remain.
    ///
    /// # Examples
    /// ```
    /// use songsmith::domain::TweakAmendment;
    ///
    /// let tweak = TweakAmendment::new(Some("  ".into()), Some("no drums".into()), None)
    ///     .expect("one field is set");
    /// assert_eq!(tweak.special_memories, None);
    /// assert_eq!(tweak.things_to_avoid.as_deref(), Some("no drums"));
    /// ```
    pub fn new(
        special_memories: Option<String>,
        things_to_avoid: Option<String>,
        pronunciation: Option<String>,
    ) -> Result<Self, CustomizationValidationError> {
        let amendment = Self {
            special_memories: optional_text("specialMemories", special_memories)?,
            things_to_avoid: optional_text("thingsToAvoid", things_to_avoid)?,
            pronunciation: optional_text("pronunciation", pronunciation)?,
        };
        if amendment.is_empty() {
            return Err(CustomizationValidationError::EmptyAmendment);
        }
        Ok(amendment)
    }

    /// Whether no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.special_memories.is_none() && self.things_to_avoid.is_none() && self.pronunciation.is_none()
    }
}

fn required_text(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<String, CustomizationValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CustomizationValidationError::Empty { field });
    }
    if trimmed.chars().count() > max {
        return Err(CustomizationValidationError::TooLong { field, max });
    }
    Ok(trimmed.to_owned())
}

fn optional_text(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<String>, CustomizationValidationError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) if text.chars().count() > FREE_TEXT_MAX_CHARS => {
            Err(CustomizationValidationError::TooLong {
                field,
                max: FREE_TEXT_MAX_CHARS,
            })
        }
        Some(text) => Ok(Some(text.to_owned())),
    }
}

fn parse_token<T: std::str::FromStr>(
    field: &'static str,
    raw: &str,
) -> Result<T, CustomizationValidationError> {
    raw.trim()
        .parse()
        .map_err(|_| CustomizationValidationError::UnknownValue {
            field,
            value: raw.to_owned(),
        })
}

#[cfg(test)]
#[path = "customization_tests.rs"]
mod tests;
