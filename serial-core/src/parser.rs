//! Parser for the generation collaborator's reply format.
//!
//! Replies are raw text with `FIELD_NAME: value` lines. `CONTENT:`
//! spans every following line until another recognized field marker or
//! the end of the text. Unrecognized lines outside CONTENT are ignored
//! so the parser tolerates chatty collaborators.

use crate::state::{CharacterUpdate, Dimension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from parsing a generated chapter.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("missing required field {0}")]
    MissingField(&'static str),

    #[error("field {field} has an invalid value: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Field markers the parser recognizes.
const RECOGNIZED_FIELDS: &[&str] = &[
    "CHAPTER_NUMBER",
    "TITLE",
    "CONTENT",
    "EMOTIONAL_TONE",
    "KEY_EVENTS",
    "ENDING_TYPE",
    "ROMANCE_LEVEL",
    "PHYSICAL_DELTA",
    "EMOTIONAL_DELTA",
    "SOCIAL_DELTA",
    "PLOT_DELTA",
    "CHARACTER_UPDATE",
    "RESOLVES_FORESHADOWING",
    "USED_ELEMENTS",
];

/// A chapter draft extracted from a collaborator reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedChapter {
    /// Declared chapter number, if the reply carried one.
    pub number: Option<u32>,
    /// Chapter title. Required.
    pub title: String,
    /// Prose body. Required.
    pub content: String,
    /// Declared emotional tone.
    pub emotional_tone: Option<String>,
    /// Declared key events.
    pub key_events: Vec<String>,
    /// Ending marker, present only on epilogue chapters.
    pub ending_type: Option<String>,
    /// Romance progression level after this chapter.
    pub romance_level: Option<u8>,
    /// Declared progression deltas per dimension.
    pub deltas: BTreeMap<Dimension, u8>,
    /// Declared character state changes.
    pub character_updates: Vec<CharacterUpdate>,
    /// Foreshadowing references this chapter pays off.
    pub resolves_foreshadowing: Vec<String>,
    /// Plot elements this chapter consumes.
    pub used_elements: Vec<String>,
}

impl ParsedChapter {
    /// Word count of the prose body.
    pub fn word_count(&self) -> u32 {
        self.content.split_whitespace().count() as u32
    }
}

/// Split a line into a recognized field marker and its value, if any.
fn split_field(line: &str) -> Option<(&'static str, &str)> {
    let (head, tail) = line.split_once(':')?;
    let head = head.trim();
    RECOGNIZED_FIELDS
        .iter()
        .find(|f| **f == head)
        .map(|f| (*f, tail.trim()))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split([',', ';'])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_u8(field: &'static str, value: &str) -> Result<u8, ParseError> {
    value
        .trim()
        .parse::<u32>()
        .map(|n| n.min(100) as u8)
        .map_err(|_| ParseError::InvalidValue {
            field,
            value: value.to_string(),
        })
}

/// Parse `CHARACTER_UPDATE: Name | location=... | emotion=... | power=N`.
fn parse_character_update(value: &str) -> Result<CharacterUpdate, ParseError> {
    let mut parts = value.split('|').map(str::trim);
    let name = parts.next().unwrap_or_default();
    if name.is_empty() {
        return Err(ParseError::InvalidValue {
            field: "CHARACTER_UPDATE",
            value: value.to_string(),
        });
    }

    let mut update = CharacterUpdate::new(name);
    for part in parts {
        match part.split_once('=') {
            Some(("location", v)) => update.location = Some(v.trim().to_string()),
            Some(("emotion", v)) => update.emotion = Some(v.trim().to_string()),
            Some(("power", v)) => update.power_level = Some(parse_u8("CHARACTER_UPDATE", v)?),
            _ => {
                return Err(ParseError::InvalidValue {
                    field: "CHARACTER_UPDATE",
                    value: part.to_string(),
                })
            }
        }
    }
    Ok(update)
}

/// Parse a collaborator reply into a chapter draft.
pub fn parse_chapter(text: &str) -> Result<ParsedChapter, ParseError> {
    let mut chapter = ParsedChapter::default();
    let mut content_lines: Vec<&str> = Vec::new();
    let mut in_content = false;
    let mut saw_title = false;
    let mut saw_content = false;

    for line in text.lines() {
        if let Some((field, value)) = split_field(line) {
            in_content = false;
            match field {
                "CHAPTER_NUMBER" => {
                    chapter.number =
                        Some(value.trim().parse::<u32>().map_err(|_| {
                            ParseError::InvalidValue {
                                field: "CHAPTER_NUMBER",
                                value: value.to_string(),
                            }
                        })?);
                }
                "TITLE" => {
                    chapter.title = value.to_string();
                    saw_title = true;
                }
                "CONTENT" => {
                    if !value.is_empty() {
                        content_lines.push(value);
                    }
                    in_content = true;
                    saw_content = true;
                }
                "EMOTIONAL_TONE" => chapter.emotional_tone = Some(value.to_string()),
                "KEY_EVENTS" => chapter.key_events = parse_list(value),
                "ENDING_TYPE" => chapter.ending_type = Some(value.to_string()),
                "ROMANCE_LEVEL" => {
                    chapter.romance_level = Some(parse_u8("ROMANCE_LEVEL", value)?)
                }
                "PHYSICAL_DELTA" => {
                    chapter
                        .deltas
                        .insert(Dimension::Physical, parse_u8("PHYSICAL_DELTA", value)?);
                }
                "EMOTIONAL_DELTA" => {
                    chapter
                        .deltas
                        .insert(Dimension::Emotional, parse_u8("EMOTIONAL_DELTA", value)?);
                }
                "SOCIAL_DELTA" => {
                    chapter
                        .deltas
                        .insert(Dimension::Social, parse_u8("SOCIAL_DELTA", value)?);
                }
                "PLOT_DELTA" => {
                    chapter
                        .deltas
                        .insert(Dimension::Plot, parse_u8("PLOT_DELTA", value)?);
                }
                "CHARACTER_UPDATE" => {
                    chapter.character_updates.push(parse_character_update(value)?);
                }
                "RESOLVES_FORESHADOWING" => chapter.resolves_foreshadowing = parse_list(value),
                "USED_ELEMENTS" => chapter.used_elements = parse_list(value),
                _ => unreachable!("split_field only returns recognized fields"),
            }
        } else if in_content {
            content_lines.push(line);
        }
        // Unrecognized lines outside CONTENT are ignored.
    }

    if !saw_title || chapter.title.is_empty() {
        return Err(ParseError::MissingField("TITLE"));
    }
    if !saw_content {
        return Err(ParseError::MissingField("CONTENT"));
    }

    chapter.content = content_lines.join("\n").trim().to_string();
    if chapter.content.is_empty() {
        return Err(ParseError::MissingField("CONTENT"));
    }

    Ok(chapter)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = "\
CHAPTER_NUMBER: 3
TITLE: The Border Keep
EMOTIONAL_TONE: tense
KEY_EVENTS: Aria reaches the keep, Kael reveals the letter
ROMANCE_LEVEL: 18
EMOTIONAL_DELTA: 6
PLOT_DELTA: 8
CHARACTER_UPDATE: Aria | location=the border keep | emotion=wary
RESOLVES_FORESHADOWING: the sealed letter
USED_ELEMENTS: storm ambush
CONTENT:
The rain had not stopped for three days.

Aria counted the watchfires from the wall.";

    #[test]
    fn test_parse_full_reply() {
        let chapter = parse_chapter(REPLY).unwrap();

        assert_eq!(chapter.number, Some(3));
        assert_eq!(chapter.title, "The Border Keep");
        assert_eq!(chapter.emotional_tone.as_deref(), Some("tense"));
        assert_eq!(chapter.key_events.len(), 2);
        assert_eq!(chapter.romance_level, Some(18));
        assert_eq!(chapter.deltas.get(&Dimension::Emotional), Some(&6));
        assert_eq!(chapter.deltas.get(&Dimension::Plot), Some(&8));
        assert_eq!(chapter.character_updates.len(), 1);
        assert_eq!(chapter.resolves_foreshadowing, vec!["the sealed letter"]);
        assert!(chapter.content.starts_with("The rain had not stopped"));
        assert!(chapter.content.ends_with("from the wall."));
        assert_eq!(chapter.word_count(), 15);
    }

    #[test]
    fn test_content_stops_at_next_marker() {
        let reply = "TITLE: Short\nCONTENT: First line.\nSecond line.\nENDING_TYPE: epilogue\n";
        let chapter = parse_chapter(reply).unwrap();

        assert_eq!(chapter.content, "First line.\nSecond line.");
        assert_eq!(chapter.ending_type.as_deref(), Some("epilogue"));
    }

    #[test]
    fn test_colon_in_prose_is_not_a_marker() {
        let reply = "TITLE: Short\nCONTENT:\nShe said: wait for me.\nNote: unrecognized markers stay in prose.\n";
        let chapter = parse_chapter(reply).unwrap();
        assert!(chapter.content.contains("She said: wait for me."));
        assert!(chapter.content.contains("Note: unrecognized"));
    }

    #[test]
    fn test_missing_title_rejected() {
        let err = parse_chapter("CONTENT:\nSome prose.").unwrap_err();
        assert!(matches!(err, ParseError::MissingField("TITLE")));
    }

    #[test]
    fn test_missing_content_rejected() {
        let err = parse_chapter("TITLE: Empty").unwrap_err();
        assert!(matches!(err, ParseError::MissingField("CONTENT")));
    }

    #[test]
    fn test_romance_level_clamped() {
        let reply = "TITLE: Short\nROMANCE_LEVEL: 250\nCONTENT:\nProse.";
        let chapter = parse_chapter(reply).unwrap();
        assert_eq!(chapter.romance_level, Some(100));
    }

    #[test]
    fn test_invalid_chapter_number_rejected() {
        let reply = "TITLE: Short\nCHAPTER_NUMBER: three\nCONTENT:\nProse.";
        assert!(matches!(
            parse_chapter(reply),
            Err(ParseError::InvalidValue { field: "CHAPTER_NUMBER", .. })
        ));
    }
}
