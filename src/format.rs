//! Notification text templates.
//!
//! Templates use `{artist}`, `{title}`, `{album}` and `{duration}`, with `{{`
//! and `}}` for literal braces. They are parsed once, so an unknown
//! placeholder is reported at startup instead of on the first track.

use std::str::FromStr;

use crate::error::FormatError;
use crate::types::TrackMetadata;

pub const DEFAULT_TITLE_FORMAT: &str = "{title}";
pub const DEFAULT_DESCRIPTION_FORMAT: &str = "{artist}\n{album}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Artist,
    Title,
    Album,
    Duration,
}

impl Field {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "artist" => Some(Field::Artist),
            "title" => Some(Field::Title),
            "album" => Some(Field::Album),
            "duration" => Some(Field::Duration),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl FromStr for Template {
    type Err = FormatError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((position, ch)) = chars.next() {
            match ch {
                '{' if chars.peek().map(|&(_, c)| c) == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(FormatError::Unterminated { position });
                    }
                    let field = Field::from_name(&name)
                        .ok_or(FormatError::UnknownPlaceholder { name })?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(field));
                }
                '}' if chars.peek().map(|&(_, c)| c) == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(FormatError::UnmatchedBrace { position }),
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }
}

impl Template {
    pub fn render(&self, track: &TrackMetadata) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(Field::Artist) => out.push_str(&track.artist),
                Segment::Field(Field::Title) => out.push_str(&track.title),
                Segment::Field(Field::Album) => out.push_str(&track.album),
                Segment::Field(Field::Duration) => out.push_str(&hms(track.duration)),
            }
        }
        out
    }
}

/// Title and description templates, validated up front
#[derive(Debug, Clone)]
pub struct NotificationFormatter {
    title: Template,
    description: Template,
}

impl NotificationFormatter {
    pub fn new(title: &str, description: &str) -> Result<Self, FormatError> {
        Ok(Self {
            title: title.parse()?,
            description: description.parse()?,
        })
    }

    /// Render (title, description). Trailing newlines are dropped from the
    /// description so an empty last field leaves no blank line.
    pub fn render(&self, track: &TrackMetadata) -> (String, String) {
        let title = self.title.render(track);
        let mut description = self.description.render(track);
        description.truncate(description.trim_end_matches('\n').len());
        (title, description)
    }
}

impl Default for NotificationFormatter {
    fn default() -> Self {
        Self {
            title: Template {
                segments: vec![Segment::Field(Field::Title)],
            },
            description: Template {
                segments: vec![
                    Segment::Field(Field::Artist),
                    Segment::Literal("\n".to_string()),
                    Segment::Field(Field::Album),
                ],
            },
        }
    }
}

/// One-shot form of [`NotificationFormatter`]
pub fn render(
    title_format: &str,
    description_format: &str,
    track: &TrackMetadata,
) -> Result<(String, String), FormatError> {
    Ok(NotificationFormatter::new(title_format, description_format)?.render(track))
}

/// `MM:SS`, or `HH:MM:SS` from one hour up
pub fn hms(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, seconds % 3600 / 60, seconds % 60);
    if h > 0 {
        format!("{:02}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}
