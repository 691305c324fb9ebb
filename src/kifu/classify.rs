//! Line classification for the move-list zone of a kifu record.
//!
//! Priority is fixed: comment > footer > move > unclassified. A line that
//! looks like both a comment and a move (`*  1 ７六歩(77) ...`) is a comment.

use regex::Regex;
use std::sync::{Arc, LazyLock};

use super::error::KifuError;
use super::format::KifuFormat;

static KAKINOKI: LazyLock<Arc<LineClassifier>> = LazyLock::new(|| {
    Arc::new(
        LineClassifier::new(KifuFormat::default()).expect("built-in kifu patterns compile"),
    )
});

/// Fields captured from a move line. Borrowed from the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveLine<'a> {
    pub number: u32,
    pub text: &'a str,
    pub disambiguator: Option<&'a str>,
    pub elapsed: &'a str,
    pub cumulative: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// Payload after the comment marker.
    Comment(&'a str),
    /// The whole terminal line, verbatim.
    Footer(&'a str),
    Move(MoveLine<'a>),
    Unclassified(&'a str),
}

#[derive(Debug)]
pub struct LineClassifier {
    format: KifuFormat,
    footer_re: Regex,
    move_re: Regex,
}

impl LineClassifier {
    pub fn new(format: KifuFormat) -> Result<Self, KifuError> {
        let footer_re = Regex::new(&format.footer_pattern)?;
        let move_re = Regex::new(&format.move_pattern)?;
        Ok(Self {
            format,
            footer_re,
            move_re,
        })
    }

    /// Shared classifier for the Kakinoki dialect.
    pub fn kakinoki() -> Arc<Self> {
        Arc::clone(&KAKINOKI)
    }

    pub fn format(&self) -> &KifuFormat {
        &self.format
    }

    /// Cheap structural gate: the text carries the move-list separator.
    /// Passing it does not make the rest of the text well-formed.
    pub fn is_valid(&self, text: &str) -> bool {
        text.contains(self.format.separator.as_str())
    }

    pub fn is_separator(&self, line: &str) -> bool {
        line.contains(self.format.separator.as_str())
    }

    pub fn is_header_marker(&self, line: &str) -> bool {
        line.starts_with(self.format.header_marker)
    }

    pub fn classify<'a>(&self, line: &'a str) -> Line<'a> {
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(payload) = self.is_comment(line) {
            return Line::Comment(payload);
        }
        if let Some(footer) = self.is_footer(line) {
            return Line::Footer(footer);
        }
        if let Some(mv) = self.is_move(line) {
            return Line::Move(mv);
        }
        Line::Unclassified(line)
    }

    pub fn is_comment<'a>(&self, line: &'a str) -> Option<&'a str> {
        line.trim_start().strip_prefix(self.format.comment_marker)
    }

    pub fn is_footer<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.footer_re.is_match(line).then_some(line)
    }

    pub fn is_move<'a>(&self, line: &'a str) -> Option<MoveLine<'a>> {
        let caps = self.move_re.captures(line)?;
        Some(MoveLine {
            number: caps.get(1)?.as_str().parse().ok()?,
            text: caps.get(2)?.as_str(),
            disambiguator: caps.get(3).map(|m| m.as_str()),
            elapsed: caps.get(4)?.as_str(),
            cumulative: caps.get(5)?.as_str(),
        })
    }

    /// `true` while a line still belongs to the comment/move run.
    pub fn comment_or_move(&self, line: &str) -> bool {
        self.is_comment(line).is_some() || self.is_move(line).is_some()
    }
}

/// [`LineClassifier::is_valid`] for the Kakinoki dialect.
pub fn is_valid(text: &str) -> bool {
    KAKINOKI.is_valid(text)
}
