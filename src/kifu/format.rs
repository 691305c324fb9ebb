//! Textual conventions of a kifu dialect.
//!
//! Everything the classifier and the renderers need to know about a producer's
//! output lives in a [`KifuFormat`] value, so an alternate dialect can be
//! plugged in through [`LineClassifier::new`](super::classify::LineClassifier::new)
//! without touching the parser.

/// Line terminator used by every rendered record.
pub const LINE_END: &str = "\r\n";

/// Display columns reserved for the move text and its `(dd)` origin.
pub const MOVE_FIELD_COLUMNS: usize = 13;

/// Width the elapsed clock is right-aligned to inside `( m:ss/hh:mm:ss)`.
pub const ELAPSED_COLUMNS: usize = 5;

/// Header attributes a kifu key can be mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKey {
    Kisen,
    Teai,
    Sente,
    Gote,
    StartedAt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KifuFormat {
    /// Column heading that separates the header block from the move list.
    pub separator: String,
    /// Prefix of free-form header lines (`# ---- Kifu for Windows ... ----`).
    pub header_marker: char,
    pub comment_marker: char,
    /// Full-width colon between a header key and its value.
    pub key_value_colon: char,
    /// Move text beginning with this glyph re-uses the previous destination.
    pub same_square_marker: char,
    /// Regex matched against the start of a terminal "game over" line.
    pub footer_pattern: String,
    /// Regex for a move line; must capture number, text, origin, elapsed, cumulative.
    pub move_pattern: String,
    pub header_keys: Vec<(String, HeaderKey)>,
}

impl Default for KifuFormat {
    /// The Kakinoki (Kifu for Windows) dialect.
    fn default() -> Self {
        Self {
            separator: "手数----指手---------消費時間--".to_string(),
            header_marker: '#',
            comment_marker: '*',
            key_value_colon: '：',
            same_square_marker: '同',
            footer_pattern: r"^\s*まで\d+手".to_string(),
            // trailing `+` marks a move that has variations
            move_pattern: concat!(
                r"^\s*([0-9]+)\s+(.+?)(?:\(([0-9]{2})\))?\s*",
                r"\(\s*([0-9]+:[0-9]{2})/([0-9]+:[0-9]{2}:[0-9]{2})\)\s*\+?\s*$",
            )
            .to_string(),
            header_keys: vec![
                ("棋戦".to_string(), HeaderKey::Kisen),
                ("手合割".to_string(), HeaderKey::Teai),
                ("先手".to_string(), HeaderKey::Sente),
                ("後手".to_string(), HeaderKey::Gote),
                ("開始日時".to_string(), HeaderKey::StartedAt),
            ],
        }
    }
}

impl KifuFormat {
    pub fn header_key(&self, key: &str) -> Option<HeaderKey> {
        let key = key.trim();
        self.header_keys
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, header_key)| *header_key)
    }

    /// `true` when `move_text` is written relative to the previous move's square.
    pub fn is_same_square(&self, move_text: &str) -> bool {
        move_text.starts_with(self.same_square_marker)
    }
}

/// Columns a string occupies on a fixed-pitch terminal: non-ASCII glyphs
/// (kanji, full-width digits, the ideographic space) take two.
pub fn display_width(text: &str) -> usize {
    text.chars().map(|c| if c.is_ascii() { 1 } else { 2 }).sum()
}
