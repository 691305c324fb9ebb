//! One position of a kifu move list: the move (or the terminal line) plus the
//! comment layers contributed by every record merged into it.

use smallvec::{SmallVec, smallvec};
use std::fmt::Write;

use super::classify::{Line, LineClassifier, MoveLine};
use super::error::KifuError;
use super::format::{ELAPSED_COLUMNS, KifuFormat, LINE_END, MOVE_FIELD_COLUMNS, display_width};

/// Contributor label used when a record is parsed without one.
pub const DEFAULT_NAME: &str = "unnamed";

/// One contributor's comment on a position. An empty comment means the
/// contributor had nothing to say here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub name: String,
    pub comment: String,
}

pub type Annotations = SmallVec<[Annotation; 2]>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Play {
    pub number: u32,
    pub text: String,
    /// Two-digit origin square, e.g. `77` in `７六歩(77)`.
    pub disambiguator: Option<String>,
    /// Opaque clock text, kept verbatim (`0:11`).
    pub elapsed: String,
    /// Opaque clock text, kept verbatim (`00:00:11`).
    pub cumulative: String,
}

impl From<MoveLine<'_>> for Play {
    fn from(line: MoveLine<'_>) -> Self {
        Self {
            number: line.number,
            text: line.text.to_string(),
            disambiguator: line.disambiguator.map(str::to_string),
            elapsed: line.elapsed.to_string(),
            cumulative: line.cumulative.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryBody {
    Move(Play),
    /// Terminal line such as `まで92手で後手の勝ち`.
    Footer(String),
    /// Comment addressed to a position without a move of its own.
    Note { move_number: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    NoComments,
    /// Comments of the first contributor only, unlabelled.
    OwnCommentOnly,
    /// Every contributor's comments, each line labelled `name: `.
    AllNamed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveEntry {
    body: EntryBody,
    annotations: Annotations,
}

impl MoveEntry {
    fn with_body(body: EntryBody, name: &str, comment: impl Into<String>) -> Self {
        Self {
            body,
            annotations: smallvec![Annotation {
                name: name.to_string(),
                comment: comment.into(),
            }],
        }
    }

    pub fn from_play(play: Play, name: &str, comment: impl Into<String>) -> Self {
        Self::with_body(EntryBody::Move(play), name, comment)
    }

    pub fn footer(text: impl Into<String>, name: &str, comment: impl Into<String>) -> Self {
        Self::with_body(EntryBody::Footer(text.into()), name, comment)
    }

    /// An out-of-band comment for `move_number`, to be folded into a record
    /// with [`GameRecord::merge_comment`](super::record::GameRecord::merge_comment).
    pub fn note(move_number: u32, name: &str, comment: impl Into<String>) -> Self {
        Self::with_body(EntryBody::Note { move_number }, name, comment)
    }

    /// Builds an entry from already-classified comment payloads and the line
    /// that closes the block. Returns `None` unless `terminal` is a move or footer.
    fn from_scan(comments: &[&str], terminal: Line<'_>, name: &str) -> Option<Self> {
        let comment = comments.join("\n");
        match terminal {
            Line::Move(mv) => Some(Self::from_play(mv.into(), name, comment)),
            Line::Footer(text) => Some(Self::footer(text, name, comment)),
            Line::Comment(_) | Line::Unclassified(_) => None,
        }
    }

    /// Parses a block of comment lines closed by one move or footer line.
    ///
    /// Lines that are neither are skipped; anything after the closing line is
    /// ignored. `None` when the block never closes.
    pub fn parse(classifier: &LineClassifier, block: &str, name: Option<&str>) -> Option<Self> {
        let name = name.unwrap_or(DEFAULT_NAME);
        let mut comments = Vec::new();
        for raw in block.lines() {
            match classifier.classify(raw) {
                Line::Comment(payload) => comments.push(payload),
                Line::Unclassified(_) => {}
                terminal => return Self::from_scan(&comments, terminal, name),
            }
        }
        None
    }

    pub fn body(&self) -> &EntryBody {
        &self.body
    }

    pub fn play(&self) -> Option<&Play> {
        match &self.body {
            EntryBody::Move(play) => Some(play),
            _ => None,
        }
    }

    pub fn move_number(&self) -> Option<u32> {
        match &self.body {
            EntryBody::Move(play) => Some(play.number),
            EntryBody::Note { move_number } => Some(*move_number),
            EntryBody::Footer(_) => None,
        }
    }

    pub fn move_text(&self) -> Option<&str> {
        self.play().map(|p| p.text.as_str())
    }

    pub fn disambiguator(&self) -> Option<&str> {
        self.play().and_then(|p| p.disambiguator.as_deref())
    }

    pub fn elapsed_time(&self) -> Option<&str> {
        self.play().map(|p| p.elapsed.as_str())
    }

    pub fn cumulative_time(&self) -> Option<&str> {
        self.play().map(|p| p.cumulative.as_str())
    }

    pub fn is_footer(&self) -> bool {
        matches!(self.body, EntryBody::Footer(_))
    }

    pub fn footer_text(&self) -> Option<&str> {
        match &self.body {
            EntryBody::Footer(text) => Some(text),
            _ => None,
        }
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn names(&self) -> Vec<&str> {
        self.annotations.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn comments(&self) -> Vec<&str> {
        self.annotations.iter().map(|a| a.comment.as_str()).collect()
    }

    /// Comment of the contributor that created this entry.
    pub fn own_comment(&self) -> &str {
        self.annotations
            .first()
            .map(|a| a.comment.as_str())
            .unwrap_or_default()
    }

    fn slot_label(&self) -> String {
        match &self.body {
            EntryBody::Move(play) => format!("move {}", play.number),
            EntryBody::Footer(_) => "footer".to_string(),
            EntryBody::Note { move_number } => format!("note for move {move_number}"),
        }
    }

    fn addresses_same_slot(&self, other: &Self) -> bool {
        match (&self.body, &other.body) {
            (EntryBody::Footer(_), EntryBody::Footer(_)) => true,
            (EntryBody::Footer(_), _) | (_, EntryBody::Footer(_)) => false,
            _ => self.move_number() == other.move_number(),
        }
    }

    /// New entry with `self`'s move/footer fields and the contributor layers of
    /// `self` followed by those of `other`. Not commutative: the left side's
    /// fields always win.
    pub fn merge(&self, other: &Self) -> Result<Self, KifuError> {
        if !self.addresses_same_slot(other) {
            return Err(KifuError::MismatchedEntry {
                left: self.slot_label(),
                right: other.slot_label(),
            });
        }
        Ok(self.layered_with(other))
    }

    /// Shape an entry takes when it lands in an empty footer slot: a move
    /// keeps only its comment layers.
    pub(crate) fn into_footer_slot(self) -> Self {
        match self.body {
            EntryBody::Move(play) => Self {
                body: EntryBody::Note {
                    move_number: play.number,
                },
                annotations: self.annotations,
            },
            _ => self,
        }
    }

    /// Merge of two footer-slot occupants. A note standing in for a missing
    /// footer adopts the other side's footer text; otherwise the left side's
    /// body wins as in [`merge`](Self::merge).
    pub(crate) fn merge_footer_slot(&self, other: &Self) -> Result<Self, KifuError> {
        match (&self.body, &other.body) {
            (EntryBody::Footer(_) | EntryBody::Note { .. }, EntryBody::Footer(_))
            | (EntryBody::Footer(_), EntryBody::Note { .. })
            | (EntryBody::Note { .. }, EntryBody::Note { .. }) => {
                let mut merged = self.layered_with(other);
                if matches!(self.body, EntryBody::Note { .. }) {
                    merged.body = other.body.clone();
                }
                Ok(merged)
            }
            _ => Err(KifuError::MismatchedEntry {
                left: self.slot_label(),
                right: other.slot_label(),
            }),
        }
    }

    /// Appends `other`'s layers without checking which slot it addresses.
    pub(crate) fn layered_with(&self, other: &Self) -> Self {
        let mut annotations = self.annotations.clone();
        annotations.extend(other.annotations.iter().cloned());
        Self {
            body: self.body.clone(),
            annotations,
        }
    }

    fn write_body(&self, out: &mut String) {
        match &self.body {
            EntryBody::Move(play) => {
                let mut field = play.text.clone();
                if let Some(origin) = &play.disambiguator {
                    let _ = write!(field, "({origin})");
                }
                let pad = MOVE_FIELD_COLUMNS.saturating_sub(display_width(&field));
                let _ = write!(
                    out,
                    "{:>4} {}{}({:>width$}/{})",
                    play.number,
                    field,
                    " ".repeat(pad),
                    play.elapsed,
                    play.cumulative,
                    width = ELAPSED_COLUMNS
                );
            }
            EntryBody::Footer(text) => out.push_str(text),
            EntryBody::Note { .. } => {}
        }
    }

    /// Renders the entry as kifu lines joined by CRLF, without a trailing
    /// terminator. A note with no comment renders as an empty string.
    pub fn render(&self, mode: RenderMode, format: &KifuFormat) -> String {
        let mut lines: Vec<String> = Vec::new();
        let marker = format.comment_marker;

        match mode {
            RenderMode::NoComments => {}
            RenderMode::OwnCommentOnly => {
                let own = self.own_comment();
                if !own.is_empty() {
                    lines.extend(own.split('\n').map(|line| format!("{marker}{line}")));
                }
            }
            RenderMode::AllNamed => {
                for annotation in self.annotations.iter().filter(|a| !a.comment.is_empty()) {
                    lines.extend(
                        annotation
                            .comment
                            .split('\n')
                            .map(|line| format!("{marker}{}: {line}", annotation.name)),
                    );
                }
            }
        }

        let mut body = String::new();
        self.write_body(&mut body);
        if !body.is_empty() {
            lines.push(body);
        }

        lines.join(LINE_END)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOVE_1: &str = "   1 ５六歩(57)   ( 0:11/00:00:11)";

    fn classifier() -> std::sync::Arc<LineClassifier> {
        LineClassifier::kakinoki()
    }

    fn parse(block: &str, name: &str) -> MoveEntry {
        MoveEntry::parse(&classifier(), block, Some(name)).unwrap()
    }

    #[test]
    fn test_parse_move_fields() {
        let entry = parse(MOVE_1, "sandmark");
        assert_eq!(entry.move_number(), Some(1));
        assert_eq!(entry.move_text(), Some("５六歩"));
        assert_eq!(entry.disambiguator(), Some("57"));
        assert_eq!(entry.elapsed_time(), Some("0:11"));
        assert_eq!(entry.cumulative_time(), Some("00:00:11"));
        assert!(!entry.is_footer());
        assert_eq!(entry.footer_text(), None);
        assert_eq!(entry.names(), vec!["sandmark"]);
        assert_eq!(entry.comments(), vec![""]);
    }

    #[test]
    fn test_comment_lines_accumulate_into_one_slot() {
        let block = format!("*first line\r\n*second line\r\n{MOVE_1}\r\n");
        let entry = parse(&block, "a");
        assert_eq!(entry.annotations().len(), 1);
        assert_eq!(entry.own_comment(), "first line\nsecond line");
    }

    #[test]
    fn test_default_name() {
        let entry = MoveEntry::parse(&classifier(), MOVE_1, None).unwrap();
        assert_eq!(entry.names(), vec![DEFAULT_NAME]);
    }

    #[test]
    fn test_parse_footer() {
        let entry = parse("*感想戦へ\nまで2手で後手の勝ち", "a");
        assert!(entry.is_footer());
        assert_eq!(entry.footer_text(), Some("まで2手で後手の勝ち"));
        assert_eq!(entry.move_number(), None);
        assert_eq!(entry.move_text(), None);
        assert_eq!(entry.own_comment(), "感想戦へ");
    }

    #[test]
    fn test_unterminated_block_is_none() {
        assert!(MoveEntry::parse(&classifier(), "*only a comment", None).is_none());
    }

    #[test]
    fn test_render_no_comments_round_trips_move_line() {
        let format = KifuFormat::default();
        for line in [
            MOVE_1,
            "   4 同　歩(23)   ( 0:00/00:00:02)",
            "   3 ２二角成(88) ( 0:03/00:00:04)",
            "  25 ５五角打     ( 0:10/00:03:12)",
            "  93 投了         ( 0:04/00:05:59)",
            " 120 ４二金(31)   (10:02/01:10:00)",
        ] {
            assert_eq!(parse(line, "a").render(RenderMode::NoComments, &format), line);
        }
    }

    #[test]
    fn test_render_overlong_move_is_not_truncated() {
        let entry = parse("  61 ６八銀不成(79)( 0:01/00:10:00)", "a");
        assert_eq!(
            entry.render(RenderMode::NoComments, &KifuFormat::default()),
            "  61 ６八銀不成(79)( 0:01/00:10:00)"
        );
    }

    #[test]
    fn test_render_own_comment_only() {
        let entry = parse(&format!("*one\n*two\n{MOVE_1}"), "a");
        assert_eq!(
            entry.render(RenderMode::OwnCommentOnly, &KifuFormat::default()),
            format!("*one\r\n*two\r\n{MOVE_1}")
        );
    }

    #[test]
    fn test_render_all_named_skips_empty_layers() {
        let a = parse(&format!("*from a\n{MOVE_1}"), "A");
        let b = parse(MOVE_1, "B");
        let c = parse(&format!("*from c\n*more\n{MOVE_1}"), "C");
        let merged = a.merge(&b).unwrap().merge(&c).unwrap();
        assert_eq!(
            merged.render(RenderMode::AllNamed, &KifuFormat::default()),
            format!("*A: from a\r\n*C: from c\r\n*C: more\r\n{MOVE_1}")
        );
    }

    #[test]
    fn test_merge_appends_layers_in_call_order() {
        let x = parse(&format!("*x says\n{MOVE_1}"), "x");
        let y = parse(MOVE_1, "y");
        let z = parse(&format!("*z says\n{MOVE_1}"), "z");

        let merged = x.merge(&y).unwrap().merge(&z).unwrap();
        assert_eq!(merged.names(), vec!["x", "y", "z"]);
        assert_eq!(merged.comments(), vec!["x says", "", "z says"]);

        // inputs are untouched
        assert_eq!(x.names(), vec!["x"]);
        assert_eq!(y.names(), vec!["y"]);
    }

    #[test]
    fn test_merge_is_not_commutative_for_fields() {
        let left = parse("   1 ５六歩(57)   ( 0:11/00:00:11)", "l");
        let right = parse("   1 ５六歩(57)   ( 0:30/00:00:30)", "r");

        let lr = left.merge(&right).unwrap();
        let rl = right.merge(&left).unwrap();
        assert_eq!(lr.elapsed_time(), Some("0:11"));
        assert_eq!(rl.elapsed_time(), Some("0:30"));
        assert_eq!(lr.names(), vec!["l", "r"]);
        assert_eq!(rl.names(), vec!["r", "l"]);
    }

    #[test]
    fn test_merge_rejects_other_positions() {
        let one = parse(MOVE_1, "a");
        let two = parse("   2 ３四歩(33)   ( 0:02/00:00:02)", "b");
        let footer = parse("まで1手で先手の勝ち", "c");

        assert!(matches!(
            one.merge(&two),
            Err(KifuError::MismatchedEntry { .. })
        ));
        assert!(matches!(
            one.merge(&footer),
            Err(KifuError::MismatchedEntry { .. })
        ));
        assert!(footer.merge(&footer).is_ok());
    }

    #[test]
    fn test_note_merges_into_matching_move() {
        let one = parse(MOVE_1, "a");
        let note = MoveEntry::note(1, "coach", "good");
        let merged = one.merge(&note).unwrap();
        assert_eq!(merged.move_text(), Some("５六歩"));
        assert_eq!(merged.comments(), vec!["", "good"]);
        assert!(MoveEntry::note(2, "coach", "x").merge(&one).is_err());
    }

    #[test]
    fn test_render_keeps_trailing_bare_comment_line() {
        let entry = parse(&format!("*a\n*\n{MOVE_1}"), "x");
        assert_eq!(entry.own_comment(), "a\n");
        let format = KifuFormat::default();
        assert_eq!(
            entry.render(RenderMode::OwnCommentOnly, &format),
            format!("*a\r\n*\r\n{MOVE_1}")
        );
        assert_eq!(
            entry.render(RenderMode::AllNamed, &format),
            format!("*x: a\r\n*x: \r\n{MOVE_1}")
        );
    }

    #[test]
    fn test_move_in_footer_slot_keeps_only_comments() {
        let slot = parse(&format!("*late\n{MOVE_1}"), "coach").into_footer_slot();
        assert_eq!(slot.body(), &EntryBody::Note { move_number: 1 });
        assert_eq!(slot.comments(), vec!["late"]);
        assert_eq!(slot.render(RenderMode::NoComments, &KifuFormat::default()), "");
    }

    #[test]
    fn test_footer_slot_note_adopts_footer_text() {
        let note = MoveEntry::note(9, "coach", "gg");
        let footer = parse("まで9手で先手の勝ち", "b");

        let merged = note.merge_footer_slot(&footer).unwrap();
        assert_eq!(merged.footer_text(), Some("まで9手で先手の勝ち"));
        assert_eq!(merged.names(), vec!["coach", "b"]);

        let merged = footer.merge_footer_slot(&note).unwrap();
        assert_eq!(merged.footer_text(), Some("まで9手で先手の勝ち"));
        assert_eq!(merged.names(), vec!["b", "coach"]);

        assert!(matches!(
            parse(MOVE_1, "a").merge_footer_slot(&footer),
            Err(KifuError::MismatchedEntry { .. })
        ));
    }

    #[test]
    fn test_note_renders_comments_only() {
        let note = MoveEntry::note(3, "coach", "line");
        let format = KifuFormat::default();
        assert_eq!(note.render(RenderMode::AllNamed, &format), "*coach: line");
        assert_eq!(note.render(RenderMode::NoComments, &format), "");
    }
}
