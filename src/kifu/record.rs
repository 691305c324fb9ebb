//! A whole kifu record: header block, move list and terminal line.

use chrono::NaiveDateTime;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use super::classify::{Line, LineClassifier};
use super::entry::{DEFAULT_NAME, MoveEntry, RenderMode};
use super::error::KifuError;
use super::format::{HeaderKey, LINE_END};
use super::timestamp::parse_timestamp;

/// Header values lifted out of the `key：value` lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    /// Last `#` line of the header block.
    pub header: Option<String>,
    pub kisen: Option<String>,
    pub teai: Option<String>,
    pub sente: Option<String>,
    pub gote: Option<String>,
    pub started_at: Option<NaiveDateTime>,
}

impl Attributes {
    fn set(&mut self, key: HeaderKey, value: &str) -> Result<(), KifuError> {
        let value = value.trim();
        let slot = match key {
            HeaderKey::StartedAt => {
                self.started_at = Some(parse_timestamp(value)?);
                return Ok(());
            }
            HeaderKey::Kisen => &mut self.kisen,
            HeaderKey::Teai => &mut self.teai,
            HeaderKey::Sente => &mut self.sente,
            HeaderKey::Gote => &mut self.gote,
        };
        *slot = Some(value.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct GameRecord {
    classifier: Arc<LineClassifier>,
    /// Every line before the separator, verbatim.
    header_lines: Vec<String>,
    attributes: Attributes,
    moves: Vec<MoveEntry>,
    footer: Option<MoveEntry>,
    display_name: String,
}

impl GameRecord {
    /// Parses Kakinoki-format text. `name` labels this record's comments when
    /// it is later merged with another transcript.
    pub fn parse(text: &str, name: Option<&str>) -> Result<Self, KifuError> {
        Self::parse_with(LineClassifier::kakinoki(), text, name)
    }

    pub fn parse_with(
        classifier: Arc<LineClassifier>,
        text: &str,
        name: Option<&str>,
    ) -> Result<Self, KifuError> {
        if !classifier.is_valid(text) {
            return Err(KifuError::InvalidRecord);
        }

        let display_name = name.unwrap_or(DEFAULT_NAME).to_string();
        let format = classifier.format();
        let mut header_lines = Vec::new();
        let mut attributes = Attributes::default();
        let mut moves = Vec::new();
        let mut footer = None;
        let mut queue: Vec<&str> = Vec::new();
        let mut in_move_list = false;

        for raw in text.lines() {
            if !in_move_list {
                if classifier.is_separator(raw) {
                    in_move_list = true;
                    continue;
                }

                header_lines.push(raw.to_string());
                if classifier.is_header_marker(raw) {
                    attributes.header = Some(raw.to_string());
                } else if let Some((key, value)) = raw.split_once(format.key_value_colon)
                    && let Some(key) = format.header_key(key)
                {
                    attributes.set(key, value)?;
                }
                continue;
            }

            match classifier.classify(raw) {
                Line::Comment(payload) => queue.push(payload),
                Line::Move(mv) => {
                    moves.push(MoveEntry::from_play(mv.into(), &display_name, queue.join("\n")));
                    queue.clear();
                }
                Line::Footer(text) => {
                    footer = Some(MoveEntry::footer(text, &display_name, queue.join("\n")));
                    queue.clear();
                }
                Line::Unclassified(_) => {}
            }
        }

        Ok(Self {
            classifier,
            header_lines,
            attributes,
            moves,
            footer,
            display_name,
        })
    }

    /// Stores already-built parts without parsing anything.
    pub fn assembled(
        classifier: Arc<LineClassifier>,
        header_lines: Vec<String>,
        attributes: Attributes,
        moves: Vec<MoveEntry>,
        footer: Option<MoveEntry>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            classifier,
            header_lines,
            attributes,
            moves,
            footer,
            display_name: display_name.into(),
        }
    }

    pub fn header_lines(&self) -> &[String] {
        &self.header_lines
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn started_at(&self) -> Option<NaiveDateTime> {
        self.attributes.started_at
    }

    pub fn header(&self) -> Option<&str> {
        self.attributes.header.as_deref()
    }

    pub fn kisen(&self) -> Option<&str> {
        self.attributes.kisen.as_deref()
    }

    pub fn teai(&self) -> Option<&str> {
        self.attributes.teai.as_deref()
    }

    pub fn sente(&self) -> Option<&str> {
        self.attributes.sente.as_deref()
    }

    pub fn gote(&self) -> Option<&str> {
        self.attributes.gote.as_deref()
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn moves(&self) -> &[MoveEntry] {
        &self.moves
    }

    pub fn footer(&self) -> Option<&MoveEntry> {
        self.footer.as_ref()
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Move at zero-based position `index` (move number `index + 1`).
    pub fn at(&self, index: usize) -> Option<&MoveEntry> {
        self.moves.get(index)
    }

    /// Moves in order; the footer is not included.
    pub fn iter(&self) -> std::slice::Iter<'_, MoveEntry> {
        self.moves.iter()
    }

    /// Checks that both records describe the same sequence of moves. A move
    /// written with the same-square marker matches any move text.
    fn check_same(&self, other: &Self) -> Result<(), KifuError> {
        if self.moves.len() != other.moves.len() {
            return Err(KifuError::MoveCountMismatch {
                left: self.moves.len(),
                right: other.moves.len(),
            });
        }

        let format = self.classifier.format();
        for (position, (left, right)) in self.moves.iter().zip(&other.moves).enumerate() {
            let (l, r) = (
                left.move_text().unwrap_or_default(),
                right.move_text().unwrap_or_default(),
            );
            if l != r && !format.is_same_square(l) && !format.is_same_square(r) {
                return Err(KifuError::RecordMismatch {
                    position: position + 1,
                    left: l.to_string(),
                    right: r.to_string(),
                });
            }
        }
        Ok(())
    }

    /// `true` when `other` transcribes the same game. Records of different
    /// length are never the same.
    pub fn same(&self, other: &Self) -> bool {
        self.check_same(other).is_ok()
    }

    /// Same metadata, and per position the same move text and own comment.
    pub fn strict_same(&self, other: &Self) -> bool {
        self.attributes == other.attributes
            && self.moves.len() == other.moves.len()
            && self
                .moves
                .iter()
                .zip(&other.moves)
                .all(|(l, r)| l.move_text() == r.move_text() && l.own_comment() == r.own_comment())
    }

    /// Combines two transcripts of one game. Metadata and move fields come from
    /// `self`; every position carries both sides' comment layers. A footer is
    /// kept only when both records have one.
    pub fn merge(&self, other: &Self) -> Result<Self, KifuError> {
        self.check_same(other)?;

        let moves = self
            .moves
            .iter()
            .zip(&other.moves)
            .map(|(l, r)| l.merge(r))
            .collect::<Result<Vec<_>, _>>()?;

        let footer = match (&self.footer, &other.footer) {
            (Some(l), Some(r)) => Some(l.merge_footer_slot(r)?),
            _ => None,
        };

        Ok(Self::assembled(
            Arc::clone(&self.classifier),
            self.header_lines.clone(),
            self.attributes.clone(),
            moves,
            footer,
            self.display_name.clone(),
        ))
    }

    /// Folds a single out-of-band comment into this record in place.
    ///
    /// The entry's move number is used as a zero-based slot: `n < len`
    /// annotates `moves[n]`, `n == len` annotates the footer, anything larger
    /// is rejected. Entries without a move number (footers) always go to the
    /// footer slot. When there is no footer the entry fills the slot; a move
    /// entry contributes only its comments there.
    pub fn merge_comment(&mut self, entry: MoveEntry) -> Result<(), KifuError> {
        let len = self.moves.len();
        let slot = entry.move_number().map_or(len, |n| n as usize);

        if slot > len {
            return Err(KifuError::ExpiredEntry {
                move_number: entry.move_number().unwrap_or_default(),
                move_count: len,
            });
        }

        if slot == len {
            self.footer = Some(match self.footer.take() {
                Some(footer) => footer.layered_with(&entry),
                None => entry.into_footer_slot(),
            });
        } else {
            self.moves[slot] = self.moves[slot].layered_with(&entry);
        }
        Ok(())
    }

    /// Copy of this record with `entry` folded in; `self` is left untouched.
    pub fn with_comment(&self, entry: MoveEntry) -> Result<Self, KifuError> {
        let mut working = self.clone();
        working.merge_comment(entry)?;
        Ok(working)
    }

    fn render_as(&self, mode: RenderMode) -> String {
        let format = self.classifier.format();
        let mut lines: Vec<String> = self.header_lines.clone();
        lines.push(format.separator.clone());
        lines.extend(
            self.moves
                .iter()
                .chain(self.footer.as_ref())
                .map(|entry| entry.render(mode, format))
                .filter(|rendered| !rendered.is_empty()),
        );

        let mut out = lines.join(LINE_END);
        out.push_str(LINE_END);
        out
    }

    /// Header, separator, bare move lines and the terminal line, CRLF-terminated.
    pub fn render(&self) -> String {
        self.render_as(RenderMode::NoComments)
    }

    /// Like [`render`](Self::render) but keeps this record's own comments, so an
    /// annotated record round-trips.
    pub fn render_with_comments(&self) -> String {
        self.render_as(RenderMode::OwnCommentOnly)
    }

    /// Every contributor's comments, each line labelled with its author.
    pub fn render_with_names(&self) -> String {
        self.render_as(RenderMode::AllNamed)
    }
}

impl fmt::Display for GameRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl Index<usize> for GameRecord {
    type Output = MoveEntry;

    fn index(&self, index: usize) -> &Self::Output {
        &self.moves[index]
    }
}

impl<'a> IntoIterator for &'a GameRecord {
    type Item = &'a MoveEntry;
    type IntoIter = std::slice::Iter<'a, MoveEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.moves.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SANDMARK: &str = include_str!("../../test/kif/sandmark.kif");
    const PLAYER_A: &str = include_str!("../../test/kif/player_a.kif");
    const PLAYER_B: &str = include_str!("../../test/kif/player_b.kif");
    const INVALID: &str = include_str!("../../test/kif/invalid.kif");

    fn crlf(text: &str) -> String {
        text.lines().map(|line| format!("{line}\r\n")).collect()
    }

    fn sandmark() -> GameRecord {
        GameRecord::parse(SANDMARK, Some("sandmark")).unwrap()
    }

    #[test]
    fn test_parse_header_attributes() {
        let record = sandmark();
        assert_eq!(
            record.header(),
            Some("# ---- Kifu for Windows V6.26 棋譜ファイル ----")
        );
        assert_eq!(record.kisen(), Some("第１回サンドマーク杯"));
        assert_eq!(record.teai(), Some("平手"));
        assert_eq!(record.sente(), Some("先手太郎"));
        assert_eq!(record.gote(), Some("後手次郎"));
        assert_eq!(
            record.started_at(),
            NaiveDate::from_ymd_opt(2008, 3, 15).and_then(|d| d.and_hms_opt(10, 0, 0))
        );
        assert_eq!(record.display_name(), "sandmark");
        // unknown keys stay in the header block only
        assert_eq!(record.header_lines().len(), 7);
        assert_eq!(record.header_lines()[6], "場所：道場");
    }

    #[test]
    fn test_parse_moves_and_footer() {
        let record = sandmark();
        assert_eq!(record.len(), 9);
        assert_eq!(record[0].move_text(), Some("７六歩"));
        assert_eq!(record[3].move_text(), Some("同　銀"));
        assert_eq!(record.at(8).and_then(MoveEntry::move_text), Some("投了"));
        assert!(record.at(9).is_none());
        for (i, entry) in record.iter().enumerate() {
            assert_eq!(entry.move_number(), Some(i as u32 + 1));
            assert_eq!(entry.names(), vec!["sandmark"]);
        }

        let footer = record.footer().unwrap();
        assert!(footer.is_footer());
        assert_eq!(footer.footer_text(), Some("まで8手で後手の勝ち"));
    }

    #[test]
    fn test_iteration_is_restartable_and_excludes_footer() {
        let record = sandmark();
        let first: Vec<_> = record.iter().filter_map(MoveEntry::move_text).collect();
        let second: Vec<_> = (&record).into_iter().filter_map(MoveEntry::move_text).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 9);
        assert!(record.iter().all(|e| !e.is_footer()));
    }

    #[test]
    fn test_render_round_trips_byte_exact() {
        let text = crlf(SANDMARK);
        assert_eq!(GameRecord::parse(&text, None).unwrap().render(), text);
    }

    #[test]
    fn test_render_normalizes_line_endings() {
        let record = GameRecord::parse(SANDMARK, None).unwrap();
        let rendered = record.render();
        assert_eq!(rendered, crlf(SANDMARK));
        assert!(rendered.ends_with("勝ち\r\n"));
        assert!(!rendered.ends_with("\r\n\r\n"));
        assert_eq!(record.to_string(), rendered);
    }

    #[test]
    fn test_render_with_comments_round_trips_annotated_record() {
        let text = crlf(PLAYER_A);
        let record = GameRecord::parse(&text, Some("A")).unwrap();
        assert_eq!(record[0].own_comment(), "よろしくお願いします\n角道を開ける");
        assert_eq!(record.render_with_comments(), text);
        assert!(!record.render().contains("*よろしく"));
    }

    #[test]
    fn test_invalid_record_is_rejected() {
        assert!(!crate::kifu::is_valid(INVALID));
        assert!(matches!(
            GameRecord::parse(INVALID, None),
            Err(KifuError::InvalidRecord)
        ));
    }

    #[test]
    fn test_bad_start_time_is_propagated() {
        let text = SANDMARK.replace("2008/03/15 10:00:00", "そのうち");
        assert!(matches!(
            GameRecord::parse(&text, None),
            Err(KifuError::TimestampFormat { .. })
        ));
    }

    #[test]
    fn test_noise_in_move_list_is_skipped() {
        let text = SANDMARK.replace(
            "   2 ３四歩(33)",
            "\n変化：2手\n   2 ３四歩(33)",
        );
        let record = GameRecord::parse(&text, None).unwrap();
        assert_eq!(record.len(), 9);
        assert_eq!(record[1].move_text(), Some("３四歩"));
    }

    #[test]
    fn test_variation_marked_moves_are_kept() {
        let text = SANDMARK.replace("( 0:03/00:00:04)", "( 0:03/00:00:04)+");
        let record = GameRecord::parse(&text, None).unwrap();
        let numbers: Vec<_> = record.iter().filter_map(MoveEntry::move_number).collect();
        assert_eq!(numbers, (1..=9).collect::<Vec<u32>>());
        assert_eq!(record[2].move_text(), Some("２二角成"));
        assert!(record.same(&sandmark()));
        assert_eq!(record.render(), crlf(SANDMARK));
    }

    #[test]
    fn test_same_tolerates_same_square_marker() {
        let a = GameRecord::parse(PLAYER_A, Some("A")).unwrap();
        let b = GameRecord::parse(PLAYER_B, Some("B")).unwrap();
        assert_eq!(a[3].move_text(), Some("同　銀"));
        assert_eq!(b[3].move_text(), Some("２二銀"));
        assert!(a.same(&b));
        assert!(b.same(&a));
    }

    #[test]
    fn test_same_rejects_different_moves() {
        let a = sandmark();
        let b = GameRecord::parse(&SANDMARK.replace("３四歩(33)", "８四歩(83)"), None).unwrap();
        assert!(!a.same(&b));
        assert!(matches!(
            a.merge(&b),
            Err(KifuError::RecordMismatch { position: 2, .. })
        ));
    }

    #[test]
    fn test_same_with_unequal_lengths_is_false() {
        let a = sandmark();
        let truncated = SANDMARK.replace("   9 投了         ( 0:30/00:00:46)\n", "");
        let b = GameRecord::parse(&truncated, None).unwrap();
        assert_eq!(b.len(), 8);
        assert!(!a.same(&b));
        assert!(!b.same(&a));
        assert!(matches!(
            a.merge(&b),
            Err(KifuError::MoveCountMismatch { left: 9, right: 8 })
        ));
    }

    #[test]
    fn test_strict_same() {
        let a = GameRecord::parse(PLAYER_A, Some("A")).unwrap();
        let a_again = GameRecord::parse(PLAYER_A, Some("other name")).unwrap();
        let b = GameRecord::parse(PLAYER_B, Some("B")).unwrap();
        assert!(a.strict_same(&a_again));
        assert!(!a.strict_same(&b));

        let renamed = GameRecord::parse(&PLAYER_A.replace("後手次郎", "後手三郎"), None).unwrap();
        assert!(a.same(&renamed));
        assert!(!a.strict_same(&renamed));
    }

    #[test]
    fn test_merge_two_transcripts() {
        let a = GameRecord::parse(PLAYER_A, Some("将棋指しＡ")).unwrap();
        let b = GameRecord::parse(PLAYER_B, Some("将棋指しＢ")).unwrap();
        let merged = a.merge(&b).unwrap();

        assert_eq!(merged.len(), 9);
        assert_eq!(merged.display_name(), "将棋指しＡ");
        assert_eq!(merged.header_lines(), a.header_lines());
        assert_eq!(merged[0].names(), vec!["将棋指しＡ", "将棋指しＢ"]);
        assert_eq!(
            merged[0].comments(),
            vec!["よろしくお願いします\n角道を開ける", "初手は７六歩で"]
        );
        assert_eq!(merged[3].move_text(), Some("同　銀"));
        assert_eq!(merged[5].comments(), vec!["", ""]);
        assert_eq!(merged.footer().unwrap().names().len(), 2);

        // inputs are unchanged
        assert_eq!(a[0].names(), vec!["将棋指しＡ"]);
        assert_eq!(b[0].names(), vec!["将棋指しＢ"]);
    }

    #[test]
    fn test_merged_render_with_names() {
        let a = GameRecord::parse(PLAYER_A, Some("将棋指しＡ")).unwrap();
        let b = GameRecord::parse(PLAYER_B, Some("将棋指しＢ")).unwrap();
        let named = a.merge(&b).unwrap().render_with_names();

        let expected_head = "手数----指手---------消費時間--\r\n\
            *将棋指しＡ: よろしくお願いします\r\n\
            *将棋指しＡ: 角道を開ける\r\n\
            *将棋指しＢ: 初手は７六歩で\r\n   1 ７六歩(77)   ( 0:01/00:00:01)\r\n";
        assert!(named.contains(expected_head));
        assert!(named.ends_with("まで8手で後手の勝ち\r\n"));
    }

    #[test]
    fn test_merged_plain_render_matches_left_fields() {
        let a = GameRecord::parse(PLAYER_A, Some("A")).unwrap();
        let b = GameRecord::parse(PLAYER_B, Some("B")).unwrap();
        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.render(), a.render());
    }

    #[test]
    fn test_merge_drops_one_sided_footer() {
        let a = sandmark();
        let b = GameRecord::parse(&SANDMARK.replace("まで8手で後手の勝ち\n", ""), None).unwrap();
        assert!(b.footer().is_none());
        assert!(a.merge(&b).unwrap().footer().is_none());
        assert!(b.merge(&a).unwrap().footer().is_none());
    }

    #[test]
    fn test_merge_comment_addresses_moves_by_zero_based_slot() {
        let mut record = sandmark();
        record
            .merge_comment(MoveEntry::note(0, "coach", "first move"))
            .unwrap();
        record
            .merge_comment(MoveEntry::note(4, "coach", "drop"))
            .unwrap();

        assert_eq!(record[0].comments(), vec!["", "first move"]);
        assert_eq!(record[0].move_text(), Some("７六歩"));
        assert_eq!(record[4].comments(), vec!["", "drop"]);
        assert_eq!(record[4].move_number(), Some(5));
    }

    #[test]
    fn test_merge_comment_at_len_targets_footer() {
        let mut record = sandmark();
        let n = record.len() as u32;
        record.merge_comment(MoveEntry::note(n, "coach", "gg")).unwrap();

        let footer = record.footer().unwrap();
        assert!(footer.is_footer());
        assert_eq!(footer.names(), vec!["sandmark", "coach"]);
        assert_eq!(footer.comments(), vec!["", "gg"]);
    }

    #[test]
    fn test_merge_comment_creates_missing_footer() {
        let mut record =
            GameRecord::parse(&SANDMARK.replace("まで8手で後手の勝ち\n", ""), None).unwrap();
        record.merge_comment(MoveEntry::note(9, "coach", "unfinished")).unwrap();

        assert_eq!(record.footer().unwrap().comments(), vec!["unfinished"]);
        assert!(record.render_with_names().ends_with("*coach: unfinished\r\n"));
    }

    #[test]
    fn test_merge_comment_move_into_missing_footer() {
        let text = SANDMARK.replace("まで8手で後手の勝ち\n", "");
        let mut record = GameRecord::parse(&text, None).unwrap();
        let play = record[8].play().cloned().unwrap();
        record
            .merge_comment(MoveEntry::from_play(play, "coach", "late"))
            .unwrap();

        let footer = record.footer().unwrap();
        assert_eq!(footer.move_text(), None);
        assert_eq!(footer.play(), None);
        assert_eq!(footer.comments(), vec!["late"]);
        assert_eq!(record.render(), crlf(&text));
        assert_eq!(record.render().matches("投了").count(), 1);
    }

    #[test]
    fn test_merge_after_comment_fills_missing_footer() {
        let text = SANDMARK.replace("まで8手で後手の勝ち\n", "");
        let mut record = GameRecord::parse(&text, Some("a")).unwrap();
        record.merge_comment(MoveEntry::note(9, "coach", "gg")).unwrap();

        let other = sandmark();
        assert!(record.same(&other));
        let merged = record.merge(&other).unwrap();
        let footer = merged.footer().unwrap();
        assert!(footer.is_footer());
        assert_eq!(footer.footer_text(), Some("まで8手で後手の勝ち"));
        assert_eq!(footer.names(), vec!["coach", "sandmark"]);
        assert!(merged.render_with_names().ends_with("*coach: gg\r\nまで8手で後手の勝ち\r\n"));

        let merged = other.merge(&record).unwrap();
        assert_eq!(
            merged.footer().and_then(MoveEntry::footer_text),
            Some("まで8手で後手の勝ち")
        );
    }

    #[test]
    fn test_merge_comment_past_footer_is_expired() {
        let mut record = sandmark();
        let n = record.len() as u32 + 1;
        assert!(matches!(
            record.merge_comment(MoveEntry::note(n, "coach", "late")),
            Err(KifuError::ExpiredEntry {
                move_number: 10,
                move_count: 9
            })
        ));
    }

    #[test]
    fn test_with_comment_leaves_original_untouched() {
        let record = sandmark();
        let annotated = record
            .with_comment(MoveEntry::note(2, "coach", "sharp"))
            .unwrap();
        assert_eq!(record[2].annotations().len(), 1);
        assert_eq!(annotated[2].comments(), vec!["", "sharp"]);
    }
}
