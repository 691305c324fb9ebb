use thiserror::Error;

/// Failures raised by the record engine. None of them are recovered internally.
#[derive(Debug, Error)]
pub enum KifuError {
    #[error("not a kifu record: move-list separator line is missing")]
    InvalidRecord,

    #[error("records differ at move {position}: '{left}' vs '{right}'")]
    RecordMismatch {
        position: usize,
        left: String,
        right: String,
    },

    #[error("records have different move counts ({left} vs {right})")]
    MoveCountMismatch { left: usize, right: usize },

    #[error("entries address different positions: {left} vs {right}")]
    MismatchedEntry { left: String, right: String },

    #[error("comment for move {move_number} is past the end of a {move_count}-move record")]
    ExpiredEntry { move_number: u32, move_count: usize },

    #[error("record is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("unparseable start time '{raw}' (chrono: {source})")]
    TimestampFormat {
        raw: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("invalid line pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Collects per-row problems into one `; `-separated message.
#[derive(Debug, Clone, Default)]
pub struct ErrorAccumulator(Option<String>);

impl ErrorAccumulator {
    pub fn push(&mut self, msg: &str) {
        match &mut self.0 {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(msg);
            }
            None => {
                self.0 = Some(msg.to_string());
            }
        }
    }

    pub fn take(&mut self) -> Option<String> {
        self.0.take()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}
