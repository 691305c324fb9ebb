pub mod kifu;

pub use kifu::{
    Annotation, GameRecord, KifuError, KifuFormat, LineClassifier, MoveEntry, RenderMode,
    decode_to_canonical, is_valid, parse_timestamp,
};
