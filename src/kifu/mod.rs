pub mod classify;
pub mod encoding;
pub mod entry;
pub mod error;
pub mod format;
pub mod json;
pub mod record;
pub mod timestamp;

mod duckdb_impl;
mod log;
mod reader;
mod scalars;

pub use classify::{LineClassifier, is_valid};
pub use encoding::decode_to_canonical;
pub use entry::{Annotation, EntryBody, MoveEntry, Play, RenderMode};
pub use error::{ErrorAccumulator, KifuError};
pub use format::KifuFormat;
pub use record::{Attributes, GameRecord};
pub use timestamp::parse_timestamp;

use duckdb::{Connection, Result};
use duckdb_ext_macros::duckdb_extension;
use reader::ReadKifVTab;
use scalars::{
    KifuJsonScalar, KifuMergeScalar, KifuNormalizeScalar, KifuSameScalar, KifuValidScalar,
};
use std::error::Error;

#[duckdb_extension(name = "duckdb_kifu", api_version = "v1.0.0")]
pub unsafe fn extension_entrypoint(con: Connection) -> Result<(), Box<dyn Error>> {
    // Table functions
    con.register_table_function::<ReadKifVTab>("read_kif")?;

    // Scalar functions
    con.register_scalar_function::<KifuValidScalar>("kifu_valid")?;
    con.register_scalar_function::<KifuNormalizeScalar>("kifu_normalize")?;
    con.register_scalar_function::<KifuSameScalar>("kifu_same")?;
    con.register_scalar_function::<KifuMergeScalar>("kifu_merge")?;
    con.register_scalar_function::<KifuJsonScalar>("kifu_json")?;

    Ok(())
}
