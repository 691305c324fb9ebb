use super::{
    ErrorAccumulator,
    duckdb_impl::bind_info_ffi::get_named_parameter_varchar,
    encoding::decode_to_canonical,
    json::moves_to_json,
    log,
    record::GameRecord,
};
use duckdb::{
    core::{DataChunkHandle, Inserter, LogicalTypeHandle, LogicalTypeId},
    vtab::{BindInfo, InitInfo, TableFunctionInfo, VTab},
};
use libduckdb_sys::duckdb_timestamp;
use std::borrow::Cow;
use std::ffi::CString;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use zstd::stream::read::Decoder as ZstdDecoder;

#[repr(C)]
pub struct ReadKifBindData {
    paths: Vec<PathBuf>,
    compression: CompressionMode,
    name: Option<String>,
}

#[repr(C)]
pub struct ReadKifInitData {
    state: Mutex<SharedState>,
}

struct SharedState {
    next_path_idx: usize,
}

pub struct ReadKifVTab;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CompressionMode {
    Plain,
    Zstd,
}

const PATH_PATTERN_PARAM_INDEX: u64 = 0;
const ROWS_PER_CHUNK: usize = 2048;
const READ_KIF_COLUMN_COUNT: usize = 12;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ReadKifColumn {
    Source = 0,
    Header = 1,
    Kisen = 2,
    Teai = 3,
    Sente = 4,
    Gote = 5,
    StartedAt = 6,
    MoveCount = 7,
    Footer = 8,
    Moves = 9,
    Kifu = 10,
    ParseError = 11,
}

impl ReadKifColumn {
    const fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        READ_KIF_COLUMNS[self.index()].name
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ReadKifLogicalType {
    Varchar,
    UInteger,
    Timestamp,
}

impl ReadKifLogicalType {
    fn to_handle(self) -> LogicalTypeHandle {
        match self {
            Self::Varchar => LogicalTypeHandle::from(LogicalTypeId::Varchar),
            Self::UInteger => LogicalTypeHandle::from(LogicalTypeId::UInteger),
            Self::Timestamp => LogicalTypeHandle::from(LogicalTypeId::Timestamp),
        }
    }
}

struct ReadKifColumnDef {
    name: &'static str,
    logical_type: ReadKifLogicalType,
}

const READ_KIF_COLUMNS: [ReadKifColumnDef; READ_KIF_COLUMN_COUNT] = [
    ReadKifColumnDef {
        name: "source",
        logical_type: ReadKifLogicalType::Varchar,
    },
    ReadKifColumnDef {
        name: "header",
        logical_type: ReadKifLogicalType::Varchar,
    },
    ReadKifColumnDef {
        name: "kisen",
        logical_type: ReadKifLogicalType::Varchar,
    },
    ReadKifColumnDef {
        name: "teai",
        logical_type: ReadKifLogicalType::Varchar,
    },
    ReadKifColumnDef {
        name: "sente",
        logical_type: ReadKifLogicalType::Varchar,
    },
    ReadKifColumnDef {
        name: "gote",
        logical_type: ReadKifLogicalType::Varchar,
    },
    ReadKifColumnDef {
        name: "started_at",
        logical_type: ReadKifLogicalType::Timestamp,
    },
    ReadKifColumnDef {
        name: "move_count",
        logical_type: ReadKifLogicalType::UInteger,
    },
    ReadKifColumnDef {
        name: "footer",
        logical_type: ReadKifLogicalType::Varchar,
    },
    ReadKifColumnDef {
        name: "moves",
        logical_type: ReadKifLogicalType::Varchar,
    },
    ReadKifColumnDef {
        name: "kifu",
        logical_type: ReadKifLogicalType::Varchar,
    },
    ReadKifColumnDef {
        name: "parse_error",
        logical_type: ReadKifLogicalType::Varchar,
    },
];

impl CompressionMode {
    fn parse(raw: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let normalized = raw.trim();
        if normalized.eq_ignore_ascii_case("zstd") {
            Ok(Self::Zstd)
        } else {
            Err(format!(
                "Invalid compression value '{}'. Supported values: 'zstd' or NULL/omitted.",
                normalized
            )
            .into())
        }
    }
}

fn resolve_compression_mode(
    bind: &BindInfo,
) -> Result<CompressionMode, Box<dyn std::error::Error>> {
    match get_named_parameter_varchar(bind, "compression")?.into_value() {
        Some(raw) => CompressionMode::parse(&raw),
        None => Ok(CompressionMode::Plain),
    }
}

fn expand_paths(pattern: &str) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    if pattern.contains('*') || pattern.contains('?') {
        let mut paths: Vec<PathBuf> = glob::glob(pattern)?
            .filter_map(|entry| entry.ok())
            .collect();
        paths.sort();
        Ok(paths)
    } else {
        Ok(vec![PathBuf::from(pattern)])
    }
}

/// Display name for a record: the `name` parameter, else the file stem.
fn display_name_for(path: &Path, name: Option<&str>) -> String {
    match name {
        Some(name) => name.to_string(),
        None => path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
    }
}

fn read_input_bytes(path: &Path, compression: CompressionMode) -> Result<Vec<u8>, String> {
    let file =
        File::open(path).map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;

    let mut bytes = Vec::new();
    let result = match compression {
        CompressionMode::Plain => (&file).read_to_end(&mut bytes),
        CompressionMode::Zstd => ZstdDecoder::new(file)
            .and_then(|mut decoder| decoder.read_to_end(&mut bytes)),
    };
    result.map_err(|e| format!("Failed to read file '{}': {}", path.display(), e))?;
    Ok(bytes)
}

fn parse_bytes(bytes: &[u8], name: &str) -> Result<GameRecord, String> {
    let text = decode_to_canonical(bytes).map_err(|e| e.to_string())?;
    GameRecord::parse(&text, Some(name)).map_err(|e| e.to_string())
}

fn sanitize_for_cstring<'a>(
    value: &'a str,
    field_name: &str,
    parse_error: &mut ErrorAccumulator,
) -> Cow<'a, str> {
    if value.contains('\0') {
        parse_error.push(&format!("Sanitized interior NUL in {}", field_name));
        Cow::Owned(value.replace('\0', " "))
    } else {
        Cow::Borrowed(value)
    }
}

fn to_duckdb_timestamp(ts: chrono::NaiveDateTime) -> duckdb_timestamp {
    duckdb_timestamp {
        micros: ts.and_utc().timestamp_micros(),
    }
}

struct KifRow {
    source: String,
    record: Result<GameRecord, String>,
}

struct ChunkWriter<'a> {
    output: &'a mut DataChunkHandle,
    row_count: usize,
}

impl<'a> ChunkWriter<'a> {
    fn new(output: &'a mut DataChunkHandle) -> Self {
        Self {
            output,
            row_count: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.row_count >= ROWS_PER_CHUNK
    }

    fn write_row(&mut self, row: &KifRow) -> Result<(), Box<dyn std::error::Error>> {
        let row_idx = self.row_count;
        let mut row_parse_error = ErrorAccumulator::default();

        self.write_optional_varchar(
            ReadKifColumn::Source,
            row_idx,
            Some(row.source.as_str()),
            &mut row_parse_error,
        )?;

        match &row.record {
            Ok(record) => {
                let footer = record.footer().and_then(|f| f.footer_text());
                let moves = moves_to_json(record);
                let kifu = record.render_with_comments();

                self.write_optional_varchar(
                    ReadKifColumn::Header,
                    row_idx,
                    record.header(),
                    &mut row_parse_error,
                )?;
                self.write_optional_varchar(
                    ReadKifColumn::Kisen,
                    row_idx,
                    record.kisen(),
                    &mut row_parse_error,
                )?;
                self.write_optional_varchar(
                    ReadKifColumn::Teai,
                    row_idx,
                    record.teai(),
                    &mut row_parse_error,
                )?;
                self.write_optional_varchar(
                    ReadKifColumn::Sente,
                    row_idx,
                    record.sente(),
                    &mut row_parse_error,
                )?;
                self.write_optional_varchar(
                    ReadKifColumn::Gote,
                    row_idx,
                    record.gote(),
                    &mut row_parse_error,
                )?;
                self.write_optional_timestamp(
                    ReadKifColumn::StartedAt,
                    row_idx,
                    record.started_at().map(to_duckdb_timestamp),
                );
                self.write_optional_uinteger(
                    ReadKifColumn::MoveCount,
                    row_idx,
                    u32::try_from(record.len()).ok(),
                );
                self.write_optional_varchar(
                    ReadKifColumn::Footer,
                    row_idx,
                    footer,
                    &mut row_parse_error,
                )?;
                self.write_optional_varchar(
                    ReadKifColumn::Moves,
                    row_idx,
                    Some(moves.as_str()),
                    &mut row_parse_error,
                )?;
                self.write_optional_varchar(
                    ReadKifColumn::Kifu,
                    row_idx,
                    Some(kifu.as_str()),
                    &mut row_parse_error,
                )?;
            }
            Err(message) => {
                for column in [
                    ReadKifColumn::Header,
                    ReadKifColumn::Kisen,
                    ReadKifColumn::Teai,
                    ReadKifColumn::Sente,
                    ReadKifColumn::Gote,
                    ReadKifColumn::StartedAt,
                    ReadKifColumn::MoveCount,
                    ReadKifColumn::Footer,
                    ReadKifColumn::Moves,
                    ReadKifColumn::Kifu,
                ] {
                    self.output.flat_vector(column.index()).set_null(row_idx);
                }
                row_parse_error.push(message);
            }
        }

        let mut parse_error_vec = self.output.flat_vector(ReadKifColumn::ParseError.index());
        match row_parse_error.take() {
            None => parse_error_vec.set_null(row_idx),
            Some(parse_error) => {
                parse_error_vec.insert(row_idx, CString::new(parse_error.replace('\0', " "))?)
            }
        }

        self.row_count += 1;
        Ok(())
    }

    fn set_output_len(&mut self) {
        self.output.set_len(self.row_count);
    }

    fn write_optional_varchar(
        &mut self,
        column: ReadKifColumn,
        row_idx: usize,
        value: Option<&str>,
        parse_error: &mut ErrorAccumulator,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut vector = self.output.flat_vector(column.index());
        if let Some(value) = value {
            let sanitized = sanitize_for_cstring(value, column.name(), parse_error);
            vector.insert(row_idx, CString::new(sanitized.as_ref())?);
        } else {
            vector.set_null(row_idx);
        }
        Ok(())
    }

    fn write_optional_uinteger(
        &mut self,
        column: ReadKifColumn,
        row_idx: usize,
        value: Option<u32>,
    ) {
        let mut vector = self.output.flat_vector(column.index());
        if let Some(value) = value {
            vector.as_mut_slice::<u32>()[row_idx] = value;
        } else {
            vector.set_null(row_idx);
        }
    }

    fn write_optional_timestamp(
        &mut self,
        column: ReadKifColumn,
        row_idx: usize,
        value: Option<duckdb_timestamp>,
    ) {
        let mut vector = self.output.flat_vector(column.index());
        if let Some(value) = value {
            vector.as_mut_slice::<duckdb_timestamp>()[row_idx] = value;
        } else {
            vector.set_null(row_idx);
        }
    }
}

/// Claims the next path and loads it. Open/read failures are fatal for a
/// single path and skipped with a warning for globs.
fn next_row(
    init_data: &ReadKifInitData,
    bind_data: &ReadKifBindData,
) -> Result<Option<KifRow>, Box<dyn std::error::Error>> {
    loop {
        let path_idx = {
            let mut state = init_data
                .state
                .lock()
                .map_err(|_| "read_kif: shared state lock poisoned")?;
            if state.next_path_idx >= bind_data.paths.len() {
                return Ok(None);
            }
            let path_idx = state.next_path_idx;
            state.next_path_idx += 1;
            path_idx
        };

        let path = &bind_data.paths[path_idx];
        let bytes = match read_input_bytes(path, bind_data.compression) {
            Ok(bytes) => bytes,
            Err(err_msg) => {
                if bind_data.paths.len() == 1 {
                    log::error(&err_msg);
                    return Err(err_msg.into());
                }
                log::warn(&err_msg);
                continue;
            }
        };

        let name = display_name_for(path, bind_data.name.as_deref());
        let record = parse_bytes(&bytes, &name).map_err(|e| {
            let message = format!("Failed to parse '{}': {}", path.display(), e);
            log::warn(&message);
            message
        });

        return Ok(Some(KifRow {
            source: path.display().to_string(),
            record,
        }));
    }
}

impl VTab for ReadKifVTab {
    type InitData = ReadKifInitData;
    type BindData = ReadKifBindData;

    fn bind(bind: &BindInfo) -> Result<Self::BindData, Box<dyn std::error::Error>> {
        let pattern = bind.get_parameter(PATH_PATTERN_PARAM_INDEX).to_string();
        let compression = resolve_compression_mode(bind)?;
        let name = get_named_parameter_varchar(bind, "name")?.into_value();
        let paths = expand_paths(&pattern)?;

        for column in READ_KIF_COLUMNS.iter() {
            bind.add_result_column(column.name, column.logical_type.to_handle());
        }

        Ok(ReadKifBindData {
            paths,
            compression,
            name,
        })
    }

    fn init(_: &InitInfo) -> Result<Self::InitData, Box<dyn std::error::Error>> {
        Ok(ReadKifInitData {
            state: Mutex::new(SharedState { next_path_idx: 0 }),
        })
    }

    fn func(
        func: &TableFunctionInfo<Self>,
        output: &mut DataChunkHandle,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let init_data = func.get_init_data();
        let bind_data = func.get_bind_data();
        let mut chunk_writer = ChunkWriter::new(output);

        while !chunk_writer.is_full() {
            match next_row(init_data, bind_data)? {
                Some(row) => chunk_writer.write_row(&row)?,
                None => break,
            }
        }

        chunk_writer.set_output_len();
        Ok(())
    }

    fn parameters() -> Option<Vec<LogicalTypeHandle>> {
        Some(vec![
            LogicalTypeHandle::from(LogicalTypeId::Varchar), // path pattern (required)
        ])
    }

    fn named_parameters() -> Option<Vec<(String, LogicalTypeHandle)>> {
        Some(vec![
            (
                "compression".to_string(),
                LogicalTypeHandle::from(LogicalTypeId::Varchar),
            ),
            (
                "name".to_string(),
                LogicalTypeHandle::from(LogicalTypeId::Varchar),
            ),
        ])
    }
}
