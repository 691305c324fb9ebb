use duckdb::{
    Result,
    core::{DataChunkHandle, LogicalTypeHandle, LogicalTypeId},
    vscalar::{ScalarFunctionSignature, VScalar},
    vtab::arrow::WritableVector,
};
use std::error::Error;

use super::classify::is_valid;
use super::duckdb_impl::scalar::{
    VarcharOutput, invoke_binary_varchar_varchar_to_bool_nullable,
    invoke_unary_varchar_to_bool_nullable, invoke_unary_varchar_to_varchar,
    invoke_varchar_columns_to_varchar,
};
use super::error::KifuError;
use super::json::record_to_json;
use super::log;
use super::record::GameRecord;

fn varchar() -> LogicalTypeHandle {
    LogicalTypeHandle::from(LogicalTypeId::Varchar)
}

fn boolean() -> LogicalTypeHandle {
    LogicalTypeHandle::from(LogicalTypeId::Boolean)
}

fn parsed_or_null<F>(text: &str, function: &str, f: F) -> VarcharOutput
where
    F: FnOnce(GameRecord) -> String,
{
    match GameRecord::parse(text, None) {
        Ok(record) => VarcharOutput::Value(f(record)),
        Err(e) => {
            log::warn(format!("{function}: {e}"));
            VarcharOutput::Null
        }
    }
}

pub(crate) fn same_records(left: &str, right: &str) -> bool {
    match (GameRecord::parse(left, None), GameRecord::parse(right, None)) {
        (Ok(left), Ok(right)) => left.same(&right),
        _ => false,
    }
}

pub(crate) fn merge_records(
    left: &str,
    right: &str,
    left_name: Option<&str>,
    right_name: Option<&str>,
) -> Result<String, KifuError> {
    let left = GameRecord::parse(left, left_name)?;
    let right = GameRecord::parse(right, right_name)?;
    Ok(left.merge(&right)?.render_with_names())
}

pub struct KifuValidScalar;

impl VScalar for KifuValidScalar {
    type State = ();

    unsafe fn invoke(
        _state: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn Error>> {
        invoke_unary_varchar_to_bool_nullable(input, output, is_valid)
    }

    fn signatures() -> Vec<ScalarFunctionSignature> {
        vec![ScalarFunctionSignature::exact(vec![varchar()], boolean())]
    }
}

pub struct KifuNormalizeScalar;

impl VScalar for KifuNormalizeScalar {
    type State = ();

    unsafe fn invoke(
        _state: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn Error>> {
        invoke_unary_varchar_to_varchar(input, output, |text| {
            Ok(parsed_or_null(text, "kifu_normalize", |record| {
                record.render()
            }))
        })
    }

    fn signatures() -> Vec<ScalarFunctionSignature> {
        vec![ScalarFunctionSignature::exact(vec![varchar()], varchar())]
    }
}

pub struct KifuJsonScalar;

impl VScalar for KifuJsonScalar {
    type State = ();

    unsafe fn invoke(
        _state: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn Error>> {
        invoke_unary_varchar_to_varchar(input, output, |text| {
            Ok(parsed_or_null(text, "kifu_json", |record| {
                record_to_json(&record)
            }))
        })
    }

    fn signatures() -> Vec<ScalarFunctionSignature> {
        vec![ScalarFunctionSignature::exact(vec![varchar()], varchar())]
    }
}

pub struct KifuSameScalar;

impl VScalar for KifuSameScalar {
    type State = ();

    unsafe fn invoke(
        _state: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn Error>> {
        invoke_binary_varchar_varchar_to_bool_nullable(input, output, same_records)
    }

    fn signatures() -> Vec<ScalarFunctionSignature> {
        vec![ScalarFunctionSignature::exact(
            vec![varchar(), varchar()],
            boolean(),
        )]
    }
}

/// `kifu_merge(left, right [, left_name, right_name])`
pub struct KifuMergeScalar;

impl VScalar for KifuMergeScalar {
    type State = ();

    unsafe fn invoke(
        _state: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn Error>> {
        invoke_varchar_columns_to_varchar(input, output, |row| {
            let (Some(Some(left)), Some(Some(right))) = (row.first(), row.get(1)) else {
                return Ok(VarcharOutput::Null);
            };
            let left_name = row.get(2).and_then(|v| v.as_deref());
            let right_name = row.get(3).and_then(|v| v.as_deref());

            Ok(match merge_records(left, right, left_name, right_name) {
                Ok(merged) => VarcharOutput::Value(merged),
                Err(e) => {
                    log::warn(format!("kifu_merge: {e}"));
                    VarcharOutput::Null
                }
            })
        })
    }

    fn signatures() -> Vec<ScalarFunctionSignature> {
        vec![
            ScalarFunctionSignature::exact(vec![varchar(), varchar()], varchar()),
            ScalarFunctionSignature::exact(
                vec![varchar(), varchar(), varchar(), varchar()],
                varchar(),
            ),
        ]
    }
}
