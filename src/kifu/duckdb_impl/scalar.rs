//! Shared DuckDB scalar invoke helpers.
//!
//! These helpers centralize common scalar boilerplate:
//! - flat vector access
//! - per-row NULL checks
//! - `duckdb_string_t` decoding
//! - output insertion / validity handling
//!
//! # Safety
//! These helpers MUST only be called from within a DuckDB scalar `invoke()` while the
//! underlying vectors are valid.
//!
//! Callers MUST ensure the input/output column logical types match the helper being used
//! (`VARCHAR` inputs for `duckdb_string_t`, `BOOLEAN` outputs for `bool`).

use std::error::Error;
use std::ffi::CString;

use duckdb::{
    Result,
    core::{DataChunkHandle, FlatVector, Inserter, LogicalTypeId},
    vtab::arrow::WritableVector,
};
use libduckdb_sys::duckdb_string_t;

use super::string::decode_duckdb_string;

#[derive(Debug, Clone)]
pub enum VarcharOutput {
    Null,
    Value(String),
}

fn ensure_type(
    vec: &FlatVector,
    expected: LogicalTypeId,
    label: &str,
) -> Result<(), Box<dyn Error>> {
    let actual = vec.logical_type().id();
    if actual != expected {
        return Err(format!(
            "scalar helper type mismatch: {label} expected {expected:?}, got {actual:?}"
        )
        .into());
    }
    Ok(())
}

fn write_varchar(
    output_vec: &mut FlatVector,
    row: usize,
    value: VarcharOutput,
) -> Result<(), Box<dyn Error>> {
    match value {
        VarcharOutput::Null => output_vec.set_null(row),
        // Rendered records never contain NUL; replace defensively so CString cannot fail.
        VarcharOutput::Value(v) => output_vec.insert(row, CString::new(v.replace('\0', " "))?),
    }
    Ok(())
}

/// Invoke a unary `VARCHAR -> VARCHAR` scalar. NULL input rows produce NULL.
pub fn invoke_unary_varchar_to_varchar<F>(
    input: &DataChunkHandle,
    output: &mut dyn WritableVector,
    mut f: F,
) -> Result<(), Box<dyn Error>>
where
    F: FnMut(&str) -> Result<VarcharOutput, Box<dyn Error>>,
{
    let len = input.len();
    let input_vec = input.flat_vector(0);
    ensure_type(&input_vec, LogicalTypeId::Varchar, "input[0]")?;
    let input_slice = input_vec.as_slice::<duckdb_string_t>();
    let mut output_vec = output.flat_vector();
    ensure_type(&output_vec, LogicalTypeId::Varchar, "output")?;

    for (i, s) in input_slice.iter().take(len).enumerate() {
        if input_vec.row_is_null(i as u64) {
            output_vec.set_null(i);
            continue;
        }

        // SAFETY: Row nullability is checked above.
        let val = unsafe { decode_duckdb_string(s) };
        write_varchar(&mut output_vec, i, f(val.as_ref())?)?;
    }

    Ok(())
}

/// Invoke a unary `VARCHAR -> BOOLEAN` scalar. NULL input rows produce NULL.
pub fn invoke_unary_varchar_to_bool_nullable<F>(
    input: &DataChunkHandle,
    output: &mut dyn WritableVector,
    mut f: F,
) -> Result<(), Box<dyn Error>>
where
    F: FnMut(&str) -> bool,
{
    let len = input.len();
    let input_vec = input.flat_vector(0);
    ensure_type(&input_vec, LogicalTypeId::Varchar, "input[0]")?;
    let input_slice = input_vec.as_slice::<duckdb_string_t>();
    let mut output_vec = output.flat_vector();
    ensure_type(&output_vec, LogicalTypeId::Boolean, "output")?;

    for (i, s) in input_slice.iter().take(len).enumerate() {
        if input_vec.row_is_null(i as u64) {
            output_vec.set_null(i);
            continue;
        }

        // SAFETY: Row nullability is checked above.
        let val = unsafe { decode_duckdb_string(s) };
        output_vec.as_mut_slice::<bool>()[i] = f(val.as_ref());
    }

    Ok(())
}

/// Invoke a binary `VARCHAR, VARCHAR -> BOOLEAN` scalar that outputs NULL when either input is
/// NULL.
pub fn invoke_binary_varchar_varchar_to_bool_nullable<F>(
    input: &DataChunkHandle,
    output: &mut dyn WritableVector,
    mut f: F,
) -> Result<(), Box<dyn Error>>
where
    F: FnMut(&str, &str) -> bool,
{
    let len = input.len();
    let input_vec_0 = input.flat_vector(0);
    let input_vec_1 = input.flat_vector(1);
    ensure_type(&input_vec_0, LogicalTypeId::Varchar, "input[0]")?;
    ensure_type(&input_vec_1, LogicalTypeId::Varchar, "input[1]")?;
    let input_slice_0 = input_vec_0.as_slice::<duckdb_string_t>();
    let input_slice_1 = input_vec_1.as_slice::<duckdb_string_t>();
    let mut output_vec = output.flat_vector();
    ensure_type(&output_vec, LogicalTypeId::Boolean, "output")?;

    for (i, (left_s, right_s)) in input_slice_0
        .iter()
        .take(len)
        .zip(input_slice_1.iter().take(len))
        .enumerate()
    {
        if input_vec_0.row_is_null(i as u64) || input_vec_1.row_is_null(i as u64) {
            output_vec.set_null(i);
            continue;
        }

        // SAFETY: Both input rows are checked non-NULL above.
        let left = unsafe { decode_duckdb_string(left_s) };
        // SAFETY: Both input rows are checked non-NULL above.
        let right = unsafe { decode_duckdb_string(right_s) };
        output_vec.as_mut_slice::<bool>()[i] = f(left.as_ref(), right.as_ref());
    }

    Ok(())
}

/// Invoke a `VARCHAR, ... -> VARCHAR` scalar over every input column.
///
/// `f` receives one `Option<String>` per column (`None` for NULL cells), so the
/// closure decides which arguments are required.
pub fn invoke_varchar_columns_to_varchar<F>(
    input: &DataChunkHandle,
    output: &mut dyn WritableVector,
    mut f: F,
) -> Result<(), Box<dyn Error>>
where
    F: FnMut(&[Option<String>]) -> Result<VarcharOutput, Box<dyn Error>>,
{
    let len = input.len();
    let columns: Vec<FlatVector> = (0..input.num_columns())
        .map(|idx| input.flat_vector(idx))
        .collect();
    for (idx, vec) in columns.iter().enumerate() {
        ensure_type(vec, LogicalTypeId::Varchar, &format!("input[{idx}]"))?;
    }
    let slices: Vec<&[duckdb_string_t]> = columns
        .iter()
        .map(|vec| vec.as_slice::<duckdb_string_t>())
        .collect();
    let mut output_vec = output.flat_vector();
    ensure_type(&output_vec, LogicalTypeId::Varchar, "output")?;

    let mut row = Vec::with_capacity(columns.len());
    for i in 0..len {
        row.clear();
        for (vec, slice) in columns.iter().zip(&slices) {
            if vec.row_is_null(i as u64) {
                row.push(None);
            } else {
                // SAFETY: Row nullability is checked above.
                row.push(Some(unsafe { decode_duckdb_string(&slice[i]) }));
            }
        }

        write_varchar(&mut output_vec, i, f(&row)?)?;
    }

    Ok(())
}
