use libduckdb_sys::duckdb_string_t;

/// Decode a DuckDB string value into a Rust-owned `String`.
///
/// Invalid UTF-8 is replaced rather than rejected; kifu text reaching DuckDB
/// has already been transcoded by whoever loaded it.
///
/// # Safety
///
/// `s` must come from a non-NULL `duckdb_string_t` vector row provided by
/// DuckDB for the active scalar invocation. Callers must perform row null checks
/// before invoking this function.
pub unsafe fn decode_duckdb_string(s: &duckdb_string_t) -> String {
    // SAFETY: Reading the inlined union field is part of DuckDB's string layout.
    let inlined_len = unsafe { s.value.inlined.length };

    if inlined_len <= 12 {
        let len = inlined_len as usize;
        if len == 0 {
            return String::new();
        }

        // SAFETY: `len <= 12` for inlined strings.
        let inlined = unsafe { &s.value.inlined.inlined };
        // SAFETY: `inlined` contains `len` initialized bytes.
        let bytes = unsafe { std::slice::from_raw_parts(inlined.as_ptr() as *const u8, len) };
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        // SAFETY: Reading pointer representation fields is valid here.
        let len = unsafe { s.value.pointer.length } as usize;

        // SAFETY: DuckDB provides valid pointer storage for non-inlined strings.
        let ptr = unsafe { s.value.pointer.ptr };
        // SAFETY: `ptr` references `len` bytes for this value.
        let bytes = unsafe { std::slice::from_raw_parts(ptr as *const u8, len) };
        String::from_utf8_lossy(bytes).into_owned()
    }
}
