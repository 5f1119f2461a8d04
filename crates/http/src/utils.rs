//! Internal helper macros shared by the codec and connection modules.

/// Returns early with `$error` when `$predicate` does not hold.
///
/// ```ignore
/// ensure!(value.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(value.len(), MAX_HEADER_BYTES));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
