use jagged_error::{DbError, ErrorKind, Result};

/// Kind of a single index component, used for result type computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    At,
    Range,
}

/// A single component of a (possibly multi-dimensional) index expression.
///
/// Indices follow host conventions: negative positions count from the end,
/// and missing range bounds mean "from the start"/"to the end".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexExpr {
    At(i64),
    Range { start: Option<i64>, stop: Option<i64> },
}

impl IndexExpr {
    pub const fn range(start: i64, stop: i64) -> Self {
        IndexExpr::Range {
            start: Some(start),
            stop: Some(stop),
        }
    }

    pub const fn kind(&self) -> IndexKind {
        match self {
            Self::At(_) => IndexKind::At,
            Self::Range { .. } => IndexKind::Range,
        }
    }

    pub fn kinds(exprs: &[IndexExpr]) -> Vec<IndexKind> {
        exprs.iter().map(|e| e.kind()).collect()
    }
}

/// Normalize a possibly negative index against `len`, erroring if it falls
/// outside `[0, len)` after wrapping.
pub fn regularize_index(idx: i64, len: usize) -> Result<usize> {
    let signed_len = len as i64;
    let wrapped = if idx < 0 { idx + signed_len } else { idx };

    if wrapped < 0 || wrapped >= signed_len {
        return Err(DbError::new("Index out of range")
            .with_kind(ErrorKind::OutOfRange)
            .with_field("index", idx)
            .with_field("len", len));
    }

    Ok(wrapped as usize)
}

/// Normalize range bounds against `len`.
///
/// Negative bounds wrap, bounds are clamped to `[0, len]`, and `stop` is never
/// less than `start`. Never errors, matching host slicing.
pub fn regularize_range(start: Option<i64>, stop: Option<i64>, len: usize) -> (usize, usize) {
    let signed_len = len as i64;
    let clamp = |v: i64| -> i64 {
        let v = if v < 0 { v + signed_len } else { v };
        v.clamp(0, signed_len)
    };

    let start = start.map(clamp).unwrap_or(0);
    let stop = stop.map(clamp).unwrap_or(signed_len);
    let stop = stop.max(start);

    (start as usize, stop as usize)
}
