use std::ops::Range;

use bytes::Bytes;

use crate::ReadAt;

#[macro_export]
macro_rules! verify {
    ($expr:expr) => {{
        let result = $expr;
        $crate::utils::verify(result, stringify!($expr))?;
    }};
}

pub fn verify(predicate: bool, condition: &str) -> std::io::Result<()> {
    if predicate {
        Ok(())
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            condition,
        ))
    }
}

/// Clips `range` to an object of `size` bytes; `None` when nothing of it remains.
pub(crate) fn clip_range(range: Range<u64>, size: u64) -> std::io::Result<Option<Range<u64>>> {
    verify!(range.end >= range.start);
    let end = range.end.min(size);
    Ok((range.start < end).then_some(range.start..end))
}

/// Reads exactly `range` from `source`, failing with `UnexpectedEof` on a short read.
///
/// `ReadAt::read_at` clamps reads at end-of-file; callers that computed `range` from
/// a file layout treat any truncation as a fatal I/O error.
pub fn read_exact_at<R>(source: &R, range: Range<u64>) -> std::io::Result<Bytes>
where
    R: ReadAt + ?Sized,
{
    let expected = range.end.saturating_sub(range.start);
    let buf = source.read_at(range.clone())?;
    check_read_len(&buf, expected, &range)?;
    Ok(buf)
}

pub(crate) fn check_read_len(buf: &Bytes, expected: u64, range: &Range<u64>) -> std::io::Result<()> {
    if buf.len() as u64 != expected {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!(
                "short read at {}..{}: expected {expected} bytes, got {}",
                range.start,
                range.end,
                buf.len()
            ),
        ));
    }
    Ok(())
}
