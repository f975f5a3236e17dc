use crate::err::GradesErr;
use crate::model::{ColHdr, Entry};

/// Check a candidate entry against a column's declared type and constraints.
///
/// Absent is always valid (a score can be cleared). Numeric scores must lie
/// in `[min, max]` inclusive; text scores must be drawn from the column's
/// allowed set. Out-of-range values are rejected, never clamped.
pub fn chk_entry(hdr: &ColHdr, entry: &Entry) -> Result<(), GradesErr> {
    if entry.is_empty() {
        return Ok(());
    }
    match hdr {
        ColHdr::NumScore { id, min, max, .. } => match entry {
            Entry::Num(v) => {
                if *v < *min || *v > *max {
                    Err(GradesErr::bad_content(format!(
                        "score {} for column \"{}\" is outside [{}, {}]",
                        v, id, min, max
                    )))
                } else {
                    Ok(())
                }
            }
            _ => Err(GradesErr::bad_content(format!(
                "column \"{}\" requires a numeric score",
                id
            ))),
        },
        ColHdr::TextScore { id, vals, .. } => match entry {
            Entry::Text(s) => {
                if vals.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(GradesErr::bad_content(format!(
                        "score \"{}\" is not an allowed value for column \"{}\"",
                        s, id
                    )))
                }
            }
            _ => Err(GradesErr::bad_content(format!(
                "column \"{}\" requires a text score",
                id
            ))),
        },
        ColHdr::Student { id, .. } | ColHdr::AggrCol { id, .. } => Err(GradesErr::bad_content(
            format!("column \"{}\" does not accept scores", id),
        )),
    }
}
