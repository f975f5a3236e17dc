use crate::err::GradesErr;
use crate::model::{ColHdr, Entry, SectionData, SectionInfo};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Computes a derived column value for one row from that row's other columns.
/// `args` are the column ids to combine; empty means every numeric-score
/// column. Row aggregates read raw columns only, never other aggregates.
pub type RowAggrFn =
    fn(&SectionInfo, &SectionData, &str, &[String]) -> Result<Entry, GradesErr>;

/// Computes a derived row value for one column from that column's student
/// rows. Aggregate rows are excluded so aggregates never feed back into
/// themselves.
pub type ColAggrFn =
    fn(&SectionInfo, &SectionData, &str, &[String]) -> Result<Entry, GradesErr>;

/// Closed registry of aggregate functions, fixed at engine construction.
/// Names referenced by section infos are resolved against these maps.
pub struct AggrFns {
    pub row: HashMap<String, RowAggrFn>,
    pub col: HashMap<String, ColAggrFn>,
}

impl AggrFns {
    pub fn new() -> Self {
        Self {
            row: HashMap::new(),
            col: HashMap::new(),
        }
    }

    /// The standard function set: row `sum`/`avg`/`count`/`max`/`min` and
    /// column `sum`/`avg`/`count`/`max`/`min`/`median`.
    pub fn builtin() -> Self {
        let mut fns = Self::new();
        fns.row.insert("sum".to_string(), row_sum as RowAggrFn);
        fns.row.insert("avg".to_string(), row_avg as RowAggrFn);
        fns.row.insert("count".to_string(), row_count as RowAggrFn);
        fns.row.insert("max".to_string(), row_max as RowAggrFn);
        fns.row.insert("min".to_string(), row_min as RowAggrFn);

        fns.col.insert("sum".to_string(), col_sum as ColAggrFn);
        fns.col.insert("avg".to_string(), col_avg as ColAggrFn);
        fns.col.insert("count".to_string(), col_count as ColAggrFn);
        fns.col.insert("max".to_string(), col_max as ColAggrFn);
        fns.col.insert("min".to_string(), col_min as ColAggrFn);
        fns.col.insert("median".to_string(), col_median as ColAggrFn);
        fns
    }
}

impl Default for AggrFns {
    fn default() -> Self {
        Self::builtin()
    }
}

/// The columns a row aggregate reduces over: the explicit args, or every
/// numeric-score column when none are given.
fn row_source_cols(info: &SectionInfo, args: &[String]) -> Vec<String> {
    if !args.is_empty() {
        return args.to_vec();
    }
    info.col_hdrs
        .iter()
        .filter(|h| matches!(h, ColHdr::NumScore { .. }))
        .map(|h| h.id().to_string())
        .collect()
}

/// Numeric values stored in `row_id` under the source columns. Absent and
/// text entries are skipped.
fn row_values(
    info: &SectionInfo,
    data: &SectionData,
    row_id: &str,
    args: &[String],
) -> Vec<f64> {
    let Some(row) = data.get(row_id) else {
        return Vec::new();
    };
    row_source_cols(info, args)
        .iter()
        .filter_map(|col_id| row.get(col_id).and_then(Entry::as_num))
        .collect()
}

/// Numeric values stored under `col_id` across student rows only.
fn col_values(info: &SectionInfo, data: &SectionData, col_id: &str) -> Vec<f64> {
    data.iter()
        .filter(|(row_id, _)| !info.is_aggr_row(row_id))
        .filter_map(|(_, row)| row.get(col_id).and_then(Entry::as_num))
        .collect()
}

fn sum_of(values: &[f64]) -> Entry {
    Entry::Num(values.iter().sum())
}

fn avg_of(values: &[f64]) -> Entry {
    if values.is_empty() {
        Entry::Empty
    } else {
        Entry::Num(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn max_of(values: &[f64]) -> Entry {
    values
        .iter()
        .copied()
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
        .map(Entry::Num)
        .unwrap_or(Entry::Empty)
}

fn min_of(values: &[f64]) -> Entry {
    values
        .iter()
        .copied()
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
        .map(Entry::Num)
        .unwrap_or(Entry::Empty)
}

fn median_of(values: &[f64]) -> Entry {
    if values.is_empty() {
        return Entry::Empty;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = sorted.len();
    let m = if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[(n / 2) - 1] + sorted[n / 2]) / 2.0
    };
    Entry::Num(m)
}

fn row_sum(
    info: &SectionInfo,
    data: &SectionData,
    row_id: &str,
    args: &[String],
) -> Result<Entry, GradesErr> {
    Ok(sum_of(&row_values(info, data, row_id, args)))
}

fn row_avg(
    info: &SectionInfo,
    data: &SectionData,
    row_id: &str,
    args: &[String],
) -> Result<Entry, GradesErr> {
    Ok(avg_of(&row_values(info, data, row_id, args)))
}

fn row_count(
    info: &SectionInfo,
    data: &SectionData,
    row_id: &str,
    args: &[String],
) -> Result<Entry, GradesErr> {
    Ok(Entry::Num(row_values(info, data, row_id, args).len() as f64))
}

fn row_max(
    info: &SectionInfo,
    data: &SectionData,
    row_id: &str,
    args: &[String],
) -> Result<Entry, GradesErr> {
    Ok(max_of(&row_values(info, data, row_id, args)))
}

fn row_min(
    info: &SectionInfo,
    data: &SectionData,
    row_id: &str,
    args: &[String],
) -> Result<Entry, GradesErr> {
    Ok(min_of(&row_values(info, data, row_id, args)))
}

fn col_sum(
    info: &SectionInfo,
    data: &SectionData,
    col_id: &str,
    _args: &[String],
) -> Result<Entry, GradesErr> {
    Ok(sum_of(&col_values(info, data, col_id)))
}

fn col_avg(
    info: &SectionInfo,
    data: &SectionData,
    col_id: &str,
    _args: &[String],
) -> Result<Entry, GradesErr> {
    Ok(avg_of(&col_values(info, data, col_id)))
}

fn col_count(
    info: &SectionInfo,
    data: &SectionData,
    col_id: &str,
    _args: &[String],
) -> Result<Entry, GradesErr> {
    Ok(Entry::Num(col_values(info, data, col_id).len() as f64))
}

fn col_max(
    info: &SectionInfo,
    data: &SectionData,
    col_id: &str,
    _args: &[String],
) -> Result<Entry, GradesErr> {
    Ok(max_of(&col_values(info, data, col_id)))
}

fn col_min(
    info: &SectionInfo,
    data: &SectionData,
    col_id: &str,
    _args: &[String],
) -> Result<Entry, GradesErr> {
    Ok(min_of(&col_values(info, data, col_id)))
}

fn col_median(
    info: &SectionInfo,
    data: &SectionData,
    col_id: &str,
    _args: &[String],
) -> Result<Entry, GradesErr> {
    Ok(median_of(&col_values(info, data, col_id)))
}
