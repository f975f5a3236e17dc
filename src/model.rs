use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub type StudentId = String;
pub type SectionId = String;
pub type ColId = String;
/// A row is keyed by either a student id or an aggregate-row id.
pub type RowId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    pub first_name: String,
    pub last_name: String,
}

/// A single stored or computed cell value.
///
/// On the wire an entry is a bare number, a bare string, or `null`; variant
/// order matters for untagged deserialization (`Empty` must come last).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entry {
    Num(f64),
    Text(String),
    Empty,
}

impl Entry {
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Entry::Num(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Entry::Empty)
    }
}

impl Default for Entry {
    fn default() -> Self {
        Entry::Empty
    }
}

/// Which identity field a student column displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StudentKey {
    Id,
    FirstName,
    LastName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ColHdr {
    #[serde(rename_all = "camelCase")]
    Student { id: ColId, hdr: String, key: StudentKey },
    #[serde(rename_all = "camelCase")]
    NumScore {
        id: ColId,
        hdr: String,
        min: f64,
        max: f64,
    },
    #[serde(rename_all = "camelCase")]
    TextScore {
        id: ColId,
        hdr: String,
        vals: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    AggrCol {
        id: ColId,
        hdr: String,
        aggr_fn: String,
        #[serde(default)]
        args: Vec<ColId>,
    },
}

impl ColHdr {
    pub fn id(&self) -> &str {
        match self {
            ColHdr::Student { id, .. }
            | ColHdr::NumScore { id, .. }
            | ColHdr::TextScore { id, .. }
            | ColHdr::AggrCol { id, .. } => id,
        }
    }

    /// Identity columns carry student fields, never scores.
    pub fn is_identity(&self) -> bool {
        matches!(self, ColHdr::Student { .. })
    }

    /// Columns a caller may write a score into.
    pub fn is_scorable(&self) -> bool {
        matches!(self, ColHdr::NumScore { .. } | ColHdr::TextScore { .. })
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, ColHdr::AggrCol { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RowHdr {
    #[serde(rename_all = "camelCase")]
    Student { id: RowId, hdr: String },
    #[serde(rename_all = "camelCase")]
    AggrRow {
        id: RowId,
        hdr: String,
        aggr_fn: String,
        #[serde(default)]
        args: Vec<ColId>,
    },
}

impl RowHdr {
    pub fn id(&self) -> &str {
        match self {
            RowHdr::Student { id, .. } | RowHdr::AggrRow { id, .. } => id,
        }
    }
}

/// Column/row order is insertion order and is meaningful for display, so
/// headers live in vectors rather than maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionInfo {
    pub id: SectionId,
    pub col_hdrs: Vec<ColHdr>,
    pub row_hdrs: Vec<RowHdr>,
}

impl SectionInfo {
    pub fn col_hdr(&self, col_id: &str) -> Option<&ColHdr> {
        self.col_hdrs.iter().find(|h| h.id() == col_id)
    }

    pub fn aggr_row_ids(&self) -> Vec<RowId> {
        self.row_hdrs
            .iter()
            .filter_map(|h| match h {
                RowHdr::AggrRow { id, .. } => Some(id.clone()),
                RowHdr::Student { .. } => None,
            })
            .collect()
    }

    pub fn is_aggr_row(&self, row_id: &str) -> bool {
        self.row_hdrs
            .iter()
            .any(|h| matches!(h, RowHdr::AggrRow { id, .. } if id == row_id))
    }
}

/// One stored row: column id to entry. Lookup structure; display order comes
/// from the section's column headers.
pub type RowData = HashMap<ColId, Entry>;

/// A section's full table. `BTreeMap` keeps rows sorted by row id, which is
/// the unfiltered display order.
pub type SectionData = BTreeMap<RowId, RowData>;

/// The persisted shape of one section: info, enrollment set, and the sparse
/// raw score table. This is what the store writes and rehydrates from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRecord {
    pub info: SectionInfo,
    pub enrolled_students: Vec<StudentId>,
    pub scores: Vec<ScoreRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub student_id: StudentId,
    pub col_id: ColId,
    pub entry: Entry,
}
