use crate::aggr::AggrFns;
use crate::err::GradesErr;
use crate::model::{
    ColHdr, Entry, RowData, RowHdr, SectionData, SectionInfo, Student, StudentKey,
};
use crate::validate::chk_entry;
use std::collections::HashMap;

/// An ordered slice of a section table: rows in display order, each row's
/// entries in column display order.
pub type TableRow = Vec<(String, Entry)>;
pub type Table = Vec<(String, TableRow)>;

/// In-memory grades for multiple sections.
///
/// Stores students, section schemas, and per-section tables keyed by
/// (row id, column id). Every mutating call recomputes the section's
/// aggregates in full; with small rosters that O(rows x aggCols +
/// cols x aggRows) cost per write is acceptable and intentionally not
/// optimized into incremental updates.
///
/// Single-writer semantics: mutations are synchronous and non-reentrant,
/// with no internal locking.
pub struct Grades {
    students: HashMap<String, Student>,
    infos: HashMap<String, SectionInfo>,
    sections: HashMap<String, SectionData>,
    fns: AggrFns,
}

impl Grades {
    /// Aggregate functions are a closed set fixed at construction; section
    /// infos may only reference names present here.
    pub fn new(fns: AggrFns) -> Self {
        Self {
            students: HashMap::new(),
            infos: HashMap::new(),
            sections: HashMap::new(),
            fns,
        }
    }

    /// Add or replace a student. Idempotent upsert, no validation beyond
    /// structural shape.
    pub fn add_student(&mut self, student: Student) {
        self.students.insert(student.id.clone(), student);
    }

    pub fn get_student(&self, student_id: &str) -> Result<&Student, GradesErr> {
        self.students
            .get(student_id)
            .ok_or_else(|| GradesErr::not_found(format!("unknown studentId \"{}\"", student_id)))
    }

    /// Check that every aggregate column/row references a registered
    /// aggregate function name.
    pub fn chk_section_info(&self, info: &SectionInfo) -> Result<(), GradesErr> {
        for hdr in &info.col_hdrs {
            if let ColHdr::AggrCol { aggr_fn, .. } = hdr {
                if !self.fns.row.contains_key(aggr_fn) {
                    return Err(GradesErr::bad_content(format!(
                        "unknown row aggregate function \"{}\"",
                        aggr_fn
                    )));
                }
            }
        }
        for hdr in &info.row_hdrs {
            if let RowHdr::AggrRow { aggr_fn, .. } = hdr {
                if !self.fns.col.contains_key(aggr_fn) {
                    return Err(GradesErr::bad_content(format!(
                        "unknown column aggregate function \"{}\"",
                        aggr_fn
                    )));
                }
            }
        }
        Ok(())
    }

    /// Add or replace a section schema. Replacement is total: any previously
    /// entered data for the section id is discarded. Declared aggregate rows
    /// are seeded immediately with placeholder identity fields.
    pub fn add_section_info(&mut self, info: SectionInfo) -> Result<(), GradesErr> {
        self.chk_section_info(&info)?;
        self.add_section_info_no_chk(info);
        Ok(())
    }

    /// Replay path for rehydration; callers must have validated `info`.
    pub fn add_section_info_no_chk(&mut self, info: SectionInfo) {
        let mut data = SectionData::new();
        for row_hdr in &info.row_hdrs {
            let RowHdr::AggrRow { id: row_id, .. } = row_hdr else {
                continue;
            };
            let mut row = RowData::new();
            for hdr in &info.col_hdrs {
                let entry = match hdr {
                    ColHdr::Student {
                        key: StudentKey::Id,
                        ..
                    } => Entry::Text(row_id.clone()),
                    ColHdr::Student { .. } => Entry::Text(String::new()),
                    _ => Entry::Empty,
                };
                row.insert(hdr.id().to_string(), entry);
            }
            data.insert(row_id.clone(), row);
        }
        self.sections.insert(info.id.clone(), data);
        self.infos.insert(info.id.clone(), info);
    }

    pub fn get_section_info(&self, section_id: &str) -> Result<&SectionInfo, GradesErr> {
        self.infos
            .get(section_id)
            .ok_or_else(|| GradesErr::not_found(format!("unknown sectionId \"{}\"", section_id)))
    }

    pub fn chk_enroll_student(&self, section_id: &str, student_id: &str) -> Result<(), GradesErr> {
        self.get_section_info(section_id)?;
        self.get_student(student_id)?;
        Ok(())
    }

    /// Enroll a student. Re-enrolling is a no-op beyond ensuring the data row
    /// exists; a first enrollment seeds identity columns from the student and
    /// leaves every scorable column empty.
    pub fn enroll_student(&mut self, section_id: &str, student_id: &str) -> Result<(), GradesErr> {
        self.chk_enroll_student(section_id, student_id)?;
        self.enroll_student_no_chk(section_id, student_id);
        Ok(())
    }

    /// Replay path for rehydration; skips the existence checks.
    pub fn enroll_student_no_chk(&mut self, section_id: &str, student_id: &str) {
        let Some(info) = self.infos.get(section_id) else {
            return;
        };
        let data = self.sections.entry(section_id.to_string()).or_default();
        if data.contains_key(student_id) {
            return;
        }
        let student = self.students.get(student_id);
        let mut row = RowData::new();
        for hdr in &info.col_hdrs {
            let entry = match hdr {
                ColHdr::Student { key, .. } => match key {
                    StudentKey::Id => Entry::Text(student_id.to_string()),
                    StudentKey::FirstName => student
                        .map(|s| Entry::Text(s.first_name.clone()))
                        .unwrap_or(Entry::Empty),
                    StudentKey::LastName => student
                        .map(|s| Entry::Text(s.last_name.clone()))
                        .unwrap_or(Entry::Empty),
                },
                _ => Entry::Empty,
            };
            row.insert(hdr.id().to_string(), entry);
        }
        data.insert(student_id.to_string(), row);
    }

    /// Ids of students with a data row in the section, sorted.
    pub fn get_enrolled_student_ids(&self, section_id: &str) -> Result<Vec<String>, GradesErr> {
        let info = self.get_section_info(section_id)?;
        let data = self.section_data(section_id)?;
        Ok(data
            .keys()
            .filter(|row_id| !info.is_aggr_row(row_id))
            .cloned()
            .collect())
    }

    pub fn chk_add_score(
        &self,
        section_id: &str,
        student_id: &str,
        col_id: &str,
        score: &Entry,
    ) -> Result<(), GradesErr> {
        let info = self.get_section_info(section_id)?;
        self.get_student(student_id)?;
        let Some(hdr) = info.col_hdr(col_id) else {
            return Err(GradesErr::not_found(format!(
                "unknown colId \"{}\"",
                col_id
            )));
        };
        let enrolled = self
            .sections
            .get(section_id)
            .map(|data| data.contains_key(student_id))
            .unwrap_or(false);
        if !enrolled {
            return Err(GradesErr::bad_content(format!(
                "student \"{}\" is not enrolled in section \"{}\"",
                student_id, section_id
            )));
        }
        chk_entry(hdr, score)
    }

    /// Add or replace a score, then recompute the section's aggregates.
    /// Validation failures leave the stored cell unchanged.
    pub fn add_score(
        &mut self,
        section_id: &str,
        student_id: &str,
        col_id: &str,
        score: Entry,
    ) -> Result<(), GradesErr> {
        self.chk_add_score(section_id, student_id, col_id, &score)?;
        self.add_score_no_chk(section_id, student_id, col_id, score);
        self.compute_aggregates(section_id)
    }

    /// Replay path for rehydration: stores without validation and without
    /// triggering recomputation (the store recomputes once per section after
    /// replay).
    pub fn add_score_no_chk(&mut self, section_id: &str, student_id: &str, col_id: &str, score: Entry) {
        if let Some(data) = self.sections.get_mut(section_id) {
            if let Some(row) = data.get_mut(student_id) {
                row.insert(col_id.to_string(), score);
            }
        }
    }

    /// Raw stored entry for one cell; may be a previously computed aggregate
    /// when the row/column designate one.
    pub fn get_entry(
        &self,
        section_id: &str,
        row_id: &str,
        col_id: &str,
    ) -> Result<Entry, GradesErr> {
        let info = self.get_section_info(section_id)?;
        if info.col_hdr(col_id).is_none() {
            return Err(GradesErr::not_found(format!(
                "unknown colId \"{}\"",
                col_id
            )));
        }
        let data = self.section_data(section_id)?;
        match data.get(row_id) {
            Some(row) => Ok(row.get(col_id).cloned().unwrap_or(Entry::Empty)),
            None if self.students.contains_key(row_id) => Err(GradesErr::bad_content(format!(
                "student \"{}\" is not enrolled in section \"{}\"",
                row_id, section_id
            ))),
            None => Err(GradesErr::not_found(format!(
                "unknown rowId \"{}\"",
                row_id
            ))),
        }
    }

    /// Full section data, including aggregates, recomputed first.
    ///
    /// No filters: every row (sorted by row id) with every column in schema
    /// order. `row_ids`: exactly those rows in the given order, all columns.
    /// `col_ids` (with `row_ids` empty): every row projected to those columns
    /// in the given order. Row selection takes precedence when both filters
    /// are supplied.
    pub fn get_section_data(
        &mut self,
        section_id: &str,
        row_ids: &[String],
        col_ids: &[String],
    ) -> Result<Table, GradesErr> {
        if self.infos.contains_key(section_id) {
            self.compute_aggregates(section_id)?;
        }
        let info = self.get_section_info(section_id)?;
        let data = self.section_data(section_id)?;

        let all_cols: Vec<&str> = info.col_hdrs.iter().map(|h| h.id()).collect();

        let project = |row: &RowData, cols: &[&str]| -> TableRow {
            cols.iter()
                .map(|col_id| {
                    (
                        col_id.to_string(),
                        row.get(*col_id).cloned().unwrap_or(Entry::Empty),
                    )
                })
                .collect()
        };

        if !row_ids.is_empty() {
            let mut out = Table::new();
            for row_id in row_ids {
                let Some(row) = data.get(row_id) else {
                    if self.students.contains_key(row_id) {
                        return Err(GradesErr::bad_content(format!(
                            "student \"{}\" is not enrolled in section \"{}\"",
                            row_id, section_id
                        )));
                    }
                    return Err(GradesErr::not_found(format!(
                        "unknown rowId \"{}\"",
                        row_id
                    )));
                };
                out.push((row_id.clone(), project(row, &all_cols)));
            }
            return Ok(out);
        }

        let cols: Vec<&str> = if col_ids.is_empty() {
            all_cols
        } else {
            let mut selected = Vec::with_capacity(col_ids.len());
            for col_id in col_ids {
                if info.col_hdr(col_id).is_none() {
                    return Err(GradesErr::not_found(format!(
                        "unknown colId \"{}\"",
                        col_id
                    )));
                }
                selected.push(col_id.as_str());
            }
            selected
        };

        Ok(data
            .iter()
            .map(|(row_id, row)| (row_id.clone(), project(row, &cols)))
            .collect())
    }

    /// Remove a section's schema and all its data.
    pub fn rm_section(&mut self, section_id: &str) -> Result<(), GradesErr> {
        if self.infos.remove(section_id).is_none() {
            return Err(GradesErr::not_found(format!(
                "unknown sectionId \"{}\"",
                section_id
            )));
        }
        self.sections.remove(section_id);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.students.clear();
        self.infos.clear();
        self.sections.clear();
    }

    /// Two-phase aggregate recomputation, run to completion.
    ///
    /// Phase 1 applies each aggregate column's row function to every data row
    /// (students and aggregate rows alike). Phase 2 then applies each
    /// aggregate row's column function to every non-identity column, so
    /// column aggregates see fresh row-aggregate results while row aggregates
    /// can never see same-pass column aggregates. A failing function aborts
    /// the pass and surfaces to the caller.
    pub fn compute_aggregates(&mut self, section_id: &str) -> Result<(), GradesErr> {
        let info = self
            .infos
            .get(section_id)
            .ok_or_else(|| GradesErr::not_found(format!("unknown sectionId \"{}\"", section_id)))?;
        let Some(data) = self.sections.get(section_id) else {
            return Ok(());
        };

        // Phase 1: row aggregates.
        let mut updates: Vec<(String, String, Entry)> = Vec::new();
        for row_id in data.keys() {
            for hdr in &info.col_hdrs {
                let ColHdr::AggrCol { id, aggr_fn, args, .. } = hdr else {
                    continue;
                };
                let f = self.fns.row.get(aggr_fn).ok_or_else(|| {
                    GradesErr::bad_content(format!(
                        "unknown row aggregate function \"{}\"",
                        aggr_fn
                    ))
                })?;
                updates.push((row_id.clone(), id.clone(), f(info, data, row_id, args)?));
            }
        }
        if let Some(data) = self.sections.get_mut(section_id) {
            for (row_id, col_id, entry) in updates {
                if let Some(row) = data.get_mut(&row_id) {
                    row.insert(col_id, entry);
                }
            }
        }

        // Phase 2: column aggregates, strictly after phase 1.
        let Some(data) = self.sections.get(section_id) else {
            return Ok(());
        };
        let mut updates: Vec<(String, String, Entry)> = Vec::new();
        for hdr in &info.col_hdrs {
            if hdr.is_identity() {
                continue;
            }
            let col_id = hdr.id();
            for row_hdr in &info.row_hdrs {
                let RowHdr::AggrRow {
                    id: row_id,
                    aggr_fn,
                    args,
                    ..
                } = row_hdr
                else {
                    continue;
                };
                let f = self.fns.col.get(aggr_fn).ok_or_else(|| {
                    GradesErr::bad_content(format!(
                        "unknown column aggregate function \"{}\"",
                        aggr_fn
                    ))
                })?;
                updates.push((row_id.clone(), col_id.to_string(), f(info, data, col_id, args)?));
            }
        }
        if let Some(data) = self.sections.get_mut(section_id) {
            for (row_id, col_id, entry) in updates {
                if let Some(row) = data.get_mut(&row_id) {
                    row.insert(col_id, entry);
                }
            }
        }
        Ok(())
    }

    fn section_data(&self, section_id: &str) -> Result<&SectionData, GradesErr> {
        self.sections
            .get(section_id)
            .ok_or_else(|| GradesErr::not_found(format!("unknown sectionId \"{}\"", section_id)))
    }
}
