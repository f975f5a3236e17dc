use crate::aggr::AggrFns;
use crate::db::{open_db, GradesDao};
use crate::err::GradesErr;
use crate::grades::{Grades, Table};
use crate::model::{ColHdr, Entry, SectionInfo, Student};
use std::path::Path;

/// Grades backed by a workspace database.
///
/// Keeps the full table in an in-memory `Grades` cache and writes through to
/// the DAO. Every mutation is write-ahead: validate against the cache, write
/// to storage, and only then commit the cache, so a storage failure leaves
/// the cache consistent with the previously durable state (never ahead of
/// it). Storage errors propagate unchanged; retries belong to the caller.
pub struct DurableGrades {
    dao: GradesDao,
    cache: Grades,
}

impl DurableGrades {
    /// Open (or create) a workspace and rehydrate the cache from storage by
    /// replaying students, section infos, enrollments, and raw scores, then
    /// recomputing aggregates once per section.
    pub fn open(workspace: &Path, fns: AggrFns) -> Result<Self, GradesErr> {
        let conn = open_db(workspace).map_err(|e| GradesErr::db(e.to_string()))?;
        let dao = GradesDao::new(conn);
        let mut cache = Grades::new(fns);

        for student in dao.load_students()? {
            cache.add_student(student);
        }
        for record in dao.load_sections()? {
            let section_id = record.info.id.clone();
            cache.add_section_info(record.info)?;
            for student_id in &record.enrolled_students {
                cache.enroll_student_no_chk(&section_id, student_id);
            }
            for score in record.scores {
                cache.add_score_no_chk(&section_id, &score.student_id, &score.col_id, score.entry);
            }
            cache.compute_aggregates(&section_id)?;
        }

        Ok(Self { dao, cache })
    }

    pub fn add_student(&mut self, student: Student) -> Result<(), GradesErr> {
        self.dao.upsert_student(&student)?;
        self.cache.add_student(student);
        Ok(())
    }

    pub fn add_students(&mut self, students: Vec<Student>) -> Result<(), GradesErr> {
        for student in students {
            self.add_student(student)?;
        }
        Ok(())
    }

    /// Cache-first student read with a storage fallback, so a student written
    /// by an earlier process generation is still visible.
    pub fn get_student(&mut self, student_id: &str) -> Result<Student, GradesErr> {
        if let Ok(student) = self.cache.get_student(student_id) {
            return Ok(student.clone());
        }
        let student = self.dao.get_student(student_id)?;
        self.cache.add_student(student.clone());
        Ok(student)
    }

    pub fn add_section_info(&mut self, info: SectionInfo) -> Result<(), GradesErr> {
        self.cache.chk_section_info(&info)?;
        self.dao.replace_section(&info)?;
        self.cache.add_section_info_no_chk(info);
        Ok(())
    }

    pub fn get_section_info(&self, section_id: &str) -> Result<&SectionInfo, GradesErr> {
        self.cache.get_section_info(section_id)
    }

    pub fn enroll_student(&mut self, section_id: &str, student_id: &str) -> Result<(), GradesErr> {
        self.cache.chk_enroll_student(section_id, student_id)?;
        self.dao.enroll_student(section_id, student_id)?;
        self.cache.enroll_student_no_chk(section_id, student_id);
        Ok(())
    }

    pub fn get_enrolled_student_ids(&self, section_id: &str) -> Result<Vec<String>, GradesErr> {
        self.cache.get_enrolled_student_ids(section_id)
    }

    pub fn add_score(
        &mut self,
        section_id: &str,
        student_id: &str,
        col_id: &str,
        score: Entry,
    ) -> Result<(), GradesErr> {
        self.cache
            .chk_add_score(section_id, student_id, col_id, &score)?;
        self.dao.upsert_score(section_id, student_id, col_id, &score)?;
        self.cache.add_score_no_chk(section_id, student_id, col_id, score);
        self.cache.compute_aggregates(section_id)
    }

    pub fn get_entry(
        &self,
        section_id: &str,
        row_id: &str,
        col_id: &str,
    ) -> Result<Entry, GradesErr> {
        self.cache.get_entry(section_id, row_id, col_id)
    }

    pub fn get_section_data(
        &mut self,
        section_id: &str,
        row_ids: &[String],
        col_ids: &[String],
    ) -> Result<Table, GradesErr> {
        self.cache.get_section_data(section_id, row_ids, col_ids)
    }

    /// All raw (non-aggregate) data for a section: the id column plus every
    /// scorable column, for every enrolled student.
    pub fn get_raw_data(&mut self, section_id: &str) -> Result<Table, GradesErr> {
        let info = self.cache.get_section_info(section_id)?;
        let col_ids: Vec<String> = info
            .col_hdrs
            .iter()
            .filter(|h| {
                h.is_scorable()
                    || matches!(
                        h,
                        ColHdr::Student {
                            key: crate::model::StudentKey::Id,
                            ..
                        }
                    )
            })
            .map(|h| h.id().to_string())
            .collect();
        let row_ids = self.cache.get_enrolled_student_ids(section_id)?;
        if row_ids.is_empty() {
            return Ok(Table::new());
        }
        let table = self.cache.get_section_data(section_id, &row_ids, &[])?;
        Ok(table
            .into_iter()
            .map(|(row_id, row)| {
                let projected = row
                    .into_iter()
                    .filter(|(col_id, _)| col_ids.iter().any(|c| c == col_id))
                    .collect();
                (row_id, projected)
            })
            .collect())
    }

    /// One student's row, including aggregates.
    pub fn get_student_data(
        &mut self,
        section_id: &str,
        student_id: &str,
    ) -> Result<Table, GradesErr> {
        self.cache
            .get_section_data(section_id, &[student_id.to_string()], &[])
    }

    /// Every aggregate row for a section.
    pub fn get_aggr_rows(&mut self, section_id: &str) -> Result<Table, GradesErr> {
        let row_ids = self.cache.get_section_info(section_id)?.aggr_row_ids();
        if row_ids.is_empty() {
            return Ok(Table::new());
        }
        self.cache.get_section_data(section_id, &row_ids, &[])
    }

    /// Create or replace a section and load a full table of raw scores,
    /// enrolling every student that appears as a row. Students must already
    /// exist.
    pub fn load_section(
        &mut self,
        info: SectionInfo,
        rows: Vec<(String, Vec<(String, Entry)>)>,
    ) -> Result<(), GradesErr> {
        let section_id = info.id.clone();
        self.add_section_info(info)?;
        for (student_id, _) in &rows {
            self.enroll_student(&section_id, student_id)?;
        }
        for (student_id, entries) in rows {
            for (col_id, entry) in entries {
                self.add_score(&section_id, &student_id, &col_id, entry)?;
            }
        }
        Ok(())
    }

    pub fn rm_section(&mut self, section_id: &str) -> Result<(), GradesErr> {
        self.dao.remove_section(section_id)?;
        self.cache.rm_section(section_id)
    }

    /// Clear all data, storage first.
    pub fn clear(&mut self) -> Result<(), GradesErr> {
        self.dao.clear()?;
        self.cache.clear();
        Ok(())
    }
}
