use crate::err::GradesErr;
use crate::model::{Entry, ScoreRecord, SectionInfo, SectionRecord, Student};
use rusqlite::Connection;
use std::path::Path;
use uuid::Uuid;

pub const DB_FILE: &str = "grades.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sections(
            id TEXT PRIMARY KEY,
            info TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            section_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            PRIMARY KEY(section_id, student_id),
            FOREIGN KEY(section_id) REFERENCES sections(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_section ON enrollments(section_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_student ON enrollments(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS scores(
            id TEXT PRIMARY KEY,
            section_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            col_id TEXT NOT NULL,
            entry TEXT NOT NULL,
            updated_at TEXT,
            UNIQUE(section_id, student_id, col_id),
            FOREIGN KEY(section_id) REFERENCES sections(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_scores_section ON scores(section_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_scores_student ON scores(student_id)",
        [],
    )?;

    Ok(conn)
}

/// Durable copy of students and sections.
///
/// Storage failures surface as the single opaque `Db` error kind wrapping the
/// underlying message; callers decide whether to retry, this layer never
/// does.
pub struct GradesDao {
    conn: Connection,
}

impl GradesDao {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }

    pub fn upsert_student(&self, student: &Student) -> Result<(), GradesErr> {
        self.conn.execute(
            "INSERT INTO students(id, first_name, last_name, updated_at)
             VALUES(?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
               first_name = excluded.first_name,
               last_name = excluded.last_name,
               updated_at = excluded.updated_at",
            (
                &student.id,
                &student.first_name,
                &student.last_name,
                Self::now(),
            ),
        )?;
        Ok(())
    }

    pub fn get_student(&self, student_id: &str) -> Result<Student, GradesErr> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, first_name, last_name FROM students WHERE id = ?")?;
        let mut rows = stmt.query([student_id])?;
        match rows.next()? {
            Some(row) => Ok(Student {
                id: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
            }),
            None => Err(GradesErr::not_found(format!(
                "unknown studentId \"{}\"",
                student_id
            ))),
        }
    }

    pub fn load_students(&self) -> Result<Vec<Student>, GradesErr> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, first_name, last_name FROM students ORDER BY id")?;
        let students = stmt
            .query_map([], |row| {
                Ok(Student {
                    id: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                })
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        Ok(students)
    }

    /// Create or replace a section. Replacement is total: enrollments and
    /// scores for the old section are dropped along with its schema.
    pub fn replace_section(&self, info: &SectionInfo) -> Result<(), GradesErr> {
        let info_json = serde_json::to_string(info).map_err(|e| GradesErr::db(e.to_string()))?;
        self.conn
            .execute("DELETE FROM scores WHERE section_id = ?", [&info.id])?;
        self.conn
            .execute("DELETE FROM enrollments WHERE section_id = ?", [&info.id])?;
        self.conn.execute(
            "INSERT INTO sections(id, info) VALUES(?, ?)
             ON CONFLICT(id) DO UPDATE SET info = excluded.info",
            (&info.id, &info_json),
        )?;
        Ok(())
    }

    pub fn remove_section(&self, section_id: &str) -> Result<(), GradesErr> {
        self.conn
            .execute("DELETE FROM scores WHERE section_id = ?", [section_id])?;
        self.conn
            .execute("DELETE FROM enrollments WHERE section_id = ?", [section_id])?;
        let removed = self
            .conn
            .execute("DELETE FROM sections WHERE id = ?", [section_id])?;
        if removed == 0 {
            return Err(GradesErr::not_found(format!(
                "unknown sectionId \"{}\"",
                section_id
            )));
        }
        Ok(())
    }

    pub fn enroll_student(&self, section_id: &str, student_id: &str) -> Result<(), GradesErr> {
        self.conn.execute(
            "INSERT OR IGNORE INTO enrollments(section_id, student_id) VALUES(?, ?)",
            (section_id, student_id),
        )?;
        Ok(())
    }

    pub fn upsert_score(
        &self,
        section_id: &str,
        student_id: &str,
        col_id: &str,
        entry: &Entry,
    ) -> Result<(), GradesErr> {
        let entry_json = serde_json::to_string(entry).map_err(|e| GradesErr::db(e.to_string()))?;
        let score_id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO scores(id, section_id, student_id, col_id, entry, updated_at)
             VALUES(?, ?, ?, ?, ?, ?)
             ON CONFLICT(section_id, student_id, col_id) DO UPDATE SET
               entry = excluded.entry,
               updated_at = excluded.updated_at",
            (
                &score_id,
                section_id,
                student_id,
                col_id,
                &entry_json,
                Self::now(),
            ),
        )?;
        Ok(())
    }

    /// Everything needed to rehydrate the in-memory cache, per section:
    /// schema, enrolled student ids, and the sparse raw score table.
    pub fn load_sections(&self) -> Result<Vec<SectionRecord>, GradesErr> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, info FROM sections ORDER BY id")?;
        let infos = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let info_json: String = row.get(1)?;
                Ok((id, info_json))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

        let mut records = Vec::with_capacity(infos.len());
        for (section_id, info_json) in infos {
            let info: SectionInfo = serde_json::from_str(&info_json).map_err(|e| {
                GradesErr::db(format!(
                    "corrupt info for section \"{}\": {}",
                    section_id, e
                ))
            })?;

            let mut enr_stmt = self.conn.prepare(
                "SELECT student_id FROM enrollments WHERE section_id = ? ORDER BY student_id",
            )?;
            let enrolled_students = enr_stmt
                .query_map([&section_id], |row| row.get::<_, String>(0))
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

            let mut score_stmt = self.conn.prepare(
                "SELECT student_id, col_id, entry FROM scores
                 WHERE section_id = ? ORDER BY student_id, col_id",
            )?;
            let raw_scores = score_stmt
                .query_map([&section_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

            let mut scores = Vec::with_capacity(raw_scores.len());
            for (student_id, col_id, entry_json) in raw_scores {
                let entry: Entry = serde_json::from_str(&entry_json).map_err(|e| {
                    GradesErr::db(format!(
                        "corrupt score for section \"{}\" student \"{}\": {}",
                        section_id, student_id, e
                    ))
                })?;
                scores.push(ScoreRecord {
                    student_id,
                    col_id,
                    entry,
                });
            }

            records.push(SectionRecord {
                info,
                enrolled_students,
                scores,
            });
        }
        Ok(records)
    }

    pub fn clear(&self) -> Result<(), GradesErr> {
        self.conn.execute("DELETE FROM scores", [])?;
        self.conn.execute("DELETE FROM enrollments", [])?;
        self.conn.execute("DELETE FROM sections", [])?;
        self.conn.execute("DELETE FROM students", [])?;
        Ok(())
    }
}
