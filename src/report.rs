use crate::roster::Roster;
use crate::student::{subject_order, Grade, Student};
use anyhow::Context;
use chrono::NaiveDateTime;
use log::info;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub const DEFAULT_REPORT_FILE: &str = "report.txt";
pub const REPORT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const NO_STUDENTS: &str = "No students available";
pub const NO_DATA: &str = "No data available";

const MIN_ID_WIDTH: usize = 6;
const MIN_NAME_WIDTH: usize = 10;
const TOTAL_WIDTH: usize = 9;
const AVERAGE_WIDTH: usize = 8;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentResult {
    pub id: String,
    pub name: String,
    pub total: f64,
    pub average: f64,
    pub grade: Grade,
}

impl StudentResult {
    pub fn from_student(s: &Student) -> Self {
        Self {
            id: s.id().to_string(),
            name: s.name.clone(),
            total: s.total(),
            average: s.average(),
            grade: s.grade(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GradeCount {
    pub grade: Grade,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectAverage {
    pub subject: String,
    pub average: f64,
    /// Number of (student, subject) pairs averaged.
    pub count: usize,
}

/// Everything the end-of-session report shows, computed once from the roster.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    pub generated_at: String,
    pub student_count: usize,
    pub subject_entry_count: usize,
    pub class_average: f64,
    pub grade_distribution: Vec<GradeCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_student: Option<StudentResult>,
    pub subject_averages: Vec<SubjectAverage>,
    pub ranking: Vec<StudentResult>,
}

impl ClassSummary {
    /// With no students every section is left empty.
    pub fn build(roster: &Roster, generated_at: NaiveDateTime) -> Self {
        let generated_at = generated_at.format(REPORT_TIME_FORMAT).to_string();
        let students = roster.list_all();
        if students.is_empty() {
            return Self {
                generated_at,
                student_count: 0,
                subject_entry_count: 0,
                class_average: 0.0,
                grade_distribution: Vec::new(),
                top_student: None,
                subject_averages: Vec::new(),
                ranking: Vec::new(),
            };
        }

        let ranking: Vec<StudentResult> = rank_by_average(&students)
            .into_iter()
            .map(StudentResult::from_student)
            .collect();

        Self {
            generated_at,
            student_count: students.len(),
            subject_entry_count: students.iter().map(|s| s.subjects().len()).sum(),
            class_average: class_average(&students),
            grade_distribution: grade_distribution(&students),
            top_student: ranking.first().cloned(),
            subject_averages: subject_averages(&students),
            ranking,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.student_count == 0
    }
}

/// Stable sort by average, best first. Equal averages keep their input order.
pub fn rank_by_average<'a>(students: &[&'a Student]) -> Vec<&'a Student> {
    let mut ranked = students.to_vec();
    ranked.sort_by(|a, b| {
        b.average()
            .partial_cmp(&a.average())
            .unwrap_or(Ordering::Equal)
    });
    ranked
}

pub fn grade_distribution(students: &[&Student]) -> Vec<GradeCount> {
    Grade::ALL
        .iter()
        .map(|&grade| GradeCount {
            grade,
            count: students.iter().filter(|s| s.grade() == grade).count(),
        })
        .collect()
}

pub fn subject_averages(students: &[&Student]) -> Vec<SubjectAverage> {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for s in students {
        for (subject, mark) in s.subjects() {
            let e = sums.entry(subject.as_str()).or_insert((0.0, 0));
            e.0 += *mark;
            e.1 += 1;
        }
    }
    let mut out: Vec<SubjectAverage> = sums
        .into_iter()
        .map(|(subject, (sum, count))| SubjectAverage {
            subject: subject.to_string(),
            average: sum / (count as f64),
            count,
        })
        .collect();
    out.sort_by(|a, b| subject_order(&a.subject, &b.subject));
    out
}

/// Mean of each student's own average, not of all marks pooled together.
pub fn class_average(students: &[&Student]) -> f64 {
    if students.is_empty() {
        return 0.0;
    }
    let sum: f64 = students.iter().map(|s| s.average()).sum();
    sum / (students.len() as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableWidths {
    pub id: usize,
    pub name: usize,
}

impl TableWidths {
    pub fn for_rows(rows: &[StudentResult]) -> Self {
        let id = rows
            .iter()
            .map(|r| r.id.chars().count())
            .max()
            .unwrap_or(0)
            .max(MIN_ID_WIDTH);
        let name = rows
            .iter()
            .map(|r| r.name.chars().count())
            .max()
            .unwrap_or(0)
            .max(MIN_NAME_WIDTH);
        Self { id, name }
    }
}

pub fn results_for(students: &[&Student]) -> Vec<StudentResult> {
    students
        .iter()
        .map(|s| StudentResult::from_student(s))
        .collect()
}

/// Renders rows in the order given. Output ends with a newline.
pub fn render_table(rows: &[StudentResult], widths: TableWidths) -> String {
    if rows.is_empty() {
        return format!("{}\n", NO_STUDENTS);
    }
    let (iw, nw) = (widths.id, widths.name);
    let (tw, aw) = (TOTAL_WIDTH, AVERAGE_WIDTH);
    let mut out = String::new();
    out.push_str(&format!(
        "{:<iw$} | {:<nw$} | {:>tw$} | {:>aw$} | Grade\n",
        "ID", "Name", "Total", "Average"
    ));
    out.push_str(&format!(
        "{}-+-{}-+-{}-+-{}-+------\n",
        "-".repeat(iw),
        "-".repeat(nw),
        "-".repeat(tw),
        "-".repeat(aw)
    ));
    for r in rows {
        out.push_str(&format!(
            "{:<iw$} | {:<nw$} | {:>tw$.2} | {:>aw$.2} | {}\n",
            r.id, r.name, r.total, r.average, r.grade
        ));
    }
    out
}

pub fn render_report(summary: &ClassSummary) -> String {
    let mut out = String::new();
    out.push_str("STUDENT PERFORMANCE REPORT\n");
    out.push_str(&format!("Generated: {}\n", summary.generated_at));
    out.push_str(&format!("{}\n\n", "=".repeat(40)));

    if summary.is_empty() {
        out.push_str(NO_DATA);
        out.push('\n');
        return out;
    }

    out.push_str(&format!("Students: {}\n", summary.student_count));
    out.push_str(&format!("Subject entries: {}\n", summary.subject_entry_count));
    out.push_str(&format!("Class average: {:.2}\n\n", summary.class_average));

    out.push_str("Grade distribution:\n");
    for gc in &summary.grade_distribution {
        out.push_str(&format!("  {:<2}: {}\n", gc.grade.as_str(), gc.count));
    }
    out.push('\n');

    if let Some(top) = &summary.top_student {
        out.push_str(&format!(
            "Top student: {} ({}), average {:.2}, grade {}\n\n",
            top.name, top.id, top.average, top.grade
        ));
    }

    out.push_str("Subject averages:\n");
    if summary.subject_averages.is_empty() {
        out.push_str("  (none)\n");
    }
    for sa in &summary.subject_averages {
        out.push_str(&format!(
            "  {}: {:.2} (n={})\n",
            sa.subject, sa.average, sa.count
        ));
    }
    out.push('\n');

    out.push_str("Results:\n");
    out.push_str(&render_table(
        &summary.ranking,
        TableWidths::for_rows(&summary.ranking),
    ));
    out
}

/// Creates or truncates `path` and writes `text` verbatim.
pub fn write_report(path: &Path, text: &str) -> anyhow::Result<()> {
    let mut f = File::create(path)
        .with_context(|| format!("failed to create report {}", path.to_string_lossy()))?;
    f.write_all(text.as_bytes())
        .with_context(|| format!("failed to write report {}", path.to_string_lossy()))?;
    f.flush()
        .with_context(|| format!("failed to flush report {}", path.to_string_lossy()))?;
    info!("wrote report to {} ({} bytes)", path.display(), text.len());
    Ok(())
}

pub fn write_summary_json(path: &Path, summary: &ClassSummary) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(summary).context("failed to serialize summary")?;
    std::fs::write(path, text)
        .with_context(|| format!("failed to write summary {}", path.to_string_lossy()))?;
    info!(
        "wrote summary for {} students to {}",
        summary.student_count,
        path.display()
    );
    Ok(())
}
