use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    PerformanceRecord, Priority, ScheduleEntry, ScheduleStatus, Subject, Topic,
};
use crate::performance;

pub const SUBJECTS_FILE: &str = "subjects.csv";
pub const TOPICS_FILE: &str = "topics.csv";
pub const PERFORMANCE_FILE: &str = "performance.csv";
pub const SCHEDULE_FILE: &str = "schedule.csv";

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub subjects: Vec<Subject>,
    pub topics: Vec<Topic>,
    pub records: Vec<PerformanceRecord>,
    pub schedule: Vec<ScheduleEntry>,
}

#[derive(serde::Deserialize)]
struct PerformanceRow {
    id: Option<String>,
    student_id: String,
    topic_id: String,
    marks: f64,
    max_marks: f64,
    date: NaiveDate,
    test_name: String,
}

impl From<PerformanceRow> for PerformanceRecord {
    fn from(row: PerformanceRow) -> Self {
        let id = row
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));
        PerformanceRecord {
            id,
            student_id: row.student_id,
            topic_id: row.topic_id,
            marks: row.marks,
            max_marks: row.max_marks,
            date: row.date,
            test_name: row.test_name,
        }
    }
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut rows = Vec::new();
    for (line, result) in reader.deserialize::<T>().enumerate() {
        let row = result.with_context(|| format!("{}: bad row {}", path.display(), line + 1))?;
        rows.push(row);
    }
    Ok(rows)
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn load_dataset(dir: &Path) -> anyhow::Result<Dataset> {
    let subjects: Vec<Subject> = read_rows(&dir.join(SUBJECTS_FILE))?;
    let topics: Vec<Topic> = read_rows(&dir.join(TOPICS_FILE))?;
    let records: Vec<PerformanceRecord> = read_rows::<PerformanceRow>(&dir.join(PERFORMANCE_FILE))?
        .into_iter()
        .map(PerformanceRecord::from)
        .collect();

    let schedule_path = dir.join(SCHEDULE_FILE);
    let schedule = if schedule_path.exists() {
        read_rows(&schedule_path)?
    } else {
        debug!("no {} in {}, schedule is empty", SCHEDULE_FILE, dir.display());
        Vec::new()
    };

    info!(
        subjects = subjects.len(),
        topics = topics.len(),
        records = records.len(),
        schedule = schedule.len(),
        "loaded dataset from {}",
        dir.display()
    );

    Ok(Dataset {
        subjects,
        topics,
        records,
        schedule,
    })
}

fn has_content(path: &Path) -> bool {
    path.metadata().map(|m| m.len() > 0).unwrap_or(false)
}

/// Rows already in `path`; a missing or empty file has none.
fn count_rows<T: DeserializeOwned>(path: &Path) -> anyhow::Result<usize> {
    if !has_content(path) {
        return Ok(0);
    }
    Ok(read_rows::<T>(path)?.len())
}

/// Append a single row, writing the header first when the file is missing or empty.
fn append_row<T: Serialize>(path: &Path, row: &T) -> anyhow::Result<()> {
    let write_header = !has_content(path);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {} for append", path.display()))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(write_header)
        .from_writer(file);
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}

/// Append one performance row, assigning `p{n+1}` when `record.id` is empty.
///
/// Returns the id that was written.
pub fn append_record(path: &Path, mut record: PerformanceRecord) -> anyhow::Result<String> {
    performance::compute_percentage(record.marks, record.max_marks)?;

    if record.id.trim().is_empty() {
        record.id = format!("p{}", count_rows::<PerformanceRow>(path)? + 1);
    }
    append_row(path, &record)?;

    debug!(id = %record.id, topic = %record.topic_id, "appended performance record");
    Ok(record.id)
}

pub fn save_schedule(dir: &Path, entries: &[ScheduleEntry]) -> anyhow::Result<()> {
    write_rows(&dir.join(SCHEDULE_FILE), entries)
}

/// Order for a new topic appended to `subject_id`.
pub fn next_topic_order(topics: &[Topic], subject_id: &str) -> u32 {
    topics
        .iter()
        .filter(|t| t.subject_id == subject_id)
        .map(|t| t.order)
        .max()
        .unwrap_or(0)
        + 1
}

/// `{prefix}{n}` for the smallest n past the row count that no existing id uses.
fn next_id<'a>(prefix: &str, existing: impl Iterator<Item = &'a str> + Clone) -> String {
    let mut n = existing.clone().count() + 1;
    loop {
        let candidate = format!("{prefix}{n}");
        if !existing.clone().any(|id| id == candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn read_or_empty<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    if has_content(path) {
        read_rows(path)
    } else {
        Ok(Vec::new())
    }
}

/// Add a topic at the end of its subject. The subject must already exist.
pub fn add_topic(dir: &Path, subject_id: &str, name: &str) -> anyhow::Result<Topic> {
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("topic name must not be empty");
    }
    let subjects: Vec<Subject> = read_or_empty(&dir.join(SUBJECTS_FILE))?;
    if !subjects.iter().any(|s| s.id == subject_id) {
        anyhow::bail!("unknown subject {subject_id}");
    }

    let path = dir.join(TOPICS_FILE);
    let topics: Vec<Topic> = read_or_empty(&path)?;
    let topic = Topic {
        id: next_id("t", topics.iter().map(|t| t.id.as_str())),
        subject_id: subject_id.to_string(),
        name: name.to_string(),
        order: next_topic_order(&topics, subject_id),
    };
    append_row(&path, &topic)?;

    debug!(id = %topic.id, subject = %topic.subject_id, order = topic.order, "added topic");
    Ok(topic)
}

pub fn add_subject(
    dir: &Path,
    name: &str,
    code: &str,
    semester: u32,
    faculty_name: &str,
) -> anyhow::Result<Subject> {
    let (name, code) = (name.trim(), code.trim());
    if name.is_empty() || code.is_empty() {
        anyhow::bail!("subject name and code must not be empty");
    }

    let path = dir.join(SUBJECTS_FILE);
    let subjects: Vec<Subject> = read_or_empty(&path)?;
    let subject = Subject {
        id: next_id("s", subjects.iter().map(|s| s.id.as_str())),
        name: name.to_string(),
        code: code.to_string(),
        semester,
        faculty_name: faculty_name.to_string(),
    };
    append_row(&path, &subject)?;

    debug!(id = %subject.id, code = %subject.code, "added subject");
    Ok(subject)
}

/// Returns `false` when no topic has the given id. Performance rows are left untouched.
pub fn remove_topic(dir: &Path, topic_id: &str) -> anyhow::Result<bool> {
    let path = dir.join(TOPICS_FILE);
    let mut topics: Vec<Topic> = read_rows(&path)?;
    let before = topics.len();
    topics.retain(|t| t.id != topic_id);
    if topics.len() == before {
        return Ok(false);
    }
    write_rows(&path, &topics)?;
    Ok(true)
}

fn date(year: i32, month: u32, day: u32) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).context("invalid date")
}

pub fn sample_dataset() -> anyhow::Result<Dataset> {
    let subjects = [
        ("s1", "Machine Learning", "CS501"),
        ("s2", "Deep Learning", "CS502"),
        ("s3", "Natural Language Processing", "CS503"),
        ("s4", "Computer Vision", "CS504"),
    ]
    .into_iter()
    .map(|(id, name, code)| Subject {
        id: id.to_string(),
        name: name.to_string(),
        code: code.to_string(),
        semester: 5,
        faculty_name: "Dr. Kumar".to_string(),
    })
    .collect();

    let topic_names: [(&str, &[&str]); 4] = [
        (
            "s1",
            &[
                "Linear Regression",
                "Logistic Regression",
                "Decision Trees",
                "Support Vector Machines",
                "Neural Networks Basics",
            ],
        ),
        (
            "s2",
            &[
                "Feedforward Networks",
                "Convolutional Neural Networks",
                "Recurrent Neural Networks",
                "Transformers",
            ],
        ),
        ("s3", &["Text Preprocessing", "Word Embeddings", "Sequence Models"]),
        (
            "s4",
            &[
                "Image Processing Fundamentals",
                "Object Detection",
                "Image Segmentation",
            ],
        ),
    ];
    let mut topics: Vec<Topic> = Vec::new();
    for (subject_id, names) in topic_names {
        for name in names {
            let order = next_topic_order(&topics, subject_id);
            topics.push(Topic {
                id: next_id("t", topics.iter().map(|t| t.id.as_str())),
                subject_id: subject_id.to_string(),
                name: name.to_string(),
                order,
            });
        }
    }

    let scores = [
        ("t1", 18.0, date(2026, 1, 15)?, "Internal Test 1"),
        ("t2", 12.0, date(2026, 1, 20)?, "Internal Test 1"),
        ("t3", 15.0, date(2026, 1, 25)?, "Internal Test 1"),
        ("t4", 9.0, date(2026, 1, 30)?, "Internal Test 2"),
        ("t5", 16.0, date(2026, 2, 5)?, "Internal Test 2"),
        ("t6", 17.0, date(2026, 1, 18)?, "Quiz 1"),
        ("t7", 11.0, date(2026, 1, 28)?, "Internal Test 1"),
        ("t8", 14.0, date(2026, 2, 3)?, "Quiz 2"),
    ];
    let records = scores
        .into_iter()
        .enumerate()
        .map(|(i, (topic_id, marks, date, test_name))| PerformanceRecord {
            id: format!("p{}", i + 1),
            student_id: "1".to_string(),
            topic_id: topic_id.to_string(),
            marks,
            max_marks: 20.0,
            date,
            test_name: test_name.to_string(),
        })
        .collect();

    let sessions = [
        ("t2", "s1", date(2026, 2, 12)?, Priority::High),
        ("t4", "s1", date(2026, 2, 12)?, Priority::High),
        ("t7", "s2", date(2026, 2, 13)?, Priority::High),
        ("t3", "s1", date(2026, 2, 14)?, Priority::Medium),
        ("t1", "s1", date(2026, 2, 16)?, Priority::Low),
        ("t8", "s2", date(2026, 2, 17)?, Priority::Medium),
    ];
    let schedule = sessions
        .into_iter()
        .enumerate()
        .map(|(i, (topic_id, subject_id, scheduled_date, priority))| ScheduleEntry {
            id: format!("sch{}", i + 1),
            student_id: "1".to_string(),
            topic_id: topic_id.to_string(),
            subject_id: subject_id.to_string(),
            scheduled_date,
            status: ScheduleStatus::Pending,
            priority,
        })
        .collect();

    Ok(Dataset {
        subjects,
        topics,
        records,
        schedule,
    })
}

pub fn write_sample_dataset(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let dataset = sample_dataset()?;

    let paths = vec![
        dir.join(SUBJECTS_FILE),
        dir.join(TOPICS_FILE),
        dir.join(PERFORMANCE_FILE),
        dir.join(SCHEDULE_FILE),
    ];
    write_rows(&paths[0], &dataset.subjects)?;
    write_rows(&paths[1], &dataset.topics)?;
    write_rows(&paths[2], &dataset.records)?;
    write_rows(&paths[3], &dataset.schedule)?;

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_record(id: &str, max_marks: f64) -> PerformanceRecord {
        PerformanceRecord {
            id: id.to_string(),
            student_id: "1".to_string(),
            topic_id: "t4".to_string(),
            marks: 14.0,
            max_marks,
            date: NaiveDate::from_ymd_opt(2026, 2, 10).unwrap(),
            test_name: "Quiz 3".to_string(),
        }
    }

    #[test]
    fn sample_dataset_round_trips_through_csv() {
        let dir = TempDir::new().unwrap();
        write_sample_dataset(dir.path()).unwrap();
        let dataset = load_dataset(dir.path()).unwrap();

        assert_eq!(dataset.subjects.len(), 4);
        assert_eq!(dataset.topics.len(), 15);
        assert_eq!(dataset.records.len(), 8);
        assert_eq!(dataset.schedule.len(), 6);
        assert_eq!(dataset.topics[14].id, "t15");
        assert_eq!(dataset.topics[14].order, 3);
        assert_eq!(dataset.schedule[2].priority, Priority::High);
    }

    #[test]
    fn schedule_file_is_optional() {
        let dir = TempDir::new().unwrap();
        write_sample_dataset(dir.path()).unwrap();
        std::fs::remove_file(dir.path().join(SCHEDULE_FILE)).unwrap();
        let dataset = load_dataset(dir.path()).unwrap();
        assert!(dataset.schedule.is_empty());
    }

    #[test]
    fn missing_performance_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        write_sample_dataset(dir.path()).unwrap();
        std::fs::remove_file(dir.path().join(PERFORMANCE_FILE)).unwrap();
        assert!(load_dataset(dir.path()).is_err());
    }

    #[test]
    fn blank_ids_are_generated_on_load() {
        let dir = TempDir::new().unwrap();
        write_sample_dataset(dir.path()).unwrap();
        std::fs::write(
            dir.path().join(PERFORMANCE_FILE),
            "id,student_id,topic_id,marks,max_marks,date,test_name\n\
             ,1,t1,10,20,2026-01-15,Quiz 1\n",
        )
        .unwrap();
        let dataset = load_dataset(dir.path()).unwrap();
        assert!(dataset.records[0].id.starts_with("import-"));
    }

    #[test]
    fn append_assigns_sequential_id() {
        let dir = TempDir::new().unwrap();
        write_sample_dataset(dir.path()).unwrap();
        let path = dir.path().join(PERFORMANCE_FILE);

        let id = append_record(&path, sample_record("", 20.0)).unwrap();
        assert_eq!(id, "p9");

        let dataset = load_dataset(dir.path()).unwrap();
        assert_eq!(dataset.records.len(), 9);
        assert_eq!(dataset.records[8].test_name, "Quiz 3");
    }

    #[test]
    fn append_creates_file_with_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PERFORMANCE_FILE);
        let id = append_record(&path, sample_record("", 20.0)).unwrap();
        assert_eq!(id, "p1");
        let rows: Vec<PerformanceRow> = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn append_to_empty_file_writes_header() {
        let dir = TempDir::new().unwrap();
        write_sample_dataset(dir.path()).unwrap();
        let path = dir.path().join(PERFORMANCE_FILE);
        std::fs::write(&path, "").unwrap();

        let id = append_record(&path, sample_record("", 20.0)).unwrap();
        assert_eq!(id, "p1");

        let dataset = load_dataset(dir.path()).unwrap();
        assert_eq!(dataset.records.len(), 1);
        assert_eq!(dataset.records[0].id, "p1");
    }

    #[test]
    fn append_rejects_zero_max_marks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PERFORMANCE_FILE);
        assert!(append_record(&path, sample_record("p1", 0.0)).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn saved_schedule_is_reloaded() {
        let dir = TempDir::new().unwrap();
        write_sample_dataset(dir.path()).unwrap();
        let mut dataset = load_dataset(dir.path()).unwrap();
        dataset.schedule[0].status = ScheduleStatus::Completed;
        save_schedule(dir.path(), &dataset.schedule).unwrap();

        let reloaded = load_dataset(dir.path()).unwrap();
        assert_eq!(reloaded.schedule[0].status, ScheduleStatus::Completed);
        assert_eq!(reloaded.schedule[1].status, ScheduleStatus::Pending);
    }

    #[test]
    fn added_topic_goes_last_in_its_subject() {
        let dir = TempDir::new().unwrap();
        write_sample_dataset(dir.path()).unwrap();

        let topic = add_topic(dir.path(), "s3", "Attention Mechanisms").unwrap();
        assert_eq!(topic.id, "t16");
        assert_eq!(topic.order, 4);

        let dataset = load_dataset(dir.path()).unwrap();
        assert_eq!(dataset.topics.len(), 16);
        assert_eq!(dataset.topics[15].name, "Attention Mechanisms");
    }

    #[test]
    fn add_topic_requires_known_subject_and_name() {
        let dir = TempDir::new().unwrap();
        write_sample_dataset(dir.path()).unwrap();
        assert!(add_topic(dir.path(), "s9", "Orphan").is_err());
        assert!(add_topic(dir.path(), "s1", "  ").is_err());
        assert_eq!(load_dataset(dir.path()).unwrap().topics.len(), 15);
    }

    #[test]
    fn added_subject_gets_next_id_and_accepts_topics() {
        let dir = TempDir::new().unwrap();
        write_sample_dataset(dir.path()).unwrap();

        let subject = add_subject(dir.path(), "Reinforcement Learning", "CS505", 5, "Dr. Kumar").unwrap();
        assert_eq!(subject.id, "s5");
        assert!(add_subject(dir.path(), "", "CS506", 5, "Dr. Kumar").is_err());

        let topic = add_topic(dir.path(), "s5", "Markov Decision Processes").unwrap();
        assert_eq!(topic.order, 1);
    }

    #[test]
    fn removed_topic_disappears_from_dataset() {
        let dir = TempDir::new().unwrap();
        write_sample_dataset(dir.path()).unwrap();

        assert!(remove_topic(dir.path(), "t4").unwrap());
        assert!(!remove_topic(dir.path(), "t4").unwrap());

        let dataset = load_dataset(dir.path()).unwrap();
        assert_eq!(dataset.topics.len(), 14);
        assert!(dataset.topics.iter().all(|t| t.id != "t4"));
        assert_eq!(dataset.records.len(), 8);

        // 14 rows remain but t15 is still taken
        let topic = add_topic(dir.path(), "s1", "Ensembles").unwrap();
        assert_eq!(topic.id, "t16");
    }

    #[test]
    fn topic_order_follows_subject_maximum() {
        let dataset = sample_dataset().unwrap();
        assert_eq!(next_topic_order(&dataset.topics, "s1"), 6);
        assert_eq!(next_topic_order(&dataset.topics, "s3"), 4);
        assert_eq!(next_topic_order(&dataset.topics, "s9"), 1);
    }
}
