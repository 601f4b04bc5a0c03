use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub id: String,
    pub student_id: String,
    pub topic_id: String,
    pub marks: f64,
    pub max_marks: f64,
    pub date: NaiveDate,
    pub test_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub subject_id: String,
    pub name: String,
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub code: String,
    pub semester: u32,
    pub faculty_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Strong,
    Moderate,
    Weak,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Category::Strong => "strong",
            Category::Moderate => "moderate",
            Category::Weak => "weak",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Pending,
    Completed,
    Missed,
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Missed => "missed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: String,
    pub student_id: String,
    pub topic_id: String,
    pub subject_id: String,
    pub scheduled_date: NaiveDate,
    pub status: ScheduleStatus,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicSummary {
    pub topic_id: String,
    pub topic_name: String,
    pub subject_id: String,
    pub average: f64,
    pub category: Category,
    pub record_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectSummary {
    pub subject_id: String,
    pub code: String,
    pub name: String,
    pub average: Option<f64>,
    pub topics_with_data: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub strong: usize,
    pub moderate: usize,
    pub weak: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub test_name: String,
    pub topic_id: String,
    pub percentage: f64,
}
