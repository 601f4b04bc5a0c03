use std::collections::HashMap;

use crate::error::AggregateError;
use crate::models::{
    Category, CategoryCounts, PerformanceRecord, Subject, SubjectSummary, Topic, TopicSummary,
    TrendPoint,
};

pub const STRONG_THRESHOLD: f64 = 75.0;
pub const MODERATE_THRESHOLD: f64 = 50.0;

/// Score of a single test as a percentage of its maximum marks.
///
/// The result is not clamped: marks above `max_marks` give values over 100.
/// Non-finite marks and non-positive or non-finite maximums are rejected.
pub fn compute_percentage(marks: f64, max_marks: f64) -> Result<f64, AggregateError> {
    if !marks.is_finite() || !max_marks.is_finite() || max_marks <= 0.0 {
        return Err(AggregateError::InvalidInput { marks, max_marks });
    }
    Ok(marks / max_marks * 100.0)
}

/// Mean of the per-record percentages for `topic_id`.
///
/// Returns `Ok(None)` when no record belongs to the topic. The mean is taken
/// over percentages, not over summed marks, so records with different
/// maximums weigh equally.
pub fn average_for_topic(
    topic_id: &str,
    records: &[PerformanceRecord],
) -> Result<Option<f64>, AggregateError> {
    let mut total = 0.0;
    let mut count = 0usize;

    for record in records.iter().filter(|r| r.topic_id == topic_id) {
        total += compute_percentage(record.marks, record.max_marks)?;
        count += 1;
    }

    if count == 0 {
        return Ok(None);
    }
    Ok(Some(total / count as f64))
}

pub fn categorize(average: f64) -> Category {
    if average >= STRONG_THRESHOLD {
        Category::Strong
    } else if average >= MODERATE_THRESHOLD {
        Category::Moderate
    } else {
        Category::Weak
    }
}

pub fn records_for_student(records: &[PerformanceRecord], student_id: &str) -> Vec<PerformanceRecord> {
    records
        .iter()
        .filter(|r| r.student_id == student_id)
        .cloned()
        .collect()
}

/// One summary per topic with at least one record, in topic order.
pub fn summarize_topics(
    topics: &[Topic],
    records: &[PerformanceRecord],
) -> Result<Vec<TopicSummary>, AggregateError> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.topic_id.as_str()).or_insert(0) += 1;
    }

    let mut summaries = Vec::new();
    for topic in topics {
        let Some(average) = average_for_topic(&topic.id, records)? else {
            continue;
        };
        summaries.push(TopicSummary {
            topic_id: topic.id.clone(),
            topic_name: topic.name.clone(),
            subject_id: topic.subject_id.clone(),
            average,
            category: categorize(average),
            record_count: counts.get(topic.id.as_str()).copied().unwrap_or(0),
        });
    }

    Ok(summaries)
}

/// Weakest topics first.
pub fn rank_topics(mut summaries: Vec<TopicSummary>) -> Vec<TopicSummary> {
    summaries.sort_by(|a, b| {
        a.average
            .partial_cmp(&b.average)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    summaries
}

/// Unweighted mean of the topic averages for a subject.
///
/// Topics without records are skipped; a topic with one test counts as much
/// as a topic with ten.
pub fn subject_average(
    subject_id: &str,
    topics: &[Topic],
    records: &[PerformanceRecord],
) -> Result<Option<f64>, AggregateError> {
    let mut total = 0.0;
    let mut count = 0usize;
    for topic in topics.iter().filter(|t| t.subject_id == subject_id) {
        if let Some(average) = average_for_topic(&topic.id, records)? {
            total += average;
            count += 1;
        }
    }

    if count == 0 {
        return Ok(None);
    }
    Ok(Some(total / count as f64))
}

pub fn summarize_subjects(
    subjects: &[Subject],
    topics: &[Topic],
    records: &[PerformanceRecord],
) -> Result<Vec<SubjectSummary>, AggregateError> {
    subjects
        .iter()
        .map(|subject| {
            let topics_with_data = topics
                .iter()
                .filter(|t| t.subject_id == subject.id)
                .filter(|t| records.iter().any(|r| r.topic_id == t.id))
                .count();
            Ok(SubjectSummary {
                subject_id: subject.id.clone(),
                code: subject.code.clone(),
                name: subject.name.clone(),
                average: subject_average(&subject.id, topics, records)?,
                topics_with_data,
            })
        })
        .collect()
}

/// Mean percentage across every record, regardless of topic.
pub fn overall_average(records: &[PerformanceRecord]) -> Result<Option<f64>, AggregateError> {
    if records.is_empty() {
        return Ok(None);
    }
    let mut total = 0.0;
    for record in records {
        total += compute_percentage(record.marks, record.max_marks)?;
    }
    Ok(Some(total / records.len() as f64))
}

pub fn category_distribution(summaries: &[TopicSummary]) -> CategoryCounts {
    let mut counts = CategoryCounts::default();
    for summary in summaries {
        match summary.category {
            Category::Strong => counts.strong += 1,
            Category::Moderate => counts.moderate += 1,
            Category::Weak => counts.weak += 1,
        }
    }
    counts
}

pub fn weak_topics(summaries: &[TopicSummary], limit: usize) -> Vec<TopicSummary> {
    summaries
        .iter()
        .filter(|s| s.category == Category::Weak)
        .take(limit)
        .cloned()
        .collect()
}

/// Records in date order with their percentage. Same-day records keep input order.
pub fn score_trend(records: &[PerformanceRecord]) -> Result<Vec<TrendPoint>, AggregateError> {
    let mut sorted: Vec<&PerformanceRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.date);

    sorted
        .into_iter()
        .map(|r| {
            Ok(TrendPoint {
                date: r.date,
                test_name: r.test_name.clone(),
                topic_id: r.topic_id.clone(),
                percentage: compute_percentage(r.marks, r.max_marks)?,
            })
        })
        .collect()
}
