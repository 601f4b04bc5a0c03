use std::collections::HashMap;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::config::ReportConfig;
use crate::data::Dataset;
use crate::error::AggregateError;
use crate::models::PerformanceRecord;
use crate::{performance, schedule};

pub fn build_report(
    student: Option<&str>,
    dataset: &Dataset,
    records: &[PerformanceRecord],
    today: NaiveDate,
    options: &ReportConfig,
) -> Result<String, AggregateError> {
    let summaries = performance::summarize_topics(&dataset.topics, records)?;
    let subjects = performance::summarize_subjects(&dataset.subjects, &dataset.topics, records)?;
    let overall = performance::overall_average(records)?;
    let counts = performance::category_distribution(&summaries);
    let weak = performance::weak_topics(&summaries, options.weak_topic_limit);
    let ranked = performance::rank_topics(summaries);

    let topic_names: HashMap<&str, &str> = dataset
        .topics
        .iter()
        .map(|t| (t.id.as_str(), t.name.as_str()))
        .collect();

    let mut output = String::new();
    let label = student.map_or_else(|| "all students".to_string(), |s| format!("student {s}"));

    let _ = writeln!(output, "# Topic Reinforcement Report");
    let _ = writeln!(output, "Generated for {} on {}", label, today);
    let _ = writeln!(output);

    let _ = writeln!(output, "## Overview");
    match overall {
        Some(average) => {
            let _ = writeln!(
                output,
                "- Average score: {:.1}% across {} tests",
                average,
                records.len()
            );
        }
        None => {
            let _ = writeln!(output, "- No tests recorded.");
        }
    }
    let _ = writeln!(
        output,
        "- Topics: {} strong, {} moderate, {} weak",
        counts.strong, counts.moderate, counts.weak
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Subject Averages");
    if subjects.is_empty() {
        let _ = writeln!(output, "No subjects defined.");
    }
    for subject in &subjects {
        match subject.average {
            Some(average) => {
                let _ = writeln!(
                    output,
                    "- {} {}: {:.0}% ({} topics with data)",
                    subject.code, subject.name, average, subject.topics_with_data
                );
            }
            None => {
                let _ = writeln!(output, "- {} {}: no data", subject.code, subject.name);
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Topics Needing Attention");
    if weak.is_empty() {
        let _ = writeln!(output, "No weak topics.");
    } else {
        for topic in &weak {
            let _ = writeln!(output, "- {}: {:.0}%", topic.topic_name, topic.average);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Topic Ranking");
    if ranked.is_empty() {
        let _ = writeln!(output, "No topics with recorded tests.");
    } else {
        for topic in ranked.iter().take(options.top_topics) {
            let _ = writeln!(
                output,
                "- {} ({}): {:.0}% {} across {} tests",
                topic.topic_name, topic.subject_id, topic.average, topic.category, topic.record_count
            );
        }
    }

    let entries: Vec<_> = dataset
        .schedule
        .iter()
        .filter(|e| student.map_or(true, |s| e.student_id == s))
        .cloned()
        .collect();
    let due = schedule::pending_due_on(&entries, today);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Reinforcement Due Today");
    if due.is_empty() {
        let _ = writeln!(output, "Nothing scheduled.");
    } else {
        for entry in &due {
            let name = topic_names
                .get(entry.topic_id.as_str())
                .copied()
                .unwrap_or(entry.topic_id.as_str());
            let _ = writeln!(output, "- {} ({} priority)", name, entry.priority);
        }
    }

    Ok(output)
}
