use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod config;
mod data;
mod error;
mod models;
mod performance;
mod report;
mod schedule;

use config::Config;
use models::{PerformanceRecord, ScheduleEntry, ScheduleStatus};

#[derive(Parser)]
#[command(name = "topic-reinforcement")]
#[command(about = "Topic performance averages and reinforcement review for students", long_about = None)]
struct Cli {
    /// Directory with subjects.csv, topics.csv, performance.csv and schedule.csv
    #[arg(long, global = true)]
    data: Option<PathBuf>,
    /// Config file (defaults to .topic-reinforcement.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the sample dataset
    Seed {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Rank topics by average score, weakest first
    Topics {
        #[arg(long)]
        student: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Average score per subject
    Subjects {
        #[arg(long)]
        student: Option<String>,
    },
    /// List weak topics
    Weak {
        #[arg(long)]
        student: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show the reinforcement schedule
    Schedule {
        #[arg(long)]
        student: Option<String>,
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Mark a scheduled review session as completed
    Complete {
        /// Schedule entry id, e.g. sch1
        id: String,
    },
    /// Per-test scores in date order
    Trend {
        #[arg(long)]
        student: Option<String>,
    },
    /// Record a test score
    AddRecord {
        #[arg(long)]
        topic: String,
        #[arg(long)]
        student: String,
        #[arg(long)]
        marks: f64,
        #[arg(long, default_value_t = 20.0)]
        max_marks: f64,
        #[arg(long)]
        test_name: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Add a topic at the end of a subject
    AddTopic {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        name: String,
    },
    /// Add a subject
    AddSubject {
        #[arg(long)]
        name: String,
        #[arg(long)]
        code: String,
        #[arg(long, default_value_t = 5)]
        semester: u32,
        #[arg(long, default_value = "")]
        faculty: String,
    },
    /// Delete a topic; its recorded scores stay in performance.csv
    RemoveTopic {
        /// Topic id, e.g. t4
        id: String,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        student: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install logger: {err}");
    }
}

fn select_records(records: &[PerformanceRecord], student: Option<&str>) -> Vec<PerformanceRecord> {
    match student {
        Some(id) => performance::records_for_student(records, id),
        None => records.to_vec(),
    }
}

fn resolve_today(arg: Option<NaiveDate>, config: &Config) -> NaiveDate {
    arg.or(config.schedule.today)
        .unwrap_or_else(|| Utc::now().date_naive())
}

fn print_entries(title: &str, entries: &[ScheduleEntry]) {
    println!("{title}:");
    if entries.is_empty() {
        println!("  (none)");
    }
    for entry in entries {
        println!(
            "  {} {} ({}) {} priority",
            entry.scheduled_date, entry.topic_id, entry.subject_id, entry.priority
        );
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::resolve(cli.config.as_deref())?;
    init_logging(cli.verbose || config.general.verbose);

    let data_dir = cli
        .data
        .clone()
        .unwrap_or_else(|| config.general.data_dir.clone());
    debug!("data directory: {}", data_dir.display());

    match cli.command {
        Commands::Seed { dir } => {
            let dir = dir.unwrap_or(data_dir);
            let paths = data::write_sample_dataset(&dir)?;
            info!(files = paths.len(), "sample dataset written");
            println!("Sample data written to {}.", dir.display());
        }
        Commands::Topics { student, json } => {
            let dataset = data::load_dataset(&data_dir)?;
            let records = select_records(&dataset.records, student.as_deref());
            let ranked = performance::rank_topics(performance::summarize_topics(
                &dataset.topics,
                &records,
            )?);

            if json {
                println!("{}", serde_json::to_string_pretty(&ranked)?);
                return Ok(());
            }
            if ranked.is_empty() {
                println!("No performance records found.");
                return Ok(());
            }
            println!("Topics by average score:");
            for topic in &ranked {
                println!(
                    "- {} ({}) {:.1}% {} across {} tests",
                    topic.topic_name,
                    topic.topic_id,
                    topic.average,
                    topic.category,
                    topic.record_count
                );
            }
        }
        Commands::Subjects { student } => {
            let dataset = data::load_dataset(&data_dir)?;
            let records = select_records(&dataset.records, student.as_deref());
            let summaries =
                performance::summarize_subjects(&dataset.subjects, &dataset.topics, &records)?;

            println!("Subject averages:");
            for subject in &summaries {
                match subject.average {
                    Some(average) => println!(
                        "- {} {} {:.1}% over {} topics",
                        subject.code, subject.name, average, subject.topics_with_data
                    ),
                    None => println!("- {} {} no data", subject.code, subject.name),
                }
            }
        }
        Commands::Weak { student, limit } => {
            let dataset = data::load_dataset(&data_dir)?;
            let records = select_records(&dataset.records, student.as_deref());
            let summaries = performance::summarize_topics(&dataset.topics, &records)?;
            let limit = limit.unwrap_or(config.report.weak_topic_limit);
            let weak = performance::weak_topics(&summaries, limit);

            if weak.is_empty() {
                println!("No weak topics.");
                return Ok(());
            }
            println!("Weak topics:");
            for topic in &weak {
                println!("- {} ({}) {:.1}%", topic.topic_name, topic.topic_id, topic.average);
            }
        }
        Commands::Schedule { student, today } => {
            let dataset = data::load_dataset(&data_dir)?;
            let today = resolve_today(today, &config);
            let entries: Vec<ScheduleEntry> = dataset
                .schedule
                .into_iter()
                .filter(|e| student.as_deref().map_or(true, |s| e.student_id == s))
                .collect();

            print_entries(&format!("Today ({today})"), &schedule::due_on(&entries, today));
            let upcoming = schedule::upcoming_after(&entries, today);
            if upcoming.is_empty() {
                print_entries("Upcoming", &upcoming);
            }
            for (date, group) in schedule::group_by_date(&upcoming) {
                print_entries(&format!("Upcoming {date}"), &group);
            }
            print_entries("Completed", &schedule::completed(&entries));
        }
        Commands::Complete { id } => {
            let mut dataset = data::load_dataset(&data_dir)?;
            match schedule::mark_complete(&mut dataset.schedule, &id) {
                None => anyhow::bail!("no schedule entry with id {id}"),
                Some(ScheduleStatus::Pending) => {}
                Some(status) => {
                    anyhow::bail!("session {id} is {status}, only pending sessions can be completed")
                }
            }
            data::save_schedule(&data_dir, &dataset.schedule)?;
            println!("Session {id} marked as completed.");
        }
        Commands::Trend { student } => {
            let dataset = data::load_dataset(&data_dir)?;
            let records = select_records(&dataset.records, student.as_deref());
            let trend = performance::score_trend(&records)?;
            if trend.is_empty() {
                println!("No performance records found.");
                return Ok(());
            }
            for point in &trend {
                println!(
                    "{} {} {} {:.0}%",
                    point.date, point.topic_id, point.test_name, point.percentage
                );
            }
        }
        Commands::AddRecord {
            topic,
            student,
            marks,
            max_marks,
            test_name,
            date,
        } => {
            let percentage = performance::compute_percentage(marks, max_marks)
                .context("cannot record score")?;
            let record = PerformanceRecord {
                id: String::new(),
                student_id: student,
                topic_id: topic,
                marks,
                max_marks,
                date: date.unwrap_or_else(|| Utc::now().date_naive()),
                test_name,
            };
            let path = data_dir.join(data::PERFORMANCE_FILE);
            let topic_id = record.topic_id.clone();
            let id = data::append_record(&path, record)?;
            println!(
                "Recorded {} for topic {}: {:.1}% ({}).",
                id,
                topic_id,
                percentage,
                performance::categorize(percentage)
            );
        }
        Commands::AddTopic { subject, name } => {
            let topic = data::add_topic(&data_dir, &subject, &name)?;
            println!(
                "Added topic {} \"{}\" to {} at position {}.",
                topic.id, topic.name, topic.subject_id, topic.order
            );
        }
        Commands::AddSubject {
            name,
            code,
            semester,
            faculty,
        } => {
            let subject = data::add_subject(&data_dir, &name, &code, semester, &faculty)?;
            println!("Added subject {} {} ({}).", subject.id, subject.code, subject.name);
        }
        Commands::RemoveTopic { id } => {
            if !data::remove_topic(&data_dir, &id)? {
                anyhow::bail!("no topic with id {id}");
            }
            println!("Topic {id} deleted.");
        }
        Commands::Report {
            student,
            out,
            today,
        } => {
            let dataset = data::load_dataset(&data_dir)?;
            let records = select_records(&dataset.records, student.as_deref());
            let today = resolve_today(today, &config);
            let report = report::build_report(
                student.as_deref(),
                &dataset,
                &records,
                today,
                &config.report,
            )?;
            let out = out.unwrap_or_else(|| config.report.output.clone());
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
