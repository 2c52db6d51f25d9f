use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use campus_feedback::analytics;
use campus_feedback::config::StoreConfig;
use campus_feedback::models::{facility_target_id, FacilityType, FeedbackInput, FeedbackKind};
use campus_feedback::report;
use campus_feedback::store::{parse_categories, FeedbackStore};
use campus_feedback::FeedbackService;

#[derive(Parser)]
#[command(name = "campus-feedback")]
#[command(
    about = "Course, teacher and facility feedback with aggregate analytics",
    long_about = None
)]
struct Cli {
    /// Postgres connection string; overrides --store-dir
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Directory holding the JSON feedback store
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the Postgres schema
    InitDb,
    /// List the course catalog
    Courses,
    /// List the teacher catalog
    Teachers,
    /// List the rating categories for each kind of feedback
    Categories,
    /// Submit one piece of feedback
    Submit {
        #[arg(long)]
        kind: FeedbackKind,
        /// Course or teacher id; derived from --facility for facility feedback
        #[arg(long)]
        target_id: Option<String>,
        #[arg(long)]
        target_name: Option<String>,
        #[arg(long)]
        facility: Option<FacilityType>,
        /// Specific location within the facility type
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        rating: u8,
        /// Category ratings as key=value, e.g. content=5 (see `categories`)
        #[arg(long = "category")]
        categories: Vec<String>,
        #[arg(long, default_value = "")]
        comment: String,
    },
    /// Print aggregate statistics
    Analytics {
        #[arg(long)]
        json: bool,
    },
    /// Show the newest submissions
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "feedback-report.md")]
        out: PathBuf,
    },
    /// Import submissions from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Export all submissions to a CSV file
    Export {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Recompute analytics on a fixed interval
    Watch {
        #[arg(long, default_value_t = 30)]
        interval_secs: u64,
        /// Stop after this many refreshes (0 = run until interrupted)
        #[arg(long, default_value_t = 0)]
        iterations: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = StoreConfig::resolve(
        cli.database_url.or_else(|| std::env::var("DATABASE_URL").ok()),
        cli.store_dir
            .or_else(|| std::env::var_os("FEEDBACK_STORE_DIR").map(PathBuf::from)),
    );

    if let Commands::InitDb = cli.command {
        if !matches!(config, StoreConfig::Postgres { .. }) {
            bail!("init-db needs --database-url or DATABASE_URL");
        }
    }

    let kv = config.open().await.context("failed to open feedback store")?;
    let service = FeedbackService::new(FeedbackStore::new(kv));

    match cli.command {
        Commands::InitDb => {
            println!("Schema ready.");
        }
        Commands::Courses => {
            for course in service.courses().await? {
                println!(
                    "{} {} - {} ({}, {})",
                    course.id, course.code, course.name, course.instructor, course.semester
                );
            }
        }
        Commands::Teachers => {
            for teacher in service.teachers().await? {
                println!(
                    "{} {} - {} [{}]",
                    teacher.id,
                    teacher.name,
                    teacher.department,
                    teacher.courses.join(", ")
                );
            }
        }
        Commands::Categories => {
            for kind in FeedbackKind::ALL {
                println!("{kind}:");
                for category in kind.categories() {
                    println!("  {:<14} {}", category.as_str(), category.description());
                }
            }
        }
        Commands::Submit {
            kind,
            target_id,
            target_name,
            facility,
            location,
            rating,
            categories,
            comment,
        } => {
            let (target_id, target_name) =
                resolve_target(kind, target_id, target_name, facility, location)?;
            let category_ratings = parse_categories(&categories.join(";"))?;

            let record = service
                .submit(FeedbackInput {
                    kind,
                    target_id,
                    target_name,
                    overall_rating: rating,
                    category_ratings,
                    comment,
                })
                .await
                .context("feedback was not saved")?;
            println!("Saved feedback {} for {}.", record.id, record.target_name);
        }
        Commands::Analytics { json } => {
            let snapshot = service.analytics().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print_snapshot(&snapshot);
            }
        }
        Commands::Recent { limit } => {
            let recent = service.recent_feedback(limit).await?;
            if recent.is_empty() {
                println!("No feedback submitted yet.");
                return Ok(());
            }
            for record in recent {
                println!(
                    "- [{}] {} {} stars ({}){}",
                    record.kind,
                    record.target_name,
                    record.overall_rating,
                    record.created_at.format("%Y-%m-%d %H:%M"),
                    if record.comment.is_empty() {
                        String::new()
                    } else {
                        format!(": {}", record.comment)
                    }
                );
            }
        }
        Commands::Report { out } => {
            let records = service.all_feedback().await?;
            let snapshot = analytics::compute_analytics(&records)?;
            let counts = analytics::kind_counts(&records);
            let report = report::build_report(Utc::now(), &snapshot, &records, &counts);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Import { csv } => {
            let inserted = service.import_csv(&csv).await?;
            println!("Imported {inserted} submissions from {}.", csv.display());
        }
        Commands::Export { csv } => {
            let written = service.export_csv(&csv).await?;
            println!("Exported {written} submissions to {}.", csv.display());
        }
        Commands::Watch {
            interval_secs,
            iterations,
        } => {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            let mut refreshes = 0usize;
            loop {
                ticker.tick().await;
                match service.analytics().await {
                    Ok(snapshot) => {
                        info!(
                            total = snapshot.total_feedback,
                            average = snapshot.average_rating,
                            "analytics refreshed"
                        );
                        print_snapshot(&snapshot);
                    }
                    Err(e) => warn!(error = %e, "analytics refresh failed"),
                }
                refreshes += 1;
                if iterations != 0 && refreshes >= iterations {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Works out the target id and display name for a submission.
fn resolve_target(
    kind: FeedbackKind,
    target_id: Option<String>,
    target_name: Option<String>,
    facility: Option<FacilityType>,
    location: Option<String>,
) -> anyhow::Result<(String, String)> {
    if kind != FeedbackKind::Facility && (facility.is_some() || location.is_some()) {
        bail!("--facility and --location only apply to facility feedback");
    }

    let target_id = match (target_id, facility) {
        (Some(id), _) => id,
        (None, Some(facility)) => facility_target_id(facility, location.as_deref()),
        (None, None) => bail!("--target-id is required unless --facility is given"),
    };
    let target_name = target_name
        .or_else(|| location.filter(|l| !l.trim().is_empty()))
        .or_else(|| facility.map(|f| f.label().to_string()))
        .unwrap_or_else(|| target_id.clone());

    Ok((target_id, target_name))
}

fn print_snapshot(snapshot: &campus_feedback::models::AnalyticsSnapshot) {
    println!("Total feedback: {}", snapshot.total_feedback);
    println!("Average rating: {:.1}", snapshot.average_rating);
    println!("Courses rated: {}", snapshot.courses_rated);
    println!("Teachers rated: {}", snapshot.teachers_rated);
    println!("Satisfaction rate: {}%", snapshot.satisfaction_rate());
    for rating in (1..=5).rev() {
        println!("  {} stars: {}", rating, snapshot.rating_count(rating));
    }
    for point in analytics::category_chart(snapshot) {
        println!("  {}: {:.1}", point.label, point.average);
    }
}
