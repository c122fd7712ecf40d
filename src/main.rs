use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};

use gradewatch_lib::config::{normalize_period, RunConfig};
use gradewatch_lib::pipeline::{
    commit_run, load_class_report, load_grades, project_grade_impact, run_extraction, DateKey,
    ExtractionCache, Hypothetical,
};
use gradewatch_lib::provider::RecordedProvider;

#[derive(Parser)]
#[command(name = "gradewatch", version)]
#[command(about = "Track gradebook scores, missing work and grade history", long_about = None)]
struct Cli {
    /// Snapshot directory (defaults to GRADEWATCH_DATA_DIR or ~/Gradewatch)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one extraction over a captured gradebook and commit the results
    Run {
        #[arg(long)]
        capture: PathBuf,
        #[arg(long)]
        max_assignments: Option<usize>,
        /// Only keep missing assignments from this marking period (Q1-Q4)
        #[arg(long)]
        period: Option<String>,
        /// Re-extract assignments even when a graded cache entry exists
        #[arg(long)]
        refresh: bool,
        /// Extract and report without writing any snapshot
        #[arg(long)]
        dry_run: bool,
    },
    /// Print average and streak history
    History,
    /// Project a class grade after a hypothetical assignment
    Project {
        #[arg(long = "class")]
        class_name: String,
        #[arg(long)]
        earned: f64,
        #[arg(long)]
        max: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gradewatch_lib::init_tracing();
    let cli = Cli::parse();

    let mut config = RunConfig::from_env()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    let paths = config.snapshot_paths();

    match cli.command {
        Commands::Run {
            capture,
            max_assignments,
            period,
            refresh,
            dry_run,
        } => {
            if max_assignments.is_some() {
                config.max_assignments = max_assignments;
            }
            if let Some(period) = period {
                config.marking_period = Some(normalize_period(&period)?);
            }
            config.force_refresh = refresh;

            let cache = ExtractionCache::load(&paths.cache)?;
            let mut provider = RecordedProvider::load(&capture)
                .with_context(|| format!("failed to load capture {}", capture.display()))?;
            let run = run_extraction(&mut provider, cache, &config).await?;

            println!(
                "Visited {} assignments ({} cached, {} extracted, {} graded, {} timeouts).",
                run.stats.visited,
                run.stats.cache_hits,
                run.stats.extracted,
                run.stats.graded,
                run.stats.timeouts
            );
            for class in &run.grouped {
                let average = class
                    .average_percentage()
                    .map(|p| format!("{p:.1}%"))
                    .unwrap_or_else(|| "-".into());
                println!(
                    "- {}: {} assignments, scored average {}",
                    class.class_name,
                    class.assignments.len(),
                    average
                );
            }

            if dry_run {
                println!("Dry run, nothing written.");
                return Ok(());
            }

            let today = DateKey::from(Local::now().date_naive());
            let summary = commit_run(run, &paths, today, Utc::now())?;
            println!(
                "Committed {}: average {}, streak {}, {} A grades, {} missing.",
                summary.date,
                summary.overall_average,
                summary.streak,
                summary.a_grade_classes,
                summary.missing
            );
        }
        Commands::History => {
            let Some(grades) = load_grades(&paths.grades)? else {
                println!("No history yet in {}.", config.data_dir.display());
                return Ok(());
            };
            println!("Date         Average  Streak");
            for (date, average) in &grades.history.average_history {
                let streak = grades
                    .history
                    .streak_history
                    .get(date)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".into());
                println!("{:<12} {:>7}  {:>6}", date.to_string(), average, streak);
            }
        }
        Commands::Project {
            class_name,
            earned,
            max,
        } => {
            let report = load_class_report(&paths.class_report)?
                .context("no class report yet, run an extraction first")?;
            let class = report
                .class(&class_name)
                .with_context(|| format!("class '{class_name}' not found in the last report"))?;
            let impact = project_grade_impact(
                class.current_grade.unwrap_or(0.0),
                &Hypothetical { earned, max },
                &class.assignments,
            )?;
            println!(
                "{}: {:.2} ({}) -> {:.2} ({}), change {:+.2}",
                class.class_name,
                impact.current_grade,
                impact.current_letter,
                impact.projected_grade,
                impact.projected_letter,
                impact.delta
            );
        }
    }

    Ok(())
}
