mod config;
mod db;
mod discover;
mod fetch;
mod keywords;
mod parser;
mod record;
mod report;
mod verify;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use config::Settings;
use parser::extract::Engine;
use parser::{ContentLimits, FetchedPage};
use record::PolicyRecord;

#[derive(Parser)]
#[command(name = "talent_scraper", about = "Xuhui district talent-policy crawler")]
struct Cli {
    /// TOML settings file (default: ./talent.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, fetch, classify and export talent policies
    Crawl {
        /// Max detail pages to fetch (default: fetch.max_details)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// List talent-related links found on the seed pages
    Discover,
    /// Run the extractor on a saved HTML page
    Extract {
        /// Path to the HTML file
        file: PathBuf,
        /// URL recorded on the output (default: the file path)
        #[arg(long)]
        url: Option<String>,
        /// Also print the per-category score table
        #[arg(long)]
        scores: bool,
    },
    /// Re-check exported policy URLs
    Verify {
        /// Exported talent_policies.json (default: built-in sample URLs)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Max URLs to check
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show statistics of the latest crawl
    Stats,
    /// Policies table from the latest crawl
    Overview {
        /// Filter by category (e.g. 住房保障)
        #[arg(short, long)]
        category: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Crawl { limit } => {
            let engine = Engine::from_settings(&settings);
            let fetcher = Arc::new(fetch::Fetcher::from_settings(&settings.fetch)?);

            // Phase 1: Discover
            let mut links = discover::discover_links(&fetcher, &settings).await;
            if let Some(n) = limit {
                links.truncate(n);
            }
            if links.is_empty() {
                println!("No talent-related links found on {} seed pages.", settings.seeds.len());
                return Ok(());
            }

            let conn = db::connect(&settings.output.db_path)?;
            db::init_schema(&conn)?;
            let run_id = db::insert_run(&conn)?;

            // Phase 2: Fetch
            let t_fetch = Instant::now();
            let link_count = links.len();
            println!("Fetching {} detail pages...", link_count);
            let (pages, stats) =
                fetch::fetch_pages(fetcher, links, settings.fetch.concurrency).await;
            println!(
                "Fetched {} pages ({} ok, {} errors) in {:.1}s",
                stats.total, stats.ok, stats.errors, t_fetch.elapsed().as_secs_f64()
            );

            // Phase 3: Process
            let records = process_pages(&pages, &engine, settings.engine.content_limits());
            let saved = db::save_policies(&conn, run_id, &records)?;
            db::finish_run(
                &conn,
                run_id,
                &db::RunCounts {
                    links: link_count,
                    fetched: stats.ok,
                    errors: stats.errors,
                    saved,
                },
            )?;

            if records.is_empty() {
                println!("No pages carried enough policy content.");
                return Ok(());
            }

            let labels: Vec<String> = engine.requirement_labels().map(String::from).collect();
            let paths = report::export_all(&settings.output.dir, &records, &labels)?;
            println!("Saved {} policies (run #{}).", saved, run_id);
            for p in paths {
                println!("  {}", p.display());
            }
            Ok(())
        }
        Commands::Discover => {
            let fetcher = fetch::Fetcher::from_settings(&settings.fetch)?;
            let links = discover::discover_links(&fetcher, &settings).await;
            if links.is_empty() {
                println!("No talent-related links found.");
                return Ok(());
            }
            for (i, l) in links.iter().enumerate() {
                println!("{:>3} | {:<40} | {}", i + 1, truncate(&l.title, 40), l.url);
            }
            println!("\n{} links", links.len());
            Ok(())
        }
        Commands::Extract { file, url, scores } => {
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let engine = Engine::from_settings(&settings);
            let text = parser::html::page_text(&html);
            let body: String = text
                .body
                .chars()
                .take(settings.engine.max_content_chars)
                .collect();
            let url = url.unwrap_or_else(|| file.display().to_string());
            let record = engine.extract(&url, &text.title, &body);

            println!("{}", serde_json::to_string_pretty(&record)?);
            if scores {
                println!("\n--- Category scores ---");
                for s in engine.category_scores(&text.title, &body) {
                    println!("  {:<10} {:>3}", s.label, s.score);
                }
                println!("  => {}", record.category());
            }
            Ok(())
        }
        Commands::Verify { input, limit } => {
            let mut targets = match &input {
                Some(path) => verify::load_targets(path)?,
                None => verify::sample_targets(),
            };
            if let Some(n) = limit {
                targets.truncate(n);
            }
            if targets.is_empty() {
                println!("No URLs to verify.");
                return Ok(());
            }

            println!("Verifying {} URLs...", targets.len());
            let fetcher = Arc::new(fetch::Fetcher::for_verification(&settings.fetch)?);
            let results = verify::verify_urls(
                fetcher,
                targets,
                settings.fetch.verify_concurrency,
                &settings.site_domain,
            )
            .await;
            let (summary, paths) = verify::write_reports(&settings.output.dir, &results)?;

            println!(
                "Valid: {}/{} ({:.1}%) | average quality {:.1}/100",
                summary.valid_urls,
                summary.total_urls,
                summary.success_rate,
                summary.average_quality_score
            );
            for p in paths {
                println!("  {}", p.display());
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.output.db_path)?;
            db::init_schema(&conn)?;
            let Some(s) = db::get_stats(&conn)? else {
                println!("No completed crawl yet. Run 'crawl' first.");
                return Ok(());
            };
            println!("Run:      #{} ({})", s.run_id, s.started_at);
            println!("Links:    {}", s.links);
            println!("Fetched:  {}", s.fetched);
            println!("Errors:   {}", s.errors);
            println!("Saved:    {}", s.saved);

            println!("\n--- Categories ---");
            for (cat, n) in &s.categories {
                println!("  {:<10} {:>4}", cat, n);
            }
            println!("\n--- Departments ---");
            for (dept, n) in s.departments.iter().take(10) {
                println!("  {:<30} {:>4}", truncate(dept, 30), n);
            }
            Ok(())
        }
        Commands::Overview { category, limit } => {
            let conn = db::connect(&settings.output.db_path)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_overview(&conn, category.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No policies found.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<36} | {:<8} | {:<20} | {:<10} | {:>3}",
                "#", "Title", "Category", "Department", "Date", "Req"
            );
            println!("{}", "-".repeat(98));

            for (i, r) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:<36} | {:<8} | {:<20} | {:<10} | {:>3}",
                    i + 1,
                    truncate(&r.title, 36),
                    r.category,
                    truncate(&r.department, 20),
                    truncate(&r.publish_date, 10),
                    r.requirements
                );
            }

            println!("\n--- Links ---");
            for (i, r) in rows.iter().enumerate() {
                println!("{:>3}  {}", i + 1, r.url);
            }

            println!("\n{} policies", rows.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Parallel page processing; keeps records that look like real policy text.
fn process_pages(pages: &[FetchedPage], engine: &Engine, limits: ContentLimits) -> Vec<PolicyRecord> {
    use rayon::prelude::*;

    let pb = fetch::progress_bar(pages.len());
    let mut records = Vec::new();
    let mut thin = 0usize;

    for chunk in pages.chunks(500) {
        let results: Vec<Option<PolicyRecord>> = chunk
            .par_iter()
            .map(|p| parser::process_page(p, engine, limits))
            .collect();

        for r in results {
            match r {
                Some(rec) if rec.is_meaningful() => {
                    tracing::debug!(url = rec.url(), category = rec.category(), "kept");
                    records.push(rec);
                }
                _ => thin += 1,
            }
        }
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    tracing::info!("Processed {} pages ({} kept, {} skipped)", pages.len(), records.len(), thin);
    records
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
