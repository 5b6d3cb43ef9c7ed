//! Subcommand implementations

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::auth::{AuthArgs, authenticate};
use crate::{
    BrowserRegistry, DailyJob, DiscoveryAggregator, EnrollmentExecutor, FilterEngine, FilterSpec,
    RateLimitPolicy, Settings,
    browser::sort_by_priority,
    discovery::DiscoveryReport,
    filter::{SortDirection, SortKey},
    jobs::tally,
    sources::{FixedSource, SourceAdapter, configured_sources},
    types::{CourseRecord, EnrollmentOutcome},
};

/// Where listings come from
#[derive(Debug, Clone, Default, Args)]
pub struct SourceArgs {
    /// Read raw listings from a JSON export instead of the configured sites (repeatable)
    #[arg(long = "from-file", value_name = "FILE")]
    pub from_files: Vec<PathBuf>,
}

/// Filter overrides; anything unset imposes no restriction
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Minimum rating (0-5)
    #[arg(long, value_name = "RATING")]
    pub min_rating: Option<f64>,

    /// Maximum duration in hours
    #[arg(long, value_name = "HOURS")]
    pub max_duration: Option<f64>,

    /// Accepted language (repeatable)
    #[arg(long = "language", value_name = "LANG")]
    pub languages: Vec<String>,

    /// Keyword a course must mention (repeatable)
    #[arg(long = "include", value_name = "WORD")]
    pub include: Vec<String>,

    /// Keyword that rules a course out (repeatable)
    #[arg(long = "exclude", value_name = "WORD")]
    pub exclude: Vec<String>,

    /// Sort key: rating, duration, title, discovered_at, expires_at
    #[arg(long, value_name = "KEY", value_parser = parse_sort_key)]
    pub sort: Option<SortKey>,

    /// Sort descending
    #[arg(long, requires = "sort")]
    pub desc: bool,

    /// Keep at most this many courses
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,
}

impl FilterArgs {
    pub fn to_spec(&self) -> FilterSpec {
        let direction = if self.desc {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        let mut spec = FilterSpec {
            min_rating: self.min_rating,
            max_duration_hours: self.max_duration,
            languages: self.languages.clone(),
            include_keywords: self.include.clone(),
            exclude_keywords: self.exclude.clone(),
            limit: self.limit,
            ..FilterSpec::default()
        };
        if let Some(key) = self.sort {
            spec = spec.with_sort(key, direction);
        }
        spec
    }
}

fn parse_sort_key(value: &str) -> std::result::Result<SortKey, String> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
        .map_err(|_| format!("unknown sort key '{}'", value))
}

/// Cancellation token tripped by Ctrl-C
pub fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, finishing the current step...");
            trigger.cancel();
        }
    });
    token
}

fn sources_for(settings: &Settings, args: &SourceArgs) -> Result<Vec<Arc<dyn SourceAdapter>>> {
    if args.from_files.is_empty() {
        return Ok(configured_sources(&settings.discovery)?);
    }
    args.from_files
        .iter()
        .map(|path| {
            let id = format!("file:{}", path.display());
            let source = FixedSource::from_json_file(id, path)?;
            Ok(Arc::new(source) as Arc<dyn SourceAdapter>)
        })
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_courses(courses: &[CourseRecord]) {
    for (i, course) in courses.iter().enumerate() {
        let rating = course
            .rating
            .map_or_else(|| "-".to_string(), |r| format!("{:.1}", r));
        let hours = course
            .duration_hours
            .map_or_else(|| "-".to_string(), |h| format!("{:.1}h", h));
        println!("{:>3}. {} [{} | {}]", i + 1, course.title, rating, hours);
        println!("     {}", course.url);
    }
}

fn print_outcomes(outcomes: &[EnrollmentOutcome]) {
    for outcome in outcomes {
        match &outcome.detail {
            Some(detail) => println!("{:<16} {} ({})", outcome.status, outcome.title, detail),
            None => println!("{:<16} {}", outcome.status, outcome.title),
        }
    }
}

/// `browsers`: supported, installed and recommended browsers
pub fn run_browsers(json: bool) -> Result<()> {
    #[derive(Serialize)]
    struct Listing {
        platform: String,
        supported: Vec<&'static str>,
        default: Option<&'static str>,
        installed: Vec<crate::types::DetectedBrowser>,
        recommended: Option<&'static str>,
    }

    let registry = BrowserRegistry::for_current_platform();
    let installed = sort_by_priority(registry.detect_installed());
    let listing = Listing {
        platform: format!("{:?}", registry.platform()),
        supported: registry.list_supported().iter().map(|b| b.id).collect(),
        default: registry.detect_default().map(|b| b.id),
        recommended: installed.first().map(|b| b.id()),
        installed,
    };

    if json {
        return print_json(&listing);
    }
    println!("Platform:  {}", listing.platform);
    println!("Supported: {}", listing.supported.join(", "));
    println!("Default:   {}", listing.default.unwrap_or("unknown"));
    if listing.installed.is_empty() {
        println!("No supported browser found");
    }
    for browser in &listing.installed {
        println!(
            "  {}{}",
            browser.descriptor.name,
            if browser.is_default { " (default)" } else { "" }
        );
    }
    Ok(())
}

async fn discover(
    settings: &Settings,
    sources: &SourceArgs,
    cancel: &CancellationToken,
) -> Result<DiscoveryReport> {
    let adapters = sources_for(settings, sources)?;
    let report = DiscoveryAggregator::new(settings.discovery.max_workers)
        .with_cancellation(cancel.clone())
        .discover_all(&adapters)
        .await
        .context("course discovery failed")?;
    for failure in &report.failures {
        eprintln!("warning: {}: {}", failure.source_id, failure.message);
    }
    Ok(report)
}

/// `discover`: fetch, filter and print courses
pub async fn run_discover(
    settings: &Settings,
    sources: &SourceArgs,
    filter: &FilterArgs,
    json: bool,
) -> Result<()> {
    let spec = filter.to_spec();
    spec.validate()?;
    let report = discover(settings, sources, &ctrl_c_token()).await?;
    let courses = FilterEngine::apply(&report.courses, &spec);

    if json {
        return print_json(&courses);
    }
    println!(
        "{} course(s) ({} discovered)",
        courses.len(),
        report.courses.len()
    );
    print_courses(&courses);
    Ok(())
}

/// `enroll`: sign in, discover, filter, enroll
pub async fn run_enroll(
    settings: &Settings,
    auth: &AuthArgs,
    sources: &SourceArgs,
    filter: &FilterArgs,
    json: bool,
) -> Result<()> {
    let spec = filter.to_spec();
    spec.validate()?;
    let session = authenticate(settings, auth).await?;

    let cancel = ctrl_c_token();
    let report = discover(settings, sources, &cancel).await?;
    let courses = FilterEngine::apply(&report.courses, &spec);

    let outcomes = EnrollmentExecutor::new()
        .with_cancellation(cancel)
        .enroll(&session, &courses, &RateLimitPolicy::from(&settings.enrollment))
        .await;

    if json {
        return print_json(&outcomes);
    }
    print_outcomes(&outcomes);
    let counts = tally(&outcomes);
    println!(
        "{}",
        counts
            .iter()
            .map(|(status, n)| format!("{} {}", n, status))
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}

/// `daily`: one run of the scheduled job with the configured filter
pub async fn run_daily(
    settings: &Settings,
    auth: &AuthArgs,
    sources: &SourceArgs,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let session = authenticate(settings, auth).await?;
    let adapters = sources_for(settings, sources)?;

    let mut job = DailyJob::new(settings).with_cancellation(ctrl_c_token());
    if let Some(limit) = limit {
        job = job.with_limit(limit);
    }
    let report = job.run(&session, &adapters, &settings.daily_filter).await?;

    if json {
        return print_json(&report);
    }
    print_outcomes(&report.outcomes);
    println!("{}", report.summary());
    Ok(())
}
