//! CLI binary for roadmap coherence: validate, summarize, and auto-fix generated roadmaps.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use roadmap_coherence::context::{cascading_context, dependency_chain};
use roadmap_coherence::fixer::CoherenceFixer;
use roadmap_coherence::issue::Severity;
use roadmap_coherence::validator::CoherenceValidator;
use roadmap_core::config::RoadmapConfig;
use roadmap_core::item::{ItemType, Roadmap};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "roadmap", about = "Roadmap coherence validator and auto-fixer")]
struct Cli {
    /// Project root directory (defaults to current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    /// Roadmap JSON file (defaults to <project>/.roadmap/roadmap.json)
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all coherence checks and print the report
    Validate {
        /// Print issues as JSON instead of the grouped report
        #[arg(long)]
        json: bool,
    },

    /// Print issue counts by severity and type as JSON
    Summary,

    /// Repair auto-fixable issues with an LLM
    Fix {
        /// Maximum number of fixes to attempt (defaults to config)
        #[arg(long)]
        max_fixes: Option<usize>,

        /// Force a provider: anthropic, openai
        #[arg(long)]
        provider: Option<String>,

        /// Model override
        #[arg(long)]
        model: Option<String>,

        /// Apply fixes in memory only; do not write the roadmap back
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the cascading context the fixer would send for an item
    Context {
        /// Item ID
        item_id: String,

        /// Maximum dependency hops
        #[arg(long)]
        depth: Option<usize>,
    },

    /// Show roadmap statistics
    Info,
}

fn get_project_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.project {
        Some(p) => Ok(p.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

fn roadmap_path(project_root: &Path, file: Option<&Path>) -> PathBuf {
    file.map_or_else(
        || roadmap_core::storage::roadmap_file(project_root),
        Path::to_path_buf,
    )
}

fn load_roadmap(path: &Path) -> Result<Roadmap> {
    if !path.exists() {
        anyhow::bail!("No roadmap found at {}.", path.display());
    }
    roadmap_core::storage::load_file(path)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project_root = get_project_root(&cli)?;
    let path = roadmap_path(&project_root, cli.file.as_deref());
    let config = RoadmapConfig::load(&project_root)?;

    match cli.command {
        Commands::Validate { json } => cmd_validate(&path, &config, json),
        Commands::Summary => cmd_summary(&path, &config),
        Commands::Fix {
            max_fixes,
            provider,
            model,
            dry_run,
        } => cmd_fix(&path, config, max_fixes, provider, model, dry_run),
        Commands::Context { item_id, depth } => cmd_context(&path, &config, &item_id, depth),
        Commands::Info => cmd_info(&path),
    }
}

fn cmd_validate(path: &Path, config: &RoadmapConfig, json: bool) -> Result<()> {
    let roadmap = load_roadmap(path)?;
    let mut validator = CoherenceValidator::new(config.coherence.clone());
    let issues = validator.validate_roadmap(&roadmap)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&issues)?);
    } else {
        println!("{}", validator.format_report());
    }

    let critical = validator.summary().by_severity.get(Severity::Critical);
    if critical > 0 {
        anyhow::bail!("{} critical coherence issue(s) found", critical);
    }
    Ok(())
}

fn cmd_summary(path: &Path, config: &RoadmapConfig) -> Result<()> {
    let roadmap = load_roadmap(path)?;
    let mut validator = CoherenceValidator::new(config.coherence.clone());
    validator.validate_roadmap(&roadmap)?;
    println!("{}", serde_json::to_string_pretty(&validator.summary())?);
    Ok(())
}

fn cmd_fix(
    path: &Path,
    mut config: RoadmapConfig,
    max_fixes: Option<usize>,
    provider: Option<String>,
    model: Option<String>,
    dry_run: bool,
) -> Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};

    if provider.is_some() {
        config.llm.provider = provider;
    }
    if model.is_some() {
        config.llm.model = model;
    }
    let max_fixes = max_fixes.unwrap_or(config.coherence.max_fixes);

    let mut roadmap = load_roadmap(path)?;
    let mut validator = CoherenceValidator::new(config.coherence.clone());
    let issues = validator.validate_roadmap(&roadmap)?;
    let fixable = validator.auto_fixable_issues().len();
    if fixable == 0 {
        eprintln!("No auto-fixable issues found ({} total).", issues.len());
        return Ok(());
    }

    let llm = roadmap_llm::provider_from_env(&config.llm)?;
    eprintln!(
        "Found {} issue(s), {} auto-fixable. Using model {}.",
        issues.len(),
        fixable,
        llm.model_name()
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .expect("valid template"),
    );
    spinner.set_message(format!("Fixing up to {} issue(s)...", fixable.min(max_fixes)));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let fixer = CoherenceFixer::new(llm.as_ref()).with_context_depth(config.coherence.context_depth);
    let report = fixer.fix_issues(&mut roadmap, &issues, max_fixes);
    spinner.finish_and_clear();
    let report = report?;

    eprint!("{}", report.format_summary());

    if dry_run {
        eprintln!("Dry run: roadmap not saved.");
    } else if report.fixed > 0 {
        roadmap_core::storage::save_file(path, &roadmap)?;
        eprintln!("Saved to: {}", path.display());
    }

    let remaining = CoherenceValidator::new(config.coherence).validate_roadmap(&roadmap)?;
    eprintln!("Issues remaining: {}", remaining.len());
    Ok(())
}

fn cmd_context(
    path: &Path,
    config: &RoadmapConfig,
    item_id: &str,
    depth: Option<usize>,
) -> Result<()> {
    let roadmap = load_roadmap(path)?;
    let index = roadmap.item_index()?;
    let Some(item) = roadmap.find(item_id) else {
        anyhow::bail!("Item not found: {}", item_id);
    };
    let depth = depth.unwrap_or(config.coherence.context_depth);

    println!("{} {}: {}", item.item_type, item.id, item.name);
    println!();
    print!("{}", cascading_context(&roadmap, &index, item_id, depth));

    let unresolved: Vec<String> = dependency_chain(&roadmap, &index, item_id, depth)
        .into_iter()
        .filter(|link| !link.is_resolved())
        .map(|link| format!("{} (via {})", link.id, link.via))
        .collect();
    if !unresolved.is_empty() {
        eprintln!("\nUnresolved dependencies: {}", unresolved.join(", "));
    }
    Ok(())
}

fn cmd_info(path: &Path) -> Result<()> {
    let roadmap = load_roadmap(path)?;
    let counts = roadmap.count_by_type();

    println!("Roadmap v{}: {}", roadmap.version, roadmap.name());
    println!("Created: {}", roadmap.created_at);
    println!("Updated: {}", roadmap.updated_at);
    println!();
    for (item_type, label) in [
        (ItemType::Milestone, "Milestones"),
        (ItemType::Epic, "Epics"),
        (ItemType::Story, "Stories"),
        (ItemType::Task, "Tasks"),
    ] {
        println!("{}: {}", label, counts.get(&item_type).copied().unwrap_or(0));
    }

    let dependencies: usize = roadmap
        .all_items()
        .iter()
        .map(|item| item.all_dependency_ids().len())
        .sum();
    println!("Dependencies: {}", dependencies);

    let hours: u32 = roadmap
        .tasks()
        .iter()
        .filter_map(|task| task.duration_hours)
        .sum();
    if hours > 0 {
        println!("Estimated task hours: {}", hours);
    }

    if !roadmap.root.children.is_empty() {
        println!("\nMilestones:");
        for milestone in &roadmap.root.children {
            println!(
                "  {} {} ({} epics)",
                milestone.id,
                milestone.name,
                milestone.count_children_of_type(ItemType::Epic)
            );
        }
    }

    Ok(())
}
