//! CLI entry point for cookie triage.
//!
//! Works on the JSON catalog document and the configured staging backend:
//! classify crawl results, stage solutions, fill in the cookie form and
//! resolve what was staged.

use anyhow::{Context, anyhow, bail};
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use cookie_triage::catalog::InMemoryCatalog;
use cookie_triage::config::StagingConfig;
use cookie_triage::display::{
    create_batch_table, create_staged_table, create_suggestions_table, create_summary_table,
    create_uncrawled_table, format_notice,
};
use cookie_triage::resolution::{
    CookieFormValues, FormFollowUp, Notice, NotificationMode, SolutionRequest, notice,
};
use cookie_triage::staging::{StagingStore, open_store};
use cookie_triage::suggestion::{
    ClassifiedSuggestion, SolutionGroup, SolutionOffer, SolutionValues,
};
use cookie_triage::{
    ClassificationType, CookieSuggestionId, ExitCode, ProjectId, ResolutionOutcome, Resolver,
    Settings, SolutionsUniqueId, StageOutcome, StagingKey, SuggestionsResult, classify, logging,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Cookie triage
#[derive(Parser)]
#[command(
    name = "cookie-triage",
    version = env!("CARGO_PKG_VERSION"),
    about = "Classify crawled cookies against the cookie catalog and resolve the differences",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Identifies one offered solution of one suggestion
#[derive(clap::Args)]
struct SolutionArgs {
    /// Project id
    #[arg(short, long)]
    project: String,

    /// Solutions group id, shown by `classify`
    #[arg(short, long)]
    group: String,

    /// Solution id inside the group, shown by `classify`
    #[arg(short, long)]
    solution: String,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize project
    #[command(about = "Set up .cookie-triage directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,

    #[command(about = "Classify the project's crawl results into buckets")]
    Classify {
        #[arg(short, long)]
        project: String,

        /// Only show one bucket, or `uncrawled` for cataloged cookies never seen
        #[arg(short, long)]
        bucket: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    #[command(about = "Pick an offered solution for a suggestion")]
    Stage {
        #[command(flatten)]
        target: SolutionArgs,

        /// Extra values as key=value (value parsed as JSON when possible)
        #[arg(long = "value", value_name = "KEY=VALUE")]
        values: Vec<String>,
    },

    #[command(name = "submit-form", about = "Submit the cookie form of a form solution")]
    SubmitForm {
        #[command(flatten)]
        target: SolutionArgs,

        /// Form values as a JSON object
        #[arg(long)]
        form: String,
    },

    #[command(about = "Resolve one staged solution")]
    Resolve {
        #[arg(short, long)]
        project: String,

        #[arg(short, long)]
        group: String,

        /// Expected solution id; refused when the staged one differs
        #[arg(short, long)]
        solution: Option<String>,
    },

    #[command(name = "resolve-all", about = "Resolve every staged solution of a project")]
    ResolveAll {
        #[arg(short, long)]
        project: String,
    },

    #[command(about = "List staged solutions")]
    Staged {
        #[arg(short, long)]
        project: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    #[command(about = "Drop staged solutions")]
    Reset {
        #[arg(short, long)]
        project: String,

        /// Solutions group to drop
        #[arg(short, long, required_unless_present = "all")]
        group: Option<String>,

        /// Drop every staged solution of the project
        #[arg(long)]
        all: bool,
    },
}

/// Catalog, staging and settings of the current workspace
struct Workspace {
    settings: Settings,
    catalog: Arc<InMemoryCatalog>,
    catalog_path: PathBuf,
    staging: Arc<dyn StagingStore>,
}

impl Workspace {
    fn open(settings: Settings) -> anyhow::Result<Self> {
        let catalog_path = settings.resolve_path(&settings.catalog.path);
        let catalog = InMemoryCatalog::load(&catalog_path)
            .with_context(|| format!("Failed to load catalog from {}", catalog_path.display()))?;

        let staging = open_store(&StagingConfig {
            backend: settings.staging.backend,
            directory: settings.resolve_path(&settings.staging.directory),
        });

        Ok(Self {
            settings,
            catalog: Arc::new(catalog),
            catalog_path,
            staging,
        })
    }

    async fn resolver(&self, project: &str) -> anyhow::Result<Resolver> {
        Ok(Resolver::open(
            &self.settings,
            &ProjectId::new(project),
            self.catalog.clone(),
            self.catalog.clone(),
            self.staging.clone(),
        )
        .await?)
    }

    /// Classify and persist the suggestion records classification touched
    fn classify(&self, project: &str) -> anyhow::Result<SuggestionsResult> {
        self.settings.ensure_crawler_enabled()?;

        let project_id = ProjectId::new(project);
        let snapshot = self.catalog.snapshot(&project_id)?;
        let result = classify(
            &project_id,
            &self.catalog.facts(&project_id),
            &snapshot,
            &self.catalog.suggestions(&project_id),
        );

        if !result.changed_records().is_empty() {
            self.catalog.save_suggestions(result.changed_records().to_vec());
            self.save()?;
        }
        Ok(result)
    }

    fn save(&self) -> anyhow::Result<()> {
        self.catalog
            .save(&self.catalog_path)
            .with_context(|| format!("Failed to save catalog to {}", self.catalog_path.display()))
    }
}

/// Request for the offer `target` names, with the name of the cookie it is for.
///
/// Looks through the buckets first, then the cataloged cookies the crawl
/// never reported.
fn find_offer(
    result: &SuggestionsResult,
    target: &SolutionArgs,
) -> anyhow::Result<(String, SolutionRequest)> {
    let offered = |solutions: &SolutionGroup| -> Option<SolutionOffer> {
        if solutions.solutions_unique_id.as_str() != target.group {
            return None;
        }
        solutions
            .offers
            .iter()
            .find(|offer| offer.solution_unique_id.as_str() == target.solution)
            .cloned()
    };

    result
        .iter()
        .find_map(|s| {
            offered(&s.solutions).map(|offer| {
                (s.suggestion.name.clone(), request_for(&s.suggestion.id, &s.solutions, &offer))
            })
        })
        .or_else(|| {
            result.uncrawled().iter().find_map(|cookie| {
                offered(&cookie.solutions).map(|offer| {
                    (cookie.name.clone(), request_for(&cookie.suggestion_id, &cookie.solutions, &offer))
                })
            })
        })
        .ok_or_else(|| {
            anyhow!(
                "No solution '{}' offered in group '{}'; run `classify` to list current solutions",
                target.solution,
                target.group
            )
        })
}

fn request_for(
    suggestion_id: &CookieSuggestionId,
    solutions: &SolutionGroup,
    offer: &SolutionOffer,
) -> SolutionRequest {
    SolutionRequest {
        cookie_suggestion_id: suggestion_id.clone(),
        solutions_unique_id: solutions.solutions_unique_id.clone(),
        solution_unique_id: offer.solution_unique_id.clone(),
        solution_type: offer.kind.as_str().to_string(),
        values: offer.args.clone(),
    }
}

fn parse_values(pairs: &[String]) -> anyhow::Result<SolutionValues> {
    let mut values = SolutionValues::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected KEY=VALUE, got '{pair}'"))?;
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        values.insert(key.to_string(), value);
    }
    Ok(values)
}

fn print_outcome(outcome: &ResolutionOutcome) -> ExitCode {
    if let Some(notice) = &outcome.notice {
        println!("{}", format_notice(notice));
    }

    if let Some(FormFollowUp::ReopenForm { field_errors, .. }) = &outcome.follow_up {
        eprintln!("The cookie form needs changes:");
        for error in field_errors {
            eprintln!("  {}: {}", error.field, error.message);
        }
        eprintln!("Submit it again with `submit-form`.");
    }

    if let Some(group) = &outcome.still_staged {
        eprintln!("The solution was resolved but is still staged.");
        eprintln!("Drop it with `reset --group {group}` before resolving again.");
    }

    match &outcome.error {
        Some(error) => {
            eprintln!("Error: {error}");
            for suggestion in error.recovery_suggestions() {
                eprintln!("  - {suggestion}");
            }
            ExitCode::from_resolution_error(error)
        }
        None => ExitCode::Success,
    }
}

/// Cancel outstanding work on Ctrl-C
fn cancel_on_interrupt() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    if let Commands::Init { force } = &cli.command {
        let path = Settings::init_config_file(*force).map_err(|e| anyhow!("{e}"))?;
        println!("Created configuration file at: {}", path.display());
        println!("Edit this file to customize your settings.");
        return Ok(ExitCode::Success);
    }

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path).map_err(|e| anyhow::Error::new(*e))?,
        None => Settings::load().map_err(|e| anyhow::Error::new(*e))?,
    };
    logging::init(&settings.logging, cli.debug || settings.debug);

    if let Commands::Config = &cli.command {
        println!("Current Configuration:");
        println!("{}", "=".repeat(50));
        println!("{}", toml::to_string_pretty(&settings)?);
        return Ok(ExitCode::Success);
    }

    let workspace = Workspace::open(settings)?;

    match cli.command {
        Commands::Init { .. } | Commands::Config => Ok(ExitCode::Success),

        Commands::Classify {
            project,
            bucket,
            json,
        } => {
            let result = workspace.classify(&project)?;

            if bucket.as_deref() == Some("uncrawled") {
                if json {
                    println!("{}", serde_json::to_string_pretty(result.uncrawled())?);
                } else {
                    println!("{}", create_uncrawled_table(result.uncrawled()));
                }
                return Ok(ExitCode::Success);
            }

            let buckets: Vec<ClassificationType> = match bucket {
                Some(name) => vec![
                    ClassificationType::ALL
                        .into_iter()
                        .find(|b| b.as_str() == name)
                        .ok_or_else(|| anyhow!("Unknown bucket '{name}'"))?,
                ],
                None => ClassificationType::ALL.to_vec(),
            };

            if json {
                let selected: Vec<&ClassifiedSuggestion> = result
                    .iter()
                    .filter(|s| buckets.contains(&s.classification))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&selected)?);
                return Ok(ExitCode::Success);
            }

            println!("{}", create_summary_table(&result));
            for bucket in buckets.iter().copied() {
                if result.get_suggestions_by_type(bucket).is_empty() {
                    continue;
                }
                println!("\n{bucket}");
                println!("{}", create_suggestions_table(&result, bucket));
            }
            if buckets.len() > 1 && !result.uncrawled().is_empty() {
                println!("\nuncrawled");
                println!("{}", create_uncrawled_table(result.uncrawled()));
            }
            Ok(ExitCode::Success)
        }

        Commands::Stage { target, values } => {
            let resolver = workspace.resolver(&target.project).await?;
            let result = workspace.classify(&target.project)?;
            let (name, mut request) = find_offer(&result, &target)?;
            request.values.extend(parse_values(&values)?);

            let outcome = match resolver.stage(request).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    println!(
                        "{}",
                        format_notice(&Notice::error(notice::UNABLE_TO_PROCESS_SOLUTION))
                    );
                    eprintln!("Error: {error}");
                    return Ok(ExitCode::from_resolution_error(&error));
                }
            };

            match outcome {
                StageOutcome::Staged(entry) => {
                    println!(
                        "Staged {} for {} ({} ready to resolve)",
                        entry.solution_type,
                        name,
                        resolver.ready_to_resolve()?
                    );
                }
                StageOutcome::FormRequired(context) => {
                    println!("This solution needs the cookie form. Defaults:");
                    println!("{}", serde_json::to_string_pretty(&context.defaults)?);
                    if !context.provider_options.is_empty() {
                        println!("Providers:");
                        for provider in &context.provider_options {
                            println!("  {} ({}, {})", provider.id, provider.name, provider.code);
                        }
                    }
                    println!("Submit it with `submit-form --form '<json>'`.");
                }
            }
            Ok(ExitCode::Success)
        }

        Commands::SubmitForm { target, form } => {
            let resolver = workspace.resolver(&target.project).await?;
            let result = workspace.classify(&target.project)?;
            let (name, request) = find_offer(&result, &target)?;

            let form: CookieFormValues =
                serde_json::from_str(&form).context("Form values must be a JSON object")?;
            let entry = resolver.submit_form(request, form)?;

            println!(
                "Staged {} for {} ({} ready to resolve)",
                entry.solution_type,
                name,
                resolver.ready_to_resolve()?
            );
            Ok(ExitCode::Success)
        }

        Commands::Resolve {
            project,
            group,
            solution,
        } => {
            let resolver = workspace.resolver(&project).await?;
            let key = StagingKey::new(ProjectId::new(&project), SolutionsUniqueId::new(&group));
            let Some(staged) = workspace.staging.get(&key)? else {
                bail!("Nothing is staged for group '{group}'");
            };

            let mut request = SolutionRequest::from(staged);
            if let Some(solution) = solution {
                request.solution_unique_id = solution.into();
            }

            let outcome = resolver
                .resolve(request, NotificationMode::Notify, &cancel_on_interrupt())
                .await?;
            workspace.save()?;
            Ok(print_outcome(&outcome))
        }

        Commands::ResolveAll { project } => {
            let resolver = workspace.resolver(&project).await?;
            let summary = resolver.resolve_all(&cancel_on_interrupt()).await?;
            workspace.save()?;

            println!("{}", create_batch_table(&summary));
            for notice in summary.notices() {
                println!("{}", format_notice(&notice));
            }
            Ok(ExitCode::from_batch_errors(summary.errors))
        }

        Commands::Staged { project, json } => {
            let resolver = workspace.resolver(&project).await?;
            let entries = resolver.staged()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("Nothing staged.");
            } else {
                println!("{}", create_staged_table(&entries));
            }
            Ok(ExitCode::Success)
        }

        Commands::Reset {
            project,
            group,
            all,
        } => {
            let resolver = workspace.resolver(&project).await?;
            match (all, group) {
                (true, _) => resolver.reset_all()?,
                (false, Some(group)) => resolver.reset(&SolutionsUniqueId::new(group))?,
                (false, None) => bail!("Pass --group or --all"),
            }
            println!("Staging reset ({} ready to resolve)", resolver.ready_to_resolve()?);
            Ok(ExitCode::Success)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from_anyhow(&e)
        }
    };

    std::process::exit(code.into());
}
