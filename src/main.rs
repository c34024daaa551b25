//! Flowvault CLI
//!
//! Entry point for the `flowvault` command-line tool.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use flowvault::backup::{BackupEngine, BackupReport, RestoreEngine, RestoreReport};
use flowvault::cancel::CancelToken;
use flowvault::client::{MetadataClient, ToolingClient};
use flowvault::config::{ConfigPaths, EffectiveConfig, LoadedConfig, ACCESS_TOKEN_ENV};
use flowvault::inventory::Inventory;
use flowvault::logging;
use flowvault::policy::{DeletionReport, PlanReport, PolicyEngine, RetentionPolicy, VersionResult};
use flowvault::selection::SelectionSet;
use flowvault::signal::SignalHandler;
use flowvault::summary::{BatchSummary, ExitCode};
use flowvault_classifier::LifecycleFilter;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::warn;

#[derive(Parser)]
#[command(name = "flowvault")]
#[command(about = "Version lifecycle, retention and backup for Salesforce flows", version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); FLOWVAULT_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Project config file (default: ./flowvault.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Org instance URL, e.g. https://acme.my.salesforce.com
    #[arg(long, global = true)]
    instance_url: Option<String>,

    /// API version segment, e.g. v58.0
    #[arg(long, global = true)]
    api_version: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which org the configuration points at
    Org {
        #[arg(long)]
        json: bool,
    },

    /// List flow definitions with lifecycle annotations
    List {
        #[arg(long, value_enum, default_value = "all")]
        filter: FilterArg,

        #[arg(long)]
        json: bool,
    },

    /// Classify every version of the selected flows
    Versions {
        /// Developer names or FlowDefinition ids (`name:` / `id:` to force)
        #[arg(required = true)]
        selectors: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Delete versions according to a retention policy
    Delete {
        #[arg(long, value_enum)]
        policy: PolicyArg,

        /// Actually delete; without it only the plan is printed
        #[arg(long)]
        yes: bool,

        #[arg(long)]
        json: bool,

        #[arg(required = true)]
        selectors: Vec<String>,
    },

    /// Back up the selected flows into a source-format directory
    Backup {
        /// Existing directory to write the bundle into
        #[arg(long)]
        dest: PathBuf,

        #[arg(long)]
        json: bool,

        #[arg(required = true)]
        selectors: Vec<String>,
    },

    /// Recreate a flow from a bundle file
    Restore {
        /// Definition record or any version file of the bundle
        bundle: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration with provenance
    Config {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FilterArg {
    All,
    Active,
    Inactive,
    ActiveLower,
    Stale,
}

impl From<FilterArg> for LifecycleFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::All => LifecycleFilter::All,
            FilterArg::Active => LifecycleFilter::Active,
            FilterArg::Inactive => LifecycleFilter::Inactive,
            FilterArg::ActiveLower => LifecycleFilter::ActiveLowerVersion,
            FilterArg::Stale => LifecycleFilter::Stale,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    KeepActive,
    KeepLatest,
    DeleteAll,
}

impl From<PolicyArg> for RetentionPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::KeepActive => RetentionPolicy::KeepActive,
            PolicyArg::KeepLatest => RetentionPolicy::KeepLatest,
            PolicyArg::DeleteAll => RetentionPolicy::DeleteAll,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let loaded = match load_config(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(e.exit_code().as_i32());
        }
    };

    let code = match cli.command {
        Commands::Config { json } => run_config(&loaded, json),
        command => run_remote(command, &loaded),
    };
    process::exit(code.as_i32());
}

fn load_config(cli: &Cli) -> Result<LoadedConfig, flowvault::config::ConfigError> {
    let mut org = Map::new();
    if let Some(url) = &cli.instance_url {
        org.insert("instance_url".to_string(), Value::String(url.clone()));
    }
    if let Some(version) = &cli.api_version {
        org.insert("api_version".to_string(), Value::String(version.clone()));
    }
    let overrides = (!org.is_empty()).then(|| json!({ "org": org }));

    let paths = ConfigPaths::discover(cli.config.as_deref());
    let token = std::env::var(ACCESS_TOKEN_ENV).ok().filter(|t| !t.is_empty());
    EffectiveConfig::load(&paths, overrides, token)
}

/// Commands that talk to the org.
fn run_remote(command: Commands, loaded: &LoadedConfig) -> ExitCode {
    let client_config = match loaded.settings.client_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return e.exit_code();
        }
    };
    let client = ToolingClient::new(client_config);
    let concurrency = loaded.settings.batch.concurrency;

    let cancel = CancelToken::new();
    let handler = SignalHandler::new(cancel.clone());
    if let Err(e) = handler.install() {
        warn!("could not install interrupt handler: {}", e);
    }

    match command {
        Commands::Org { json } => run_org(&client, json),
        Commands::List { filter, json } => run_list(&client, filter.into(), json),
        Commands::Versions { selectors, json } => run_versions(&client, &selectors, json),
        Commands::Delete {
            policy,
            yes,
            json,
            selectors,
        } => {
            let engine = PolicyEngine::new(&client)
                .with_concurrency(concurrency)
                .with_cancel(cancel);
            run_delete(&engine, policy.into(), &selectors, yes, json)
        }
        Commands::Backup { dest, json, selectors } => {
            let engine = BackupEngine::new(&client)
                .with_concurrency(concurrency)
                .with_cancel(cancel);
            run_backup(&engine, &selectors, &dest, json)
        }
        Commands::Restore { bundle, json } => {
            let engine = RestoreEngine::new(&client).with_cancel(cancel);
            run_restore(&engine, &bundle, json)
        }
        Commands::Config { .. } => ExitCode::Success,
    }
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            ExitCode::Format
        }
    }
}

fn parse_selection(selectors: &[String]) -> Result<SelectionSet, ExitCode> {
    SelectionSet::parse(selectors).map_err(|e| {
        eprintln!("Invalid selection: {}", e);
        ExitCode::Config
    })
}

fn summary_code(summary: &BatchSummary) -> ExitCode {
    summary.exit_code_enum().unwrap_or(ExitCode::UnitFailures)
}

fn run_config(loaded: &LoadedConfig, json_output: bool) -> ExitCode {
    if json_output {
        return print_json(&loaded.effective);
    }

    println!("Sources (lowest precedence first):");
    for source in &loaded.effective.sources {
        match &source.path {
            Some(path) => println!("  {:?}: {}", source.origin, path),
            None => println!("  {:?}", source.origin),
        }
    }
    println!();
    match toml::to_string_pretty(&loaded.effective.config) {
        Ok(text) => print!("{}", text),
        Err(_) => return print_json(&loaded.effective.config),
    }
    if !loaded.effective.redactions.is_empty() {
        println!();
        println!("Redacted: {}", loaded.effective.redactions.join(", "));
    }
    ExitCode::Success
}

fn run_org(client: &dyn MetadataClient, json_output: bool) -> ExitCode {
    match client.get_org_context() {
        Ok(org) if json_output => print_json(&org),
        Ok(org) => {
            println!("{}", org.banner());
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("Cannot reach the org: {}", e);
            ExitCode::Unreachable
        }
    }
}

fn run_list(client: &dyn MetadataClient, filter: LifecycleFilter, json_output: bool) -> ExitCode {
    let statuses = match Inventory::new(client).list(filter) {
        Ok(statuses) => statuses,
        Err(e) => {
            eprintln!("Error listing flows: {}", e);
            return ExitCode::Unreachable;
        }
    };

    if json_output {
        return print_json(&statuses);
    }
    if statuses.is_empty() {
        println!("No flows match.");
        return ExitCode::Success;
    }

    println!("Flows ({} total):\n", statuses.len());
    for status in &statuses {
        let mut marks = Vec::new();
        if status.has_active {
            marks.push("active");
        }
        if status.active_lower_version {
            marks.push("active lower version");
        }
        if status.is_stale {
            marks.push("stale");
        }
        let version = |n: Option<u32>| n.map_or_else(|| "-".to_string(), |n| n.to_string());
        println!(
            "  {:<40} latest {:>4}  active {:>4}  {}",
            status.developer_name,
            version(status.latest_version_number),
            version(status.active_version_number),
            marks.join(", ")
        );
    }
    ExitCode::Success
}

fn run_versions(client: &dyn MetadataClient, selectors: &[String], json_output: bool) -> ExitCode {
    let selection = match parse_selection(selectors) {
        Ok(selection) => selection,
        Err(code) => return code,
    };

    let inventory = Inventory::new(client);
    let mut index = match inventory.index() {
        Ok(index) => index,
        Err(e) => {
            eprintln!("Error listing flows: {}", e);
            return ExitCode::Unreachable;
        }
    };
    let flows = inventory.versions(&selection, &mut index);
    let code = if flows.iter().any(|f| f.error.is_some()) {
        ExitCode::UnitFailures
    } else {
        ExitCode::Success
    };

    if json_output {
        let printed = print_json(&flows);
        return if printed.is_success() { code } else { printed };
    }

    for flow in &flows {
        match (&flow.classification, &flow.error) {
            (Some(classification), _) => {
                println!("{}", flow.name);
                for entry in &classification.entries {
                    let latest = if entry.is_latest { " (latest)" } else { "" };
                    println!(
                        "  v{:<4} {:<24} {}{}",
                        entry.version.version_number, entry.state, entry.version.id, latest
                    );
                }
                if let Some(warning) = &classification.warning {
                    println!("  warning: {}", warning);
                }
            }
            (None, error) => {
                println!("{}: {}", flow.selector, error.as_deref().unwrap_or("unresolved"));
            }
        }
    }
    code
}

fn run_delete(
    engine: &PolicyEngine<'_>,
    policy: RetentionPolicy,
    selectors: &[String],
    yes: bool,
    json_output: bool,
) -> ExitCode {
    let selection = match parse_selection(selectors) {
        Ok(selection) => selection,
        Err(code) => return code,
    };

    if !yes {
        return match engine.plan(policy, &selection) {
            Ok(plan) if json_output => print_json(&plan),
            Ok(plan) => {
                print_plan(&plan);
                ExitCode::Success
            }
            Err(e) => {
                eprintln!("{}", e);
                e.exit_code()
            }
        };
    }

    match engine.apply(policy, &selection) {
        Ok(report) => {
            let code = summary_code(&report.summary);
            if json_output {
                let printed = print_json(&report);
                return if printed.is_success() { code } else { printed };
            }
            print_deletion(&report);
            code
        }
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    }
}

fn print_plan(plan: &PlanReport) {
    if let Some(org) = &plan.org {
        println!("{}", org.banner());
    }
    println!("Policy {}: {} version(s) would be deleted\n", plan.policy, plan.delete_count());
    for entry in &plan.plans {
        match &entry.skip_reason {
            Some(reason) => println!("  {}: skipped ({})", entry.name, reason),
            None => {
                let numbers = |versions: &[flowvault_protocol::ArtifactVersion]| {
                    versions
                        .iter()
                        .map(|v| v.version_number.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                println!(
                    "  {}: delete [{}] keep [{}]",
                    entry.name,
                    numbers(&entry.delete),
                    numbers(&entry.keep)
                );
            }
        }
    }
    println!("\nRe-run with --yes to delete.");
}

fn print_deletion(report: &DeletionReport) {
    if let Some(org) = &report.org {
        println!("{}", org.banner());
    }
    for definition in &report.definitions {
        let deleted: Vec<String> = definition
            .versions
            .iter()
            .filter(|v| v.result == VersionResult::Deleted)
            .map(|v| v.version_number.to_string())
            .collect();
        if !deleted.is_empty() {
            println!("  {}: deleted [{}]", definition.name, deleted.join(", "));
        }
    }
    for skip in &report.skipped {
        match skip.version_number {
            Some(n) => println!("  {} v{}: skipped ({})", skip.name, n, skip.reason),
            None => println!("  {}: skipped ({})", skip.name, skip.reason),
        }
    }
    for failed in &report.failed_artifacts {
        for reason in &failed.reasons {
            println!("  {}: FAILED {}", failed.name, reason);
        }
    }
    if !report.not_started.is_empty() {
        println!("  not started: {}", report.not_started.join(", "));
    }
    println!("\n{}", report.summary.human_summary);
}

fn run_backup(engine: &BackupEngine<'_>, selectors: &[String], dest: &Path, json_output: bool) -> ExitCode {
    let selection = match parse_selection(selectors) {
        Ok(selection) => selection,
        Err(code) => return code,
    };

    match engine.backup_artifacts(&selection, dest) {
        Ok(report) => {
            let code = summary_code(&report.summary);
            if json_output {
                let printed = print_json(&report);
                return if printed.is_success() { code } else { printed };
            }
            print_backup(&report);
            code
        }
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    }
}

fn print_backup(report: &BackupReport) {
    if let Some(org) = &report.org {
        println!("{}", org.banner());
    }
    println!("Bundle: {}\n", report.target.display());
    for flow in &report.flows {
        if !flow.versions.is_empty() {
            let numbers: Vec<String> = flow.versions.iter().map(u32::to_string).collect();
            println!("  {}: versions [{}]", flow.name, numbers.join(", "));
        }
    }
    for skip in report.skipped.iter().chain(&report.markup_skipped) {
        match skip.version_number {
            Some(n) => println!("  {} v{}: skipped ({})", skip.name, n, skip.reason),
            None => println!("  {}: skipped ({})", skip.name, skip.reason),
        }
    }
    for failed in &report.failed {
        for reason in &failed.reasons {
            println!("  {}: FAILED {}", failed.name, reason);
        }
    }
    if !report.not_started.is_empty() {
        println!("  not started: {}", report.not_started.join(", "));
    }
    println!("\n{}", report.summary.human_summary);
}

fn run_restore(engine: &RestoreEngine<'_>, bundle: &Path, json_output: bool) -> ExitCode {
    match engine.restore_artifact(bundle) {
        Ok(report) => {
            let code = summary_code(&report.summary);
            if json_output {
                let printed = print_json(&report);
                return if printed.is_success() { code } else { printed };
            }
            print_restore(&report);
            code
        }
        Err(e) => {
            eprintln!("Restore failed: {}", e);
            e.exit_code()
        }
    }
}

fn print_restore(report: &RestoreReport) {
    if let Some(org) = &report.org {
        println!("{}", org.banner());
    }
    println!("{} from {}", report.developer_name, report.bundle.display());
    if let Some(id) = &report.definition_id {
        println!("  definition: {}", id);
    }
    for created in &report.created {
        println!(
            "  v{} -> {} ({})",
            created.version_number, created.version_id, created.status
        );
    }
    for reason in &report.failed {
        println!("  FAILED {}", reason);
    }
    if !report.not_attempted.is_empty() {
        let numbers: Vec<String> = report.not_attempted.iter().map(u32::to_string).collect();
        println!("  not attempted: [{}]", numbers.join(", "));
    }
    println!(
        "\nState {:?}: {}/{} versions created",
        report.state(),
        report.progress.created,
        report.progress.total
    );
}
