//! tesync - ThousandEyes tests to Terraform
//!
//! ## Commands
//!
//! - `import`: append provider and `import` blocks for every existing test
//! - `reconcile`: merge a desired test catalogue into a managed `.tf` file
//! - `list`: show tests or agents per account group

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{info, warn, Level};

use tesync_api::{
    collect_agents, collect_label_index, collect_tests, ApiConfig, MonitoringSource,
    ThousandEyesClient,
};
use tesync_core::obs::{self, RunSpan};
use tesync_core::{
    load_document, render_document, write_atomic, AccountGroup, AccountGroupIndex,
    AgentLabelIndex, DesiredStateBuilder, ImportBlockGenerator, ImportOptions, LookupSnapshot,
    ReconciliationEngine, SyncConfig,
};

/// File reconciled when `--target` is not given.
const DEFAULT_TARGET: &str = "main.tf";

#[derive(Parser)]
#[command(name = "tesync")]
#[command(version = tesync_core::VERSION)]
#[command(about = "Sync ThousandEyes tests into Terraform configuration", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON: log lines on stderr, listings on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate import blocks for the tests that already exist remotely
    Import {
        /// Terraform project directory (default: TERRAFORM_PROJECT_PATH or ".")
        #[arg(long)]
        project: Option<PathBuf>,

        /// Account group to include; repeat for several (default: all)
        #[arg(long = "account-group")]
        account_groups: Vec<String>,

        /// Do not write the API token as the token variable's default
        #[arg(long)]
        no_inline_token: bool,
    },

    /// Merge a desired test catalogue into a managed configuration file
    Reconcile {
        /// Desired test records (JSON array, or an object with a `tests` array)
        #[arg(long)]
        desired: PathBuf,

        /// Configuration file to update (default: <project>/main.tf)
        #[arg(long)]
        target: Option<PathBuf>,

        /// Offline snapshot of account groups and label bindings
        #[arg(long)]
        lookups: Option<PathBuf>,
    },

    /// List remote objects per account group
    List {
        #[command(subcommand)]
        what: ListAction,
    },
}

#[derive(Subcommand)]
enum ListAction {
    /// Tests, with the resource type each maps to
    Tests {
        #[arg(long = "account-group")]
        account_groups: Vec<String>,
    },
    /// Enterprise agents and their labels
    Agents {
        #[arg(long = "account-group")]
        account_groups: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tesync_core::init_tracing(cli.json, level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            obs::emit_run_aborted(&format!("{err:#}"));
            eprintln!("aborted: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = SyncConfig::from_env();

    match cli.command {
        Commands::Import {
            project,
            account_groups,
            no_inline_token,
        } => {
            let project = project.unwrap_or_else(|| config.project_path.clone());
            cmd_import(&config, &project, &account_groups, no_inline_token).await
        }
        Commands::Reconcile {
            desired,
            target,
            lookups,
        } => {
            let target = target.unwrap_or_else(|| config.project_path.join(DEFAULT_TARGET));
            cmd_reconcile(&config, &desired, &target, lookups.as_deref()).await
        }
        Commands::List { what } => match what {
            ListAction::Tests { account_groups } => {
                cmd_list_tests(&config, &account_groups, cli.json).await
            }
            ListAction::Agents { account_groups } => {
                cmd_list_agents(&config, &account_groups, cli.json).await
            }
        },
    }
}

/// Race `fut` against Ctrl-C. Cancellation surfaces as an error before
/// anything is written.
async fn cancellable<F: Future>(fut: F) -> Result<F::Output> {
    tokio::select! {
        out = fut => Ok(out),
        _ = tokio::signal::ctrl_c() => bail!("cancelled by user; no files were written"),
    }
}

fn api_client(config: &SyncConfig) -> Result<ThousandEyesClient> {
    let mut api = ApiConfig::from_env();
    if let Some(token) = &config.api_token {
        api = api.with_token(token);
    }
    if let Some(org) = &config.org_name {
        api = api.with_org(org);
    }
    ThousandEyesClient::new(api).context("Failed to create ThousandEyes API client")
}

/// Account groups of the organisation, narrowed to `wanted` when given.
async fn select_account_groups(
    source: &dyn MonitoringSource,
    wanted: &[String],
) -> Result<Vec<AccountGroup>> {
    let groups = cancellable(source.account_groups())
        .await?
        .context("Failed to fetch account groups")?;
    let mut index: AccountGroupIndex = groups.into_iter().collect();
    if !wanted.is_empty() {
        for missing in index.retain_named(wanted) {
            warn!(account_group = %missing, "account group not found; ignoring");
        }
    }
    if index.is_empty() {
        bail!("no account groups to synchronize");
    }
    Ok(index.groups().cloned().collect())
}

/// Bootstrap: append variable, provider and import blocks.
async fn cmd_import(
    config: &SyncConfig,
    project: &Path,
    account_groups: &[String],
    no_inline_token: bool,
) -> Result<()> {
    let _span = RunSpan::enter("import");
    let client = api_client(config)?;
    let groups = select_account_groups(&client, account_groups).await?;
    let tests = cancellable(collect_tests(&client, &groups)).await?;

    let plan = DesiredStateBuilder::import_plan(tests);
    let generator = ImportBlockGenerator::new(
        config.api_token.clone(),
        ImportOptions {
            inline_token: !no_inline_token,
            provider_version: config.provider_version.clone(),
        },
    );
    let files = generator
        .write(project, &plan)
        .with_context(|| format!("Failed to write import files under {}", project.display()))?;

    println!(
        "Imported {} tests from {} account groups ({} skipped)",
        plan.binding_count(),
        plan.accounts.len(),
        plan.skipped.len()
    );
    for path in [&files.variables, &files.providers, &files.imports] {
        println!("  wrote {}", path.display());
    }
    println!("Terraform configuration updated: {}", project.display());
    Ok(())
}

/// Desired records from a JSON file: an array, or `{"tests": [...]}`.
fn read_records(path: &Path) -> Result<Vec<Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    match value {
        Value::Array(records) => Ok(records),
        Value::Object(mut map) => match map.remove("tests") {
            Some(Value::Array(records)) => Ok(records),
            _ => bail!("{}: expected a `tests` array", path.display()),
        },
        _ => bail!("{}: expected a JSON array of test records", path.display()),
    }
}

fn read_snapshot(path: &Path) -> Result<(AccountGroupIndex, AgentLabelIndex)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let snapshot: LookupSnapshot = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse lookup snapshot {}", path.display()))?;
    let groups = snapshot.account_group_index();
    Ok((groups, snapshot.label_bindings))
}

/// Reconcile: parse, merge and atomically rewrite the target file.
async fn cmd_reconcile(
    config: &SyncConfig,
    desired_path: &Path,
    target: &Path,
    lookups: Option<&Path>,
) -> Result<()> {
    let _span = RunSpan::enter("reconcile");
    let desired = DesiredStateBuilder::from_records(&read_records(desired_path)?);
    let document = load_document(target)
        .with_context(|| format!("Failed to load {}", target.display()))?;

    let (groups, labels) = match lookups {
        Some(path) => read_snapshot(path)?,
        None => {
            let client = api_client(config)?;
            let wanted: Vec<String> = desired.account_groups.iter().cloned().collect();
            let groups = select_account_groups(&client, &wanted).await?;
            let labels = cancellable(collect_label_index(&client, &groups)).await?;
            (groups.into_iter().collect(), labels)
        }
    };

    let engine = ReconciliationEngine::new(&groups, &labels);
    let outcome = engine.reconcile(document, &desired)?;
    write_atomic(target, &render_document(&outcome.document))
        .with_context(|| format!("Failed to write {}", target.display()))?;
    obs::emit_document_written(
        target,
        outcome.document.providers.len(),
        outcome.document.resources.len(),
    );

    let report = &outcome.report;
    println!(
        "{} updated, {} deleted, {} unchanged, {} skipped, {} providers added",
        report.updated.len(),
        report.deleted.len(),
        report.unchanged,
        report.skipped.len(),
        report.providers_created.len()
    );
    for skipped in &report.skipped {
        println!("  skipped {}: {}", skipped.reference, skipped.reason);
    }
    println!("Terraform configuration updated: {}", target.display());
    Ok(())
}

async fn cmd_list_tests(config: &SyncConfig, account_groups: &[String], json: bool) -> Result<()> {
    let client = api_client(config)?;
    let groups = select_account_groups(&client, account_groups).await?;
    let collected = cancellable(collect_tests(&client, &groups)).await?;

    if json {
        let out: Vec<Value> = collected
            .iter()
            .map(|(group, tests)| {
                json!({"accountGroupName": group.name, "aid": group.id, "tests": tests})
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for (group, tests) in &collected {
        println!("{} ({})", group.name, group.id);
        for test in tests {
            let kind = test
                .test_type
                .as_deref()
                .and_then(|t| t.parse::<tesync_core::TestKind>().ok())
                .map(|k| k.resource_kind())
                .unwrap_or("unsupported");
            println!(
                "  {:>10}  {:<32} {}",
                test.test_id.as_deref().unwrap_or("-"),
                test.test_name.as_deref().unwrap_or("-"),
                kind
            );
        }
    }
    info!(account_groups = collected.len(), "listed tests");
    Ok(())
}

async fn cmd_list_agents(
    config: &SyncConfig,
    account_groups: &[String],
    json: bool,
) -> Result<()> {
    let client = api_client(config)?;
    let groups = select_account_groups(&client, account_groups).await?;
    let collected = cancellable(collect_agents(&client, &groups)).await?;

    if json {
        let out: Vec<Value> = collected
            .iter()
            .flat_map(|(group, agents)| {
                agents.iter().map(move |a| {
                    json!({
                        "accountGroupName": group.name,
                        "aid": group.id,
                        "agentId": a.agent.id,
                        "agentName": a.agent.name,
                        "agentType": a.agent.agent_type,
                        "location": a.agent.location,
                        "labels": a.labels,
                    })
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for (group, agents) in &collected {
        println!("{} ({})", group.name, group.id);
        for a in agents {
            println!(
                "  {:>8}  {:<24} {:<20} {}",
                a.agent.id,
                a.agent.name.as_deref().unwrap_or("-"),
                a.agent.location.as_deref().unwrap_or("-"),
                a.labels.join(", ")
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_repeated_account_groups() {
        let cli = Cli::try_parse_from([
            "tesync",
            "--json",
            "import",
            "--account-group",
            "Prod",
            "--account-group",
            "Lab",
            "--no-inline-token",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Import {
                account_groups,
                no_inline_token,
                project,
            } => {
                assert_eq!(account_groups, ["Prod", "Lab"]);
                assert!(no_inline_token);
                assert_eq!(project, None);
            }
            _ => panic!("expected import"),
        }
    }

    #[test]
    fn reconcile_requires_desired_file() {
        assert!(Cli::try_parse_from(["tesync", "reconcile"]).is_err());
    }

    #[test]
    fn records_accept_array_or_tests_object() {
        let dir = tempfile::tempdir().unwrap();
        let array = dir.path().join("a.json");
        std::fs::write(&array, r#"[{"testName": "a", "type": "api"}]"#).unwrap();
        assert_eq!(read_records(&array).unwrap().len(), 1);

        let object = dir.path().join("b.json");
        std::fs::write(&object, r#"{"tests": [{"testName": "a"}, {"testName": "b"}]}"#).unwrap();
        assert_eq!(read_records(&object).unwrap().len(), 2);

        let scalar = dir.path().join("c.json");
        std::fs::write(&scalar, "42").unwrap();
        assert!(read_records(&scalar).is_err());
    }

    #[tokio::test]
    async fn reconcile_with_snapshot_writes_target() {
        let dir = tempfile::tempdir().unwrap();
        let desired = dir.path().join("desired.json");
        std::fs::write(
            &desired,
            r#"[{"testName": "Checkout", "type": "http-server", "update": true,
                 "agentsLabel": "EU-Agents --> Prod"}]"#,
        )
        .unwrap();
        let lookups = dir.path().join("lookups.json");
        std::fs::write(
            &lookups,
            r#"{"accountGroups": [{"name": "Prod", "id": "555"}],
                "labelBindings": [{"label": "EU-Agents", "accountGroupId": "555",
                                   "agents": [{"agentId": "9"}]}]}"#,
        )
        .unwrap();
        let target = dir.path().join("main.tf");

        cmd_reconcile(&SyncConfig::from_env(), &desired, &target, Some(&lookups))
            .await
            .unwrap();

        let text = std::fs::read_to_string(&target).unwrap();
        assert!(text.contains("resource \"thousandeyes_http_server\" \"checkout\""));
        assert!(text.contains("provider = thousandeyes.prod"));
        assert!(text.contains("agent_id = 9"));
    }

    #[tokio::test]
    async fn failed_reconcile_leaves_target_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let desired = dir.path().join("desired.json");
        std::fs::write(
            &desired,
            r#"[{"testName": "Ghost", "type": "api", "delete": true, "accountGroupName": "Prod"}]"#,
        )
        .unwrap();
        let lookups = dir.path().join("lookups.json");
        std::fs::write(&lookups, r#"{"accountGroups": [{"name": "Prod", "id": "555"}]}"#).unwrap();
        let target = dir.path().join("main.tf");
        std::fs::write(&target, "# managed by tesync\n").unwrap();

        let err = cmd_reconcile(&SyncConfig::from_env(), &desired, &target, Some(&lookups))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("resource not found"));
        assert_eq!(
            std::fs::read_to_string(&target).unwrap(),
            "# managed by tesync\n"
        );
    }
}
