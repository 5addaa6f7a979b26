use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cli::{CliCommand, parse_cli_args, usage_text, version_text};
use crate::config::IpamSettings;
use crate::database::{Address, Database, Subnet, SubnetUsage};
use crate::discovery::source_from_locator;
use crate::error::{IpamResult, Outcome};
use crate::ipam::{AddressRegistry, AllocationPlanner, Reconciler, SubnetRegistry};
use crate::models::{AllocationPlan, ApplyReport, PlanRequest, ReconcileReport};

pub type OutputHook = Arc<dyn Fn(&str) + Send + Sync>;
pub type EventHook = Arc<dyn Fn(&AppEvent) + Send + Sync>;

#[derive(Clone)]
pub struct AppContext {
    db_path: PathBuf,
    database: Option<Database>,
    settings: IpamSettings,
    output_hook: OutputHook,
    event_hook: EventHook,
    cancel_flag: Arc<AtomicBool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AppEvent {
    Info { message: String },
    Warn { message: String },
    PlanApplied { site_id: i64, created: usize, skipped: usize },
    ReconcileFinished { company_id: i64, matched: usize, unmatched: usize },
    Cancelled { stage: String },
}

/// Plan output, with the apply report when `--apply` was given
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanOutcome {
    pub plan: AllocationPlan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied: Option<ApplyReport>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum AppCommandResult {
    HelpText(String),
    VersionText(String),
    Plan(PlanOutcome),
    Subnets(Vec<Subnet>),
    Usage(Vec<SubnetUsage>),
    Addresses(Vec<Address>),
    Reconcile(ReconcileReport),
}

impl Default for AppContext {
    fn default() -> Self {
        Self::from_env()
    }
}

impl AppContext {
    pub fn from_env() -> Self {
        let settings = IpamSettings::from_env();
        Self {
            db_path: settings.db_path.clone().unwrap_or_else(Database::default_path),
            database: None,
            settings,
            output_hook: Arc::new(|line| println!("{}", line)),
            event_hook: Arc::new(|_| {}),
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_db_path(mut self, db_path: PathBuf) -> Self {
        self.db_path = db_path;
        self.database = None;
        self
    }

    /// Use an already-open database (e.g. `Database::in_memory()`) instead of
    /// opening `db_path` per command.
    pub fn with_database(mut self, database: Database) -> Self {
        self.db_path = database.path().clone();
        self.database = Some(database);
        self
    }

    pub fn with_settings(mut self, settings: IpamSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_output_hook(mut self, output_hook: OutputHook) -> Self {
        self.output_hook = output_hook;
        self
    }

    pub fn with_event_hook(mut self, event_hook: EventHook) -> Self {
        self.event_hook = event_hook;
        self
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn settings(&self) -> &IpamSettings {
        &self.settings
    }

    pub fn open_database(&self) -> IpamResult<Database> {
        match &self.database {
            Some(db) => Ok(db.clone()),
            None => Database::new(self.db_path.clone()),
        }
    }

    pub fn emit_line(&self, line: &str) {
        (self.output_hook)(line);
    }

    pub fn emit_event(&self, event: AppEvent) {
        (self.event_hook)(&event);
    }

    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn reset_cancel(&self) {
        self.cancel_flag.store(false, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }
}

/// Run the app by parsing CLI-style args and dispatching the command.
pub async fn run<I, S>(args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let context = AppContext::from_env();
    run_with_context(args, &context).await
}

/// Run the app with an explicit context (db path, settings, and output hooks).
pub async fn run_with_context<I, S>(args: I, context: &AppContext) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let command = parse_cli_args(args)?;
    execute_command_with_context(command, context).await
}

/// Run the app with Ctrl+C cancellation wired into the provided context.
pub async fn run_with_ctrl_c<I, S>(args: I, context: &AppContext) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let cancel_context = context.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_context.cancel();
            crate::log_stderr!("Cancellation requested (Ctrl+C). Stopping the current pass...");
        }
    });

    let run_result = run_with_context(args, context).await;
    signal_task.abort();
    run_result
}

/// Execute a pre-parsed command with an explicit execution context.
///
/// Domain results are emitted as a pretty JSON [`Outcome`] envelope. A failed
/// command still emits its envelope, then returns the error for the exit code.
pub async fn execute_command_with_context(command: CliCommand, context: &AppContext) -> Result<()> {
    match execute_command_typed(command, context).await {
        Ok(AppCommandResult::HelpText(text)) | Ok(AppCommandResult::VersionText(text)) => {
            context.emit_line(&text);
            Ok(())
        }
        Ok(result) => {
            let output = serde_json::to_string_pretty(&Outcome::success(result))
                .context("Failed to serialize command output")?;
            context.emit_line(&output);
            Ok(())
        }
        Err(err) => {
            let output = serde_json::to_string_pretty(&Outcome::<()>::failure(&err))
                .context("Failed to serialize command error")?;
            context.emit_line(&output);
            crate::log_error!("Command failed: {}", err);
            Err(anyhow::Error::new(err))
        }
    }
}

/// Execute a pre-parsed command and return a strongly-typed result payload.
pub async fn execute_command_typed(
    command: CliCommand,
    context: &AppContext,
) -> IpamResult<AppCommandResult> {
    match command {
        CliCommand::Help => Ok(AppCommandResult::HelpText(usage_text())),
        CliCommand::Version => Ok(AppCommandResult::VersionText(version_text())),
        CliCommand::Plan {
            site_id,
            base_cidr,
            expectations,
            apply,
        } => {
            let planner = AllocationPlanner::new(context.open_database()?, context.settings.clone());
            let plan = planner.plan(&PlanRequest {
                site_id,
                base_cidr,
                expectations,
            })?;
            let applied = if apply {
                let report = planner.apply(&plan)?;
                context.emit_event(AppEvent::PlanApplied {
                    site_id,
                    created: report.created.len(),
                    skipped: report.skipped.len(),
                });
                Some(report)
            } else {
                let applicable = plan.suggestions.iter().filter(|s| s.is_applicable()).count();
                context.emit_event(AppEvent::Info {
                    message: format!(
                        "{} of {} suggestions can be created; rerun with --apply",
                        applicable,
                        plan.suggestions.len()
                    ),
                });
                None
            };
            Ok(AppCommandResult::Plan(PlanOutcome { plan, applied }))
        }
        CliCommand::Subnets { filter } => {
            let registry = SubnetRegistry::new(context.open_database()?, context.settings.clone());
            Ok(AppCommandResult::Subnets(registry.list(&filter)?))
        }
        CliCommand::Usage {
            company_id,
            site_id,
        } => {
            let registry = SubnetRegistry::new(context.open_database()?, context.settings.clone());
            Ok(AppCommandResult::Usage(
                registry.stats_with_usage(company_id, site_id)?,
            ))
        }
        CliCommand::Addresses { subnet_id } => {
            let registry = AddressRegistry::new(context.open_database()?, context.settings.clone());
            Ok(AppCommandResult::Addresses(registry.list(subnet_id)?))
        }
        CliCommand::Reconcile {
            company_id,
            source,
            group,
        } => {
            let source = source_from_locator(&source)?;
            let reconciler = Reconciler::new(context.open_database()?, context.settings.clone());
            let report = reconciler
                .run(
                    source.as_ref(),
                    company_id,
                    group.as_deref(),
                    &context.cancel_flag,
                )
                .await?;
            if report.errors > 0 {
                context.emit_event(AppEvent::Warn {
                    message: format!("{} address upserts failed", report.errors),
                });
            }
            if report.cancelled {
                context.emit_event(AppEvent::Cancelled {
                    stage: "reconcile".to_string(),
                });
            }
            context.emit_event(AppEvent::ReconcileFinished {
                company_id,
                matched: report.matched,
                unmatched: report.unmatched,
            });
            Ok(AppCommandResult::Reconcile(report))
        }
    }
}
