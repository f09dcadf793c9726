use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use tracing::{Level, debug, warn};
use trialdesk::config::{ClientConfig, ConfigError, normalize_base_url};
use trialdesk::net::types::{
    NewIrbSubmission, NewTrial, NewUser, PasswordChange, PatientIdentificationRequest, ProtocolDraftRequest,
    RegulatoryReportRequest, SiteAssociation, TaskKind, TaskTicket, TrialUpdate, UserUpdate,
};
use trialdesk::util::guard::LOGIN_ROUTE;
use trialdesk::util::poll::POLL_ERROR_MESSAGE;
use trialdesk::{
    ApiClient, ApiError, FileTokenStore, GuardBinding, GuardView, Navigator, PollState, RouteGuard, SessionError,
    SessionManager, TaskPoller,
};


const ADMIN_ROLE: &str = "Administrator";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("not logged in; run `trialctl login`")]
    NotLoggedIn,
    #[error("access denied: requires one of the roles {0}")]
    Forbidden(String),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("{}", .0.user_message())]
    Session(#[from] SessionError),
    #[error("{}", .0.user_message())]
    Api(#[from] ApiError),
    #[error("nothing to update; pass at least one field")]
    EmptyUpdate,
    #[error("{0}")]
    TaskFailed(String),
    #[error("{0}")]
    TaskError(String),
    #[error("task polling cancelled")]
    TaskCancelled,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

// =============================================================================
// ARGUMENTS
// =============================================================================

#[derive(Parser, Debug)]
#[command(name = "trialctl", about = "Clinical trial administration console")]
struct Cli {
    /// API base URL; overrides `TRIALDESK_API_URL`.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Log request-level detail to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "TRIALDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    Whoami,
    Password {
        #[arg(long)]
        current: String,
        #[arg(long = "new")]
        new_password: String,
    },
    Trials(TrialsCommand),
    Protocols(ProtocolsCommand),
    Irb(IrbCommand),
    Sites(SitesCommand),
    Patients(PatientsCommand),
    Monitoring(MonitoringCommand),
    Reports(ReportsCommand),
    Task(TaskCommand),
    Admin(AdminCommand),
}

#[derive(Args, Debug)]
struct TrialsCommand {
    #[command(subcommand)]
    command: TrialsSubcommand,
}

#[derive(Subcommand, Debug)]
enum TrialsSubcommand {
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    Get {
        trial_id: String,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        sponsor: String,
        #[arg(long)]
        phase: String,
        #[arg(long)]
        start_date: String,
        #[arg(long)]
        end_date: String,
        #[arg(long, default_value = "")]
        objectives: String,
        #[arg(long, default_value = "Planning")]
        status: String,
    },
    Update {
        trial_id: String,
        #[command(flatten)]
        fields: TrialFields,
    },
}

#[derive(Args, Debug, Default)]
struct TrialFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    sponsor: Option<String>,
    #[arg(long)]
    phase: Option<String>,
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    start_date: Option<String>,
    #[arg(long)]
    end_date: Option<String>,
    #[arg(long)]
    objectives: Option<String>,
}

impl From<TrialFields> for TrialUpdate {
    fn from(f: TrialFields) -> Self {
        Self {
            name: f.name,
            sponsor: f.sponsor,
            phase: f.phase,
            status: f.status,
            start_date: f.start_date,
            end_date: f.end_date,
            objectives: f.objectives,
        }
    }
}

#[derive(Args, Debug)]
struct ProtocolsCommand {
    #[command(subcommand)]
    command: ProtocolsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProtocolsSubcommand {
    List {
        trial_id: String,
    },
    Draft {
        trial_id: String,
        #[arg(long, default_value = "")]
        notes: String,
        #[arg(long)]
        wait: bool,
    },
}

#[derive(Args, Debug)]
struct IrbCommand {
    #[command(subcommand)]
    command: IrbSubcommand,
}

#[derive(Subcommand, Debug)]
enum IrbSubcommand {
    List {
        trial_id: String,
    },
    Create {
        trial_id: String,
        #[arg(long)]
        name: String,
        /// `YYYY-MM-DD`.
        #[arg(long)]
        date: String,
        #[arg(long, default_value = "Submitted")]
        status: String,
    },
}

#[derive(Args, Debug)]
struct SitesCommand {
    #[command(subcommand)]
    command: SitesSubcommand,
}

#[derive(Subcommand, Debug)]
enum SitesSubcommand {
    /// Sites in the global registry.
    Global {
        #[arg(long)]
        search: Option<String>,
    },
    List {
        trial_id: String,
    },
    Associate {
        trial_id: String,
        site_id: String,
        #[arg(long, default_value = "Pending")]
        status: String,
    },
}

#[derive(Args, Debug)]
struct PatientsCommand {
    #[command(subcommand)]
    command: PatientsSubcommand,
}

#[derive(Subcommand, Debug)]
enum PatientsSubcommand {
    List {
        trial_id: String,
    },
    Identify {
        trial_id: String,
        #[arg(long)]
        criteria: String,
        #[arg(long)]
        wait: bool,
    },
}

#[derive(Args, Debug)]
struct MonitoringCommand {
    #[command(subcommand)]
    command: MonitoringSubcommand,
}

#[derive(Subcommand, Debug)]
enum MonitoringSubcommand {
    Summary { trial_id: String },
    Events { trial_id: String },
}

#[derive(Args, Debug)]
struct ReportsCommand {
    #[command(subcommand)]
    command: ReportsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ReportsSubcommand {
    Generate {
        trial_id: String,
        #[arg(long = "type")]
        report_type: String,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        wait: bool,
    },
}

#[derive(Args, Debug)]
struct TaskCommand {
    #[command(subcommand)]
    command: TaskSubcommand,
}

#[derive(Subcommand, Debug)]
enum TaskSubcommand {
    Status { kind: TaskKindArg, task_id: String },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKindArg {
    Protocol,
    Patients,
    Report,
}

impl From<TaskKindArg> for TaskKind {
    fn from(kind: TaskKindArg) -> Self {
        match kind {
            TaskKindArg::Protocol => Self::ProtocolDraft,
            TaskKindArg::Patients => Self::PatientIdentification,
            TaskKindArg::Report => Self::RegulatoryReport,
        }
    }
}

#[derive(Args, Debug)]
struct AdminCommand {
    #[command(subcommand)]
    command: AdminSubcommand,
}

#[derive(Subcommand, Debug)]
enum AdminSubcommand {
    Users(UsersCommand),
}

#[derive(Args, Debug)]
struct UsersCommand {
    #[command(subcommand)]
    command: UsersSubcommand,
}

#[derive(Subcommand, Debug)]
enum UsersSubcommand {
    List {
        #[arg(long)]
        search: Option<String>,
    },
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "TRIALDESK_NEW_USER_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long = "role", required = true)]
        roles: Vec<String>,
    },
    Update {
        user_id: String,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long = "role")]
        roles: Vec<String>,
        #[arg(long)]
        status: Option<String>,
    },
}

// =============================================================================
// ENTRY
// =============================================================================

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).init();

    match run(cli).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.api_url.as_deref())?;
    debug!(api_url = %config.api_base_url, token_dir = %config.token_dir.display(), "configuration loaded");

    match cli.command {
        Command::Login { username, password } => {
            let mut manager = session_manager(&config)?;
            let profile = manager.login(&username, &password).await?;
            print_json(&profile)
        }
        Command::Logout => {
            let mut manager = session_manager(&config)?;
            manager.restore_from_storage().await;
            manager.logout().await;
            print_json(&json!({ "logged_out": true }))
        }
        Command::Whoami => {
            let manager = authorize(&config, GuardBinding::any_authenticated()).await?;
            print_json(&manager.session().user())
        }
        Command::Password { current, new_password } => {
            let manager = authorize(&config, GuardBinding::any_authenticated()).await?;
            let change = PasswordChange { current_password: current, new_password };
            manager.api().update_password(&change).await?;
            print_json(&json!({ "password_updated": true }))
        }
        Command::Admin(admin) => {
            let manager = authorize(&config, GuardBinding::roles([ADMIN_ROLE])).await?;
            run_admin(manager.api(), admin).await
        }
        command => {
            let manager = authorize(&config, GuardBinding::any_authenticated()).await?;
            run_resource(manager.api(), config.poll_interval(), command).await
        }
    }
}

fn load_config(api_url: Option<&str>) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = api_url {
        config.api_base_url = normalize_base_url(url)?;
    }
    config.absolute_base_url()?;
    Ok(config)
}

fn session_manager(config: &ClientConfig) -> Result<SessionManager, CliError> {
    let api = ApiClient::from_config(config)?;
    let store = FileTokenStore::in_dir(&config.token_dir);
    Ok(SessionManager::new(api, Arc::new(store)))
}

// =============================================================================
// GUARD
// =============================================================================

/// Navigator for a one-shot command: records where the guard wanted to go.
#[derive(Debug, Default)]
struct ConsoleNavigator {
    redirected_to: RefCell<Option<String>>,
}

impl ConsoleNavigator {
    fn redirected_to(&self) -> Option<String> {
        self.redirected_to.borrow().clone()
    }
}

impl Navigator for ConsoleNavigator {
    fn current_path(&self) -> String {
        "/console".to_owned()
    }

    fn replace(&self, path: &str) {
        *self.redirected_to.borrow_mut() = Some(path.to_owned());
    }
}

/// Restore the stored session and apply `binding` before any protected command.
async fn authorize(config: &ClientConfig, binding: GuardBinding) -> Result<SessionManager, CliError> {
    let mut manager = session_manager(config)?;
    manager.restore_from_storage().await;
    guard_outcome(&manager, binding)?;
    Ok(manager)
}

fn guard_outcome(manager: &SessionManager, binding: GuardBinding) -> Result<(), CliError> {
    let mut guard = RouteGuard::new(binding, ConsoleNavigator::default());
    match guard.evaluate(&manager.session()) {
        GuardView::Render => Ok(()),
        GuardView::Pending => {
            warn!("session still loading after restore");
            Err(CliError::NotLoggedIn)
        }
        GuardView::Nothing => match guard.navigator().redirected_to() {
            Some(target) if target == LOGIN_ROUTE => Err(CliError::NotLoggedIn),
            _ => {
                let roles = guard.binding().allowed_roles().iter().cloned().collect::<Vec<_>>();
                Err(CliError::Forbidden(roles.join(", ")))
            }
        },
    }
}

// =============================================================================
// RESOURCE COMMANDS
// =============================================================================

async fn run_resource(api: &ApiClient, interval: Duration, command: Command) -> Result<(), CliError> {
    match command {
        Command::Trials(trials) => run_trials(api, trials).await,
        Command::Protocols(protocols) => match protocols.command {
            ProtocolsSubcommand::List { trial_id } => print_json(&api.list_protocols(&trial_id).await?),
            ProtocolsSubcommand::Draft { trial_id, notes, wait } => {
                let ticket = api.draft_protocol(&trial_id, &ProtocolDraftRequest { notes }).await?;
                finish_task(api, TaskKind::ProtocolDraft, ticket, wait, interval).await
            }
        },
        Command::Irb(irb) => match irb.command {
            IrbSubcommand::List { trial_id } => print_json(&api.list_irb_submissions(&trial_id).await?),
            IrbSubcommand::Create { trial_id, name, date, status } => {
                let submission = NewIrbSubmission { name, submission_date: date, status };
                print_json(&api.create_irb_submission(&trial_id, &submission).await?)
            }
        },
        Command::Sites(sites) => match sites.command {
            SitesSubcommand::Global { search } => {
                let params = optional_params(&[("search", search.as_deref())]);
                print_json(&api.list_global_sites(&params).await?)
            }
            SitesSubcommand::List { trial_id } => print_json(&api.list_trial_sites(&trial_id).await?),
            SitesSubcommand::Associate { trial_id, site_id, status } => {
                let association = SiteAssociation { site_id, status };
                print_json(&api.associate_site(&trial_id, &association).await?)
            }
        },
        Command::Patients(patients) => match patients.command {
            PatientsSubcommand::List { trial_id } => print_json(&api.list_patients(&trial_id).await?),
            PatientsSubcommand::Identify { trial_id, criteria, wait } => {
                let request = PatientIdentificationRequest { criteria_details: criteria };
                let ticket = api.identify_patients(&trial_id, &request).await?;
                finish_task(api, TaskKind::PatientIdentification, ticket, wait, interval).await
            }
        },
        Command::Monitoring(monitoring) => match monitoring.command {
            MonitoringSubcommand::Summary { trial_id } => print_json(&api.monitoring_summary(&trial_id).await?),
            MonitoringSubcommand::Events { trial_id } => print_json(&api.monitoring_events(&trial_id).await?),
        },
        Command::Reports(reports) => match reports.command {
            ReportsSubcommand::Generate { trial_id, report_type, notes, wait } => {
                let request = RegulatoryReportRequest { report_type, notes };
                let ticket = api.generate_regulatory_report(&trial_id, &request).await?;
                finish_task(api, TaskKind::RegulatoryReport, ticket, wait, interval).await
            }
        },
        Command::Task(task) => match task.command {
            TaskSubcommand::Status { kind, task_id } => {
                let status = api.task_status(kind.into(), &task_id).await?;
                print_json(&status)
            }
        },
        Command::Login { .. } | Command::Logout | Command::Whoami | Command::Password { .. } | Command::Admin(_) => {
            Ok(())
        }
    }
}

async fn run_trials(api: &ApiClient, trials: TrialsCommand) -> Result<(), CliError> {
    match trials.command {
        TrialsSubcommand::List { search, status } => {
            let params = optional_params(&[("search", search.as_deref()), ("status", status.as_deref())]);
            print_json(&api.list_trials(&params).await?)
        }
        TrialsSubcommand::Get { trial_id } => print_json(&api.get_trial(&trial_id).await?),
        TrialsSubcommand::Create { name, sponsor, phase, start_date, end_date, objectives, status } => {
            let trial = NewTrial { name, sponsor, phase, start_date, end_date, objectives, status };
            print_json(&api.create_trial(&trial).await?)
        }
        TrialsSubcommand::Update { trial_id, fields } => {
            let update = TrialUpdate::from(fields);
            if update.is_empty() {
                return Err(CliError::EmptyUpdate);
            }
            print_json(&api.update_trial(&trial_id, &update).await?)
        }
    }
}

async fn run_admin(api: &ApiClient, admin: AdminCommand) -> Result<(), CliError> {
    let AdminSubcommand::Users(users) = admin.command;
    match users.command {
        UsersSubcommand::List { search } => {
            let params = optional_params(&[("search", search.as_deref())]);
            print_json(&api.list_users(&params).await?)
        }
        UsersSubcommand::Create { username, full_name, email, password, roles } => {
            let user = NewUser { username, full_name, email, password, roles };
            print_json(&api.create_user(&user).await?)
        }
        UsersSubcommand::Update { user_id, full_name, email, roles, status } => {
            let update = UserUpdate { full_name, email, roles: (!roles.is_empty()).then_some(roles), status };
            if update == UserUpdate::default() {
                return Err(CliError::EmptyUpdate);
            }
            print_json(&api.update_user(&user_id, &update).await?)
        }
    }
}

// =============================================================================
// TASKS
// =============================================================================

/// Print the ticket, or with `wait` follow the task to its terminal state.
async fn finish_task(
    api: &ApiClient,
    kind: TaskKind,
    ticket: TaskTicket,
    wait: bool,
    interval: Duration,
) -> Result<(), CliError> {
    if !wait {
        return print_json(&ticket);
    }
    eprintln!("task {} queued; checking every {}s", ticket.task_id, interval.as_secs_f32());

    let poll_api = api.clone();
    let task_id = ticket.task_id.clone();
    let handle = TaskPoller::spawn(interval, move || {
        let api = poll_api.clone();
        let task_id = task_id.clone();
        async move { api.task_status(kind, &task_id).await }
    });

    let label = kind.label();
    let mut updates = handle.subscribe();
    loop {
        let state = updates.borrow_and_update().clone();
        if state != PollState::Waiting {
            eprintln!("{}", state.describe(label));
        }
        if state.is_terminal() {
            break;
        }
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => handle.cancel(),
        }
    }

    match handle.state() {
        PollState::Completed(status) => print_json(&status),
        PollState::Failed(status) => {
            print_json(&status)?;
            Err(CliError::TaskFailed(status.status_line(label)))
        }
        PollState::Errored(detail) => Err(CliError::TaskError(format!("{POLL_ERROR_MESSAGE} ({detail})"))),
        PollState::Cancelled | PollState::Waiting | PollState::Running(_) => Err(CliError::TaskCancelled),
    }
}

// =============================================================================
// OUTPUT
// =============================================================================

fn optional_params<'a>(pairs: &[(&'a str, Option<&'a str>)]) -> Vec<(&'a str, &'a str)> {
    pairs
        .iter()
        .filter_map(|(key, value)| value.filter(|v| !v.is_empty()).map(|v| (*key, v)))
        .collect()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
