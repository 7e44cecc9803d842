//! Command-line front end for the calendar core.
//!
//! # Responsibility
//! - Load configuration, start logging and open the configured event store.
//! - Map subcommands onto `EventService` calls and print JSON results.
//!
//! # Invariants
//! - Failures print `code: message` on stderr and exit non-zero.

use calendar_core::{
    init_from_config, open_repository, CalendarConfig, CalendarPeriod, ConfigError,
    CreateEventRequest, EventRepository, EventService, EventServiceError, RepoError,
    UpdateEventRequest,
};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use log::info;
use serde_json::json;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::process::ExitCode;

/// Calendar: schedule non-overlapping events
#[derive(Parser, Debug)]
#[command(name = "calendar")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "calendar.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Schedule a new event
    Create {
        /// Event title (3 to 50 characters)
        #[arg(short, long)]
        title: String,
        /// Start instant (RFC 3339)
        #[arg(short, long)]
        start: String,
        /// End instant (RFC 3339), must be after start
        #[arg(short, long)]
        end: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Replace an existing event
    Update {
        /// Event ID
        id: String,
        #[arg(short, long)]
        title: String,
        #[arg(short, long)]
        start: String,
        #[arg(short, long)]
        end: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Delete an event by ID
    Delete { id: String },
    /// Show one event
    Get { id: String },
    /// List events of the day containing DATE
    Day {
        /// RFC 3339 instant or YYYY-MM-DD in local time (default: now)
        date: Option<String>,
    },
    /// List events of the ISO week containing DATE
    Week { date: Option<String> },
    /// List events of the month containing DATE
    Month { date: Option<String> },
    /// List all events, one page at a time
    List {
        /// Zero-based page number
        #[arg(short, long, default_value = "0")]
        page: u32,
    },
}

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Logging(String),
    Storage(RepoError),
    Service(EventServiceError),
    Input(String),
    Output(serde_json::Error),
}

impl CliError {
    fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_invalid",
            Self::Logging(_) => "logging_failed",
            Self::Storage(_) => "storage_failure",
            Self::Service(err) => err.code(),
            Self::Input(_) => "invalid_input",
            Self::Output(_) => "output_failed",
        }
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Logging(message) => write!(f, "{message}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Service(err) => write!(f, "{err}"),
            Self::Input(message) => write!(f, "{message}"),
            Self::Output(err) => write!(f, "{err}"),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<RepoError> for CliError {
    fn from(value: RepoError) -> Self {
        Self::Storage(value)
    }
}

impl From<EventServiceError> for CliError {
    fn from(value: EventServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Output(value)
    }
}

/// Instant selecting a calendar period.
enum PeriodAnchor {
    /// Explicit instant carrying its own offset.
    Zoned(DateTime<FixedOffset>),
    /// Local wall time, so DST transitions inside the period are honored.
    Local(DateTime<Local>),
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}: {}", err.code(), err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<String, CliError> {
    let config = CalendarConfig::load_or_default(&args.config)?;
    init_from_config(&config.log).map_err(CliError::Logging)?;

    let repo = open_repository(&config.storage)?;
    let service = EventService::with_page_size(repo, config.listing.page_size);
    info!(
        "event=cli_start module=cli status=ok page_size={}",
        service.page_size()
    );

    execute(&service, args.command)
}

fn execute<R: EventRepository>(
    service: &EventService<R>,
    command: Command,
) -> Result<String, CliError> {
    let value = match command {
        Command::Create {
            title,
            start,
            end,
            description,
        } => {
            let request = CreateEventRequest {
                title,
                start: parse_instant(&start)?,
                end: parse_instant(&end)?,
                description,
            };
            let id = service.create(&request)?;
            json!({ "id": id.to_string() })
        }
        Command::Update {
            id,
            title,
            start,
            end,
            description,
        } => {
            let request = UpdateEventRequest {
                id,
                title,
                start: parse_instant(&start)?,
                end: parse_instant(&end)?,
                description,
            };
            service.update(&request)?;
            serde_json::to_value(service.get(&request.id)?)?
        }
        Command::Delete { id } => {
            service.delete(&id)?;
            json!({ "deleted": id })
        }
        Command::Get { id } => serde_json::to_value(service.get(&id)?)?,
        Command::Day { date } => list_period(service, CalendarPeriod::Day, date)?,
        Command::Week { date } => list_period(service, CalendarPeriod::Week, date)?,
        Command::Month { date } => list_period(service, CalendarPeriod::Month, date)?,
        Command::List { page } => serde_json::to_value(service.list_all(page)?)?,
    };
    Ok(serde_json::to_string_pretty(&value)?)
}

fn list_period<R: EventRepository>(
    service: &EventService<R>,
    period: CalendarPeriod,
    date: Option<String>,
) -> Result<serde_json::Value, CliError> {
    let events = match parse_anchor(date.as_deref())? {
        PeriodAnchor::Zoned(t) => service.list_period(period, &t)?,
        PeriodAnchor::Local(t) => service.list_period(period, &t)?,
    };
    Ok(serde_json::to_value(events)?)
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>, CliError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|err| CliError::Input(format!("invalid RFC 3339 instant `{value}`: {err}")))
}

fn parse_anchor(value: Option<&str>) -> Result<PeriodAnchor, CliError> {
    let Some(raw) = value.map(str::trim) else {
        return Ok(PeriodAnchor::Local(Local::now()));
    };
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(PeriodAnchor::Zoned(t));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        CliError::Input(format!(
            "invalid date `{raw}`; expected RFC 3339 or YYYY-MM-DD"
        ))
    })?;
    // Noon always exists locally, even on DST transition days.
    let noon = date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN));
    Local
        .from_local_datetime(&noon)
        .earliest()
        .map(PeriodAnchor::Local)
        .ok_or_else(|| CliError::Input(format!("date `{raw}` has no local noon")))
}

#[cfg(test)]
mod tests {
    use super::{parse_anchor, parse_instant, PeriodAnchor};
    use chrono::{TimeZone, Utc};

    #[test]
    fn instants_are_normalized_to_utc() {
        let t = parse_instant("2020-01-01T03:00:00+03:00").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn anchor_keeps_explicit_offset() {
        let anchor = parse_anchor(Some("2020-01-01T01:00:00+03:00")).unwrap();
        assert!(matches!(anchor, PeriodAnchor::Zoned(t) if t.offset().local_minus_utc() == 3 * 3600));
    }

    #[test]
    fn bare_date_is_local() {
        assert!(matches!(
            parse_anchor(Some("2020-02-29")).unwrap(),
            PeriodAnchor::Local(_)
        ));
        assert!(parse_anchor(Some("2020-02-30")).is_err());
    }
}
