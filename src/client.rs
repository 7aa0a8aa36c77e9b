use std::{path::PathBuf, str::FromStr};

use crate::{
    backend_selector::{BackendKind, StoreConfig},
    errors::StoreResult,
    logging::default_log_level,
    repo::Service,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Command {
    #[default]
    Status,
    Users,
    Feeds,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "status" => Ok(Command::Status),
            "users" => Ok(Command::Users),
            "feeds" => Ok(Command::Feeds),
            other => Err(format!("unknown command {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLineConfig {
    pub store: StoreConfig,
    pub command: Command,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl CommandLineConfig {
    /// Parses `args` (program name first) on top of `defaults`, which
    /// usually come from the environment.
    pub fn from_args(args: &[&str], defaults: StoreConfig) -> Result<Self, String> {
        let mut store = defaults;
        let mut command = Command::default();
        let mut log_level = default_log_level().to_string();
        let mut log_dir = None;
        let mut iter = args.iter().skip(1);
        while let Some(arg) = iter.next() {
            let mut value = |flag: &str| {
                iter.next()
                    .map(|value| value.to_string())
                    .ok_or_else(|| format!("{flag} requires a value"))
            };
            match *arg {
                "--backend" => {
                    store.backend = value("--backend")?
                        .parse::<BackendKind>()
                        .map_err(|err| err.to_string())?;
                }
                "--driver" => store.driver = value("--driver")?,
                "--db" | "--database" => store.connect = value("--db")?,
                "--command" => command = value("--command")?.parse()?,
                "--log-level" => log_level = value("--log-level")?,
                "--log-dir" => log_dir = Some(PathBuf::from(value("--log-dir")?)),
                other if other.starts_with('-') => {
                    return Err(format!("unknown flag {other}"));
                }
                other => command = other.parse()?,
            }
        }
        Ok(Self {
            store,
            command,
            log_level,
            log_dir,
        })
    }

    pub fn help() -> &'static str {
        "Usage: feedstore [--backend sql|graph] [--driver sqlite3] [--db :memory:|PATH|file:URI] \
         [--command status|users|feeds] [--log-level LEVEL] [--log-dir DIR]\n"
    }
}

/// Renders the command's report, one line per entry.
pub fn run_command(service: &dyn Service, command: Command) -> StoreResult<Vec<String>> {
    match command {
        Command::Status => {
            let users = service.users().all()?.len();
            let feeds = service.feeds().all()?.len();
            let subscriptions = service.subscriptions().all()?.len();
            Ok(vec![format!(
                "backend={} users={users} feeds={feeds} subscriptions={subscriptions}",
                service.backend_name()
            )])
        }
        Command::Users => Ok(service
            .users()
            .all()?
            .into_iter()
            .map(|user| format!("{} admin={} active={}", user.login, user.admin, user.active))
            .collect()),
        Command::Feeds => Ok(service
            .feeds()
            .all()?
            .into_iter()
            .map(|feed| format!("{}:{} {}", feed.id, feed.link, feed.title))
            .collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let config = CommandLineConfig::from_args(
            &["feedstore", "--backend", "graph", "--db", "/tmp/x.db", "users"],
            StoreConfig::default(),
        )
        .unwrap();
        assert_eq!(config.store.backend, BackendKind::Graph);
        assert_eq!(config.store.connect, "/tmp/x.db");
        assert_eq!(config.command, Command::Users);
    }

    #[test]
    fn missing_values_and_unknown_flags_fail() {
        assert!(CommandLineConfig::from_args(&["feedstore", "--db"], StoreConfig::default()).is_err());
        assert!(
            CommandLineConfig::from_args(&["feedstore", "--verbose"], StoreConfig::default())
                .is_err()
        );
        assert!(
            CommandLineConfig::from_args(&["feedstore", "--backend", "neo4j"], StoreConfig::default())
                .is_err()
        );
    }
}
