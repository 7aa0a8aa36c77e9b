use std::{env, fmt, str::FromStr, sync::Arc};

use log::info;

use crate::{
    errors::{StoreError, StoreResult},
    graph::GraphService,
    repo::Service,
    sql::{HelperRegistry, SqlService, SqliteHelper},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    #[default]
    Sql,
    Graph,
}

impl BackendKind {
    pub fn from_env() -> StoreResult<Self> {
        match env::var("FEEDSTORE_BACKEND") {
            Ok(value) => value.parse(),
            Err(_) => Ok(BackendKind::Sql),
        }
    }
}

impl FromStr for BackendKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "sql" => Ok(BackendKind::Sql),
            "graph" => Ok(BackendKind::Graph),
            other => Err(StoreError::configuration(format!(
                "unknown backend `{other}`, expected sql or graph"
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Sql => "sql",
            BackendKind::Graph => "graph",
        })
    }
}

/// Everything needed to open a store; resolved once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: BackendKind,
    /// Dialect helper name, used by the sql backend only.
    pub driver: String,
    /// A path, a `file:` URI or `:memory:`.
    pub connect: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Sql,
            driver: SqliteHelper::DRIVER.to_string(),
            connect: ":memory:".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> StoreResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            backend: BackendKind::from_env()?,
            driver: env::var("FEEDSTORE_DRIVER").unwrap_or(defaults.driver),
            connect: env::var("FEEDSTORE_CONNECT").unwrap_or(defaults.connect),
        })
    }
}

pub fn open_service(
    config: &StoreConfig,
    registry: Arc<HelperRegistry>,
) -> StoreResult<Box<dyn Service>> {
    info!(
        "event=service_open module=backend_selector status=start backend={} driver={}",
        config.backend, config.driver
    );
    let service: Box<dyn Service> = match config.backend {
        BackendKind::Sql => Box::new(SqlService::open(registry, &config.driver, &config.connect)?),
        BackendKind::Graph => Box::new(GraphService::open(&config.connect)?),
    };
    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_parse() {
        assert_eq!("sql".parse::<BackendKind>().unwrap(), BackendKind::Sql);
        assert_eq!(" graph ".parse::<BackendKind>().unwrap(), BackendKind::Graph);
        let err = "neo4j".parse::<BackendKind>().unwrap_err();
        assert!(matches!(err, StoreError::Configuration(_)));
    }

    #[test]
    fn opens_the_selected_backend() {
        let registry = Arc::new(HelperRegistry::with_builtin());
        let sql = open_service(&StoreConfig::default(), Arc::clone(&registry)).unwrap();
        assert_eq!(sql.backend_name(), "sql");

        let config = StoreConfig {
            backend: BackendKind::Graph,
            ..StoreConfig::default()
        };
        let graph = open_service(&config, registry).unwrap();
        assert_eq!(graph.backend_name(), "graph");
    }
}
