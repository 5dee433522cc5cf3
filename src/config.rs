use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::Parser;
use sqlx::postgres::PgConnectOptions;

use crate::collectors::hh::parse_employer_id;
use crate::error::AppError;

/// Keys the connection parameter file must provide.
const REQUIRED_KEYS: [&str; 4] = ["host", "port", "user", "password"];

#[derive(Parser, Debug, Clone)]
#[command(
    name = "vacancydb",
    about = "Load hh.ru vacancies for selected employers and report on them"
)]
pub struct Config {
    /// Connection parameter file with host, port, user and password
    #[arg(long, env = "DB_CONFIG", default_value = "data/config.env")]
    pub config: PathBuf,

    /// JSON file holding the list of employer IDs
    #[arg(long, env = "EMPLOYER_IDS", default_value = "data/employer_ids.json")]
    pub employers: PathBuf,

    /// Employer ID to load (repeatable); overrides the list file
    #[arg(long)]
    pub employer_id: Vec<String>,

    /// Database to recreate when connecting through the parameter file
    #[arg(long, env = "DB_NAME", default_value = "vacancies")]
    pub database: String,

    /// Database URL (postgres:// or sqlite:); bypasses the parameter file
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Base URL of the hh.ru API
    #[arg(long, env = "HH_API_URL", default_value = "https://api.hh.ru")]
    pub api_url: String,

    /// User-Agent sent to the API, which rejects anonymous clients
    #[arg(long, env = "HH_USER_AGENT", default_value = "vacancydb/0.1")]
    pub user_agent: String,

    /// Write logs to this file instead of stderr
    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(clap::Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Load vacancies, then open the report menu (default when no subcommand given)
    Run,
    /// Load vacancies and exit
    Load,
    /// Open the report menu over an already loaded database
    Menu,
}

impl Config {
    /// Resolve the command, defaulting to Run if none specified.
    pub fn resolved_command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }

    /// Employer IDs from `--employer-id` when given, otherwise from the list file.
    /// Malformed command-line values are logged and skipped.
    pub fn employer_ids(&self) -> Vec<i64> {
        if self.employer_id.is_empty() {
            return read_employer_ids(&self.employers);
        }

        self.employer_id
            .iter()
            .filter_map(|raw| match parse_employer_id(raw) {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!("Skipping employer: {e}");
                    None
                }
            })
            .collect()
    }
}

/// Named database connection parameters. Empty when the source could not be read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionParams(BTreeMap<String, String>);

impl ConnectionParams {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn require(&self, key: &str) -> Result<&str, AppError> {
        self.get(key)
            .ok_or_else(|| AppError::Config(format!("missing connection parameter '{key}'")))
    }

    /// Server connection options, without a database selected.
    pub fn pg_options(&self) -> Result<PgConnectOptions, AppError> {
        if self.is_empty() {
            return Err(AppError::Config(
                "no database connection parameters available".to_string(),
            ));
        }

        let port = self
            .require("port")?
            .parse::<u16>()
            .map_err(|e| AppError::Config(format!("invalid port: {e}")))?;

        Ok(PgConnectOptions::new()
            .host(self.require("host")?)
            .port(port)
            .username(self.require("user")?)
            .password(self.require("password")?))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConnectionParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Read connection parameters from a `key=value` file.
/// Any problem is logged and yields empty parameters.
pub fn read_db_config(path: &Path) -> ConnectionParams {
    tracing::info!("Reading config file: {}", path.display());
    match load_db_config(path) {
        Ok(params) => {
            tracing::info!("Successfully read config file: {}", path.display());
            params
        }
        Err(e) => {
            tracing::error!("Error reading config file: {e}");
            ConnectionParams::default()
        }
    }
}

fn load_db_config(path: &Path) -> Result<ConnectionParams, AppError> {
    let entries = dotenvy::from_path_iter(path)
        .map_err(|e| AppError::Config(format!("{}: {e}", path.display())))?;

    let mut values = BTreeMap::new();
    for entry in entries {
        let (key, value) =
            entry.map_err(|e| AppError::Config(format!("{}: {e}", path.display())))?;
        values.insert(key.to_lowercase(), value.trim().to_string());
    }

    let mut params = BTreeMap::new();
    for key in REQUIRED_KEYS {
        match values.remove(key) {
            Some(value) if !value.is_empty() => {
                params.insert(key.to_string(), value);
            }
            _ => {
                return Err(AppError::Config(format!(
                    "{}: missing option '{key}'",
                    path.display()
                )));
            }
        }
    }

    Ok(ConnectionParams(params))
}

/// Read the JSON list of employer IDs.
/// Any problem is logged and yields an empty list.
pub fn read_employer_ids(path: &Path) -> Vec<i64> {
    tracing::info!("Reading employer IDs from {}", path.display());
    match load_employer_ids(path) {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!("Error reading employer IDs: {e}");
            Vec::new()
        }
    }
}

fn load_employer_ids(path: &Path) -> Result<Vec<i64>, AppError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&raw).map_err(|e| AppError::Config(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn temp_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const VALID_CONFIG: &str =
        "host=localhost\nport=5432\nuser=test_user\npassword=test_password\n";

    #[test]
    fn reads_all_connection_params() {
        let file = temp_file(VALID_CONFIG);
        let params = read_db_config(file.path());

        let expected: ConnectionParams = [
            ("host", "localhost"),
            ("port", "5432"),
            ("user", "test_user"),
            ("password", "test_password"),
        ]
        .into_iter()
        .collect();
        assert_eq!(params, expected);
    }

    #[test]
    fn ignores_unknown_keys_and_key_case() {
        let file = temp_file("HOST=db\nPort=6543\nuser=u\npassword=p\nsslmode=disable\n");
        let params = read_db_config(file.path());

        assert_eq!(params.get("host"), Some("db"));
        assert_eq!(params.get("port"), Some("6543"));
        assert_eq!(params.get("sslmode"), None);
    }

    #[test]
    fn missing_config_file_yields_empty_params() {
        let params = read_db_config(Path::new("non_existent_file.env"));
        assert!(params.is_empty());
    }

    #[test]
    fn missing_option_yields_empty_params() {
        let file = temp_file("host=localhost\nport=5432\nuser=test_user\n");
        assert!(read_db_config(file.path()).is_empty());
    }

    #[test]
    fn blank_option_yields_empty_params() {
        let file = temp_file("host=localhost\nport=5432\nuser=test_user\npassword=\n");
        assert!(read_db_config(file.path()).is_empty());
    }

    #[test]
    fn empty_config_file_yields_empty_params() {
        let file = temp_file("");
        assert!(read_db_config(file.path()).is_empty());
    }

    #[test]
    fn empty_params_cannot_build_connection_options() {
        let err = ConnectionParams::default().pg_options().unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn bad_port_is_a_config_error() {
        let params: ConnectionParams = [
            ("host", "localhost"),
            ("port", "not-a-port"),
            ("user", "u"),
            ("password", "p"),
        ]
        .into_iter()
        .collect();
        assert!(matches!(params.pg_options(), Err(AppError::Config(_))));
    }

    #[test]
    fn reads_employer_id_list() {
        let file = temp_file("[1, 2, 3, 4, 5]");
        assert_eq!(read_employer_ids(file.path()), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn missing_employer_list_yields_empty() {
        assert!(read_employer_ids(Path::new("non_existent_file.json")).is_empty());
    }

    #[test]
    fn invalid_employer_json_yields_empty() {
        let file = temp_file("invalid json data");
        assert!(read_employer_ids(file.path()).is_empty());
    }

    #[test]
    fn string_employer_ids_yield_empty() {
        let file = temp_file(r#"["1", "2", "3"]"#);
        assert!(read_employer_ids(file.path()).is_empty());
    }

    #[test]
    fn command_line_ids_override_the_list_file() {
        let config = Config::parse_from([
            "vacancydb",
            "--employers",
            "non_existent_file.json",
            "--employer-id",
            "1740",
            "--employer-id",
            "abc",
            "--employer-id",
            "3529",
        ]);

        assert_eq!(config.employer_ids(), vec![1740, 3529]);
        assert_eq!(config.resolved_command(), Command::Run);
    }
}
