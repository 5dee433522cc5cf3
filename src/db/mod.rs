pub mod postgres;
pub mod sqlite;

use async_trait::async_trait;

use crate::config::{Config, read_db_config};
use crate::error::AppError;
use crate::models::{EmployerVacancyCount, VacancyListing};
use crate::normalize::NormalizedBatch;

pub use postgres::PgStore;
pub use sqlite::SqliteStore;

/// Rows written by one bulk load.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub areas: u64,
    pub employers: u64,
    pub vacancies: u64,
}

/// A relational backend holding areas, employers and vacancies.
#[async_trait]
pub trait VacancyStore: Send + Sync {
    /// Drop and recreate the three tables. Destroys previously loaded data.
    async fn create_schema(&self) -> Result<(), AppError>;

    /// Insert areas, employers and vacancies in that order, then recount
    /// each employer's open vacancies. Runs in one transaction.
    async fn save(&self, batch: &NormalizedBatch) -> Result<LoadSummary, AppError>;

    /// Employers with their number of vacancies, most vacancies first.
    async fn companies_and_vacancies_count(&self)
    -> Result<Vec<EmployerVacancyCount>, AppError>;

    /// All vacancies with employer and area names, highest salary first.
    async fn all_vacancies(&self) -> Result<Vec<VacancyListing>, AppError>;

    /// Average salary over vacancies that advertise one.
    async fn avg_salary(&self) -> Result<Option<f64>, AppError>;

    /// Vacancies paying at least the average salary.
    async fn vacancies_with_higher_salary(&self) -> Result<Vec<VacancyListing>, AppError>;

    /// Vacancies whose title contains `keyword`, ignoring case.
    async fn vacancies_with_keyword(&self, keyword: &str)
    -> Result<Vec<VacancyListing>, AppError>;
}

/// Open the store selected by the configuration.
///
/// A `--database-url` is used as is. Otherwise the connection parameter file
/// is read and, when `recreate` is set, the target Postgres database is
/// dropped and created again before connecting.
pub async fn connect(config: &Config, recreate: bool) -> Result<Box<dyn VacancyStore>, AppError> {
    if let Some(url) = &config.database_url {
        if url.starts_with("sqlite:") {
            tracing::info!("Opening SQLite database {url}");
            return Ok(Box::new(SqliteStore::connect(url).await?));
        }
        tracing::info!("Connecting to database...");
        return Ok(Box::new(PgStore::connect(url).await?));
    }

    let params = read_db_config(&config.config);
    let server = params.pg_options()?;

    if recreate {
        postgres::recreate_database(&server, &config.database).await?;
    }

    tracing::info!("Connecting to database '{}'...", config.database);
    let store = PgStore::connect_with(server.database(&config.database)).await?;
    Ok(Box::new(store))
}
