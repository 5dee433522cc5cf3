use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, Connection, Executor, PgPool};

use crate::db::{LoadSummary, VacancyStore};
use crate::error::AppError;
use crate::models::{EmployerVacancyCount, VacancyListing};
use crate::normalize::NormalizedBatch;

const SCHEMA: [&str; 4] = [
    "DROP TABLE IF EXISTS vacancies, employers, areas CASCADE",
    "CREATE TABLE areas (
        area_id BIGINT PRIMARY KEY,
        name TEXT NOT NULL,
        url TEXT
    )",
    "CREATE TABLE employers (
        employer_id BIGINT PRIMARY KEY,
        employer_name TEXT NOT NULL,
        employer_area BIGINT REFERENCES areas(area_id),
        url TEXT,
        open_vacancies BIGINT NOT NULL DEFAULT 0
    )",
    "CREATE TABLE vacancies (
        vacancy_id BIGINT PRIMARY KEY,
        vacancy_name TEXT,
        vacancy_area BIGINT REFERENCES areas(area_id),
        salary BIGINT,
        employer_id BIGINT REFERENCES employers(employer_id),
        vacancy_url TEXT
    )",
];

/// Drop and create the database `name` through the `postgres` maintenance database.
pub async fn recreate_database(server: &PgConnectOptions, name: &str) -> Result<(), AppError> {
    let mut conn = server.clone().database("postgres").connect().await?;
    let quoted = quote_identifier(name);

    tracing::info!("Dropping database '{name}' if it exists");
    conn.execute(format!("DROP DATABASE IF EXISTS {quoted}").as_str())
        .await?;

    tracing::info!("Creating database '{name}'");
    conn.execute(format!("CREATE DATABASE {quoted}").as_str())
        .await?;

    conn.close().await?;
    Ok(())
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Turn a keyword into an ILIKE pattern matching it anywhere, with `%`, `_`
/// and `\` in the keyword taken literally.
fn contains_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn connect_with(options: PgConnectOptions) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl VacancyStore for PgStore {
    async fn create_schema(&self) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        tracing::info!("Tables areas, employers and vacancies created");
        Ok(())
    }

    async fn save(&self, batch: &NormalizedBatch) -> Result<LoadSummary, AppError> {
        let mut summary = LoadSummary::default();
        let mut tx = self.pool.begin().await?;

        for area in batch.areas.values() {
            let result = sqlx::query("INSERT INTO areas (area_id, name, url) VALUES ($1, $2, $3)")
                .bind(area.area_id)
                .bind(&area.name)
                .bind(&area.url)
                .execute(&mut *tx)
                .await?;
            summary.areas += result.rows_affected();
        }

        for employer in batch.employers.values() {
            summary.employers += sqlx::query(
                "INSERT INTO employers (employer_id, employer_name, employer_area, url, open_vacancies) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(employer.employer_id)
            .bind(&employer.name)
            .bind(employer.area_id)
            .bind(&employer.url)
            .bind(employer.open_vacancies)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        for vacancy in &batch.vacancies {
            summary.vacancies += sqlx::query(
                "INSERT INTO vacancies (vacancy_id, vacancy_name, vacancy_area, salary, employer_id, vacancy_url) VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (vacancy_id) DO NOTHING",
            )
            .bind(vacancy.vacancy_id)
            .bind(&vacancy.name)
            .bind(vacancy.area_id)
            .bind(vacancy.salary)
            .bind(vacancy.employer_id)
            .bind(&vacancy.url)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        sqlx::query(
            "UPDATE employers SET open_vacancies = (SELECT COUNT(*) FROM vacancies v WHERE v.employer_id = employers.employer_id)",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(summary)
    }

    async fn companies_and_vacancies_count(
        &self,
    ) -> Result<Vec<EmployerVacancyCount>, AppError> {
        let rows = sqlx::query_as::<_, EmployerVacancyCount>(
            "SELECT e.employer_name, COUNT(v.vacancy_id) AS vacancy_count
             FROM employers e
             INNER JOIN vacancies v ON v.employer_id = e.employer_id
             GROUP BY e.employer_id, e.employer_name
             ORDER BY vacancy_count DESC, e.employer_name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn all_vacancies(&self) -> Result<Vec<VacancyListing>, AppError> {
        let rows = sqlx::query_as::<_, VacancyListing>(
            "SELECT e.employer_name, v.vacancy_name, v.salary, a.name AS area_name, v.vacancy_url
             FROM vacancies v
             LEFT JOIN employers e ON e.employer_id = v.employer_id
             LEFT JOIN areas a ON a.area_id = v.vacancy_area
             ORDER BY v.salary DESC NULLS LAST, v.vacancy_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn avg_salary(&self) -> Result<Option<f64>, AppError> {
        let row: (Option<f64>,) = sqlx::query_as("SELECT AVG(salary)::float8 FROM vacancies")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    async fn vacancies_with_higher_salary(&self) -> Result<Vec<VacancyListing>, AppError> {
        let rows = sqlx::query_as::<_, VacancyListing>(
            "SELECT e.employer_name, v.vacancy_name, v.salary, a.name AS area_name, v.vacancy_url
             FROM vacancies v
             LEFT JOIN employers e ON e.employer_id = v.employer_id
             LEFT JOIN areas a ON a.area_id = v.vacancy_area
             WHERE v.salary >= (SELECT AVG(salary) FROM vacancies)
             ORDER BY v.salary DESC, v.vacancy_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn vacancies_with_keyword(
        &self,
        keyword: &str,
    ) -> Result<Vec<VacancyListing>, AppError> {
        let rows = sqlx::query_as::<_, VacancyListing>(
            "SELECT e.employer_name, v.vacancy_name, v.salary, a.name AS area_name, v.vacancy_url
             FROM vacancies v
             LEFT JOIN employers e ON e.employer_id = v.employer_id
             LEFT JOIN areas a ON a.area_id = v.vacancy_area
             WHERE v.vacancy_name ILIKE $1
             ORDER BY v.salary DESC NULLS LAST, v.vacancy_id",
        )
        .bind(contains_pattern(keyword))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
