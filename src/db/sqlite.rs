use std::str::FromStr;

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::db::{LoadSummary, VacancyStore};
use crate::error::AppError;
use crate::models::{EmployerVacancyCount, VacancyListing};
use crate::normalize::NormalizedBatch;

const SCHEMA: [&str; 6] = [
    "DROP TABLE IF EXISTS vacancies",
    "DROP TABLE IF EXISTS employers",
    "DROP TABLE IF EXISTS areas",
    "CREATE TABLE areas (
        area_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        url TEXT
    )",
    "CREATE TABLE employers (
        employer_id INTEGER PRIMARY KEY,
        employer_name TEXT NOT NULL,
        employer_area INTEGER REFERENCES areas(area_id),
        url TEXT,
        open_vacancies INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE vacancies (
        vacancy_id INTEGER PRIMARY KEY,
        vacancy_name TEXT,
        vacancy_area INTEGER REFERENCES areas(area_id),
        salary INTEGER,
        employer_id INTEGER REFERENCES employers(employer_id),
        vacancy_url TEXT
    )",
];

const LISTING_BY_SALARY: &str =
    "SELECT e.employer_name, v.vacancy_name, v.salary, a.name AS area_name, v.vacancy_url
     FROM vacancies v
     LEFT JOIN employers e ON e.employer_id = v.employer_id
     LEFT JOIN areas a ON a.area_id = v.vacancy_area
     ORDER BY v.salary DESC NULLS LAST, v.vacancy_id";

/// SQLite backend, for local files (`sqlite:vacancies.db`) and tests
/// (`sqlite::memory:`).
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        // An in-memory database lives and dies with its single connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl VacancyStore for SqliteStore {
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
            let result = sqlx::query("INSERT INTO areas (area_id, name, url) VALUES (?, ?, ?)")
                .bind(area.area_id)
                .bind(&area.name)
                .bind(&area.url)
                .execute(&mut *tx)
                .await?;
            summary.areas += result.rows_affected();
        }

        for employer in batch.employers.values() {
            let result = sqlx::query(
                "INSERT INTO employers (employer_id, employer_name, employer_area, url, open_vacancies) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(employer.employer_id)
            .bind(&employer.name)
            .bind(employer.area_id)
            .bind(&employer.url)
            .bind(employer.open_vacancies)
            .execute(&mut *tx)
            .await?;
            summary.employers += result.rows_affected();
        }

        for vacancy in &batch.vacancies {
            let result = sqlx::query(
                "INSERT INTO vacancies (vacancy_id, vacancy_name, vacancy_area, salary, employer_id, vacancy_url) VALUES (?, ?, ?, ?, ?, ?) ON CONFLICT (vacancy_id) DO NOTHING",
            )
            .bind(vacancy.vacancy_id)
            .bind(&vacancy.name)
            .bind(vacancy.area_id)
            .bind(vacancy.salary)
            .bind(vacancy.employer_id)
            .bind(&vacancy.url)
            .execute(&mut *tx)
            .await?;
            summary.vacancies += result.rows_affected();
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
        let rows = sqlx::query_as::<_, VacancyListing>(LISTING_BY_SALARY)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn avg_salary(&self) -> Result<Option<f64>, AppError> {
        let row: (Option<f64>,) = sqlx::query_as("SELECT AVG(salary) FROM vacancies")
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

    // SQLite's LOWER() only folds ASCII and hh.ru titles are mostly Cyrillic,
    // so the match is done here.
    async fn vacancies_with_keyword(
        &self,
        keyword: &str,
    ) -> Result<Vec<VacancyListing>, AppError> {
        let needle = keyword.to_lowercase();
        let rows = self
            .all_vacancies()
            .await?
            .into_iter()
            .filter(|v| {
                v.vacancy_name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(&needle))
            })
            .collect();
        Ok(rows)
    }
}
