//! Row shapes returned by the report queries.

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct EmployerVacancyCount {
    pub employer_name: String,
    pub vacancy_count: i64,
}

/// A vacancy joined with its employer and area names.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct VacancyListing {
    pub employer_name: Option<String>,
    pub vacancy_name: Option<String>,
    pub salary: Option<i64>,
    pub area_name: Option<String>,
    pub vacancy_url: Option<String>,
}
