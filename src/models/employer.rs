#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Employer {
    pub employer_id: i64,
    #[sqlx(rename = "employer_name")]
    pub name: String,
    #[sqlx(rename = "employer_area")]
    pub area_id: Option<i64>,
    pub url: Option<String>,
    /// Zero until the store recounts it from the loaded vacancies.
    pub open_vacancies: i64,
}
