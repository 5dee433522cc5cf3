#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Vacancy {
    pub vacancy_id: i64,
    #[sqlx(rename = "vacancy_name")]
    pub name: Option<String>,
    #[sqlx(rename = "vacancy_area")]
    pub area_id: Option<i64>,
    /// Lower bound of the advertised salary.
    pub salary: Option<i64>,
    pub employer_id: Option<i64>,
    #[sqlx(rename = "vacancy_url")]
    pub url: Option<String>,
}
