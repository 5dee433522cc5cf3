/// A geographic region tag used by the API for employers and vacancies.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Area {
    pub area_id: i64,
    pub name: String,
    pub url: Option<String>,
}
