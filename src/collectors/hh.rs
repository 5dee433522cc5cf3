use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{Instrument, Span};

use crate::collectors::{BatchSummary, EmployerFetch, FetchStatus};
use crate::error::AppError;

/// Vacancies per page; the largest page the API serves.
const PAGE_SIZE: u32 = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Query string of a single vacancy page request.
#[derive(Debug, Clone, Copy, Serialize)]
struct VacancyQuery {
    employer_id: i64,
    per_page: u32,
    page: u32,
}

impl VacancyQuery {
    fn new(employer_id: i64, page: u32) -> Self {
        Self {
            employer_id,
            per_page: PAGE_SIZE,
            page,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VacancyPage {
    #[serde(default)]
    items: Vec<Value>,
    /// Total page count; may change between requests.
    pages: Option<u32>,
}

/// Accept only positive employer IDs.
pub fn validate_employer_id(employer_id: i64) -> Result<i64, AppError> {
    if employer_id > 0 {
        Ok(employer_id)
    } else {
        Err(AppError::InvalidArgument(employer_id.to_string()))
    }
}

/// Parse and validate an employer ID given as text.
pub fn parse_employer_id(raw: &str) -> Result<i64, AppError> {
    let employer_id = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| AppError::InvalidArgument(format!("'{raw}'")))?;
    validate_employer_id(employer_id)
}

/// Client for the hh.ru public API that accumulates raw vacancy items.
pub struct HhClient {
    http: reqwest::Client,
    base_url: String,
    records: Vec<Value>,
}

impl HhClient {
    pub fn new(base_url: &str, user_agent: &str) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            records: Vec::new(),
        })
    }

    /// Raw vacancy items fetched so far, in request order.
    pub fn raw_records(&self) -> &[Value] {
        &self.records
    }

    /// Look the employer up. `NotFound` on 404, `Upstream` on anything else
    /// that is not a success.
    pub async fn employer_exists(&self, employer_id: i64) -> Result<bool, AppError> {
        let url = format!("{}/employers/{employer_id}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Employer lookup failed: {e}")))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(employer_id));
        }
        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "Employer lookup returned {status}"
            )));
        }

        Ok(true)
    }

    /// Fetch every page of one employer's open vacancies.
    ///
    /// Validation and existence failures are returned. A failed page request
    /// ends pagination early and the pages fetched before it are kept.
    pub async fn fetch_for_employer(&mut self, employer_id: i64) -> Result<EmployerFetch, AppError> {
        let span = tracing::info_span!("employer", employer_id, stage = tracing::field::Empty);
        self.fetch_employer(employer_id).instrument(span).await
    }

    /// Fetch several employers one after another. Employers that fail
    /// validation or the existence check are logged and skipped.
    pub async fn fetch_for_employers(&mut self, employer_ids: &[i64]) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for &employer_id in employer_ids {
            match self.fetch_for_employer(employer_id).await {
                Ok(fetch) => summary.loaded.push(fetch),
                Err(e) => {
                    tracing::warn!(employer_id, "Skipping employer: {e}");
                    summary.skipped.push(employer_id);
                }
            }
        }

        summary
    }

    async fn fetch_employer(&mut self, employer_id: i64) -> Result<EmployerFetch, AppError> {
        let span = Span::current();

        span.record("stage", "validate");
        let employer_id = validate_employer_id(employer_id)?;

        span.record("stage", "lookup");
        self.employer_exists(employer_id).await?;

        span.record("stage", "paginate");
        let mut items = Vec::new();
        let mut page = 0;
        let status = loop {
            let query = VacancyQuery::new(employer_id, page);
            match self.fetch_page(&query).await {
                Ok(data) => {
                    items.extend(data.items);
                    if page + 1 >= data.pages.unwrap_or(1) {
                        break FetchStatus::Complete;
                    }
                    page += 1;
                }
                Err(e) => {
                    tracing::warn!(page, "Stopping pagination early: {e}");
                    break FetchStatus::Partial;
                }
            }
        };

        let pages = match status {
            FetchStatus::Complete => page + 1,
            FetchStatus::Partial => page,
        };
        let fetch = EmployerFetch {
            employer_id,
            pages,
            vacancies: items.len(),
            status,
        };
        tracing::info!("Fetched {} vacancies over {pages} page(s)", fetch.vacancies);

        self.records.extend(items);
        Ok(fetch)
    }

    async fn fetch_page(&self, query: &VacancyQuery) -> Result<VacancyPage, AppError> {
        let url = format!("{}/vacancies", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Vacancy request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Vacancy request returned {}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse vacancy page: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Mock, ServerGuard};
    use serde_json::json;

    use super::*;

    fn vacancy_item(id: i64, employer_id: i64) -> Value {
        json!({
            "id": id.to_string(),
            "name": "Test Vacancy",
            "area": { "id": "1", "name": "Moscow", "url": "https://api.hh.ru/areas/1" },
            "salary": null,
            "employer": { "id": employer_id.to_string(), "name": "Test Employer" },
            "url": format!("https://api.hh.ru/vacancies/{id}")
        })
    }

    async fn mock_employer(server: &mut ServerGuard, employer_id: i64, status: usize) -> Mock {
        server
            .mock("GET", format!("/employers/{employer_id}").as_str())
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(json!({ "id": employer_id.to_string(), "name": "Test Employer" }).to_string())
            .create_async()
            .await
    }

    async fn mock_page(
        server: &mut ServerGuard,
        employer_id: i64,
        page: u32,
        pages: u32,
        items: Vec<Value>,
    ) -> Mock {
        server
            .mock("GET", "/vacancies")
            .match_query(page_query(employer_id, page))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "items": items, "pages": pages }).to_string())
            .expect(1)
            .create_async()
            .await
    }

    fn page_query(employer_id: i64, page: u32) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("employer_id".into(), employer_id.to_string()),
            Matcher::UrlEncoded("per_page".into(), "100".into()),
            Matcher::UrlEncoded("page".into(), page.to_string()),
        ])
    }

    fn client(server: &ServerGuard) -> HhClient {
        HhClient::new(&server.url(), "vacancydb-tests").unwrap()
    }

    #[test]
    fn positive_ids_are_valid() {
        assert_eq!(validate_employer_id(12345).unwrap(), 12345);
        assert_eq!(validate_employer_id(1).unwrap(), 1);
        assert_eq!(parse_employer_id(" 42 ").unwrap(), 42);
    }

    #[test]
    fn non_positive_and_non_integer_ids_are_invalid() {
        assert!(matches!(validate_employer_id(0), Err(AppError::InvalidArgument(_))));
        assert!(matches!(validate_employer_id(-1), Err(AppError::InvalidArgument(_))));
        assert!(matches!(parse_employer_id("invalid"), Err(AppError::InvalidArgument(_))));
        assert!(matches!(parse_employer_id("12.5"), Err(AppError::InvalidArgument(_))));
        assert!(matches!(parse_employer_id("-7"), Err(AppError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn existing_employer_is_found() {
        let mut server = mockito::Server::new_async().await;
        let _employer = mock_employer(&mut server, 12345, 200).await;

        assert!(client(&server).employer_exists(12345).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_employer_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _employer = mock_employer(&mut server, 99999, 404).await;

        let err = client(&server).employer_exists(99999).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(99999)));
    }

    #[tokio::test]
    async fn other_status_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let _employer = mock_employer(&mut server, 12345, 503).await;

        let err = client(&server).employer_exists(12345).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }

    #[tokio::test]
    async fn unreachable_api_is_upstream_error() {
        let client = HhClient::new("http://127.0.0.1:1", "vacancydb-tests").unwrap();

        let err = client.employer_exists(12345).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }

    #[tokio::test]
    async fn single_page_means_single_request() {
        let mut server = mockito::Server::new_async().await;
        let _employer = mock_employer(&mut server, 12345, 200).await;
        let page = mock_page(&mut server, 12345, 0, 1, vec![vacancy_item(1, 12345)]).await;

        let mut client = client(&server);
        let fetch = client.fetch_for_employer(12345).await.unwrap();

        page.assert_async().await;
        assert_eq!(fetch.pages, 1);
        assert_eq!(fetch.status, FetchStatus::Complete);
        assert_eq!(client.raw_records().len(), 1);
        assert_eq!(client.raw_records()[0]["name"], "Test Vacancy");
    }

    #[tokio::test]
    async fn follows_pages_until_the_last_one() {
        let mut server = mockito::Server::new_async().await;
        let _employer = mock_employer(&mut server, 12345, 200).await;
        let first = mock_page(&mut server, 12345, 0, 2, vec![vacancy_item(1, 12345)]).await;
        let second = mock_page(&mut server, 12345, 1, 2, vec![vacancy_item(2, 12345)]).await;

        let mut client = client(&server);
        let fetch = client.fetch_for_employer(12345).await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(fetch.pages, 2);
        assert_eq!(fetch.vacancies, 2);
        assert_eq!(client.raw_records()[1]["id"], "2");
    }

    #[tokio::test]
    async fn failed_page_keeps_earlier_pages() {
        let mut server = mockito::Server::new_async().await;
        let _employer = mock_employer(&mut server, 12345, 200).await;
        let _first = mock_page(&mut server, 12345, 0, 3, vec![vacancy_item(1, 12345)]).await;
        let _second = server
            .mock("GET", "/vacancies")
            .match_query(page_query(12345, 1))
            .with_status(500)
            .create_async()
            .await;
        let third = server
            .mock("GET", "/vacancies")
            .match_query(page_query(12345, 2))
            .expect(0)
            .create_async()
            .await;

        let mut client = client(&server);
        let fetch = client.fetch_for_employer(12345).await.unwrap();

        third.assert_async().await;
        assert_eq!(fetch.status, FetchStatus::Partial);
        assert_eq!(fetch.pages, 1);
        assert_eq!(client.raw_records().len(), 1);
    }

    #[tokio::test]
    async fn invalid_id_is_rejected_before_any_request() {
        let server = mockito::Server::new_async().await;

        let err = client(&server).fetch_for_employer(-1).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn unknown_employer_fails_its_fetch() {
        let mut server = mockito::Server::new_async().await;
        let _employer = mock_employer(&mut server, 99999, 404).await;

        let mut client = client(&server);
        let err = client.fetch_for_employer(99999).await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(99999)));
        assert!(client.raw_records().is_empty());
    }

    #[tokio::test]
    async fn batch_accumulates_in_request_order() {
        let mut server = mockito::Server::new_async().await;
        let _first = mock_employer(&mut server, 12345, 200).await;
        let _second = mock_employer(&mut server, 67890, 200).await;
        let _p1 = mock_page(&mut server, 12345, 0, 1, vec![vacancy_item(1, 12345)]).await;
        let _p2 = mock_page(&mut server, 67890, 0, 1, vec![vacancy_item(2, 67890)]).await;

        let mut client = client(&server);
        let summary = client.fetch_for_employers(&[12345, 67890]).await;

        assert_eq!(summary.vacancies(), 2);
        assert!(summary.skipped.is_empty());
        let records = client.raw_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["employer"]["id"], "12345");
        assert_eq!(records[1]["employer"]["id"], "67890");
    }

    #[tokio::test]
    async fn batch_continues_past_unknown_and_invalid_employers() {
        let mut server = mockito::Server::new_async().await;
        let _known = mock_employer(&mut server, 12345, 200).await;
        let _unknown = mock_employer(&mut server, 99999, 404).await;
        let _page = mock_page(&mut server, 12345, 0, 1, vec![vacancy_item(1, 12345)]).await;

        let mut client = client(&server);
        let summary = client.fetch_for_employers(&[99999, 0, 12345]).await;

        assert_eq!(summary.skipped, vec![99999, 0]);
        assert_eq!(summary.loaded.len(), 1);
        assert_eq!(client.raw_records().len(), 1);
    }
}
