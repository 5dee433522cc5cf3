use crate::collectors::BatchSummary;
use crate::collectors::hh::HhClient;
use crate::db::{LoadSummary, VacancyStore};
use crate::error::AppError;
use crate::normalize::NormalizedBatch;

/// What one ingestion run fetched and stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub fetched: BatchSummary,
    pub stored: LoadSummary,
}

/// Recreate the schema, fetch every employer's vacancies and load them.
///
/// Employers that cannot be fetched are skipped; storage failures end the run.
pub async fn ingest(
    client: &mut HhClient,
    store: &dyn VacancyStore,
    employer_ids: &[i64],
) -> Result<IngestReport, AppError> {
    tracing::info!("Creating tables...");
    store.create_schema().await?;

    tracing::info!("Loading vacancies for {} employer(s)", employer_ids.len());
    let fetched = client.fetch_for_employers(employer_ids).await;
    tracing::info!(
        "Fetched {} vacancies from {} employer(s)",
        fetched.vacancies(),
        fetched.loaded.len()
    );
    for fetch in fetched.partial() {
        tracing::warn!(
            employer_id = fetch.employer_id,
            "Incomplete load: only {} page(s) fetched",
            fetch.pages
        );
    }

    let batch = NormalizedBatch::from_records(client.raw_records());
    if batch.is_empty() {
        tracing::warn!("No vacancies fetched, the tables stay empty");
    }
    tracing::info!(
        "Normalized {} areas, {} employers, {} vacancies",
        batch.areas.len(),
        batch.employers.len(),
        batch.vacancies.len()
    );

    tracing::info!("Inserting data into the database...");
    let stored = store.save(&batch).await?;
    tracing::info!(
        "Load completed: {} areas, {} employers, {} vacancies stored; {} employer(s) skipped",
        stored.areas,
        stored.employers,
        stored.vacancies,
        fetched.skipped.len()
    );

    Ok(IngestReport { fetched, stored })
}
