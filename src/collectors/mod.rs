// Collectors fetch raw vacancy items from the remote API and hand them to
// the normalizer; the runner drives a whole load into a store.

pub mod hh;
pub mod runner;

/// How far pagination got for one employer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// Every page up to the server-reported last one was fetched.
    Complete,
    /// A request failed mid-pagination; earlier pages were kept.
    Partial,
}

/// Outcome of fetching one employer's vacancies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployerFetch {
    pub employer_id: i64,
    pub pages: u32,
    pub vacancies: usize,
    pub status: FetchStatus,
}

/// Outcome of a batch over several employers.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub loaded: Vec<EmployerFetch>,
    /// Employers rejected by validation or the existence check.
    pub skipped: Vec<i64>,
}

impl BatchSummary {
    pub fn vacancies(&self) -> usize {
        self.loaded.iter().map(|f| f.vacancies).sum()
    }

    pub fn partial(&self) -> impl Iterator<Item = &EmployerFetch> {
        self.loaded
            .iter()
            .filter(|f| f.status == FetchStatus::Partial)
    }
}
