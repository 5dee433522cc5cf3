//! Flattening of raw vacancy items into the three stored tables.
//!
//! Everything here is pure: the raw items come from the collector, the output
//! goes straight to a [`VacancyStore`](crate::db::VacancyStore).

use std::collections::BTreeMap;

use serde_json::Value;

use crate::models::{Area, Employer, Vacancy};

/// The three collections produced from one fetch, ready for a bulk load.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NormalizedBatch {
    pub areas: BTreeMap<i64, Area>,
    pub employers: BTreeMap<i64, Employer>,
    pub vacancies: Vec<Vacancy>,
}

impl NormalizedBatch {
    /// Normalize raw items and null out references to areas or employers
    /// that did not make it into the batch, so every foreign key resolves.
    pub fn from_records(records: &[Value]) -> Self {
        let areas = extract_areas(records);
        let mut employers = extract_employers(records);
        let mut vacancies = extract_vacancies(records);

        for employer in employers.values_mut() {
            if employer.area_id.is_some_and(|id| !areas.contains_key(&id)) {
                employer.area_id = None;
            }
        }

        for vacancy in &mut vacancies {
            if vacancy.area_id.is_some_and(|id| !areas.contains_key(&id)) {
                vacancy.area_id = None;
            }
            if vacancy
                .employer_id
                .is_some_and(|id| !employers.contains_key(&id))
            {
                vacancy.employer_id = None;
            }
        }

        Self {
            areas,
            employers,
            vacancies,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty() && self.employers.is_empty() && self.vacancies.is_empty()
    }
}

/// Areas keyed by id; the first record mentioning an area wins.
pub fn extract_areas(records: &[Value]) -> BTreeMap<i64, Area> {
    let mut areas = BTreeMap::new();

    for record in records {
        let Some(area) = record.get("area") else {
            continue;
        };
        let (Some(area_id), Some(name)) = (id_of(area.get("id")), text_of(area.get("name")))
        else {
            continue;
        };

        areas.entry(area_id).or_insert_with(|| Area {
            area_id,
            name,
            url: text_of(area.get("url")),
        });
    }

    areas
}

/// Employers keyed by id; the first record mentioning an employer wins.
/// `open_vacancies` is left at zero for the store to recount.
pub fn extract_employers(records: &[Value]) -> BTreeMap<i64, Employer> {
    let mut employers = BTreeMap::new();

    for record in records {
        let Some(employer) = record.get("employer") else {
            continue;
        };
        let (Some(employer_id), Some(name)) =
            (id_of(employer.get("id")), text_of(employer.get("name")))
        else {
            continue;
        };

        employers.entry(employer_id).or_insert_with(|| Employer {
            employer_id,
            name,
            area_id: id_of(employer.pointer("/area/id"))
                .or_else(|| id_of(record.pointer("/area/id"))),
            url: text_of(employer.get("url")),
            open_vacancies: 0,
        });
    }

    employers
}

/// One vacancy per raw item. Items without a usable id cannot be keyed and
/// are skipped; any other missing field becomes `None`.
pub fn extract_vacancies(records: &[Value]) -> Vec<Vacancy> {
    records
        .iter()
        .filter_map(|record| {
            Some(Vacancy {
                vacancy_id: id_of(record.get("id"))?,
                name: text_of(record.get("name")),
                area_id: id_of(record.pointer("/area/id")),
                salary: salary_from(record),
                employer_id: id_of(record.pointer("/employer/id")),
                url: text_of(record.get("url")),
            })
        })
        .collect()
}

/// The API sends ids as strings ("1740"), older payloads and fixtures as numbers.
fn id_of(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text_of(value: Option<&Value>) -> Option<String> {
    value.and_then(|v| v.as_str()).map(String::from)
}

fn salary_from(record: &Value) -> Option<i64> {
    record
        .pointer("/salary/from")
        .and_then(|v| v.as_f64())
        .map(|v| v as i64)
}
