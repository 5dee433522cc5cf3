pub mod area;
pub mod employer;
pub mod report;
pub mod vacancy;

pub use area::Area;
pub use employer::Employer;
pub use report::{EmployerVacancyCount, VacancyListing};
pub use vacancy::Vacancy;
