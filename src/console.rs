use std::io;
use std::str::FromStr;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::db::VacancyStore;
use crate::error::AppError;
use crate::models::{EmployerVacancyCount, VacancyListing};

const MENU: &str = "\
Enter one of the following commands:
    EXT      exit the program
    CVCOUNT  companies and the number of vacancies each has
    GETALL   all vacancies with company, title, salary, area and link
    AVGSAL   average salary over all vacancies
    HIAVG    vacancies paying at least the average salary
    KEYW     vacancies whose title contains a keyword, for example python
";

const NOT_RECOGNIZED: &str = "Your request is not recognized, please enter another request\n";

/// Shown in place of NULL columns.
const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuCommand {
    Exit,
    CompaniesCount,
    AllVacancies,
    AverageSalary,
    HigherThanAverage,
    Keyword,
}

impl FromStr for MenuCommand {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ext" => Ok(Self::Exit),
            "cvcount" => Ok(Self::CompaniesCount),
            "getall" => Ok(Self::AllVacancies),
            "avgsal" => Ok(Self::AverageSalary),
            "hiavg" => Ok(Self::HigherThanAverage),
            "keyw" => Ok(Self::Keyword),
            _ => Err(()),
        }
    }
}

/// Interactive report menu over a [`VacancyStore`].
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Show the menu and answer commands until EXT or end of input.
    /// A failing report is shown to the user and the session goes on.
    pub async fn run(&mut self, store: &dyn VacancyStore) -> io::Result<()> {
        loop {
            self.write(MENU).await?;
            let Some(line) = self.read_line().await? else {
                return Ok(());
            };

            let Ok(command) = line.parse::<MenuCommand>() else {
                self.write(NOT_RECOGNIZED).await?;
                continue;
            };

            if command == MenuCommand::Exit {
                tracing::info!("Terminating the program");
                return Ok(());
            }

            let report = match self.report(command, store).await? {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(?command, "Report failed: {e}");
                    format!("Request failed: {e}\n")
                }
            };
            self.write(&report).await?;
        }
    }

    async fn report(
        &mut self,
        command: MenuCommand,
        store: &dyn VacancyStore,
    ) -> io::Result<Result<String, AppError>> {
        let report = match command {
            MenuCommand::Exit => Ok(String::new()),
            MenuCommand::CompaniesCount => store
                .companies_and_vacancies_count()
                .await
                .map(|rows| format_counts(&rows)),
            MenuCommand::AllVacancies => store
                .all_vacancies()
                .await
                .map(|rows| format_listings(&rows)),
            MenuCommand::AverageSalary => store.avg_salary().await.map(|avg| {
                let avg = avg.map_or_else(|| UNKNOWN.to_string(), |v| format!("{v:.0}"));
                format!("Average salary: {avg}\n")
            }),
            MenuCommand::HigherThanAverage => store
                .vacancies_with_higher_salary()
                .await
                .map(|rows| format_listings(&rows)),
            MenuCommand::Keyword => {
                self.write("Enter a keyword:\n").await?;
                let keyword = self.read_line().await?.unwrap_or_default();
                if keyword.is_empty() {
                    Ok(NOT_RECOGNIZED.to_string())
                } else {
                    store
                        .vacancies_with_keyword(&keyword)
                        .await
                        .map(|rows| format_listings(&rows))
                }
            }
        };
        Ok(report)
    }

    async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    async fn write(&mut self, text: &str) -> io::Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await
    }
}

fn format_counts(rows: &[EmployerVacancyCount]) -> String {
    if rows.is_empty() {
        return "No companies found\n".to_string();
    }
    rows.iter()
        .map(|row| format!("{}: {}\n", row.employer_name, row.vacancy_count))
        .collect()
}

fn format_listings(rows: &[VacancyListing]) -> String {
    if rows.is_empty() {
        return "No vacancies found\n".to_string();
    }
    rows.iter()
        .map(|row| {
            format!(
                "{} | {} | {} | {} | {}\n",
                row.employer_name.as_deref().unwrap_or(UNKNOWN),
                row.vacancy_name.as_deref().unwrap_or(UNKNOWN),
                row.salary
                    .map_or_else(|| UNKNOWN.to_string(), |s| s.to_string()),
                row.area_name.as_deref().unwrap_or(UNKNOWN),
                row.vacancy_url.as_deref().unwrap_or(UNKNOWN),
            )
        })
        .collect()
}
