/// Core functionality modules
///
/// Contains the repository-side business logic: locating repositories,
/// detecting their technologies, explaining the ones we can't identify,
/// scanning them into the catalog and reporting on stored entries.

pub mod explainer;
pub mod scanner;
pub mod technology;
pub mod url;
pub mod validator;

pub use scanner::{read_url_list, BatchSummary, Scanner};
pub use technology::{RepositoryListing, TechnologyTable};
pub use url::{parse_repo_url, RepoLocation, UrlParser};
pub use validator::{
    summarize_repository, validate_completeness, CompletenessReport, RepositorySummary,
};
