// Renders search criteria into GitHub's repository-search query string
use crate::models::SearchCriteria;

pub const SEARCH_PATH: &str = "/search/repositories";

/// GitHub never returns more than this many items per page
pub const MAX_PER_PAGE: u32 = 100;

/// Fields the keywords are matched against
const SEARCH_SCOPE: &str = "in:name,description,readme,topics";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Pure string building - no I/O, no failure modes
pub struct QueryBuilder;

impl QueryBuilder {
    /// The unencoded `q` value
    ///
    /// Dates are day granular; whatever sub-day part the criteria carry is
    /// dropped because GitHub's `created:` qualifier can't express it.
    pub fn search_terms(criteria: &SearchCriteria) -> String {
        let mut parts = vec![
            criteria.keywords().to_string(),
            SEARCH_SCOPE.to_string(),
            "archived:false".to_string(),
            "is:public".to_string(),
            format!(
                "created:{}..{}",
                criteria.created_from().format(DATE_FORMAT),
                criteria.created_to().format(DATE_FORMAT)
            ),
        ];

        if criteria.min_stars() > 0 {
            parts.push(format!("stars:>={}", criteria.min_stars()));
        }

        if !criteria.include_forks() {
            parts.push("fork:false".to_string());
        }

        if let Some(lang) = criteria.language() {
            parts.push(format!("language:{}", qualifier_value(lang)));
        }

        parts.join(" ")
    }

    /// Full path and query for one search call, relative to the API root
    pub fn render(criteria: &SearchCriteria, page: u32, per_page: u32) -> String {
        let per_page = per_page.clamp(1, MAX_PER_PAGE);
        let page = page.max(1);

        format!(
            "{}?q={}&sort=stars&order=desc&per_page={}&page={}",
            SEARCH_PATH,
            urlencoding::encode(&Self::search_terms(criteria)),
            per_page,
            page
        )
    }

    /// Cheapest possible call that still reports `total_count`
    pub fn count_probe(criteria: &SearchCriteria) -> String {
        Self::render(criteria, 1, 1)
    }
}

/// Multi-word values ("Jupyter Notebook") must be quoted or GitHub reads
/// everything after the first word as extra keywords
fn qualifier_value(value: &str) -> String {
    if value.chars().any(char::is_whitespace) {
        format!("\"{}\"", value.replace('"', ""))
    } else {
        value.to_string()
    }
}
