use serde::Deserialize;

/// Main configuration structure for Catalog-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub portal: PortalConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Where the portal lives and how a session reaches the catalog
#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    /// Scheme and host of the portal; relative links resolve against it
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path of the page that opens a session
    #[serde(rename = "entry-path", default = "default_entry_path")]
    pub entry_path: String,

    /// Query parameter carrying the hidden session token, if the portal uses one
    #[serde(rename = "token-param", default)]
    pub token_param: Option<String>,

    /// Text the portal shows instead of content once a session has expired
    #[serde(
        rename = "session-expired-marker",
        default = "default_session_expired_marker"
    )]
    pub session_expired_marker: String,

    /// A session unused for longer than this is considered expired (seconds)
    #[serde(
        rename = "max-session-idle-secs",
        default = "default_max_session_idle_secs"
    )]
    pub max_session_idle_secs: u64,

    /// How often one run may re-acquire its session
    #[serde(
        rename = "max-session-renewals",
        default = "default_max_session_renewals"
    )]
    pub max_session_renewals: u32,

    /// Links followed from the entry page to the semester's catalog root
    #[serde(default = "default_navigation")]
    pub navigation: Vec<NavigationStep>,
}

/// One link-following step of the session handshake
#[derive(Debug, Clone, Deserialize)]
pub struct NavigationStep {
    /// CSS selector of candidate links
    #[serde(default = "default_step_selector")]
    pub selector: String,

    /// Only links whose text contains this substring qualify
    #[serde(rename = "link-text", default)]
    pub link_text: Option<String>,

    /// Pick the link whose text names the requested semester
    #[serde(default)]
    pub semester: bool,

    /// Skip this step when no link qualifies
    #[serde(default)]
    pub optional: bool,
}

/// Page fetcher behavior
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Retries after the first attempt for transient failures
    #[serde(rename = "retry-count", default = "default_retry_count")]
    pub retry_count: u32,

    /// Delay before the first retry, doubled for every further retry (milliseconds)
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Course-detail pages fetched concurrently per batch
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            backoff_base_ms: default_backoff_base_ms(),
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
        }
    }
}

/// Structural anchors of the catalog markup
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    /// Links into deeper catalog levels (faculties, subjects)
    #[serde(rename = "directory-link", default = "default_directory_link")]
    pub directory_link: String,

    /// Links to course-detail pages
    #[serde(rename = "course-link", default = "default_course_link")]
    pub course_link: String,

    /// Pagination link to the next page of a course list
    #[serde(rename = "next-page", default = "default_next_page")]
    pub next_page: String,

    /// Element whose text names the semester a page belongs to
    #[serde(
        rename = "semester-indicator",
        default = "default_semester_indicator"
    )]
    pub semester_indicator: String,

    /// Text every course-detail page contains
    #[serde(rename = "detail-marker", default = "default_detail_marker")]
    pub detail_marker: String,

    /// Links whose title contains one of these are not followed
    #[serde(
        rename = "exclude-link-titles",
        default = "default_exclude_link_titles"
    )]
    pub exclude_link_titles: Vec<String>,

    /// Links whose href contains one of these are not followed
    #[serde(
        rename = "exclude-href-fragments",
        default = "default_exclude_href_fragments"
    )]
    pub exclude_href_fragments: Vec<String>,

    /// Query parameter of a detail link holding the site-assigned course id
    #[serde(rename = "course-id-param", default = "default_course_id_param")]
    pub course_id_param: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            directory_link: default_directory_link(),
            course_link: default_course_link(),
            next_page: default_next_page(),
            semester_indicator: default_semester_indicator(),
            detail_marker: default_detail_marker(),
            exclude_link_titles: default_exclude_link_titles(),
            exclude_href_fragments: default_exclude_href_fragments(),
            course_id_param: default_course_id_param(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory receiving per-lecturer documents
    #[serde(rename = "export-dir")]
    pub export_dir: String,
}

fn default_entry_path() -> String {
    "/qisserver/rds?state=user&type=0".to_string()
}

fn default_session_expired_marker() -> String {
    "Sitzung abgelaufen".to_string()
}

fn default_max_session_idle_secs() -> u64 {
    900
}

fn default_max_session_renewals() -> u32 {
    3
}

fn default_step_selector() -> String {
    "a".to_string()
}

pub(crate) fn default_navigation() -> Vec<NavigationStep> {
    vec![
        NavigationStep {
            selector: "a#choosesemester".to_string(),
            link_text: None,
            semester: false,
            optional: false,
        },
        NavigationStep {
            selector: "a.regular".to_string(),
            link_text: None,
            semester: true,
            optional: false,
        },
        NavigationStep {
            selector: "a".to_string(),
            link_text: Some("Veranstaltungen".to_string()),
            semester: false,
            optional: true,
        },
        NavigationStep {
            selector: "a".to_string(),
            link_text: Some("Vorlesungsverzeichnis".to_string()),
            semester: false,
            optional: true,
        },
    ]
}

fn default_retry_count() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_concurrency() -> u32 {
    1
}

fn default_directory_link() -> String {
    "a.ueb".to_string()
}

fn default_course_link() -> String {
    "a.regular".to_string()
}

fn default_next_page() -> String {
    "a.next".to_string()
}

fn default_semester_indicator() -> String {
    "a#choosesemester".to_string()
}

fn default_detail_marker() -> String {
    "Grunddaten".to_string()
}

fn default_exclude_link_titles() -> Vec<String> {
    vec![
        "Vorlesungsverzeichnis".to_string(),
        "zur Seitenansicht".to_string(),
    ]
}

fn default_exclude_href_fragments() -> Vec<String> {
    vec![
        "state=user".to_string(),
        "category=veranstaltung.browse".to_string(),
    ]
}

fn default_course_id_param() -> String {
    "publishid".to_string()
}
