//! A mock catalog portal built on wiremock
//!
//! Layout of the catalog served by [`mount_catalog`]:
//!
//! ```text
//! /root
//! ├── /fb/1        courses 1, 2   next -> /fb/1/2
//! │   └── /fb/1/2  courses 3, 4   next -> /fb/1 (backward)
//! └── /fb/2        courses 5, 6   next -> /fb/2/2
//!     └── /fb/2/2  courses 7, 8   next -> /fb/2 (backward)
//! ```

use catalog_harvest::config::{parse_config, Config};
use catalog_harvest::model::{Semester, Term};
use std::sync::atomic::{AtomicUsize, Ordering};
use wiremock::matchers::{path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const COURSES: usize = 8;

pub fn winter_2024() -> Semester {
    Semester::new(2024, Term::Winter)
}

pub fn config(base_url: &str, concurrency: u32) -> Config {
    let toml = format!(
        r#"
[portal]
base-url = "{}"
entry-path = "/start"
token-param = "asi"

[fetch]
retry-count = 3
backoff-base-ms = 1
timeout-secs = 5
concurrency = {}

[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "./test.db"
export-dir = "./exports"
"#,
        base_url, concurrency
    );
    parse_config(&toml).expect("test config")
}

pub fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(format!("<html><body>{}</body></html>", body))
}

/// Entry page handing out one token per session, the last one repeatedly
pub struct EntryPage {
    tokens: Vec<&'static str>,
    issued: AtomicUsize,
}

impl EntryPage {
    pub fn new(tokens: Vec<&'static str>) -> Self {
        Self {
            tokens,
            issued: AtomicUsize::new(0),
        }
    }
}

impl Respond for EntryPage {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        let token = self.tokens[n.min(self.tokens.len() - 1)];
        html(&format!(
            r#"<input type="hidden" name="asi" value="{}">
               <a id="choosesemester" href="/semesters">Semester wählen</a>"#,
            token
        ))
    }
}

/// Mounts the session handshake; sessions get `tokens` in order
pub async fn mount_handshake(server: &MockServer, tokens: Vec<&'static str>) {
    Mock::given(path("/start"))
        .respond_with(EntryPage::new(tokens))
        .mount(server)
        .await;
    Mock::given(path("/semesters"))
        .respond_with(html(
            r#"<a class="regular" href="/set?sem=20241">Sommer 2024</a>
               <a class="regular" href="/set?sem=20242">Winter 2024/25</a>"#,
        ))
        .mount(server)
        .await;
    Mock::given(path("/set"))
        .and(query_param("sem", "20242"))
        .respond_with(html(r#"<a href="/root">Vorlesungsverzeichnis</a>"#))
        .mount(server)
        .await;
}

fn listing(links: &str) -> ResponseTemplate {
    html(&format!(
        r#"<a id="choosesemester" href="/semesters">Winter 2024/25</a>{}"#,
        links
    ))
}

fn course_links(ids: [usize; 2]) -> String {
    ids.iter()
        .map(|id| format!(r#"<a class="regular" href="/course?publishid={0}">Kurs {0}</a>"#, id))
        .collect()
}

/// Mounts the listing pages of two subjects with two pages each
pub async fn mount_catalog(server: &MockServer) {
    Mock::given(path("/root"))
        .respond_with(listing(
            r#"<a class="ueb" href="/fb/1">Mathematik</a>
               <a class="ueb" href="/fb/2">Physik</a>"#,
        ))
        .mount(server)
        .await;

    for subject in 1..=2usize {
        let first = (subject - 1) * 4 + 1;
        Mock::given(path(format!("/fb/{}", subject)))
            .respond_with(listing(&format!(
                r#"{}<a class="next" href="/fb/{}/2">weiter</a>"#,
                course_links([first, first + 1]),
                subject
            )))
            .mount(server)
            .await;
        Mock::given(path(format!("/fb/{}/2", subject)))
            .respond_with(listing(&format!(
                r#"{}<a class="next" href="/fb/{}">zurück</a>"#,
                course_links([first + 2, first + 3]),
                subject
            )))
            .mount(server)
            .await;
    }
}

/// Lecturers of course `id` in portal spelling
pub fn lecturers_of(id: usize) -> Vec<&'static str> {
    match id % 3 {
        0 => vec!["Meier, Hans, Prof. Dr."],
        1 => vec!["Roth, Eva", "Meier, Hans, Prof. Dr."],
        _ => vec!["Roth, Eva"],
    }
}

/// Body of the detail page of course `id`
pub fn detail_body(id: usize, with_title: bool) -> String {
    let title = if with_title {
        format!("<h1>Kurs {} - Einzelansicht</h1>", id)
    } else {
        String::new()
    };
    let lecturers: String = lecturers_of(id)
        .iter()
        .map(|name| {
            format!(
                r#"<tr><td headers="persons_1"><a href="/p">{}</a></td>
                       <td headers="persons_2">verantwortlich</td></tr>"#,
                name
            )
        })
        .collect();

    format!(
        r#"{}
           <table summary="Grunddaten zur Veranstaltung">
             <tr><th>Veranstaltungsart</th><td>{}</td>
                 <th>Veranstaltungsnummer</th><td>V{}</td></tr>
             <tr><th>Semester</th><td>WiSe 2024/25</td><th>SWS</th><td>{}</td></tr>
           </table>
           <table summary="Verantwortliche Dozenten">{}</table>
           <table summary="Übersicht über alle Veranstaltungstermine">
             <tr><th>Tag</th><th>Zeit</th><th>Rhythmus</th><th>Raum</th></tr>
             <tr><td>Mo.</td><td>10:00 bis 12:00</td><td>wöch</td><td>HS {}</td></tr>
           </table>"#,
        title,
        if id % 2 == 0 { "Seminar" } else { "Vorlesung" },
        id,
        if id % 4 == 0 { "1,5" } else { "2" },
        lecturers,
        id
    )
}

/// Detail pages of all courses
///
/// With `expire`, requests carrying the token `stale` are answered with the
/// portal's expiry notice once `after` detail pages have been served.
pub struct DetailPages {
    missing_title: Option<usize>,
    expire: Option<(&'static str, usize)>,
    served: AtomicUsize,
}

impl DetailPages {
    pub fn new() -> Self {
        Self {
            missing_title: None,
            expire: None,
            served: AtomicUsize::new(0),
        }
    }

    pub fn without_title(mut self, id: usize) -> Self {
        self.missing_title = Some(id);
        self
    }

    pub fn expiring(mut self, stale: &'static str, after: usize) -> Self {
        self.expire = Some((stale, after));
        self
    }
}

impl Respond for DetailPages {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let query = |name: &str| {
            request
                .url
                .query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
        };

        if let Some((stale, after)) = self.expire {
            if query("asi").as_deref() == Some(stale) && self.served.load(Ordering::SeqCst) >= after {
                return html("<p>Ihre Sitzung abgelaufen. Bitte melden Sie sich neu an.</p>");
            }
        }

        let Some(id) = query("publishid").and_then(|v| v.parse::<usize>().ok()) else {
            return ResponseTemplate::new(404);
        };
        self.served.fetch_add(1, Ordering::SeqCst);
        html(&detail_body(id, self.missing_title != Some(id)))
    }
}

/// Mounts `pages` as the responder of every course-detail URL
pub async fn mount_details(server: &MockServer, pages: DetailPages) {
    Mock::given(path("/course"))
        .respond_with(pages)
        .mount(server)
        .await;
}

/// A complete portal with a stable token
pub async fn start_portal() -> MockServer {
    let server = MockServer::start().await;
    mount_handshake(&server, vec!["T1"]).await;
    mount_catalog(&server).await;
    mount_details(&server, DetailPages::new()).await;
    server
}
