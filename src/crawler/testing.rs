//! Shared fixtures for crawler unit tests

use crate::config::{parse_config, Config};
use crate::model::{Semester, Term};
use wiremock::matchers::{path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn winter_2024() -> Semester {
    Semester::new(2024, Term::Winter)
}

/// Configuration for a mock portal with the default navigation steps
pub fn config(base_url: &str) -> Config {
    let toml = format!(
        r#"
[portal]
base-url = "{}"
entry-path = "/start"
token-param = "asi"

[fetch]
backoff-base-ms = 1
timeout-secs = 5

[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "./test.db"
export-dir = "./exports"
"#,
        base_url
    );
    parse_config(&toml).expect("test config")
}

pub fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(format!("<html><body>{}</body></html>", body))
}

/// Mounts entry page, semester choice and the link to `/root`
pub async fn mount_handshake(server: &MockServer) {
    Mock::given(path("/start"))
        .respond_with(html(
            r#"<input type="hidden" name="asi" value="T1">
               <a id="choosesemester" href="/semesters">Semester wählen</a>"#,
        ))
        .mount(server)
        .await;
    Mock::given(path("/semesters"))
        .and(query_param("asi", "T1"))
        .respond_with(html(
            r#"<a class="regular" href="/set?sem=20241">Sommer 2024</a>
               <a class="regular" href="/set?sem=20242">Winter 2024/25</a>
               <a class="regular" href="/help">Hilfe</a>"#,
        ))
        .mount(server)
        .await;
    Mock::given(path("/set"))
        .and(query_param("sem", "20242"))
        .respond_with(html(r#"<a href="/root">Vorlesungsverzeichnis</a>"#))
        .mount(server)
        .await;
}

/// Body of a listing page of Winter 2024/25
pub fn listing(links: &str) -> ResponseTemplate {
    html(&format!(
        r#"<a id="choosesemester" href="/semesters">Winter 2024/25</a>{}"#,
        links
    ))
}

/// Body of a course-detail page
pub fn detail(title: &str, number: &str, lecturer: &str) -> ResponseTemplate {
    html(&format!(
        r#"<h1>{} - Einzelansicht</h1>
           <table summary="Grunddaten zur Veranstaltung">
             <tr><th>Veranstaltungsart</th><td>Vorlesung</td>
                 <th>Veranstaltungsnummer</th><td>{}</td></tr>
             <tr><th>Semester</th><td>WiSe 2024/25</td><th>SWS</th><td>2</td></tr>
           </table>
           <table summary="Verantwortliche Dozenten">
             <tr><td headers="persons_1"><a href="/p">{}</a></td>
                 <td headers="persons_2">verantwortlich</td></tr>
           </table>"#,
        title, number, lecturer
    ))
}
