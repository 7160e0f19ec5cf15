//! HTML parser for catalog listing pages
//!
//! This module handles parsing listing HTML to extract:
//! - Links to deeper catalog levels (faculties, subjects)
//! - Links to course-detail pages
//! - The pagination link to the next page
//! - The semester the page claims to belong to
//! - The hidden session token of the entry page

use crate::config::SelectorConfig;
use crate::model::Semester;
use crate::url::{query_param, resolve_link};
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// A link found on a page
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRef {
    /// Normalized, whitespace-collapsed link text
    pub text: String,
    pub title: Option<String>,
    /// Absolute, normalized target
    pub url: Url,
}

/// Extracted structure of one listing page
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    /// Links into deeper catalog levels, in page order
    pub directories: Vec<LinkRef>,
    /// Links to course-detail pages, in page order
    pub courses: Vec<LinkRef>,
    pub next_page: Option<Url>,
    /// Semester named by the page's semester indicator, if it names one
    pub semester: Option<Semester>,
}

/// Compiled catalog selectors plus link exclusion rules
#[derive(Debug, Clone)]
pub struct CatalogSelectors {
    directory_link: Selector,
    course_link: Selector,
    next_page: Selector,
    semester_indicator: Selector,
    exclude_link_titles: Vec<String>,
    exclude_href_fragments: Vec<String>,
}

impl CatalogSelectors {
    pub fn compile(config: &SelectorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            directory_link: compile_selector(&config.directory_link)?,
            course_link: compile_selector(&config.course_link)?,
            next_page: compile_selector(&config.next_page)?,
            semester_indicator: compile_selector(&config.semester_indicator)?,
            exclude_link_titles: config.exclude_link_titles.clone(),
            exclude_href_fragments: config.exclude_href_fragments.clone(),
        })
    }

    fn is_excluded(&self, href: &str, title: Option<&str>) -> bool {
        if let Some(title) = title {
            if self.exclude_link_titles.iter().any(|t| title.contains(t.as_str())) {
                return true;
            }
        }
        self.exclude_href_fragments
            .iter()
            .any(|fragment| href.contains(fragment.as_str()))
    }
}

pub(crate) fn compile_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// Parses a listing page
///
/// Directory and course links matching the exclusion rules are dropped. A
/// page without a recognizable next-page link is the last page of its list.
pub fn parse_listing(html: &str, page_url: &Url, selectors: &CatalogSelectors) -> ListingPage {
    let document = Html::parse_document(html);

    let directories = select_links(&document, page_url, &selectors.directory_link)
        .into_iter()
        .filter(|(href, link)| !selectors.is_excluded(href, link.title.as_deref()))
        .map(|(_, link)| link)
        .collect();

    let courses = select_links(&document, page_url, &selectors.course_link)
        .into_iter()
        .filter(|(href, link)| !selectors.is_excluded(href, link.title.as_deref()))
        .map(|(_, link)| link)
        .collect();

    let next_page = select_links(&document, page_url, &selectors.next_page)
        .into_iter()
        .map(|(_, link)| link.url)
        .next();

    let semester = document
        .select(&selectors.semester_indicator)
        .find_map(|element| Semester::find_in(&element_text(&element)));

    ListingPage {
        directories,
        courses,
        next_page,
        semester,
    }
}

/// Finds links matching `selector`, optionally only those whose text
/// contains `text_filter`
pub fn find_links(
    html: &str,
    page_url: &Url,
    selector: &Selector,
    text_filter: Option<&str>,
) -> Vec<LinkRef> {
    let document = Html::parse_document(html);
    select_links(&document, page_url, selector)
        .into_iter()
        .map(|(_, link)| link)
        .filter(|link| text_filter.map_or(true, |t| link.text.contains(t)))
        .collect()
}

/// Extracts the session token named `param`
///
/// Looks for a hidden form input first, then for the parameter on any link
/// of the page.
pub fn extract_token(html: &str, page_url: &Url, param: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let input = Selector::parse(&format!("input[name=\"{}\"]", param)).ok()?;
    if let Some(value) = document
        .select(&input)
        .filter_map(|e| e.value().attr("value"))
        .map(str::trim)
        .find(|v| !v.is_empty())
    {
        return Some(value.to_string());
    }

    let anchors = Selector::parse("a[href]").ok()?;
    document
        .select(&anchors)
        .filter_map(|e| e.value().attr("href"))
        .filter_map(|href| resolve_link(page_url, href))
        .find_map(|url| query_param(&url, param).filter(|v| !v.is_empty()))
}

fn select_links(document: &Html, page_url: &Url, selector: &Selector) -> Vec<(String, LinkRef)> {
    document
        .select(selector)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let url = resolve_link(page_url, href)?;
            Some((
                href.to_string(),
                LinkRef {
                    text: element_text(&element),
                    title: element.value().attr("title").map(str::to_string),
                    url,
                },
            ))
        })
        .collect()
}

fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
