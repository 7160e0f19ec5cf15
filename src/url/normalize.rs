use crate::UrlError;
use url::Url;

/// Normalizes a catalog URL so equivalent links compare equal
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only http and https
/// 3. Lowercase the host
/// 4. Collapse repeated slashes in the path
/// 5. Remove fragment (everything after #)
/// 6. Sort query parameters by name (stable for repeated names)
/// 7. Remove empty query string (trailing ?)
///
/// Session tokens are not touched here; see [`page_key`].
///
/// # Examples
///
/// ```
/// use catalog_harvest::url::normalize_url;
///
/// let url = normalize_url("https://QIS.Example.EDU/rds?state=wtree&search=1#top").unwrap();
/// assert_eq!(url.as_str(), "https://qis.example.edu/rds?search=1&state=wtree");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url.host_str().ok_or(UrlError::MissingHost)?.to_lowercase();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Parse(format!("Failed to set host: {}", e)))?;

    let path = normalize_path(url.path());
    url.set_path(&path);

    url.set_fragment(None);

    let params = sorted_query_params(&url, None);
    set_query(&mut url, &params);

    Ok(url)
}

/// Key under which a page is tracked in the visited-set
///
/// Same as [`normalize_url`] with the session token parameter removed, so the
/// key survives a session renewal.
pub fn page_key(url: &Url, token_param: Option<&str>) -> String {
    let mut key = url.clone();
    key.set_fragment(None);
    let params = sorted_query_params(&key, token_param);
    set_query(&mut key, &params);
    key.to_string()
}

/// Resolves an `href` found on `page` to a normalized absolute URL
///
/// Returns `None` for links that cannot lead to another catalog page
/// (`javascript:`, `mailto:`, fragments, unparsable values).
pub fn resolve_link(page: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_lowercase();
    if lowered.starts_with("javascript:") || lowered.starts_with("mailto:") {
        return None;
    }

    let absolute = page.join(href).ok()?;
    normalize_url(absolute.as_str()).ok()
}

/// Returns `url` with query parameter `name` set to `value`, replacing any
/// previous value
pub fn with_query_param(url: &Url, name: &str, value: &str) -> Url {
    let mut params = sorted_query_params(url, Some(name));
    params.push((name.to_string(), value.to_string()));
    params.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = url.clone();
    set_query(&mut out, &params);
    out
}

/// Value of the first query parameter called `name`
pub fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let trailing = path.len() > 1 && path.ends_with('/');
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return "/".to_string();
    }

    let mut result = format!("/{}", segments.join("/"));
    if trailing {
        result.push('/');
    }
    result
}

fn sorted_query_params(url: &Url, drop: Option<&str>) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| Some(key.as_ref()) != drop)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));
    params
}

fn set_query(url: &mut Url, params: &[(String, String)]) {
    if params.is_empty() {
        url.set_query(None);
        return;
    }
    url.query_pairs_mut().clear().extend_pairs(params);
}
