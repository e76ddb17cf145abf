//! Google Scholar adapter.
//!
//! Scholar has no API, so this scrapes the HTML result pages. Requests carry
//! browser-like headers and cookies exported from a real browser session
//! (Playwright JSON format); without them Scholar serves a CAPTCHA quickly.

use super::{fetch_text, SourceAdapter, SourceBatch};
use crate::error::{LitSearchError, Result};
use crate::paper::{non_empty, parse_year, title_or_sentinel, Author, Paper, SourceId};
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default Google Scholar URL
pub const DEFAULT_SCHOLAR_URL: &str = "https://scholar.google.com";

/// Browser user agent, Scholar rejects obvious bots
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Results per Scholar page
const PAGE_SIZE: usize = 10;

/// Scholar stops serving results after 100
const MAX_PAGES: usize = 10;

/// One result block as scraped, before mapping to [`Paper`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScholarResult {
    pub title: String,
    pub author: String,
    pub year: String,
    pub venue: String,
    pub article_url: String,
    pub citations: String,
    pub snippet: String,
}

/// Scraper settings
#[derive(Debug, Clone)]
pub struct ScholarOptions {
    /// Mirror or test server instead of [`DEFAULT_SCHOLAR_URL`]
    pub base_url: Option<String>,
    /// Proxy URL (e.g. "http://127.0.0.1:7890")
    pub proxy: Option<String>,
    /// Playwright-format cookie export
    pub cookie_file: Option<PathBuf>,
    /// Source data type filter ("0,5" excludes patents)
    pub sdt: String,
    /// Only results from this year onwards
    pub year_low: Option<i32>,
    /// Random pause before each page, in milliseconds (min, max)
    pub page_delay_ms: (u64, u64),
    pub timeout: Duration,
}

impl Default for ScholarOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            proxy: None,
            cookie_file: None,
            sdt: "0,5".to_string(),
            year_low: None,
            page_delay_ms: (500, 2000),
            timeout: super::REQUEST_TIMEOUT,
        }
    }
}

/// Cookie entry matching Playwright's export format
#[derive(Debug, Clone, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
}

/// Read a cookie export. A missing or unreadable file yields no cookies.
pub fn load_cookies(path: &Path) -> Vec<Cookie> {
    if !path.exists() {
        debug!(path = %path.display(), "Cookie file not found");
        return Vec::new();
    }
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<Vec<Cookie>>(&content) {
            Ok(cookies) => cookies,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse cookies");
                Vec::new()
            }
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read cookie file");
            Vec::new()
        }
    }
}

/// `name=value; ...` for Google domains only
fn build_cookie_header(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .filter(|c| c.domain.contains("google"))
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

pub struct GoogleScholarAdapter {
    client: reqwest::Client,
    base_url: String,
    cookie_header: String,
    options: ScholarOptions,
}

impl GoogleScholarAdapter {
    pub fn new(options: ScholarOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(options.timeout)
            .cookie_store(true);

        if let Some(proxy_url) = &options.proxy {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
                LitSearchError::Config(format!("Invalid proxy URL '{}': {}", proxy_url, e))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| LitSearchError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let cookies = options
            .cookie_file
            .as_deref()
            .map(load_cookies)
            .unwrap_or_default();
        if cookies.is_empty() {
            debug!("No Google Scholar cookies loaded");
        } else {
            info!(count = cookies.len(), "Loaded Google Scholar cookies");
        }

        Ok(Self {
            client,
            base_url: options
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_SCHOLAR_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            cookie_header: build_cookie_header(&cookies),
            options,
        })
    }

    async fn fetch_page(&self, url: &Url) -> Result<String> {
        let mut request = self
            .client
            .get(url.as_str())
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Cache-Control", "no-cache")
            .header("Upgrade-Insecure-Requests", "1");
        if !self.cookie_header.is_empty() {
            request = request.header("Cookie", &self.cookie_header);
        }
        let html = fetch_text(request, SourceId::GoogleScholar).await?;

        if html.contains("Solving the above CAPTCHA") || html.contains("unusual traffic") {
            return Err(LitSearchError::Captcha);
        }
        Ok(html)
    }

    async fn pause(&self) {
        let (min, max) = self.options.page_delay_ms;
        if max == 0 {
            return;
        }
        let span = max.saturating_sub(min).max(1);
        let delay = rand::random::<u64>() % span + min;
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}

#[async_trait]
impl SourceAdapter for GoogleScholarAdapter {
    fn id(&self) -> SourceId {
        SourceId::GoogleScholar
    }

    async fn fetch(&self, query: &str, max_results: usize) -> Result<SourceBatch> {
        let pages = max_results.div_ceil(PAGE_SIZE).clamp(1, MAX_PAGES);
        info!(query, pages, url = %self.base_url, "Starting Google Scholar query");

        let mut results = Vec::new();
        let mut total = 0;

        for page in 0..pages {
            let url = build_search_url(
                &self.base_url,
                query,
                page * PAGE_SIZE,
                &self.options.sdt,
                self.options.year_low,
            )?;
            self.pause().await;

            // Any failed page fails the source, earlier pages included
            let html = self.fetch_page(&url).await.inspect_err(|e| {
                warn!(page, error = %e, "Google Scholar page failed");
            })?;

            if page == 0 {
                total = parse_total_results(&html).unwrap_or(0);
            }
            let page_results = parse_result_items(&html)?;
            debug!(page, count = page_results.len(), "Parsed Google Scholar page");

            let last_page = page_results.len() < PAGE_SIZE;
            results.extend(page_results);
            if last_page || results.len() >= max_results {
                break;
            }
        }

        let papers: Vec<Paper> = results.into_iter().map(result_to_paper).collect();
        Ok(SourceBatch::new(papers, total))
    }
}

/// Build Google Scholar search URL
fn build_search_url(
    base_url: &str,
    query: &str,
    start: usize,
    sdt: &str,
    year_low: Option<i32>,
) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/scholar", base_url))
        .map_err(|e| LitSearchError::Config(format!("Invalid base URL: {}", e)))?;

    {
        let mut params = url.query_pairs_mut();
        params.append_pair("q", query);
        params.append_pair("hl", "en-US"); // English labels keep "Cited by" parsing stable
        params.append_pair("start", &start.to_string());
        params.append_pair("as_sdt", sdt);
        if let Some(year) = year_low {
            params.append_pair("as_ylo", &year.to_string());
        }
    }

    Ok(url)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| LitSearchError::Parse(e.to_string()))
}

/// "About 1,230 results (0.05 sec)" from the results header
fn parse_total_results(html: &str) -> Option<u64> {
    let document = Html::parse_document(html);
    let header = selector("#gs_ab_md").ok()?;
    let text = document.select(&header).next()?.text().collect::<String>();
    let re = Regex::new(r"([\d,.]+)\s+results?").ok()?;
    let digits: String = re
        .captures(&text)?
        .get(1)?
        .as_str()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Parse Google Scholar HTML into raw result blocks.
pub fn parse_result_items(html: &str) -> Result<Vec<ScholarResult>> {
    let document = Html::parse_document(html);

    let item_selector = selector("div.gs_r.gs_or.gs_scl")?;
    let title_selector = selector("h3.gs_rt")?;
    let link_selector = selector("h3.gs_rt a")?;
    let meta_selector = selector("div.gs_a")?;
    let snippet_selector = selector("div.gs_rs")?;
    let cite_selector = selector("div.gs_fl a")?;

    let year_regex = Regex::new(r"\b(19|20)\d{2}\b").map_err(|e| LitSearchError::Parse(e.to_string()))?;
    let cite_regex = Regex::new(r"Cited by\s*(\d+)").map_err(|e| LitSearchError::Parse(e.to_string()))?;

    let mut results = Vec::new();

    for item in document.select(&item_selector) {
        let mut data = ScholarResult::default();

        if let Some(link) = item.select(&link_selector).next() {
            data.title = link.text().collect::<String>().trim().to_string();
            data.article_url = link.value().attr("href").unwrap_or("").to_string();
        } else if let Some(title_elem) = item.select(&title_selector).next() {
            // [CITATION] / [BOOK] entries have no link; drop the bracketed tag
            let text = title_elem.text().collect::<String>();
            let mut title = text.trim();
            while let Some((_, rest)) = title.strip_prefix('[').and_then(|t| t.split_once(']')) {
                title = rest.trim_start();
            }
            data.title = title.trim().to_string();
        }

        // "A Smith, B Jones - Journal of X, 2020 - publisher.com"
        if let Some(meta_elem) = item.select(&meta_selector).next() {
            let meta_text = meta_elem.text().collect::<String>().replace('\u{a0}', " ");
            let parts: Vec<&str> = meta_text.split(" - ").collect();

            if let Some(authors) = parts.first() {
                data.author = authors.trim().to_string();
            }

            if let Some(venue_year) = parts.get(1) {
                if let Some(year_match) = year_regex.find(venue_year) {
                    data.year = year_match.as_str().to_string();
                    data.venue = venue_year[..year_match.start()]
                        .trim()
                        .trim_end_matches(',')
                        .to_string();
                } else {
                    data.venue = venue_year.trim().to_string();
                }
            }
        }

        if let Some(snippet_elem) = item.select(&snippet_selector).next() {
            data.snippet = snippet_elem.text().collect::<String>().trim().to_string();
        }

        for link in item.select(&cite_selector) {
            let href = link.value().attr("href").unwrap_or("");
            if !href.contains("cites=") {
                continue;
            }
            let text = link.text().collect::<String>();
            if let Some(count) = cite_regex.captures(&text).and_then(|caps| caps.get(1)) {
                data.citations = count.as_str().to_string();
                break;
            }
        }

        if !data.title.is_empty() {
            results.push(data);
        }
    }

    Ok(results)
}

/// DOI embedded in a publisher link, if any
fn doi_from_url(url: &str) -> Option<String> {
    let re = Regex::new(r"(10\.\d{4,9}/[^\s?#&]+)").ok()?;
    let doi = re.captures(url)?.get(1)?.as_str();
    Some(urlencoding::decode(doi).map(|d| d.into_owned()).unwrap_or_else(|_| doi.to_string()))
}

fn result_to_paper(r: ScholarResult) -> Paper {
    let mut paper = Paper::new(SourceId::GoogleScholar, title_or_sentinel(Some(r.title)));

    paper.authors = r
        .author
        .split(',')
        .map(|name| name.trim().trim_end_matches('…').trim())
        .filter(|name| !name.is_empty())
        .map(Author::new)
        .collect();
    paper.year = parse_year(&r.year);
    paper.journal = non_empty(Some(r.venue.trim_end_matches('…').to_string()));
    paper.citation_count = r.citations.parse().ok();
    paper.abstract_text = non_empty(Some(r.snippet));
    paper.doi = doi_from_url(&r.article_url);
    paper.url = non_empty(Some(r.article_url));
    paper
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE_PAGE: &str = r#"
        <html><body>
        <div id="gs_ab_md"><div class="gs_ab_mdw">About 1,230 results (0.04 sec)</div></div>
        <div class="gs_r gs_or gs_scl">
          <h3 class="gs_rt"><a href="https://doi.org/10.5465/amr.1989.4308385">Building theories from case study research</a></h3>
          <div class="gs_a">KM Eisenhardt - Academy of management review, 1989 - journals.aom.org</div>
          <div class="gs_rs">This paper describes the process of inducting theory using case studies.</div>
          <div class="gs_fl gs_flb"><a href="/scholar?cites=123">Cited by 98765</a><a href="/related">Related articles</a></div>
        </div>
        <div class="gs_r gs_or gs_scl">
          <h3 class="gs_rt"><span>[CITATION]</span> The resource-based view</h3>
          <div class="gs_a">J Barney, D Ketchen… - 2001</div>
        </div>
        </body></html>
    "#;

    #[test]
    fn test_build_search_url() {
        let url = build_search_url("https://scholar.google.com", "machine learning", 20, "0,5", Some(2020))
            .expect("Failed to build URL");
        assert!(url.as_str().contains("q=machine+learning"));
        assert!(url.as_str().contains("start=20"));
        assert!(url.as_str().contains("as_ylo=2020"));
    }

    #[test]
    fn test_parse_empty_html() {
        let results = parse_result_items("<html><body></body></html>").expect("Parse failed");
        assert!(results.is_empty());
    }

    #[test]
    fn test_parse_result_items() {
        let results = parse_result_items(SAMPLE_PAGE).expect("parse");
        assert_eq!(results.len(), 2);

        let first = &results[0];
        assert_eq!(first.title, "Building theories from case study research");
        assert_eq!(first.author, "KM Eisenhardt");
        assert_eq!(first.venue, "Academy of management review");
        assert_eq!(first.year, "1989");
        assert_eq!(first.citations, "98765");

        assert_eq!(results[1].title, "The resource-based view");
        assert_eq!(parse_total_results(SAMPLE_PAGE), Some(1230));
    }

    #[test]
    fn test_result_to_paper() {
        let results = parse_result_items(SAMPLE_PAGE).expect("parse");
        let papers: Vec<Paper> = results.into_iter().map(result_to_paper).collect();

        assert_eq!(papers[0].doi.as_deref(), Some("10.5465/amr.1989.4308385"));
        assert_eq!(papers[0].citation_count, Some(98765));
        assert_eq!(papers[0].year, Some(1989));
        assert_eq!(papers[1].author_names(), vec!["J Barney", "D Ketchen"]);
        assert_eq!(papers[1].year, Some(2001));
        assert!(papers[1].doi.is_none());
    }

    #[test]
    fn test_cookie_header_keeps_google_only() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(
            file,
            r#"[{{"name":"GSP","value":"abc","domain":".scholar.google.com"}},{{"name":"x","value":"y","domain":".example.com"}}]"#
        )?;
        let cookies = load_cookies(file.path());
        assert_eq!(cookies.len(), 2);
        assert_eq!(build_cookie_header(&cookies), "GSP=abc");
        assert!(load_cookies(Path::new("/nonexistent/cookies.json")).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_captcha_page_fails_search() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/scholar")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>Our systems have detected unusual traffic</html>")
            .create_async()
            .await;

        let adapter = GoogleScholarAdapter::new(ScholarOptions {
            base_url: Some(server.url()),
            page_delay_ms: (0, 0),
            ..Default::default()
        })
        .expect("adapter");
        let result = adapter.search("strategy", 10).await;
        assert!(!result.is_success());
        assert!(result.error.unwrap_or_default().contains("CAPTCHA"));
    }

    #[tokio::test]
    async fn test_short_page_stops_paging() {
        let mut server = Server::new_async().await;
        let page = server
            .mock("GET", "/scholar")
            .match_query(Matcher::UrlEncoded("start".into(), "0".into()))
            .with_status(200)
            .with_body(SAMPLE_PAGE)
            .expect(1)
            .create_async()
            .await;

        let adapter = GoogleScholarAdapter::new(ScholarOptions {
            base_url: Some(server.url()),
            page_delay_ms: (0, 0),
            ..Default::default()
        })
        .expect("adapter");
        let batch = adapter.fetch("case study", 50).await.expect("fetch");

        page.assert_async().await;
        assert_eq!(batch.papers.len(), 2);
        assert_eq!(batch.total_available, 1230);
    }

    fn full_page() -> String {
        let items: String = (0..PAGE_SIZE)
            .map(|i| {
                format!(
                    r#"<div class="gs_r gs_or gs_scl"><h3 class="gs_rt"><a href="https://example.org/{i}">Study {i}</a></h3><div class="gs_a">A Author - Journal, 2020</div></div>"#
                )
            })
            .collect();
        format!(
            r#"<html><body><div id="gs_ab_md"><div class="gs_ab_mdw">About 500 results</div></div>{}</body></html>"#,
            items
        )
    }

    #[tokio::test]
    async fn test_failed_later_page_fails_source() {
        let mut server = Server::new_async().await;
        let _first = server
            .mock("GET", "/scholar")
            .match_query(Matcher::UrlEncoded("start".into(), "0".into()))
            .with_status(200)
            .with_body(full_page())
            .create_async()
            .await;
        let _second = server
            .mock("GET", "/scholar")
            .match_query(Matcher::UrlEncoded("start".into(), "10".into()))
            .with_status(500)
            .create_async()
            .await;

        let adapter = GoogleScholarAdapter::new(ScholarOptions {
            base_url: Some(server.url()),
            page_delay_ms: (0, 0),
            ..Default::default()
        })
        .expect("adapter");
        let result = adapter.search("case study", 20).await;

        assert!(!result.is_success());
        assert!(result.papers.is_empty());
        assert!(result.error.expect("error").contains("500"));
    }
}
