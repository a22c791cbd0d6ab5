use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::*;
use crate::fetch::Method;

/// Serves canned pages by URL and records every request.
#[derive(Default)]
struct CannedPages {
    pages: HashMap<String, String>,
    requested: Mutex<Vec<String>>,
}

impl CannedPages {
    fn with(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetch for CannedPages {
    async fn fetch(&self, url: &str, _method: Method, _body: Option<&serde_json::Value>) -> String {
        self.requested.lock().unwrap().push(url.to_string());
        self.pages.get(url).cloned().unwrap_or_default()
    }
}

fn links(ids: &[u32]) -> String {
    ids.iter()
        .map(|id| format!(r#"<a href="/uk/auto_car_{id}.html">car</a>"#))
        .collect()
}

fn listing(id: u32) -> String {
    format!("https://auto.ria.com/uk/auto_car_{id}.html")
}

const BASE: &str = "https://auto.ria.com/uk/car/used/?sort=date";

// -----------------------------------------------------------------------
// build_page_url
// -----------------------------------------------------------------------

#[test]
fn first_page_is_base_verbatim() {
    assert_eq!(build_page_url(BASE, 1).unwrap(), BASE);
}

#[test]
fn later_pages_keep_other_params_and_set_one_page() {
    let url = build_page_url("https://auto.ria.com/uk/search/?brand=9&page=4&page=7&year=2015", 3).unwrap();
    assert_eq!(url, "https://auto.ria.com/uk/search/?brand=9&page=3&year=2015");
}

#[test]
fn missing_page_param_is_appended() {
    assert_eq!(
        build_page_url(BASE, 2).unwrap(),
        "https://auto.ria.com/uk/car/used/?sort=date&page=2"
    );
}

#[test]
fn fragment_is_preserved() {
    assert_eq!(
        build_page_url("https://auto.ria.com/uk/car/used/?a=1#top", 5).unwrap(),
        "https://auto.ria.com/uk/car/used/?a=1&page=5#top"
    );
}

#[test]
fn relative_base_gets_default_origin() {
    assert_eq!(
        build_page_url("/uk/car/used/", 2).unwrap(),
        "https://auto.ria.com/uk/car/used/?page=2"
    );
}

// -----------------------------------------------------------------------
// extract_listing_urls
// -----------------------------------------------------------------------

#[test]
fn absolute_and_relative_links_are_deduplicated_in_order() {
    let html = r#"
        <a href="https://auto.ria.com/uk/auto_audi_a4_1.html">a</a>
        <a href="/uk/auto_bmw_x5_2.html?utm=1">b</a>
        <a href='/uk/auto_audi_a4_1.html'>a again</a>
        <a href="https://auto.ria.com/uk/news/3.html">news</a>
    "#;
    assert_eq!(
        extract_listing_urls(html, DEFAULT_ORIGIN),
        vec![
            "https://auto.ria.com/uk/auto_audi_a4_1.html".to_string(),
            "https://auto.ria.com/uk/auto_bmw_x5_2.html".to_string(),
        ]
    );
}

#[test]
fn links_are_anchored_at_the_given_origin() {
    let html = r#"<a href="https://auto.ria.com/uk/auto_car_7.html">x</a>"#;
    assert_eq!(
        extract_listing_urls(html, "http://127.0.0.1:8080"),
        vec!["http://127.0.0.1:8080/uk/auto_car_7.html".to_string()]
    );
}

// -----------------------------------------------------------------------
// Frontier
// -----------------------------------------------------------------------

#[tokio::test]
async fn stops_on_first_page_without_new_urls() {
    let fetcher = CannedPages::default()
        .with(BASE, &links(&[1, 2]))
        .with(&build_page_url(BASE, 2).unwrap(), &links(&[2, 3]))
        .with(&build_page_url(BASE, 3).unwrap(), &links(&[1, 3]))
        .with(&build_page_url(BASE, 4).unwrap(), &links(&[4]));
    let mut frontier = Frontier::new(&fetcher, BASE, DEFAULT_ORIGIN, 0);

    assert_eq!(frontier.next_batch().await, Some(vec![listing(1), listing(2)]));
    assert_eq!(frontier.next_batch().await, Some(vec![listing(3)]));
    assert_eq!(frontier.next_batch().await, None);
    assert_eq!(frontier.next_batch().await, None);
    assert_eq!(frontier.pages_visited(), 3);
    assert_eq!(frontier.discovered(), 3);
    assert_eq!(fetcher.requested().len(), 3);
}

#[tokio::test]
async fn stops_on_empty_page() {
    let fetcher = CannedPages::default().with(BASE, &links(&[1]));
    let mut frontier = Frontier::new(&fetcher, BASE, DEFAULT_ORIGIN, 0);

    assert_eq!(frontier.next_batch().await, Some(vec![listing(1)]));
    assert_eq!(frontier.next_batch().await, None);
    assert_eq!(fetcher.requested(), vec![BASE.to_string(), build_page_url(BASE, 2).unwrap()]);
}

#[tokio::test]
async fn respects_page_limit() {
    let fetcher = CannedPages::default()
        .with(BASE, &links(&[1]))
        .with(&build_page_url(BASE, 2).unwrap(), &links(&[2]))
        .with(&build_page_url(BASE, 3).unwrap(), &links(&[3]));
    let mut frontier = Frontier::new(&fetcher, BASE, DEFAULT_ORIGIN, 2);

    assert!(frontier.next_batch().await.is_some());
    assert!(frontier.next_batch().await.is_some());
    assert_eq!(frontier.next_batch().await, None);
    assert_eq!(fetcher.requested().len(), 2);
}

#[tokio::test]
async fn listing_origin_does_not_follow_search_host() {
    let mirror = "http://127.0.0.1:8080/uk/car/used/";
    let fetcher = CannedPages::default().with(mirror, &links(&[5]));
    let mut frontier = Frontier::new(&fetcher, mirror, "https://auto.ria.com/", 1);
    assert_eq!(frontier.next_batch().await, Some(vec![listing(5)]));
}

#[tokio::test]
async fn first_page_is_not_subject_to_repeat_check() {
    let fetcher = CannedPages::default().with(BASE, &links(&[1, 1, 1]));
    let mut frontier = Frontier::new(&fetcher, BASE, DEFAULT_ORIGIN, 0);
    assert_eq!(frontier.next_batch().await, Some(vec![listing(1)]));
}
