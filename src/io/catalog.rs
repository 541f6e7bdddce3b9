use crate::types::{AreaOfInterest, CatalogItem, FetchError, FetchResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Property filters applied server-side as exact matches
pub type PropertyFilters = HashMap<String, serde_json::Value>;

/// Search request against a catalog collection
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub collection: String,
    pub intersects: Option<AreaOfInterest>,
    /// Exact-match property filters, e.g. `gsd == 0.6`
    pub properties: PropertyFilters,
    /// Stop after this many items; None fetches every page
    pub limit: Option<usize>,
}

impl SearchParams {
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            ..Default::default()
        }
    }

    pub fn with_area(mut self, aoi: AreaOfInterest) -> Self {
        self.intersects = Some(aoi);
        self
    }

    pub fn with_property_eq(mut self, key: &str, value: serde_json::Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    features: Vec<CatalogItem>,
    #[serde(default)]
    links: Vec<PageLink>,
}

#[derive(Debug, Deserialize)]
struct PageLink {
    rel: String,
    href: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    body: Option<serde_json::Value>,
}

/// Blocking search client for a STAC-style item catalog
pub struct CatalogClient {
    endpoint: String,
    client: reqwest::blocking::Client,
    /// Per-request page size sent to the server
    page_size: usize,
}

impl CatalogClient {
    /// Create a client for a catalog endpoint, e.g.
    /// `https://planetarycomputer.microsoft.com/api/stac/v1`
    pub fn new(endpoint: &str) -> FetchResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent("geofetch/0.2.0 (Raster Workflow Toolkit)")
            .build()?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
            page_size: 100,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Run a spatial/attribute search and collect matching items.
    ///
    /// Zero matches is a normal outcome and returns an empty vector;
    /// only transport and decoding failures are errors. Server result
    /// order is preserved across pages.
    pub fn search(&self, params: &SearchParams) -> FetchResult<Vec<CatalogItem>> {
        let url = format!("{}/search", self.endpoint);
        let body = self.build_search_body(params);

        log::info!(
            "Searching collection '{}' at {}",
            params.collection,
            self.endpoint
        );
        log::debug!("Search body: {}", body);

        let mut items = Vec::new();
        let mut page = self.post_search(&url, &body)?;

        loop {
            log::debug!("Received page with {} items", page.features.len());
            for item in page.features.drain(..) {
                items.push(item);
                if let Some(limit) = params.limit {
                    if items.len() >= limit {
                        log::info!("Search returned {} items (limit reached)", items.len());
                        return Ok(items);
                    }
                }
            }

            let next = page.links.iter().find(|l| l.rel == "next");
            match next {
                Some(link) => {
                    log::debug!("Following next page link: {}", link.href);
                    page = self.fetch_next_page(link)?;
                }
                None => break,
            }
        }

        log::info!("Search returned {} items", items.len());
        Ok(items)
    }

    /// Convenience wrapper: first match or None. An empty result set
    /// is not an error.
    pub fn search_first(&self, params: &SearchParams) -> FetchResult<Option<CatalogItem>> {
        let mut limited = params.clone();
        limited.limit = Some(1);
        Ok(self.search(&limited)?.into_iter().next())
    }

    fn build_search_body(&self, params: &SearchParams) -> serde_json::Value {
        // Never ask the server for more items than the caller wants
        let page_limit = match params.limit {
            Some(limit) => self.page_size.min(limit.max(1)),
            None => self.page_size,
        };
        let mut body = serde_json::json!({
            "collections": [params.collection],
            "limit": page_limit,
        });

        if let Some(aoi) = &params.intersects {
            body["intersects"] = aoi.to_geojson();
        }

        if !params.properties.is_empty() {
            let mut query = serde_json::Map::new();
            for (key, value) in &params.properties {
                query.insert(key.clone(), serde_json::json!({ "eq": value }));
            }
            body["query"] = serde_json::Value::Object(query);
        }

        body
    }

    fn post_search(&self, url: &str, body: &serde_json::Value) -> FetchResult<SearchPage> {
        let response = self.client.post(url).json(body).send()?;
        Self::decode_page(response)
    }

    fn fetch_next_page(&self, link: &PageLink) -> FetchResult<SearchPage> {
        // STAC APIs paginate either with a GET href or a POST body merge
        let response = match (&link.method, &link.body) {
            (Some(method), Some(body)) if method.eq_ignore_ascii_case("POST") => {
                self.client.post(&link.href).json(body).send()?
            }
            _ => self.client.get(&link.href).send()?,
        };
        Self::decode_page(response)
    }

    fn decode_page(response: reqwest::blocking::Response) -> FetchResult<SearchPage> {
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(FetchError::Catalog(format!(
                "search failed with HTTP {}: {}",
                status.as_u16(),
                detail.chars().take(200).collect::<String>()
            )));
        }

        let text = response.text()?;
        let page: SearchPage = serde_json::from_str(&text)?;
        Ok(page)
    }
}
