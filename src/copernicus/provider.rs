use super::odata::{self, ProductPage, TokenResponse};
use super::{CATALOG_URL, CLIENT_ID, DEFAULT_PAGE_SIZE, DOWNLOAD_URL, TOKEN_URL};
use crate::download::{
    AccessToken, Credentials, ProductCatalog, ProductStream, TokenProvider, Transfer,
};
use crate::error::FetchError;
use crate::search::{CatalogSearch, ProductRecord, SearchQuery};
use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub token_url: String,
    pub catalog_url: String,
    pub download_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            token_url: TOKEN_URL.to_string(),
            catalog_url: CATALOG_URL.to_string(),
            download_url: DOWNLOAD_URL.to_string(),
        }
    }
}

/// HTTP access to the CDSE token issuer, OData catalog and zipper service.
pub struct Provider {
    client: Client,
    endpoints: Endpoints,
    collection: Option<String>,
    page_size: u32,
}

impl Provider {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            endpoints: Endpoints::default(),
            collection: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Restrict searches to one catalog collection, e.g. `SENTINEL-3`.
    pub fn with_collection(mut self, collection: Option<String>) -> Self {
        self.collection = collection;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    fn catalog_url(&self, params: &[(&str, &str)]) -> Result<Url, FetchError> {
        Url::parse_with_params(&self.endpoints.catalog_url, params).map_err(|err| {
            FetchError::Validation(format!(
                "Invalid catalog url '{}': {err}",
                self.endpoints.catalog_url
            ))
        })
    }

    async fn get_page(&self, url: Url) -> Result<ProductPage, FetchError> {
        debug!(%url, "Catalog request");
        let response = self.client.get(url).send().await?;
        let response = ensure_success(response)?;
        Ok(response.json::<ProductPage>().await?)
    }
}

fn ensure_success(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(FetchError::Transport(format!(
        "{} returned HTTP {status}",
        response.url()
    )))
}

/// Catalog records without a `ContentDate` cannot advance the window and are dropped.
fn page_records(page: ProductPage) -> Vec<ProductRecord> {
    let mut records = Vec::with_capacity(page.value.len());
    for product in page.value {
        let name = product.name.clone();
        match product.into_record() {
            Some(record) => records.push(record),
            None => warn!(product = %name, "Catalog record has no ContentDate, dropping it"),
        }
    }
    records
}

impl TokenProvider for Provider {
    async fn obtain_token(&self, credentials: &Credentials) -> Result<AccessToken, FetchError> {
        let form = [
            ("client_id", CLIENT_ID),
            ("username", credentials.username.as_str()),
            ("password", credentials.password()),
            ("grant_type", "password"),
        ];
        let response = self
            .client
            .post(&self.endpoints.token_url)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Authentication(format!(
                "Token endpoint returned HTTP {status}"
            )));
        }
        let body = response.json::<TokenResponse>().await.map_err(|err| {
            FetchError::Authentication(format!("Malformed token response: {err}"))
        })?;
        Ok(AccessToken::new(&body.access_token))
    }
}

impl ProductCatalog for Provider {
    async fn resolve_id(&self, product_name: &str) -> Result<String, FetchError> {
        let filter = odata::name_filter(product_name);
        let url = self.catalog_url(&[("$filter", filter.as_str())])?;
        let page = self.get_page(url).await?;
        page.value
            .into_iter()
            .next()
            .map(|product| product.id)
            .ok_or_else(|| FetchError::NotFound(product_name.to_string()))
    }
}

impl CatalogSearch for Provider {
    async fn search(&self, query: &SearchQuery<'_>) -> Result<Vec<ProductRecord>, FetchError> {
        let filter = odata::search_filter(query, self.collection.as_deref());
        let top = self.page_size.to_string();
        let url = self.catalog_url(&[
            ("$filter", filter.as_str()),
            ("$orderby", "ContentDate/Start asc"),
            ("$top", top.as_str()),
        ])?;
        let page = self.get_page(url).await?;
        Ok(page_records(page))
    }
}

impl Transfer for Provider {
    async fn open(
        &self,
        token: &AccessToken,
        product_id: &str,
    ) -> Result<ProductStream, FetchError> {
        let url = format!("{}({product_id})/$value", self.endpoints.download_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&token.value)
            .send()
            .await?;

        let response = match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(FetchError::Authentication(format!(
                    "Download of {product_id} rejected with HTTP {}",
                    response.status()
                )));
            }
            _ => ensure_success(response)?,
        };

        let content_length = response.content_length();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(FetchError::from))
            .boxed();
        Ok(ProductStream {
            content_length,
            body,
        })
    }
}
