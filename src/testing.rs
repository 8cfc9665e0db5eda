//! In-memory stand-ins for the remote catalog, token issuer and transfer endpoint.
use crate::download::{
    AccessToken, Credentials, ProductCatalog, ProductStream, TokenProvider, Transfer,
};
use crate::error::FetchError;
use crate::search::{CatalogSearch, ProductRecord, SearchQuery};
use bytes::Bytes;
use chrono::NaiveDate;
use futures_util::StreamExt;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};

/// Answers each search with the next scripted page, then with empty pages.
pub struct ScriptedCatalog {
    pages: RefCell<VecDeque<Vec<ProductRecord>>>,
    queries: RefCell<Vec<(NaiveDate, NaiveDate)>>,
}

impl ScriptedCatalog {
    pub fn new(pages: Vec<Vec<ProductRecord>>) -> Self {
        Self {
            pages: RefCell::new(pages.into()),
            queries: RefCell::new(vec![]),
        }
    }

    pub fn queries(&self) -> Vec<(NaiveDate, NaiveDate)> {
        self.queries.borrow().clone()
    }
}

impl CatalogSearch for ScriptedCatalog {
    async fn search(&self, query: &SearchQuery<'_>) -> Result<Vec<ProductRecord>, FetchError> {
        self.queries.borrow_mut().push((query.start, query.end));
        Ok(self.pages.borrow_mut().pop_front().unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    /// The transfer request itself is rejected.
    Transport,
    /// The stream errors out halfway through.
    Interrupted,
    /// The stream ends early without an error.
    Truncated,
}

#[derive(Default)]
pub struct FakeService {
    products: HashMap<String, Vec<u8>>,
    transfer_failures: RefCell<HashMap<String, (Failure, u32)>>,
    unsized_products: RefCell<HashSet<String>>,
    token_failures: Cell<u32>,
    token_calls: Cell<u32>,
    resolutions: RefCell<Vec<String>>,
    transfers: RefCell<Vec<String>>,
}

impl FakeService {
    pub fn with_products(products: &[(&str, &[u8])]) -> Self {
        Self {
            products: products
                .iter()
                .map(|(name, data)| (name.to_string(), data.to_vec()))
                .collect(),
            ..Default::default()
        }
    }

    /// Make the next `times` transfers of `product_name` fail.
    pub fn fail_transfer(&self, product_name: &str, failure: Failure, times: u32) {
        self.transfer_failures
            .borrow_mut()
            .insert(product_name.to_string(), (failure, times));
    }

    /// Serve `product_name` without declaring its length, like a chunked response.
    pub fn omit_length(&self, product_name: &str) {
        self.unsized_products
            .borrow_mut()
            .insert(product_name.to_string());
    }

    pub fn fail_tokens(&self, times: u32) {
        self.token_failures.set(times);
    }

    pub fn token_calls(&self) -> u32 {
        self.token_calls.get()
    }

    pub fn resolutions(&self) -> Vec<String> {
        self.resolutions.borrow().clone()
    }

    pub fn transfers(&self) -> Vec<String> {
        self.transfers.borrow().clone()
    }

    fn take_failure(&self, product_name: &str) -> Option<Failure> {
        let mut failures = self.transfer_failures.borrow_mut();
        let (failure, remaining) = failures.get_mut(product_name)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(*failure)
    }
}

impl TokenProvider for FakeService {
    async fn obtain_token(&self, credentials: &Credentials) -> Result<AccessToken, FetchError> {
        self.token_calls.set(self.token_calls.get() + 1);
        let failures = self.token_failures.get();
        if failures > 0 {
            self.token_failures.set(failures - 1);
            return Err(FetchError::Authentication("HTTP 401".to_string()));
        }
        Ok(AccessToken::new(&format!("token-{}", credentials.username)))
    }
}

impl ProductCatalog for FakeService {
    async fn resolve_id(&self, product_name: &str) -> Result<String, FetchError> {
        self.resolutions.borrow_mut().push(product_name.to_string());
        if self.products.contains_key(product_name) {
            Ok(format!("id-{product_name}"))
        } else {
            Err(FetchError::NotFound(product_name.to_string()))
        }
    }
}

impl Transfer for FakeService {
    async fn open(
        &self,
        token: &AccessToken,
        product_id: &str,
    ) -> Result<ProductStream, FetchError> {
        self.transfers.borrow_mut().push(product_id.to_string());
        assert!(token.value.starts_with("token-"));

        let name = product_id.trim_start_matches("id-");
        let data = self
            .products
            .get(name)
            .ok_or_else(|| FetchError::Transport("HTTP 404".to_string()))?
            .clone();
        let half = Bytes::from(data[..data.len() / 2].to_vec());
        let content_length = if self.unsized_products.borrow().contains(name) {
            None
        } else {
            Some(data.len() as u64)
        };

        let chunks: Vec<Result<Bytes, FetchError>> = match self.take_failure(name) {
            Some(Failure::Transport) => {
                return Err(FetchError::Transport("HTTP 503".to_string()));
            }
            Some(Failure::Interrupted) => vec![
                Ok(half),
                Err(FetchError::Transport("connection reset".to_string())),
            ],
            Some(Failure::Truncated) => vec![Ok(half)],
            None => data.chunks(4).map(|c| Ok(Bytes::copy_from_slice(c))).collect(),
        };

        Ok(ProductStream {
            content_length,
            body: futures_util::stream::iter(chunks).boxed(),
        })
    }
}
