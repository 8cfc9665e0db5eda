//! Copernicus Data Space Ecosystem (CDSE) endpoints.
mod odata;
mod provider;
pub use provider::{Endpoints, Provider};

pub const TOKEN_URL: &str =
    "https://identity.dataspace.copernicus.eu/auth/realms/CDSE/protocol/openid-connect/token";
pub const CATALOG_URL: &str = "https://catalogue.dataspace.copernicus.eu/odata/v1/Products";
pub const DOWNLOAD_URL: &str = "https://zipper.dataspace.copernicus.eu/odata/v1/Products";

/// Public OpenID client used for password grants.
pub const CLIENT_ID: &str = "cdse-public";

pub const DEFAULT_PAGE_SIZE: u32 = 1000;
