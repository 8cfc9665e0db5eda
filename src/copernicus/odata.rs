//! OData filter expressions and response bodies for the CDSE catalog.
use crate::search::{format_date, ProductRecord, SearchQuery};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct TokenResponse {
    pub access_token: String,
}

#[derive(Deserialize, Debug)]
pub struct ProductPage {
    pub value: Vec<ODataProduct>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct ODataProduct {
    pub id: String,
    pub name: String,
    pub content_date: Option<ContentDate>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct ContentDate {
    pub start: String,
}

impl ODataProduct {
    pub fn into_record(self) -> Option<ProductRecord> {
        let date = self.content_date?.start;
        Some(ProductRecord {
            name: self.name,
            acquisition_date: date,
        })
    }
}

/// OData string literals escape a single quote by doubling it.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn name_filter(product_name: &str) -> String {
    format!("Name eq {}", quote(product_name))
}

pub fn search_filter(query: &SearchQuery<'_>, collection: Option<&str>) -> String {
    let mut clauses: Vec<String> = vec![];

    if let Some(collection) = collection {
        clauses.push(format!("Collection/Name eq {}", quote(collection)));
    }
    if !query.product_type.is_empty() {
        clauses.push(format!(
            "Attributes/OData.CSC.StringAttribute/any(att:att/Name eq 'productType' and att/OData.CSC.StringAttribute/Value eq {})",
            quote(query.product_type)
        ));
    }
    clauses.push(format!(
        "OData.CSC.Intersects(area=geography'SRID=4326;{}')",
        query.bbox.to_wkt()
    ));
    clauses.push(format!(
        "ContentDate/Start ge {}T00:00:00.000Z",
        format_date(query.start)
    ));
    clauses.push(format!(
        "ContentDate/Start lt {}T00:00:00.000Z",
        format_date(query.end)
    ));

    clauses.join(" and ")
}
