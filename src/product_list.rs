use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Product names found by a search, persisted between the search and download steps.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ProductList {
    pub products: Vec<String>,
}

impl ProductList {
    pub fn new(products: Vec<String>) -> Self {
        Self { products }
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let list: Self = serde_json::from_str(&content)?;
        Ok(list)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
