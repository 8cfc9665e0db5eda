#![allow(async_fn_in_trait)]
pub mod batch;
pub mod copernicus;
pub mod download;
pub mod error;
pub mod geo;
pub mod job;
pub mod product_list;
pub mod progress;
pub mod search;

#[cfg(test)]
mod testing;
