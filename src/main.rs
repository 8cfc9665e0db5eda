use anyhow::{bail, Context, Result};
use cdse_fetch::batch;
use cdse_fetch::copernicus::{Provider, DEFAULT_PAGE_SIZE};
use cdse_fetch::download::Downloader;
use cdse_fetch::job::{credentials_from_env, job_template, Job};
use cdse_fetch::product_list::ProductList;
use cdse_fetch::search::{self, DiscoveryOptions};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cdse-fetch", version, about = "Search and download Copernicus products")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search the catalog and write the matching product names
    Search {
        job: PathBuf,
        #[arg(short, long, default_value = "products.json")]
        output: PathBuf,
    },
    /// Download every product of a product list
    Download {
        job: PathBuf,
        #[arg(short, long, default_value = "products.json")]
        products: PathBuf,
    },
    /// Search, then download everything found
    Run { job: PathBuf },
    /// Write an example job file
    Template {
        #[arg(default_value = "job.toml")]
        output: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn provider_for(job: &Job) -> Provider {
    Provider::new(reqwest::Client::new())
        .with_collection(job.search.collection.clone())
        .with_page_size(job.search.page_size.unwrap_or(DEFAULT_PAGE_SIZE))
}

async fn find_products(provider: &Provider, job: &Job) -> Result<ProductList> {
    let window = job.window()?;
    let bbox = job.bbox()?;
    info!(area = %bbox.to_wkt(), start = %window.start, end = %window.end, "Searching catalog");
    let options = DiscoveryOptions {
        deduplicate: job.search.deduplicate,
    };
    let names = search::discover(
        provider,
        window,
        &bbox,
        &job.search.product_type,
        &options,
    )
    .await
    .context("Product search failed")?;
    Ok(ProductList::new(names))
}

async fn download_products(provider: &Provider, job: &Job, list: &ProductList) -> Result<()> {
    let credentials = credentials_from_env()?;
    let downloader = Downloader::new(provider)
        .with_retry_policy(job.retry_policy()?)
        .with_progress(job.download.progress);

    let summary = batch::run(
        &downloader,
        &credentials,
        &list.products,
        &job.download.output_dir,
    )
    .await;

    if !summary.is_success() {
        bail!(
            "{} of {} products failed: {}",
            summary.failed.len(),
            list.len(),
            summary.failed.join(", ")
        );
    }
    Ok(())
}

fn read_job(path: &Path) -> Result<Job> {
    Job::read(path).with_context(|| format!("Unable to read job file {path:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Search { job, output } => {
            let job = read_job(&job)?;
            let provider = provider_for(&job);
            let list = find_products(&provider, &job).await?;
            list.write(&output)?;
            info!(products = list.len(), path = ?output, "Product list written");
        }
        Command::Download { job, products } => {
            let job = read_job(&job)?;
            let provider = provider_for(&job);
            let list = ProductList::read(&products)
                .with_context(|| format!("Unable to read product list {products:?}"))?;
            download_products(&provider, &job, &list).await?;
        }
        Command::Run { job } => {
            let job = read_job(&job)?;
            let provider = provider_for(&job);
            let list = find_products(&provider, &job).await?;
            list.write(job.download.output_dir.join("products.json"))?;
            if list.is_empty() {
                info!("No products found, nothing to download");
                return Ok(());
            }
            download_products(&provider, &job, &list).await?;
        }
        Command::Template { output } => {
            if output.exists() {
                bail!("{output:?} already exists");
            }
            Job::from_template(&job_template())?.write(&output)?;
            info!(path = ?output, "Job template written");
        }
    }

    Ok(())
}
