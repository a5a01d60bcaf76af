//! Simple example of using scholar-proxy-pool.
//!
//! Looks up citation counts on the Crossref REST API through free proxies.

use async_trait::async_trait;
use scholar_proxy_pool::{
    format_outcome, Dispatcher, ProxyPool, ProxyPoolConfig, Publication, PublicationSource,
    SourceError,
};
use serde_json::Value;
use std::time::Duration;

const WORKS_URL: &str = "https://api.crossref.org/works";
const PROXY_LIST: &str =
    "https://cdn.jsdelivr.net/gh/proxifly/free-proxy-list@main/proxies/protocols/http/data.txt";

struct Crossref;

fn to_publication(work: &Value) -> Option<Publication> {
    Some(Publication {
        title: work["title"][0].as_str().unwrap_or_default().to_string(),
        handle: work["DOI"].as_str()?.to_string(),
        num_citations: work["is-referenced-by-count"].as_u64(),
    })
}

#[async_trait]
impl PublicationSource for Crossref {
    async fn search(
        &self,
        transport: &reqwest::Client,
        keyword: &str,
    ) -> Result<Option<Publication>, SourceError> {
        let body: Value = transport
            .get(WORKS_URL)
            .query(&[("query.bibliographic", keyword), ("rows", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body["message"]["items"].get(0).and_then(to_publication))
    }

    async fn fill(
        &self,
        transport: &reqwest::Client,
        publication: Publication,
    ) -> Result<Publication, SourceError> {
        let body: Value = transport
            .get(format!("{}/{}", WORKS_URL, publication.handle))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(to_publication(&body["message"]).unwrap_or(publication))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Initializing proxy pool...");

    let config = ProxyPoolConfig::builder()
        // plain `ip:port` lists, one proxy per line
        .sources(vec![PROXY_LIST])
        .target_count(5)
        .interval_range(Duration::from_secs(5), Duration::from_secs(15))
        .probe_url("https://httpbin.org/ip")
        .probe_concurrency(16)
        .build();

    let pool = ProxyPool::new(config.clone()).await?;
    pool.save("validated_proxies.txt")?;

    let dispatcher = Dispatcher::new(pool, Crossref, &config);

    let titles = [
        "Deep residual learning for image recognition",
        "Attention is all you need",
        "Adam: A method for stochastic optimization",
    ];
    for title in titles {
        let result = dispatcher.citation_count(title).await;
        println!("Title: {}", title);
        println!("Citation Count: {}", format_outcome(&result));
        println!("{}", "-".repeat(40));

        if matches!(&result, Err(e) if e.is_pool_exhausted()) {
            println!("Proxy pool exhausted, stopping.");
            break;
        }
    }

    Ok(())
}
