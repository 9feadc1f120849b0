use std::time::Duration;

use http::{Method, StatusCode};
use sessionflow_cache::CacheConfigBuilder;
use sessionflow_response::ResponseBuilder;
use url::Url;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("sessionflow cache example");
    println!("=========================\n");

    let config = CacheConfigBuilder::new("example")
        .ttl(Duration::from_secs(2))
        .on_hit(|key| println!("  [EVENT] cache HIT for {key}"))
        .on_miss(|key| println!("  [EVENT] cache MISS for {key}"))
        .build()?;

    let cache = sessionflow_cache::Cache::new(config).await?;

    let url = Url::parse("https://example.com/widgets")?;
    let response = ResponseBuilder::new(StatusCode::OK, Method::GET, url.clone())
        .content("{\"widgets\": 3}")
        .build();

    println!("first lookup (expect miss):");
    assert!(cache.get(url.as_str()).await?.is_none());

    cache.set(url.as_str(), &response).await?;

    println!("second lookup (expect hit):");
    let hit = cache.get(url.as_str()).await?.expect("just stored");
    println!("  body: {}", hit.text());
    assert!(hit.is_cached);

    println!("\nwaiting for TTL to expire...");
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(cache.get(url.as_str()).await?.is_none());
    println!("  entry expired as expected");

    Ok(())
}
