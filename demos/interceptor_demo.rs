//! Interceptor Demo Application
//!
//! Demonstrates single-flight sharing, multi-value replay, TTL expiry and
//! fail-open behaviour.
//!
//! Usage:
//!   cargo run --example interceptor_demo
//!
//! Environment variables:
//!   RUST_LOG                  - Log filter (default: info)
//!   ASYNC_CACHE_ENABLED       - Set to false to bypass caching (default: true)
//!   ASYNC_CACHE_AUTO_REGISTER - Create stores on first use (default: false)

use async_cacheable::{
    CacheInterceptor, CachePolicy, CacheRegistry, CacheSettings, CachedOperation, CallArgs,
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn fetch_profile(user_id: u64) -> anyhow::Result<String> {
    info!("  -> loading profile {} from the backend", user_id);
    tokio::time::sleep(Duration::from_millis(300)).await;
    Ok(format!("profile-{}", user_id))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("=== Single-Flight Cache Demo ===");

    let settings = CacheSettings::from_env()?;
    info!("Settings: {:?}", settings);

    let registry = Arc::new(CacheRegistry::new());
    let profiles = CachedOperation::single("profiles.fetch", CachePolicy::new("profiles", 1_000, 2));
    let timeline = CachedOperation::multi("timeline.recent", CachePolicy::new("timeline", 100, 60));
    registry.register(&profiles).await?;
    registry.register(&timeline).await?;

    let interceptor = Arc::new(CacheInterceptor::with_settings(registry, settings));

    info!("\n--- Concurrent callers ---");
    let started = Instant::now();
    let callers: Vec<_> = (0..5)
        .map(|_| {
            let interceptor = interceptor.clone();
            let profiles = profiles.clone();
            tokio::spawn(async move {
                interceptor
                    .single(&profiles, &CallArgs::new().arg(42), || fetch_profile(42))
                    .await
            })
        })
        .collect();
    for caller in futures::future::join_all(callers).await {
        info!("✓ got {}", caller??);
    }
    info!("Five callers served in {:?}", started.elapsed());

    info!("\n--- Multi-value replay ---");
    for round in 1..=2 {
        let mut replay = interceptor
            .multi(&timeline, &CallArgs::new().arg("home"), || {
                info!("  -> streaming timeline from the backend");
                futures::stream::iter(vec!["post-1", "post-2", "post-3"])
                    .map(|post| Ok::<_, anyhow::Error>(post.to_string()))
            })
            .await?;
        while let Some(post) = replay.next().await {
            info!("round {}: {}", round, post);
        }
    }

    info!("\n--- TTL expiry ---");
    tokio::time::sleep(Duration::from_millis(2_200)).await;
    let refreshed = interceptor
        .single(&profiles, &CallArgs::new().arg(42), || fetch_profile(42))
        .await?;
    info!("✓ after expiry: {}", refreshed);

    info!("\n--- Unregistered operation ---");
    let stray = CachedOperation::single("profiles.audit", CachePolicy::new("audit", 10, 60));
    for _ in 0..2 {
        interceptor
            .single(&stray, &CallArgs::new().arg(7), || fetch_profile(7))
            .await?;
    }

    info!("\nStats: {}", interceptor.stats());
    Ok(())
}
