use async_trait::async_trait;
use reqwest::{Request, Response};

/// Minimal HTTP execution seam so extract fetching can be exercised without
/// a live endpoint.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
