pub mod config;
pub mod error;
pub mod events;
pub mod fetch;
pub mod models;
pub mod parser;
pub mod player;
pub mod resolver;
pub mod session;
pub mod tracker;

mod bridge;

pub mod async_api {
    use crate::config::AdsOptions;
    use crate::error::Result;
    use crate::fetch::FetchOptions;
    use crate::models::{AdRequest, LinearAdSelection, Vast};

    pub async fn parse_vast(xml: &str) -> Result<Vast> {
        // Parsing is CPU-bound, so we can just wrap the sync version
        crate::parser::parse_vast(xml)
    }

    pub async fn fetch_document(input: &str, options: &AdsOptions) -> Result<Vast> {
        crate::fetch::fetch_document(input, &FetchOptions::from(options)).await
    }

    pub async fn resolve(request: &AdRequest, options: &AdsOptions) -> Result<LinearAdSelection> {
        crate::resolver::resolve(request, options).await
    }
}
