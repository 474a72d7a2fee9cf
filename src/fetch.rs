use crate::config::AdsOptions;
use crate::error::{AdError, Result};
use crate::models::Vast;
use crate::parser;
use log::{debug, warn};
use rand::distributions::Alphanumeric;
use rand::{Rng, thread_rng};
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::Path;

/// Transport settings for ad tag fetches
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Forward the cookie jar with ad server requests
    pub with_credentials: bool,

    /// Maximum number of wrapper hops to follow
    pub wrapper_depth_limit: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            with_credentials: true,
            wrapper_depth_limit: 10,
        }
    }
}

impl From<&AdsOptions> for FetchOptions {
    fn from(options: &AdsOptions) -> Self {
        FetchOptions {
            with_credentials: options.with_credentials,
            wrapper_depth_limit: options.wrapper_depth_limit,
        }
    }
}

/// Fetch an ad tag and unwrap its wrapper chain into inline ads
pub async fn fetch_document(input: &str, options: &FetchOptions) -> Result<Vast> {
    let xml = fetch_content(input, options.with_credentials).await?;
    unwrap_chain(&xml, options).await
}

/// Follow wrapper references breadth-first until only inline ads remain.
///
/// Each wrapper hop increases the chain depth by one; hops past the
/// configured limit are not fetched. A URL appearing twice in the chain
/// is a cycle and its wrapper is skipped. A wrapper whose fetch fails is
/// skipped as well, so one dead branch does not sink sibling ads.
pub async fn unwrap_chain(xml: &str, options: &FetchOptions) -> Result<Vast> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    queue.push_back((xml.to_string(), 0));

    let mut version = String::new();
    let mut result_ads = Vec::new();
    let mut depth_exceeded = false;

    while let Some((current_xml, depth)) = queue.pop_front() {
        let vast = parser::parse_vast(&current_xml)?;
        if version.is_empty() {
            version = vast.version;
        }

        for ad in vast.ads {
            if ad.inline.is_some() {
                result_ads.push(ad);
                continue;
            }

            let Some(wrapper) = &ad.wrapper else {
                continue;
            };
            let uri = wrapper.vast_ad_tag_uri.clone();

            if !visited.insert(uri.clone()) {
                warn!("cycle detected in wrapper chain, skipping: {uri}");
                continue;
            }

            if depth + 1 > options.wrapper_depth_limit {
                warn!(
                    "wrapper depth limit of {} exceeded at {uri}",
                    options.wrapper_depth_limit
                );
                depth_exceeded = true;
                continue;
            }

            debug!("following wrapper: {uri}");
            match fetch_content(&uri, options.with_credentials).await {
                Ok(next_xml) => queue.push_back((next_xml, depth + 1)),
                Err(err) => {
                    warn!("failed to fetch wrapped VAST from {uri}: {err}");
                    continue;
                }
            }
        }
    }

    if result_ads.is_empty() && depth_exceeded {
        return Err(AdError::WrapperDepthExceeded(options.wrapper_depth_limit));
    }

    Ok(Vast {
        version,
        ads: result_ads,
    })
}

/// Fetch VAST content from a URL or file path
pub async fn fetch_content(input: &str, with_credentials: bool) -> Result<String> {
    // file:// URLs and plain paths read from disk; everything else is HTTP
    if let Some(path) = input.strip_prefix("file://") {
        #[cfg(target_os = "windows")]
        let path = path.trim_start_matches('/');

        debug!("reading from file: {path}");
        return fs::read_to_string(path).map_err(AdError::Io);
    }

    if Path::new(input).exists() {
        debug!("reading from local file: {input}");
        return fs::read_to_string(input).map_err(AdError::Io);
    }

    fetch_from_url(input, with_credentials).await
}

/// Fetch VAST XML from a URL
async fn fetch_from_url(url: &str, with_credentials: bool) -> Result<String> {
    // Random request ID to correlate log lines for one fetch
    let req_id: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();

    let url = url::Url::parse(url)?;

    debug!("[{req_id}] fetching ad tag: {url}");

    let start_time = std::time::Instant::now();

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(3))
        .cookie_store(with_credentials)
        .build()
        .map_err(|e| AdError::Other(format!("Failed to build HTTP client: {e}")))?;

    let response = client.get(url).send().await.map_err(|e| {
        warn!("[{req_id}] request failed after {:?}", start_time.elapsed());
        AdError::Http(format!("Failed to fetch URL: {e}"))
    })?;

    if !response.status().is_success() {
        return Err(AdError::Http(format!(
            "Failed to fetch URL: HTTP status {}",
            response.status()
        )));
    }

    let xml_content = response
        .text()
        .await
        .map_err(|e| AdError::Http(format!("Failed to read response body: {e}")))?;

    debug!(
        "[{req_id}] received {} bytes in {:?}",
        xml_content.len(),
        start_time.elapsed()
    );

    Ok(xml_content)
}
