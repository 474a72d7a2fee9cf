use crate::config::{AdsOptions, CompanionOptions};
use crate::error::{AdError, Result};
use crate::fetch::{self, FetchOptions};
use crate::models::*;
use log::debug;

/// MIME types the original plugin treats as script companions
const SCRIPT_MIME_TYPES: &[&str] = &[
    "application/x-javascript",
    "text/javascript",
    "application/javascript",
];

const FLASH_MIME_TYPE: &str = "application/x-shockwave-flash";

/// Resolve an ad request into the selection a playback session needs.
///
/// Only the URL variant suspends; a direct document resolves in place.
pub async fn resolve(request: &AdRequest, options: &AdsOptions) -> Result<LinearAdSelection> {
    match request {
        AdRequest::Document(document) => resolve_document(document, options),
        AdRequest::Url(url) => resolve_url(url, options).await,
    }
}

/// Fetch an ad tag, unwrap its wrapper chain, and resolve the result
pub async fn resolve_url(url: &str, options: &AdsOptions) -> Result<LinearAdSelection> {
    let document = fetch::fetch_document(url, &FetchOptions::from(options)).await?;
    resolve_document(&document, options)
}

/// Select the first ad carrying a linear creative, in document order.
///
/// Within that ad the first linear creative and the first companion
/// creative win; there is no further ranking.
pub fn resolve_document(document: &Vast, options: &AdsOptions) -> Result<LinearAdSelection> {
    let (ad, inline) = document
        .ads
        .iter()
        .filter_map(|ad| ad.inline.as_ref().map(|inline| (ad, inline)))
        .find(|(_, inline)| inline.creatives.iter().any(|c| c.linear.is_some()))
        .ok_or(AdError::NoLinearCreative)?;

    let (linear_creative, linear) = inline
        .creatives
        .iter()
        .find_map(|creative| creative.linear.as_ref().map(|linear| (creative, linear)))
        .ok_or(AdError::NoLinearCreative)?;

    let media_sources = MediaSource::from_media_files(&linear.media_files);
    if media_sources.is_empty() {
        return Err(AdError::NoMediaFiles);
    }

    let companion = options.companion.as_ref().and_then(|requested| {
        let companion_ads = inline
            .creatives
            .iter()
            .find_map(|creative| creative.companion_ads.as_ref())?;
        select_companion(companion_ads, requested)
    });

    debug!(
        "resolved ad {:?} with {} media source(s)",
        ad.id,
        media_sources.len()
    );

    Ok(LinearAdSelection {
        ad_id: ad.id.clone(),
        creative_id: linear_creative.id.clone(),
        media_sources,
        duration: linear.duration_seconds(),
        click_through: linear
            .video_clicks
            .as_ref()
            .and_then(|clicks| clicks.click_through.clone()),
        impressions: inline.impressions.clone(),
        tracking_events: linear.tracking_events.clone(),
        error_url: inline.error_url.clone(),
        companion,
    })
}

/// Match a companion variation against the requested placement.
///
/// Dimensions compare as strings against the decimal rendering of the
/// requested maximums: "300" matches 300, but "300px" or " 300" do not.
/// Exact string equality is load-bearing compatibility behavior; do not
/// relax it to numeric matching.
fn select_companion(
    companion_ads: &CompanionAds,
    requested: &CompanionOptions,
) -> Option<CompanionSelection> {
    let width = requested.max_width.to_string();
    let height = requested.max_height.to_string();

    let variation = companion_ads
        .variations
        .iter()
        .find(|v| v.width == width && v.height == height)?;

    let markup = classify_variation(variation)?;
    Some(CompanionSelection {
        element_id: requested.element_id.clone(),
        markup,
    })
}

/// Classify a variation's static resource by declared MIME type.
///
/// Script and flash variations carry no markup of their own; placement
/// is left to the host.
fn classify_variation(variation: &CompanionVariation) -> Option<CompanionMarkup> {
    let src = variation.static_resource.clone()?;
    let mime_type = variation.mime_type.as_deref()?;

    if mime_type.starts_with("image") {
        Some(CompanionMarkup::Image {
            src,
            click_through: variation.click_through.clone(),
        })
    } else if SCRIPT_MIME_TYPES.contains(&mime_type) {
        Some(CompanionMarkup::Script { src })
    } else if mime_type == FLASH_MIME_TYPE {
        Some(CompanionMarkup::Flash { src })
    } else {
        None
    }
}
