use serde::{Deserialize, Serialize};

/// Represents a VAST document (Video Ad Serving Template)
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Vast {
    /// The VAST version (e.g., "2.0", "3.0", "4.0")
    pub version: String,

    /// The Ad elements within the VAST document
    pub ads: Vec<Ad>,
}

/// Represents an Ad within a VAST document
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Ad {
    /// The ad ID
    pub id: Option<String>,

    /// The ad sequence number (for ad pods)
    pub sequence: Option<u32>,

    /// The in-line ad details
    pub inline: Option<InLine>,

    /// The wrapper ad details
    pub wrapper: Option<Wrapper>,
}

/// Represents an InLine ad, which carries the media files and tracking URLs
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct InLine {
    /// The ad system name and version
    pub ad_system: AdSystem,

    /// The ad title
    pub ad_title: String,

    /// Impression tracking URLs
    pub impressions: Vec<Impression>,

    /// Error tracking URL
    pub error_url: Option<String>,

    /// Creative elements
    pub creatives: Vec<Creative>,
}

/// Represents a Wrapper ad, which references another VAST document
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Wrapper {
    /// The ad system name and version
    pub ad_system: AdSystem,

    /// The URL of the next VAST document in the chain
    pub vast_ad_tag_uri: String,

    /// Impression tracking URLs
    pub impressions: Vec<Impression>,

    /// Error tracking URL
    pub error_url: Option<String>,

    /// Creative elements
    pub creatives: Vec<Creative>,
}

/// Represents the ad system information
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AdSystem {
    /// The ad system name
    pub name: String,

    /// The ad system version
    pub version: Option<String>,
}

/// Represents an impression tracking URL
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Impression {
    /// The impression ID
    pub id: Option<String>,

    /// The impression tracking URL
    pub url: String,
}

/// Represents a creative element
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Creative {
    /// The creative ID
    pub id: Option<String>,

    /// The creative sequence number
    pub sequence: Option<u32>,

    /// The creative ad ID
    pub ad_id: Option<String>,

    /// Linear ad details
    pub linear: Option<Linear>,

    /// CompanionAds details
    pub companion_ads: Option<CompanionAds>,
}

/// Represents a linear (in-stream) ad
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Linear {
    /// The declared duration, "HH:MM:SS" or "HH:MM:SS.mmm"
    pub duration: Option<String>,

    /// Media files, in declaration order
    pub media_files: Vec<MediaFile>,

    /// Video clicks
    pub video_clicks: Option<VideoClicks>,

    /// Tracking events
    pub tracking_events: Vec<TrackingEvent>,
}

impl Linear {
    /// Declared duration in seconds, if present and well formed.
    pub fn duration_seconds(&self) -> Option<f64> {
        parse_duration(self.duration.as_deref()?)
    }
}

/// Parse a VAST duration string ("HH:MM:SS" or "HH:MM:SS.mmm") into seconds
pub fn parse_duration(value: &str) -> Option<f64> {
    let mut parts = value.split(':');
    let hours: f64 = parts.next()?.trim().parse().ok()?;
    let minutes: f64 = parts.next()?.trim().parse().ok()?;
    let seconds: f64 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Represents a media file
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct MediaFile {
    /// The media file URL
    pub url: String,

    /// The media file MIME type
    pub mime_type: String,

    /// The media file codec
    pub codec: Option<String>,

    /// The media file bitrate
    pub bitrate: Option<u32>,

    /// The media file width
    pub width: Option<u32>,

    /// The media file height
    pub height: Option<u32>,

    /// The media file delivery type (progressive or streaming)
    pub delivery: Option<String>,
}

/// Represents video click-through and click-tracking URLs
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct VideoClicks {
    /// The click-through URL
    pub click_through: Option<String>,

    /// Click tracking URLs
    pub click_tracking: Vec<String>,
}

/// Represents a tracking event
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TrackingEvent {
    /// The event type (e.g., "start", "firstQuartile", "midpoint", "complete")
    pub event: String,

    /// The tracking URL
    pub url: String,
}

/// Represents companion ads
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CompanionAds {
    /// The companion variations
    pub variations: Vec<CompanionVariation>,
}

/// Represents one companion ad variation
///
/// Width and height stay strings: variation selection compares them
/// character for character against the requested dimensions.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CompanionVariation {
    /// The companion ID
    pub id: Option<String>,

    /// The declared width
    pub width: String,

    /// The declared height
    pub height: String,

    /// The MIME type of the static resource
    pub mime_type: Option<String>,

    /// The static resource URL
    pub static_resource: Option<String>,

    /// The iframe resource URL
    pub iframe_resource: Option<String>,

    /// The HTML resource content
    pub html_resource: Option<String>,

    /// The companion click-through URL
    pub click_through: Option<String>,

    /// Companion tracking events
    pub tracking_events: Vec<TrackingEvent>,
}

/// One playback attempt's ad input: a tag URL to fetch, or ad data
/// supplied directly by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum AdRequest {
    Url(String),
    Document(Vast),
}

/// A source the host player can switch to
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct MediaSource {
    /// The source MIME type
    pub mime_type: String,

    /// The source URL
    pub url: String,
}

impl MediaSource {
    /// Build the ordered source list for a linear creative's media files.
    pub fn from_media_files(media_files: &[MediaFile]) -> Vec<MediaSource> {
        media_files
            .iter()
            .map(|media_file| MediaSource {
                mime_type: media_file.mime_type.clone(),
                url: media_file.url.clone(),
            })
            .collect()
    }
}

/// The outcome of ad resolution: everything a playback session needs
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct LinearAdSelection {
    /// ID of the selected ad
    pub ad_id: Option<String>,

    /// ID of the selected linear creative
    pub creative_id: Option<String>,

    /// Playable sources in declaration order; never empty
    pub media_sources: Vec<MediaSource>,

    /// Declared creative duration in seconds, when the document carries one
    pub duration: Option<f64>,

    /// Click-through destination declared by the linear creative
    pub click_through: Option<String>,

    /// Impression beacon URLs for the selected ad
    pub impressions: Vec<Impression>,

    /// Tracking event URLs declared by the linear creative
    pub tracking_events: Vec<TrackingEvent>,

    /// Error beacon URL for the selected ad
    pub error_url: Option<String>,

    /// Companion placement, when a variation matched the requested dimensions
    pub companion: Option<CompanionSelection>,
}

/// A companion ad resolved against the host's placement options
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct CompanionSelection {
    /// Host element the companion mounts into
    pub element_id: String,

    /// What to render there
    pub markup: CompanionMarkup,
}

/// Renderable content of a resolved companion variation
///
/// Only images render; script and flash variations are placement-only
/// hooks for the host.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub enum CompanionMarkup {
    Image {
        src: String,
        click_through: Option<String>,
    },
    Script {
        src: String,
    },
    Flash {
        src: String,
    },
}
