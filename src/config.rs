use crate::models::{AdRequest, Vast};
use serde::{Deserialize, Serialize};

/// Per-session ad configuration.
///
/// Built once per playback attempt and passed by reference into the
/// session controller; there are no process-wide mutable defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdsOptions {
    /// Ad tag endpoint to fetch
    #[serde(default)]
    pub url: Option<String>,

    /// Pre-fetched ad data, the mutually exclusive alternative to `url`
    #[serde(default)]
    pub document: Option<Vast>,

    /// Leave seeking enabled while the ad plays
    #[serde(default)]
    pub seek_enabled: bool,

    /// Leave the control bar enabled while the ad plays
    #[serde(default)]
    pub controls_enabled: bool,

    /// Maximum number of wrapper hops to follow
    #[serde(default = "default_wrapper_depth_limit")]
    pub wrapper_depth_limit: usize,

    /// Forward credentials (cookie jar) with ad server requests
    #[serde(default = "default_with_credentials")]
    pub with_credentials: bool,

    /// Seconds of playback before the ad becomes skippable; None
    /// disables the skip button
    #[serde(default)]
    pub skip_offset_seconds: Option<f64>,

    /// Companion ad placement
    #[serde(default)]
    pub companion: Option<CompanionOptions>,
}

/// Where and at what size a companion ad may render
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompanionOptions {
    /// Host element the companion mounts into
    pub element_id: String,

    /// Requested companion width
    pub max_width: u32,

    /// Requested companion height
    pub max_height: u32,
}

fn default_wrapper_depth_limit() -> usize {
    10
}

fn default_with_credentials() -> bool {
    true
}

impl Default for AdsOptions {
    fn default() -> Self {
        AdsOptions {
            url: None,
            document: None,
            seek_enabled: false,
            controls_enabled: false,
            wrapper_depth_limit: default_wrapper_depth_limit(),
            with_credentials: default_with_credentials(),
            skip_offset_seconds: None,
            companion: None,
        }
    }
}

impl AdsOptions {
    /// The ad input for one playback attempt; a tag URL wins over an
    /// inline document when both are configured.
    pub fn request(&self) -> Option<AdRequest> {
        if let Some(url) = &self.url {
            Some(AdRequest::Url(url.clone()))
        } else {
            self.document.clone().map(AdRequest::Document)
        }
    }
}
