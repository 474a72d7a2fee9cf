use crate::error::{AdError, Result};
use crate::models::*;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::str::from_utf8;

/// Parse a VAST XML string into a Vast struct
pub fn parse_vast(xml: &str) -> Result<Vast> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut vast = Vast {
        version: String::new(),
        ads: Vec::new(),
    };

    // Look for the VAST element
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"VAST" => {
                if let Some(version) = attr_value(e, b"version") {
                    vast.version = version;
                }

                if vast.version.is_empty() {
                    return Err(AdError::MissingField("VAST version".to_string()));
                }

                vast.ads = parse_ads(&mut reader)?;
                break;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(AdError::XmlParse(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(vast)
}

/// Read one attribute of an element as an owned string
fn attr_value(start: &BytesStart, key: &[u8]) -> Option<String> {
    for attr in start.attributes().flatten() {
        if attr.key.as_ref() == key {
            if let Ok(value) = from_utf8(&attr.value) {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Parse Ad elements from the VAST XML
fn parse_ads(reader: &mut Reader<&[u8]>) -> Result<Vec<Ad>> {
    let mut ads = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Ad" => {
                let ad = parse_ad_element(reader, e)?;
                ads.push(ad);
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"VAST" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(AdError::XmlParse(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(ads)
}

/// Parse a single Ad element
fn parse_ad_element(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<Ad> {
    let mut ad = Ad {
        id: attr_value(start, b"id"),
        sequence: attr_value(start, b"sequence").and_then(|s| s.parse().ok()),
        inline: None,
        wrapper: None,
    };

    let mut buf = Vec::new();

    // Parse InLine or Wrapper
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"InLine" => {
                    ad.inline = Some(parse_inline_element(reader)?);
                }
                b"Wrapper" => {
                    ad.wrapper = Some(parse_wrapper_element(reader)?);
                }
                _ => {
                    skip_element(reader, e.name().as_ref())?;
                }
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Ad" => break,
            Ok(Event::Eof) => {
                return Err(AdError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(AdError::XmlParse(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(ad)
}

/// Parse an InLine element
fn parse_inline_element(reader: &mut Reader<&[u8]>) -> Result<InLine> {
    let mut inline = InLine {
        ad_system: AdSystem {
            name: String::new(),
            version: None,
        },
        ad_title: String::new(),
        impressions: Vec::new(),
        error_url: None,
        creatives: Vec::new(),
    };

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"AdSystem" => {
                    inline.ad_system = parse_ad_system(reader, e)?;
                }
                b"AdTitle" => {
                    inline.ad_title = read_text_element(reader)?;
                }
                b"Impression" => {
                    let impression = parse_impression(reader, e)?;
                    inline.impressions.push(impression);
                }
                b"Error" => {
                    inline.error_url = Some(read_text_element(reader)?);
                }
                b"Creatives" => {
                    inline.creatives = parse_creatives(reader)?;
                }
                _ => {
                    skip_element(reader, e.name().as_ref())?;
                }
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"InLine" => break,
            Ok(Event::Eof) => {
                return Err(AdError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(AdError::XmlParse(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(inline)
}

/// Parse a Wrapper element
fn parse_wrapper_element(reader: &mut Reader<&[u8]>) -> Result<Wrapper> {
    let mut wrapper = Wrapper {
        ad_system: AdSystem {
            name: String::new(),
            version: None,
        },
        vast_ad_tag_uri: String::new(),
        impressions: Vec::new(),
        error_url: None,
        creatives: Vec::new(),
    };

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"AdSystem" => {
                    wrapper.ad_system = parse_ad_system(reader, e)?;
                }
                b"VASTAdTagURI" => {
                    wrapper.vast_ad_tag_uri = read_text_element(reader)?;
                }
                b"Impression" => {
                    let impression = parse_impression(reader, e)?;
                    wrapper.impressions.push(impression);
                }
                b"Error" => {
                    wrapper.error_url = Some(read_text_element(reader)?);
                }
                b"Creatives" => {
                    wrapper.creatives = parse_creatives(reader)?;
                }
                _ => {
                    skip_element(reader, e.name().as_ref())?;
                }
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Wrapper" => break,
            Ok(Event::Eof) => {
                return Err(AdError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(AdError::XmlParse(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(wrapper)
}

/// Helper function to read the text content of an XML element
fn read_text_element(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(e)) => {
                text = e.unescape()?.into_owned();
            }
            Ok(Event::CData(e)) => {
                if let Ok(value) = from_utf8(&e) {
                    text = value.trim().to_string();
                }
            }
            Ok(Event::End(_)) => break,
            Ok(Event::Eof) => {
                return Err(AdError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(AdError::XmlParse(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(text)
}

/// Helper function to skip an XML element and all its children
///
/// The reader sits just past the element's Start event when this is
/// called; it returns just past the matching End event.
fn skip_element(reader: &mut Reader<&[u8]>, name: &[u8]) -> Result<()> {
    let mut buf = Vec::new();
    let mut depth = 1usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(ref e)) => {
                depth -= 1;
                if depth == 0 {
                    if e.name().as_ref() != name {
                        return Err(AdError::Other(format!(
                            "Mismatched closing tag while skipping {}",
                            String::from_utf8_lossy(name)
                        )));
                    }
                    break;
                }
            }
            Ok(Event::Eof) => {
                return Err(AdError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(AdError::XmlParse(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(())
}

/// Parse AdSystem element
fn parse_ad_system(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<AdSystem> {
    let mut ad_system = AdSystem {
        name: String::new(),
        version: attr_value(start, b"version"),
    };

    ad_system.name = read_text_element(reader)?;

    Ok(ad_system)
}

/// Parse Impression element
fn parse_impression(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<Impression> {
    let mut impression = Impression {
        id: attr_value(start, b"id"),
        url: String::new(),
    };

    impression.url = read_text_element(reader)?;

    Ok(impression)
}

/// Parse Creatives element
fn parse_creatives(reader: &mut Reader<&[u8]>) -> Result<Vec<Creative>> {
    let mut creatives = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Creative" => {
                let creative = parse_creative(reader, e)?;
                creatives.push(creative);
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Creatives" => break,
            Ok(Event::Eof) => {
                return Err(AdError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(AdError::XmlParse(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(creatives)
}

/// Parse Creative element
fn parse_creative(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<Creative> {
    let mut creative = Creative {
        id: attr_value(start, b"id"),
        sequence: attr_value(start, b"sequence").and_then(|s| s.parse().ok()),
        ad_id: attr_value(start, b"adId"),
        linear: None,
        companion_ads: None,
    };

    let mut buf = Vec::new();

    // Parse Linear or CompanionAds; anything else is skipped
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"Linear" => {
                    creative.linear = Some(parse_linear(reader)?);
                }
                b"CompanionAds" => {
                    creative.companion_ads = Some(parse_companion_ads(reader)?);
                }
                _ => {
                    skip_element(reader, e.name().as_ref())?;
                }
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Creative" => break,
            Ok(Event::Eof) => {
                return Err(AdError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(AdError::XmlParse(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(creative)
}

/// Parse Linear element
fn parse_linear(reader: &mut Reader<&[u8]>) -> Result<Linear> {
    let mut linear = Linear {
        duration: None,
        media_files: Vec::new(),
        video_clicks: None,
        tracking_events: Vec::new(),
    };

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"Duration" => {
                    linear.duration = Some(read_text_element(reader)?);
                }
                b"MediaFiles" => {
                    linear.media_files = parse_media_files(reader)?;
                }
                b"VideoClicks" => {
                    linear.video_clicks = Some(parse_video_clicks(reader)?);
                }
                b"TrackingEvents" => {
                    linear.tracking_events = parse_tracking_events(reader)?;
                }
                _ => {
                    skip_element(reader, e.name().as_ref())?;
                }
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Linear" => break,
            Ok(Event::Eof) => {
                return Err(AdError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(AdError::XmlParse(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(linear)
}

/// Parse MediaFiles element
fn parse_media_files(reader: &mut Reader<&[u8]>) -> Result<Vec<MediaFile>> {
    let mut media_files = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"MediaFile" => {
                let media_file = parse_media_file(reader, e)?;
                media_files.push(media_file);
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"MediaFiles" => break,
            Ok(Event::Eof) => {
                return Err(AdError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(AdError::XmlParse(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(media_files)
}

/// Parse MediaFile element
fn parse_media_file(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<MediaFile> {
    let mut media_file = MediaFile {
        url: String::new(),
        mime_type: attr_value(start, b"type").unwrap_or_default(),
        codec: attr_value(start, b"codec"),
        bitrate: attr_value(start, b"bitrate").and_then(|s| s.parse().ok()),
        width: attr_value(start, b"width").and_then(|s| s.parse().ok()),
        height: attr_value(start, b"height").and_then(|s| s.parse().ok()),
        delivery: attr_value(start, b"delivery"),
    };

    media_file.url = read_text_element(reader)?;

    Ok(media_file)
}

/// Parse VideoClicks element
fn parse_video_clicks(reader: &mut Reader<&[u8]>) -> Result<VideoClicks> {
    let mut video_clicks = VideoClicks {
        click_through: None,
        click_tracking: Vec::new(),
    };

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"ClickThrough" => {
                    video_clicks.click_through = Some(read_text_element(reader)?);
                }
                b"ClickTracking" => {
                    video_clicks.click_tracking.push(read_text_element(reader)?);
                }
                _ => {
                    skip_element(reader, e.name().as_ref())?;
                }
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"VideoClicks" => break,
            Ok(Event::Eof) => {
                return Err(AdError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(AdError::XmlParse(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(video_clicks)
}

/// Parse TrackingEvents element
fn parse_tracking_events(reader: &mut Reader<&[u8]>) -> Result<Vec<TrackingEvent>> {
    let mut tracking_events = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Tracking" => {
                let tracking_event = parse_tracking_event(reader, e)?;
                tracking_events.push(tracking_event);
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"TrackingEvents" => break,
            Ok(Event::Eof) => {
                return Err(AdError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(AdError::XmlParse(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(tracking_events)
}

/// Parse Tracking element
fn parse_tracking_event(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<TrackingEvent> {
    let mut tracking_event = TrackingEvent {
        event: attr_value(start, b"event").unwrap_or_default(),
        url: String::new(),
    };

    tracking_event.url = read_text_element(reader)?;

    Ok(tracking_event)
}

/// Parse CompanionAds element
fn parse_companion_ads(reader: &mut Reader<&[u8]>) -> Result<CompanionAds> {
    let mut companion_ads = CompanionAds {
        variations: Vec::new(),
    };

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Companion" => {
                let variation = parse_companion(reader, e)?;
                companion_ads.variations.push(variation);
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"CompanionAds" => break,
            Ok(Event::Eof) => {
                return Err(AdError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(AdError::XmlParse(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(companion_ads)
}

/// Parse Companion element
///
/// Width and height attributes are kept verbatim; selection against the
/// host's requested dimensions is string-exact.
fn parse_companion(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<CompanionVariation> {
    let mut variation = CompanionVariation {
        id: attr_value(start, b"id"),
        width: attr_value(start, b"width").unwrap_or_default(),
        height: attr_value(start, b"height").unwrap_or_default(),
        mime_type: None,
        static_resource: None,
        iframe_resource: None,
        html_resource: None,
        click_through: None,
        tracking_events: Vec::new(),
    };

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"StaticResource" => {
                    variation.mime_type = attr_value(e, b"creativeType");
                    variation.static_resource = Some(read_text_element(reader)?);
                }
                b"IFrameResource" => {
                    variation.iframe_resource = Some(read_text_element(reader)?);
                }
                b"HTMLResource" => {
                    variation.html_resource = Some(read_text_element(reader)?);
                }
                b"CompanionClickThrough" => {
                    variation.click_through = Some(read_text_element(reader)?);
                }
                b"TrackingEvents" => {
                    variation.tracking_events = parse_tracking_events(reader)?;
                }
                _ => {
                    skip_element(reader, e.name().as_ref())?;
                }
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Companion" => break,
            Ok(Event::Eof) => {
                return Err(AdError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(AdError::XmlParse(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(variation)
}
