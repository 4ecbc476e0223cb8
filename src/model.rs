use base64::Engine as _;

use crate::error::{KosmaError, KosmaResult};

/// The business-card record edited, previewed, and exported.
///
/// `photo` and `logo` are optional `data:image/...;base64,` URIs supplied by
/// the editing surface; they are never validated beyond being decodable as an
/// image at draw time.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Card {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default)]
    pub socials: Vec<SocialLink>,
    #[serde(default)]
    pub style: CardStyle,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SocialLink {
    pub platform: Platform,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub label: String,
}

/// Fixed platform set plus a free-text escape hatch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    X,
    LinkedIn,
    GitHub,
    Facebook,
    TikTok,
    YouTube,
    Website,
    Other(String),
}

impl Platform {
    /// Label used on the rendered social block and in vCard `type=` params.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Instagram => "Instagram",
            Self::X => "X",
            Self::LinkedIn => "LinkedIn",
            Self::GitHub => "GitHub",
            Self::Facebook => "Facebook",
            Self::TikTok => "TikTok",
            Self::YouTube => "YouTube",
            Self::Website => "Website",
            Self::Other(name) => name,
        }
    }
}

/// Template variant. Unknown or absent values deserialize to `Kosma`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase", from = "StyleRepr")]
pub enum CardStyle {
    #[default]
    Kosma,
    Techno,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum StyleRepr {
    Known(KnownStyle),
    Unknown(serde_json::Value),
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "lowercase")]
enum KnownStyle {
    Kosma,
    Techno,
}

impl From<StyleRepr> for CardStyle {
    fn from(repr: StyleRepr) -> Self {
        match repr {
            StyleRepr::Known(KnownStyle::Kosma) => CardStyle::Kosma,
            StyleRepr::Known(KnownStyle::Techno) => CardStyle::Techno,
            StyleRepr::Unknown(_) => CardStyle::Kosma,
        }
    }
}

impl CardStyle {
    pub const ALL: [CardStyle; 2] = [CardStyle::Kosma, CardStyle::Techno];

    pub fn key(self) -> &'static str {
        match self {
            Self::Kosma => "kosma",
            Self::Techno => "techno",
        }
    }

    /// Next style in display order, wrapping. Drives the swipe gesture.
    pub fn next(self) -> Self {
        match self {
            Self::Kosma => Self::Techno,
            Self::Techno => Self::Kosma,
        }
    }

    pub fn prev(self) -> Self {
        // Two styles, so prev == next; kept separate for when the set grows.
        self.next()
    }
}

impl Default for Card {
    fn default() -> Self {
        Self::empty()
    }
}

impl Card {
    /// Empty skeleton the guided editing flow mutates field by field.
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            title: String::new(),
            company: String::new(),
            phone: String::new(),
            email: String::new(),
            website: String::new(),
            address: String::new(),
            photo: None,
            logo: None,
            socials: Vec::new(),
            style: CardStyle::Kosma,
        }
    }

    /// Guided-picker upsert: at most one entry per platform through this
    /// path. Direct construction of `socials` may still carry duplicates and
    /// every consumer tolerates that.
    pub fn set_social(&mut self, link: SocialLink) {
        match self
            .socials
            .iter_mut()
            .find(|s| s.platform == link.platform)
        {
            Some(existing) => *existing = link,
            None => self.socials.push(link),
        }
    }

    pub fn remove_social(&mut self, platform: &Platform) {
        self.socials.retain(|s| &s.platform != platform);
    }
}

/// Decoded raster payload of a `data:` URI.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Straight-alpha RGBA8, row-major.
    pub rgba8: Vec<u8>,
}

/// Decode a `data:image/...;base64,` URI into RGBA8 pixels.
///
/// Renderers call this lazily and fall back to the glyph path on error, so
/// failures here are decode errors rather than panics.
pub fn decode_data_uri(uri: &str) -> KosmaResult<DecodedImage> {
    let comma = uri
        .find(',')
        .ok_or_else(|| KosmaError::decode("data URI has no comma separator"))?;
    let (header, payload) = uri.split_at(comma);
    if !header.starts_with("data:image/") || !header.ends_with(";base64") {
        return Err(KosmaError::decode(format!(
            "unsupported data URI header '{header}'"
        )));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload[1..].trim())
        .map_err(|e| KosmaError::decode(format!("data URI base64: {e}")))?;

    let img = image::load_from_memory(&bytes)
        .map_err(|e| KosmaError::decode(format!("data URI image decode: {e}")))?
        .to_rgba8();

    Ok(DecodedImage {
        width: img.width(),
        height: img.height(),
        rgba8: img.into_raw(),
    })
}
