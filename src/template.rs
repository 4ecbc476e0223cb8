//! Template resolution: maps a possibly-incomplete [`Card`] to the named
//! regions of both card faces. Pure and deterministic; every raster backend
//! consumes this one output so the previews and the export cannot drift.

use crate::model::{Card, CardStyle, Platform, SocialLink};

pub const PLACEHOLDER_NAME: &str = "Your Name";
pub const PLACEHOLDER_TITLE: &str = "Your Title";
pub const PLACEHOLDER_COMPANY: &str = "Your Company";
pub const MISSING_CONTACT: &str = "Not provided";
/// Identity glyph when the card has no name to derive one from.
pub const FALLBACK_GLYPH: char = 'K';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceSide {
    Front,
    Back,
}

/// Resolved two-face layout for one card in one style.
#[derive(Clone, Debug, PartialEq)]
pub struct CardLayout {
    pub style: CardStyle,
    pub front: Face,
    pub back: Face,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Face {
    pub regions: Vec<Region>,
}

/// A named placement slot within a template face.
#[derive(Clone, Debug, PartialEq)]
pub enum Region {
    /// Company banner along the top edge.
    Header { company: String },
    /// Central mark: uploaded logo, else a single derived glyph.
    IdentityMark(IdentityMark),
    /// Headline name plus title line.
    NameTitle { name: String, title: String },
    /// Always exactly four rows, in phone/email/website/address order.
    ContactBlock { rows: [ContactRow; 4] },
    /// Present only when the card has social links; insertion order.
    SocialBlock { entries: Vec<SocialEntry> },
    /// Back-face decoration: template color swatches.
    BackDecor { swatches: Vec<Rgba> },
}

#[derive(Clone, Debug, PartialEq)]
pub enum IdentityMark {
    Logo { data_uri: String },
    Glyph { ch: char },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContactRow {
    pub label: &'static str,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SocialEntry {
    pub platform_name: String,
    pub label: String,
    pub url: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

/// Visual identity of one template variant. Both previews and the export
/// read colors and font stacks from here only.
#[derive(Clone, Debug)]
pub struct Theme {
    pub face_bg: Rgba,
    pub face_bg_back: Rgba,
    pub accent: Rgba,
    pub text_primary: Rgba,
    pub text_secondary: Rgba,
    pub emboss_dark: Rgba,
    pub emboss_light: Rgba,
    pub swatches: [Rgba; 3],
    /// Generic CSS-style family stack handed to the text engine.
    pub font_stack: &'static str,
}

impl Theme {
    pub fn for_style(style: CardStyle) -> &'static Theme {
        match style {
            CardStyle::Kosma => &KOSMA_THEME,
            CardStyle::Techno => &TECHNO_THEME,
        }
    }
}

static KOSMA_THEME: Theme = Theme {
    face_bg: Rgba::rgb(24, 22, 34),
    face_bg_back: Rgba::rgb(18, 16, 26),
    accent: Rgba::rgb(212, 175, 55),
    text_primary: Rgba::rgb(242, 238, 228),
    text_secondary: Rgba::rgb(168, 162, 150),
    emboss_dark: Rgba::rgb(8, 7, 12).with_alpha(160),
    emboss_light: Rgba::rgb(255, 250, 235).with_alpha(90),
    swatches: [
        Rgba::rgb(212, 175, 55),
        Rgba::rgb(242, 238, 228),
        Rgba::rgb(68, 60, 90),
    ],
    font_stack: "Georgia, serif",
};

static TECHNO_THEME: Theme = Theme {
    face_bg: Rgba::rgb(10, 14, 18),
    face_bg_back: Rgba::rgb(6, 9, 12),
    accent: Rgba::rgb(0, 212, 170),
    text_primary: Rgba::rgb(224, 244, 240),
    text_secondary: Rgba::rgb(110, 138, 132),
    emboss_dark: Rgba::rgb(0, 4, 6).with_alpha(170),
    emboss_light: Rgba::rgb(180, 255, 240).with_alpha(80),
    swatches: [
        Rgba::rgb(0, 212, 170),
        Rgba::rgb(224, 244, 240),
        Rgba::rgb(28, 44, 52),
    ],
    font_stack: "monospace",
};

fn or_placeholder(value: &str, placeholder: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        placeholder.to_string()
    } else {
        trimmed.to_string()
    }
}

fn contact_value(value: &str) -> String {
    or_placeholder(value, MISSING_CONTACT)
}

/// Derive the central identity mark per the fixed rule: logo wins, else
/// first character of the name uppercased, else the fallback glyph.
pub fn identity_mark(card: &Card) -> IdentityMark {
    if let Some(logo) = &card.logo {
        if !logo.is_empty() {
            return IdentityMark::Logo {
                data_uri: logo.clone(),
            };
        }
    }
    let ch = card
        .name
        .trim()
        .chars()
        .next()
        .map(|c| c.to_uppercase().next().unwrap_or(c))
        .unwrap_or(FALLBACK_GLYPH);
    IdentityMark::Glyph { ch }
}

/// Fixed platform → outbound URL table shared by the social block, the
/// vCard writer, and the "open profile" affordance.
pub fn resolve_profile_url(platform: &Platform, handle: &str) -> String {
    let handle = handle.trim();
    match platform {
        Platform::Instagram => format!("https://instagram.com/{handle}"),
        Platform::X => format!("https://twitter.com/{handle}"),
        Platform::LinkedIn => {
            if handle.starts_with("http") {
                handle.to_string()
            } else {
                format!("https://linkedin.com/in/{handle}")
            }
        }
        Platform::GitHub => format!("https://github.com/{handle}"),
        // Everything else is treated as already a full URL or an opaque label.
        _ => handle.to_string(),
    }
}

fn social_entries(socials: &[SocialLink]) -> Vec<SocialEntry> {
    socials
        .iter()
        .map(|s| SocialEntry {
            platform_name: s.platform.display_name().to_string(),
            label: if s.label.trim().is_empty() {
                s.handle.trim().to_string()
            } else {
                s.label.trim().to_string()
            },
            url: resolve_profile_url(&s.platform, &s.handle),
        })
        .collect()
}

/// Resolve the full two-face layout. Identical input always yields identical
/// output; there is no randomness or hidden state here.
pub fn resolve_layout(card: &Card, style: CardStyle) -> CardLayout {
    let theme = Theme::for_style(style);

    let mut front = Vec::with_capacity(4);
    front.push(Region::Header {
        company: or_placeholder(&card.company, PLACEHOLDER_COMPANY),
    });
    front.push(Region::IdentityMark(identity_mark(card)));
    front.push(Region::NameTitle {
        name: or_placeholder(&card.name, PLACEHOLDER_NAME),
        title: or_placeholder(&card.title, PLACEHOLDER_TITLE),
    });

    let mut back = Vec::with_capacity(3);
    back.push(Region::ContactBlock {
        rows: [
            ContactRow {
                label: "Phone",
                value: contact_value(&card.phone),
            },
            ContactRow {
                label: "Email",
                value: contact_value(&card.email),
            },
            ContactRow {
                label: "Web",
                value: contact_value(&card.website),
            },
            ContactRow {
                label: "Address",
                value: contact_value(&card.address),
            },
        ],
    });
    if !card.socials.is_empty() {
        back.push(Region::SocialBlock {
            entries: social_entries(&card.socials),
        });
    }
    back.push(Region::BackDecor {
        swatches: theme.swatches.to_vec(),
    });

    CardLayout {
        style,
        front: Face { regions: front },
        back: Face { regions: back },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Card, CardStyle, Platform, SocialLink};

    #[test]
    fn empty_card_resolves_to_placeholders_only() {
        let layout = resolve_layout(&Card::empty(), CardStyle::Kosma);

        let Region::Header { company } = &layout.front.regions[0] else {
            panic!("front region 0 should be the header");
        };
        assert_eq!(company, PLACEHOLDER_COMPANY);

        let Region::NameTitle { name, title } = &layout.front.regions[2] else {
            panic!("front region 2 should be name/title");
        };
        assert_eq!(name, PLACEHOLDER_NAME);
        assert_eq!(title, PLACEHOLDER_TITLE);

        let Region::ContactBlock { rows } = &layout.back.regions[0] else {
            panic!("back region 0 should be the contact block");
        };
        assert!(rows.iter().all(|r| r.value == MISSING_CONTACT));
    }

    #[test]
    fn identity_glyph_rules() {
        let mut card = Card::empty();
        assert_eq!(identity_mark(&card), IdentityMark::Glyph { ch: 'K' });

        card.name = "ada lovelace".to_string();
        assert_eq!(identity_mark(&card), IdentityMark::Glyph { ch: 'A' });

        card.logo = Some("data:image/png;base64,AAAA".to_string());
        assert!(matches!(identity_mark(&card), IdentityMark::Logo { .. }));
    }

    #[test]
    fn contact_block_never_omits_rows() {
        let mut card = Card::empty();
        card.phone = "+49 30 1234".to_string();
        let layout = resolve_layout(&card, CardStyle::Techno);
        let Region::ContactBlock { rows } = &layout.back.regions[0] else {
            panic!("missing contact block");
        };
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].value, "+49 30 1234");
        assert_eq!(rows[1].value, MISSING_CONTACT);
        assert_eq!(rows[3].value, MISSING_CONTACT);
    }

    #[test]
    fn social_block_only_when_non_empty_and_in_order() {
        let mut card = Card::empty();
        let layout = resolve_layout(&card, CardStyle::Kosma);
        assert!(
            !layout
                .back
                .regions
                .iter()
                .any(|r| matches!(r, Region::SocialBlock { .. }))
        );

        card.socials = vec![
            SocialLink {
                platform: Platform::X,
                handle: "zeta".to_string(),
                label: String::new(),
            },
            SocialLink {
                platform: Platform::GitHub,
                handle: "alpha".to_string(),
                label: String::new(),
            },
        ];
        let layout = resolve_layout(&card, CardStyle::Kosma);
        let entries = layout
            .back
            .regions
            .iter()
            .find_map(|r| match r {
                Region::SocialBlock { entries } => Some(entries),
                _ => None,
            })
            .expect("social block present");
        // Stored order, not sorted.
        assert_eq!(entries[0].platform_name, "X");
        assert_eq!(entries[1].platform_name, "GitHub");
    }

    #[test]
    fn profile_url_table() {
        assert_eq!(
            resolve_profile_url(&Platform::LinkedIn, "https://x.com/y"),
            "https://x.com/y"
        );
        assert_eq!(
            resolve_profile_url(&Platform::LinkedIn, "jdoe"),
            "https://linkedin.com/in/jdoe"
        );
        assert_eq!(
            resolve_profile_url(&Platform::GitHub, "octocat"),
            "https://github.com/octocat"
        );
        assert_eq!(
            resolve_profile_url(&Platform::Instagram, "kay"),
            "https://instagram.com/kay"
        );
        assert_eq!(resolve_profile_url(&Platform::X, "kay"), "https://twitter.com/kay");
        assert_eq!(
            resolve_profile_url(&Platform::Other("Mastodon".into()), "https://m.example/@k"),
            "https://m.example/@k"
        );
    }

    #[test]
    fn resolution_is_deterministic() {
        let mut card = Card::empty();
        card.name = "Ada".to_string();
        card.socials.push(SocialLink {
            platform: Platform::GitHub,
            handle: "ada".to_string(),
            label: String::new(),
        });
        assert_eq!(
            resolve_layout(&card, CardStyle::Techno),
            resolve_layout(&card, CardStyle::Techno)
        );
    }
}
