//! Share links: a card snapshot serialized to JSON and packed into a
//! URL-safe base64 query parameter, so a viewer page can reconstruct the
//! card with no server round-trip. Embedded images are stripped before
//! encoding to keep the URL within sane limits.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{KosmaError, KosmaResult};
use crate::model::{Card, CardStyle, SocialLink};

/// Length of a generated share id.
pub const SHARE_ID_LEN: usize = 12;

/// What actually travels in the link: the card minus its embedded photo and
/// logo data URIs (those can be megabytes as base64).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShareSnapshot {
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
    #[serde(default)]
    pub socials: Vec<SocialLink>,
    #[serde(default)]
    pub style: CardStyle,
}

impl ShareSnapshot {
    pub fn from_card(card: &Card) -> Self {
        Self {
            name: card.name.clone(),
            title: card.title.clone(),
            company: card.company.clone(),
            phone: card.phone.clone(),
            email: card.email.clone(),
            website: card.website.clone(),
            address: card.address.clone(),
            socials: card.socials.clone(),
            style: card.style,
        }
    }

    /// Rebuild a renderable card. Photo and logo come back empty; the
    /// viewer falls back to the monogram mark.
    pub fn into_card(self) -> Card {
        Card {
            name: self.name,
            title: self.title,
            company: self.company,
            phone: self.phone,
            email: self.email,
            website: self.website,
            address: self.address,
            photo: None,
            logo: None,
            socials: self.socials,
            style: self.style,
        }
    }
}

/// Serialize a snapshot into the URL payload form.
pub fn encode_snapshot(snapshot: &ShareSnapshot) -> KosmaResult<String> {
    let json = serde_json::to_vec(snapshot)
        .map_err(|e| KosmaError::decode(format!("snapshot encode failed: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decode a payload back into a snapshot. Tampered, truncated, or
/// otherwise malformed payloads yield `None`; decoding never panics.
pub fn decode_snapshot(payload: &str) -> Option<ShareSnapshot> {
    let bytes = match URL_SAFE_NO_PAD.decode(payload.trim()) {
        Ok(b) => b,
        Err(err) => {
            debug!(%err, "share payload is not valid base64");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            debug!(%err, "share payload is not a card snapshot");
            None
        }
    }
}

/// Random 12-character lowercase-alphanumeric id for a share link.
pub fn new_share_id() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..SHARE_ID_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// An inbound viewer navigation: the path id plus the optional `data`
/// query parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewerRequest {
    pub id: String,
    pub data: Option<String>,
}

impl ViewerRequest {
    /// The card the viewer should render. Missing or undecodable payloads
    /// resolve to the empty placeholder card; the id is only a cache key.
    pub fn resolve(&self) -> Card {
        self.data
            .as_deref()
            .and_then(decode_snapshot)
            .map(ShareSnapshot::into_card)
            .unwrap_or_else(Card::empty)
    }
}

/// Full viewer URL: `{origin}/c/{id}?data={payload}`.
pub fn viewer_url(origin: &str, id: &str, snapshot: &ShareSnapshot) -> KosmaResult<String> {
    let payload = encode_snapshot(snapshot)?;
    Ok(format!(
        "{}/c/{id}?data={payload}",
        origin.trim_end_matches('/')
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Platform;

    fn sample() -> ShareSnapshot {
        let mut card = Card::empty();
        card.name = "Noor Haddad".to_string();
        card.title = "Field Engineer".to_string();
        card.company = "Meridian Survey".to_string();
        card.email = "noor@example.com".to_string();
        card.socials = vec![
            SocialLink {
                platform: Platform::GitHub,
                handle: "noorh".to_string(),
                label: "noorh".to_string(),
            },
            SocialLink {
                platform: Platform::LinkedIn,
                handle: "noor-haddad".to_string(),
                label: "Noor".to_string(),
            },
        ];
        card.style = CardStyle::Techno;
        ShareSnapshot::from_card(&card)
    }

    #[test]
    fn roundtrip_preserves_fields_and_social_order() {
        let snap = sample();
        let payload = encode_snapshot(&snap).unwrap();
        let back = decode_snapshot(&payload).expect("decodes");
        assert_eq!(back, snap);
        assert_eq!(back.socials[0].platform, Platform::GitHub);
        assert_eq!(back.socials[1].platform, Platform::LinkedIn);
    }

    #[test]
    fn payload_is_url_safe() {
        let payload = encode_snapshot(&sample()).unwrap();
        assert!(
            payload
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn images_are_stripped_from_the_link() {
        let mut card = Card::empty();
        card.photo = Some("data:image/png;base64,AAAA".to_string());
        card.logo = Some("data:image/png;base64,BBBB".to_string());
        let snap = ShareSnapshot::from_card(&card);
        let back = decode_snapshot(&encode_snapshot(&snap).unwrap())
            .unwrap()
            .into_card();
        assert!(back.photo.is_none());
        assert!(back.logo.is_none());
    }

    #[test]
    fn malformed_payloads_decode_to_none() {
        assert!(decode_snapshot("not%base64!").is_none());
        // Valid base64, not JSON.
        assert!(decode_snapshot(&URL_SAFE_NO_PAD.encode(b"hello")).is_none());
        // Valid JSON, wrong shape.
        assert!(decode_snapshot(&URL_SAFE_NO_PAD.encode(b"[1,2,3]")).is_none());
        assert!(decode_snapshot("").is_none());
    }

    #[test]
    fn truncated_payload_decodes_to_none() {
        let payload = encode_snapshot(&sample()).unwrap();
        let cut = &payload[..payload.len() / 2];
        assert!(decode_snapshot(cut).is_none());
    }

    #[test]
    fn share_ids_are_lowercase_alphanumeric() {
        for _ in 0..32 {
            let id = new_share_id();
            assert_eq!(id.len(), SHARE_ID_LEN);
            assert!(
                id.chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            );
        }
    }

    #[test]
    fn viewer_request_resolves_or_falls_back_to_placeholder() {
        let payload = encode_snapshot(&sample()).unwrap();
        let req = ViewerRequest {
            id: "abc123def456".to_string(),
            data: Some(payload),
        };
        assert_eq!(req.resolve().name, "Noor Haddad");

        let bad = ViewerRequest {
            id: "abc123def456".to_string(),
            data: Some("garbage!!".to_string()),
        };
        assert_eq!(bad.resolve(), Card::empty());

        let missing = ViewerRequest {
            id: "abc123def456".to_string(),
            data: None,
        };
        assert_eq!(missing.resolve(), Card::empty());
    }

    #[test]
    fn viewer_url_shape() {
        let url = viewer_url("https://kosma.cards/", "ab12cd34ef56", &sample()).unwrap();
        assert!(url.starts_with("https://kosma.cards/c/ab12cd34ef56?data="));
        let payload = url.split("data=").nth(1).unwrap();
        assert_eq!(decode_snapshot(payload).unwrap(), sample());
    }
}
