use kosma::{
    Card, CardStyle, FaceSide, Platform, PlanOptions, ShareSnapshot, SocialLink, compile_face,
    decode_snapshot, encode_snapshot, resolve_layout, viewer_url,
};

fn sample_card() -> Card {
    let mut card = Card::empty();
    card.name = "Tomas Lindqvist".to_string();
    card.title = "Marine Surveyor".to_string();
    card.company = "Baltic Line".to_string();
    card.phone = "+46 70 000 00 00".to_string();
    card.email = "tomas@baltic.example".to_string();
    card.website = "https://baltic.example".to_string();
    card.socials = vec![
        SocialLink {
            platform: Platform::X,
            handle: "tlindqvist".to_string(),
            label: "tlindqvist".to_string(),
        },
        SocialLink {
            platform: Platform::LinkedIn,
            handle: "tomas-lindqvist".to_string(),
            label: "Tomas".to_string(),
        },
    ];
    card.style = CardStyle::Techno;
    card
}

#[test]
fn link_roundtrip_reconstructs_a_renderable_card() {
    let card = sample_card();
    let url = viewer_url("https://kosma.cards", "abc123def456", &ShareSnapshot::from_card(&card))
        .unwrap();

    // What a viewer page does: pull the payload out of the URL and decode.
    let payload = url.split("data=").nth(1).expect("url carries a payload");
    let rebuilt = decode_snapshot(payload).expect("payload decodes").into_card();

    assert_eq!(rebuilt.name, card.name);
    assert_eq!(rebuilt.style, CardStyle::Techno);
    assert_eq!(rebuilt.socials, card.socials);

    // The rebuilt card flows through the same pipeline as the editor's.
    let layout = resolve_layout(&rebuilt, rebuilt.style);
    let plan = compile_face(&layout, FaceSide::Front, &PlanOptions::default());
    assert!(!plan.ops.is_empty());
}

#[test]
fn embedded_images_never_enter_the_link() {
    let mut card = sample_card();
    card.photo = Some(format!("data:image/png;base64,{}", "A".repeat(200_000)));
    let snap = ShareSnapshot::from_card(&card);
    let payload = encode_snapshot(&snap).unwrap();
    assert!(
        payload.len() < 2_000,
        "payload stays link-sized even with a large photo ({} bytes)",
        payload.len()
    );
}

#[test]
fn decode_survives_hostile_input() {
    for junk in [
        "",
        "ß∂ƒ©",
        "AAAA====",
        "eyJub3QiOiJ0aGUgcmlnaHQgc2hhcGUifQ", // valid b64+json, wrong shape is ok if defaults fill
        "%00%01",
    ] {
        // Must never panic; Some is acceptable only for well-formed card JSON.
        let _ = decode_snapshot(junk);
    }
}

#[test]
fn unknown_style_in_payload_falls_back_to_default() {
    // A payload from a newer client carrying a style this build doesn't know.
    let json = r#"{"name":"Ada","style":"holografic"}"#;
    let payload = {
        use base64::Engine as _;
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json)
    };
    let snap = decode_snapshot(&payload).expect("tolerant of unknown styles");
    assert_eq!(snap.style, CardStyle::Kosma);
    assert_eq!(snap.name, "Ada");
}
