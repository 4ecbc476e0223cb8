use kosma::preview::{PointerEvent, PreviewAction, PreviewConfig, PreviewSession};
use kosma::view3d::{CardStage, DisplayMode, StageConfig};
use kosma::{Card, CardStyle, FaceSide};

fn small_config() -> PreviewConfig {
    PreviewConfig {
        raster_scale: 0.2,
        ..PreviewConfig::default()
    }
}

fn named_card() -> Card {
    let mut card = Card::empty();
    card.name = "Vera Moln".to_string();
    card.title = "Cartographer".to_string();
    card
}

#[test]
fn tap_flips_and_faces_render_distinct() {
    let mut session = PreviewSession::new(named_card(), 0, small_config());
    assert_eq!(session.state().visible_side(), FaceSide::Front);

    let front = session.face(FaceSide::Front).unwrap().data.clone();
    let back = session.face(FaceSide::Back).unwrap().data.clone();
    assert_ne!(front, back, "front and back carry different artwork");

    session.on_pointer(PointerEvent::Down { x: 100.0, y: 100.0 }, 1000);
    let action = session.on_pointer(PointerEvent::Up { x: 100.0, y: 100.0 }, 1050);
    assert_eq!(action, PreviewAction::Flipped);
    assert_eq!(session.state().visible_side(), FaceSide::Back);
    assert_eq!(session.visible_face().unwrap().data, back);
}

#[test]
fn swipe_cycles_style_and_rerenders() {
    let mut session = PreviewSession::new(named_card(), 0, small_config());
    let before = session.face(FaceSide::Front).unwrap().data.clone();

    session.on_pointer(PointerEvent::Down { x: 200.0, y: 100.0 }, 100);
    session.on_pointer(PointerEvent::Move { x: 120.0, y: 102.0 }, 130);
    let action = session.on_pointer(PointerEvent::Up { x: 120.0, y: 102.0 }, 160);
    assert_eq!(action, PreviewAction::StyleChanged(CardStyle::Techno));

    let after = session.face(FaceSide::Front).unwrap().data.clone();
    assert_ne!(before, after, "style swap changes the rendered face");
}

#[test]
fn idle_flip_shows_both_faces_unattended() {
    let config = small_config();
    let period = config.idle_flip_period_ms;
    let mut session = PreviewSession::new(named_card(), 0, config);

    assert!(!session.tick(period - 1));
    assert!(session.tick(period));
    assert_eq!(session.state().visible_side(), FaceSide::Back);
    assert!(session.tick(2 * period));
    assert_eq!(session.state().visible_side(), FaceSide::Front);
}

#[test]
fn stage_and_preview_share_card_semantics() {
    // The 3D stage renders the same face planes the 2D preview does; a
    // card edit must invalidate both.
    let mut stage = CardStage::new(
        named_card(),
        StageConfig {
            viewport_width: 96,
            viewport_height: 64,
            mode: DisplayMode::Compact,
            background: [0, 0, 0, 0],
        },
    );
    stage.start();
    let first = stage.advance(16).unwrap().expect("stage renders");

    let mut edited = named_card();
    edited.name = "Vera M. Moln".to_string();
    stage.set_card(edited);
    let second = stage.advance(32).unwrap().expect("stage still renders");
    assert_eq!((second.width, second.height), (first.width, first.height));

    stage.dispose();
    assert!(stage.advance(48).unwrap().is_none());
}
