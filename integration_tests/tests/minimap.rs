mod common;

use std::time::Instant;

use canvas_core::{MiniRect, Rgb, SessionEvent};
use common::{drain, fixture_config, new_session};
use serde_json::json;

#[test]
fn click_and_drag_move_the_camera() -> anyhow::Result<()> {
    let mut session = new_session(fixture_config()?)?;
    let events = session.subscribe();
    let t0 = Instant::now();
    session.start(t0);
    assert_eq!(session.minimap().ratio(), 10.0);
    assert_eq!(
        session.minimap_viewport_rect(),
        MiniRect::new(0.0, 0.0, 100.0, 100.0)
    );

    session.set_scale(t0, 2.0);
    assert!(session.minimap_click(t0, 50.0, 50.0));
    assert_eq!(session.camera().pan(), (-40.0, -40.0));
    assert_eq!(
        session.minimap_viewport_rect(),
        MiniRect::new(20.0, 20.0, 60.0, 60.0)
    );

    assert!(!session.minimap_begin_drag(5.0, 5.0));
    assert!(session.minimap_begin_drag(30.0, 30.0));
    assert!(session.minimap_drag_to(t0, 20.0, 20.0));
    assert_eq!(
        session.minimap_viewport_rect(),
        MiniRect::new(10.0, 10.0, 60.0, 60.0)
    );
    assert_eq!(session.camera().pan(), (-16.0, -16.0));

    session.minimap_drag_to(t0, 1_000.0, 1_000.0);
    assert_eq!(session.minimap_viewport_rect().x, 40.0);
    assert_eq!(session.camera().pan(), (-64.0, -64.0));

    assert!(session.minimap_end_drag());
    assert_eq!(
        session.minimap_viewport_rect(),
        MiniRect::new(40.0, 40.0, 50.0, 50.0)
    );
    assert!(!session.minimap_drag_to(t0, 0.0, 0.0));

    let camera_moves = drain(&events)
        .into_iter()
        .filter(|event| matches!(event, SessionEvent::CameraChanged { .. }))
        .count();
    assert_eq!(camera_moves, 4);
    Ok(())
}

#[test]
fn overview_tracks_grid_version() -> anyhow::Result<()> {
    let mut session = new_session(fixture_config()?)?;
    let t0 = Instant::now();
    session.start(t0);

    let first = session.minimap_overview().clone();
    assert_eq!((first.width, first.height), (10, 10));
    assert_eq!(first.pixel(7, 7), Some(Rgb::WHITE));

    let payload = serde_json::to_vec(&json!({
        "type": "PIXEL_UPDATE",
        "data": [{ "x": 7, "y": 7, "color": 1 }],
    }))?;
    session.on_transport_frame(t0, &payload);

    let second = session.minimap_overview();
    assert_eq!(second.version, first.version + 1);
    assert_eq!(second.pixel(7, 7), Some(Rgb::BLACK));
    Ok(())
}
