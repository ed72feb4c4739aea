mod common;

use std::time::Instant;

use canvas_core::{load_canvas_config_from_env, ConnectionState, SessionEvent};
use common::{drain, fixture_config, load_script, new_session};

#[test]
fn env_config_points_at_fixture() {
    common::ensure_test_config();
    let (config, metadata) = load_canvas_config_from_env();
    assert_eq!((config.grid_width, config.grid_height), (10, 10));
    assert!(metadata.path().is_some());
}

#[test]
fn scripted_stream_updates_grid_in_order() -> anyhow::Result<()> {
    let mut session = new_session(fixture_config()?)?;
    let events = session.subscribe();
    let t0 = Instant::now();
    session.start(t0);
    session.on_transport_open(t0);
    assert_eq!(session.connection_state(), ConnectionState::Open);
    assert_eq!(session.transport().connects, vec!["127.0.0.1:9".to_string()]);
    drain(&events);

    for frame in load_script("stream_script.json")? {
        session.on_transport_frame(t0, &frame);
    }

    let versions: Vec<_> = drain(&events)
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::GridChanged { version } => Some(version),
            _ => None,
        })
        .collect();
    assert_eq!(versions, vec![1, 3, 4, 5, 6]);

    let (grid, version) = session.grid();
    assert_eq!(version, 6);
    assert_eq!(grid.cell(0, 0), 5);
    assert_eq!(grid.cell(1, 0), 1);
    assert_eq!(grid.cell(0, 1), 1);
    assert_eq!(grid.cell(1, 1), 1);
    assert_eq!(grid.cell(2, 2), 0);
    assert_eq!(grid.cell(3, 3), 4);
    assert_eq!(grid.cell(4, 3), 2);
    assert_eq!(grid.cell(5, 5), 3);
    assert_eq!(grid.cell(6, 6), 3);
    // Sentinel cells in the batch leave the previous color in place.
    assert_eq!(grid.cell(6, 5), 0);
    assert_eq!(grid.cell(5, 6), 0);
    Ok(())
}

#[test]
fn frames_after_shutdown_are_ignored() -> anyhow::Result<()> {
    let mut session = new_session(fixture_config()?)?;
    let t0 = Instant::now();
    session.start(t0);
    session.on_transport_open(t0);
    session.shutdown();
    session.shutdown();
    assert_eq!(session.connection_state(), ConnectionState::Stopped);
    assert_eq!(session.transport().closes, 1);

    for frame in load_script("stream_script.json")? {
        session.on_transport_frame(t0, &frame);
    }
    assert_eq!(session.grid().1, 0);
    assert_eq!(session.next_deadline(), None);
    Ok(())
}

#[test]
fn dropped_subscribers_do_not_block_others() -> anyhow::Result<()> {
    let mut session = new_session(fixture_config()?)?;
    let gone = session.subscribe();
    let kept = session.subscribe();
    drop(gone);

    let t0 = Instant::now();
    session.start(t0);
    session.pan_by(t0, 4.0, 0.0);
    let events = drain(&kept);
    assert!(events.contains(&SessionEvent::ConnectionChanged(
        ConnectionState::Connecting { attempt: 0 }
    )));
    assert!(events
        .iter()
        .any(|event| matches!(event, SessionEvent::CameraChanged { .. })));
    Ok(())
}

#[test]
fn foreign_entries_do_not_cost_the_rest_of_a_frame() -> anyhow::Result<()> {
    let mut session = new_session(fixture_config()?)?;
    let t0 = Instant::now();
    session.start(t0);

    let pixels = serde_json::to_vec(&serde_json::json!({
        "type": "PIXEL_UPDATE",
        "data": [
            { "x": 1, "y": 1, "color": 3 },
            { "x": 2, "y": 2, "color": 300 },
            { "x": 3_000_000_000_i64, "y": 1, "color": 4 },
            { "x": 4, "y": 4, "color": 5 },
        ],
    }))?;
    session.on_transport_frame(t0, &pixels);

    let batch = serde_json::to_vec(&serde_json::json!({
        "type": "BATCH_UPDATE",
        "data": { "startX": 6, "startY": 6, "grid": [[1, 1024, 2]] },
    }))?;
    session.on_transport_frame(t0, &batch);

    let (grid, version) = session.grid();
    assert_eq!(version, 4);
    assert_eq!(grid.cell(1, 1), 3);
    assert_eq!(grid.cell(2, 2), 0);
    assert_eq!(grid.cell(4, 4), 5);
    assert_eq!(grid.cell(6, 6), 1);
    assert_eq!(grid.cell(7, 6), 0);
    assert_eq!(grid.cell(8, 6), 2);
    Ok(())
}
