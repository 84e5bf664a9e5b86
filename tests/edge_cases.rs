//! Edge case and concurrency tests for the display controller

use std::collections::HashSet;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::Duration as StdDuration;

use chrono::Duration;
use epaper_frame::{
    hal::{MockClock, MockPanel, PanelCall},
    Command, CommandOutcome, Coordinator, DisplayController, DrawingStore, QrSlot, SystemState,
    TickOutcome,
};
use image::{GrayImage, ImageFormat, Luma};

fn controller(
    dir: &tempfile::TempDir,
    panel: MockPanel,
    clock: MockClock,
    hold: Duration,
) -> DisplayController<MockPanel, MockClock> {
    DisplayController::new(
        panel,
        DrawingStore::open_in_memory().unwrap(),
        QrSlot::new(dir.path().join("qr.png")),
        clock,
        hold,
    )
}

fn png() -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    GrayImage::from_pixel(4, 2, Luma([0]))
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Asserts every refresh was a complete `init → op → sleep` triple.
fn assert_refreshes_well_formed(calls: &[PanelCall]) {
    assert_eq!(calls.len() % 3, 0, "dangling refresh in {calls:?}");
    for refresh in calls.chunks(3) {
        assert_eq!(refresh[0], PanelCall::Init);
        assert!(matches!(refresh[1], PanelCall::Draw(_) | PanelCall::Clear));
        assert_eq!(refresh[2], PanelCall::Sleep);
    }
}

// ============================================================================
// Missing or Broken Inputs
// ============================================================================

#[test]
fn fallback_without_qr_image_leaves_panel_alone() {
    let dir = tempfile::tempdir().unwrap();
    let mut c = controller(&dir, MockPanel::new(), MockClock::new(), Duration::zero());

    c.apply_command(Command::SetBlanked(true)).unwrap();
    c.apply_command(Command::SetBlanked(false)).unwrap();

    assert_eq!(c.state(), SystemState::QrCode);
    assert_eq!(c.panel().draw_count(), 0);
}

#[test]
fn undecodable_qr_is_stored_but_not_drawn() {
    let dir = tempfile::tempdir().unwrap();
    let mut c = controller(&dir, MockPanel::new(), MockClock::new(), Duration::zero());

    let outcome = c.apply_command(Command::UpdateQr(b"garbage".to_vec())).unwrap();
    assert_eq!(outcome, CommandOutcome::Displayed);
    assert_eq!(c.state(), SystemState::QrCode);
    assert_eq!(c.panel().draw_count(), 0);
    assert!(dir.path().join("qr.png").exists());
}

#[test]
fn failing_panel_init_still_sleeps() {
    let dir = tempfile::tempdir().unwrap();
    let mut panel = MockPanel::new();
    panel.fail_init = true;
    let mut c = controller(&dir, panel, MockClock::new(), Duration::zero());

    c.apply_command(Command::SetBlanked(true)).unwrap();
    assert_eq!(c.state(), SystemState::Blanked);
    assert_eq!(c.panel().calls, vec![PanelCall::Init, PanelCall::Sleep]);
}

// ============================================================================
// Boundary Values
// ============================================================================

#[test]
fn drawing_rotates_exactly_at_hold_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let clock = MockClock::new();
    let mut c = controller(&dir, MockPanel::new(), clock.clone(), Duration::seconds(60));
    c.apply_command(Command::SetBlanked(true)).unwrap();
    for id in [1, 2] {
        c.apply_command(Command::AddDrawing { id, data: vec![0] }).unwrap();
    }
    c.apply_command(Command::SetBlanked(false)).unwrap();

    clock.advance(Duration::seconds(60) - Duration::milliseconds(1));
    assert!(matches!(c.tick().unwrap(), TickOutcome::Holding { .. }));

    clock.advance(Duration::milliseconds(1));
    assert_eq!(c.tick().unwrap(), TickOutcome::Advanced(2));
}

#[test]
fn zero_hold_rotates_every_tick() {
    let dir = tempfile::tempdir().unwrap();
    let mut c = controller(&dir, MockPanel::new(), MockClock::new(), Duration::zero());
    c.apply_command(Command::SetBlanked(true)).unwrap();
    for id in 1..=3 {
        c.apply_command(Command::AddDrawing { id, data: vec![0] }).unwrap();
    }
    c.apply_command(Command::SetBlanked(false)).unwrap();

    assert_eq!(c.tick().unwrap(), TickOutcome::Advanced(2));
    assert_eq!(c.tick().unwrap(), TickOutcome::Advanced(3));
    assert_eq!(c.tick().unwrap(), TickOutcome::FellBack);
}

#[test]
fn negative_and_large_ids() {
    let dir = tempfile::tempdir().unwrap();
    let mut c = controller(&dir, MockPanel::new(), MockClock::new(), Duration::zero());

    for id in [-1, 0, i64::MAX] {
        let cmd = Command::parse(&format!("image/add/{id}"), b"x").unwrap();
        assert_eq!(c.apply_command(cmd).unwrap(), CommandOutcome::Stored);
    }
    assert_eq!(c.store().counts().unwrap().queued, 3);
}

#[test]
fn removing_twice_is_harmless() {
    let dir = tempfile::tempdir().unwrap();
    let mut c = controller(&dir, MockPanel::new(), MockClock::new(), Duration::zero());
    c.apply_command(Command::AddDrawing { id: 4, data: vec![0] }).unwrap();

    assert_eq!(
        c.apply_command(Command::RemoveDrawing(4)).unwrap(),
        CommandOutcome::Stored
    );
    assert_eq!(
        c.apply_command(Command::RemoveDrawing(4)).unwrap(),
        CommandOutcome::Stored
    );
    assert!(!c.store().has_available().unwrap());
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn concurrent_commands_and_ticks_never_overlap_refreshes() {
    let dir = tempfile::tempdir().unwrap();
    let panel = MockPanel::new().with_refresh_delay(StdDuration::from_millis(1));
    let coordinator = Arc::new(Coordinator::new(controller(
        &dir,
        panel,
        MockClock::new(),
        Duration::zero(),
    )));
    coordinator.with_controller(|c| c.start());

    let ticker = {
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || {
            let mut advanced = Vec::new();
            for _ in 0..50 {
                if let TickOutcome::Advanced(id) = coordinator.tick().unwrap() {
                    advanced.push(id);
                }
            }
            advanced
        })
    };
    let sender = {
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || {
            let mut shown = Vec::new();
            for id in 0..50 {
                let cmd = match id % 5 {
                    2 => Command::RemoveDrawing(id - 1),
                    3 => Command::SetBlanked(true),
                    4 => Command::SetBlanked(false),
                    _ => Command::AddDrawing { id, data: png() },
                };
                // Read what went on screen under the same lock as the command.
                coordinator.with_controller(|c| {
                    let outcome = c.apply_command(cmd).unwrap();
                    if outcome == CommandOutcome::Displayed && c.state() == SystemState::Drawing {
                        shown.extend(c.last_shown());
                    }
                });
            }
            shown
        })
    };
    let mut shown = ticker.join().unwrap();
    shown.extend(sender.join().unwrap());

    let unique: HashSet<_> = shown.iter().copied().collect();
    assert_eq!(unique.len(), shown.len(), "a drawing was shown twice: {shown:?}");

    coordinator.with_controller(|c| {
        assert!(c.panel().draw_count() > 0);
        assert_eq!(c.panel().overlaps, 0);
        assert!(!c.panel().is_awake());
        assert_refreshes_well_formed(&c.panel().calls);
    });
}

#[test]
fn shutdown_waits_for_refresh_and_blocks_later_work() {
    let dir = tempfile::tempdir().unwrap();
    let panel = MockPanel::new().with_refresh_delay(StdDuration::from_millis(50));
    let coordinator = Arc::new(Coordinator::new(controller(
        &dir,
        panel,
        MockClock::new(),
        Duration::zero(),
    )));

    let blanker = {
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || coordinator.apply_command(Command::SetBlanked(true)).unwrap())
    };
    thread::sleep(StdDuration::from_millis(10));
    coordinator.shutdown();
    blanker.join().unwrap();

    assert_eq!(coordinator.state(), SystemState::Shutdown);
    assert_eq!(
        coordinator
            .apply_command(Command::AddDrawing { id: 1, data: vec![0] })
            .unwrap(),
        CommandOutcome::Ignored
    );
    assert_eq!(coordinator.tick().unwrap(), TickOutcome::Stopped);
    coordinator.with_controller(|c| {
        assert!(!c.panel().is_awake());
        assert_refreshes_well_formed(&c.panel().calls);
    });
}
