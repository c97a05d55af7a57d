use std::time::Duration;

use crossterm::style::Color;
use pretty_assertions::assert_eq;
use rtree_core::host::HostLink;
use rtree_core::palette::PALETTE;
use rtree_core::relay::RelayConfig;
use rtree_core::relay::RelaySession;
use rtree_core::terminal;
use rtree_core::test_support::RecordingTerminal;
use rtree_core::test_support::ScriptedFeed;
use rtree_core::test_support::TerminalOp;
use rtree_core::test_support::scripted_process;

fn quiet_config() -> RelayConfig {
    RelayConfig {
        rotation_period: Duration::from_secs(3_600),
        pacing: false,
        settle_limit: Duration::from_millis(10),
    }
}

fn session_parts(
    config: RelayConfig,
) -> (RelaySession, ScriptedFeed, RecordingTerminal, HostLink) {
    let recording = RecordingTerminal::new();
    let link = HostLink::new();
    link.begin();
    let (process, feed) = scripted_process(link.clone());
    let session = RelaySession::new(
        process,
        terminal::shared(recording.clone()),
        link.clone(),
        config,
    );
    (session, feed, recording, link)
}

async fn wait_for_lines(recording: &RecordingTerminal, count: usize) {
    for _ in 0..400 {
        if recording.text_lines().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "timed out waiting for {count} lines; saw {:?}",
        recording.text_lines()
    );
}

#[tokio::test]
async fn lines_display_exactly_once_in_order() {
    let (session, feed, recording, link) = session_parts(quiet_config());
    feed.start();
    for line in ["a", "b", "c", "d"] {
        feed.push_line(line);
    }
    feed.complete(true);

    session.run().await.expect("relay run");

    assert_eq!(recording.text_lines(), vec!["a", "b", "c", "d"]);
    assert_eq!(feed.queued_lines(), 0);
    assert_eq!(recording.colors(), (Color::Reset, Color::Reset));
    assert!(!link.is_running());
}

#[tokio::test]
async fn session_opens_in_first_palette_slot() {
    let (session, feed, recording, _link) = session_parts(quiet_config());
    feed.start();
    feed.complete(true);
    session.run().await.expect("relay run");

    let ops = recording.ops();
    assert_eq!(
        ops.first(),
        Some(&TerminalOp::SetColors(
            PALETTE[0].background,
            PALETTE[0].foreground
        ))
    );
    assert_eq!(ops.get(1), Some(&TerminalOp::WriteLine(String::new())));
}

#[tokio::test]
async fn one_timer_firing_rotates_exactly_once_before_next_line() {
    let (session, feed, recording, _link) = session_parts(quiet_config());
    let armed = session.timer_armed();
    feed.start();
    feed.push_line("a");
    let run = tokio::spawn(session.run());

    wait_for_lines(&recording, 1).await;
    // Two raises between lines still credit a single rotation.
    armed.store(true, std::sync::atomic::Ordering::SeqCst);
    armed.store(true, std::sync::atomic::Ordering::SeqCst);
    for line in ["b", "c", "d"] {
        feed.push_line(line);
    }
    feed.complete(true);
    run.await.expect("join").expect("relay run");

    let expected = vec![
        TerminalOp::SetColors(PALETTE[0].background, PALETTE[0].foreground),
        TerminalOp::WriteLine(String::new()),
        TerminalOp::Write("a".into()),
        TerminalOp::WriteLine(String::new()),
        TerminalOp::Write("b".into()),
        // Rotation applies before b's terminator so the color change
        // never splits a line.
        TerminalOp::SetColors(PALETTE[1].background, PALETTE[1].foreground),
        TerminalOp::WriteLine(String::new()),
        TerminalOp::Write("c".into()),
        TerminalOp::WriteLine(String::new()),
        TerminalOp::Write("d".into()),
        TerminalOp::WriteLine(String::new()),
        TerminalOp::SetColors(Color::Reset, Color::Reset),
        TerminalOp::WriteLine(String::new()),
    ];
    assert_eq!(recording.ops(), expected);
}

#[tokio::test]
async fn rotation_count_never_exceeds_displayed_lines() {
    let (session, feed, recording, _link) = session_parts(quiet_config());
    let armed = session.timer_armed();
    armed.store(true, std::sync::atomic::Ordering::SeqCst);
    feed.start();
    feed.push_line("only");
    feed.complete(true);
    session.run().await.expect("relay run");

    // Initial slot + one credited rotation + final restore.
    assert_eq!(recording.color_changes(), 3);
}

#[tokio::test]
async fn periodic_timer_drives_rotation() {
    let config = RelayConfig {
        rotation_period: Duration::from_millis(30),
        ..quiet_config()
    };
    let (session, feed, recording, _link) = session_parts(config);
    feed.start();
    feed.push_line("a");
    let run = tokio::spawn(session.run());

    wait_for_lines(&recording, 1).await;
    tokio::time::sleep(Duration::from_millis(120)).await;
    feed.push_line("b");
    feed.complete(true);
    run.await.expect("join").expect("relay run");

    let rotated = TerminalOp::SetColors(PALETTE[1].background, PALETTE[1].foreground);
    assert!(
        recording.ops().contains(&rotated),
        "expected a rotation into the second slot: {:?}",
        recording.ops()
    );
    // Initial slot, at most one rotation per displayed line, restore.
    assert!((3..=4).contains(&recording.color_changes()));
}

#[tokio::test]
async fn cancellation_mid_stream_stops_display_and_restores_colors() {
    let (session, feed, recording, link) = session_parts(quiet_config());
    let coordinator = session.coordinator();
    feed.start();
    feed.push_line("a");
    feed.push_line("b");
    let run = tokio::spawn(session.run());

    wait_for_lines(&recording, 2).await;
    coordinator.trigger();
    feed.push_line("c");
    feed.push_line("d");
    feed.complete(false);
    run.await.expect("join").expect("relay run");

    assert_eq!(recording.text_lines(), vec!["a", "b"]);
    // Swallowed notifications leave the queue untouched.
    assert_eq!(feed.queued_lines(), 2);
    assert_eq!(recording.colors(), (Color::Reset, Color::Reset));
    assert!(!link.is_running());
}

#[tokio::test]
async fn double_interrupt_matches_single_interrupt() {
    let (session, feed, recording, link) = session_parts(quiet_config());
    let coordinator = session.coordinator();
    feed.start();
    feed.push_line("a");
    let run = tokio::spawn(session.run());

    wait_for_lines(&recording, 1).await;
    coordinator.trigger();
    coordinator.trigger();
    feed.push_line("b");
    feed.complete(false);
    run.await.expect("join").expect("relay run");

    assert_eq!(recording.text_lines(), vec!["a"]);
    assert_eq!(recording.colors(), (Color::Reset, Color::Reset));
    assert!(!link.is_running());
}

#[tokio::test]
async fn interrupt_before_any_output_displays_nothing() {
    let (session, feed, recording, _link) = session_parts(quiet_config());
    session.coordinator().trigger();
    feed.start();
    feed.push_line("a");
    feed.push_line("b");
    feed.complete(false);
    session.run().await.expect("relay run");

    assert!(recording.text_lines().is_empty());
    assert_eq!(feed.queued_lines(), 2);
    assert_eq!(recording.colors(), (Color::Reset, Color::Reset));
}

#[tokio::test]
async fn abnormal_exit_is_ordinary_completion() {
    let (session, feed, recording, link) = session_parts(quiet_config());
    feed.start();
    feed.push_line("partial output");
    feed.complete(false);

    session.run().await.expect("relay run");

    assert_eq!(recording.text_lines(), vec!["partial output"]);
    assert_eq!(recording.colors(), (Color::Reset, Color::Reset));
    assert!(!link.is_running());
}

#[tokio::test]
async fn pacing_enabled_session_still_completes_promptly() {
    let config = RelayConfig {
        pacing: true,
        ..quiet_config()
    };
    let (session, feed, recording, _link) = session_parts(config);
    feed.start();
    for i in 0..50 {
        feed.push_line(&format!("line {i}"));
    }
    feed.complete(true);

    let run = tokio::time::timeout(Duration::from_secs(30), session.run()).await;
    run.expect("bounded").expect("relay run");
    assert_eq!(recording.text_lines().len(), 50);
}
