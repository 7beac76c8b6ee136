use super::*;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use upkeep_core::{MajorChange, UpdateMode};

static TEST_CHANNEL_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_channel_root() -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let counter = TEST_CHANNEL_ROOT_COUNTER.fetch_add(1, Ordering::SeqCst);
    path.push(format!(
        "upkeep-channel-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        counter
    ));
    path
}

fn memory_channel() -> Channel<Arc<MemoryStore>> {
    Channel::new(Arc::new(MemoryStore::new()), AbortSignal::new())
}

fn fast_policy(timeout_polls: u32) -> PollPolicy {
    PollPolicy::new(Duration::from_millis(5), timeout_polls)
}

#[test]
fn file_store_reads_missing_entry_as_empty() {
    let root = test_channel_root();
    let store = FileStore::open(&root).expect("must open store");

    assert_eq!(store.get(keys::UPDATE_AVAILABLE).expect("must read"), "");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn file_store_overwrites_and_clears_without_deleting() {
    let root = test_channel_root();
    let store = FileStore::open(&root).expect("must open store");

    store.set(keys::UPDATE_AVAILABLE, "1.3.0").expect("must write");
    store.set(keys::UPDATE_AVAILABLE, "1.4.0").expect("must overwrite");
    assert_eq!(store.get(keys::UPDATE_AVAILABLE).expect("must read"), "1.4.0");

    store.set(keys::UPDATE_AVAILABLE, "").expect("must clear");
    assert_eq!(store.get(keys::UPDATE_AVAILABLE).expect("must read"), "");
    assert!(root.join(keys::UPDATE_AVAILABLE).exists());

    let entries = store.entries().expect("must list entries");
    assert_eq!(entries.len(), 1);
    assert!(entries.keys().all(|key| !key.starts_with('.')));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn file_store_is_shared_between_handles() {
    let root = test_channel_root();
    let writer = FileStore::open(&root).expect("must open writer");
    let reader = FileStore::open(&root).expect("must open reader");

    writer.set(keys::SERVICE_STARTED, "1").expect("must write");
    assert_eq!(reader.get(keys::SERVICE_STARTED).expect("must read"), "1");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn store_rejects_path_like_keys() {
    let root = test_channel_root();
    let store = FileStore::open(&root).expect("must open store");

    for key in ["", "../escape", "a/b", ".hidden"] {
        let err = store.set(key, "x").expect_err("must reject key");
        assert!(err.to_string().contains("invalid channel key"));
    }
    assert!(MemoryStore::new().set("a/b", "x").is_err());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn consume_clears_entry_after_read() {
    let channel = memory_channel();
    channel.write(keys::UPDATE_SOURCE_CHANGED, "beta").expect("must write");

    assert_eq!(
        channel.consume(keys::UPDATE_SOURCE_CHANGED).expect("must consume"),
        "beta"
    );
    assert_eq!(channel.read(keys::UPDATE_SOURCE_CHANGED).expect("must read"), "");
}

#[test]
fn waiting_read_returns_once_writer_sets_value() {
    let channel = memory_channel();
    let writer = channel.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        writer.write(keys::UPDATE_RESPONSE, "commence").expect("must write");
    });

    let value = channel
        .read_with(
            keys::UPDATE_RESPONSE,
            ReadOptions {
                consume: true,
                wait: Some(fast_policy(2_000)),
            },
        )
        .expect("must observe response");
    handle.join().expect("writer thread");

    assert_eq!(value, "commence");
    assert_eq!(channel.read(keys::UPDATE_RESPONSE).expect("must read"), "");
}

#[test]
fn waiting_read_on_present_value_does_not_sleep() {
    let channel = memory_channel();
    channel.write(keys::UPDATE_RESPONSE, "decline").expect("must write");

    let started = Instant::now();
    let value = channel
        .wait_for_value(keys::UPDATE_RESPONSE, PollPolicy::new(Duration::from_secs(5), 10))
        .expect("must read");
    assert_eq!(value, "decline");
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn waiting_read_times_out_after_policy_polls() {
    let channel = memory_channel();

    let err = channel
        .wait_for_value(keys::UPDATE_RESPONSE, fast_policy(4))
        .expect_err("must time out");
    assert!(err.is_timeout());
    match err {
        ChannelError::Timeout { key, polls } => {
            assert_eq!(key, keys::UPDATE_RESPONSE);
            assert_eq!(polls, 4);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn zero_poll_budget_times_out_immediately_on_empty_entry() {
    let channel = memory_channel();
    let err = channel
        .wait_for_value(keys::UPDATE_RESPONSE, fast_policy(0))
        .expect_err("must time out");
    assert!(err.is_timeout());
}

#[test]
fn abort_cancels_wait_promptly() {
    let channel = memory_channel();
    let abort = channel.abort_signal().clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        abort.trigger();
    });

    let started = Instant::now();
    let err = channel
        .wait_for_value(
            keys::UPDATE_RESPONSE,
            PollPolicy::new(Duration::from_secs(2), 1_000),
        )
        .expect_err("must abort");
    handle.join().expect("abort thread");

    assert!(err.is_aborted());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn wait_for_empty_returns_when_marker_clears() {
    let channel = memory_channel();
    channel.write_flag(keys::RUNNING, true).expect("must write");
    let writer = channel.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        writer.write_flag(keys::RUNNING, false).expect("must clear");
    });

    channel
        .wait_for_empty(keys::RUNNING, fast_policy(2_000))
        .expect("must observe empty");
    handle.join().expect("writer thread");
}

#[test]
fn wait_for_empty_times_out_while_marker_stays() {
    let channel = memory_channel();
    channel.write_flag(keys::RUNNING, true).expect("must write");

    let err = channel
        .wait_for_empty(keys::RUNNING, fast_policy(3))
        .expect_err("must time out");
    assert!(err.is_timeout());
}

#[test]
fn synced_write_is_observed() {
    let channel = memory_channel();
    assert!(channel
        .write_synced(keys::SERVICE_STARTED, "1")
        .expect("must write"));
}

#[test]
fn abort_signal_wait_reports_trigger() {
    let abort = AbortSignal::new();
    assert!(!abort.wait(Duration::from_millis(1)));
    abort.trigger();
    assert!(abort.is_aborted());
    assert!(abort.wait(Duration::from_secs(5)));
}

#[test]
fn offer_and_decision_travel_through_endpoints() {
    let channel = memory_channel();
    let background = BackgroundEndpoint::new(channel.clone());
    let foreground = ForegroundEndpoint::new(channel.clone());

    background
        .send(&Message::Offer(Offer {
            version: "1.2.0".to_string(),
            is_downgrade: true,
        }))
        .expect("must publish offer");

    let handle = thread::spawn(move || {
        let offer = foreground
            .pending_offer()
            .expect("must read offer")
            .expect("offer must be pending");
        assert_eq!(offer.version, "1.2.0");
        assert!(offer.is_downgrade);
        foreground.respond(Decision::Commence).expect("must respond");
    });

    let decision = background
        .await_decision(fast_policy(2_000))
        .expect("must receive decision");
    handle.join().expect("foreground thread");
    assert_eq!(decision, Decision::Commence);
    assert_eq!(channel.read(keys::UPDATE_RESPONSE).expect("must read"), "");
}

#[test]
fn any_token_other_than_commence_declines() {
    assert_eq!(Decision::from_token("commence"), Decision::Commence);
    assert_eq!(Decision::from_token("Commence"), Decision::Decline);
    assert_eq!(Decision::from_token("yes"), Decision::Decline);
    assert_eq!(Decision::from_token("decline"), Decision::Decline);
}

#[test]
fn clear_session_resets_all_session_entries() {
    let channel = memory_channel();
    let background = BackgroundEndpoint::new(channel.clone());
    for key in keys::SESSION_KEYS {
        channel.write(key, "stale").expect("must write");
    }
    channel.write_flag(keys::RUNNING, true).expect("must write");

    background.clear_session();

    for key in keys::SESSION_KEYS {
        assert_eq!(channel.read(key).expect("must read"), "", "{key} must be empty");
    }
    assert!(channel.read_flag(keys::RUNNING).expect("must read"));
}

#[test]
fn source_change_is_consumed_once() {
    let channel = memory_channel();
    let background = BackgroundEndpoint::new(channel.clone());
    let foreground = ForegroundEndpoint::new(channel);

    foreground
        .request_source_change(UpdateMode::Beta)
        .expect("must request");
    assert_eq!(
        background.take_source_change().expect("must take").as_deref(),
        Some("beta")
    );
    assert_eq!(background.take_source_change().expect("must take"), None);
}

#[test]
fn host_status_requires_every_readiness_marker() {
    let channel = memory_channel();
    let background = BackgroundEndpoint::new(channel.clone());
    let foreground = ForegroundEndpoint::new(channel);

    assert!(!background.host_status().expect("status").ready_for_check());

    foreground.set_running(true).expect("running");
    foreground.set_started(true).expect("started");
    foreground.set_active(true).expect("active");
    foreground.set_active_window("HomeWindow").expect("window");
    let status = background.host_status().expect("status");
    assert!(status.ready_for_check());
    assert_eq!(status.active_window, "HomeWindow");

    foreground.set_waiting_for_start(true).expect("waiting");
    assert!(!background.host_status().expect("status").ready_for_check());
}

#[test]
fn major_change_ack_round_trip() {
    let channel = memory_channel();
    let background = BackgroundEndpoint::new(channel.clone());
    let foreground = ForegroundEndpoint::new(channel);

    background
        .send(&Message::MajorChange(MajorChange::Localization))
        .expect("must publish");
    assert_eq!(
        foreground.pending_major_change().expect("must read"),
        Some(MajorChange::Localization)
    );
    foreground
        .acknowledge_major_change(false)
        .expect("must acknowledge");
    assert!(!background
        .await_major_change_ack(fast_policy(10))
        .expect("must read ack"));
}
