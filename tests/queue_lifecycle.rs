use chrono::{Duration, Utc};

use discfit::queue::{DEFAULT_RETRY_LIMIT, DownloadQueue, EntryState, QueueLock};

#[test]
fn test_full_lifecycle_wait_run_fail_retry_dead() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fetchq.queue");

    let mut queue = DownloadQueue::load(&path).unwrap();
    queue.add("http://example.com/big.iso", "file").unwrap();
    queue.save().unwrap();

    // Walk the entry through repeated failures until it dies, saving and
    // reloading at each step the way separate cron invocations would.
    for attempt in 1..=DEFAULT_RETRY_LIMIT {
        let mut queue = DownloadQueue::load(&path).unwrap();
        let index = queue.next_ready(Utc::now()).expect("entry should be ready");

        queue.entries[index].state = EntryState::Run;
        queue.entries[index].last_attempt = Some(Utc::now());
        queue.save().unwrap();

        // Simulate the download failing.
        let entry = &mut queue.entries[index];
        entry.attempts += 1;
        entry.state = if entry.attempts >= DEFAULT_RETRY_LIMIT {
            EntryState::Dead
        } else {
            EntryState::Fail
        };
        // Pretend the failure happened long enough ago for the next retry.
        entry.last_attempt = Some(Utc::now() - Duration::hours(24));
        queue.save().unwrap();

        let reloaded = DownloadQueue::load(&path).unwrap();
        assert_eq!(reloaded.entries[0].attempts, attempt);
    }

    let queue = DownloadQueue::load(&path).unwrap();
    assert_eq!(queue.entries[0].state, EntryState::Dead);
    assert_eq!(queue.next_ready(Utc::now()), None, "dead entries never dispatch");
}

#[test]
fn test_backoff_delays_scale_with_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fetchq.queue");

    let mut queue = DownloadQueue::load(&path).unwrap();
    queue.add("http://example.com/a", "file").unwrap();
    queue.entries[0].state = EntryState::Fail;
    queue.entries[0].attempts = 3;

    let now = Utc::now();
    // 3 attempts means a 30 minute delay.
    queue.entries[0].last_attempt = Some(now - Duration::minutes(29));
    assert_eq!(queue.next_ready(now), None);
    queue.entries[0].last_attempt = Some(now - Duration::minutes(31));
    assert_eq!(queue.next_ready(now), Some(0));
}

#[test]
fn test_fresh_entries_dispatch_before_failed_ones() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fetchq.queue");

    let mut queue = DownloadQueue::load(&path).unwrap();
    queue.add("http://example.com/old", "file").unwrap();
    queue.add("http://example.com/new", "video").unwrap();
    queue.entries[0].state = EntryState::Fail;
    queue.entries[0].attempts = 1;
    queue.entries[0].last_attempt = Some(Utc::now());

    // The failed entry is inside its backoff window, so the fresh wait
    // entry dispatches even though it was queued later.
    let index = queue.next_ready(Utc::now()).unwrap();
    assert_eq!(queue.entries[index].url, "http://example.com/new");
}

#[test]
fn test_crash_recovery_counts_the_lost_run_as_an_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fetchq.queue");

    let mut queue = DownloadQueue::load(&path).unwrap();
    queue.add("http://example.com/a", "file").unwrap();
    queue.entries[0].state = EntryState::Run;
    queue.entries[0].last_attempt = Some(Utc::now());
    queue.save().unwrap();

    // A plain reload (what add/list/prune see) keeps the run entry:
    // it may belong to a dispatch that is still downloading.
    let mut queue = DownloadQueue::load(&path).unwrap();
    assert_eq!(queue.entries[0].state, EntryState::Run);
    assert_eq!(queue.entries[0].attempts, 0);

    // The lock-holding dispatch knows nothing else is running, so the
    // run entry is a crash and becomes a counted failed attempt.
    assert_eq!(queue.recover_crashed_runs(), 1);
    assert_eq!(queue.entries[0].state, EntryState::Fail);
    assert_eq!(queue.entries[0].attempts, 1);
}

#[test]
fn test_add_made_during_a_dispatch_survives_the_verdict() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fetchq.queue");

    let mut queue = DownloadQueue::load(&path).unwrap();
    queue.add("http://example.com/first.iso", "file").unwrap();
    queue.save().unwrap();

    // The dispatcher marks the entry run and starts the download.
    let mut dispatcher_view = DownloadQueue::load(&path).unwrap();
    let index = dispatcher_view.next_ready(Utc::now()).unwrap();
    dispatcher_view.entries[index].state = EntryState::Run;
    dispatcher_view.entries[index].last_attempt = Some(Utc::now());
    dispatcher_view.save().unwrap();
    let picked_url = dispatcher_view.entries[index].url.clone();

    // Meanwhile another invocation queues a second download. It must
    // not disturb the in-flight run entry.
    let mut other = DownloadQueue::load(&path).unwrap();
    other.add("http://example.com/second.iso", "video").unwrap();
    other.save().unwrap();
    assert_eq!(other.entries[0].state, EntryState::Run);

    // The download finishes: the dispatcher reloads before saving its
    // verdict, so the entry added meanwhile is preserved.
    let mut queue = DownloadQueue::load(&path).unwrap();
    let verdict = queue.apply_verdict(&picked_url, true).unwrap();
    assert_eq!(verdict.state, EntryState::Done);
    queue.save().unwrap();

    let reloaded = DownloadQueue::load(&path).unwrap();
    assert!(
        reloaded
            .entries
            .iter()
            .any(|e| e.url == "http://example.com/second.iso"),
        "an add made during a dispatch must not be lost"
    );
    assert_eq!(reloaded.entries[0].state, EntryState::Done);
    assert_eq!(reloaded.entries[1].state, EntryState::Wait);
}

#[test]
fn test_prune_made_during_a_dispatch_survives_the_verdict() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fetchq.queue");

    let mut queue = DownloadQueue::load(&path).unwrap();
    queue.add("http://example.com/old.iso", "file").unwrap();
    queue.add("http://example.com/live.iso", "file").unwrap();
    queue.entries[0].state = EntryState::Done;
    queue.entries[1].state = EntryState::Run;
    queue.entries[1].last_attempt = Some(Utc::now());
    queue.save().unwrap();

    // A prune runs while the download is in flight; the run entry stays.
    let mut other = DownloadQueue::load(&path).unwrap();
    assert_eq!(other.prune(), 1);
    other.save().unwrap();

    let mut queue = DownloadQueue::load(&path).unwrap();
    let verdict = queue
        .apply_verdict("http://example.com/live.iso", true)
        .unwrap();
    assert_eq!(verdict.state, EntryState::Done);
    queue.save().unwrap();

    let reloaded = DownloadQueue::load(&path).unwrap();
    assert_eq!(reloaded.entries.len(), 1, "the pruned entry stays gone");
    assert_eq!(reloaded.entries[0].url, "http://example.com/live.iso");
    assert_eq!(reloaded.entries[0].state, EntryState::Done);
}

#[test]
fn test_prune_survives_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fetchq.queue");

    let mut queue = DownloadQueue::load(&path).unwrap();
    queue.add("http://example.com/a", "file").unwrap();
    queue.add("http://example.com/b", "file").unwrap();
    queue.entries[0].state = EntryState::Done;
    queue.save().unwrap();

    let mut queue = DownloadQueue::load(&path).unwrap();
    assert_eq!(queue.prune(), 1);
    queue.save().unwrap();

    let queue = DownloadQueue::load(&path).unwrap();
    assert_eq!(queue.entries.len(), 1);
    assert_eq!(queue.entries[0].url, "http://example.com/b");
}

#[test]
fn test_lock_keeps_dispatches_one_at_a_time() {
    let dir = tempfile::tempdir().unwrap();
    let lock_path = dir.path().join("fetchq.lock");

    let first = QueueLock::acquire(&lock_path).unwrap();
    assert!(first.is_some());
    assert!(
        QueueLock::acquire(&lock_path).unwrap().is_none(),
        "a held lock must refuse a second dispatch"
    );
    drop(first);
    assert!(QueueLock::acquire(&lock_path).unwrap().is_some());
}
