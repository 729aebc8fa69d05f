use super::*;
use crate::dom::MemoryDocument;
use caselens_protocols::NewElement;
use std::sync::atomic::AtomicUsize;

fn counting_watch(
    doc: &Arc<MemoryDocument>,
    debounce_ms: u64,
) -> (WatchHandle, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let records = Arc::new(AtomicUsize::new(0));
    let handle = {
        let calls = calls.clone();
        let records = records.clone();
        DomMutationWatcher::watch(
            doc.clone(),
            doc.body(),
            WatchOptions::new(Duration::from_millis(debounce_ms)),
            move |batch| {
                calls.fetch_add(1, Ordering::SeqCst);
                records.fetch_add(batch.len(), Ordering::SeqCst);
            },
        )
        .unwrap()
    };
    (handle, calls, records)
}

fn burst(doc: &MemoryDocument, n: usize) {
    for i in 0..n {
        doc.append(doc.body(), NewElement::new("div").with_text(format!("row {}", i)))
            .unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn test_burst_coalesces_into_one_call() {
    let doc = Arc::new(MemoryDocument::new("https://acme.lightning.force.com/"));
    let (_handle, calls, records) = counting_watch(&doc, 100);

    burst(&doc, 5);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(records.load(Ordering::SeqCst) >= 5);
}

#[tokio::test(start_paused = true)]
async fn test_debounce_restarts_on_each_mutation() {
    let doc = Arc::new(MemoryDocument::new("https://acme.lightning.force.com/"));
    let (_handle, calls, _) = counting_watch(&doc, 100);

    for _ in 0..4 {
        burst(&doc, 1);
        tokio::time::sleep(Duration::from_millis(60)).await;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_separate_bursts_fire_separately() {
    let doc = Arc::new(MemoryDocument::new("https://acme.lightning.force.com/"));
    let (_handle, calls, _) = counting_watch(&doc, 100);

    burst(&doc, 3);
    tokio::time::sleep(Duration::from_millis(200)).await;
    burst(&doc, 3);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_no_callback_after_stop() {
    let doc = Arc::new(MemoryDocument::new("https://acme.lightning.force.com/"));
    let (handle, calls, _) = counting_watch(&doc, 100);
    assert_eq!(doc.observer_count(), 1);

    burst(&doc, 3);
    handle.stop();
    handle.stop();
    assert!(!handle.is_active());
    assert_eq!(doc.observer_count(), 0);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_drop_disconnects() {
    let doc = Arc::new(MemoryDocument::new("https://acme.lightning.force.com/"));
    let (handle, _, _) = counting_watch(&doc, 100);
    drop(handle);
    assert_eq!(doc.observer_count(), 0);
}

#[tokio::test]
async fn test_watch_unknown_node_fails() {
    let doc = Arc::new(MemoryDocument::new("https://acme.lightning.force.com/"));
    let result = DomMutationWatcher::watch(doc, 9_999, WatchOptions::default(), |_| {});
    assert!(matches!(result, Err(DomError::NodeNotFound(9_999))));
}
