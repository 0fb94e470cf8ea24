//! Node context isolation across threads and JSONL file output

use std::sync::{Arc, Barrier};
use std::thread;

use switchnet_core::NodeId;
use switchnet_logging::{LogConfig, NodeContextGuard, SubscriberBuilder};
use uuid::Uuid;

/// Each thread sees only its own node context
#[test]
fn test_concurrent_node_contexts() {
    const NUM_THREADS: u32 = 16;
    const ITERATIONS: u32 = 200;

    let barrier = Arc::new(Barrier::new(NUM_THREADS as usize));
    let run_id = Uuid::new_v4();

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|thread_id| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..ITERATIONS {
                    let node = NodeId(thread_id * ITERATIONS + i);
                    let _guard = NodeContextGuard::new(node, run_id);
                    assert_eq!(NodeContextGuard::current_node_id(), Some(node));
                    assert_eq!(NodeContextGuard::current_run_id(), Some(run_id));
                }
                assert!(NodeContextGuard::current().is_none());
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

/// The only test in this binary that installs a global subscriber
#[test]
fn test_file_output_is_jsonl() {
    let dir = tempfile::tempdir().unwrap();
    let guard = SubscriberBuilder::new()
        .with_config(LogConfig::for_run(true, Some(dir.path().to_path_buf())))
        .init()
        .unwrap();

    tracing::warn!(node = 3, id = "m7", "Message bounced");
    drop(guard);

    let contents = std::fs::read_to_string(dir.path().join("switchnet.log")).unwrap();
    let line = contents.lines().next().unwrap();
    let value: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(value["node"], 3);
    assert_eq!(value["level"], "WARN");
}
