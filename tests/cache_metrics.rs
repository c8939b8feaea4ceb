mod common;

use std::collections::HashSet;

use common::TestApp;
use metrics_util::debugging::DebuggingRecorder;
use time::Duration;
use yatube::cache::{
    METRIC_CACHE_ENTRIES, METRIC_CACHE_EXPIRED, METRIC_CACHE_HIT, METRIC_CACHE_MISS,
};

#[tokio::test]
async fn index_cache_emits_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let app = TestApp::with_cache();

    // miss + store, hit, then expiry
    app.get("/", None).await;
    app.get("/", None).await;
    app.clock.advance(Duration::seconds(21));
    app.get("/", None).await;

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(key, _, _, _)| key.key().name().to_string())
        .collect();

    for expected in [
        METRIC_CACHE_HIT,
        METRIC_CACHE_MISS,
        METRIC_CACHE_EXPIRED,
        METRIC_CACHE_ENTRIES,
    ] {
        assert!(names.contains(expected), "missing metric {expected}");
    }
}
