use std::time::{Duration, Instant};

use coinwatch_client::{PatternExtractor, ReqwestFetcher};
use coinwatch_core::delivery::{self, Delivery, OutcomeReceiver};
use coinwatch_core::testutil::RecordingConsumer;
use coinwatch_core::traits::Extractor;
use coinwatch_core::{CycleOutcome, FailureStage, Record, WatchConfig, Watcher, WatcherState};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING: &str = include_str!("fixtures/listing.html");
const RECV_TIMEOUT: Duration = Duration::from_secs(10);

fn expected_listing() -> Vec<Record> {
    vec![
        Record::new("Bitcoin", "$64,210.55", "$1.26T"),
        Record::new("Ethereum", "$3,120.10", "$375.02B"),
        Record::new("Tether", "$1.00", "$112.40B"),
        Record::new("BNB", "$578.34", "$84.37B"),
        Record::new("Solana", "$142.87", "$66.12B"),
    ]
}

async fn serve(template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

fn watcher(url: &str, interval: Duration) -> Watcher<ReqwestFetcher, PatternExtractor> {
    Watcher::new(
        ReqwestFetcher::new(),
        PatternExtractor::with_defaults().unwrap(),
        WatchConfig::default()
            .with_worker_id("pipeline-test")
            .with_url(url)
            .with_interval(interval),
    )
    .unwrap()
}

async fn next(rx: &mut OutcomeReceiver) -> Delivery {
    tokio::time::timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for delivery")
        .expect("channel closed")
}

#[test]
fn default_patterns_extract_sample_listing() {
    let records = PatternExtractor::with_defaults()
        .unwrap()
        .extract(LISTING)
        .unwrap();
    assert_eq!(records, expected_listing());
}

#[tokio::test]
async fn cycle_delivers_sample_listing_to_consumer() {
    let server = serve(ResponseTemplate::new(200).set_body_string(LISTING)).await;
    let (tx, mut rx) = delivery::channel();
    let handle = watcher(&server.uri(), Duration::from_secs(60)).spawn(tx);

    let first = next(&mut rx).await;
    handle.stop().await;

    let mut consumer = RecordingConsumer::default();
    delivery::route(first, &mut consumer);
    let handled = delivery::dispatch(rx, &mut consumer).await;

    assert_eq!(handled, 0);
    assert!(consumer.errors.is_empty());
    assert_eq!(consumer.data, vec![(1, expected_listing())]);
}

#[tokio::test]
async fn fetch_failure_is_reported_and_schedule_continues() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let interval = Duration::from_millis(100);
    let (tx, mut rx) = delivery::channel();
    let handle = watcher(&format!("http://127.0.0.1:{port}/"), interval).spawn(tx);

    let first = next(&mut rx).await;
    let first_at = Instant::now();
    let second = next(&mut rx).await;
    let gap = first_at.elapsed();
    handle.stop().await;

    for delivery in [&first, &second] {
        match &delivery.outcome {
            CycleOutcome::Failed { stage, message } => {
                assert_eq!(*stage, FailureStage::Fetch);
                assert!(message.starts_with("fetch failed:"), "{message}");
            }
            other => panic!("expected fetch failure, got {other:?}"),
        }
    }
    assert_eq!((first.cycle, second.cycle), (1, 2));
    assert!(gap >= Duration::from_millis(50), "second cycle came after {gap:?}");
}

#[tokio::test]
async fn parse_failure_message_differs_from_fetch_failure() {
    let empty_page = ResponseTemplate::new(200).set_body_string("<html><body></body></html>");
    let server = serve(empty_page).await;
    let (tx, mut rx) = delivery::channel();
    let handle = watcher(&server.uri(), Duration::from_secs(60)).spawn(tx);

    let first = next(&mut rx).await;
    handle.stop().await;

    match first.outcome {
        CycleOutcome::Failed { stage, message } => {
            assert_eq!(stage, FailureStage::Parse);
            assert_eq!(
                message,
                "parse failed: Parse error: no structured data found"
            );
        }
        other => panic!("expected parse failure, got {other:?}"),
    }
}

#[tokio::test]
async fn error_page_with_listing_markup_still_parses() {
    let server = serve(ResponseTemplate::new(500).set_body_string(LISTING)).await;
    let outcome = watcher(&server.uri(), Duration::from_secs(60)).run_once().await;
    assert_eq!(outcome, CycleOutcome::Data(expected_listing()));
}

#[tokio::test]
async fn stop_lets_slow_cycle_finish() {
    let server = serve(
        ResponseTemplate::new(200)
            .set_body_string(LISTING)
            .set_delay(Duration::from_millis(300)),
    )
    .await;
    let (tx, mut rx) = delivery::channel();
    let handle = watcher(&server.uri(), Duration::from_secs(60)).spawn(tx);

    let deadline = Instant::now() + RECV_TIMEOUT;
    while handle.state() != WatcherState::Running {
        assert!(Instant::now() < deadline, "cycle never started");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    handle.stop().await;

    let delivered = rx.try_recv().expect("in-flight cycle should deliver");
    assert_eq!(delivered.outcome, CycleOutcome::Data(expected_listing()));
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn malformed_url_fails_cycle_at_fetch_stage() {
    let outcome = watcher("not a url", Duration::from_secs(60)).run_once().await;
    match outcome {
        CycleOutcome::Failed { stage, message } => {
            assert_eq!(stage, FailureStage::Fetch);
            assert!(
                message.starts_with("fetch failed: Init error: Invalid URL 'not a url'"),
                "{message}"
            );
        }
        other => panic!("expected fetch failure, got {other:?}"),
    }
}
