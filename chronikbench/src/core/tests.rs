use super::client::{DnsRecord, RECORD_TYPE_A};
use super::{
    ExecutorSettings, NodeError, NodeTestExecutor, Orchestrator, ResolutionCache, RunConfig,
    Timing,
};
use crate::mock::{MockLocator, MockResolver, NodeScript, ScriptedConnector};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const NODE_A: &str = "https://chronik-a.example.org";
const NODE_B: &str = "https://chronik-b.example.org";
const NODE_C: &str = "https://chronik-c.example.org";

struct Harness {
    connector: Arc<ScriptedConnector>,
    resolver: Arc<MockResolver>,
    orchestrator: Arc<Orchestrator>,
}

fn harness() -> Harness {
    let connector = Arc::new(ScriptedConnector::new());
    let resolver = Arc::new(MockResolver::new());
    resolver.answer("chronik-a.example.org", vec![DnsRecord::new(RECORD_TYPE_A, "192.0.2.1")]);
    resolver.answer("chronik-b.example.org", vec![DnsRecord::new(RECORD_TYPE_A, "192.0.2.2")]);
    resolver.answer("chronik-c.example.org", vec![DnsRecord::new(RECORD_TYPE_A, "192.0.2.3")]);
    let locator = Arc::new(MockLocator::new());
    locator.place("192.0.2.1", "Germany", Some("Falkenstein"));
    locator.place("192.0.2.2", "Finland", None);

    let cache = Arc::new(ResolutionCache::new(resolver.clone(), locator));
    let executor = Arc::new(NodeTestExecutor::new(
        connector.clone(),
        cache,
        ExecutorSettings::default(),
    ));
    Harness {
        connector,
        resolver,
        orchestrator: Arc::new(Orchestrator::new(executor)),
    }
}

fn config(nodes: &[&str], record_budget: usize) -> RunConfig {
    RunConfig {
        nodes: nodes.iter().map(|n| (*n).into()).collect(),
        address: "ecash:qr6lws9uwmjkkaau4w956lugs9nlg9hudqs26lyxkv".to_string(),
        token_id: "ac31bb0bccf33de1683efce4da64f1cb6d8e8d6e098bc01c51d5864deb0e783f".to_string(),
        record_budget,
    }
}

#[tokio::test(start_paused = true)]
async fn test_two_nodes_one_failing() {
    let h = harness();
    let a = h.connector.add(NODE_A, NodeScript::default());
    let b = h.connector.add(
        NODE_B,
        NodeScript {
            history_error: Some(NodeError::Connection("connection reset".to_string())),
            ..Default::default()
        },
    );

    let run = h.orchestrator.start(config(&[NODE_A, NODE_B], 10)).unwrap();
    let (results, summary) = run.collect().await;

    assert!(!summary.cancelled);
    assert_eq!(summary.completed, 2);
    assert_eq!(results.len(), 2);

    assert_eq!(results[0].node, NODE_A);
    assert!(results[0].error.is_none());
    assert!(results[0].offers_supported);
    assert_eq!(results[0].record_count, 10);
    assert_eq!(results[0].location, "Germany, Falkenstein");

    assert_eq!(results[1].node, NODE_B);
    assert_eq!(results[1].error.as_deref(), Some("Address: connection error"));
    assert!(results[1].offers_supported);

    // one page per node per capability
    assert_eq!(a.history_requests(), vec![(0, 10)]);
    assert_eq!(b.history_requests(), vec![(0, 10)]);
    assert_eq!(a.offer_calls(), 1);
    assert_eq!(b.offer_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_offers_do_not_set_combined_error() {
    let h = harness();
    h.connector.add(
        NODE_A,
        NodeScript {
            offer_latency: Duration::from_secs(12),
            ..Default::default()
        },
    );

    let run = h.orchestrator.start(config(&[NODE_A], 10)).unwrap();
    let (results, _) = run.collect().await;

    assert_eq!(results.len(), 1);
    assert!(results[0].error.is_none());
    assert!(!results[0].offers_supported);
    assert_eq!(results[0].token_time, Timing::NotAvailable);
    assert!(results[0].history_time.millis().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_node_does_not_stop_run() {
    let h = harness();
    h.connector.add(NODE_A, NodeScript::default());
    h.connector.add(NODE_C, NodeScript::default());

    let run = h.orchestrator.start(config(&[NODE_A, NODE_B, NODE_C], 10)).unwrap();
    let (results, summary) = run.collect().await;

    assert_eq!(summary.completed, 3);
    let nodes: Vec<_> = results.iter().map(|r| r.node.as_str()).collect();
    assert_eq!(nodes, vec![NODE_A, NODE_B, NODE_C]);
    assert_eq!(results[1].error.as_deref(), Some("Address: connection error"));
    assert!(!results[1].offers_supported);
    assert!(results[2].error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_run_keeps_earlier_results() {
    let h = harness();
    h.connector.add(NODE_A, NodeScript::default());
    let b = h.connector.add(
        NODE_B,
        NodeScript {
            page_latency: Duration::from_secs(30),
            ..Default::default()
        },
    );
    let c = h.connector.add(NODE_C, NodeScript::default());

    let mut run = h.orchestrator.start(config(&[NODE_A, NODE_B, NODE_C], 10)).unwrap();

    let first = run.next().await.unwrap();
    assert_eq!(first.node, NODE_A);

    // B is now paging; abort while its history request is outstanding
    tokio::time::sleep(Duration::from_secs(1)).await;
    run.cancel();
    run.cancel();

    assert!(run.next().await.is_none());
    let summary = run.finish().await;
    assert!(summary.cancelled);
    assert_eq!(summary.completed, 1);
    assert_eq!(b.history_requests().len(), 1);
    assert_eq!(c.probe_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_start_emits_nothing() {
    let h = harness();
    let a = h.connector.add(NODE_A, NodeScript::default());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let (tx, mut rx) = mpsc::channel(4);
    let summary = h
        .orchestrator
        .run(&config(&[NODE_A], 10), &cancel, &tx)
        .await;
    drop(tx);

    assert!(summary.cancelled);
    assert_eq!(summary.completed, 0);
    assert!(rx.recv().await.is_none());
    assert_eq!(a.probe_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_completion_is_noop() {
    let h = harness();
    h.connector.add(NODE_A, NodeScript::default());

    let mut run = h.orchestrator.start(config(&[NODE_A], 10)).unwrap();
    assert!(run.next().await.is_some());
    assert!(run.next().await.is_none());
    run.cancel();

    let summary = run.finish().await;
    assert_eq!(summary.completed, 1);
    assert!(!summary.cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_caches_persist_across_runs() {
    let h = harness();
    h.connector.add(NODE_A, NodeScript::default());

    for _ in 0..2 {
        let run = h.orchestrator.start(config(&[NODE_A], 10)).unwrap();
        let (results, _) = run.collect().await;
        assert_eq!(results[0].address.ip(), Some("192.0.2.1"));
    }

    assert_eq!(h.resolver.calls("chronik-a.example.org"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_first_contact_resolves_each_host_once() {
    let connector = Arc::new(ScriptedConnector::new());
    connector.add(NODE_A, NodeScript::default());
    let resolver = Arc::new(MockResolver::with_latency(Duration::from_millis(40)));
    resolver.answer("chronik-a.example.org", vec![DnsRecord::new(RECORD_TYPE_A, "192.0.2.1")]);
    let locator = Arc::new(MockLocator::with_latency(Duration::from_millis(40)));
    locator.place("192.0.2.1", "Germany", Some("Falkenstein"));

    let cache = Arc::new(ResolutionCache::new(resolver.clone(), locator.clone()));
    let executor = Arc::new(NodeTestExecutor::new(
        connector,
        cache,
        ExecutorSettings::default(),
    ));
    let orchestrator = Arc::new(Orchestrator::new(executor));

    let (results, _) = orchestrator.start(config(&[NODE_A], 10)).unwrap().collect().await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].address.ip(), Some("192.0.2.1"));
    assert_eq!(results[0].location, "Germany, Falkenstein");
    assert_eq!(resolver.calls("chronik-a.example.org"), 1);
    assert_eq!(locator.calls("192.0.2.1"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_tests_of_one_node_run_concurrently() {
    let h = harness();
    h.connector.add(
        NODE_A,
        NodeScript {
            probe_latencies: vec![Duration::from_millis(100)],
            page_latency: Duration::from_secs(2),
            offer_latency: Duration::from_secs(2),
            ..Default::default()
        },
    );

    let start = tokio::time::Instant::now();
    let run = h.orchestrator.start(config(&[NODE_A], 10)).unwrap();
    let (results, _) = run.collect().await;

    assert_eq!(results[0].history_time, Timing::Millis(2_000));
    assert_eq!(results[0].token_time, Timing::Millis(2_000));
    // probes and fetches of both tests overlap
    assert!(start.elapsed() < Duration::from_millis(2_400));
}

#[test]
fn test_config_validation() {
    use super::ConfigError;

    assert!(config(&[NODE_A], 1).validate().is_ok());
    assert!(config(&[NODE_A], 600).validate().is_ok());
    assert_eq!(
        config(&[NODE_A], 0).validate(),
        Err(ConfigError::RecordBudget(0))
    );
    assert_eq!(
        config(&[NODE_A], 601).validate(),
        Err(ConfigError::RecordBudget(601))
    );
    assert_eq!(config(&[], 10).validate(), Err(ConfigError::NoNodes));

    let mut blank = config(&[NODE_A], 10);
    blank.address = "  ".to_string();
    assert_eq!(blank.validate(), Err(ConfigError::EmptyAddress));
}
