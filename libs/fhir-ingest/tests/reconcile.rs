mod test_support;

use interop_ingest::{
    Error, IdentifierReconciler, LookupKey, Origin, ReconcilerConfig, Resolution,
    SearchAggregator, SearchConfig,
};
use std::sync::Arc;
use std::time::Duration;
use test_support::*;

fn reconciler(
    registry: Arc<CountingRegistry>,
    remote: Arc<IdentifierSearchFetcher>,
    batch_size: usize,
) -> IdentifierReconciler {
    let config = ReconcilerConfig {
        max_identifiers_per_query: batch_size,
        ..ReconcilerConfig::default()
    };
    IdentifierReconciler::new(
        registry,
        SearchAggregator::new(remote, &SearchConfig::default()),
        &config,
    )
}

fn values(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|v| v.to_string()).collect()
}

#[tokio::test]
async fn registry_hits_and_remote_matches_are_merged() {
    let mda = tenant("mda");
    let registry = shared(CountingRegistry::new(&mda, &[("MRN1", "FHIR1")]));
    let remote = shared(IdentifierSearchFetcher::new(vec![patient("FHIR2", &["MRN2"])]));

    let resolved = reconciler(registry, remote.clone(), 10)
        .resolve(&mda, MRN_SYSTEM, &values(&["MRN1", "MRN2"]))
        .await
        .unwrap();

    assert_eq!(resolved.len(), 2);
    assert_eq!(
        resolved["MRN1"],
        Resolution::Registry {
            id: "FHIR1".to_string()
        }
    );
    assert_eq!(resolved["MRN2"].id(), Some("FHIR2"));
    assert_eq!(resolved["MRN2"].origin(), Some(Origin::Remote));
    assert_eq!(
        resolved["MRN2"].resource().and_then(|r| r.id()),
        Some("FHIR2")
    );
    assert_eq!(remote.queries(), vec![format!("{MRN_SYSTEM}|MRN2")]);
}

#[tokio::test]
async fn registry_resolution_wins_and_skips_remote() {
    let acme = tenant("acme");
    let registry = shared(CountingRegistry::new(
        &acme,
        &[("MRN1", "FHIR1"), ("MRN2", "FHIR2")],
    ));
    // The remote system knows MRN1 under a different id; it must not be asked.
    let remote = shared(IdentifierSearchFetcher::new(vec![patient("OTHER", &["MRN1"])]));

    let resolved = reconciler(registry.clone(), remote.clone(), 10)
        .resolve(&acme, MRN_SYSTEM, &values(&["MRN1", "MRN2"]))
        .await
        .unwrap();

    assert_eq!(resolved["MRN1"].origin(), Some(Origin::Registry));
    assert_eq!(resolved["MRN1"].id(), Some("FHIR1"));
    assert_eq!(registry.calls(), 1);
    assert_eq!(remote.calls(), 0);
}

#[tokio::test]
async fn unresolved_values_are_searched_in_ceil_m_over_b_batches() {
    let acme = tenant("acme");
    let registry = shared(CountingRegistry::new(&acme, &[]));
    let remote = shared(IdentifierSearchFetcher::new(Vec::new()));
    let mrns: Vec<String> = (1..=7).map(|n| format!("MRN{n}")).collect();

    let resolved = reconciler(registry, remote.clone(), 3)
        .resolve(&acme, MRN_SYSTEM, &mrns)
        .await
        .unwrap();

    assert!(resolved.is_empty());
    assert_eq!(remote.calls(), 3);

    let mut batch_sizes: Vec<usize> = remote
        .queries()
        .iter()
        .map(|q| q.split(',').count())
        .collect();
    batch_sizes.sort();
    assert_eq!(batch_sizes, vec![1, 3, 3]);
}

#[tokio::test]
async fn keys_without_system_or_value_are_invalid_and_not_looked_up() {
    let acme = tenant("acme");
    let registry = shared(CountingRegistry::new(&acme, &[("MRN1", "FHIR1")]));
    let remote = shared(IdentifierSearchFetcher::new(Vec::new()));

    let resolved = reconciler(registry.clone(), remote.clone(), 10)
        .resolve_keys(
            &acme,
            vec![
                LookupKey::new("a", MRN_SYSTEM, "MRN1"),
                LookupKey::new("b", "", "MRN2"),
                LookupKey::new("c", MRN_SYSTEM, "  "),
            ],
        )
        .await
        .unwrap();

    assert_eq!(resolved["a"].id(), Some("FHIR1"));
    assert!(matches!(resolved["b"], Resolution::InvalidKey { .. }));
    assert!(matches!(resolved["c"], Resolution::InvalidKey { .. }));
    assert_eq!(registry.requested(), vec![mrn_key("MRN1")]);
    assert_eq!(remote.calls(), 0);
}

#[tokio::test]
async fn only_invalid_keys_never_reach_the_registry() {
    let acme = tenant("acme");
    let registry = shared(CountingRegistry::new(&acme, &[]));
    let remote = shared(IdentifierSearchFetcher::new(Vec::new()));

    let resolved = reconciler(registry.clone(), remote, 10)
        .resolve(&acme, "", &values(&["MRN1"]))
        .await
        .unwrap();

    assert!(matches!(resolved["MRN1"], Resolution::InvalidKey { .. }));
    assert_eq!(registry.calls(), 0);
}

#[tokio::test]
async fn one_remote_resource_can_satisfy_several_values() {
    let acme = tenant("acme");
    let registry = shared(CountingRegistry::new(&acme, &[]));
    let remote = shared(IdentifierSearchFetcher::new(vec![patient(
        "FHIR7",
        &["MRN7", "MRN8"],
    )]));

    let resolved = reconciler(registry, remote.clone(), 10)
        .resolve(&acme, MRN_SYSTEM, &values(&["MRN7", "MRN8"]))
        .await
        .unwrap();

    assert_eq!(resolved["MRN7"].id(), Some("FHIR7"));
    assert_eq!(resolved["MRN8"].id(), Some("FHIR7"));
    assert_eq!(remote.calls(), 1);
}

#[tokio::test]
async fn remote_identifiers_missing_parts_are_skipped() {
    let acme = tenant("acme");
    let registry = shared(CountingRegistry::new(&acme, &[]));
    let partial = resource(serde_json::json!({
        "resourceType": "Patient",
        "id": "P1",
        "identifier": [
            {"value": "MRN1"},
            {"system": MRN_SYSTEM, "value": "MRN1"}
        ]
    }));
    let remote = shared(IdentifierSearchFetcher::new(vec![partial]));

    let resolved = reconciler(registry, remote, 10)
        .resolve(&acme, MRN_SYSTEM, &values(&["MRN1"]))
        .await
        .unwrap();

    assert_eq!(resolved["MRN1"].id(), Some("P1"));
}

#[tokio::test]
async fn registry_failure_fails_the_call() {
    let acme = tenant("acme");
    let remote = shared(IdentifierSearchFetcher::new(Vec::new()));

    let err = reconciler(shared(CountingRegistry::failing()), remote.clone(), 10)
        .resolve(&acme, MRN_SYSTEM, &values(&["MRN1"]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Registry(_)));
    assert_eq!(remote.calls(), 0);
}

fn concurrent_reconciler(
    registry: Arc<CountingRegistry>,
    remote: Arc<IdentifierSearchFetcher>,
    batch_size: usize,
    max_concurrent_batches: usize,
) -> IdentifierReconciler {
    let config = ReconcilerConfig {
        max_identifiers_per_query: batch_size,
        max_concurrent_batches,
        ..ReconcilerConfig::default()
    };
    IdentifierReconciler::new(
        registry,
        SearchAggregator::new(remote, &SearchConfig::default()),
        &config,
    )
}

#[tokio::test]
async fn remote_batches_in_flight_never_exceed_the_limit() {
    let acme = tenant("acme");
    let registry = shared(CountingRegistry::new(&acme, &[]));
    let remote = shared(
        IdentifierSearchFetcher::new(Vec::new()).with_latency(Duration::from_millis(10)),
    );
    let mrns: Vec<String> = (1..=10).map(|n| format!("MRN{n}")).collect();

    concurrent_reconciler(registry, remote.clone(), 1, 3)
        .resolve(&acme, MRN_SYSTEM, &mrns)
        .await
        .unwrap();

    assert_eq!(remote.calls(), 10);
    assert_eq!(remote.peak_in_flight(), 3);
}

#[tokio::test]
async fn out_of_order_batch_completion_keeps_first_match_per_key() {
    let acme = tenant("acme");
    let remote_resources = || {
        vec![
            patient("FHIR-A", &["MRN1"]),
            patient("FHIR-B", &["MRN1", "MRN2"]),
            patient("FHIR-3", &["MRN3"]),
        ]
    };
    let mrns = values(&["MRN1", "MRN2", "MRN3", "MRN4"]);

    // The first batch (MRN1, MRN2) answers last.
    let remote = shared(
        IdentifierSearchFetcher::new(remote_resources())
            .slow_for("MRN1", Duration::from_millis(40)),
    );
    let concurrent = concurrent_reconciler(
        shared(CountingRegistry::new(&acme, &[])),
        remote.clone(),
        2,
        2,
    )
    .resolve(&acme, MRN_SYSTEM, &mrns)
    .await
    .unwrap();

    let completed = remote.completed();
    assert_eq!(completed.len(), 2);
    assert!(completed[0].contains("MRN3"));
    assert!(completed[1].contains("MRN1"));

    assert_eq!(concurrent["MRN1"].id(), Some("FHIR-A"));
    assert_eq!(concurrent["MRN2"].id(), Some("FHIR-B"));
    assert_eq!(concurrent["MRN3"].id(), Some("FHIR-3"));
    assert!(!concurrent.contains_key("MRN4"));

    let sequential = concurrent_reconciler(
        shared(CountingRegistry::new(&acme, &[])),
        shared(IdentifierSearchFetcher::new(remote_resources())),
        2,
        1,
    )
    .resolve(&acme, MRN_SYSTEM, &mrns)
    .await
    .unwrap();
    assert_eq!(concurrent, sequential);
}
