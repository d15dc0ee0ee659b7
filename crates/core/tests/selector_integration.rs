//! Integration tests for backend detection and the uniform device contract
//!
//! Every scenario wires fake ports into a real [`BackendSelector`] and a real
//! resilience stack.

mod support;

use std::sync::Arc;
use std::time::Duration;

use mdmlink_common::error::{CommonError, ErrorClassification, ErrorKind};
use mdmlink_common::resilience::MockClock;
use mdmlink_core::{BackendPorts, BackendSelector};
use mdmlink_domain::{Availability, BackendKind, BackendSettings, MutationKind};
use support::ports::{FakeInventory, FakeManagement, FakeSavedSearches};
use support::{classic_device, modern_device, quick_stack, search_row, search_rows};

fn selector(ports: BackendPorts) -> BackendSelector {
    BackendSelector::new(ports, quick_stack(), BackendSettings::default()).unwrap()
}

fn selector_with_clock(ports: BackendPorts, clock: MockClock) -> BackendSelector<MockClock> {
    BackendSelector::with_clock(ports, quick_stack(), BackendSettings::default(), clock).unwrap()
}

fn ids(devices: &[mdmlink_domain::Device]) -> Vec<String> {
    devices.iter().filter_map(|device| device.id.clone()).collect()
}

/// Validates that a usable modern API wins without probing anything else.
///
/// Assertions:
/// - The active backend is `Modern`.
/// - The classic adapter is never probed.
/// - Devices are tagged with their source.
#[tokio::test]
async fn test_modern_backend_preferred() {
    let modern = FakeInventory::available(
        BackendKind::Modern,
        vec![modern_device("1", "design-01", "C02A"), modern_device("2", "ops-02", "C02B")],
    );
    let classic = FakeInventory::available(BackendKind::Classic, Vec::new());
    let selector = selector(
        BackendPorts::new().with_modern(modern.clone()).with_classic(classic.clone()),
    );

    let devices = selector.search_devices("design", None).await.unwrap();

    assert_eq!(selector.active_backend().await.unwrap(), BackendKind::Modern);
    assert_eq!(ids(&devices), vec!["1"]);
    assert_eq!(devices[0].source, BackendKind::Modern);
    assert_eq!(devices[0].serial_number.as_deref(), Some("C02A"));
    assert_eq!(classic.probes(), 0);
}

#[tokio::test]
async fn test_classic_used_when_modern_denied() {
    let modern = FakeInventory::denied(BackendKind::Modern);
    let classic = FakeInventory::available(
        BackendKind::Classic,
        vec![classic_device(7, "lab-07", "C02L"), classic_device(8, "lab-08", "C02M")],
    );
    let selector =
        selector(BackendPorts::new().with_modern(modern.clone()).with_classic(classic.clone()));

    let devices = selector.list_devices(Some(1)).await.unwrap();
    assert_eq!(ids(&devices), vec!["7"]);
    assert_eq!(devices[0].source, BackendKind::Classic);

    let snapshot = selector.capability_snapshot().await;
    assert_eq!(snapshot.modern, Availability::Unavailable);
    assert_eq!(snapshot.classic, Availability::Available);
    assert_eq!(snapshot.active, Some(BackendKind::Classic));
    assert!(!snapshot.can_mutate());
}

/// Validates that probe outcomes are memoized across operations.
///
/// # Test Steps
/// 1. Deny the modern API and serve reads from classic
/// 2. Issue several reads
/// 3. Check each adapter was probed exactly once
#[tokio::test]
async fn test_probes_run_once_per_backend() {
    let modern = FakeInventory::denied(BackendKind::Modern);
    let classic =
        FakeInventory::available(BackendKind::Classic, vec![classic_device(1, "a", "S1")]);
    let selector =
        selector(BackendPorts::new().with_modern(modern.clone()).with_classic(classic.clone()));

    for _ in 0..3 {
        selector.list_devices(None).await.unwrap();
    }
    selector.get_device_details("1").await.unwrap();

    assert_eq!(modern.probes(), 1);
    assert_eq!(classic.probes(), 1);
    assert_eq!(classic.reads(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_server_errors_are_retried_before_marking_unavailable() {
    let modern = FakeInventory::failing(BackendKind::Modern, CommonError::server(503, "down"));
    let classic = FakeInventory::available(BackendKind::Classic, Vec::new());
    let selector =
        selector(BackendPorts::new().with_modern(modern.clone()).with_classic(classic.clone()));

    assert_eq!(selector.active_backend().await.unwrap(), BackendKind::Classic);
    assert_eq!(modern.probes(), 2);
}

#[tokio::test]
async fn test_authentication_failure_propagates_and_is_not_memoized() {
    let modern =
        FakeInventory::failing(BackendKind::Modern, CommonError::authentication("token expired"));
    let selector = selector(BackendPorts::new().with_modern(modern.clone()));

    let first = selector.active_backend().await.unwrap_err();
    assert_eq!(first.kind(), ErrorKind::Authentication);
    let second = selector.active_backend().await.unwrap_err();
    assert_eq!(second.kind(), ErrorKind::Authentication);

    assert_eq!(modern.probes(), 2);
    assert_eq!(selector.capability_snapshot().await.modern, Availability::Unknown);
}

/// Validates saved-search selection by keyword priority.
///
/// Assertions:
/// - "All Managed Macs" wins over an earlier "Inventory" search because
///   `all` has the higher priority.
/// - No candidate is scanned; the dataset is fetched on first read only.
#[tokio::test]
async fn test_fallback_prefers_keyword_match() {
    let searches = FakeSavedSearches::new()
        .with_search("10", "Small Fleet", search_rows(1, 1))
        .with_search("11", "Inventory Export", search_rows(1, 2))
        .with_search("12", "All Managed Macs", search_rows(1, 3))
        .build();
    let selector = selector(
        BackendPorts::new()
            .with_modern(FakeInventory::denied(BackendKind::Modern))
            .with_classic(FakeInventory::denied(BackendKind::Classic))
            .with_saved_searches(searches.clone()),
    );

    assert_eq!(selector.active_backend().await.unwrap(), BackendKind::AdvancedSearch);
    assert!(searches.runs().is_empty());

    let snapshot = selector.capability_snapshot().await;
    assert_eq!(snapshot.saved_search.map(|search| search.id), Some("12".to_owned()));
    assert!(!snapshot.dataset_cached);

    let devices = selector.list_devices(None).await.unwrap();
    assert_eq!(devices.len(), 3);
    assert_eq!(devices[0].source, BackendKind::AdvancedSearch);
    assert_eq!(searches.runs(), vec!["12"]);
}

/// Validates the size-based scan when no name matches a keyword.
///
/// # Test Steps
/// 1. Offer three candidates, one of which is not readable
/// 2. Resolve the backend
/// 3. Check the largest readable candidate wins and seeds the dataset
#[tokio::test]
async fn test_fallback_scans_for_largest_dataset() {
    let searches = FakeSavedSearches::new()
        .with_search("20", "Finance", search_rows(1, 2))
        .with_failing_search("21", "Restricted", CommonError::permission_denied("search 21"))
        .with_search("22", "Design Studio", search_rows(100, 5))
        .build();
    let selector = selector(
        BackendPorts::new()
            .with_modern(FakeInventory::denied(BackendKind::Modern))
            .with_saved_searches(searches.clone()),
    );

    assert_eq!(selector.active_backend().await.unwrap(), BackendKind::AdvancedSearch);

    let snapshot = selector.capability_snapshot().await;
    assert_eq!(snapshot.saved_search.map(|search| search.name), Some("Design Studio".to_owned()));
    assert!(snapshot.dataset_cached);
    assert_eq!(snapshot.classic, Availability::Unavailable);

    let devices = selector.search_devices("mac-10", Some(10)).await.unwrap();
    assert_eq!(ids(&devices), vec!["100", "101", "102", "103", "104"]);
    assert_eq!(searches.runs_of("22"), 1);

    let scan_keys = selector.stack().breakers().keys();
    assert!(scan_keys.contains(&"advanced_search.scan-1".to_owned()));
}

#[tokio::test]
async fn test_scan_is_bounded_to_ten_candidates() {
    let mut searches = FakeSavedSearches::new();
    for index in 0..12u64 {
        searches =
            searches.with_search(&format!("s{index}"), &format!("Report {index}"), search_rows(1, index));
    }
    let searches = searches.build();
    let selector = selector(BackendPorts::new().with_saved_searches(searches.clone()));

    selector.active_backend().await.unwrap();

    let snapshot = selector.capability_snapshot().await;
    assert_eq!(snapshot.saved_search.map(|search| search.id), Some("s9".to_owned()));
    assert_eq!(searches.runs().len(), 10);
    assert_eq!(searches.runs_of("s11"), 0);
}

#[tokio::test]
async fn test_no_suitable_backend_errors() {
    let without_adapter = selector(
        BackendPorts::new().with_modern(FakeInventory::denied(BackendKind::Modern)),
    );
    let err = without_adapter.active_backend().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSuitableBackend);

    let empty = selector(BackendPorts::new().with_saved_searches(FakeSavedSearches::new().build()));
    let err = empty.list_devices(None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSuitableBackend);

    let unreadable = selector(
        BackendPorts::new().with_saved_searches(
            FakeSavedSearches::new()
                .with_failing_search("1", "Finance", CommonError::permission_denied("search 1"))
                .build(),
        ),
    );
    let err = unreadable.search_devices("x", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSuitableBackend);
    assert!(unreadable.capability_snapshot().await.saved_search.is_none());
}

/// Validates the dataset TTL.
///
/// Assertions:
/// - Reads inside the TTL reuse the cached rows.
/// - A read after the TTL fetches the rows again.
/// - `invalidate_dataset` forces a fetch without touching the chosen search.
#[tokio::test]
async fn test_dataset_refreshes_after_ttl() {
    let clock = MockClock::new();
    let searches =
        FakeSavedSearches::new().with_search("30", "All Computers", search_rows(1, 4)).build();
    let selector = selector_with_clock(
        BackendPorts::new().with_saved_searches(searches.clone()),
        clock.clone(),
    );

    selector.list_devices(None).await.unwrap();
    clock.advance(Duration::from_secs(299));
    selector.search_devices("mac-2", None).await.unwrap();
    assert_eq!(searches.runs_of("30"), 1);

    clock.advance(Duration::from_secs(2));
    selector.list_devices(None).await.unwrap();
    assert_eq!(searches.runs_of("30"), 2);

    selector.invalidate_dataset();
    assert!(!selector.capability_snapshot().await.dataset_cached);
    selector.list_devices(None).await.unwrap();
    assert_eq!(searches.runs_of("30"), 3);
    assert_eq!(selector.dataset_stats().size, 1);
}

#[tokio::test]
async fn test_fallback_details_lookup() {
    let searches = FakeSavedSearches::new()
        .with_search("40", "Inventory", vec![search_row(5, "kiosk-5"), search_row(6, "kiosk-6")])
        .build();
    let selector = selector(BackendPorts::new().with_saved_searches(searches));

    let device = selector.get_device_details("6").await.unwrap();
    assert_eq!(device.name.as_deref(), Some("kiosk-6"));
    assert_eq!(device.serial_number.as_deref(), Some("SN0006"));
    assert_eq!(device.username, None);

    let err = selector.get_device_details("99").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

/// Validates batch detail lookups.
///
/// Assertions:
/// - One outcome per id, in input order.
/// - A missing device does not prevent the others from resolving.
#[tokio::test]
async fn test_details_batch_preserves_order() {
    let modern = FakeInventory::available(
        BackendKind::Modern,
        (1..=4).map(|i| modern_device(&i.to_string(), &format!("m{i}"), "S")).collect(),
    );
    let selector = selector(BackendPorts::new().with_modern(modern));

    let outcomes = selector
        .get_device_details_batch(vec!["3".into(), "missing".into(), "1".into()])
        .await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].as_ref().unwrap().name.as_deref(), Some("m3"));
    assert_eq!(outcomes[1].as_ref().unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(outcomes[2].as_ref().unwrap().name.as_deref(), Some("m1"));
    assert_eq!(selector.stack().limiter().stats().completed, 3);
}

#[tokio::test]
async fn test_details_batch_reports_resolution_failure_per_item() {
    let selector = selector(BackendPorts::new());
    let outcomes = selector.get_device_details_batch(vec!["1".into(), "2".into()]).await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|outcome| {
        matches!(outcome, Err(err) if err.kind() == ErrorKind::NoSuitableBackend)
    }));
}

#[tokio::test]
async fn test_mutations_served_by_modern_backend() {
    let management = FakeManagement::new();
    let selector = selector(
        BackendPorts::new()
            .with_modern(FakeInventory::available(BackendKind::Modern, Vec::new()))
            .with_management(management.clone()),
    );

    let receipt =
        selector.execute_policy("42", vec!["1".into(), "2".into()], true).await.unwrap();
    assert!(receipt.accepted);
    assert_eq!(receipt.device_ids.len(), 2);

    selector.deploy_script("7", vec!["1".into()], true).await.unwrap();
    selector.update_inventory("1").await.unwrap();

    assert_eq!(
        management.calls(),
        vec![
            (MutationKind::PolicyExecution, "42".to_owned()),
            (MutationKind::ScriptDeployment, "7".to_owned()),
            (MutationKind::InventoryUpdate, "1".to_owned()),
        ]
    );
    assert!(selector.capability_snapshot().await.can_mutate());
}

/// Validates that unconfirmed or untargeted mutations never reach a port.
#[tokio::test]
async fn test_mutation_validation_precedes_capability_check() {
    let management = FakeManagement::new();
    let modern = FakeInventory::available(BackendKind::Modern, Vec::new());
    let selector = selector(
        BackendPorts::new().with_modern(modern.clone()).with_management(management.clone()),
    );

    let unconfirmed = selector.execute_policy("42", vec!["1".into()], false).await.unwrap_err();
    assert_eq!(unconfirmed.kind(), ErrorKind::Validation);

    let untargeted = selector.deploy_script("7", Vec::new(), true).await.unwrap_err();
    assert_eq!(untargeted.kind(), ErrorKind::Validation);

    let blank = selector.update_inventory("  ").await.unwrap_err();
    assert_eq!(blank.kind(), ErrorKind::Validation);

    assert!(management.calls().is_empty());
    assert_eq!(modern.probes(), 0);
}

#[tokio::test]
async fn test_mutations_refused_without_modern_backend() {
    let management = FakeManagement::new();
    let searches =
        FakeSavedSearches::new().with_search("1", "All Computers", search_rows(1, 2)).build();
    let selector = selector(
        BackendPorts::new()
            .with_modern(FakeInventory::denied(BackendKind::Modern))
            .with_classic(FakeInventory::available(BackendKind::Classic, Vec::new()))
            .with_saved_searches(searches)
            .with_management(management.clone()),
    );

    let err = selector.execute_policy("42", vec!["1".into()], true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapabilityUnavailable);
    assert!(!err.is_retryable());
    assert!(management.calls().is_empty());

    let no_port = selector_without_management();
    let err = no_port.update_inventory("1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapabilityUnavailable);
}

fn selector_without_management() -> BackendSelector {
    selector(
        BackendPorts::new()
            .with_modern(FakeInventory::available(BackendKind::Modern, Vec::new())),
    )
}

#[tokio::test]
async fn test_reset_forgets_detection() {
    let modern = FakeInventory::denied(BackendKind::Modern);
    let searches =
        FakeSavedSearches::new().with_search("1", "All Computers", search_rows(1, 2)).build();
    let selector = selector(
        BackendPorts::new().with_modern(modern.clone()).with_saved_searches(searches.clone()),
    );

    selector.list_devices(None).await.unwrap();
    selector.reset().await;

    let snapshot = selector.capability_snapshot().await;
    assert_eq!(snapshot.modern, Availability::Unknown);
    assert_eq!(snapshot.active, None);
    assert!(snapshot.saved_search.is_none());
    assert!(!snapshot.dataset_cached);

    selector.list_devices(None).await.unwrap();
    assert_eq!(modern.probes(), 2);
    assert_eq!(searches.runs_of("1"), 2);
}

#[tokio::test]
async fn test_zero_limit_rejected() {
    let selector = selector(
        BackendPorts::new().with_modern(FakeInventory::available(BackendKind::Modern, Vec::new())),
    );
    let err = selector.search_devices("mac", Some(0)).await.unwrap_err();
    assert_eq!(err, CommonError::validation("limit", "must be greater than 0"));
}

#[tokio::test]
async fn test_selector_is_shareable_across_tasks() {
    let modern = FakeInventory::available(BackendKind::Modern, vec![modern_device("1", "a", "S")]);
    let selector = Arc::new(selector(BackendPorts::new().with_modern(modern.clone())));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let selector = Arc::clone(&selector);
            tokio::spawn(async move { selector.list_devices(None).await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().len(), 1);
    }

    assert_eq!(modern.probes(), 1);
}
