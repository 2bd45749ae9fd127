mod common;

use common::{GatedTransfer, MemoryImages, R1, ScriptedTransfer, resolver, wait_until};
use docker_registry_resolver::registry::TransferOutcome;
use docker_registry_resolver::{
    EventSink, OperationCoordinator, ProgressEvent, PushDriver, ResolverError,
};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

const REPO: &str = "localhost:5000/dockercli/busybox";

fn driver() -> PushDriver {
    PushDriver::new(resolver(&[R1], &[]), OperationCoordinator::new())
}

#[tokio::test]
async fn test_push_never_tagged_repository() {
    let err = driver()
        .push(
            "dockercli/busybox",
            &MemoryImages::default(),
            &ScriptedTransfer::new(&[]),
            &EventSink::disabled(),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Repository does not exist"));
}

#[tokio::test]
async fn test_push_missing_tag_is_distinct() {
    let images = MemoryImages::default().with(REPO, &["latest"]);
    let err = driver()
        .push(
            &format!("{}:x", REPO),
            &images,
            &ScriptedTransfer::new(&[(R1, TransferOutcome::Found)]),
            &EventSink::disabled(),
        )
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("does not exist"));
    assert!(!message.contains("Repository does not exist"));
}

#[tokio::test]
async fn test_push_root_repository_refused() {
    let images = MemoryImages::default().with("busybox", &["latest"]);
    let err = driver()
        .push("busybox", &images, &ScriptedTransfer::new(&[]), &EventSink::disabled())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("You cannot push a \"root\" repository"));
}

#[tokio::test]
async fn test_push_without_tag_pushes_all_local_tags() {
    let images = MemoryImages::default().with(REPO, &["t2", "t1"]);
    let transfer = ScriptedTransfer::new(&[(R1, TransferOutcome::Found)]);

    let report = driver()
        .push(REPO, &images, &transfer, &EventSink::disabled())
        .await
        .unwrap();

    assert_eq!(report.tags, vec!["t1", "t2"]);
    assert!(!report.waited);
    assert_eq!(
        transfer.attempts(),
        vec![format!("{}:t1", REPO), format!("{}:t2", REPO)]
    );
}

#[tokio::test]
async fn test_push_remote_not_found_maps_to_repository_error() {
    let images = MemoryImages::default().with(REPO, &["latest"]);
    let err = driver()
        .push(
            REPO,
            &images,
            &ScriptedTransfer::new(&[(R1, TransferOutcome::NotFound)]),
            &EventSink::disabled(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ResolverError::RepositoryNotFound { .. }));
}

#[tokio::test]
async fn test_push_transport_error_releases_lease() {
    let images = MemoryImages::default().with(REPO, &["latest"]);
    let driver = driver();
    let err = driver
        .push(
            REPO,
            &images,
            &ScriptedTransfer::new(&[(R1, TransferOutcome::TransportError("reset".to_string()))]),
            &EventSink::disabled(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ResolverError::Transport { .. }));
    assert!(!driver.coordinator().is_in_progress(REPO));
}

#[tokio::test]
async fn test_concurrent_pushes_serialize() {
    let driver = driver();
    let images = Arc::new(MemoryImages::default().with(REPO, &["latest"]));
    let transfer = Arc::new(GatedTransfer::new());

    let first = {
        let (driver, images, transfer) = (driver.clone(), images.clone(), transfer.clone());
        tokio::spawn(async move {
            driver
                .push(REPO, images.as_ref(), transfer.as_ref(), &EventSink::disabled())
                .await
        })
    };
    wait_until(|| transfer.started.load(Ordering::SeqCst) == 1).await;

    // A query while the first push holds the lease sees it in progress
    let coordinator = driver.coordinator();
    assert!(coordinator.is_in_progress(REPO));
    let err = coordinator.try_acquire(REPO).unwrap_err();
    assert!(err.to_string().contains("already in progress"));

    let (sink, mut events) = EventSink::channel();
    let second = {
        let (driver, images, transfer) = (driver.clone(), images.clone(), transfer.clone());
        tokio::spawn(async move {
            driver
                .push(REPO, images.as_ref(), transfer.as_ref(), &sink)
                .await
        })
    };

    match events.recv().await {
        Some(ProgressEvent::Waiting { message, .. }) => {
            assert!(message.contains("already in progress"))
        }
        other => panic!("expected waiting event, got {:?}", other),
    }
    assert_eq!(transfer.started.load(Ordering::SeqCst), 1);

    transfer.open(2);
    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();

    assert!(!first.waited);
    assert!(second.waited);
    assert_eq!(transfer.finished.load(Ordering::SeqCst), 2);
    assert_eq!(transfer.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.statistics().tracked_identities, 0);
}

#[tokio::test]
async fn test_aborted_push_does_not_deadlock_next_push() {
    let driver = driver();
    let images = Arc::new(MemoryImages::default().with(REPO, &["latest"]));
    let transfer = Arc::new(GatedTransfer::new());

    let killed = {
        let (driver, images, transfer) = (driver.clone(), images.clone(), transfer.clone());
        tokio::spawn(async move {
            driver
                .push(REPO, images.as_ref(), transfer.as_ref(), &EventSink::disabled())
                .await
        })
    };
    wait_until(|| transfer.started.load(Ordering::SeqCst) == 1).await;
    killed.abort();
    assert!(killed.await.unwrap_err().is_cancelled());

    transfer.open(1);
    let report = driver
        .push(REPO, images.as_ref(), transfer.as_ref(), &EventSink::disabled())
        .await
        .unwrap();
    assert_eq!(report.tags, vec!["latest"]);
}

#[tokio::test]
async fn test_cancelled_waiter_reports_lease_cancelled() {
    let driver = driver();
    let images = MemoryImages::default().with(REPO, &["latest"]);
    let lease = driver.coordinator().acquire(REPO).await;

    let err = driver
        .push_until(
            REPO,
            &images,
            &ScriptedTransfer::new(&[(R1, TransferOutcome::Found)]),
            &EventSink::disabled(),
            async {},
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ResolverError::LeaseCancelled {
            identity: REPO.to_string()
        }
    );

    drop(lease);
    assert_eq!(driver.coordinator().statistics().tracked_identities, 0);
}

#[tokio::test]
async fn test_cancel_while_holding_lease_releases_it() {
    let driver = driver();
    let images = Arc::new(MemoryImages::default().with(REPO, &["latest"]));
    let transfer = Arc::new(GatedTransfer::new());
    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

    let push = {
        let (driver, images, transfer) = (driver.clone(), images.clone(), transfer.clone());
        tokio::spawn(async move {
            driver
                .push_until(
                    REPO,
                    images.as_ref(),
                    transfer.as_ref(),
                    &EventSink::disabled(),
                    async {
                        cancel_rx.await.ok();
                    },
                )
                .await
        })
    };
    wait_until(|| transfer.started.load(Ordering::SeqCst) == 1).await;
    assert!(driver.coordinator().is_in_progress(REPO));

    cancel_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), push)
        .await
        .expect("cancelled push did not return")
        .unwrap();

    assert_eq!(
        result.unwrap_err(),
        ResolverError::LeaseCancelled {
            identity: REPO.to_string()
        }
    );
    assert!(!driver.coordinator().is_in_progress(REPO));
    assert_eq!(transfer.finished.load(Ordering::SeqCst), 0);
    assert!(driver.coordinator().try_acquire(REPO).is_ok());
}

#[tokio::test]
async fn test_already_cancelled_uncontended_push_does_nothing() {
    let driver = driver();
    let images = MemoryImages::default().with(REPO, &["latest"]);
    let transfer = ScriptedTransfer::new(&[(R1, TransferOutcome::Found)]);

    let err = driver
        .push_until(REPO, &images, &transfer, &EventSink::disabled(), async {})
        .await
        .unwrap_err();

    assert!(matches!(err, ResolverError::LeaseCancelled { .. }));
    assert!(transfer.attempts().is_empty());
    assert!(!driver.coordinator().is_in_progress(REPO));
}

#[tokio::test]
async fn test_leases_granted_in_arrival_order() {
    let coordinator = OperationCoordinator::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    let holder = coordinator.acquire(REPO).await;

    let mut waiters = Vec::new();
    for i in 0..3 {
        let (coordinator_clone, order) = (coordinator.clone(), order.clone());
        waiters.push(tokio::spawn(async move {
            let _lease = coordinator_clone.acquire(REPO).await;
            order.lock().unwrap().push(i);
        }));
        wait_until(|| coordinator.status(REPO).map(|s| s.waiters) == Some(i + 1)).await;
    }

    drop(holder);
    for waiter in waiters {
        waiter.await.unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_pulls_do_not_touch_coordinator() {
    let driver = driver();
    let _lease = driver.coordinator().acquire(REPO).await;

    let found = docker_registry_resolver::PullDriver::new(resolver(&[R1], &[]))
        .pull(REPO, &GatedTransfer::new(), &EventSink::disabled())
        .await
        .unwrap();
    assert_eq!(found.identity(), REPO);
}
