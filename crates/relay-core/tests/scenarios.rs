use std::{sync::Arc, time::Duration};

use relay_core::{
    callback::{ChannelDelivery, Delivery},
    config::CoreConfig,
    error::CoreError,
    fleet::LocalFleet,
    service::TaskService,
    store::MemoryTaskStore,
    tracker::ReportAck,
};
use relay_model::{
    AccountId, CallbackDestination, CreatePerpetualTask, ExecutionMode, PerpetualClientContext,
    SubmitSpec, TaskPayload, TaskResult, TaskStage, WorkerId, WorkerProfile,
};

struct Harness {
    service: TaskService,
    fleet: Arc<LocalFleet>,
    delivery: Arc<ChannelDelivery>,
}

async fn harness() -> Harness {
    let fleet = Arc::new(LocalFleet::new());
    let delivery = Arc::new(ChannelDelivery::default());
    let service = TaskService::builder()
        .with_fleet(fleet.clone())
        .with_delivery(delivery.clone())
        .build();
    service
        .register_worker(
            WorkerProfile::new(WorkerId::from("w-1"), AccountId::from("acc"))
                .with_selectors(["linux-amd64", "docker"])
                .with_task_types(["shell"]),
        )
        .await
        .unwrap();
    Harness {
        service,
        fleet,
        delivery,
    }
}

fn acc() -> AccountId {
    AccountId::from("acc")
}

fn spec() -> SubmitSpec {
    SubmitSpec::new(
        "acc",
        "shell",
        TaskPayload::binary(b"echo hi".to_vec()),
        "linux-amd64",
    )
}

#[tokio::test]
async fn async_submit_is_queued() {
    let h = harness().await;
    let sub = h
        .service
        .submit(spec().with_execution_timeout(60_000).with_queue_timeout(10_000))
        .await
        .unwrap();

    assert_eq!(sub.stage, TaskStage::Queued);
    assert_eq!(
        h.service.query_stage(&acc(), &sub.task_id).await.unwrap(),
        TaskStage::Queued
    );
    assert_eq!(h.fleet.pending(&acc()), 1);
}

#[tokio::test]
async fn parked_task_is_released_into_the_queue() {
    let h = harness().await;
    let sub = h.service.submit(spec().parked()).await.unwrap();

    assert_eq!(
        h.service.query_stage(&acc(), &sub.task_id).await.unwrap(),
        TaskStage::Parked
    );
    assert_eq!(h.fleet.pending(&acc()), 0);

    h.service
        .execute_parked(&acc(), &sub.task_id)
        .await
        .unwrap();
    assert_eq!(
        h.service.query_stage(&acc(), &sub.task_id).await.unwrap(),
        TaskStage::Queued
    );
    assert_eq!(h.fleet.pending(&acc()), 1);
}

#[tokio::test]
async fn cancelling_a_queued_task_reports_the_prior_stage() {
    let h = harness().await;
    let sub = h.service.submit(spec()).await.unwrap();

    let prior = h.service.cancel(&acc(), &sub.task_id).await.unwrap();
    assert_eq!(prior, TaskStage::Queued);
    assert_eq!(
        h.service.query_stage(&acc(), &sub.task_id).await.unwrap(),
        TaskStage::Aborted
    );
    assert!(h
        .service
        .poll_task(&acc(), &WorkerId::from("w-1"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn double_report_delivers_exactly_once() {
    let h = harness().await;
    let mut deliveries = h.delivery.subscribe();
    let token = h
        .service
        .register_callback(CallbackDestination::new("queue://pipeline"))
        .await
        .unwrap();
    let sub = h.service.submit(spec().with_callback(token)).await.unwrap();

    let worker = WorkerId::from("w-1");
    let task = h.service.poll_task(&acc(), &worker).await.unwrap().unwrap();
    h.service
        .acquire_task(&acc(), &task.id, &worker)
        .await
        .unwrap();

    let first = h
        .service
        .report_status(&acc(), &sub.task_id, TaskResult::success(None))
        .await
        .unwrap();
    let second = h
        .service
        .report_status(&acc(), &sub.task_id, TaskResult::success(None))
        .await
        .unwrap();

    assert_eq!(first, ReportAck::Accepted);
    assert_eq!(second, ReportAck::Duplicate);
    assert_eq!(
        h.service.query_stage(&acc(), &sub.task_id).await.unwrap(),
        TaskStage::Completed
    );

    let envelope = deliveries.try_recv().unwrap();
    assert_eq!(envelope.delivery.task_id(), &sub.task_id);
    assert!(matches!(envelope.delivery, Delivery::Result { .. }));
    assert!(deliveries.try_recv().is_err());
}

#[tokio::test]
async fn duplicate_perpetual_create_returns_the_same_id() {
    let h = harness().await;
    let req = CreatePerpetualTask::new(
        "acc",
        "connector-heartbeat",
        PerpetualClientContext::new("conn-7").with_param("url", "https://example.test"),
    );

    let first = h.service.create_perpetual(req.clone()).await.unwrap();
    let second = h.service.create_perpetual(req).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.service.list_perpetual(&acc()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn submission_without_eligible_worker_is_rejected() {
    let h = harness().await;
    let needs_gpu = spec().with_selector(relay_model::TaskSelector::new("gpu"));

    assert!(matches!(
        h.service.submit(needs_gpu).await,
        Err(CoreError::NoEligibleWorker { .. })
    ));
}

#[tokio::test]
async fn results_are_fetchable_once_terminal() {
    let h = harness().await;
    let sub = h.service.submit(spec().parked()).await.unwrap();
    assert_eq!(
        h.service.fetch_results(&acc(), &sub.task_id).await.unwrap(),
        None
    );

    let result = TaskResult::success(Some(TaskPayload::binary(b"out".to_vec())));
    h.service
        .report_status(&acc(), &sub.task_id, result.clone())
        .await
        .unwrap();
    assert_eq!(
        h.service.fetch_results(&acc(), &sub.task_id).await.unwrap(),
        Some(result)
    );
}

#[tokio::test]
async fn sync_submission_cancelled_before_dispatch_wakes_aborted() {
    let store = Arc::new(MemoryTaskStore::new());
    let service = Arc::new(TaskService::builder().with_store(store.clone()).build());
    service
        .register_worker(
            WorkerProfile::new(WorkerId::from("w-1"), acc())
                .with_selectors(["linux-amd64"])
                .with_task_types(["shell"]),
        )
        .await
        .unwrap();

    let blocked = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .submit(spec().with_mode(ExecutionMode::Sync).with_execution_timeout(5_000))
                .await
        })
    };
    let id = loop {
        if let Some(id) = store.ids().into_iter().next() {
            break id;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };

    assert_eq!(service.cancel(&acc(), &id).await.unwrap(), TaskStage::Queued);

    let sub = tokio::time::timeout(Duration::from_secs(2), blocked)
        .await
        .expect("sync submission still blocked after cancel")
        .unwrap()
        .unwrap();
    assert_eq!(sub.task_id, id);
    assert_eq!(sub.stage, TaskStage::Aborted);
    assert!(sub.result.is_none());
}

#[tokio::test]
async fn report_after_sync_timeout_is_kept_and_delivered() {
    let fleet = Arc::new(LocalFleet::new());
    let delivery = Arc::new(ChannelDelivery::default());
    let service = TaskService::builder()
        .with_config(CoreConfig::default().with_sync_poll_interval(20))
        .with_fleet(fleet)
        .with_delivery(delivery.clone())
        .build();
    let worker = WorkerId::from("w-1");
    service
        .register_worker(
            WorkerProfile::new(worker.clone(), acc())
                .with_selectors(["linux-amd64"])
                .with_task_types(["shell"]),
        )
        .await
        .unwrap();
    let mut deliveries = delivery.subscribe();
    let token = service
        .register_callback(CallbackDestination::new("queue://late"))
        .await
        .unwrap();

    let timed_out = service
        .submit(
            spec()
                .with_mode(ExecutionMode::Sync)
                .with_callback(token)
                .with_execution_timeout(60)
                .with_queue_timeout(20),
        )
        .await
        .unwrap_err();
    let CoreError::SyncWaitTimeout { task_id, .. } = timed_out else {
        panic!("expected SyncWaitTimeout, got {timed_out:?}");
    };

    let task = service.poll_task(&acc(), &worker).await.unwrap().unwrap();
    assert_eq!(task.id, task_id);
    let ack = service
        .report_status(
            &acc(),
            &task_id,
            TaskResult::success(Some(TaskPayload::binary(b"late".to_vec()))),
        )
        .await
        .unwrap();

    assert_eq!(ack, ReportAck::Accepted);
    assert_eq!(
        service.query_stage(&acc(), &task_id).await.unwrap(),
        TaskStage::Completed
    );
    let result = service.fetch_results(&acc(), &task_id).await.unwrap().unwrap();
    assert_eq!(result.payload.unwrap().data, b"late".to_vec());

    let envelope = deliveries.try_recv().unwrap();
    assert_eq!(envelope.delivery.task_id(), &task_id);
}
