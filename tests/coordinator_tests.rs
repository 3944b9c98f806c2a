use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fujitsu_hvac::{
    Climate, Context, Coordinator, Error, FujitsuClient, HvacMode, Mode, RetryPolicy,
    UnitIdentity, WireFormat,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn units_json() -> serde_json::Value {
    serde_json::json!([
        {"circuit": 0, "sub_id": 0, "powered": true, "mode": "Heat",
         "target_temp": 22.0, "fan_speed": "Auto", "louver": 0},
        {"circuit": 0, "sub_id": 1, "powered": false, "mode": "Cool",
         "target_temp": 25.0, "fan_speed": "Min", "louver": 2}
    ])
}

fn client(server: &MockServer) -> Arc<FujitsuClient> {
    let client = FujitsuClient::builder(server.uri())
        .format(WireFormat::Json)
        .retry_policy(RetryPolicy {
            max_attempts: 1,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        })
        .build()
        .unwrap();
    Arc::new(client)
}

async fn mount_data(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(units_json()))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn refresh_publishes_snapshot() {
    let server = MockServer::start().await;
    mount_data(&server).await;

    let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(vec![]));
    let seen_clone = seen.clone();
    let coordinator = Coordinator::new(client(&server), Duration::from_secs(30))
        .on_update(move |units| seen_clone.lock().unwrap().push(units.len()));

    assert!(!coordinator.is_available());
    coordinator.refresh().await.unwrap();

    assert!(coordinator.is_available());
    assert_eq!(*seen.lock().unwrap(), vec![2]);
    let unit = coordinator.unit(UnitIdentity::new(0, 1)).await.unwrap();
    assert_eq!(unit.mode, Mode::Cool);
    assert!(coordinator.unit(UnitIdentity::new(3, 0)).await.is_none());
}

#[tokio::test]
async fn failed_refresh_keeps_stale_data() {
    let server = MockServer::start().await;
    mount_data(&server).await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let failures = Arc::new(AtomicUsize::new(0));
    let failures_clone = failures.clone();
    let coordinator = Coordinator::new(client(&server), Duration::from_secs(30))
        .on_unavailable(move |_| {
            failures_clone.fetch_add(1, Ordering::SeqCst);
        });

    coordinator.refresh().await.unwrap();
    let err = coordinator.refresh().await.unwrap_err();

    assert!(matches!(err, Error::Fetch(_)), "got {err:?}");
    assert!(!coordinator.is_available());
    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.data().await.len(), 2);
}

#[tokio::test]
async fn climate_reflects_unit_state() {
    let server = MockServer::start().await;
    mount_data(&server).await;

    let coordinator = Arc::new(Coordinator::new(client(&server), Duration::from_secs(30)));
    coordinator.refresh().await.unwrap();

    let climates = Climate::for_all(&coordinator).await;
    assert_eq!(climates.len(), 2);
    assert_eq!(climates[0].unique_id(), "00");
    assert_eq!(climates[1].unique_id(), "01");
    assert_eq!(climates[0].hvac_mode().await, HvacMode::Heat);
    // unpowered unit reads as off even though its mode is Cool
    assert_eq!(climates[1].hvac_mode().await, HvacMode::Off);
    assert_eq!(climates[0].target_temperature().await, Some(22.0));
    assert_eq!(climates[0].current_temperature().await, Some(22.0));
    assert!(climates[0].is_available().await);
}

#[tokio::test]
async fn successful_command_patches_cache() {
    let server = MockServer::start().await;
    mount_data(&server).await;
    Mock::given(method("POST"))
        .and(path("/set_temperature"))
        .respond_with(ResponseTemplate::new(200).set_body_string("0"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/set_mode"))
        .respond_with(ResponseTemplate::new(200).set_body_string("0"))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = Arc::new(Coordinator::new(client(&server), Duration::from_secs(30)));
    coordinator.refresh().await.unwrap();
    let climate = Climate::new(coordinator.clone(), UnitIdentity::new(0, 1));

    climate.set_temperature(19.5).await.unwrap();
    assert_eq!(climate.target_temperature().await, Some(19.5));

    climate.set_hvac_mode(HvacMode::Dry).await.unwrap();
    let unit = coordinator.unit(UnitIdentity::new(0, 1)).await.unwrap();
    assert!(unit.powered);
    assert_eq!(unit.mode, Mode::Dry);
}

#[tokio::test]
async fn failed_command_leaves_cache_untouched() {
    let server = MockServer::start().await;
    mount_data(&server).await;
    Mock::given(method("POST"))
        .and(path("/set_mode"))
        .respond_with(ResponseTemplate::new(200).set_body_string("2"))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = Arc::new(Coordinator::new(client(&server), Duration::from_secs(30)));
    coordinator.refresh().await.unwrap();
    let climate = Climate::new(coordinator.clone(), UnitIdentity::new(0, 0));

    let err = climate.turn_off().await.unwrap_err();
    assert_eq!(err.response_body(), Some("2"));
    assert_eq!(climate.hvac_mode().await, HvacMode::Heat);
}

#[tokio::test]
async fn context_tracks_entries() {
    let server = MockServer::start().await;
    let coordinator = Arc::new(Coordinator::new(client(&server), Duration::from_secs(30)));

    let mut context = Context::new();
    context.insert("entry-1", coordinator.clone());
    assert_eq!(context.len(), 1);
    assert!(Arc::ptr_eq(&context.get("entry-1").unwrap(), &coordinator));
    assert!(context.get("entry-2").is_none());
    assert!(context.remove("entry-1").is_some());
    assert!(context.is_empty());
}
