use std::sync::Arc;
use std::time::Duration;

use hyperhdr_ble_controller::{Error, PeripheralId, ServiceMap, read_ip, read_mac, read_status, scan};
use hyperhdr_proto::Status;
use hyperhdr_proto::ble::{IP_UUID, MAC_UUID, STATUS_UUID};
use tokio::time::Instant;

use crate::mock_transport::{DEVICE, MockTransport};

#[tokio::test]
async fn reconnecting_returns_the_same_session() {
    let mock = MockTransport::hyperhdr();
    let controller = mock.controller();
    let id = PeripheralId::from(DEVICE);

    let first = controller.connect(&id).await.unwrap();
    let second = controller.connect(&id).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(mock.state().connect_calls, 1);
}

#[tokio::test]
async fn dropped_link_gets_a_fresh_session() {
    let mock = MockTransport::hyperhdr();
    let (controller, first) = mock.session().await;

    mock.drop_link();
    let second = controller.connect(&PeripheralId::from(DEVICE)).await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert!(first.is_closed());
    assert_eq!(mock.state().connect_calls, 2);
}

#[tokio::test(start_paused = true)]
async fn connect_is_bounded_by_the_configured_timeout() {
    let mock = MockTransport::hyperhdr();
    mock.state().connect_delay = Some(Duration::from_secs(60));
    let controller = mock.controller();

    let start = Instant::now();
    let err = controller.connect(&PeripheralId::from(DEVICE)).await.err().unwrap();

    assert!(matches!(err, Error::ConnectTimeout { timeout, .. } if timeout == Duration::from_secs(10)));
    assert_eq!(start.elapsed(), Duration::from_secs(10));
    // the half-open link is released
    assert_eq!(mock.state().disconnect_calls, 1);
    assert!(controller.session(&PeripheralId::from(DEVICE)).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn slow_connect_does_not_hold_up_other_peripherals() {
    let mock = MockTransport::hyperhdr();
    let controller = mock.controller();
    let other = PeripheralId::from("11:22:33:44:55:66");
    controller.connect(&other).await.unwrap();
    mock.state().connect_delay = Some(Duration::from_secs(60));
    let unreachable = PeripheralId::from(DEVICE);

    let start = Instant::now();
    let (slow, other_done) = tokio::join!(
        controller.connect(&unreachable),
        async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            controller.disconnect(&other).await.unwrap();
            let session = controller.session(&other).await;
            (start.elapsed(), session.is_none())
        }
    );

    assert_eq!(other_done, (Duration::from_secs(1), true));
    assert!(matches!(slow, Err(Error::ConnectTimeout { .. })));
    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test]
async fn rejected_connect_is_a_connect_error() {
    let mock = MockTransport::hyperhdr();
    mock.state().reject_connect = true;

    let err = mock.controller().connect(&PeripheralId::from(DEVICE)).await.err().unwrap();
    assert!(matches!(err, Error::Connect { .. }));
}

#[tokio::test]
async fn disconnect_without_a_session_is_a_noop() {
    let mock = MockTransport::hyperhdr();
    let controller = mock.controller();

    controller.disconnect(&PeripheralId::from("never-connected")).await.unwrap();
    assert_eq!(mock.state().disconnect_calls, 0);
}

#[tokio::test]
async fn disconnect_twice_is_safe() {
    let mock = MockTransport::hyperhdr();
    let (controller, session) = mock.session().await;
    let id = PeripheralId::from(DEVICE);

    controller.disconnect(&id).await.unwrap();
    controller.disconnect(&id).await.unwrap();

    assert_eq!(mock.state().disconnect_calls, 1);
    assert!(session.is_closed());
    assert!(matches!(scan(&session).await, Err(Error::NotConnected(_))));
}

#[tokio::test]
async fn discovery_rejects_unsupported_peripherals() {
    let mock = MockTransport::default();
    mock.state().services = ServiceMap::new();
    let (_controller, session) = mock.session().await;

    let err = session.discover_services_and_characteristics().await.err().unwrap();
    assert!(matches!(err, Error::ServiceNotFound { .. }));
}

#[tokio::test]
async fn diagnostic_reads() {
    let mock = MockTransport::hyperhdr();
    mock.set_value(IP_UUID, "192.168.1.40\n");
    mock.set_value(MAC_UUID, "DC:A6:32:01:02:03");
    let (_controller, session) = mock.session().await;

    assert_eq!(read_ip(&session).await.unwrap(), "192.168.1.40");
    assert_eq!(read_mac(&session).await.unwrap(), "DC:A6:32:01:02:03");
    assert_eq!(read_status(&session).await.unwrap(), None);

    mock.set_value(STATUS_UUID, r#"{"status":"success","message":"joined"}"#);
    let status = read_status(&session).await.unwrap().unwrap();
    assert_eq!(status.status, Status::Success);
}
