use hyperhdr_ble_controller::{Error, provision, write_credentials};
use hyperhdr_proto::ble::SCAN_UUID;
use hyperhdr_proto::{InputError, StatusEvent};
use serde_json::json;

use crate::mock_transport::MockTransport;

#[tokio::test]
async fn credentials_go_to_the_scan_characteristic() {
    let mock = MockTransport::hyperhdr();
    let (_controller, session) = mock.session().await;

    write_credentials(&session, "Home", "hunter22").await.unwrap();

    let (uuid, payload) = mock.written_json(0);
    assert_eq!(uuid, SCAN_UUID);
    assert_eq!(payload, json!({"s": "Home", "p": "hunter22"}));
}

#[tokio::test]
async fn open_network_gets_an_empty_password() {
    let mock = MockTransport::hyperhdr();
    let (_controller, session) = mock.session().await;

    write_credentials(&session, "Cafe \"Free\" WiFi", "").await.unwrap();
    assert_eq!(
        mock.written_json(0).1,
        json!({"s": "Cafe \"Free\" WiFi", "p": ""})
    );
}

#[tokio::test]
async fn empty_ssid_is_never_written() {
    let mock = MockTransport::hyperhdr();
    let (_controller, session) = mock.session().await;

    let err = write_credentials(&session, "", "pw").await.err().unwrap();
    assert!(matches!(err, Error::InvalidInput(InputError::InvalidSsid(_))));
    assert!(mock.writes().is_empty());
}

#[tokio::test]
async fn rejected_write_is_a_transport_error() {
    let mock = MockTransport::hyperhdr();
    mock.state().fail_writes = true;
    let (_controller, session) = mock.session().await;

    let err = write_credentials(&session, "Home", "pw").await.err().unwrap();
    assert!(matches!(err, Error::Write { characteristic, .. } if characteristic == SCAN_UUID));
}

#[tokio::test]
async fn provision_waits_for_the_join_result() {
    let mock = MockTransport::hyperhdr();
    mock.respond(
        SCAN_UUID,
        &[
            (20, r#"{"status":"connecting"}"#),
            (80, r#"{"status":"success","message":"Connected to Home"}"#),
        ],
    );
    let (_controller, session) = mock.session().await;

    let event = provision(&session, "Home", "hunter22").await.unwrap();
    assert!(event.is_success());
    assert_eq!(event.summary(), "Connected to Home");
    assert_eq!(mock.written_json(0).1, json!({"s": "Home", "p": "hunter22"}));
}

#[tokio::test]
async fn provision_reports_a_rejected_write() {
    let mock = MockTransport::hyperhdr();
    mock.state().fail_writes = true;
    let (_controller, session) = mock.session().await;

    let event = provision(&session, "Home", "pw").await.unwrap();
    assert_eq!(event, StatusEvent::write_error());
}
