use hyperhdr_ble_controller::{Error, scan};
use hyperhdr_proto::ble::{SCAN_UUID, SERVICE_UUID, STATUS_UUID};
use hyperhdr_proto::DecodeError;

use crate::mock_transport::MockTransport;

#[tokio::test]
async fn truncated_scan_list_is_repaired() {
    let mock = MockTransport::hyperhdr();
    mock.set_value(
        SCAN_UUID,
        r#"[{"s":"A","sr":80,"lck":1,"u":0,"sav":1},{"s":"B","sr":4"#,
    );
    let (_controller, session) = mock.session().await;

    let networks = scan(&session).await.unwrap();
    assert_eq!(networks.len(), 1);
    assert_eq!(networks[0].ssid, "A");
    assert_eq!(networks[0].signal_strength, 80);
    assert!(networks[0].locked);
    assert!(!networks[0].currently_connected);
    assert!(networks[0].saved);
}

#[tokio::test]
async fn complete_list_keeps_device_order() {
    let mock = MockTransport::hyperhdr();
    mock.set_value(
        SCAN_UUID,
        r#"[{"s":"Zeta","sr":10,"lck":0,"u":0,"sav":0},{"s":"Alpha","sr":90,"lck":1,"u":1,"sav":1}]"#,
    );
    let (_controller, session) = mock.session().await;

    let ssids: Vec<String> = scan(&session).await.unwrap().into_iter().map(|n| n.ssid).collect();
    assert_eq!(ssids, ["Zeta", "Alpha"]);
}

#[tokio::test]
async fn each_scan_replaces_the_previous_list() {
    let mock = MockTransport::hyperhdr();
    mock.set_value(SCAN_UUID, r#"[{"s":"A","sr":80}]"#);
    let (_controller, session) = mock.session().await;
    assert_eq!(scan(&session).await.unwrap().len(), 1);

    mock.set_value(SCAN_UUID, r#"[{"s":"B","sr":50},{"s":"C","sr":20}]"#);
    let networks = scan(&session).await.unwrap();
    assert_eq!(networks.len(), 2);
    assert!(networks.iter().all(|n| n.ssid != "A"));
}

#[tokio::test]
async fn empty_value_is_an_empty_list() {
    let mock = MockTransport::hyperhdr();
    let (_controller, session) = mock.session().await;
    assert!(scan(&session).await.unwrap().is_empty());
}

#[tokio::test]
async fn garbage_is_a_scan_decode_error() {
    let mock = MockTransport::hyperhdr();
    mock.set_value(SCAN_UUID, "<html>oops</html>");
    let (_controller, session) = mock.session().await;

    let err = scan(&session).await.err().unwrap();
    assert!(matches!(err, Error::ScanDecode(DecodeError::Json(_))));
}

#[tokio::test]
async fn missing_scan_characteristic() {
    let mock = MockTransport::default();
    mock.state().services.insert(SERVICE_UUID, [STATUS_UUID]);
    let (_controller, session) = mock.session().await;

    let err = scan(&session).await.err().unwrap();
    assert!(matches!(err, Error::CharacteristicNotFound(uuid) if uuid == SCAN_UUID));
}
