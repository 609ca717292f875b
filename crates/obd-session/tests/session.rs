//! End-to-end sessions against the scripted adapter

use obd_session::obd_sensors::SensorValue;
use obd_session::{
    ConnectionState, DtcStatus, MockAdapter, ObdError, ObdSession, QueryOutcome, SessionConfig,
    Transport,
};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn config() -> SessionConfig {
    SessionConfig {
        port: "mock".to_string(),
        reset_delay_ms: 0,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_clear_then_read_returns_no_codes() {
    init_logging();
    let adapter = MockAdapter::new()
        .with_stored_codes(&[0x0133, 0x0171])
        .with_pending_codes(&[0x0420]);
    let mut session = ObdSession::connect(adapter, config()).await.unwrap();

    let before = session.get_dtc().await.unwrap();
    assert_eq!(before.len(), 3);
    assert_eq!(before[2].status, DtcStatus::Passive);
    assert_eq!(before[2].code.code(), "P0420");

    let ack = session.clear_dtc().await.unwrap();
    assert_eq!(ack, QueryOutcome::Value("44".to_string()));

    let after = session.get_dtc().await.unwrap();
    assert!(after.is_empty());
    // No stored codes means no Mode 03 frame is requested
    assert_eq!(session.transport().command_count("03"), 1);
}

#[tokio::test]
async fn test_full_session_lifecycle() {
    init_logging();
    let adapter = MockAdapter::new()
        .with_firmware("ELM327 v2.1")
        .respond("0105", "41 05 73")
        .respond("010C", "41 0C 0F A0");
    let mut session = ObdSession::connect(adapter, config()).await.unwrap();
    assert_eq!(session.firmware_version(), Some("ELM327 v2.1"));

    let temp = session.query_sensor(5).await.unwrap().value().unwrap();
    assert_eq!(temp.value, SensorValue::Number(75.0));
    assert_eq!(temp.unit, "C");

    let rpm = session.query_sensor(12).await.unwrap().value().unwrap();
    assert_eq!(rpm.value, SensorValue::Number(1000.0));

    // Every command went out flushed and CR+LF terminated
    let written = String::from_utf8(session.transport().written().to_vec()).unwrap();
    assert_eq!(written, "atz\r\nate0\r\n0100\r\n0105\r\n010C\r\n");
    assert!(session.transport().flushed_before_last_write());

    session.close().await.unwrap();
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(session.transport().is_closed());
    assert!(matches!(
        session.query_sensor(12).await,
        Err(ObdError::NotConnected(ConnectionState::Disconnected))
    ));
}

#[tokio::test]
async fn test_boxed_transport() {
    let adapter: Box<dyn Transport> = Box::new(MockAdapter::new().respond("010D", "41 0D 64"));
    let mut session = ObdSession::connect(adapter, config()).await.unwrap();

    let speed = session.query_sensor(13).await.unwrap().value().unwrap();
    assert_eq!(speed.value.as_number(), Some(100.0));
}

#[tokio::test]
async fn test_connect_reports_handshake_failure() {
    match ObdSession::connect(MockAdapter::silent(), config()).await {
        Err(ObdError::HandshakeFailed { command }) => assert_eq!(command, "atz"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("silent adapter connected"),
    }
}

#[tokio::test]
async fn test_carriage_return_chained_reply_is_concatenated() {
    // Carriage returns are dropped while reading, so a second ECU's line
    // runs straight into the first one
    let adapter = MockAdapter::new().respond("010D", "41 0D 1E\r41 0D 1F");
    let mut session = ObdSession::connect(adapter, config()).await.unwrap();

    assert_eq!(
        session.query_raw("010D").await.unwrap(),
        QueryOutcome::Value("1E410D1F".to_string())
    );
    let speed = session.query_sensor(13).await.unwrap().value().unwrap();
    assert_eq!(speed.value.as_number(), Some(30.0));
}

#[tokio::test]
async fn test_linefeed_chained_reply_keeps_first_line() {
    let adapter = MockAdapter::new().respond("0103", "41 03 02 00\n41 03 01 00");
    let mut session = ObdSession::connect(adapter, config()).await.unwrap();

    let status = session.query_sensor(3).await.unwrap().value().unwrap();
    assert_eq!(status.value, SensorValue::Raw("0200".to_string()));
}

#[tokio::test]
async fn test_sensor_names_follow_table() {
    let session = ObdSession::new(MockAdapter::new(), config());
    let names = session.sensor_names();
    assert_eq!(names.len(), session.sensor_table().len());
    assert_eq!(names[1], "Status Since DTC Cleared");
}

#[tokio::test]
async fn test_open_missing_serial_port() {
    let config = SessionConfig::for_port("/dev/obd-session-missing");
    assert!(matches!(
        ObdSession::open(config).await,
        Err(ObdError::Transport(_))
    ));
}
