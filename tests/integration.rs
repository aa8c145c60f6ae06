//! Integration tests for udcp-server.
//!
//! These tests drive whole dialogues through the gateway.

use std::sync::Arc;

use udcp_server::application::EchoApplication;
use udcp_server::protocol::{FrameBuffer, Pdu, PduKind, ReleaseCode, MAX_DATA_LENGTH};
use udcp_server::session::{MemoryStore, Session, SessionStore};
use udcp_server::transport::{
    AfricasTalkingAdapter, FlaresAdapter, TruRouteAdapter, UssdAdapter, UssdRequest,
};
use udcp_server::{Gateway, GatewayConfig};

fn echo_gateway() -> Gateway {
    Gateway::builder()
        .application(Arc::new(EchoApplication::new()))
        .build()
        .unwrap()
}

fn text(data: &[u8]) -> String {
    String::from_utf8(data.to_vec()).unwrap()
}

/// A one-screen message is echoed and the session starts over.
#[tokio::test]
async fn test_echo_hello() {
    let store = Arc::new(MemoryStore::new());
    let gateway = Gateway::builder()
        .application(Arc::new(EchoApplication::new()))
        .store(store.clone())
        .build()
        .unwrap();

    let response = gateway
        .handle("s1", &Pdu::data_request(b"HELLO", false))
        .await;

    assert_eq!(response.kind(), PduKind::DataLong);
    assert_eq!(response.payload(), b"HELLO");
    assert!(!response.has_more_to_send());

    let session = Session::get_or_create("s1", store.clone()).unwrap();
    assert!(session.recv_buffer().is_empty());
    assert!(session.send_buffer().is_empty());
    assert_eq!(store.get(b"udcp:recv-prev:s1").unwrap(), Some(b"HELLO".to_vec()));
}

/// A 200-byte response is fetched in two screens; the reset happens only
/// after the second.
#[tokio::test]
async fn test_echo_two_screens() {
    let store = Arc::new(MemoryStore::new());
    let gateway = Gateway::builder()
        .application(Arc::new(EchoApplication::new()))
        .store(store.clone())
        .build()
        .unwrap();
    let message: Vec<u8> = (0..200).map(|i| b'A' + (i % 26) as u8).collect();

    let first = gateway.handle("s1", &Pdu::data_request(&message, false)).await;
    assert_eq!(first.len(), MAX_DATA_LENGTH);
    assert!(first.has_more_to_send());
    assert_eq!(first.kind(), PduKind::DataWithContinuation);
    let pending = Session::get_or_create("s1", store.clone()).unwrap();
    assert_eq!(pending.send_buffer().len(), 200);

    let second = gateway.handle("s1", &Pdu::receive_ready_request()).await;
    assert_eq!(second.len(), 73);
    assert!(!second.has_more_to_send());

    let mut echoed = first.payload().to_vec();
    echoed.extend_from_slice(second.payload());
    assert_eq!(echoed, message);

    let done = Session::get_or_create("s1", store).unwrap();
    assert!(done.send_buffer().is_empty());
}

/// The client uploads in three screens and receives one answer.
#[tokio::test]
async fn test_multi_screen_upload() {
    let gateway = echo_gateway();

    for part in [&b"one "[..], b"two "] {
        let response = gateway.handle("s1", &Pdu::data_request(part, true)).await;
        assert!(response.is_receive_ready_pdu());
        assert!(response.has_more_to_send());
    }

    let response = gateway
        .handle("s1", &Pdu::data_request(b"three", false))
        .await;
    assert_eq!(text(response.payload()), "one two three");
}

/// Two dialogues in flight keep separate buffers and cursors.
#[tokio::test]
async fn test_interleaved_sessions() {
    let gateway = echo_gateway();
    let long = vec![b'L'; 300];

    let a1 = gateway.handle("a", &Pdu::data_request(&long, false)).await;
    assert!(a1.has_more_to_send());

    let b1 = gateway.handle("b", &Pdu::data_request(b"short", false)).await;
    assert_eq!(b1.payload(), b"short");

    let a2 = gateway.handle("a", &Pdu::receive_ready_request()).await;
    assert_eq!(a2.len(), MAX_DATA_LENGTH);
    assert!(a2.has_more_to_send());

    let a3 = gateway.handle("a", &Pdu::receive_ready_request()).await;
    assert_eq!(a3.len(), 300 - 2 * MAX_DATA_LENGTH);
    assert!(!a3.has_more_to_send());
}

/// A dialogue in progress survives a gateway restart with a file store.
#[tokio::test]
async fn test_upload_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = GatewayConfig {
        store_path: Some(dir.path().to_path_buf()),
        ..GatewayConfig::default()
    };

    {
        let gateway = Gateway::builder()
            .config(config.clone())
            .application(Arc::new(EchoApplication::new()))
            .build()
            .unwrap();
        let response = gateway
            .handle("s1", &Pdu::data_request(b"before ", true))
            .await;
        assert!(response.is_receive_ready_pdu());
    }

    let gateway = Gateway::builder()
        .config(config)
        .application(Arc::new(EchoApplication::new()))
        .build()
        .unwrap();
    let response = gateway
        .handle("s1", &Pdu::data_request(b"after", false))
        .await;
    assert_eq!(text(response.payload()), "before after");
}

/// A half-downloaded response resumes at the right chunk after a restart.
#[tokio::test]
async fn test_download_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = GatewayConfig {
        store_path: Some(dir.path().to_path_buf()),
        ..GatewayConfig::default()
    };
    let message: Vec<u8> = (0..300).map(|i| b'a' + (i % 26) as u8).collect();

    {
        let gateway = Gateway::builder()
            .config(config.clone())
            .application(Arc::new(EchoApplication::new()))
            .build()
            .unwrap();
        let first = gateway.handle("s1", &Pdu::data_request(&message, false)).await;
        assert_eq!(first.payload(), &message[..MAX_DATA_LENGTH]);
    }

    let gateway = Gateway::builder()
        .config(config)
        .application(Arc::new(EchoApplication::new()))
        .build()
        .unwrap();
    let second = gateway.handle("s1", &Pdu::receive_ready_request()).await;
    assert_eq!(
        second.payload(),
        &message[MAX_DATA_LENGTH..2 * MAX_DATA_LENGTH]
    );
    assert!(second.has_more_to_send());

    let third = gateway.handle("s1", &Pdu::receive_ready_request()).await;
    assert_eq!(third.payload(), &message[2 * MAX_DATA_LENGTH..]);
    assert!(!third.has_more_to_send());
}

/// Session ids that look like key paths stay separate dialogues.
#[tokio::test]
async fn test_session_ids_with_separators() {
    let gateway = echo_gateway();

    let nested = gateway
        .handle("x/recv", &Pdu::data_request(b"poll", true))
        .await;
    assert!(nested.is_receive_ready_pdu());
    let polled = gateway.handle("x:recv", &Pdu::receive_ready_request()).await;
    assert!(polled.is_receive_ready_pdu());

    let response = gateway.handle("x", &Pdu::data_request(b"HELLO", false)).await;
    assert_eq!(response.payload(), b"HELLO");

    let nested = gateway
        .handle("x/recv", &Pdu::data_request(b"!", false))
        .await;
    assert_eq!(nested.payload(), b"poll!");
}

/// Frames in, frames out.
#[tokio::test]
async fn test_wire_frames() {
    let gateway = echo_gateway();

    let mut inbound = Pdu::data_request(b"ping ", true).encode().unwrap();
    inbound.extend(Pdu::data_request(b"pong", false).encode().unwrap());

    let reply = gateway.handle_frame("s1", &inbound).await;

    let mut buffer = FrameBuffer::new();
    let replies = buffer.push(&reply).unwrap();
    assert_eq!(replies.len(), 2);
    assert!(replies[0].is_receive_ready_pdu());
    assert_eq!(replies[1].encode().unwrap(), b"D;\x09\x00ping pong");
}

/// Ending the dialogue mid-download releases it.
#[tokio::test]
async fn test_release_mid_download() {
    let gateway = echo_gateway();
    let first = gateway
        .handle("s1", &Pdu::data_request(&[b'x'; 200], false))
        .await;
    assert!(first.has_more_to_send());

    let response = gateway.handle("s1", &Pdu::user_abort()).await;
    assert_eq!(response.release_code(), Some(ReleaseCode::UserAbort));
}

/// A complete dialogue over the Africa's Talking adapter.
#[tokio::test]
async fn test_africastalking_dialogue() {
    let gateway = echo_gateway();
    let adapter = AfricasTalkingAdapter::new();
    let callback = |text: &str| UssdRequest {
        session_id: "ATUid_42".into(),
        phone_number: "+265888123456".into(),
        text: text.into(),
        ..Default::default()
    };

    assert_eq!(
        gateway.handle_ussd(&adapter, &callback("")).await,
        "CON __NODATA__"
    );
    assert_eq!(
        gateway.handle_ussd(&adapter, &callback("d;Hello ")).await,
        "CON __NODATA__"
    );
    assert_eq!(
        gateway.handle_ussd(&adapter, &callback("D;world")).await,
        "CON Hello world"
    );
    assert_eq!(gateway.handle_ussd(&adapter, &callback("X;t")).await, "END t");
}

/// A long answer over TruRoute XML callbacks.
#[tokio::test]
async fn test_truroute_dialogue() {
    let gateway = echo_gateway();
    let adapter = TruRouteAdapter::new();
    let callback = |kind: u8, msg: &str| {
        format!(
            "<ussd><type>{kind}</type><msg>{msg}</msg>\
             <sessionid>TR-9</sessionid><msisdn>265999000111</msisdn></ussd>"
        )
    };

    let opened = gateway
        .handle_body(&adapter, callback(1, "*384#").as_bytes())
        .await;
    assert!(opened.contains("<msg>__NODATA__</msg>"));

    let long = "y".repeat(130);
    let first = gateway
        .handle_body(&adapter, callback(2, &format!("D;{long}")).as_bytes())
        .await;
    assert!(first.contains("<type>2</type>"));
    assert!(first.contains(&format!("<msg>{}</msg>", "y".repeat(MAX_DATA_LENGTH))));

    let second = gateway
        .handle_body(&adapter, callback(2, "").as_bytes())
        .await;
    assert!(second.contains("<msg>yyy</msg>"));

    let closed = gateway
        .handle_body(&adapter, callback(2, "X;t").as_bytes())
        .await;
    assert!(closed.contains("<type>3</type>"));
    assert_eq!(adapter.content_type(), "text/xml; charset=ascii");
}

/// A multi-screen upload over Flares XML callbacks.
#[tokio::test]
async fn test_flares_dialogue() {
    let gateway = echo_gateway();
    let adapter = FlaresAdapter::new();
    let callback = |input: &str| {
        format!(
            "<request><subscriberInput>{input}</subscriberInput>\
             <sessionId>FL-9</sessionId><msisdn>+265888123456</msisdn></request>"
        )
    };

    let waiting = gateway
        .handle_body(&adapter, callback("d;Hello ").as_bytes())
        .await;
    assert!(waiting.contains("<applicationResponse>__NODATA__</applicationResponse>"));

    let answered = gateway
        .handle_body(&adapter, callback("D;world").as_bytes())
        .await;
    assert!(answered.contains("<applicationResponse>Hello world</applicationResponse>"));
    assert!(answered.contains("<sessionId>FL-9</sessionId>"));
}
