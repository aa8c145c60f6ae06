//! Echo gateway - a USSD dialogue over the Africa's Talking adapter.
//!
//! This example demonstrates:
//! - Building a gateway with the builder pattern
//! - Decoding aggregator callback bodies and rendering the replies
//! - A long answer fetched over several screens
//!
//! # Running
//!
//! ```text
//! cargo run --example echo
//! cargo run --example echo -- '{"sessionId":"s1","phoneNumber":"+265888123456","text":"D;hi"}'
//! ```
//!
//! Each argument is handled as one callback body. Without arguments a
//! scripted dialogue is played.

use std::sync::Arc;

use udcp_server::application::EchoApplication;
use udcp_server::transport::{AfricasTalkingAdapter, UssdAdapter};
use udcp_server::Gateway;

const SESSION: &str = "ATUid_demo";
const PHONE: &str = "+265888123456";

fn callback(text: &str) -> String {
    serde_json::json!({
        "sessionId": SESSION,
        "phoneNumber": PHONE,
        "serviceCode": "*384*7#",
        "text": text,
    })
    .to_string()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let gateway = Gateway::builder()
        .application(Arc::new(EchoApplication::new()))
        .build()?;
    let adapter = AfricasTalkingAdapter::new();

    let bodies: Vec<String> = match std::env::args().skip(1).collect::<Vec<_>>() {
        args if !args.is_empty() => args,
        _ => {
            let long = "0123456789".repeat(13);
            vec![
                callback(""),
                callback("d;Hello, "),
                callback("D;world"),
                callback(&format!("D;{long}")),
                callback(""),
                callback("X;t"),
            ]
        }
    };

    println!("content-type: {}", adapter.content_type());
    for body in bodies {
        let reply = gateway.handle_body(&adapter, body.as_bytes()).await;
        println!("> {body}");
        println!("< {reply}");
    }

    Ok(())
}
