//! # udcp-server
//!
//! Server side of UDCP, the USSD Data Communication Protocol.
//!
//! UDCP carries application messages over USSD, where every screen holds
//! at most 140 characters and the network drives the dialogue one request at a
//! time. This crate reassembles inbound messages that span several screens,
//! hands complete messages to an [`Application`](application::Application),
//! and splits long responses into screen-sized chunks the client polls for.
//!
//! ## Architecture
//!
//! - **Protocol** ([`protocol`]): 2-character tagged frames and [`Pdu`]s
//! - **Sessions** ([`session`]): persisted receive/send buffers per dialogue
//! - **Engine** ([`process_request`]): the per-turn state machine
//! - **Gateway** ([`Gateway`]): store, application binding and turn deadline
//! - **Transport** ([`transport`]): aggregator callback adapters
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use udcp_server::application::EchoApplication;
//! use udcp_server::transport::{AfricasTalkingAdapter, UssdRequest};
//! use udcp_server::Gateway;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> udcp_server::Result<()> {
//! let gateway = Gateway::builder()
//!     .application(Arc::new(EchoApplication::new()))
//!     .build()?;
//!
//! let request = UssdRequest {
//!     session_id: "ATUid_1".into(),
//!     phone_number: "+265888123456".into(),
//!     text: "D;HELLO".into(),
//!     ..Default::default()
//! };
//! let body = gateway.handle_ussd(&AfricasTalkingAdapter::new(), &request).await;
//! assert_eq!(body, "CON HELLO");
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

mod engine;
mod gateway;

pub use config::GatewayConfig;
pub use engine::process_request;
pub use error::{ConfigError, Result, StoreError, UdcpError};
pub use gateway::{Gateway, GatewayBuilder};
pub use protocol::Pdu;
