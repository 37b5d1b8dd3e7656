//! Inbound message intake.

mod ingest_message;

pub use ingest_message::{
    InboundMessage, InboundReply, IngestMessageHandler, IngestSettings, ReplyDisposition,
};
