//! Wire protocol shared by every transport
//!
//! Each message is a JSON record with `messageType`, `messageId` and `data`.
//! Responses reuse the request's `messageId`. Response payloads wrap the
//! result as `{error: false, data}` or a failure as `{error: true, kind, message}`.

mod envelope;
mod failure;

pub use envelope::{Direction, Envelope, ProtocolError, new_correlation_id};
pub use failure::{RouterFailure, decode_response, failure_payload, success_payload};
