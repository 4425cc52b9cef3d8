//! Protocol Module
//!
//! Defines the binary request/response wire protocol.
//!
//! ## Frame Format
//! ```text
//! ┌──────────────┬──────────────┬──────────────┬─────────────────┐
//! │ Command (4)  │ BodyLen (4)  │ RequestId (4)│      Body       │
//! └──────────────┴──────────────┴──────────────┴─────────────────┘
//! ```
//!
//! ### Commands
//! - 0xFF00: PING
//! - 13:     INSERT
//! - 17:     SELECT
//! - 19:     UPDATE
//! - 21:     DELETE
//! - 22:     CALL
//!
//! ### Status Codes
//! - 0: OK
//! - otherwise: low byte is the completion status, the rest the error code

mod codec;
mod command;
mod request;
mod response;
mod varint;

pub use codec::{
    decode_request, decode_response, encode_request, encode_request_into, encode_response,
    read_frame, read_request, read_response, write_request, write_response, Header,
    HEADER_SIZE, MAX_BODY_SIZE,
};
pub use command::{flags, CommandType, OpCode};
pub use request::{next_request_id, Operation, Request, RequestBody, RequestIds, Tuple};
pub use response::{Completion, Response};
pub use varint::{decode_varint, encode_varint, varint_size, MAX_VARINT_LEN};
