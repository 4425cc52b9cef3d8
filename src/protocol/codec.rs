//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Header (every request and response)
//! ```text
//! ┌──────────────┬──────────────┬──────────────┬─────────────────┐
//! │ Command (4)  │ BodyLen (4)  │ RequestId (4)│      Body       │
//! └──────────────┴──────────────┴──────────────┴─────────────────┘
//! ```
//! All integers are little-endian. A field is `VarLength(len) + bytes`.
//!
//! ### Request Bodies
//! - PING:   empty
//! - INSERT: space, flags, cardinality, fields
//! - SELECT: space, index, offset, limit, key count, (cardinality, fields)*
//! - DELETE: space, flags, cardinality, fields
//! - UPDATE: space, flags, cardinality, fields, op count, op blocks
//! - CALL:   flags, name field, cardinality, fields
//!
//! ### Response Body
//! ```text
//! empty | status (4) [message] | status (4) count (4) (size (4) cardinality (4) fields)*
//! ```

use std::io::{Read, Write};

use bytes::{Buf, BufMut};

use crate::error::{ConnectorError, Result};

use super::command::{CommandType, OpCode};
use super::request::{Operation, Request, RequestBody, Tuple};
use super::response::Response;
use super::varint::{decode_varint, encode_varint, varint_size};

/// Header size: command (4) + body length (4) + request id (4)
pub const HEADER_SIZE: usize = 12;

/// Largest body accepted from the wire (64 MB)
pub const MAX_BODY_SIZE: u32 = 64 * 1024 * 1024;

// =============================================================================
// Header
// =============================================================================

/// Fixed 12-byte frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub command: u32,
    pub body_length: u32,
    pub request_id: i32,
}

impl Header {
    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32_le(self.command);
        dst.put_u32_le(self.body_length);
        dst.put_i32_le(self.request_id);
    }

    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut buf = &bytes[..];
        Self {
            command: buf.get_u32_le(),
            body_length: buf.get_u32_le(),
            request_id: buf.get_i32_le(),
        }
    }

    /// Reject declared lengths the reader should never allocate
    pub fn check_body_length(&self) -> Result<usize> {
        if self.body_length > MAX_BODY_SIZE {
            return Err(ConnectorError::Protocol(format!(
                "Body too large: {} bytes (max {})",
                self.body_length, MAX_BODY_SIZE
            )));
        }
        Ok(self.body_length as usize)
    }
}

// =============================================================================
// Bounds-checked body reader
// =============================================================================

struct BodyReader<'a> {
    buf: &'a [u8],
}

impl<'a> BodyReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, what: &str, needed: usize) -> Result<()> {
        if self.buf.remaining() < needed {
            return Err(ConnectorError::truncated(what, needed, self.buf.remaining()));
        }
        Ok(())
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        self.ensure(what, 4)?;
        Ok(self.buf.get_u32_le())
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        self.ensure(what, 1)?;
        Ok(self.buf.get_u8())
    }

    fn skip(&mut self, what: &str, count: usize) -> Result<()> {
        self.ensure(what, count)?;
        self.buf.advance(count);
        Ok(())
    }

    fn field(&mut self) -> Result<Vec<u8>> {
        let (len, used) = decode_varint(self.buf)?;
        self.buf.advance(used);
        let len = len as usize;
        self.ensure("field", len)?;
        let value = self.buf[..len].to_vec();
        self.buf.advance(len);
        Ok(value)
    }

    /// Read `count` fields; each takes at least one byte, which bounds the
    /// allocation by what is actually buffered
    fn fields(&mut self, count: u32) -> Result<Tuple> {
        let count = count as usize;
        if count > self.remaining() {
            return Err(ConnectorError::Protocol(format!(
                "Cardinality {} exceeds remaining {} bytes",
                count,
                self.remaining()
            )));
        }
        let mut fields = Vec::with_capacity(count);
        for _ in 0..count {
            fields.push(self.field()?);
        }
        Ok(Tuple::from(fields))
    }

    fn tuple(&mut self) -> Result<Tuple> {
        let cardinality = self.u32("cardinality")?;
        self.fields(cardinality)
    }

    fn rest(&mut self) -> &'a [u8] {
        let rest = self.buf;
        self.buf = &[];
        rest
    }

    fn finish(&self, what: &str) -> Result<()> {
        if !self.buf.is_empty() {
            return Err(ConnectorError::Protocol(format!(
                "{}: {} trailing bytes",
                what,
                self.buf.len()
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Field / tuple encoding
// =============================================================================

fn put_field(dst: &mut Vec<u8>, value: &[u8]) {
    encode_varint(value.len() as u32, dst);
    dst.put_slice(value);
}

fn put_fields(dst: &mut Vec<u8>, tuple: &Tuple) {
    for field in tuple.fields() {
        put_field(dst, field);
    }
}

/// Cardinality followed by fields
fn put_tuple(dst: &mut Vec<u8>, tuple: &Tuple) {
    dst.put_u32_le(tuple.len() as u32);
    put_fields(dst, tuple);
}

/// Encoded size of the fields of a tuple, cardinality excluded
fn fields_size(tuple: &Tuple) -> usize {
    tuple
        .fields()
        .iter()
        .map(|f| varint_size(f.len() as u32) + f.len())
        .sum()
}

fn put_operation(dst: &mut Vec<u8>, op: &Operation) {
    dst.put_u32_le(op.field_no());
    dst.put_u8(op.opcode() as u8);
    if let Operation::Splice { offset, length, .. } = op {
        if !offset.is_empty() {
            put_field(dst, offset);
        }
        if !length.is_empty() {
            put_field(dst, length);
        }
    }
    put_field(dst, op.value());
}

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

fn encode_request_body(body: &RequestBody) -> Vec<u8> {
    let mut buf = Vec::new();
    match body {
        RequestBody::Ping => {}
        RequestBody::Insert { space, flags, tuple } => {
            buf.put_u32_le(*space);
            buf.put_u32_le(*flags);
            put_tuple(&mut buf, tuple);
        }
        RequestBody::Select {
            space,
            index,
            offset,
            limit,
            keys,
        } => {
            buf.put_u32_le(*space);
            buf.put_u32_le(*index);
            buf.put_u32_le(*offset);
            buf.put_u32_le(*limit);
            buf.put_u32_le(keys.len() as u32);
            for key in keys {
                put_tuple(&mut buf, key);
            }
        }
        RequestBody::Delete { space, flags, key } => {
            buf.put_u32_le(*space);
            buf.put_u32_le(*flags);
            put_tuple(&mut buf, key);
        }
        RequestBody::Update {
            space,
            flags,
            key,
            operations,
        } => {
            buf.put_u32_le(*space);
            buf.put_u32_le(*flags);
            put_tuple(&mut buf, key);
            buf.put_u32_le(operations.len() as u32);
            for op in operations {
                put_operation(&mut buf, op);
            }
        }
        RequestBody::Call {
            flags,
            procedure,
            args,
        } => {
            buf.put_u32_le(*flags);
            put_field(&mut buf, procedure.as_bytes());
            put_tuple(&mut buf, args);
        }
    }
    buf
}

/// Append the full frame of `request` to `dst`
///
/// The header's body length is computed from the encoded body.
pub fn encode_request_into(request: &Request, dst: &mut Vec<u8>) {
    let body = encode_request_body(request.body());
    let header = Header {
        command: request.command_type().code(),
        body_length: body.len() as u32,
        request_id: request.id(),
    };
    dst.reserve(HEADER_SIZE + body.len());
    header.encode(dst);
    dst.put_slice(&body);
}

/// Encode a request to bytes
///
/// Format: header (12) + body
pub fn encode_request(request: &Request) -> Vec<u8> {
    let mut frame = Vec::new();
    encode_request_into(request, &mut frame);
    frame
}

fn decode_operation(reader: &mut BodyReader<'_>) -> Result<Operation> {
    let field_no = reader.u32("operation field number")?;
    let opcode = OpCode::try_from(reader.u8("operation opcode")?)?;
    if opcode == OpCode::Splice {
        // Splice blocks are not self-delimiting when offset or length is
        // omitted; the decoder expects both to be present.
        return Ok(Operation::Splice {
            field_no,
            offset: reader.field()?,
            length: reader.field()?,
            value: reader.field()?,
        });
    }

    let value = reader.field()?;
    Operation::simple(opcode, field_no, value)
        .ok_or_else(|| ConnectorError::Protocol(format!("Unexpected opcode {:?}", opcode)))
}

/// Decode a request body received under `header`
pub fn decode_request(header: &Header, body: &[u8]) -> Result<Request> {
    if body.len() != header.body_length as usize {
        return Err(ConnectorError::Protocol(format!(
            "Body length mismatch: header says {}, got {}",
            header.body_length,
            body.len()
        )));
    }

    let command = CommandType::try_from(header.command)?;
    let mut reader = BodyReader::new(body);

    let request_body = match command {
        CommandType::Ping => RequestBody::Ping,
        CommandType::Insert => RequestBody::Insert {
            space: reader.u32("space")?,
            flags: reader.u32("flags")?,
            tuple: reader.tuple()?,
        },
        CommandType::Select => {
            let space = reader.u32("space")?;
            let index = reader.u32("index")?;
            let offset = reader.u32("offset")?;
            let limit = reader.u32("limit")?;
            let count = reader.u32("key count")? as usize;
            // Every key tuple carries at least its 4-byte cardinality
            if count > reader.remaining() / 4 {
                return Err(ConnectorError::Protocol(format!(
                    "Key count {} exceeds body size",
                    count
                )));
            }
            let mut keys = Vec::with_capacity(count);
            for _ in 0..count {
                keys.push(reader.tuple()?);
            }
            RequestBody::Select {
                space,
                index,
                offset,
                limit,
                keys,
            }
        }
        CommandType::Delete => RequestBody::Delete {
            space: reader.u32("space")?,
            flags: reader.u32("flags")?,
            key: reader.tuple()?,
        },
        CommandType::Update => {
            let space = reader.u32("space")?;
            let flags = reader.u32("flags")?;
            let key = reader.tuple()?;
            let count = reader.u32("operation count")? as usize;
            // fieldNo (4) + opcode (1) + at least one length byte
            if count > reader.remaining() / 6 {
                return Err(ConnectorError::Protocol(format!(
                    "Operation count {} exceeds body size",
                    count
                )));
            }
            let mut operations = Vec::with_capacity(count);
            for _ in 0..count {
                operations.push(decode_operation(&mut reader)?);
            }
            RequestBody::Update {
                space,
                flags,
                key,
                operations,
            }
        }
        CommandType::Call => {
            let flags = reader.u32("flags")?;
            let name = reader.field()?;
            let procedure = String::from_utf8(name).map_err(|e| {
                ConnectorError::Protocol(format!("Procedure name is not UTF-8: {}", e))
            })?;
            RequestBody::Call {
                flags,
                procedure,
                args: reader.tuple()?,
            }
        }
    };

    reader.finish(command.name())?;
    Ok(Request::with_id(header.request_id, request_body))
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Error messages are one byte per character
fn message_to_bytes(message: &str) -> Vec<u8> {
    message
        .chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn message_from_bytes(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    bytes[..end].iter().map(|&b| char::from(b)).collect()
}

/// Encode a response to bytes
///
/// Format: header (12) + body. A successful ping has an empty body.
pub fn encode_response(response: &Response) -> Vec<u8> {
    let mut body = Vec::new();
    let is_bare_ping = response.command == CommandType::Ping.code()
        && response.status_code == 0
        && response.tuples.is_empty()
        && response.affected_count == 0;

    if response.status_code != 0 {
        body.put_u32_le(response.status_code);
        if let Some(message) = &response.error_message {
            body.put_slice(&message_to_bytes(message));
        }
    } else if !is_bare_ping {
        body.put_u32_le(0);
        body.put_u32_le(response.affected_count);
        for tuple in &response.tuples {
            body.put_u32_le(fields_size(tuple) as u32);
            put_tuple(&mut body, tuple);
        }
    }

    let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
    Header {
        command: response.command,
        body_length: body.len() as u32,
        request_id: response.request_id,
    }
    .encode(&mut frame);
    frame.put_slice(&body);
    frame
}

/// Decode a response body received under `header`
///
/// A body of exactly 8 bytes (status + count) yields no tuples even when the
/// count is nonzero; callers must not assume tuple data follows a count.
pub fn decode_response(header: &Header, body: &[u8]) -> Result<Response> {
    if body.len() != header.body_length as usize {
        return Err(ConnectorError::Protocol(format!(
            "Body length mismatch: header says {}, got {}",
            header.body_length,
            body.len()
        )));
    }

    let mut response = Response {
        command: header.command,
        body_length: header.body_length,
        request_id: header.request_id,
        status_code: 0,
        affected_count: 0,
        tuples: Vec::new(),
        error_message: None,
    };

    if body.is_empty() {
        return Ok(response);
    }

    let mut reader = BodyReader::new(body);
    response.status_code = reader.u32("status code")?;

    if body.len() == 4 || response.status_code != 0 {
        let rest = reader.rest();
        if !rest.is_empty() {
            response.error_message = Some(message_from_bytes(rest));
        }
        return Ok(response);
    }

    response.affected_count = reader.u32("affected count")?;
    if body.len() == 8 {
        return Ok(response);
    }

    // Each tuple carries at least size (4) + cardinality (4)
    let count = response.affected_count as usize;
    if count > reader.remaining() / 8 {
        return Err(ConnectorError::Protocol(format!(
            "Tuple count {} exceeds body size",
            count
        )));
    }

    response.tuples.reserve(count);
    for _ in 0..count {
        reader.skip("tuple size", 4)?;
        response.tuples.push(reader.tuple()?);
    }

    Ok(response)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one header + body from a stream
///
/// Blocks until the whole frame is received or an error occurs
pub fn read_frame<R: Read>(reader: &mut R) -> Result<(Header, Vec<u8>)> {
    let mut raw = [0u8; HEADER_SIZE];
    reader.read_exact(&mut raw)?;
    let header = Header::decode(&raw);

    let body_len = header.check_body_length()?;
    let mut body = vec![0u8; body_len];
    if body_len > 0 {
        reader.read_exact(&mut body)?;
    }

    Ok((header, body))
}

/// Read a complete request from a stream
pub fn read_request<R: Read>(reader: &mut R) -> Result<Request> {
    let (header, body) = read_frame(reader)?;
    decode_request(&header, &body)
}

/// Write a request to a stream
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    writer.write_all(&encode_request(request))?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let (header, body) = read_frame(reader)?;
    decode_response(&header, &body)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    writer.write_all(&encode_response(response))?;
    writer.flush()?;
    Ok(())
}
