//! Codec Tests
//!
//! Tests for request and response framing.

use std::io::Cursor;
use tarantool_connector::protocol::{
    decode_request, decode_response, encode_request, encode_response, flags, read_request,
    read_response, write_request, write_response, CommandType, Header, Operation, Request,
    RequestBody, Response, Tuple, HEADER_SIZE, MAX_BODY_SIZE,
};
use tarantool_connector::ConnectorError;

fn split(frame: &[u8]) -> (Header, &[u8]) {
    let raw: [u8; HEADER_SIZE] = frame[..HEADER_SIZE].try_into().unwrap();
    (Header::decode(&raw), &frame[HEADER_SIZE..])
}

fn round_trip(request: Request) {
    let frame = encode_request(&request);
    let (header, body) = split(&frame);
    assert_eq!(header.body_length as usize, body.len());
    assert_eq!(header.command, request.command_type().code());
    assert_eq!(header.request_id, request.id());

    let decoded = decode_request(&header, body).unwrap();
    assert_eq!(decoded, request);
}

fn response_from(command: u32, request_id: i32, body: &[u8]) -> Response {
    let header = Header {
        command,
        body_length: body.len() as u32,
        request_id,
    };
    decode_response(&header, body).unwrap()
}

fn richard() -> Tuple {
    Tuple::new().field("Richard").field("pom").field_u64(1)
}

// =============================================================================
// Request Encoding Tests
// =============================================================================

#[test]
fn test_ping_frame_bytes() {
    let frame = encode_request(&Request::with_id(0, RequestBody::Ping));
    assert_eq!(frame, vec![0, 255, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn test_insert_frame_bytes() {
    let request = Request::with_id(
        0,
        RequestBody::Insert {
            space: 0,
            flags: 0,
            tuple: richard(),
        },
    );
    let frame = encode_request(&request);
    let (header, body) = split(&frame);

    assert_eq!(header.command, 13);
    assert_eq!(header.body_length, 33);
    assert_eq!(header.request_id, 0);

    let mut expected = vec![0, 0, 0, 0, 0, 0, 0, 0, 3, 0, 0, 0];
    expected.push(7);
    expected.extend_from_slice(b"Richard");
    expected.push(3);
    expected.extend_from_slice(b"pom");
    expected.push(8);
    expected.extend_from_slice(&1u64.to_le_bytes());
    assert_eq!(body, &expected[..]);
}

#[test]
fn test_select_layout() {
    let request = Request::with_id(
        9,
        RequestBody::Select {
            space: 1,
            index: 2,
            offset: 3,
            limit: 4,
            keys: vec![Tuple::new().field("a"), Tuple::new()],
        },
    );
    let frame = encode_request(&request);
    let (header, body) = split(&frame);

    assert_eq!(header.command, 17);
    assert_eq!(
        body,
        &[
            1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 4, 0, 0, 0, // space index offset limit
            2, 0, 0, 0, // key count
            1, 0, 0, 0, 1, b'a', // first key
            0, 0, 0, 0, // empty key
        ][..]
    );
}

#[test]
fn test_call_layout() {
    let request = Request::with_id(
        5,
        RequestBody::Call {
            flags: flags::RETURN_TUPLE,
            procedure: "box.info".to_string(),
            args: Tuple::new().field("x"),
        },
    );
    let frame = encode_request(&request);
    let (header, body) = split(&frame);

    assert_eq!(header.command, 22);
    let mut expected = vec![1, 0, 0, 0, 8];
    expected.extend_from_slice(b"box.info");
    expected.extend_from_slice(&[1, 0, 0, 0, 1, b'x']);
    assert_eq!(body, &expected[..]);
}

#[test]
fn test_update_operation_blocks() {
    let request = Request::with_id(
        1,
        RequestBody::Update {
            space: 0,
            flags: 0,
            key: Tuple::new().field("k"),
            operations: vec![
                Operation::Assign {
                    field_no: 1,
                    value: b"v".to_vec(),
                },
                Operation::splice(2, 0, 1, "z"),
            ],
        },
    );
    let frame = encode_request(&request);
    let (_, body) = split(&frame);

    let mut expected = vec![0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 1, b'k'];
    expected.extend_from_slice(&[2, 0, 0, 0]); // op count
    expected.extend_from_slice(&[1, 0, 0, 0, 0, 1, b'v']); // assign
    expected.extend_from_slice(&[2, 0, 0, 0, 5]); // splice header
    expected.extend_from_slice(&[4, 0, 0, 0, 0]); // offset
    expected.extend_from_slice(&[4, 1, 0, 0, 0]); // length
    expected.extend_from_slice(&[1, b'z']);
    assert_eq!(body, &expected[..]);
}

#[test]
fn test_splice_omits_empty_offset_and_length() {
    let request = Request::with_id(
        1,
        RequestBody::Update {
            space: 0,
            flags: 0,
            key: Tuple::new(),
            operations: vec![Operation::Splice {
                field_no: 0,
                offset: Vec::new(),
                length: Vec::new(),
                value: b"abc".to_vec(),
            }],
        },
    );
    let frame = encode_request(&request);
    let (_, body) = split(&frame);
    assert_eq!(&body[16..], &[0, 0, 0, 0, 5, 3, b'a', b'b', b'c'][..]);
}

#[test]
fn test_long_field_uses_multibyte_length() {
    let request = Request::with_id(
        1,
        RequestBody::Insert {
            space: 0,
            flags: 0,
            tuple: Tuple::new().field(vec![7u8; 300]),
        },
    );
    let frame = encode_request(&request);
    let (header, body) = split(&frame);
    assert_eq!(header.body_length, 12 + 2 + 300);
    assert_eq!(&body[12..14], &[0x82, 0x2c]);
}

// =============================================================================
// Request Round-Trip Tests
// =============================================================================

#[test]
fn test_round_trip_each_command() {
    round_trip(Request::ping());
    round_trip(Request::insert(3, flags::ADD | flags::RETURN_TUPLE, richard()));
    round_trip(Request::select(
        3,
        0,
        10,
        100,
        vec![Tuple::new().field_u32(1), Tuple::new().field_u32(2)],
    ));
    round_trip(Request::delete(3, flags::QUIET, Tuple::new().field("Richard")));
    round_trip(Request::update(
        3,
        0,
        Tuple::new().field("Richard"),
        vec![
            Operation::Add {
                field_no: 2,
                value: 5u32.to_le_bytes().to_vec(),
            },
            Operation::Xor {
                field_no: 3,
                value: vec![0xff],
            },
            Operation::splice(1, 0, 2, "po"),
            Operation::Delete {
                field_no: 4,
                value: Vec::new(),
            },
        ],
    ));
    round_trip(Request::call(0, "echo", Tuple::new().field("a").field("b")));
}

#[test]
fn test_decode_rejects_trailing_bytes() {
    let mut frame = encode_request(&Request::with_id(1, RequestBody::Delete {
        space: 0,
        flags: 0,
        key: Tuple::new().field("a"),
    }));
    frame.push(0xaa);
    let (mut header, body) = split(&frame);
    header.body_length += 1;

    assert!(matches!(
        decode_request(&header, body),
        Err(ConnectorError::Protocol(_))
    ));
}

#[test]
fn test_decode_rejects_unknown_command() {
    let header = Header {
        command: 99,
        body_length: 0,
        request_id: 1,
    };
    assert!(decode_request(&header, &[]).is_err());
}

#[test]
fn test_decode_rejects_huge_cardinality() {
    // space, flags, then a cardinality far beyond what is buffered
    let body = [0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff, 0xff, 0x7f, 1, b'a'];
    let header = Header {
        command: CommandType::Insert.code(),
        body_length: body.len() as u32,
        request_id: 1,
    };
    assert!(matches!(
        decode_request(&header, &body),
        Err(ConnectorError::Protocol(_))
    ));
}

// =============================================================================
// Response Decoding Tests
// =============================================================================

#[test]
fn test_decode_empty_body() {
    let response = response_from(CommandType::Ping.code(), 4, &[]);
    assert!(response.is_ok());
    assert_eq!(response.request_id, 4);
    assert_eq!(response.affected_count, 0);
    assert!(response.tuples.is_empty());
}

#[test]
fn test_decode_status_only() {
    let response = response_from(13, 1, &[0, 0, 0, 0]);
    assert!(response.is_ok());
    assert!(response.error_message.is_none());
}

#[test]
fn test_decode_error_message() {
    let mut body = vec![0x02, 0x37, 0, 0];
    body.extend_from_slice(b"Duplicate key exists\0");
    let response = response_from(13, 1, &body);

    assert_eq!(response.status_code, 0x3702);
    assert_eq!(response.error_code(), 0x37);
    assert_eq!(response.error_message.as_deref(), Some("Duplicate key exists"));
    assert!(response.tuples.is_empty());
}

#[test]
fn test_decode_error_message_is_latin1() {
    let body = [0x02, 0, 0, 0, b'c', b'a', b'f', 0xe9];
    let response = response_from(13, 1, &body);
    assert_eq!(response.error_message.as_deref(), Some("caf\u{e9}"));
}

#[test]
fn test_eight_byte_body_has_no_tuples() {
    // A count with no tuple data following it: the count is reported, the
    // tuple list stays empty
    let response = response_from(17, 1, &[0, 0, 0, 0, 3, 0, 0, 0]);
    assert_eq!(response.affected_count, 3);
    assert!(response.tuples.is_empty());
}

#[test]
fn test_decode_tuples() {
    let mut body = vec![0, 0, 0, 0, 2, 0, 0, 0];
    body.extend_from_slice(&[4, 0, 0, 0, 2, 0, 0, 0, 1, b'a', 1, b'b']);
    body.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0]);
    let response = response_from(17, 1, &body);

    assert_eq!(response.affected_count, 2);
    assert_eq!(response.tuples.len(), 2);
    assert_eq!(response.tuples[0], Tuple::new().field("a").field("b"));
    assert!(response.tuples[1].is_empty());
}

#[test]
fn test_decode_truncated_tuple() {
    let body = [0, 0, 0, 0, 1, 0, 0, 0, 8, 0, 0, 0, 1, 0, 0, 0, 5, b'a'];
    let header = Header {
        command: 17,
        body_length: body.len() as u32,
        request_id: 1,
    };
    assert!(matches!(
        decode_response(&header, &body),
        Err(ConnectorError::Protocol(_))
    ));
}

#[test]
fn test_decode_body_length_mismatch() {
    let header = Header {
        command: 17,
        body_length: 10,
        request_id: 1,
    };
    assert!(decode_response(&header, &[0, 0, 0, 0]).is_err());
}

#[test]
fn test_response_encode_decode() {
    let original = Response::ok(
        CommandType::Select,
        21,
        2,
        vec![richard(), Tuple::new().field("Alice")],
    );
    let frame = encode_response(&original);
    let (header, body) = split(&frame);
    let decoded = decode_response(&header, body).unwrap();

    assert_eq!(decoded.request_id, 21);
    assert_eq!(decoded.affected_count, 2);
    assert_eq!(decoded.tuples, original.tuples);
}

#[test]
fn test_tuple_size_prefix_counts_length_bytes() {
    let tuple = Tuple::new().field("abc").field(vec![0u8; 200]);
    let frame = encode_response(&Response::ok(CommandType::Select, 4, 1, vec![tuple.clone()]));
    let body = &frame[HEADER_SIZE..];

    // One length byte for "abc", two for the 200-byte field
    let size = u32::from_le_bytes(body[8..12].try_into().unwrap());
    assert_eq!(size as usize, 1 + 3 + 2 + 200);
    assert_eq!(response_from(17, 4, body).tuples, vec![tuple]);
}

#[test]
fn test_bare_ping_response_is_empty() {
    let frame = encode_response(&Response::ping(3));
    assert_eq!(frame.len(), HEADER_SIZE);
}

// =============================================================================
// Stream I/O Tests
// =============================================================================

#[test]
fn test_stream_request_io() {
    let request = Request::call(0, "echo", Tuple::new().field("hi"));
    let mut buffer = Vec::new();
    write_request(&mut buffer, &request).unwrap();

    let mut cursor = Cursor::new(buffer);
    let read = read_request(&mut cursor).unwrap();
    assert_eq!(read, request);
}

#[test]
fn test_stream_response_io() {
    let response = Response::error(CommandType::Call, 8, 0x3202, "no such procedure");
    let mut buffer = Vec::new();
    write_response(&mut buffer, &response).unwrap();

    let mut cursor = Cursor::new(buffer);
    let read = read_response(&mut cursor).unwrap();
    assert_eq!(read.request_id, 8);
    assert_eq!(read.status_code, 0x3202);
    assert_eq!(read.error_message.as_deref(), Some("no such procedure"));
}

#[test]
fn test_stream_truncated_frame() {
    let frame = encode_request(&Request::insert(0, 0, richard()));
    let mut cursor = Cursor::new(frame[..frame.len() - 3].to_vec());
    assert!(matches!(
        read_request(&mut cursor),
        Err(ConnectorError::Transport(_))
    ));
}

#[test]
fn test_stream_rejects_oversized_body() {
    let mut frame = Vec::new();
    Header {
        command: 17,
        body_length: MAX_BODY_SIZE + 1,
        request_id: 1,
    }
    .encode(&mut frame);
    let mut cursor = Cursor::new(frame);
    assert!(matches!(
        read_response(&mut cursor),
        Err(ConnectorError::Protocol(_))
    ));
}

#[test]
fn test_request_ids_increase() {
    let mut previous = Request::ping().id();
    for _ in 0..1000 {
        let id = Request::ping().id();
        assert!(id > previous);
        previous = id;
    }
}
