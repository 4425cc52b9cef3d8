//! Request definitions
//!
//! Typed requests, tuples and update operations.

use std::sync::atomic::{AtomicI32, Ordering};

use super::command::{CommandType, OpCode};

/// Monotonic request id counter that wraps back to 1 instead of going
/// negative
#[derive(Debug)]
pub struct RequestIds(AtomicI32);

impl RequestIds {
    /// Counter whose first `next` returns `first`
    pub const fn starting_at(first: i32) -> Self {
        Self(AtomicI32::new(first))
    }

    pub fn next(&self) -> i32 {
        let previous = self.0.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| {
            Some(if id == i32::MAX { 1 } else { id + 1 })
        });
        // fetch_update only fails when the closure returns None
        match previous {
            Ok(id) | Err(id) => id,
        }
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

/// Process-wide request id source.
///
/// Ids are shared by every connector and every socket in the process; they
/// are not connection-scoped.
static NEXT_REQUEST_ID: RequestIds = RequestIds::starting_at(1);

/// Draw the next request id
pub fn next_request_id() -> i32 {
    NEXT_REQUEST_ID.next()
}

/// An ordered list of opaque byte fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tuple {
    fields: Vec<Vec<u8>>,
}

impl Tuple {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw field
    pub fn field(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.fields.push(value.into());
        self
    }

    /// Append a 4-byte little-endian integer field
    pub fn field_u32(self, value: u32) -> Self {
        self.field(value.to_le_bytes().to_vec())
    }

    /// Append an 8-byte little-endian integer field
    pub fn field_u64(self, value: u64) -> Self {
        self.field(value.to_le_bytes().to_vec())
    }

    pub fn push(&mut self, value: impl Into<Vec<u8>>) {
        self.fields.push(value.into());
    }

    pub fn fields(&self) -> &[Vec<u8>] {
        &self.fields
    }

    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.fields.get(index).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_fields(self) -> Vec<Vec<u8>> {
        self.fields
    }
}

impl From<Vec<Vec<u8>>> for Tuple {
    fn from(fields: Vec<Vec<u8>>) -> Self {
        Self { fields }
    }
}

impl<'a> From<&[&'a [u8]]> for Tuple {
    fn from(fields: &[&'a [u8]]) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_vec()).collect(),
        }
    }
}

/// An update operation on one field of a tuple
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Assign { field_no: u32, value: Vec<u8> },
    Add { field_no: u32, value: Vec<u8> },
    And { field_no: u32, value: Vec<u8> },
    Xor { field_no: u32, value: Vec<u8> },
    Or { field_no: u32, value: Vec<u8> },
    Delete { field_no: u32, value: Vec<u8> },
    Insert { field_no: u32, value: Vec<u8> },

    /// Replace `length` bytes at `offset` with `value`. Empty `offset` or
    /// `length` are left out of the wire block.
    Splice {
        field_no: u32,
        offset: Vec<u8>,
        length: Vec<u8>,
        value: Vec<u8>,
    },
}

impl Operation {
    /// Splice with 4-byte little-endian offset and length
    pub fn splice(field_no: u32, offset: u32, length: u32, value: impl Into<Vec<u8>>) -> Self {
        Operation::Splice {
            field_no,
            offset: offset.to_le_bytes().to_vec(),
            length: length.to_le_bytes().to_vec(),
            value: value.into(),
        }
    }

    pub fn opcode(&self) -> OpCode {
        match self {
            Operation::Assign { .. } => OpCode::Assign,
            Operation::Add { .. } => OpCode::Add,
            Operation::And { .. } => OpCode::And,
            Operation::Xor { .. } => OpCode::Xor,
            Operation::Or { .. } => OpCode::Or,
            Operation::Delete { .. } => OpCode::Delete,
            Operation::Insert { .. } => OpCode::Insert,
            Operation::Splice { .. } => OpCode::Splice,
        }
    }

    pub fn field_no(&self) -> u32 {
        match self {
            Operation::Assign { field_no, .. }
            | Operation::Add { field_no, .. }
            | Operation::And { field_no, .. }
            | Operation::Xor { field_no, .. }
            | Operation::Or { field_no, .. }
            | Operation::Delete { field_no, .. }
            | Operation::Insert { field_no, .. }
            | Operation::Splice { field_no, .. } => *field_no,
        }
    }

    pub fn value(&self) -> &[u8] {
        match self {
            Operation::Assign { value, .. }
            | Operation::Add { value, .. }
            | Operation::And { value, .. }
            | Operation::Xor { value, .. }
            | Operation::Or { value, .. }
            | Operation::Delete { value, .. }
            | Operation::Insert { value, .. }
            | Operation::Splice { value, .. } => value,
        }
    }

    /// Build a non-splice operation from its opcode
    pub(crate) fn simple(opcode: OpCode, field_no: u32, value: Vec<u8>) -> Option<Self> {
        let op = match opcode {
            OpCode::Assign => Operation::Assign { field_no, value },
            OpCode::Add => Operation::Add { field_no, value },
            OpCode::And => Operation::And { field_no, value },
            OpCode::Xor => Operation::Xor { field_no, value },
            OpCode::Or => Operation::Or { field_no, value },
            OpCode::Delete => Operation::Delete { field_no, value },
            OpCode::Insert => Operation::Insert { field_no, value },
            OpCode::Splice => return None,
        };
        Some(op)
    }
}

/// Command-specific request payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Liveness check
    Ping,

    /// Store a tuple
    Insert { space: u32, flags: u32, tuple: Tuple },

    /// Fetch tuples matching any of `keys` on `index`
    Select {
        space: u32,
        index: u32,
        offset: u32,
        limit: u32,
        keys: Vec<Tuple>,
    },

    /// Remove the tuple matching `key`
    Delete { space: u32, flags: u32, key: Tuple },

    /// Apply `operations` to the tuple matching `key`
    Update {
        space: u32,
        flags: u32,
        key: Tuple,
        operations: Vec<Operation>,
    },

    /// Invoke a stored procedure
    Call {
        flags: u32,
        procedure: String,
        args: Tuple,
    },
}

impl RequestBody {
    pub fn command_type(&self) -> CommandType {
        match self {
            RequestBody::Ping => CommandType::Ping,
            RequestBody::Insert { .. } => CommandType::Insert,
            RequestBody::Select { .. } => CommandType::Select,
            RequestBody::Delete { .. } => CommandType::Delete,
            RequestBody::Update { .. } => CommandType::Update,
            RequestBody::Call { .. } => CommandType::Call,
        }
    }
}

/// A request paired with its immutable id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    id: i32,
    body: RequestBody,
}

impl Request {
    /// Create a request with a fresh process-wide id
    pub fn new(body: RequestBody) -> Self {
        Self {
            id: next_request_id(),
            body,
        }
    }

    /// Create a request with an explicit id
    pub fn with_id(id: i32, body: RequestBody) -> Self {
        Self { id, body }
    }

    pub fn ping() -> Self {
        Self::new(RequestBody::Ping)
    }

    pub fn insert(space: u32, flags: u32, tuple: Tuple) -> Self {
        Self::new(RequestBody::Insert { space, flags, tuple })
    }

    pub fn select(space: u32, index: u32, offset: u32, limit: u32, keys: Vec<Tuple>) -> Self {
        Self::new(RequestBody::Select {
            space,
            index,
            offset,
            limit,
            keys,
        })
    }

    pub fn delete(space: u32, flags: u32, key: Tuple) -> Self {
        Self::new(RequestBody::Delete { space, flags, key })
    }

    pub fn update(space: u32, flags: u32, key: Tuple, operations: Vec<Operation>) -> Self {
        Self::new(RequestBody::Update {
            space,
            flags,
            key,
            operations,
        })
    }

    pub fn call(flags: u32, procedure: impl Into<String>, args: Tuple) -> Self {
        Self::new(RequestBody::Call {
            flags,
            procedure: procedure.into(),
            args,
        })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn command_type(&self) -> CommandType {
        self.body.command_type()
    }
}
