//! Command definitions
//!
//! Numeric codes carried in the frame header and in update operation blocks.

use crate::error::{ConnectorError, Result};

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CommandType {
    Insert = 13,
    Select = 17,
    Update = 19,
    Delete = 21,
    Call = 22,
    Ping = 0xFF00,
}

impl CommandType {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            CommandType::Insert => "INSERT",
            CommandType::Select => "SELECT",
            CommandType::Update => "UPDATE",
            CommandType::Delete => "DELETE",
            CommandType::Call => "CALL",
            CommandType::Ping => "PING",
        }
    }
}

impl TryFrom<u32> for CommandType {
    type Error = ConnectorError;

    fn try_from(code: u32) -> Result<Self> {
        match code {
            13 => Ok(CommandType::Insert),
            17 => Ok(CommandType::Select),
            19 => Ok(CommandType::Update),
            21 => Ok(CommandType::Delete),
            22 => Ok(CommandType::Call),
            0xFF00 => Ok(CommandType::Ping),
            _ => Err(ConnectorError::Protocol(format!(
                "Unknown command type: 0x{:x}",
                code
            ))),
        }
    }
}

/// Update operation opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Assign = 0,
    Add = 1,
    And = 2,
    Xor = 3,
    Or = 4,
    Splice = 5,
    Delete = 6,
    Insert = 7,
}

impl TryFrom<u8> for OpCode {
    type Error = ConnectorError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(OpCode::Assign),
            1 => Ok(OpCode::Add),
            2 => Ok(OpCode::And),
            3 => Ok(OpCode::Xor),
            4 => Ok(OpCode::Or),
            5 => Ok(OpCode::Splice),
            6 => Ok(OpCode::Delete),
            7 => Ok(OpCode::Insert),
            _ => Err(ConnectorError::Protocol(format!(
                "Unknown update opcode: {}",
                code
            ))),
        }
    }
}

/// Request flag bits (insert, delete, update, call)
pub mod flags {
    /// Ask the server to send the affected tuple back
    pub const RETURN_TUPLE: u32 = 1;
    /// Insert only if the key is absent
    pub const ADD: u32 = 2;
    /// Insert only if the key is present
    pub const REPLACE: u32 = 4;
    /// Suppress the reply body
    pub const QUIET: u32 = 8;
}
