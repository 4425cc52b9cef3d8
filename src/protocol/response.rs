//! Response definitions
//!
//! Represents one decoded reply frame.

use crate::error::{ConnectorError, Result};

use super::command::CommandType;
use super::request::Tuple;

/// Completion status carried in the low byte of the status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Ok,
    TryAgain,
    Error,
    Unknown(u8),
}

/// A decoded response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Command code echoed by the server
    pub command: u32,

    /// Body length declared in the header
    pub body_length: u32,

    /// Id of the request this answers
    pub request_id: i32,

    /// 0 on success
    pub status_code: u32,

    /// Affected/returned tuple count; may be nonzero with no tuples attached
    pub affected_count: u32,

    /// Returned tuples
    pub tuples: Vec<Tuple>,

    /// Server-supplied message of an error response
    pub error_message: Option<String>,
}

impl Response {
    /// Successful reply to a ping
    pub fn ping(request_id: i32) -> Self {
        Self {
            command: CommandType::Ping.code(),
            body_length: 0,
            request_id,
            status_code: 0,
            affected_count: 0,
            tuples: Vec::new(),
            error_message: None,
        }
    }

    /// Successful reply carrying a count and tuples
    pub fn ok(command: CommandType, request_id: i32, affected_count: u32, tuples: Vec<Tuple>) -> Self {
        Self {
            command: command.code(),
            body_length: 0,
            request_id,
            status_code: 0,
            affected_count,
            tuples,
            error_message: None,
        }
    }

    /// Error reply
    pub fn error(command: CommandType, request_id: i32, status_code: u32, message: &str) -> Self {
        Self {
            command: command.code(),
            body_length: 0,
            request_id,
            status_code,
            affected_count: 0,
            tuples: Vec::new(),
            error_message: Some(message.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == 0
    }

    pub fn completion(&self) -> Completion {
        match self.status_code & 0xff {
            0 => Completion::Ok,
            1 => Completion::TryAgain,
            2 => Completion::Error,
            other => Completion::Unknown(other as u8),
        }
    }

    /// Server error code without the completion byte
    pub fn error_code(&self) -> u32 {
        self.status_code >> 8
    }

    pub fn command_type(&self) -> Option<CommandType> {
        CommandType::try_from(self.command).ok()
    }

    /// Turn a nonzero status into `ConnectorError::Server`
    pub fn into_result(self) -> Result<Self> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(ConnectorError::Server {
                code: self.status_code,
                message: self.error_message.unwrap_or_default(),
            })
        }
    }
}
