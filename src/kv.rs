//! Key/value facade
//!
//! Id/blob helpers over one space. Tuples are stored as `[id, data]` with
//! the id as field 0 (the primary key).

use crate::connector::Connector;
use crate::error::{ConnectorError, Result};
use crate::protocol::{Request, Tuple};

/// Default select limit for key enumeration
const SCAN_LIMIT: u32 = u32::MAX;

/// Byte-oriented store bound to one space
pub struct KvStore {
    connector: Connector,
    space: u32,
}

impl KvStore {
    pub fn new(connector: Connector, space: u32) -> Self {
        Self { connector, space }
    }

    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    pub fn space(&self) -> u32 {
        self.space
    }

    /// Store `data` under `id`
    pub fn insert(&self, id: &[u8], data: &[u8]) -> Result<()> {
        let tuple = Tuple::new().field(id).field(data);
        let response = self.connector.execute(&Request::insert(self.space, 0, tuple))?;
        if response.affected_count != 1 {
            return Err(ConnectorError::Protocol(format!(
                "Insert affected {} tuples, expected 1",
                response.affected_count
            )));
        }
        Ok(())
    }

    /// Store `data` under an 8-byte little-endian id
    pub fn insert_long(&self, id: i64, data: &[u8]) -> Result<()> {
        self.insert(&id.to_le_bytes(), data)
    }

    /// Fetch the data stored under `id`
    pub fn get(&self, id: &[u8]) -> Result<Option<Vec<u8>>> {
        let key = Tuple::new().field(id);
        let response = self
            .connector
            .execute(&Request::select(self.space, 0, 0, 1, vec![key]))?;

        Ok(response
            .tuples
            .into_iter()
            .next()
            .and_then(|tuple| tuple.into_fields().into_iter().nth(1)))
    }

    pub fn get_long(&self, id: i64) -> Result<Option<Vec<u8>>> {
        self.get(&id.to_le_bytes())
    }

    /// Remove `id`; true when something was deleted
    pub fn delete(&self, id: &[u8]) -> Result<bool> {
        let key = Tuple::new().field(id);
        let response = self.connector.execute(&Request::delete(self.space, 0, key))?;
        Ok(response.affected_count > 0)
    }

    pub fn delete_long(&self, id: i64) -> Result<bool> {
        self.delete(&id.to_le_bytes())
    }

    /// Every id in the space
    pub fn keys(&self) -> Result<Vec<Vec<u8>>> {
        let response = self.connector.execute(&Request::select(
            self.space,
            0,
            0,
            SCAN_LIMIT,
            vec![Tuple::new()],
        ))?;

        Ok(response
            .tuples
            .into_iter()
            .filter_map(|tuple| tuple.into_fields().into_iter().next())
            .collect())
    }

    /// Every id in the space, read as 8-byte little-endian integers
    pub fn keys_long(&self) -> Result<Vec<i64>> {
        self.keys()?.into_iter().map(long_id).collect()
    }

    /// Ids delivered by a server-side procedure instead of a full scan.
    ///
    /// The procedure receives the space and `batch_size` as 4-byte
    /// little-endian fields and answers one tuple per id, the id in field 0.
    pub fn keys_by_script(&self, procedure: &str, batch_size: u32) -> Result<Vec<Vec<u8>>> {
        let args = Tuple::new().field_u32(self.space).field_u32(batch_size);
        Ok(self
            .call(procedure, args)?
            .into_iter()
            .filter_map(|tuple| tuple.into_fields().into_iter().next())
            .collect())
    }

    pub fn keys_by_script_long(&self, procedure: &str, batch_size: u32) -> Result<Vec<i64>> {
        self.keys_by_script(procedure, batch_size)?
            .into_iter()
            .map(long_id)
            .collect()
    }

    /// Delete every key; returns how many were removed
    pub fn truncate(&self) -> Result<usize> {
        let mut removed = 0;
        for key in self.keys()? {
            if self.delete(&key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Call a stored procedure and return its tuples
    pub fn call(&self, procedure: &str, args: Tuple) -> Result<Vec<Tuple>> {
        let response = self.connector.execute(&Request::call(0, procedure, args))?;
        Ok(response.tuples)
    }
}

fn long_id(key: Vec<u8>) -> Result<i64> {
    let bytes: [u8; 8] = key.as_slice().try_into().map_err(|_| {
        ConnectorError::Protocol(format!("Key of {} bytes is not a long id", key.len()))
    })?;
    Ok(i64::from_le_bytes(bytes))
}
