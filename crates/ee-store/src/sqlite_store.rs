//! SQLite-backed repository.
//!
//! Tables: `contract_agents`, `contract_artifacts` (bytecode blob plus JSON metadata),
//! `contracts`, and `blocks` keyed by `(contract_id, block_index)`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use ee_ledger::Block;
use ee_wire::{AgentMeta, ArtifactMetadata, SchemaValue};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use crate::{Contract, Deployment, Repository, StoreError, StoreResult, expected_next_index};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS contract_agents (
    hash TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    version TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS contract_artifacts (
    hash TEXT PRIMARY KEY,
    agent_hash TEXT NOT NULL REFERENCES contract_agents(hash),
    bytecode BLOB NOT NULL,
    metadata TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS contracts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    version TEXT NOT NULL,
    owner TEXT NOT NULL,
    artifact_hash TEXT NOT NULL REFERENCES contract_artifacts(hash),
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_contracts_artifact_hash ON contracts(artifact_hash);
CREATE TABLE IF NOT EXISTS blocks (
    contract_id TEXT NOT NULL,
    block_index INTEGER NOT NULL,
    hash TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    previous_hash TEXT NOT NULL,
    journal_hash TEXT NOT NULL,
    signature BLOB NOT NULL,
    function_name TEXT NOT NULL,
    artifact_hash TEXT NOT NULL,
    journal BLOB NOT NULL,
    PRIMARY KEY (contract_id, block_index)
);
";

const BLOCK_COLUMNS: &str = "contract_id, block_index, hash, timestamp, previous_hash, \
     journal_hash, signature, function_name, artifact_hash, journal";

const CONTRACT_COLUMNS: &str = "id, name, version, owner, artifact_hash, created_at";

/// Artifact sections stored as JSON next to the raw bytecode.
#[derive(Serialize)]
struct SectionsRef<'a> {
    const_pool: &'a [SchemaValue],
    functions: &'a BTreeMap<String, SchemaValue>,
    function_name: &'a BTreeMap<u32, String>,
    types: &'a BTreeMap<String, SchemaValue>,
    init_storage: &'a BTreeMap<String, SchemaValue>,
}

#[derive(Deserialize)]
struct Sections {
    #[serde(default)]
    const_pool: Vec<SchemaValue>,
    #[serde(default)]
    functions: BTreeMap<String, SchemaValue>,
    #[serde(default)]
    function_name: BTreeMap<u32, String>,
    #[serde(default)]
    types: BTreeMap<String, SchemaValue>,
    #[serde(default)]
    init_storage: BTreeMap<String, SchemaValue>,
}

pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRepository").finish_non_exhaustive()
    }
}

impl SqliteRepository {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn duplicate(kind: &'static str, key: &str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    let key = key.to_string();
    move |err| match err {
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Duplicate { kind, key }
        }
        other => StoreError::Sqlite(other),
    }
}

fn contract_from_row(row: &Row<'_>) -> rusqlite::Result<Contract> {
    Ok(Contract {
        id: row.get(0)?,
        name: row.get(1)?,
        version: row.get(2)?,
        owner: row.get(3)?,
        artifact_hash: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn block_from_row(row: &Row<'_>) -> rusqlite::Result<Block> {
    let index: i64 = row.get(1)?;
    Ok(Block {
        contract_id: row.get(0)?,
        block_index: index as u64,
        hash: row.get(2)?,
        timestamp: row.get(3)?,
        previous_hash: row.get(4)?,
        journal_hash: row.get(5)?,
        signature: row.get(6)?,
        function_name: row.get(7)?,
        artifact_hash: row.get(8)?,
        journal: row.get(9)?,
    })
}

impl Repository for SqliteRepository {
    fn save_deployment(&self, deployment: &Deployment) -> StoreResult<()> {
        let artifact = &deployment.artifact;
        let metadata = serde_json::to_string(&SectionsRef {
            const_pool: &artifact.const_pool,
            functions: &artifact.functions,
            function_name: &artifact.function_name,
            types: &artifact.types,
            init_storage: &artifact.init_storage,
        })
        .map_err(|source| StoreError::Encoding {
            what: "artifact metadata",
            source,
        })?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO contract_agents (hash, name, version) VALUES (?1, ?2, ?3)",
            params![
                deployment.agent.hash,
                deployment.agent.name,
                deployment.agent.version
            ],
        )?;
        tx.execute(
            "INSERT INTO contract_artifacts (hash, agent_hash, bytecode, metadata)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                deployment.artifact_hash,
                deployment.agent.hash,
                artifact.bytecode,
                metadata
            ],
        )
        .map_err(duplicate("artifact", &deployment.artifact_hash))?;
        let contract = &deployment.contract;
        tx.execute(
            "INSERT INTO contracts (id, name, version, owner, artifact_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                contract.id,
                contract.name,
                contract.version,
                contract.owner,
                contract.artifact_hash,
                contract.created_at
            ],
        )
        .map_err(duplicate("contract", &contract.id))?;
        tx.commit()?;
        tracing::debug!(contract_id = %contract.id, "deployment persisted");
        Ok(())
    }

    fn contract(&self, id: &str) -> StoreResult<Option<Contract>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                &format!("SELECT {CONTRACT_COLUMNS} FROM contracts WHERE id = ?1"),
                params![id],
                contract_from_row,
            )
            .optional()?)
    }

    fn contract_by_artifact(&self, artifact_hash: &str) -> StoreResult<Option<Contract>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {CONTRACT_COLUMNS} FROM contracts WHERE artifact_hash = ?1
                     ORDER BY created_at LIMIT 1"
                ),
                params![artifact_hash],
                contract_from_row,
            )
            .optional()?)
    }

    fn artifact(&self, hash: &str) -> StoreResult<Option<ArtifactMetadata>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT bytecode, metadata FROM contract_artifacts WHERE hash = ?1",
                params![hash],
                |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        let Some((bytecode, metadata)) = row else {
            return Ok(None);
        };
        let sections: Sections =
            serde_json::from_str(&metadata).map_err(|source| StoreError::Encoding {
                what: "artifact metadata",
                source,
            })?;
        Ok(Some(ArtifactMetadata {
            bytecode,
            const_pool: sections.const_pool,
            functions: sections.functions,
            function_name: sections.function_name,
            types: sections.types,
            init_storage: sections.init_storage,
        }))
    }

    fn agent(&self, hash: &str) -> StoreResult<Option<AgentMeta>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT hash, name, version FROM contract_agents WHERE hash = ?1",
                params![hash],
                |row| {
                    Ok(AgentMeta {
                        hash: row.get(0)?,
                        name: row.get(1)?,
                        version: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    fn append_block(&self, block: &Block) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let tip: Option<i64> = tx.query_row(
            "SELECT MAX(block_index) FROM blocks WHERE contract_id = ?1",
            params![block.contract_id],
            |row| row.get(0),
        )?;
        let tip = tip.map(|index| index as u64);
        if block.block_index != expected_next_index(tip) {
            return Err(StoreError::OutOfOrder {
                contract_id: block.contract_id.clone(),
                tip: tip.unwrap_or(0),
                actual: block.block_index,
            });
        }
        tx.execute(
            &format!(
                "INSERT INTO blocks ({BLOCK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                block.contract_id,
                block.block_index as i64,
                block.hash,
                block.timestamp,
                block.previous_hash,
                block.journal_hash,
                block.signature,
                block.function_name,
                block.artifact_hash,
                block.journal
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn latest_block(&self, contract_id: &str) -> StoreResult<Option<Block>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {BLOCK_COLUMNS} FROM blocks WHERE contract_id = ?1
                     ORDER BY block_index DESC LIMIT 1"
                ),
                params![contract_id],
                block_from_row,
            )
            .optional()?)
    }

    fn blocks(&self, contract_id: &str) -> StoreResult<Vec<Block>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BLOCK_COLUMNS} FROM blocks WHERE contract_id = ?1 ORDER BY block_index"
        ))?;
        let rows = stmt.query_map(params![contract_id], block_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
