//! Contract orchestration: deploy through the engine, execute under the per-contract
//! lock, and extend the contract's ledger with a signed block per execution.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ee_crypto::{JournalKey, LedgerSigner, VerifyingKey, decrypt_journal, sha256_hex};
use ee_ledger::{Block, BlockDraft, genesis, journal_bytes, next_block, verify_block, verify_chain};
use ee_store::{Contract, Deployment, DynRepository, Repository, StoreResult};
use ee_wire::{
    DeployPayload, DeployResponse, ExecPayload, ExecResponse, Payload, PingPayload, Transport,
    WireMessage, WireResponse,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::locker::ContractLocker;
use crate::now_millis;

#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub contract_name: String,
    pub version: String,
    pub owner: String,
    pub source: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    pub function: String,
    pub args: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct Deployed {
    pub contract: Contract,
    pub functions: Vec<String>,
    /// Engine reply as received.
    pub response: WireResponse,
}

#[derive(Debug, Clone)]
pub struct Executed {
    pub result: ExecResponse,
    /// Block appended for this execution.
    pub block: Block,
    pub response: WireResponse,
}

/// Outcome of re-validating a contract's persisted chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub contract_id: String,
    pub verified_blocks: usize,
    pub tip_hash: Option<String>,
}

/// A block together with its decrypted journal.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub block_index: u64,
    pub hash: String,
    pub previous_hash: String,
    pub timestamp: i64,
    pub function_name: String,
    pub journal: Vec<serde_json::Value>,
}

/// Contract id for a deployment: SHA-256 over `owner|contract_name|version|created_ms`.
pub fn deploy_fingerprint(owner: &str, contract_name: &str, version: &str, created_ms: i64) -> String {
    sha256_hex(format!("{owner}|{contract_name}|{version}|{created_ms}").as_bytes())
}

pub struct ContractService {
    transport: Arc<dyn Transport>,
    repo: DynRepository,
    locker: ContractLocker,
    signer: LedgerSigner,
    journal_key: JournalKey,
    public: VerifyingKey,
    lock_timeout: Duration,
}

impl ContractService {
    pub fn new(
        transport: Arc<dyn Transport>,
        repo: DynRepository,
        signer: LedgerSigner,
        lock_timeout: Duration,
    ) -> Self {
        let journal_key = JournalKey::derive(&signer);
        let public = signer.verifying_key();
        Self {
            transport,
            repo,
            locker: ContractLocker::new(),
            signer,
            journal_key,
            public,
            lock_timeout,
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.public
    }

    pub fn repository(&self) -> &DynRepository {
        &self.repo
    }

    pub fn locker(&self) -> &ContractLocker {
        &self.locker
    }

    /// Run `op` against the repository on the blocking pool so SQLite I/O never
    /// stalls the async workers.
    async fn with_repo<T, F>(&self, op: F) -> Result<T, GatewayError>
    where
        F: FnOnce(&dyn Repository) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let repo = self.repo.clone();
        Ok(tokio::task::spawn_blocking(move || op(repo.as_ref())).await??)
    }

    async fn known_contract(&self, contract_id: &str) -> Result<Contract, GatewayError> {
        let id = contract_id.to_string();
        self.with_repo(move |repo| repo.contract(&id))
            .await?
            .ok_or_else(|| GatewayError::ContractNotFound(contract_id.to_string()))
    }

    /// Compile `request.source` on the engine and persist the resulting agent, artifact
    /// and contract as one unit. Nothing is written unless the engine succeeds.
    pub async fn deploy(&self, request: DeployRequest) -> Result<Deployed, GatewayError> {
        if request.contract_name.is_empty() || request.owner.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "contract_name and owner are required".into(),
            ));
        }
        let created_at = now_millis();
        let hash = deploy_fingerprint(
            &request.owner,
            &request.contract_name,
            &request.version,
            created_at,
        );
        let message = WireMessage::new(
            Uuid::new_v4().to_string(),
            Payload::Deploy(DeployPayload {
                hash: hash.clone(),
                contract_name: request.contract_name.clone(),
                version: request.version.clone(),
                owner: request.owner.clone(),
                source: request.source,
            }),
        );
        tracing::info!(
            contract_id = %hash,
            contract_name = %request.contract_name,
            owner = %request.owner,
            "deploying contract"
        );

        let response = self.transport.send(&message).await?;
        let deployed: DeployResponse = response.decode_data()?;
        if deployed.contract_hash != hash {
            tracing::warn!(
                expected = %hash,
                reported = %deployed.contract_hash,
                "engine reported a different contract hash"
            );
        }

        let contract = Contract {
            id: hash.clone(),
            name: request.contract_name,
            version: request.version,
            owner: request.owner,
            artifact_hash: hash.clone(),
            created_at,
        };
        let deployment = Deployment {
            agent: deployed.agent,
            artifact_hash: hash,
            artifact: deployed.contract_artifact,
            contract: contract.clone(),
        };
        self.with_repo(move |repo| repo.save_deployment(&deployment)).await?;
        tracing::info!(contract_id = %contract.id, "contract deployed");

        Ok(Deployed {
            contract,
            functions: deployed.functions,
            response,
        })
    }

    /// Run `request.function` on the engine and append the resulting block.
    ///
    /// The contract lock is held from before the engine call until the block is
    /// persisted, and is released on every exit path. Unknown ids are rejected before
    /// any lock is taken, so only deployed contracts ever get a lock slot.
    pub async fn execute(
        &self,
        contract_id: &str,
        request: ExecRequest,
    ) -> Result<Executed, GatewayError> {
        let contract = self.known_contract(contract_id).await?;
        let _guard = self
            .locker
            .acquire_timeout(contract_id, self.lock_timeout)
            .await?;

        let artifact_hash = contract.artifact_hash.clone();
        let artifact = self
            .with_repo(move |repo| repo.artifact(&artifact_hash))
            .await?
            .ok_or_else(|| GatewayError::ArtifactNotFound(contract.artifact_hash.clone()))?;

        let message = WireMessage::new(
            Uuid::new_v4().to_string(),
            Payload::Exec(ExecPayload {
                artifact_hash: contract.artifact_hash.clone(),
                contract_artifact: artifact,
                function: request.function.clone(),
                args: request.args,
            }),
        );
        tracing::debug!(contract_id, function = %request.function, "executing");

        let response = self.transport.send(&message).await?;
        let result: ExecResponse = response.decode_data()?;
        if result.artifact_hash != contract.artifact_hash {
            tracing::warn!(
                contract_id,
                reported = %result.artifact_hash,
                "engine reported a different artifact hash"
            );
        }

        let tip = self.chain_tip(contract_id).await?;
        let journal = journal_bytes(&result.journal)?;
        let block = next_block(
            &tip,
            BlockDraft {
                contract_id: contract_id.to_string(),
                function_name: request.function,
                artifact_hash: contract.artifact_hash,
                journal: journal.clone(),
            },
            now_millis(),
            &self.signer,
            &self.journal_key,
        )?;
        verify_block(&tip, &block, &journal, &self.public)?;
        let stored = block.clone();
        self.with_repo(move |repo| repo.append_block(&stored)).await?;
        tracing::info!(
            contract_id,
            block_index = block.block_index,
            hash = %block.hash,
            exec_price = result.exec_price,
            "block appended"
        );

        Ok(Executed {
            result,
            block,
            response,
        })
    }

    /// Current tip, persisting the genesis block first if the chain is empty.
    async fn chain_tip(&self, contract_id: &str) -> Result<Block, GatewayError> {
        let id = contract_id.to_string();
        let (tip, created) = self
            .with_repo(move |repo| {
                if let Some(tip) = repo.latest_block(&id)? {
                    return Ok((tip, false));
                }
                let block = genesis(&id, now_millis());
                repo.append_block(&block)?;
                Ok((block, true))
            })
            .await?;
        if created {
            tracing::debug!(contract_id, "genesis block created");
        }
        Ok(tip)
    }

    async fn persisted_blocks(&self, contract_id: &str) -> Result<Vec<Block>, GatewayError> {
        self.known_contract(contract_id).await?;
        let id = contract_id.to_string();
        self.with_repo(move |repo| repo.blocks(&id)).await
    }

    /// Re-validate every persisted block of `contract_id`.
    pub async fn audit(&self, contract_id: &str) -> Result<AuditReport, GatewayError> {
        let blocks = self.persisted_blocks(contract_id).await?;
        let verified_blocks = if blocks.is_empty() {
            0
        } else {
            verify_chain(&blocks, &self.journal_key, &self.public)?
        };
        Ok(AuditReport {
            contract_id: contract_id.to_string(),
            verified_blocks,
            tip_hash: blocks.last().map(|b| b.hash.clone()),
        })
    }

    /// Execution blocks of `contract_id` with their journals decrypted.
    pub async fn history(&self, contract_id: &str) -> Result<Vec<LedgerEntry>, GatewayError> {
        self.persisted_blocks(contract_id)
            .await?
            .into_iter()
            .filter(|block| !block.is_genesis())
            .map(|block| -> Result<LedgerEntry, GatewayError> {
                let plain = decrypt_journal(&block.journal, &self.journal_key)?;
                Ok(LedgerEntry {
                    block_index: block.block_index,
                    hash: block.hash,
                    previous_hash: block.previous_hash,
                    timestamp: block.timestamp,
                    function_name: block.function_name,
                    journal: serde_json::from_slice(&plain)?,
                })
            })
            .collect()
    }

    /// Round trip a PING to the engine.
    pub async fn ping(&self) -> Result<Duration, GatewayError> {
        let started = Instant::now();
        let message = WireMessage::new(
            Uuid::new_v4().to_string(),
            Payload::Ping(PingPayload {
                timestamp: now_millis(),
            }),
        );
        let response = self.transport.send(&message).await?;
        let _: PingPayload = response.decode_data()?;
        Ok(started.elapsed())
    }
}
