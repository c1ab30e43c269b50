use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ee_ledger::Block;
use ee_wire::{AgentMeta, ArtifactMetadata};

use crate::{Contract, Deployment, Repository, StoreError, StoreResult, expected_next_index};

#[derive(Default)]
struct State {
    agents: HashMap<String, AgentMeta>,
    artifacts: HashMap<String, ArtifactMetadata>,
    contracts: HashMap<String, Contract>,
    chains: HashMap<String, Vec<Block>>,
}

/// Process-local repository; every write takes one lock, so multi-record writes are atomic.
#[derive(Clone, Default)]
pub struct MemRepository {
    state: Arc<RwLock<State>>,
}

impl std::fmt::Debug for MemRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("MemRepository");
        if let Ok(state) = self.state.read() {
            dbg.field("contracts", &state.contracts.len())
                .field("chains", &state.chains.len());
        }
        dbg.finish()
    }
}

impl MemRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| StoreError::Poisoned)
    }
}

impl Repository for MemRepository {
    fn save_deployment(&self, deployment: &Deployment) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.artifacts.contains_key(&deployment.artifact_hash) {
            return Err(StoreError::Duplicate {
                kind: "artifact",
                key: deployment.artifact_hash.clone(),
            });
        }
        if state.contracts.contains_key(&deployment.contract.id) {
            return Err(StoreError::Duplicate {
                kind: "contract",
                key: deployment.contract.id.clone(),
            });
        }
        state
            .agents
            .entry(deployment.agent.hash.clone())
            .or_insert_with(|| deployment.agent.clone());
        state.artifacts.insert(
            deployment.artifact_hash.clone(),
            deployment.artifact.clone(),
        );
        state
            .contracts
            .insert(deployment.contract.id.clone(), deployment.contract.clone());
        Ok(())
    }

    fn contract(&self, id: &str) -> StoreResult<Option<Contract>> {
        Ok(self.read()?.contracts.get(id).cloned())
    }

    fn contract_by_artifact(&self, artifact_hash: &str) -> StoreResult<Option<Contract>> {
        Ok(self
            .read()?
            .contracts
            .values()
            .find(|c| c.artifact_hash == artifact_hash)
            .cloned())
    }

    fn artifact(&self, hash: &str) -> StoreResult<Option<ArtifactMetadata>> {
        Ok(self.read()?.artifacts.get(hash).cloned())
    }

    fn agent(&self, hash: &str) -> StoreResult<Option<AgentMeta>> {
        Ok(self.read()?.agents.get(hash).cloned())
    }

    fn append_block(&self, block: &Block) -> StoreResult<()> {
        let mut state = self.write()?;
        let chain = state.chains.entry(block.contract_id.clone()).or_default();
        let tip = chain.last().map(|b| b.block_index);
        if block.block_index != expected_next_index(tip) {
            return Err(StoreError::OutOfOrder {
                contract_id: block.contract_id.clone(),
                tip: tip.unwrap_or(0),
                actual: block.block_index,
            });
        }
        chain.push(block.clone());
        Ok(())
    }

    fn latest_block(&self, contract_id: &str) -> StoreResult<Option<Block>> {
        Ok(self
            .read()?
            .chains
            .get(contract_id)
            .and_then(|chain| chain.last().cloned()))
    }

    fn blocks(&self, contract_id: &str) -> StoreResult<Vec<Block>> {
        Ok(self
            .read()?
            .chains
            .get(contract_id)
            .cloned()
            .unwrap_or_default())
    }
}
