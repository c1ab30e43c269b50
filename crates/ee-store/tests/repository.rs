use std::collections::BTreeMap;

use ee_ledger::{Block, genesis};
use ee_store::{Contract, Deployment, MemRepository, Repository, SqliteRepository, StoreError};
use ee_wire::{AgentMeta, ArtifactMetadata, SchemaValue};

fn deployment(id: &str) -> Deployment {
    Deployment {
        agent: AgentMeta {
            hash: "0xagent".into(),
            name: "compiler".into(),
            version: "1.2.0".into(),
        },
        artifact_hash: id.into(),
        artifact: ArtifactMetadata {
            bytecode: vec![0xde, 0xad, 0xbe, 0xef],
            const_pool: vec![
                SchemaValue::Int(1),
                SchemaValue::UInt(u64::MAX),
                SchemaValue::Float(2.5),
                SchemaValue::Null,
            ],
            functions: BTreeMap::from([(
                "mint".to_string(),
                SchemaValue::Map(BTreeMap::from([("arity".to_string(), SchemaValue::Int(1))])),
            )]),
            function_name: BTreeMap::from([(0, "mint".to_string()), (7, "burn".to_string())]),
            types: BTreeMap::new(),
            init_storage: BTreeMap::from([("0".to_string(), SchemaValue::Text("supply".into()))]),
        },
        contract: Contract {
            id: id.into(),
            name: "token".into(),
            version: "1".into(),
            owner: "alice".into(),
            artifact_hash: id.into(),
            created_at: 1_700_000_000_123,
        },
    }
}

fn block(contract_id: &str, index: u64) -> Block {
    Block {
        block_index: index,
        hash: format!("0xh{index}"),
        timestamp: 1_000 + index as i64,
        previous_hash: format!("0xh{}", index - 1),
        journal_hash: "0xj".into(),
        signature: vec![index as u8; 64],
        contract_id: contract_id.into(),
        function_name: "mint".into(),
        artifact_hash: "0xa".into(),
        journal: vec![1, 2, 3],
    }
}

fn deployments_round_trip(repo: &dyn Repository) {
    let d = deployment("0xc1");
    repo.save_deployment(&d).unwrap();

    assert_eq!(repo.contract("0xc1").unwrap(), Some(d.contract.clone()));
    assert_eq!(repo.contract_by_artifact("0xc1").unwrap(), Some(d.contract.clone()));
    assert_eq!(repo.artifact("0xc1").unwrap(), Some(d.artifact.clone()));
    assert_eq!(repo.agent("0xagent").unwrap(), Some(d.agent.clone()));

    assert_eq!(repo.contract("0xmissing").unwrap(), None);
    assert_eq!(repo.artifact("0xmissing").unwrap(), None);
}

fn shared_agent_and_duplicates(repo: &dyn Repository) {
    repo.save_deployment(&deployment("0xc1")).unwrap();
    // Second contract compiled by the same agent.
    repo.save_deployment(&deployment("0xc2")).unwrap();

    let err = repo.save_deployment(&deployment("0xc1")).unwrap_err();
    assert!(matches!(err, StoreError::Duplicate { .. }), "{err}");
}

fn duplicate_contract_leaves_nothing_behind(repo: &dyn Repository) {
    let first = deployment("0xc1");
    repo.save_deployment(&first).unwrap();

    let mut clash = deployment("0xother");
    clash.contract.id = "0xc1".into();
    assert!(repo.save_deployment(&clash).is_err());
    assert_eq!(repo.artifact("0xother").unwrap(), None, "artifact write rolled back");
}

fn chains_are_per_contract(repo: &dyn Repository) {
    assert_eq!(repo.latest_block("0xc1").unwrap(), None);
    assert!(repo.blocks("0xc1").unwrap().is_empty());

    repo.append_block(&genesis("0xc1", 1_000)).unwrap();
    repo.append_block(&block("0xc1", 2)).unwrap();
    repo.append_block(&block("0xc1", 3)).unwrap();
    repo.append_block(&genesis("0xc2", 1_000)).unwrap();

    assert_eq!(repo.latest_block("0xc1").unwrap(), Some(block("0xc1", 3)));
    assert_eq!(repo.latest_block("0xc2").unwrap().unwrap().block_index, 1);
    let chain = repo.blocks("0xc1").unwrap();
    assert_eq!(
        chain.iter().map(|b| b.block_index).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

fn append_rejects_gaps_and_rewrites(repo: &dyn Repository) {
    assert!(matches!(
        repo.append_block(&block("0xc1", 2)),
        Err(StoreError::OutOfOrder { tip: 0, actual: 2, .. })
    ));
    repo.append_block(&genesis("0xc1", 1_000)).unwrap();
    repo.append_block(&block("0xc1", 2)).unwrap();
    assert!(matches!(
        repo.append_block(&block("0xc1", 2)),
        Err(StoreError::OutOfOrder { tip: 2, .. })
    ));
    assert!(repo.append_block(&block("0xc1", 4)).is_err());
    assert_eq!(repo.blocks("0xc1").unwrap().len(), 2);
}

fn run_all(make: impl Fn() -> Box<dyn Repository>) {
    deployments_round_trip(make().as_ref());
    shared_agent_and_duplicates(make().as_ref());
    duplicate_contract_leaves_nothing_behind(make().as_ref());
    chains_are_per_contract(make().as_ref());
    append_rejects_gaps_and_rewrites(make().as_ref());
}

#[test]
fn mem_repository_conformance() {
    run_all(|| Box::new(MemRepository::new()));
}

#[test]
fn sqlite_repository_conformance() {
    run_all(|| Box::new(SqliteRepository::open_in_memory().unwrap()));
}

#[test]
fn sqlite_repository_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    {
        let repo = SqliteRepository::open(&path).unwrap();
        repo.save_deployment(&deployment("0xc1")).unwrap();
        repo.append_block(&genesis("0xc1", 1_000)).unwrap();
        repo.append_block(&block("0xc1", 2)).unwrap();
    }
    let repo = SqliteRepository::open(&path).unwrap();
    assert_eq!(repo.artifact("0xc1").unwrap(), Some(deployment("0xc1").artifact));
    assert_eq!(repo.latest_block("0xc1").unwrap(), Some(block("0xc1", 2)));
}
