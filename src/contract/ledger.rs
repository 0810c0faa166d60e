//! In-memory counter/message ledger
//!
//! Executes the counter/message contract locally and serves it through
//! [`RemoteCallGateway`]. It backs the CLI, the development server and the
//! tests: inclusion latency, paused inclusion and scripted faults let callers
//! reproduce every failure a real provider can produce.

use crate::contract::descriptor::{RemoteOperation, Value};
use crate::crypto::transaction_hash;
use crate::gateway::{GatewayError, Receipt, RemoteCallGateway};
use crate::wallet::Account;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Ledger persistence errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Contract storage plus chain bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub number: u64,
    pub message: String,
    pub block_number: u64,
    pub nonce: u64,
}

/// A single deployed counter/message contract
pub struct InMemoryLedger {
    address: String,
    state: Mutex<LedgerState>,
    read_faults: Mutex<VecDeque<GatewayError>>,
    write_faults: Mutex<VecDeque<GatewayError>>,
    inclusion_latency: Mutex<Option<Duration>>,
    paused: watch::Sender<bool>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    path: Option<PathBuf>,
    /// Serializes saves so a stale snapshot never lands over a newer one
    persist: Mutex<()>,
}

impl InMemoryLedger {
    /// A fresh contract deployed with `0` and an empty message
    pub fn new(address: &str) -> Self {
        Self::with_state(address, LedgerState::default())
    }

    /// A contract with existing storage
    pub fn with_state(address: &str, state: LedgerState) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            address: address.to_string(),
            state: Mutex::new(state),
            read_faults: Mutex::new(VecDeque::new()),
            write_faults: Mutex::new(VecDeque::new()),
            inclusion_latency: Mutex::new(None),
            paused,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            path: None,
            persist: Mutex::new(()),
        }
    }

    /// Open a ledger persisted at `path`, starting empty if the file is absent
    ///
    /// Every included write is saved back to the same file.
    pub fn open(address: &str, path: &Path) -> Result<Self, LedgerError> {
        let state = if path.exists() {
            let reader = BufReader::new(fs::File::open(path)?);
            serde_json::from_reader(reader)?
        } else {
            LedgerState::default()
        };

        let mut ledger = Self::with_state(address, state);
        ledger.path = Some(path.to_path_buf());
        Ok(ledger)
    }

    /// Write the current state to the backing file, if any
    pub fn save(&self) -> Result<(), LedgerError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let _persist = self.persist.lock();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to a temporary file first, then rename over the old state
        let temp_path = path.with_extension("tmp");
        let state = self.state();
        let mut writer = BufWriter::new(fs::File::create(&temp_path)?);
        serde_json::to_writer_pretty(&mut writer, &state)?;
        writer.flush()?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn state(&self) -> LedgerState {
        self.state.lock().clone()
    }

    /// Change the counter outside the client, as another account would
    pub fn set_number(&self, number: u64) {
        self.state.lock().number = number;
    }

    /// Change the message outside the client, as another account would
    pub fn set_message(&self, message: &str) {
        self.state.lock().message = message.to_string();
    }

    /// Fail the next read with `error`
    pub fn fail_next_read(&self, error: GatewayError) {
        self.read_faults.lock().push_back(error);
    }

    /// Fail the next write with `error`
    pub fn fail_next_write(&self, error: GatewayError) {
        self.write_faults.lock().push_back(error);
    }

    /// Delay every write by `latency` before it is included
    pub fn set_inclusion_latency(&self, latency: Option<Duration>) {
        *self.inclusion_latency.lock() = latency;
    }

    /// Hold submitted writes until [`resume_inclusion`](Self::resume_inclusion)
    pub fn pause_inclusion(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume_inclusion(&self) {
        self.paused.send_replace(false);
    }

    pub fn read_calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn execute(
        state: &mut LedgerState,
        operation: &RemoteOperation,
        inputs: &[Value],
    ) -> Result<(), GatewayError> {
        match (operation.name.as_str(), inputs) {
            ("increaseNumber", []) => {
                state.number = state.number.checked_add(1).ok_or_else(|| {
                    GatewayError::Rejected("execution reverted: arithmetic overflow".to_string())
                })?;
            }
            ("decreaseNumber", []) => {
                state.number = state.number.checked_sub(1).ok_or_else(|| {
                    GatewayError::Rejected("execution reverted: arithmetic underflow".to_string())
                })?;
            }
            ("setMessage", [Value::Text(message)]) => {
                state.message = message.clone();
            }
            (name, _) => {
                return Err(GatewayError::Rejected(format!(
                    "execution reverted: no function {} accepting {} input(s)",
                    name,
                    inputs.len()
                )));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl RemoteCallGateway for InMemoryLedger {
    async fn call_read(
        &self,
        operation: &RemoteOperation,
        inputs: &[Value],
    ) -> Result<Vec<Value>, GatewayError> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        let fault = self.read_faults.lock().pop_front();
        if let Some(fault) = fault {
            return Err(fault);
        }

        if !inputs.is_empty() {
            return Err(GatewayError::Rejected(format!(
                "{} takes no inputs",
                operation.name
            )));
        }

        let state = self.state.lock();
        match operation.name.as_str() {
            "getNumber" | "number" => Ok(vec![Value::Uint(state.number)]),
            "message" => Ok(vec![Value::Text(state.message.clone())]),
            other => Err(GatewayError::Rejected(format!(
                "execution reverted: no view function {}",
                other
            ))),
        }
    }

    async fn call_write(
        &self,
        operation: &RemoteOperation,
        inputs: &[Value],
        account: &Account,
    ) -> Result<Receipt, GatewayError> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        let mut paused = self.paused.subscribe();
        if paused.wait_for(|paused| !*paused).await.is_err() {
            return Err(GatewayError::Unavailable("ledger shut down".to_string()));
        }

        let latency = *self.inclusion_latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let fault = self.write_faults.lock().pop_front();
        if let Some(fault) = fault {
            return Err(fault);
        }

        if account.address.is_empty() {
            return Err(GatewayError::AccountRejected(
                "no sender account".to_string(),
            ));
        }

        let receipt = {
            let mut state = self.state.lock();
            Self::execute(&mut state, operation, inputs)?;

            state.nonce += 1;
            state.block_number += 1;
            Receipt {
                tx_hash: transaction_hash(
                    &self.address,
                    &account.address,
                    &operation.name,
                    state.nonce,
                ),
                block_number: state.block_number,
                from: account.address.clone(),
                operation: operation.name.clone(),
                return_data: Vec::new(),
            }
        };

        if let Err(e) = self.save() {
            log::warn!("Failed to persist ledger state: {}", e);
        }

        log::debug!(
            "Included {} from {} in block {}",
            receipt.operation,
            receipt.from,
            receipt.block_number
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::descriptor::RemoteContractDescriptor;

    const ADDRESS: &str = "0x0f568c487a0fEB05202379F689f7D79CFfef5176";

    fn op(name: &str) -> RemoteOperation {
        RemoteContractDescriptor::counter_message(ADDRESS)
            .operation(name)
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn test_increase_and_read() {
        let ledger = InMemoryLedger::new(ADDRESS);
        let account = Account::new("0xabc");

        let receipt = ledger
            .call_write(&op("increaseNumber"), &[], &account)
            .await
            .unwrap();
        assert_eq!(receipt.block_number, 1);
        assert!(receipt.tx_hash.starts_with("0x"));

        let value = ledger.call_read(&op("getNumber"), &[]).await.unwrap();
        assert_eq!(value, vec![Value::Uint(1)]);
        assert_eq!(ledger.write_calls(), 1);
        assert_eq!(ledger.read_calls(), 1);
    }

    #[tokio::test]
    async fn test_decrease_below_zero_reverts() {
        let ledger = InMemoryLedger::new(ADDRESS);
        let err = ledger
            .call_write(&op("decreaseNumber"), &[], &Account::new("0xabc"))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Rejected(_)));
        assert_eq!(ledger.state().block_number, 0);
    }

    #[tokio::test]
    async fn test_set_message() {
        let ledger = InMemoryLedger::new(ADDRESS);
        ledger
            .call_write(
                &op("setMessage"),
                &[Value::Text("hello".into())],
                &Account::new("0xabc"),
            )
            .await
            .unwrap();

        let value = ledger.call_read(&op("message"), &[]).await.unwrap();
        assert_eq!(value, vec![Value::Text("hello".into())]);
    }

    #[tokio::test]
    async fn test_scripted_faults_apply_once() {
        let ledger = InMemoryLedger::new(ADDRESS);
        ledger.fail_next_read(GatewayError::Unavailable("offline".into()));

        assert!(ledger.call_read(&op("getNumber"), &[]).await.is_err());
        assert!(ledger.call_read(&op("getNumber"), &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_account_rejected() {
        let ledger = InMemoryLedger::new(ADDRESS);
        let err = ledger
            .call_write(&op("increaseNumber"), &[], &Account::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::AccountRejected(_)));
    }

    #[test]
    fn test_persistence() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("ledger.json");

        let ledger = InMemoryLedger::open(ADDRESS, &path).unwrap();
        ledger.set_number(7);
        ledger.set_message("saved");
        ledger.save().unwrap();

        let reopened = InMemoryLedger::open(ADDRESS, &path).unwrap();
        assert_eq!(reopened.state().number, 7);
        assert_eq!(reopened.state().message, "saved");
    }

    #[test]
    fn test_concurrent_saves_keep_latest_state() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("ledger.json");
        let ledger = std::sync::Arc::new(InMemoryLedger::open(ADDRESS, &path).unwrap());

        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        ledger.set_message(&format!("{}-{}", worker, i));
                        ledger.save().unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        ledger.set_number(42);
        ledger.save().unwrap();

        let reopened = InMemoryLedger::open(ADDRESS, &path).unwrap();
        assert_eq!(reopened.state(), ledger.state());
        assert!(!path.with_extension("tmp").exists());
    }
}
