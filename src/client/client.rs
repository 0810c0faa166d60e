//! Contract state client
//!
//! Reconciles the authoritative contract state, the locally cached copy and
//! the mutation a user just submitted. All field transitions go through a
//! short critical section on the field table; the only suspension points are
//! the authorization request and the gateway calls, and none of them runs
//! with the table locked.
//!
//! A field is *claimed* by exactly one read or mutation at a time. The claim
//! marks the field `Pending`, and whoever holds it must settle it. A claim
//! dropped without settling (the owning future was cancelled) settles its
//! fields as `Errored` with a `Cancelled` reason.

use crate::client::error::ClientError;
use crate::client::events::{ClientEvent, EventBroadcaster};
use crate::client::state::{ClientSnapshot, ErrorInfo, ErrorKind, ErrorPhase, FieldState, FieldStatus};
use crate::config::ClientConfig;
use crate::contract::{Field, RemoteContractDescriptor, Value};
use crate::gateway::{Receipt, RemoteCallGateway};
use crate::wallet::{Account, AuthorizationProvider};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Upper bounds on each suspension point; `None` waits forever
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeouts {
    pub authorization: Option<Duration>,
    pub write: Option<Duration>,
    pub read: Option<Duration>,
}

impl From<&ClientConfig> for Timeouts {
    fn from(config: &ClientConfig) -> Self {
        Self {
            authorization: config.authorization_timeout(),
            write: config.write_timeout(),
            read: config.read_timeout(),
        }
    }
}

/// A mutation between authorization and resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingMutation {
    pub target_fields: Vec<Field>,
    pub operation: String,
    pub inputs: Vec<Value>,
    pub account: Account,
}

/// An included mutation and what reading its effect back produced
#[derive(Debug, Clone, Serialize)]
pub struct MutationOutcome {
    pub operation: String,
    pub account: Account,
    pub receipt: Receipt,
    /// `false` when the call was included but a read-after-write failed
    pub confirmed: bool,
    pub fields: BTreeMap<Field, FieldState<Value>>,
}

#[derive(Debug, Clone)]
enum Owner {
    Read {
        operation: String,
    },
    Mutation {
        operation: String,
        pending: Option<PendingMutation>,
    },
}

impl Owner {
    fn operation(&self) -> &str {
        match self {
            Owner::Read { operation } | Owner::Mutation { operation, .. } => operation,
        }
    }
}

#[derive(Debug)]
struct Slot {
    state: FieldState<Value>,
    owner: Option<Owner>,
}

#[derive(Debug, Clone)]
enum Transition {
    Fresh(Value),
    Errored(ErrorInfo),
    /// Back to whatever the field showed before it was claimed
    Restore,
}

#[derive(Debug)]
struct HeldField {
    field: Field,
    status: FieldStatus,
    last_error: Option<ErrorInfo>,
}

/// Exclusive ownership of a set of fields for one operation
struct FieldClaim<'a> {
    client: &'a ContractStateClient,
    operation: String,
    phase: ErrorPhase,
    held: Vec<HeldField>,
}

impl FieldClaim<'_> {
    fn set_phase(&mut self, phase: ErrorPhase) {
        self.phase = phase;
    }

    fn attach(&self, pending: &PendingMutation) {
        let mut table = self.client.fields.lock();
        for held in &self.held {
            if let Some(Owner::Mutation { pending: slot, .. }) = table
                .get_mut(&held.field)
                .and_then(|slot| slot.owner.as_mut())
            {
                *slot = Some(pending.clone());
            }
        }
    }

    /// Release `field` with the given transition and publish the result
    fn settle(&mut self, field: Field, transition: Transition) -> Option<FieldState<Value>> {
        let index = self.held.iter().position(|h| h.field == field)?;
        let held = self.held.swap_remove(index);

        // Published under the lock so subscribers see transitions in table order
        let mut table = self.client.fields.lock();
        let slot = table.get_mut(&field)?;
        slot.owner = None;
        match transition {
            Transition::Fresh(value) => slot.state.mark_fresh(value),
            Transition::Errored(info) => slot.state.mark_errored(info),
            Transition::Restore => slot.state.restore(held.status, held.last_error),
        }
        let state = slot.state.clone();
        self.client.events.broadcast(ClientEvent::FieldChanged {
            field,
            state: state.clone(),
        });
        Some(state)
    }

    fn settle_all(&mut self, transition: Transition) {
        let fields: Vec<Field> = self.held.iter().map(|h| h.field).collect();
        for field in fields {
            self.settle(field, transition.clone());
        }
    }
}

impl Drop for FieldClaim<'_> {
    fn drop(&mut self) {
        if self.held.is_empty() {
            return;
        }

        log::warn!(
            "{} abandoned during {:?}; marking its fields cancelled",
            self.operation,
            self.phase
        );
        let info = ErrorInfo::new(
            ErrorKind::Cancelled,
            self.phase,
            &self.operation,
            "operation abandoned before completion".to_string(),
        );
        self.settle_all(Transition::Errored(info));
    }
}

/// The stateful orchestrator between a presentation layer and the ledger
pub struct ContractStateClient {
    descriptor: Arc<RemoteContractDescriptor>,
    gateway: Arc<dyn RemoteCallGateway>,
    authorizer: Arc<dyn AuthorizationProvider>,
    fields: Mutex<BTreeMap<Field, Slot>>,
    events: EventBroadcaster,
    timeouts: Timeouts,
}

impl ContractStateClient {
    /// Create a client; every bound field starts `Stale` with a zero value
    pub fn new(
        descriptor: RemoteContractDescriptor,
        gateway: Arc<dyn RemoteCallGateway>,
        authorizer: Arc<dyn AuthorizationProvider>,
        config: &ClientConfig,
    ) -> Self {
        let fields = descriptor
            .fields()
            .map(|field| {
                let slot = Slot {
                    state: FieldState::stale(field.value_type().zero()),
                    owner: None,
                };
                (field, slot)
            })
            .collect();

        Self {
            descriptor: Arc::new(descriptor),
            gateway,
            authorizer,
            fields: Mutex::new(fields),
            events: EventBroadcaster::new(config.event_capacity),
            timeouts: Timeouts::from(config),
        }
    }

    pub fn descriptor(&self) -> &RemoteContractDescriptor {
        &self.descriptor
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Receive every field transition and mutation milestone from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Current cached state of `field`
    pub fn field_state(&self, field: Field) -> FieldState<Value> {
        self.fields
            .lock()
            .get(&field)
            .map(|slot| slot.state.clone())
            .unwrap_or_else(|| FieldState::stale(field.value_type().zero()))
    }

    pub fn number(&self) -> FieldState<u64> {
        self.field_state(Field::Number)
            .map(|value| value.as_uint().unwrap_or_default())
    }

    pub fn message(&self) -> FieldState<String> {
        self.field_state(Field::Message)
            .map(|value| value.as_text().unwrap_or_default().to_string())
    }

    /// Externally observable projection of all fields
    pub fn snapshot(&self) -> ClientSnapshot {
        let (fields, pending_operations) = {
            let table = self.fields.lock();
            let fields: BTreeMap<Field, FieldState<Value>> = table
                .iter()
                .map(|(field, slot)| (*field, slot.state.clone()))
                .collect();
            let pending: BTreeSet<String> = table
                .values()
                .filter_map(|slot| slot.owner.as_ref())
                .map(|owner| owner.operation().to_string())
                .collect();
            (fields, pending)
        };

        ClientSnapshot {
            contract_address: self.descriptor.address().to_string(),
            number: fields
                .get(&Field::Number)
                .and_then(|s| s.value.as_uint())
                .unwrap_or_default(),
            message: fields
                .get(&Field::Message)
                .and_then(|s| s.value.as_text())
                .unwrap_or_default()
                .to_string(),
            pending_operations,
            fields,
        }
    }

    /// Mutations that hold an authorized account and await the gateway
    pub fn pending_mutations(&self) -> Vec<PendingMutation> {
        let table = self.fields.lock();
        let mut seen = BTreeSet::new();
        table
            .values()
            .filter_map(|slot| match &slot.owner {
                Some(Owner::Mutation {
                    pending: Some(pending),
                    ..
                }) => Some(pending.clone()),
                _ => None,
            })
            .filter(|pending| seen.insert(pending.operation.clone()))
            .collect()
    }

    /// Fetch `field` from the contract
    ///
    /// While another read or a mutation owns the field, returns the cached
    /// state untouched instead of issuing a second call.
    pub async fn read_field(&self, field: Field) -> FieldState<Value> {
        let operation = self.read_operation_name(field);
        let owner = Owner::Read {
            operation: operation.clone(),
        };

        let mut claim = match self.claim(&[field], owner, &operation, ErrorPhase::Read) {
            Ok(claim) => claim,
            Err(_) => {
                log::debug!("Read of {} coalesced with an operation in flight", field);
                return self.field_state(field);
            }
        };

        let transition = match self.fetch(field).await {
            Ok(value) => Transition::Fresh(value),
            Err(err) => {
                log::warn!("Read of {} failed: {}", field, err);
                Transition::Errored(err.info(ErrorPhase::Read, &operation))
            }
        };

        claim
            .settle(field, transition)
            .unwrap_or_else(|| self.field_state(field))
    }

    /// Read every field concurrently
    pub async fn refresh(&self) -> ClientSnapshot {
        let fields: Vec<Field> = self.descriptor.fields().collect();
        futures::future::join_all(fields.into_iter().map(|field| self.read_field(field))).await;
        self.snapshot()
    }

    /// Authorize and submit a state-changing operation, then read back its effect
    pub async fn mutate(
        &self,
        operation: &str,
        inputs: Vec<Value>,
    ) -> Result<MutationOutcome, ClientError> {
        let remote = self
            .descriptor
            .operation(operation)
            .ok_or_else(|| ClientError::UnknownOperation(operation.to_string()))?;

        if remote.is_read_only() {
            return Err(ClientError::InvalidInputs {
                operation: operation.to_string(),
                reason: "operation is read-only".to_string(),
            });
        }
        remote
            .check_inputs(&inputs)
            .map_err(|reason| ClientError::InvalidInputs {
                operation: operation.to_string(),
                reason,
            })?;

        let targets = self.descriptor.affected_fields(operation);
        let owner = Owner::Mutation {
            operation: operation.to_string(),
            pending: None,
        };
        let mut claim = match self.claim(&targets, owner, operation, ErrorPhase::Authorization) {
            Ok(claim) => claim,
            Err(err) => {
                log::info!("Refused {}: {}", operation, err);
                self.report_failure(operation, &err, ErrorPhase::Authorization);
                return Err(err);
            }
        };

        let account = match bounded(self.timeouts.authorization, self.authorizer.request_account()).await {
            Some(Ok(account)) => account,
            Some(Err(denied)) => {
                // Nothing reached the ledger, so the fields keep their status
                let err = ClientError::from(denied);
                log::info!("{} not authorized: {}", operation, err);
                claim.settle_all(Transition::Restore);
                self.report_failure(operation, &err, ErrorPhase::Authorization);
                return Err(err);
            }
            None => {
                let err = ClientError::Cancelled("authorization request timed out".to_string());
                claim.settle_all(Transition::Errored(err.info(ErrorPhase::Authorization, operation)));
                self.report_failure(operation, &err, ErrorPhase::Authorization);
                return Err(err);
            }
        };

        let pending = PendingMutation {
            target_fields: targets.clone(),
            operation: operation.to_string(),
            inputs,
            account,
        };
        claim.attach(&pending);
        claim.set_phase(ErrorPhase::Submission);

        log::info!("Submitting {} from {}", operation, pending.account);
        self.events.broadcast(ClientEvent::MutationSubmitted {
            operation: operation.to_string(),
            account: pending.account.address.clone(),
        });

        let submission = self
            .gateway
            .call_write(remote, &pending.inputs, &pending.account);
        let receipt = match bounded(self.timeouts.write, submission).await {
            Some(Ok(receipt)) => receipt,
            Some(Err(err)) => {
                let err = ClientError::from(err);
                log::warn!("{} failed: {}", operation, err);
                claim.settle_all(Transition::Errored(err.info(ErrorPhase::Submission, operation)));
                self.report_failure(operation, &err, ErrorPhase::Submission);
                return Err(err);
            }
            None => {
                let err = ClientError::Cancelled(
                    "call was not included before the write timeout".to_string(),
                );
                log::warn!("{} abandoned: {}", operation, err);
                claim.settle_all(Transition::Errored(err.info(ErrorPhase::Submission, operation)));
                self.report_failure(operation, &err, ErrorPhase::Submission);
                return Err(err);
            }
        };

        log::info!(
            "{} included in block {} ({})",
            operation,
            receipt.block_number,
            receipt.tx_hash
        );
        claim.set_phase(ErrorPhase::Confirmation);

        // The receipt says nothing reliable about the new value; read it back
        let mut confirmed = true;
        let mut fields = BTreeMap::new();
        for field in &pending.target_fields {
            let transition = match self.fetch(*field).await {
                Ok(value) => Transition::Fresh(value),
                Err(err) => {
                    confirmed = false;
                    log::warn!("{} included but reading {} back failed: {}", operation, field, err);
                    Transition::Errored(ErrorInfo::new(
                        ErrorKind::RemoteUnavailable,
                        ErrorPhase::Confirmation,
                        operation,
                        format!(
                            "included in block {} but read-after-write failed: {}",
                            receipt.block_number, err
                        ),
                    ))
                }
            };
            if let Some(state) = claim.settle(*field, transition) {
                fields.insert(*field, state);
            }
        }

        self.events.broadcast(ClientEvent::MutationIncluded {
            operation: operation.to_string(),
            tx_hash: receipt.tx_hash.clone(),
            block_number: receipt.block_number,
            confirmed,
        });

        Ok(MutationOutcome {
            operation: operation.to_string(),
            account: pending.account,
            receipt,
            confirmed,
            fields,
        })
    }

    /// Run [`read_field`](Self::read_field) in the background
    pub fn request_read(self: &Arc<Self>, field: Field) -> JoinHandle<FieldState<Value>> {
        let client = Arc::clone(self);
        tokio::spawn(async move { client.read_field(field).await })
    }

    /// Run [`mutate`](Self::mutate) in the background
    ///
    /// The mutation keeps running if the handle is dropped; failures still
    /// reach subscribers as events.
    pub fn request_mutation(
        self: &Arc<Self>,
        operation: &str,
        inputs: Vec<Value>,
    ) -> JoinHandle<Result<MutationOutcome, ClientError>> {
        let client = Arc::clone(self);
        let operation = operation.to_string();
        tokio::spawn(async move { client.mutate(&operation, inputs).await })
    }

    fn claim(
        &self,
        fields: &[Field],
        owner: Owner,
        operation: &str,
        phase: ErrorPhase,
    ) -> Result<FieldClaim<'_>, ClientError> {
        let held = {
            let mut table = self.fields.lock();
            let busy = fields
                .iter()
                .find(|field| table.get(*field).is_some_and(|slot| slot.owner.is_some()));
            if let Some(field) = busy {
                return Err(ClientError::OperationInProgress(*field));
            }

            let mut held = Vec::with_capacity(fields.len());
            for field in fields {
                if let Some(slot) = table.get_mut(field) {
                    held.push(HeldField {
                        field: *field,
                        status: slot.state.status,
                        last_error: slot.state.last_error.clone(),
                    });
                    slot.state.mark_pending();
                    slot.owner = Some(owner.clone());
                    self.events.broadcast(ClientEvent::FieldChanged {
                        field: *field,
                        state: slot.state.clone(),
                    });
                }
            }
            held
        };

        Ok(FieldClaim {
            client: self,
            operation: operation.to_string(),
            phase,
            held,
        })
    }

    async fn fetch(&self, field: Field) -> Result<Value, ClientError> {
        let operation = self
            .descriptor
            .read_operation(field)
            .ok_or_else(|| ClientError::UnknownField(field.to_string()))?;

        let outputs = bounded(self.timeouts.read, self.gateway.call_read(operation, &[]))
            .await
            .ok_or_else(|| ClientError::Cancelled(format!("{} timed out", operation.name)))??;

        match outputs.into_iter().next() {
            Some(value) if field.value_type().accepts(&value) => Ok(value),
            Some(value) => Err(ClientError::RemoteRejected(format!(
                "{} returned {} where {:?} was expected",
                operation.name,
                value,
                field.value_type()
            ))),
            None => Err(ClientError::RemoteRejected(format!(
                "{} returned no value",
                operation.name
            ))),
        }
    }

    fn read_operation_name(&self, field: Field) -> String {
        self.descriptor
            .read_operation(field)
            .map(|op| op.name.clone())
            .unwrap_or_else(|| field.to_string())
    }

    fn report_failure(&self, operation: &str, err: &ClientError, phase: ErrorPhase) {
        self.events.broadcast(ClientEvent::MutationFailed {
            operation: operation.to_string(),
            error: err.info(phase, operation),
        });
    }
}

/// Await `future`, giving up after `limit`
async fn bounded<F: Future>(limit: Option<Duration>, future: F) -> Option<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, future).await.ok(),
        None => Some(future.await),
    }
}
