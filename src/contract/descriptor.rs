//! Remote contract descriptor
//!
//! Static description of the counter/message contract: its address, the
//! callable operations with their typed inputs and outputs, and which cached
//! field each operation reads or affects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// The ABI the counter/message contract was deployed with
pub const COUNTER_MESSAGE_ABI: &str = include_str!("../../abi/counter_message.json");

/// Descriptor errors
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("Invalid ABI: {0}")]
    InvalidAbi(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Unsupported parameter type: {0}")]
    UnsupportedType(String),
    #[error("Missing operation: {0}")]
    MissingOperation(String),
    #[error("Operation {name} has the wrong shape: {reason}")]
    InvalidBinding { name: String, reason: String },
}

/// Whether an operation may change remote state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutability {
    ReadOnly,
    StateChanging,
}

/// Parameter types understood by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Uint,
    Text,
}

impl ParamType {
    /// Map an ABI type name (`uint256`, `string`, ...) onto a parameter type
    pub fn from_abi(ty: &str) -> Result<Self, DescriptorError> {
        match ty {
            "string" => Ok(ParamType::Text),
            t if t.starts_with("uint") => Ok(ParamType::Uint),
            other => Err(DescriptorError::UnsupportedType(other.to_string())),
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ParamType::Uint, Value::Uint(_)) | (ParamType::Text, Value::Text(_))
        )
    }

    /// Coerce a JSON input (as sent by a presentation layer) into a value
    pub fn coerce(&self, raw: &serde_json::Value) -> Option<Value> {
        match (self, raw) {
            (ParamType::Uint, serde_json::Value::Number(n)) => n.as_u64().map(Value::Uint),
            (ParamType::Uint, serde_json::Value::String(s)) => s.parse().ok().map(Value::Uint),
            (ParamType::Text, serde_json::Value::String(s)) => Some(Value::Text(s.clone())),
            _ => None,
        }
    }

    /// Parse a command-line argument into a value
    pub fn parse(&self, raw: &str) -> Option<Value> {
        match self {
            ParamType::Uint => raw.parse().ok().map(Value::Uint),
            ParamType::Text => Some(Value::Text(raw.to_string())),
        }
    }

    /// The placeholder a field holds before anything was observed
    pub fn zero(&self) -> Value {
        match self {
            ParamType::Uint => Value::Uint(0),
            ParamType::Text => Value::Text(String::new()),
        }
    }
}

/// A decoded contract value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Uint(u64),
    Text(String),
}

impl Value {
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::Uint(n) => Some(*n),
            Value::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Uint(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Uint(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// A named, typed operation input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: ParamType,
}

/// A callable operation on the remote contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOperation {
    pub name: String,
    pub inputs: Vec<Param>,
    pub outputs: Vec<ParamType>,
    pub mutability: Mutability,
}

impl RemoteOperation {
    /// A getter with no inputs
    pub fn read_only(name: &str, outputs: Vec<ParamType>) -> Self {
        Self {
            name: name.to_string(),
            inputs: Vec::new(),
            outputs,
            mutability: Mutability::ReadOnly,
        }
    }

    /// A state-changing call with no outputs
    pub fn state_changing(name: &str, inputs: Vec<Param>) -> Self {
        Self {
            name: name.to_string(),
            inputs,
            outputs: Vec::new(),
            mutability: Mutability::StateChanging,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.mutability == Mutability::ReadOnly
    }

    /// Check arity and types of the submitted inputs
    pub fn check_inputs(&self, inputs: &[Value]) -> Result<(), String> {
        if inputs.len() != self.inputs.len() {
            return Err(format!(
                "expected {} input(s), got {}",
                self.inputs.len(),
                inputs.len()
            ));
        }

        for (param, value) in self.inputs.iter().zip(inputs) {
            if !param.ty.accepts(value) {
                return Err(format!("input {} must be {:?}", param.name, param.ty));
            }
        }

        Ok(())
    }

    pub fn coerce_inputs(&self, raw: &[serde_json::Value]) -> Result<Vec<Value>, String> {
        if raw.len() != self.inputs.len() {
            return Err(format!(
                "expected {} input(s), got {}",
                self.inputs.len(),
                raw.len()
            ));
        }

        self.inputs
            .iter()
            .zip(raw)
            .map(|(param, value)| {
                param
                    .ty
                    .coerce(value)
                    .ok_or_else(|| format!("input {} must be {:?}", param.name, param.ty))
            })
            .collect()
    }

    pub fn parse_inputs(&self, raw: &[String]) -> Result<Vec<Value>, String> {
        if raw.len() != self.inputs.len() {
            return Err(format!(
                "expected {} input(s), got {}",
                self.inputs.len(),
                raw.len()
            ));
        }

        self.inputs
            .iter()
            .zip(raw)
            .map(|(param, value)| {
                param
                    .ty
                    .parse(value)
                    .ok_or_else(|| format!("input {} must be {:?}", param.name, param.ty))
            })
            .collect()
    }
}

/// A readable field cached by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Number,
    Message,
}

impl Field {
    pub const ALL: [Field; 2] = [Field::Number, Field::Message];

    pub fn name(&self) -> &'static str {
        match self {
            Field::Number => "number",
            Field::Message => "message",
        }
    }

    pub fn value_type(&self) -> ParamType {
        match self {
            Field::Number => ParamType::Uint,
            Field::Message => ParamType::Text,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "number" => Ok(Field::Number),
            "message" => Ok(Field::Message),
            other => Err(other.to_string()),
        }
    }
}

/// How a field is read and which operations change it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldBinding {
    pub field: Field,
    pub read_operation: String,
    pub mutated_by: Vec<String>,
}

impl FieldBinding {
    pub fn new(field: Field, read_operation: &str, mutated_by: &[&str]) -> Self {
        Self {
            field,
            read_operation: read_operation.to_string(),
            mutated_by: mutated_by.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Bindings of the counter/message contract
    pub fn counter_message() -> Vec<FieldBinding> {
        vec![
            FieldBinding::new(Field::Number, "getNumber", &["increaseNumber", "decreaseNumber"]),
            FieldBinding::new(Field::Message, "message", &["setMessage"]),
        ]
    }
}

/// Raw ABI entry, as emitted by Solidity compilers
#[derive(Debug, Deserialize)]
struct AbiEntry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    inputs: Vec<AbiParam>,
    #[serde(default)]
    outputs: Vec<AbiParam>,
    #[serde(rename = "stateMutability", default)]
    state_mutability: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AbiParam {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

/// Immutable description of the remote contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteContractDescriptor {
    address: String,
    operations: Vec<RemoteOperation>,
    bindings: Vec<FieldBinding>,
}

impl RemoteContractDescriptor {
    /// Build a descriptor, checking every binding against the operations
    pub fn new(
        address: &str,
        operations: Vec<RemoteOperation>,
        bindings: Vec<FieldBinding>,
    ) -> Result<Self, DescriptorError> {
        let descriptor = Self {
            address: address.to_string(),
            operations,
            bindings,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// The counter/message contract at `address`
    pub fn counter_message(address: &str) -> Self {
        Self {
            address: address.to_string(),
            operations: vec![
                RemoteOperation::read_only("getNumber", vec![ParamType::Uint]),
                RemoteOperation::read_only("message", vec![ParamType::Text]),
                RemoteOperation::read_only("number", vec![ParamType::Uint]),
                RemoteOperation::state_changing("increaseNumber", vec![]),
                RemoteOperation::state_changing("decreaseNumber", vec![]),
                RemoteOperation::state_changing(
                    "setMessage",
                    vec![Param {
                        name: "newMessage".to_string(),
                        ty: ParamType::Text,
                    }],
                ),
            ],
            bindings: FieldBinding::counter_message(),
        }
    }

    /// Parse a JSON ABI and attach the counter/message bindings
    pub fn from_abi_json(address: &str, abi: &str) -> Result<Self, DescriptorError> {
        let entries: Vec<AbiEntry> = serde_json::from_str(abi)?;
        let mut operations = Vec::new();

        for entry in entries.into_iter().filter(|e| e.kind == "function") {
            let name = entry
                .name
                .ok_or_else(|| DescriptorError::MissingOperation("<unnamed function>".into()))?;

            let inputs = entry
                .inputs
                .iter()
                .map(|p| -> Result<Param, DescriptorError> {
                    Ok(Param {
                        name: p.name.clone(),
                        ty: ParamType::from_abi(&p.ty)?,
                    })
                })
                .collect::<Result<Vec<_>, DescriptorError>>()?;

            let outputs = entry
                .outputs
                .iter()
                .map(|p| ParamType::from_abi(&p.ty))
                .collect::<Result<Vec<_>, _>>()?;

            let mutability = match entry.state_mutability.as_deref() {
                Some("view") | Some("pure") => Mutability::ReadOnly,
                _ => Mutability::StateChanging,
            };

            operations.push(RemoteOperation {
                name,
                inputs,
                outputs,
                mutability,
            });
        }

        Self::new(address, operations, FieldBinding::counter_message())
    }

    /// Load a JSON ABI from disk
    pub fn from_abi_file(address: &str, path: &Path) -> Result<Self, DescriptorError> {
        let abi = fs::read_to_string(path)?;
        Self::from_abi_json(address, &abi)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn operations(&self) -> &[RemoteOperation] {
        &self.operations
    }

    pub fn operation(&self, name: &str) -> Option<&RemoteOperation> {
        self.operations.iter().find(|op| op.name == name)
    }

    /// Fields cached by a client of this contract
    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.bindings.iter().map(|b| b.field)
    }

    /// The getter that fetches `field`
    pub fn read_operation(&self, field: Field) -> Option<&RemoteOperation> {
        self.bindings
            .iter()
            .find(|b| b.field == field)
            .and_then(|b| self.operation(&b.read_operation))
    }

    /// Fields whose remote value changes when `operation` succeeds
    pub fn affected_fields(&self, operation: &str) -> Vec<Field> {
        self.bindings
            .iter()
            .filter(|b| b.mutated_by.iter().any(|name| name == operation))
            .map(|b| b.field)
            .collect()
    }

    fn validate(&self) -> Result<(), DescriptorError> {
        for field in Field::ALL {
            if self.bindings.iter().filter(|b| b.field == field).count() != 1 {
                return Err(DescriptorError::InvalidBinding {
                    name: field.to_string(),
                    reason: "every field needs exactly one binding".to_string(),
                });
            }
        }

        for binding in &self.bindings {
            let read = self
                .operation(&binding.read_operation)
                .ok_or_else(|| DescriptorError::MissingOperation(binding.read_operation.clone()))?;

            if !read.is_read_only()
                || !read.inputs.is_empty()
                || read.outputs != vec![binding.field.value_type()]
            {
                return Err(DescriptorError::InvalidBinding {
                    name: read.name.clone(),
                    reason: format!(
                        "must be a read-only getter returning one {:?}",
                        binding.field.value_type()
                    ),
                });
            }

            for name in &binding.mutated_by {
                let op = self
                    .operation(name)
                    .ok_or_else(|| DescriptorError::MissingOperation(name.clone()))?;
                if op.is_read_only() {
                    return Err(DescriptorError::InvalidBinding {
                        name: name.clone(),
                        reason: "must be state-changing".to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "0x0f568c487a0fEB05202379F689f7D79CFfef5176";

    #[test]
    fn test_abi_matches_builtin_descriptor() {
        let parsed = RemoteContractDescriptor::from_abi_json(ADDRESS, COUNTER_MESSAGE_ABI).unwrap();
        let builtin = RemoteContractDescriptor::counter_message(ADDRESS);

        for op in builtin.operations() {
            assert_eq!(parsed.operation(&op.name).map(|p| p.mutability), Some(op.mutability));
            assert_eq!(parsed.operation(&op.name).map(|p| &p.outputs), Some(&op.outputs));
        }
        assert!(parsed.operation("getNumber").unwrap().is_read_only());
        assert!(!parsed.operation("setMessage").unwrap().is_read_only());
    }

    #[test]
    fn test_affected_fields() {
        let descriptor = RemoteContractDescriptor::counter_message(ADDRESS);

        assert_eq!(descriptor.affected_fields("increaseNumber"), vec![Field::Number]);
        assert_eq!(descriptor.affected_fields("decreaseNumber"), vec![Field::Number]);
        assert_eq!(descriptor.affected_fields("setMessage"), vec![Field::Message]);
        assert!(descriptor.affected_fields("getNumber").is_empty());
        assert_eq!(
            descriptor.read_operation(Field::Message).map(|op| op.name.as_str()),
            Some("message")
        );
    }

    #[test]
    fn test_check_inputs() {
        let descriptor = RemoteContractDescriptor::counter_message(ADDRESS);
        let set_message = descriptor.operation("setMessage").unwrap();

        assert!(set_message.check_inputs(&[Value::Text("hi".into())]).is_ok());
        assert!(set_message.check_inputs(&[Value::Uint(1)]).is_err());
        assert!(set_message.check_inputs(&[]).is_err());

        let coerced = set_message.coerce_inputs(&[serde_json::json!("hi")]).unwrap();
        assert_eq!(coerced, vec![Value::Text("hi".into())]);
    }

    #[test]
    fn test_rejects_binding_to_missing_getter() {
        let ops = vec![
            RemoteOperation::state_changing("increaseNumber", vec![]),
            RemoteOperation::read_only("message", vec![ParamType::Text]),
        ];

        let err = RemoteContractDescriptor::new(ADDRESS, ops, FieldBinding::counter_message())
            .unwrap_err();
        assert!(matches!(err, DescriptorError::MissingOperation(name) if name == "getNumber"));

        let partial = vec![FieldBinding::new(Field::Message, "message", &[])];
        let ops = vec![RemoteOperation::read_only("message", vec![ParamType::Text])];
        let err = RemoteContractDescriptor::new(ADDRESS, ops, partial).unwrap_err();
        assert!(matches!(err, DescriptorError::InvalidBinding { .. }));
    }

    #[test]
    fn test_unsupported_abi_type() {
        let abi = r#"[{"type":"function","name":"owner","inputs":[],
            "outputs":[{"name":"","type":"address"}],"stateMutability":"view"}]"#;

        let err = RemoteContractDescriptor::from_abi_json(ADDRESS, abi).unwrap_err();
        assert!(matches!(err, DescriptorError::UnsupportedType(t) if t == "address"));
    }
}
