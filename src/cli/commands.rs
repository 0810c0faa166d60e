//! CLI commands for the state client
//!
//! Every command runs against the development ledger persisted in the data
//! directory, with the local wallet as the authorization provider.

use crate::api::{create_router, ApiState};
use crate::client::{ContractStateClient, FieldState, FieldStatus};
use crate::config::ClientConfig;
use crate::contract::{Field, InMemoryLedger, LedgerState, Value};
use crate::wallet::{ApprovalPolicy, ApprovalRequest, LocalWallet};
use std::fs;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Application state
pub struct AppState {
    pub config: ClientConfig,
    pub ledger: Arc<InMemoryLedger>,
    pub client: Arc<ContractStateClient>,
    pub account: String,
}

impl AppState {
    /// Open the ledger and wallet in the data directory and build a client
    pub fn new(config: ClientConfig, policy: ApprovalPolicy) -> CliResult<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let descriptor = config.descriptor()?;
        let ledger = Arc::new(InMemoryLedger::open(
            &config.contract_address,
            &config.ledger_path(),
        )?);
        let wallet = LocalWallet::load_or_create(&config.wallet_path())?.with_policy(policy);
        let account = wallet.address();

        let client = Arc::new(ContractStateClient::new(
            descriptor,
            ledger.clone(),
            Arc::new(wallet),
            &config,
        ));

        Ok(Self {
            config,
            ledger,
            client,
            account,
        })
    }
}

fn status_icon(status: FieldStatus) -> &'static str {
    match status {
        FieldStatus::Stale => "💤",
        FieldStatus::Pending => "⏳",
        FieldStatus::Fresh => "✅",
        FieldStatus::Errored => "❌",
    }
}

fn print_field(field: Field, state: &FieldState<Value>) {
    println!(
        "   {} {}: {} ({:?})",
        status_icon(state.status),
        field,
        state.value,
        state.status
    );
    if let Some(error) = &state.last_error {
        println!("      └─ {:?} during {:?}: {}", error.kind, error.phase, error.message);
    }
}

/// Answer wallet approval requests from stdin
pub fn spawn_stdin_approver() -> mpsc::Sender<ApprovalRequest> {
    let (tx, mut rx) = mpsc::channel::<ApprovalRequest>(1);

    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            println!("🔐 Authorize account {}? [y/N]", request.account);
            let answer = tokio::task::spawn_blocking(|| {
                let mut line = String::new();
                std::io::stdin().read_line(&mut line).map(|_| line)
            })
            .await;

            let approved = matches!(answer, Ok(Ok(line)) if line.trim().eq_ignore_ascii_case("y"));
            let _ = request.reply.send(approved);
        }
    });

    tx
}

/// Read one field from the contract
pub async fn cmd_read(state: &AppState, field: &str) -> CliResult<()> {
    let field: Field = field
        .parse()
        .map_err(|name| format!("Unknown field: {} (expected number or message)", name))?;

    println!("📖 Reading {} from {}", field, state.config.contract_address);
    let result = state.client.read_field(field).await;
    print_field(field, &result);
    Ok(())
}

/// Authorize and submit a state-changing operation
pub async fn cmd_mutate(state: &AppState, operation: &str, args: &[String]) -> CliResult<()> {
    let remote = state
        .client
        .descriptor()
        .operation(operation)
        .ok_or_else(|| format!("Unknown operation: {}", operation))?;
    let inputs = remote
        .parse_inputs(args)
        .map_err(|reason| format!("Invalid inputs for {}: {}", operation, reason))?;

    println!("✍️  Submitting {} as {}", operation, state.account);

    match state.client.mutate(operation, inputs).await {
        Ok(outcome) => {
            println!("✅ Included in block {}", outcome.receipt.block_number);
            println!("   ├─ Tx: {}", outcome.receipt.tx_hash);
            println!("   └─ Confirmed: {}", outcome.confirmed);
            for (field, field_state) in &outcome.fields {
                print_field(*field, field_state);
            }
        }
        Err(e) => {
            println!("❌ {} failed: {}", operation, e);
            for field in state.client.descriptor().affected_fields(operation) {
                print_field(field, &state.client.field_state(field));
            }
            return Err(e.into());
        }
    }

    Ok(())
}

/// Read every field and print the snapshot
pub async fn cmd_snapshot(state: &AppState) -> CliResult<()> {
    let snapshot = state.client.refresh().await;

    println!("📊 Contract {}", snapshot.contract_address);
    for (field, field_state) in &snapshot.fields {
        print_field(*field, field_state);
    }
    Ok(())
}

/// Serve the REST/WebSocket API
pub async fn cmd_serve(state: &AppState, port: u16) -> CliResult<()> {
    state.client.refresh().await;

    let router = create_router(ApiState {
        client: state.client.clone(),
    });

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("🚀 API server running on http://{}", addr);
    println!("   ├─ Contract: {}", state.config.contract_address);
    println!("   ├─ Account:  {}", state.account);
    println!("   └─ WebSocket: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            println!("\n📴 Shutting down API server...");
        })
        .await?;

    Ok(())
}

/// Create a new wallet in the data directory
pub fn cmd_wallet_new(config: &ClientConfig, label: Option<&str>, force: bool) -> CliResult<()> {
    let path = config.wallet_path();
    if path.exists() && !force {
        println!("⚠️  Wallet already exists at {:?}", path);
        println!("   Use --force to replace it");
        return Ok(());
    }

    let wallet = match label {
        Some(l) => LocalWallet::with_label(l),
        None => LocalWallet::new(),
    };
    wallet.save(&path)?;

    println!("✅ New wallet created!");
    println!("   📬 Address: {}", wallet.address());
    if let Some(l) = &wallet.label {
        println!("   🏷️  Label: {}", l);
    }
    Ok(())
}

/// Show the wallet in the data directory
pub fn cmd_wallet_show(config: &ClientConfig) -> CliResult<()> {
    let info = LocalWallet::load(&config.wallet_path())?.export_public_info();

    println!("👛 Wallet");
    println!("   ├─ Address: {}", info.address);
    println!("   ├─ Public key: {}", info.public_key);
    println!("   └─ Label: {}", info.label.as_deref().unwrap_or("-"));
    Ok(())
}

/// Walk through a read, a mutation and its read-after-write on a throwaway ledger
pub async fn cmd_demo(config: &ClientConfig) -> CliResult<()> {
    let ledger = Arc::new(InMemoryLedger::with_state(
        &config.contract_address,
        LedgerState {
            number: 3,
            ..Default::default()
        },
    ));
    let client = ContractStateClient::new(
        config.descriptor()?,
        ledger.clone(),
        Arc::new(LocalWallet::new()),
        config,
    );

    println!("🧪 Initial state");
    for field in Field::ALL {
        print_field(field, &client.field_state(field));
    }

    println!("\n📖 read number");
    print_field(Field::Number, &client.read_field(Field::Number).await);

    println!("\n✍️  setMessage(\"hi\")");
    let outcome = client
        .mutate("setMessage", vec![Value::Text("hi".to_string())])
        .await?;
    println!("   Included in block {}", outcome.receipt.block_number);
    print_field(Field::Message, &client.field_state(Field::Message));

    println!("\n✍️  decreaseNumber() x4 (the last one reverts)");
    for _ in 0..4 {
        if let Err(e) = client.mutate("decreaseNumber", vec![]).await {
            println!("   ❌ {}", e);
        }
    }
    print_field(Field::Number, &client.field_state(Field::Number));

    println!(
        "\n📊 Ledger served {} read(s) and {} write(s)",
        ledger.read_calls(),
        ledger.write_calls()
    );
    Ok(())
}
