use personal_agent_orchestrator::{
    agent::Orchestrator,
    context::AssistantContext,
    gemini::{FunctionCall, MockTransport, ModelTransport},
    governor::RateGovernor,
    models::Persona,
    store::RecordStore,
};
use std::sync::Arc;
use tracing::info;

/// Demo run against a scripted transport: one turn in which the model logs a
/// transaction and then confirms. Swap in `AssistantContext::from_env()` to
/// talk to the real API.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    dotenv::dotenv().ok();
    info!("Personal Assistant starting");

    let store = Arc::new(RecordStore::in_memory());
    store.initialize().await?;

    let transport: Arc<dyn ModelTransport> = Arc::new(MockTransport::new(vec![
        MockTransport::call_reply(
            "",
            vec![FunctionCall {
                name: "log_transaction".to_string(),
                args: serde_json::json!({
                    "type": "expense",
                    "amount": 250,
                    "category": "Food",
                    "description": "lunch"
                }),
            }],
        ),
        MockTransport::text_reply("Done! I logged a 250.00 Food expense for lunch."),
    ]));

    let ctx = AssistantContext::new(store, Arc::new(RateGovernor::new()), transport);
    let orchestrator = Orchestrator::new(Arc::clone(&ctx));

    let outcome = orchestrator
        .send_message(
            "I spent 250 on lunch today",
            Persona::FinancialAdvisor,
            &[],
        )
        .await?;

    println!("\n=== ASSISTANT REPLY ===");
    println!("{}", outcome.text);
    println!("\nActions:");
    for (i, action) in outcome.actions.iter().enumerate() {
        println!("  {}: {:?} {}", i + 1, action.kind, action.payload);
    }

    let transactions = ctx.store.list_transactions().await?;
    println!("\nStored transactions: {}", transactions.len());

    Ok(())
}
