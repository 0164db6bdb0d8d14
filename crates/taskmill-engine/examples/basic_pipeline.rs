//! Basic Pipeline Example
//!
//! Wires a bounded queue to a three-worker pool, submits one task of each
//! built-in type, and prints the results as they come back.
//!
//! Run with:
//!   cargo run --example basic_pipeline -p taskmill-engine
//!
//! Turn on engine logs:
//!   RUST_LOG=taskmill_engine=debug cargo run --example basic_pipeline -p taskmill-engine

use serde_json::json;
use taskmill_engine::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let queue = TaskQueue::new(16);
    let pool = WorkerPool::new(
        queue.task_source(),
        HandlerRegistry::with_builtin(),
        WorkerPoolConfig::new(3),
    );

    let mut results = pool.take_results().expect("result receiver already taken");
    pool.start()?;

    println!("=== Basic Pipeline: one task per built-in type ===\n");

    for task_type in TaskType::ALL {
        let task = Task::new(task_type, json!({"source": "basic_pipeline"}))?;
        println!("submitted {} as {}", task.id, task.task_type);
        queue.submit(task)?;
    }

    for _ in 0..TaskType::ALL.len() {
        if let Some(result) = results.recv().await {
            println!("{result}");
        }
    }

    pool.shutdown().await?;
    queue.close();

    Ok(())
}
