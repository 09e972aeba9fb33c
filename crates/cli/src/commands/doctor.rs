//! `agentrl doctor`: Diagnose config and server health.

use agentrl_agent::Registry;
use agentrl_config::AppConfig;

use std::sync::Arc;

use agentrl_core::ChatCompleter;

use super::{build_engine, build_judge};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 agentrl Doctor — System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_path();
    if !config_path.exists() {
        println!("  ⚠️  No config file — using defaults (run `agentrl onboard`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  {} issue(s) found. See above for details.", issues + 1);
            return Ok(());
        }
    };

    let judge = match build_judge(&config) {
        Ok(judge) => Some(Arc::new(judge) as Arc<dyn ChatCompleter>),
        Err(e) => {
            println!("  ⚠️  Judge endpoint misconfigured: {e}");
            None
        }
    };

    let registry = Registry::builtin();
    match registry.build_session(&config, judge) {
        Ok(session) => println!(
            "  ✅ Environment '{}' with protocol '{}' (tools: {})",
            session.environment().name(),
            session.protocol().name(),
            session.environment().tool_names().join(", ")
        ),
        Err(e) => {
            println!("  ❌ Cannot assemble session: {e}");
            issues += 1;
        }
    }

    match build_engine(&config) {
        Ok(engine) => match engine.health_check().await {
            Ok(true) => println!("  ✅ Inference server reachable at {}", engine.base_url()),
            Ok(false) => {
                println!("  ⚠️  Inference server at {} answered with an error", engine.base_url());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Inference server unreachable: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Engine misconfigured: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
