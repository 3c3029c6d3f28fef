use coreflow_db::{DemoSeedDataset, SqlSubscriptionRepository, TenantSeedInfo, VerificationResult};

use crate::commands::{
    load_config, open_database, runtime, to_data, CommandResult, StepFailure, EXIT_DATABASE,
    EXIT_FAILED,
};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let repository = SqlSubscriptionRepository::new(pool.clone());

        let outcome = async {
            let seeded = DemoSeedDataset::load(&repository)
                .await
                .map_err(|error| ("seed_execution", error.to_string(), EXIT_DATABASE))?;
            let verification = DemoSeedDataset::verify(&repository)
                .await
                .map_err(|error| ("seed_verification", error.to_string(), EXIT_DATABASE))?;

            if !verification.all_passed() {
                let message = verification_message(&verification);
                return Err(("seed_verification", message, EXIT_FAILED));
            }
            Ok::<_, StepFailure>(seeded.tenants_seeded)
        }
        .await;

        pool.close().await;
        outcome
    });

    match result {
        Ok(tenants) => {
            let message = format!(
                "demo tenants seeded:\n{}",
                tenants.iter().map(describe).collect::<Vec<_>>().join("\n")
            );
            CommandResult::success_with("seed", message, to_data(&tenants))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn describe(tenant: &TenantSeedInfo) -> String {
    format!("  - {}: {} {} ({})", tenant.tenant_id, tenant.tier, tenant.status, tenant.description)
}

fn verification_message(verification: &VerificationResult) -> String {
    let failed = verification.failed();
    if failed.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for tenants: {}", failed.join(", "))
    }
}
