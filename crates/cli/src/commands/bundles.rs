use coreflow_core::BundleCatalog;

use crate::commands::{to_data, CommandResult};

pub fn run() -> CommandResult {
    let catalog = BundleCatalog::standard();
    let bundles = catalog.all();
    CommandResult::success_with(
        "bundles",
        format!("{} bundles available", bundles.len()),
        to_data(&bundles),
    )
}
