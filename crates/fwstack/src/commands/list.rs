use crate::utils;
use colored::Colorize;
use std::path::Path;

pub fn handle(file: &Path, resource_type: Option<&str>) -> anyhow::Result<()> {
    let spec = utils::load_spec(file)?;
    let stack = fwstack_cloud_aws::build_stack(&spec)?;

    let resources: Vec<_> = stack
        .resources()
        .filter(|r| resource_type.is_none_or(|t| r.resource_type() == t))
        .collect();

    println!("{}: {}個のリソース", stack.name().cyan(), resources.len());
    for resource in &resources {
        println!(
            "  {}  {}  {}",
            resource.logical_id().bold(),
            resource.resource_type().dimmed(),
            resource.path()
        );
    }

    Ok(())
}
