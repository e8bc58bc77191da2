use crate::OutputFormat;
use crate::utils;
use colored::Colorize;
use fwstack_cloud::Assembly;
use std::path::Path;

pub async fn handle(
    file: &Path,
    out: &Path,
    format: OutputFormat,
    stdout: bool,
) -> anyhow::Result<()> {
    let spec = utils::load_spec(file)?;
    let stack = fwstack_cloud_aws::build_stack(&spec)?;
    let template = stack.synthesize()?;

    if stdout {
        let body = match format {
            OutputFormat::Json => template.to_json()?,
            OutputFormat::Yaml => template.to_yaml()?,
        };
        println!("{}", body);
        return Ok(());
    }

    if format == OutputFormat::Yaml {
        tracing::warn!("--format yaml only applies with --stdout; writing JSON");
    }

    utils::print_loaded_file(file);
    println!("{}", "テンプレートを生成中...".blue());

    let assembly = Assembly::new(out);
    let previous = if assembly.template_path(stack.name()).exists() {
        match assembly.read_template(stack.name()).await {
            Ok(previous) => Some(previous),
            Err(e) => {
                tracing::debug!(error = %e, "Previous template is unreadable, ignoring");
                None
            }
        }
    } else {
        None
    };
    let path = assembly.write(stack.name(), &template).await?;

    println!("{}", "✓ 生成完了".green().bold());
    println!("  スタック: {}", stack.name().cyan());
    println!("  出力: {}", path.display().to_string().cyan());
    println!("  {}", template.summary());
    match previous {
        Some(previous) if previous == template => {
            println!("  {}", "前回の出力から変更はありません".dimmed());
        }
        Some(_) => println!("  {}", "前回の出力から変更があります".yellow()),
        None => {}
    }

    Ok(())
}
