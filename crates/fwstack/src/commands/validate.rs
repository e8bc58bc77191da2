use crate::utils;
use colored::Colorize;
use std::path::Path;

pub fn handle(file: &Path) -> anyhow::Result<()> {
    println!("{}", "設定を検証中...".blue());
    utils::print_loaded_file(file);

    let spec = match utils::load_spec(file) {
        Ok(spec) => spec,
        Err(e) => fail(e),
    };

    // コンストラクトグラフまで組み立てて参照・AZ・CIDRの整合性を確認
    let template = match fwstack_cloud_aws::build_stack(&spec)
        .map_err(anyhow::Error::from)
        .and_then(|stack| Ok(stack.synthesize()?))
    {
        Ok(template) => template,
        Err(e) => fail(e),
    };

    println!("{}", "✓ 設定ファイルは正常です！".green().bold());
    println!();
    println!("サマリー:");
    println!("  スタック: {} ({})", spec.name.cyan(), spec.region);
    println!(
        "  ネットワーク: {} / {}個のAZ",
        spec.network.cidr,
        spec.network.availability_zones.len()
    );
    for group in &spec.network.subnet_groups {
        println!(
            "    - {} ({}, /{})",
            group.name.cyan(),
            group.subnet_type,
            group.cidr_mask
        );
    }
    match &spec.firewall {
        Some(firewall) => {
            println!(
                "  ファイアウォール: {} ({} → {})",
                firewall.name.cyan(),
                firewall.subnet_group,
                firewall.egress_subnet_group
            );
            for group in &firewall.rule_groups {
                println!(
                    "    - {} ({}個のルール, capacity {})",
                    group.name.cyan(),
                    group.rules.len(),
                    group.capacity
                );
            }
        }
        None => println!("  ファイアウォール: (なし)"),
    }
    println!("  インスタンス: {}個", spec.instances.len());
    for (name, instance) in &spec.instances {
        println!(
            "    - {} ({}, {})",
            name.cyan(),
            instance.instance_type,
            instance.subnet_group
        );
    }
    println!("  {}", template.summary());

    Ok(())
}

fn fail(e: anyhow::Error) -> ! {
    eprintln!();
    eprintln!("{}", "✗ 設定エラー".red().bold());
    eprintln!("  {}", e);
    std::process::exit(1);
}
