//! StackSpec から Stack を組み立てる

use crate::ec2_instance::Ec2Instance;
use crate::error::Result;
use crate::network_firewall::NetworkFirewall;
use crate::role::{Role, RoleRef};
use crate::vpc::Vpc;
use fwstack_cloud::{Construct, Stack};
use fwstack_core::{RoleSpec, StackSpec};
use std::collections::HashMap;

/// ネットワークのコンストラクトID
pub const VPC_ID: &str = "Vpc";

/// ファイアウォールのコンストラクトID
pub const FIREWALL_ID: &str = "NetworkFirewall";

/// スタック定義からコンストラクトグラフを構築
///
/// 宣言順: ネットワーク → ロール → ファイアウォール → インスタンス
pub fn build_stack(spec: &StackSpec) -> Result<Stack> {
    spec.validate()?;

    let mut stack = Stack::new(&spec.name)?;
    if let Some(description) = &spec.description {
        stack.set_description(description);
    }

    let vpc = Vpc::new(&mut stack, None, VPC_ID, &spec.network)?;
    stack.add_output("VpcId", vpc.vpc_id(), Some("VPC ID"))?;

    let mut roles = HashMap::new();
    for (name, role_spec) in &spec.roles {
        let role = Role::new(&mut stack, None, name, role_spec)?;
        roles.insert(name.as_str(), role.role_ref());
    }

    if let Some(firewall_spec) = &spec.firewall {
        let firewall =
            NetworkFirewall::with_spec(&mut stack, None, FIREWALL_ID, &vpc, firewall_spec)?;
        stack.add_output(
            "NetworkFirewallArn",
            firewall.arn(),
            Some("Network Firewall ARN"),
        )?;
    }

    for (name, instance_spec) in &spec.instances {
        let role = match &instance_spec.role {
            Some(role_name) => match roles.get(role_name.as_str()) {
                Some(role) => role.clone(),
                None => {
                    tracing::debug!(role = %role_name, instance = %name, "Using imported role");
                    RoleRef::imported(role_name.as_str())
                }
            },
            None => {
                let role = Role::new(
                    &mut stack,
                    None,
                    &format!("{} Role", name),
                    &RoleSpec::default(),
                )?;
                role.role_ref()
            }
        };

        let instance = Ec2Instance::new(&mut stack, None, name, &vpc, &role, instance_spec)?;
        stack.add_output(
            &format!("{}InstanceId", name),
            instance.instance().ref_token(),
            Some(format!("Instance ID of {}", instance.path()).as_str()),
        )?;
    }

    tracing::info!(
        stack = %spec.name,
        resources = stack.resource_count(),
        "Built stack"
    );
    Ok(stack)
}
