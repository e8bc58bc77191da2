//! AWS constructs for fwstack
//!
//! This crate declares an egress-inspection network on top of the
//! `fwstack-cloud` construct graph:
//!
//! - [`Vpc`]: VPC, subnets per group × AZ, route tables, NAT gateways
//! - [`Role`] / [`RoleRef`]: IAM roles for instances
//! - [`Ec2Instance`]: an instance with its security group and instance profile
//! - [`NetworkFirewallRuleGroup5Tuple`] / [`NetworkFirewallPolicy`]: stateful rules
//! - [`NetworkFirewall`]: the firewall, its logging, and the route rewiring
//!
//! # Example
//!
//! ```ignore
//! use fwstack_cloud::Stack;
//! use fwstack_cloud_aws::{NetworkFirewall, Vpc};
//! use fwstack_core::NetworkSpec;
//!
//! let mut stack = Stack::new("egress-inspection")?;
//! let vpc = Vpc::new(&mut stack, None, "Vpc", &NetworkSpec::default())?;
//! NetworkFirewall::new(&mut stack, None, "NetworkFirewall", &vpc)?;
//!
//! let template = stack.synthesize()?;
//! println!("{}", template.to_json()?);
//! ```

pub mod builder;
pub mod ec2_instance;
pub mod error;
pub mod firewall_policy;
pub mod network_firewall;
pub mod role;
pub mod rule_group;
pub mod vpc;

pub use builder::{FIREWALL_ID, VPC_ID, build_stack};
pub use ec2_instance::Ec2Instance;
pub use error::{AwsError, Result};
pub use firewall_policy::{NetworkFirewallPolicy, StatefulRuleGroupReference};
pub use network_firewall::{EndpointIndex, NetworkFirewall, endpoint_id};
pub use role::{Role, RoleRef};
pub use rule_group::NetworkFirewallRuleGroup5Tuple;
pub use vpc::{Subnet, Vpc};

use fwstack_cloud::{ConstructPath, Stack};
use serde_json::{Value, json};

/// `scope/id`, or a top-level path when there is no scope
pub(crate) fn construct_path(
    scope: Option<&ConstructPath>,
    id: &str,
) -> fwstack_cloud::Result<ConstructPath> {
    match scope {
        Some(scope) => scope.child(id),
        None => ConstructPath::root(id),
    }
}

/// `Name` tag set to `<stack>/<path>`
pub(crate) fn name_tags(stack: &Stack, path: &ConstructPath) -> Value {
    json!([{ "Key": "Name", "Value": format!("{}/{}", stack.name(), path) }])
}
