//! Managed firewall construct
//!
//! Declares the alert log group, the rule groups, the policy, the firewall and
//! its logging configuration, then steers egress traffic through the firewall:
//!
//! - public subnets get a route to every egress subnet of the same AZ via the
//!   firewall endpoint of that AZ (return traffic from the NAT gateway),
//! - egress subnets have their `DefaultRoute` retargeted from the NAT gateway to
//!   the firewall endpoint of their AZ.
//!
//! Each subnet is wired to the endpoint of its own availability zone. The
//! endpoint is looked up by the position of that zone's subnet in
//! `SubnetMappings`, which assumes `EndpointIds` comes back in subnet-mapping
//! order.

use crate::construct_path;
use crate::error::{AwsError, Result};
use crate::firewall_policy::{NetworkFirewallPolicy, StatefulRuleGroupReference};
use crate::rule_group::NetworkFirewallRuleGroup5Tuple;
use crate::vpc::{Subnet, Vpc};
use fwstack_cloud::{Construct, ConstructPath, ResourceRef, Stack, Token};
use fwstack_core::{FirewallSpec, RuleOrder, SubnetType};
use serde_json::{Value, json};
use std::collections::BTreeSet;

const LOG_GROUP_ID: &str = "Network Firewall Alert Log Group";
const RULE_GROUP_ID: &str = "Network Firewall Rule Group 5-Tuple";
const POLICY_ID: &str = "Network Firewall Policy";
const LOGGING_ID: &str = "Network Firewall Logs";
const ROUTE_ID_PREFIX: &str = "Route Nat Gateway To Network Firewall";

/// Position of each availability zone's endpoint in the firewall's `EndpointIds`
///
/// Built from the firewall subnet mappings in the order they are declared on
/// the firewall resource. The positions are only valid as `EndpointIds`
/// indices while AWS returns the endpoints in that same order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointIndex {
    zones: Vec<String>,
}

impl EndpointIndex {
    /// A firewall takes at most one subnet per availability zone
    pub fn new<I, S>(zones: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = Self { zones: Vec::new() };
        for az in zones {
            let az = az.into();
            if index.zones.contains(&az) {
                return Err(AwsError::InvalidConfig(format!(
                    "firewall subnets contain more than one subnet in {}",
                    az
                )));
            }
            index.zones.push(az);
        }
        Ok(index)
    }

    pub fn for_az(&self, az: &str) -> Result<usize> {
        self.zones
            .iter()
            .position(|z| z == az)
            .ok_or_else(|| AwsError::NoFirewallEndpoint { az: az.to_string() })
    }

    pub fn zones(&self) -> &[String] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

/// VPC endpoint ID of the `index`-th firewall endpoint
///
/// `EndpointIds` entries have the form `<az>:<vpce-id>`.
pub fn endpoint_id(firewall: &ResourceRef, index: usize) -> Token {
    Token::select(
        1,
        Token::split(":", Token::select(index, firewall.attr("EndpointIds"))),
    )
}

/// A declared AWS Network Firewall and its routing
#[derive(Debug, Clone)]
pub struct NetworkFirewall {
    path: ConstructPath,
    log_group: ResourceRef,
    rule_groups: Vec<NetworkFirewallRuleGroup5Tuple>,
    policy: NetworkFirewallPolicy,
    firewall: ResourceRef,
    logging: ResourceRef,
    endpoints: EndpointIndex,
    routes: Vec<ResourceRef>,
    redirected_routes: Vec<ResourceRef>,
}

impl NetworkFirewall {
    /// Firewall with the default settings and rule group
    pub fn new(
        stack: &mut Stack,
        scope: Option<&ConstructPath>,
        id: &str,
        vpc: &Vpc,
    ) -> Result<Self> {
        Self::with_spec(stack, scope, id, vpc, &FirewallSpec::default())
    }

    pub fn with_spec(
        stack: &mut Stack,
        scope: Option<&ConstructPath>,
        id: &str,
        vpc: &Vpc,
        spec: &FirewallSpec,
    ) -> Result<Self> {
        spec.validate()?;
        if let Some(group) = spec
            .rule_groups
            .iter()
            .find(|g| g.rule_order != RuleOrder::StrictOrder)
        {
            return Err(AwsError::InvalidConfig(format!(
                "rule-group '{}' uses {} but the firewall policy requires {}",
                group.name,
                group.rule_order.as_str(),
                RuleOrder::StrictOrder.as_str()
            )));
        }

        // 宣言前にすべてのAZのエンドポイントを解決しておく
        let firewall_subnets = vpc.select_subnets(&spec.subnet_group)?;
        let egress_subnets = vpc.select_subnets(&spec.egress_subnet_group)?;
        if let Some(subnet) = firewall_subnets
            .iter()
            .find(|s| s.subnet_type() == SubnetType::Public)
        {
            return Err(AwsError::InvalidConfig(format!(
                "firewall subnet {} must not be {}",
                subnet.path(),
                SubnetType::Public
            )));
        }
        let endpoints = EndpointIndex::new(firewall_subnets.iter().map(|s| s.availability_zone()))?;
        for subnet in &egress_subnets {
            if subnet.subnet_type() != SubnetType::PrivateWithEgress {
                return Err(AwsError::InvalidConfig(format!(
                    "egress subnet {} is {}, expected {}",
                    subnet.path(),
                    subnet.subnet_type(),
                    SubnetType::PrivateWithEgress
                )));
            }
            endpoints.for_az(subnet.availability_zone())?;
            if subnet.default_route(stack).is_none() {
                return Err(AwsError::InvalidConfig(format!(
                    "egress subnet {} has no default route to redirect",
                    subnet.path()
                )));
            }
        }

        let path = construct_path(scope, id)?;
        stack.register(&path)?;

        // 1. ALERT ログの出力先
        let log_group = stack.add_resource(
            path.child(LOG_GROUP_ID)?,
            "AWS::Logs::LogGroup",
            json!({ "RetentionInDays": spec.log_retention_days }),
        )?;
        stack.add_override(&log_group, "UpdateReplacePolicy", "Retain")?;
        stack.add_override(&log_group, "DeletionPolicy", "Retain")?;

        // 2. ルールグループ
        let mut rule_groups = Vec::with_capacity(spec.rule_groups.len());
        for (i, group) in spec.rule_groups.iter().enumerate() {
            let group_id = if i == 0 {
                RULE_GROUP_ID.to_string()
            } else {
                format!("{} {}", RULE_GROUP_ID, i + 1)
            };
            rule_groups.push(NetworkFirewallRuleGroup5Tuple::with_spec(
                stack,
                Some(&path),
                &group_id,
                group,
            )?);
        }

        // 3. ポリシー（宣言順に priority 1, 2, ...）
        let references: Vec<StatefulRuleGroupReference> = rule_groups
            .iter()
            .zip(1u32..)
            .map(|(group, priority)| StatefulRuleGroupReference {
                priority,
                resource_arn: group.arn(),
            })
            .collect();
        let policy = NetworkFirewallPolicy::new(
            stack,
            Some(&path),
            POLICY_ID,
            &format!("{}-policy", spec.name),
            &references,
        )?;

        // 4. ファイアウォール本体
        let subnet_mappings: Vec<Value> = firewall_subnets
            .iter()
            .map(|s| json!({ "SubnetId": s.subnet_id() }))
            .collect();
        let firewall = stack.add_resource(
            path.child("Default")?,
            "AWS::NetworkFirewall::Firewall",
            json!({
                "DeleteProtection": spec.delete_protection,
                "FirewallName": spec.name,
                "FirewallPolicyArn": policy.arn(),
                "SubnetChangeProtection": spec.subnet_change_protection,
                "SubnetMappings": subnet_mappings,
                "VpcId": vpc.vpc_id(),
            }),
        )?;

        // 5. ALERT ログを CloudWatch Logs へ
        let logging = stack.add_resource(
            path.child(LOGGING_ID)?,
            "AWS::NetworkFirewall::LoggingConfiguration",
            json!({
                "FirewallArn": firewall.ref_token(),
                "LoggingConfiguration": {
                    "LogDestinationConfigs": [{
                        "LogDestination": { "logGroup": log_group.ref_token() },
                        "LogDestinationType": "CloudWatchLogs",
                        "LogType": "ALERT",
                    }],
                },
            }),
        )?;

        // 6. パブリックサブネット → 同じAZの egress サブネットはファイアウォール経由
        let public_subnets = vpc.public_subnets();
        let public_groups: BTreeSet<&str> = public_subnets.iter().map(|s| s.group()).collect();
        let mut routes = Vec::new();
        for public in &public_subnets {
            let az = public.availability_zone();
            for destination in vpc.select_subnets_in_az(&spec.egress_subnet_group, az)? {
                let index = endpoints.for_az(az)?;
                let route_id = route_id(public, destination, public_groups.len() > 1);
                let route = stack.add_resource(
                    path.child(&route_id)?,
                    "AWS::EC2::Route",
                    json!({
                        "DestinationCidrBlock": destination.cidr().to_string(),
                        "RouteTableId": public.route_table_id(),
                        "VpcEndpointId": endpoint_id(&firewall, index),
                    }),
                )?;
                routes.push(route);
            }
        }

        // 7. egress サブネットのデフォルトルートを NAT からエンドポイントへ付け替え
        let mut redirected_routes = Vec::with_capacity(egress_subnets.len());
        for subnet in &egress_subnets {
            let index = endpoints.for_az(subnet.availability_zone())?;
            let route = subnet.default_route(stack).ok_or_else(|| {
                AwsError::InvalidConfig(format!(
                    "egress subnet {} has no default route to redirect",
                    subnet.path()
                ))
            })?;
            stack.add_deletion_override(&route, "Properties.NatGatewayId")?;
            stack.add_override(
                &route,
                "Properties.VpcEndpointId",
                endpoint_id(&firewall, index),
            )?;
            redirected_routes.push(route);
        }

        tracing::info!(
            firewall = %spec.name,
            endpoints = endpoints.len(),
            routes = routes.len(),
            redirected = redirected_routes.len(),
            "Declared network firewall"
        );

        Ok(Self {
            path,
            log_group,
            rule_groups,
            policy,
            firewall,
            logging,
            endpoints,
            routes,
            redirected_routes,
        })
    }

    pub fn firewall(&self) -> &ResourceRef {
        &self.firewall
    }

    pub fn arn(&self) -> Token {
        self.firewall.ref_token()
    }

    pub fn log_group(&self) -> &ResourceRef {
        &self.log_group
    }

    pub fn rule_groups(&self) -> &[NetworkFirewallRuleGroup5Tuple] {
        &self.rule_groups
    }

    pub fn policy(&self) -> &NetworkFirewallPolicy {
        &self.policy
    }

    pub fn logging(&self) -> &ResourceRef {
        &self.logging
    }

    pub fn endpoints(&self) -> &EndpointIndex {
        &self.endpoints
    }

    /// Routes added to public route tables
    pub fn routes(&self) -> &[ResourceRef] {
        &self.routes
    }

    /// Egress default routes retargeted to the firewall
    pub fn redirected_routes(&self) -> &[ResourceRef] {
        &self.redirected_routes
    }
}

impl Construct for NetworkFirewall {
    fn path(&self) -> &ConstructPath {
        &self.path
    }
}

fn route_id(public: &Subnet, destination: &Subnet, qualify: bool) -> String {
    let cidr = destination.cidr().to_string().replace('/', "-");
    if qualify {
        format!("{} {} {}", public.group(), ROUTE_ID_PREFIX, cidr)
    } else {
        format!("{} {}", ROUTE_ID_PREFIX, cidr)
    }
}
