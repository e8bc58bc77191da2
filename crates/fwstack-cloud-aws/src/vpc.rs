//! VPC construct
//!
//! Declares the VPC, an internet gateway, and for every subnet group × AZ a
//! subnet with its own route table. CIDR blocks are allocated sequentially from
//! the VPC CIDR in group declaration order, each aligned to its mask.

use crate::error::{AwsError, Result};
use crate::{construct_path, name_tags};
use fwstack_cloud::{Construct, ConstructPath, ResourceRef, Stack, Token};
use fwstack_core::{NetworkSpec, SubnetGroupSpec, SubnetType};
use ipnetwork::Ipv4Network;
use serde_json::json;
use std::net::Ipv4Addr;

/// Construct id of a subnet's `0.0.0.0/0` route
pub const DEFAULT_ROUTE_ID: &str = "DefaultRoute";

const ANY_IPV4: &str = "0.0.0.0/0";

/// A declared subnet
#[derive(Debug, Clone)]
pub struct Subnet {
    path: ConstructPath,
    group: String,
    subnet_type: SubnetType,
    availability_zone: String,
    cidr: Ipv4Network,
    subnet: ResourceRef,
    route_table: ResourceRef,
}

impl Subnet {
    /// Subnet group name
    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn subnet_type(&self) -> SubnetType {
        self.subnet_type
    }

    pub fn availability_zone(&self) -> &str {
        &self.availability_zone
    }

    pub fn cidr(&self) -> Ipv4Network {
        self.cidr
    }

    pub fn resource(&self) -> &ResourceRef {
        &self.subnet
    }

    pub fn subnet_id(&self) -> Token {
        self.subnet.ref_token()
    }

    pub fn route_table(&self) -> &ResourceRef {
        &self.route_table
    }

    pub fn route_table_id(&self) -> Token {
        self.route_table.ref_token()
    }

    /// The `DefaultRoute` child of this subnet, if one was declared
    pub fn default_route(&self, stack: &Stack) -> Option<ResourceRef> {
        stack.find_child(&self.path, DEFAULT_ROUTE_ID)
    }
}

impl Construct for Subnet {
    fn path(&self) -> &ConstructPath {
        &self.path
    }
}

/// A declared VPC
#[derive(Debug, Clone)]
pub struct Vpc {
    path: ConstructPath,
    vpc: ResourceRef,
    cidr: Ipv4Network,
    availability_zones: Vec<String>,
    groups: Vec<String>,
    subnets: Vec<Subnet>,
    nat_gateways: Vec<(String, ResourceRef)>,
}

/// Subnet placement decided before any resource is declared
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlannedSubnet<'a> {
    group: &'a SubnetGroupSpec,
    availability_zone: &'a str,
    /// 1-based position inside the group
    index: usize,
    cidr: Ipv4Network,
}

impl Vpc {
    pub fn new(
        stack: &mut Stack,
        scope: Option<&ConstructPath>,
        id: &str,
        spec: &NetworkSpec,
    ) -> Result<Self> {
        spec.validate()?;
        let planned = allocate_subnets(spec)?;

        let path = construct_path(scope, id)?;
        stack.register(&path)?;

        let vpc = stack.add_resource(
            path.child("Default")?,
            "AWS::EC2::VPC",
            json!({
                "CidrBlock": spec.cidr.to_string(),
                "EnableDnsHostnames": true,
                "EnableDnsSupport": true,
                "InstanceTenancy": "default",
                "Tags": name_tags(stack, &path),
            }),
        )?;

        let mut subnets = Vec::with_capacity(planned.len());
        for plan in &planned {
            subnets.push(declare_subnet(stack, &path, &vpc, plan)?);
        }

        let has_public = subnets
            .iter()
            .any(|s| s.subnet_type == SubnetType::Public);
        let internet_gateway = if has_public {
            let igw = stack.add_resource(
                path.child("IGW")?,
                "AWS::EC2::InternetGateway",
                json!({ "Tags": name_tags(stack, &path) }),
            )?;
            let attachment = stack.add_resource(
                path.child("VPCGW")?,
                "AWS::EC2::VPCGatewayAttachment",
                json!({
                    "InternetGatewayId": igw.ref_token(),
                    "VpcId": vpc.ref_token(),
                }),
            )?;
            Some((igw, attachment))
        } else {
            None
        };

        // パブリックサブネット: IGW へのデフォルトルートと NAT ゲートウェイ
        let nat_hosts = nat_host_subnets(spec, &subnets);
        let mut nat_gateways = Vec::new();
        for subnet in subnets.iter().filter(|s| s.subnet_type == SubnetType::Public) {
            let Some((igw, attachment)) = &internet_gateway else {
                continue;
            };
            let route = stack.add_resource(
                subnet.path.child(DEFAULT_ROUTE_ID)?,
                "AWS::EC2::Route",
                json!({
                    "DestinationCidrBlock": ANY_IPV4,
                    "GatewayId": igw.ref_token(),
                    "RouteTableId": subnet.route_table_id(),
                }),
            )?;
            stack.add_dependency(&route, attachment)?;

            if !nat_hosts.contains(&subnet.path) {
                continue;
            }
            let eip = stack.add_resource(
                subnet.path.child("EIP")?,
                "AWS::EC2::EIP",
                json!({
                    "Domain": "vpc",
                    "Tags": name_tags(stack, &subnet.path),
                }),
            )?;
            let nat = stack.add_resource(
                subnet.path.child("NATGateway")?,
                "AWS::EC2::NatGateway",
                json!({
                    "AllocationId": eip.attr("AllocationId"),
                    "SubnetId": subnet.subnet_id(),
                    "Tags": name_tags(stack, &subnet.path),
                }),
            )?;
            stack.add_dependency(&nat, &route)?;
            nat_gateways.push((subnet.availability_zone.clone(), nat));
        }

        // プライベートサブネット: 同じAZの NAT、なければ最初の NAT へ
        for subnet in subnets
            .iter()
            .filter(|s| s.subnet_type == SubnetType::PrivateWithEgress)
        {
            let nat = nat_gateways
                .iter()
                .find(|(az, _)| *az == subnet.availability_zone)
                .or_else(|| nat_gateways.first())
                .map(|(_, nat)| nat)
                .ok_or_else(|| {
                    AwsError::InvalidConfig(format!(
                        "no NAT gateway available for subnet {}",
                        subnet.path
                    ))
                })?;
            stack.add_resource(
                subnet.path.child(DEFAULT_ROUTE_ID)?,
                "AWS::EC2::Route",
                json!({
                    "DestinationCidrBlock": ANY_IPV4,
                    "NatGatewayId": nat.ref_token(),
                    "RouteTableId": subnet.route_table_id(),
                }),
            )?;
        }

        tracing::debug!(
            vpc = %path,
            subnets = subnets.len(),
            nat_gateways = nat_gateways.len(),
            "Declared VPC"
        );

        Ok(Self {
            path,
            vpc,
            cidr: spec.cidr,
            availability_zones: spec.availability_zones.clone(),
            groups: spec.subnet_groups.iter().map(|g| g.name.clone()).collect(),
            subnets,
            nat_gateways,
        })
    }

    pub fn resource(&self) -> &ResourceRef {
        &self.vpc
    }

    pub fn vpc_id(&self) -> Token {
        self.vpc.ref_token()
    }

    pub fn cidr(&self) -> Ipv4Network {
        self.cidr
    }

    pub fn availability_zones(&self) -> &[String] {
        &self.availability_zones
    }

    /// All subnets in declaration order (group × AZ)
    pub fn subnets(&self) -> &[Subnet] {
        &self.subnets
    }

    /// NAT ゲートウェイ（AZ, リソース）
    pub fn nat_gateways(&self) -> &[(String, ResourceRef)] {
        &self.nat_gateways
    }

    /// Subnets of a group, in the group's AZ order
    pub fn select_subnets(&self, group: &str) -> Result<Vec<&Subnet>> {
        if !self.groups.iter().any(|g| g == group) {
            return Err(AwsError::SubnetGroupNotFound(group.to_string()));
        }
        let subnets: Vec<&Subnet> = self.subnets.iter().filter(|s| s.group == group).collect();
        if subnets.is_empty() {
            return Err(AwsError::EmptySubnetGroup(group.to_string()));
        }
        Ok(subnets)
    }

    /// Subnets of a group located in `az`
    pub fn select_subnets_in_az(&self, group: &str, az: &str) -> Result<Vec<&Subnet>> {
        Ok(self
            .select_subnets(group)?
            .into_iter()
            .filter(|s| s.availability_zone == az)
            .collect())
    }

    /// Every subnet of type public, across all public groups
    pub fn public_subnets(&self) -> Vec<&Subnet> {
        self.subnets
            .iter()
            .filter(|s| s.subnet_type == SubnetType::Public)
            .collect()
    }
}

impl Construct for Vpc {
    fn path(&self) -> &ConstructPath {
        &self.path
    }
}

fn declare_subnet(
    stack: &mut Stack,
    vpc_path: &ConstructPath,
    vpc: &ResourceRef,
    plan: &PlannedSubnet<'_>,
) -> Result<Subnet> {
    let path = vpc_path.child(&format!("{}Subnet{}", plan.group.name, plan.index))?;
    stack.register(&path)?;

    let name = format!("{}/{}", stack.name(), path);
    let subnet = stack.add_resource(
        path.child("Subnet")?,
        "AWS::EC2::Subnet",
        json!({
            "AvailabilityZone": plan.availability_zone,
            "CidrBlock": plan.cidr.to_string(),
            "MapPublicIpOnLaunch": plan.group.subnet_type == SubnetType::Public,
            "Tags": [
                { "Key": "Name", "Value": name },
                { "Key": "fwstack:subnet-name", "Value": plan.group.name },
                { "Key": "fwstack:subnet-type", "Value": plan.group.subnet_type.to_string() },
            ],
            "VpcId": vpc.ref_token(),
        }),
    )?;
    let route_table = stack.add_resource(
        path.child("RouteTable")?,
        "AWS::EC2::RouteTable",
        json!({
            "Tags": name_tags(stack, &path),
            "VpcId": vpc.ref_token(),
        }),
    )?;
    stack.add_resource(
        path.child("RouteTableAssociation")?,
        "AWS::EC2::SubnetRouteTableAssociation",
        json!({
            "RouteTableId": route_table.ref_token(),
            "SubnetId": subnet.ref_token(),
        }),
    )?;

    Ok(Subnet {
        path,
        group: plan.group.name.clone(),
        subnet_type: plan.group.subnet_type,
        availability_zone: plan.availability_zone.to_string(),
        cidr: plan.cidr,
        subnet,
        route_table,
    })
}

/// Sequential, mask-aligned CIDR allocation
fn allocate_subnets(spec: &NetworkSpec) -> Result<Vec<PlannedSubnet<'_>>> {
    let base = u64::from(u32::from(spec.cidr.network()));
    let end = base + (1u64 << (32 - u32::from(spec.cidr.prefix())));
    let mut cursor = base;
    let mut planned = Vec::new();

    for group in &spec.subnet_groups {
        let size = 1u64 << (32 - u32::from(group.cidr_mask));
        for (i, az) in spec.zones_for(group).into_iter().enumerate() {
            let start = cursor.div_ceil(size) * size;
            if start + size > end {
                return Err(AwsError::CidrExhausted {
                    vpc_cidr: spec.cidr.to_string(),
                    group: group.name.clone(),
                    az: az.to_string(),
                    mask: group.cidr_mask,
                });
            }
            let cidr = Ipv4Network::new(Ipv4Addr::from(start as u32), group.cidr_mask)
                .map_err(|e| AwsError::InvalidConfig(e.to_string()))?;
            cursor = start + size;
            planned.push(PlannedSubnet {
                group,
                availability_zone: az,
                index: i + 1,
                cidr,
            });
        }
    }
    Ok(planned)
}

/// NAT ゲートウェイを配置するサブネット
///
/// 最初のパブリックグループの先頭から `nat_gateways` 個（未指定時は全AZ）。
/// NAT を必要とするサブネットがなければ配置しない。
fn nat_host_subnets(spec: &NetworkSpec, subnets: &[Subnet]) -> Vec<ConstructPath> {
    let needs_nat = subnets
        .iter()
        .any(|s| s.subnet_type == SubnetType::PrivateWithEgress);
    let Some(public_group) = spec
        .subnet_groups
        .iter()
        .find(|g| g.subnet_type == SubnetType::Public)
    else {
        return Vec::new();
    };
    if !needs_nat {
        return Vec::new();
    }

    let hosts: Vec<&Subnet> = subnets
        .iter()
        .filter(|s| s.group == public_group.name)
        .collect();
    let count = spec
        .nat_gateways
        .map(|n| n as usize)
        .unwrap_or(hosts.len())
        .min(hosts.len());
    hosts
        .into_iter()
        .take(count)
        .map(|s| s.path.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn default_vpc(spec: &NetworkSpec) -> (Stack, Vpc) {
        let mut stack = Stack::new("test").unwrap();
        let vpc = Vpc::new(&mut stack, None, "Vpc", spec).unwrap();
        (stack, vpc)
    }

    fn count(stack: &Stack, resource_type: &str) -> usize {
        stack
            .resources()
            .filter(|r| r.resource_type() == resource_type)
            .count()
    }

    #[test]
    fn test_default_network_resources() {
        let (stack, vpc) = default_vpc(&NetworkSpec::default());
        assert_eq!(count(&stack, "AWS::EC2::VPC"), 1);
        assert_eq!(count(&stack, "AWS::EC2::InternetGateway"), 1);
        assert_eq!(count(&stack, "AWS::EC2::Subnet"), 6);
        assert_eq!(count(&stack, "AWS::EC2::RouteTable"), 6);
        assert_eq!(count(&stack, "AWS::EC2::SubnetRouteTableAssociation"), 6);
        assert_eq!(count(&stack, "AWS::EC2::Route"), 6);
        assert_eq!(count(&stack, "AWS::EC2::NatGateway"), 2);
        assert_eq!(vpc.nat_gateways().len(), 2);
        assert_eq!(vpc.public_subnets().len(), 2);
    }

    #[test]
    fn test_cidr_allocation() {
        let (_, vpc) = default_vpc(&NetworkSpec::default());
        let cidrs: Vec<String> = vpc.subnets().iter().map(|s| s.cidr().to_string()).collect();
        assert_eq!(
            cidrs,
            vec![
                "10.0.0.0/24",
                "10.0.1.0/24",
                "10.0.2.0/28",
                "10.0.2.16/28",
                "10.0.3.0/24",
                "10.0.4.0/24",
            ]
        );
    }

    #[test]
    fn test_cidr_exhausted() {
        let mut spec = NetworkSpec::default();
        spec.cidr = "10.0.0.0/24".parse().unwrap();
        spec.subnet_groups[0].cidr_mask = 25;
        let mut stack = Stack::new("test").unwrap();
        let result = Vpc::new(&mut stack, None, "Vpc", &spec);
        assert!(matches!(result, Err(AwsError::CidrExhausted { .. })));
    }

    #[test]
    fn test_private_route_uses_nat_in_same_zone() {
        let (stack, vpc) = default_vpc(&NetworkSpec::default());
        for subnet in vpc.select_subnets("Egress").unwrap() {
            let route = subnet.default_route(&stack).unwrap();
            let nat = vpc
                .nat_gateways()
                .iter()
                .find(|(az, _)| az == subnet.availability_zone())
                .map(|(_, nat)| nat)
                .unwrap();
            let props = stack.properties(route.logical_id()).unwrap();
            assert_eq!(props["NatGatewayId"], Value::from(nat.ref_token()));
        }
    }

    #[test]
    fn test_single_nat_gateway_shared() {
        let spec = NetworkSpec {
            nat_gateways: Some(1),
            ..Default::default()
        };
        let (stack, vpc) = default_vpc(&spec);
        assert_eq!(vpc.nat_gateways().len(), 1);
        let (_, nat) = &vpc.nat_gateways()[0];
        for subnet in vpc.select_subnets("Egress").unwrap() {
            let route = subnet.default_route(&stack).unwrap();
            let props = stack.properties(route.logical_id()).unwrap();
            assert_eq!(props["NatGatewayId"], Value::from(nat.ref_token()));
        }
    }

    #[test]
    fn test_isolated_subnet_has_no_default_route() {
        let mut spec = NetworkSpec::default();
        spec.subnet_groups.push(SubnetGroupSpec::new(
            "Data",
            SubnetType::Isolated,
            24,
        ));
        let (stack, vpc) = default_vpc(&spec);
        let data = vpc.select_subnets("Data").unwrap();
        assert_eq!(data.len(), 2);
        assert!(data.iter().all(|s| s.default_route(&stack).is_none()));
    }

    #[test]
    fn test_select_subnets() {
        let (_, vpc) = default_vpc(&NetworkSpec::default());
        assert!(matches!(
            vpc.select_subnets("App"),
            Err(AwsError::SubnetGroupNotFound(_))
        ));

        let in_c = vpc.select_subnets_in_az("Egress", "us-east-1c").unwrap();
        assert_eq!(in_c.len(), 1);
        assert_eq!(in_c[0].cidr().to_string(), "10.0.4.0/24");
        assert!(vpc.select_subnets_in_az("Egress", "us-east-1b").unwrap().is_empty());
    }

    #[test]
    fn test_group_zone_order_respected() {
        let mut spec = NetworkSpec::default();
        spec.subnet_groups[1].availability_zones =
            Some(vec!["us-east-1c".to_string(), "us-east-1a".to_string()]);
        let (_, vpc) = default_vpc(&spec);
        let zones: Vec<&str> = vpc
            .select_subnets("Firewall")
            .unwrap()
            .iter()
            .map(|s| s.availability_zone())
            .collect();
        assert_eq!(zones, vec!["us-east-1c", "us-east-1a"]);
    }

    #[test]
    fn test_public_route_depends_on_attachment() {
        let (stack, vpc) = default_vpc(&NetworkSpec::default());
        let template = stack.synthesize().unwrap();
        let public = vpc.public_subnets()[0];
        let route = public.default_route(&stack).unwrap();
        let rendered = template.resource(route.logical_id()).unwrap();
        assert_eq!(rendered["DependsOn"].as_array().unwrap().len(), 1);
        assert!(rendered["Properties"]["GatewayId"].is_object());
    }
}
