//! AWS construct error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("Subnet group not found: {0}")]
    SubnetGroupNotFound(String),

    #[error("Subnet group '{0}' has no subnets")]
    EmptySubnetGroup(String),

    #[error("No firewall endpoint in availability zone {az}")]
    NoFirewallEndpoint { az: String },

    #[error("VPC CIDR {vpc_cidr} has no room for a /{mask} subnet ({group} in {az})")]
    CidrExhausted {
        vpc_cidr: String,
        group: String,
        az: String,
        mask: u8,
    },

    #[error("Invalid rule group priority: {0}")]
    InvalidPriority(u32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Stack definition error: {0}")]
    Spec(#[from] fwstack_core::SpecError),

    #[error("Cloud error: {0}")]
    Cloud(#[from] fwstack_cloud::CloudError),
}

pub type Result<T> = std::result::Result<T, AwsError>;
