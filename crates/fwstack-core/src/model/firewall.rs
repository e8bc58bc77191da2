//! ファイアウォールモデル
//!
//! Network Firewall のステートフルルール、ルールグループ、ファイアウォール本体の定義

use crate::error::{Result, SpecError};
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;

/// CloudWatch Logs で指定可能な保持期間（日）
pub const LOG_RETENTION_DAYS: &[u32] = &[
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557, 2922,
    3288, 3653,
];

const ANY_IPV4: Ipv4Network = match Ipv4Network::new_checked(Ipv4Addr::UNSPECIFIED, 0) {
    Some(net) => net,
    None => panic!("0.0.0.0/0"),
};

/// ルールグループ容量の上限
pub const MAX_RULE_GROUP_CAPACITY: u32 = 30_000;

/// ルールアクション
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleAction {
    #[default]
    Pass,
    Drop,
    Alert,
    Reject,
}

impl RuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Pass => "PASS",
            RuleAction::Drop => "DROP",
            RuleAction::Alert => "ALERT",
            RuleAction::Reject => "REJECT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PASS" => Some(RuleAction::Pass),
            "DROP" => Some(RuleAction::Drop),
            "ALERT" => Some(RuleAction::Alert),
            "REJECT" => Some(RuleAction::Reject),
            _ => None,
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// ルールのプロトコル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleProtocol {
    #[default]
    Ip,
    Tcp,
    Udp,
    Icmp,
    Http,
    Tls,
    Dns,
    Ssh,
    Ftp,
    Smtp,
}

impl RuleProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleProtocol::Ip => "IP",
            RuleProtocol::Tcp => "TCP",
            RuleProtocol::Udp => "UDP",
            RuleProtocol::Icmp => "ICMP",
            RuleProtocol::Http => "HTTP",
            RuleProtocol::Tls => "TLS",
            RuleProtocol::Dns => "DNS",
            RuleProtocol::Ssh => "SSH",
            RuleProtocol::Ftp => "FTP",
            RuleProtocol::Smtp => "SMTP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "IP" => Some(RuleProtocol::Ip),
            "TCP" => Some(RuleProtocol::Tcp),
            "UDP" => Some(RuleProtocol::Udp),
            "ICMP" => Some(RuleProtocol::Icmp),
            "HTTP" => Some(RuleProtocol::Http),
            "TLS" => Some(RuleProtocol::Tls),
            "DNS" => Some(RuleProtocol::Dns),
            "SSH" => Some(RuleProtocol::Ssh),
            "FTP" => Some(RuleProtocol::Ftp),
            "SMTP" => Some(RuleProtocol::Smtp),
            _ => None,
        }
    }
}

/// トラフィック方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Forward,
    Any,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "FORWARD",
            Direction::Any => "ANY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "FORWARD" => Some(Direction::Forward),
            "ANY" => Some(Direction::Any),
            _ => None,
        }
    }
}

/// ステートフルルールの評価順序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleOrder {
    #[default]
    StrictOrder,
    DefaultActionOrder,
}

impl RuleOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleOrder::StrictOrder => "STRICT_ORDER",
            RuleOrder::DefaultActionOrder => "DEFAULT_ACTION_ORDER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "STRICT_ORDER" | "STRICT" => Some(RuleOrder::StrictOrder),
            "DEFAULT_ACTION_ORDER" | "DEFAULT" => Some(RuleOrder::DefaultActionOrder),
            _ => None,
        }
    }
}

/// 送信元/宛先アドレス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Address {
    Any,
    /// Suricata 変数（`$HOME_NET` など、`$` を除いた名前）
    Variable(String),
    Cidr(Ipv4Network),
}

impl Address {
    pub fn parse(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("any") {
            return Ok(Address::Any);
        }
        if let Some(name) = s.strip_prefix('$') {
            let valid = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
            if !valid {
                return Err(SpecError::InvalidConfig(format!("無効な変数名: {}", s)));
            }
            return Ok(Address::Variable(name.to_string()));
        }
        s.parse::<Ipv4Network>()
            .map(Address::Cidr)
            .map_err(|_| SpecError::InvalidCidr(s.to_string()))
    }

    pub fn home_net() -> Self {
        Address::Variable("HOME_NET".to_string())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Any => write!(f, "ANY"),
            Address::Variable(name) => write!(f, "${}", name),
            Address::Cidr(net) => write!(f, "{}", net),
        }
    }
}

impl TryFrom<String> for Address {
    type Error = SpecError;

    fn try_from(value: String) -> Result<Self> {
        Address::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

/// ポート指定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PortSpec {
    #[default]
    Any,
    Single(u16),
    /// `lo:hi`（両端を含む）
    Range(u16, u16),
}

impl PortSpec {
    pub fn parse(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("any") {
            return Ok(PortSpec::Any);
        }
        let invalid = || SpecError::InvalidConfig(format!("無効なポート指定: {}", s));
        match s.split_once(':') {
            Some((lo, hi)) => {
                let lo: u16 = lo.trim().parse().map_err(|_| invalid())?;
                let hi: u16 = hi.trim().parse().map_err(|_| invalid())?;
                if lo > hi {
                    return Err(invalid());
                }
                Ok(PortSpec::Range(lo, hi))
            }
            None => s.trim().parse().map(PortSpec::Single).map_err(|_| invalid()),
        }
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortSpec::Any => write!(f, "ANY"),
            PortSpec::Single(p) => write!(f, "{}", p),
            PortSpec::Range(lo, hi) => write!(f, "{}:{}", lo, hi),
        }
    }
}

impl TryFrom<String> for PortSpec {
    type Error = SpecError;

    fn try_from(value: String) -> Result<Self> {
        PortSpec::parse(&value)
    }
}

impl From<PortSpec> for String {
    fn from(value: PortSpec) -> Self {
        value.to_string()
    }
}

/// ステートフルルール（5-tuple + メタデータ）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatefulRuleSpec {
    pub action: RuleAction,
    pub protocol: RuleProtocol,
    pub source: Address,
    pub source_port: PortSpec,
    pub destination: Address,
    pub destination_port: PortSpec,
    pub direction: Direction,

    /// msg オプション
    pub msg: String,

    /// シグネチャID
    pub sid: u64,

    /// リビジョン
    pub rev: u32,
}

impl Default for StatefulRuleSpec {
    /// `$HOME_NET` から任意の宛先への IP 通信を許可するルール
    fn default() -> Self {
        Self {
            action: RuleAction::Pass,
            protocol: RuleProtocol::Ip,
            source: Address::home_net(),
            source_port: PortSpec::Any,
            destination: Address::Cidr(ANY_IPV4),
            destination_port: PortSpec::Any,
            direction: Direction::Forward,
            msg: "HOME_NET pass".to_string(),
            sid: 1_000_001,
            rev: 1,
        }
    }
}

impl StatefulRuleSpec {
    /// Suricata のルールオプション（msg, sid, rev の順）
    pub fn rule_options(&self) -> Vec<String> {
        vec![
            format!("msg:\"{}\"", self.msg),
            format!("sid:{}", self.sid),
            format!("rev:{}", self.rev),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| SpecError::InvalidRule {
            sid: self.sid,
            message: message.to_string(),
        };
        if self.sid == 0 {
            return Err(invalid("sid は 1 以上である必要があります"));
        }
        if self.rev == 0 {
            return Err(invalid("rev は 1 以上である必要があります"));
        }
        if self.msg.is_empty() {
            return Err(invalid("msg が空です"));
        }
        if self.msg.contains('"') || self.msg.contains(';') {
            return Err(invalid("msg に '\"' や ';' は使用できません"));
        }
        Ok(())
    }
}

/// ステートフルルールグループ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroupSpec {
    pub name: String,
    pub capacity: u32,
    pub rule_order: RuleOrder,
    pub rules: Vec<StatefulRuleSpec>,
}

impl Default for RuleGroupSpec {
    fn default() -> Self {
        Self {
            name: "network-firewall-rule-group-5-tuple".to_string(),
            capacity: 100,
            rule_order: RuleOrder::StrictOrder,
            rules: vec![StatefulRuleSpec::default()],
        }
    }
}

impl RuleGroupSpec {
    /// 名前を指定して、ルールなしのグループを作成
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_resource_name("rule-group", &self.name)?;
        if self.capacity == 0 || self.capacity > MAX_RULE_GROUP_CAPACITY {
            return Err(SpecError::InvalidConfig(format!(
                "rule-group '{}': capacity は 1〜{} である必要があります (指定値: {})",
                self.name, MAX_RULE_GROUP_CAPACITY, self.capacity
            )));
        }
        if self.rules.is_empty() {
            return Err(SpecError::InvalidConfig(format!(
                "rule-group '{}' にルールがありません",
                self.name
            )));
        }
        if self.rules.len() > self.capacity as usize {
            return Err(SpecError::InvalidConfig(format!(
                "rule-group '{}': ルール数 {} が capacity {} を超えています",
                self.name,
                self.rules.len(),
                self.capacity
            )));
        }

        let mut sids = HashSet::new();
        for rule in &self.rules {
            rule.validate()?;
            if !sids.insert(rule.sid) {
                return Err(SpecError::Duplicate(format!("sid {}", rule.sid)));
            }
        }
        Ok(())
    }
}

/// ファイアウォール設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallSpec {
    pub name: String,

    /// エンドポイントを配置するサブネットグループ
    pub subnet_group: String,

    /// ファイアウォール経由に切り替えるサブネットグループ
    pub egress_subnet_group: String,

    /// ALERT ログの保持期間（日）
    pub log_retention_days: u32,

    pub delete_protection: bool,
    pub subnet_change_protection: bool,

    /// ポリシーから参照するルールグループ（宣言順に priority 1, 2, ...）
    pub rule_groups: Vec<RuleGroupSpec>,
}

impl Default for FirewallSpec {
    fn default() -> Self {
        Self {
            name: "network-firewall".to_string(),
            subnet_group: "Firewall".to_string(),
            egress_subnet_group: "Egress".to_string(),
            log_retention_days: 7,
            delete_protection: false,
            subnet_change_protection: false,
            rule_groups: vec![RuleGroupSpec::default()],
        }
    }
}

impl FirewallSpec {
    pub fn validate(&self) -> Result<()> {
        validate_resource_name("firewall", &self.name)?;
        if !LOG_RETENTION_DAYS.contains(&self.log_retention_days) {
            return Err(SpecError::InvalidConfig(format!(
                "log-retention-days {} は指定できません (指定可能: {:?})",
                self.log_retention_days, LOG_RETENTION_DAYS
            )));
        }
        if self.rule_groups.is_empty() {
            return Err(SpecError::InvalidConfig(
                "firewall に rule-group がありません".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for group in &self.rule_groups {
            group.validate()?;
            if !names.insert(group.name.as_str()) {
                return Err(SpecError::Duplicate(format!("rule-group {}", group.name)));
            }
        }
        Ok(())
    }
}

/// Network Firewall のリソース名（英数字とハイフン、1〜128文字）
fn validate_resource_name(kind: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 128
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !valid {
        return Err(SpecError::InvalidConfig(format!(
            "{} の名前が無効です: '{}'",
            kind, name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rule_matches_home_net_pass() {
        let rule = StatefulRuleSpec::default();
        assert_eq!(rule.action, RuleAction::Pass);
        assert_eq!(rule.protocol, RuleProtocol::Ip);
        assert_eq!(rule.source.to_string(), "$HOME_NET");
        assert_eq!(rule.destination.to_string(), "0.0.0.0/0");
        assert_eq!(rule.source_port.to_string(), "ANY");
        assert_eq!(rule.direction.as_str(), "FORWARD");
        assert_eq!(
            rule.rule_options(),
            vec!["msg:\"HOME_NET pass\"", "sid:1000001", "rev:1"]
        );
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn test_address_parse() {
        assert_eq!(Address::parse("any").unwrap(), Address::Any);
        assert_eq!(
            Address::parse("$EXTERNAL_NET").unwrap(),
            Address::Variable("EXTERNAL_NET".to_string())
        );
        assert_eq!(
            Address::parse("10.0.0.0/16").unwrap().to_string(),
            "10.0.0.0/16"
        );
        assert!(Address::parse("$home").is_err());
        assert!(matches!(
            Address::parse("10.0.0.0/33"),
            Err(SpecError::InvalidCidr(_))
        ));
    }

    #[test]
    fn test_port_parse() {
        assert_eq!(PortSpec::parse("ANY").unwrap(), PortSpec::Any);
        assert_eq!(PortSpec::parse("443").unwrap(), PortSpec::Single(443));
        assert_eq!(
            PortSpec::parse("1024:65535").unwrap(),
            PortSpec::Range(1024, 65535)
        );
        assert!(PortSpec::parse("80:22").is_err());
        assert!(PortSpec::parse("http").is_err());
        assert_eq!(PortSpec::Range(1, 2).to_string(), "1:2");
    }

    #[test]
    fn test_rule_validation() {
        let mut rule = StatefulRuleSpec::default();
        rule.sid = 0;
        assert!(rule.validate().is_err());

        let mut rule = StatefulRuleSpec::default();
        rule.msg = "bad\"quote".to_string();
        assert!(matches!(
            rule.validate(),
            Err(SpecError::InvalidRule { sid: 1_000_001, .. })
        ));
    }

    #[test]
    fn test_rule_group_duplicate_sid() {
        let mut group = RuleGroupSpec::default();
        group.rules.push(StatefulRuleSpec::default());
        assert!(matches!(group.validate(), Err(SpecError::Duplicate(_))));
    }

    #[test]
    fn test_rule_group_capacity_bounds() {
        let mut group = RuleGroupSpec::default();
        group.capacity = 0;
        assert!(group.validate().is_err());
        group.capacity = MAX_RULE_GROUP_CAPACITY + 1;
        assert!(group.validate().is_err());
        group.capacity = 100;
        assert!(group.validate().is_ok());
    }

    #[test]
    fn test_firewall_defaults() {
        let fw = FirewallSpec::default();
        assert_eq!(fw.name, "network-firewall");
        assert_eq!(fw.subnet_group, "Firewall");
        assert_eq!(fw.egress_subnet_group, "Egress");
        assert_eq!(fw.log_retention_days, 7);
        assert!(!fw.delete_protection);
        assert!(!fw.subnet_change_protection);
        assert_eq!(fw.rule_groups.len(), 1);
        assert!(fw.validate().is_ok());
    }

    #[test]
    fn test_firewall_invalid_retention() {
        let fw = FirewallSpec {
            log_retention_days: 8,
            ..Default::default()
        };
        assert!(fw.validate().is_err());
    }

    #[test]
    fn test_rule_serializes_with_strings() {
        let json = serde_json::to_value(StatefulRuleSpec::default()).unwrap();
        assert_eq!(json["source"], "$HOME_NET");
        assert_eq!(json["destination_port"], "ANY");
        assert_eq!(json["action"], "PASS");
    }
}
