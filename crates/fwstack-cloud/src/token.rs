//! CloudFormation intrinsic tokens
//!
//! Values that are only known at deploy time (ARNs, IDs, endpoint lists) are
//! expressed as intrinsic functions and resolved by CloudFormation.

use serde::{Serialize, Serializer};
use serde_json::{Value, json};

/// A deploy-time value
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Plain JSON value
    Literal(Value),
    /// `{"Ref": id}`
    Ref(String),
    /// `{"Fn::GetAtt": [id, attribute]}`
    GetAtt { logical_id: String, attribute: String },
    /// `{"Fn::Select": [index, list]}`
    Select { index: usize, list: Box<Token> },
    /// `{"Fn::Split": [delimiter, source]}`
    Split { delimiter: String, source: Box<Token> },
}

impl Token {
    pub fn literal(value: impl Into<Value>) -> Self {
        Token::Literal(value.into())
    }

    pub fn select(index: usize, list: Token) -> Self {
        Token::Select {
            index,
            list: Box::new(list),
        }
    }

    pub fn split(delimiter: impl Into<String>, source: Token) -> Self {
        Token::Split {
            delimiter: delimiter.into(),
            source: Box::new(source),
        }
    }

    /// Render the token as CloudFormation JSON
    pub fn to_value(&self) -> Value {
        match self {
            Token::Literal(v) => v.clone(),
            Token::Ref(id) => json!({ "Ref": id }),
            Token::GetAtt {
                logical_id,
                attribute,
            } => json!({ "Fn::GetAtt": [logical_id, attribute] }),
            Token::Select { index, list } => json!({ "Fn::Select": [index, list.to_value()] }),
            Token::Split { delimiter, source } => {
                json!({ "Fn::Split": [delimiter, source.to_value()] })
            }
        }
    }
}

impl From<Token> for Value {
    fn from(token: Token) -> Self {
        token.to_value()
    }
}

impl From<&Token> for Value {
    fn from(token: &Token) -> Self {
        token.to_value()
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Collect every logical ID referenced by `Ref` or `Fn::GetAtt` in `value`
///
/// Pseudo parameters (`AWS::Region`, ...) are not reported.
pub fn references(value: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect_references(value, &mut found);
    found
}

fn collect_references(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(id)) = map.get("Ref") {
                    if !id.starts_with("AWS::") {
                        found.push(id.clone());
                    }
                    return;
                }
                if let Some(Value::Array(args)) = map.get("Fn::GetAtt")
                    && let Some(Value::String(id)) = args.first()
                {
                    found.push(id.clone());
                    return;
                }
            }
            for v in map.values() {
                collect_references(v, found);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_references(v, found);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_extraction_shape() {
        let endpoints = Token::GetAtt {
            logical_id: "Fw".to_string(),
            attribute: "EndpointIds".to_string(),
        };
        let token = Token::select(1, Token::split(":", Token::select(0, endpoints)));
        assert_eq!(
            token.to_value(),
            json!({
                "Fn::Select": [1, {
                    "Fn::Split": [":", {
                        "Fn::Select": [0, { "Fn::GetAtt": ["Fw", "EndpointIds"] }]
                    }]
                }]
            })
        );
    }

    #[test]
    fn test_references_walks_nested_values() {
        let value = json!({
            "VpcId": { "Ref": "Vpc" },
            "Mappings": [{ "SubnetId": { "Ref": "Subnet1" } }],
            "Region": { "Ref": "AWS::Region" },
            "Arn": { "Fn::Select": [0, { "Fn::GetAtt": ["Policy", "FirewallPolicyArn"] }] }
        });
        let refs = references(&value);
        assert_eq!(refs, vec!["Vpc", "Subnet1", "Policy"]);
    }

    #[test]
    fn test_token_serializes_as_intrinsic() {
        let s = serde_json::to_string(&Token::Ref("LogGroup".to_string())).unwrap();
        assert_eq!(s, r#"{"Ref":"LogGroup"}"#);
    }
}
