use serde::{Deserialize, Serialize};

/// Out-of-band instruction posted to the agent.
///
/// Wire format is a JSON object tagged by `type`:
/// `{"type":"SKIP_WAITING"}` or `{"type":"GET_CACHE_INFO"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
    GetCacheInfo,
}

/// Reply to a control message that expects one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlReply {
    CacheInfo {
        #[serde(rename = "cacheNames")]
        cache_names: Vec<String>,
    },
}

impl ControlMessage {
    /// Whether the sender should wait for a reply.
    pub fn expects_reply(&self) -> bool {
        matches!(self, ControlMessage::GetCacheInfo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_control_messages() {
        let skip: ControlMessage = serde_json::from_str(r#"{"type":"SKIP_WAITING"}"#)
            .expect("Failed to parse SKIP_WAITING");
        assert_eq!(skip, ControlMessage::SkipWaiting);
        assert!(!skip.expects_reply());

        let info: ControlMessage = serde_json::from_str(r#"{"type":"GET_CACHE_INFO"}"#)
            .expect("Failed to parse GET_CACHE_INFO");
        assert_eq!(info, ControlMessage::GetCacheInfo);
        assert!(info.expects_reply());

        assert!(serde_json::from_str::<ControlMessage>(r#"{"type":"RELOAD"}"#).is_err());
    }

    #[test]
    fn test_cache_info_reply_wire_format() {
        let reply = ControlReply::CacheInfo {
            cache_names: vec![
                "kbs-calculator-static-v3".to_string(),
                "kbs-calculator-dynamic-v3".to_string(),
            ],
        };
        let json = serde_json::to_value(&reply).expect("Failed to serialize reply");
        assert_eq!(
            json,
            serde_json::json!({
                "type": "CACHE_INFO",
                "cacheNames": ["kbs-calculator-static-v3", "kbs-calculator-dynamic-v3"]
            })
        );
    }
}
