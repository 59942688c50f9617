use serde::{Deserialize, Serialize};
use wingman_protocol::{PeerRef, RoutingSelector};

/// One entry of the `agents.bindings` config list. A binding matches a
/// request's routing when every field it specifies is `Some` and equal to
/// the corresponding field on the request; unspecified fields are wildcards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Binding {
    #[serde(rename = "match")]
    pub match_: BindingMatch,
    #[serde(rename = "agentId")]
    pub agent_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BindingMatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(rename = "accountId", skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(rename = "guildId", skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    #[serde(rename = "teamId", skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<PeerRef>,
}

impl BindingMatch {
    /// Whether every field this match specifies is equal to the
    /// corresponding field on `routing`. A binding with no fields set
    /// matches everything, so callers should treat an all-wildcard binding
    /// as a catch-all rather than "no match".
    #[must_use]
    pub fn matches(&self, routing: &RoutingSelector) -> bool {
        field_matches(&self.channel, &routing.channel)
            && field_matches(&self.account_id, &routing.account_id)
            && field_matches(&self.guild_id, &routing.guild_id)
            && field_matches(&self.team_id, &routing.team_id)
            && field_matches(&self.peer, &routing.peer)
    }
}

fn field_matches<T: PartialEq>(expected: &Option<T>, actual: &Option<T>) -> bool {
    match expected {
        None => true,
        Some(expected) => actual.as_ref() == Some(expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_match_accepts_any_routing() {
        let m = BindingMatch::default();
        assert!(m.matches(&RoutingSelector::default()));
        assert!(m.matches(&RoutingSelector {
            channel: Some("telegram".into()),
            ..Default::default()
        }));
    }

    #[test]
    fn specified_field_must_equal() {
        let m = BindingMatch {
            channel: Some("telegram".into()),
            ..Default::default()
        };
        assert!(!m.matches(&RoutingSelector::default()));
        assert!(m.matches(&RoutingSelector {
            channel: Some("telegram".into()),
            ..Default::default()
        }));
        assert!(!m.matches(&RoutingSelector {
            channel: Some("discord".into()),
            ..Default::default()
        }));
    }

    #[test]
    fn peer_match_compares_kind_and_id() {
        let m = BindingMatch {
            peer: Some(PeerRef {
                kind: "channel".into(),
                id: "C1".into(),
            }),
            ..Default::default()
        };
        assert!(m.matches(&RoutingSelector {
            peer: Some(PeerRef {
                kind: "channel".into(),
                id: "C1".into(),
            }),
            ..Default::default()
        }));
        assert!(!m.matches(&RoutingSelector {
            peer: Some(PeerRef {
                kind: "channel".into(),
                id: "C2".into(),
            }),
            ..Default::default()
        }));
    }
}
