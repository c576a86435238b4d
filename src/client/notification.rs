//! Notification targets shared by detectors, SLO alert rules and org tokens.
//!
//! Configuration spells them as comma separated strings, the API as tagged
//! objects:
//!
//! | string | object |
//! |---|---|
//! | `Email,ops@example.com` | `{"type": "Email", "email": ...}` |
//! | `PagerDuty,<credId>` | `{"type": "PagerDuty", "credentialId": ...}` |
//! | `Slack,<credId>,<channel>` | `{"type": "Slack", "credentialId": ..., "channel": ...}` |
//! | `Webhook,<credId>,<secret>,<url>` | `{"type": "Webhook", ...}` |
//! | `Team,<teamId>` | `{"type": "Team", "team": ...}` |
//! | `TeamEmail,<teamId>` | `{"type": "TeamEmail", "team": ...}` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// A notification target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Notification {
    /// Send an email.
    Email {
        /// Recipient address.
        email: String,
    },
    /// Trigger a PagerDuty incident.
    PagerDuty {
        /// PagerDuty integration id.
        credential_id: String,
    },
    /// Post to a Slack channel.
    Slack {
        /// Slack integration id.
        credential_id: String,
        /// Channel name without `#`.
        channel: String,
    },
    /// Call a webhook, either through an integration or a raw URL.
    Webhook {
        /// Webhook integration id.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        credential_id: Option<String>,
        /// Shared secret for a raw URL.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        secret: Option<String>,
        /// Raw URL.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    /// Notify a team.
    Team {
        /// Team id.
        team: String,
    },
    /// Email a team.
    TeamEmail {
        /// Team id.
        team: String,
    },
}

impl FromStr for Notification {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        let field = |i: usize| parts.get(i).map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
        let required = |i: usize, what: &str| {
            field(i).ok_or_else(|| {
                ProviderError::Validation(format!("notification {:?} is missing the {}", s, what))
            })
        };

        let notification = match parts[0].trim() {
            "Email" => Self::Email {
                email: required(1, "email address")?,
            },
            "PagerDuty" => Self::PagerDuty {
                credential_id: required(1, "credential id")?,
            },
            "Slack" => Self::Slack {
                credential_id: required(1, "credential id")?,
                channel: required(2, "channel")?,
            },
            "Webhook" => {
                let (credential_id, secret, url) = (field(1), field(2), field(3));
                if credential_id.is_none() && url.is_none() {
                    return Err(ProviderError::Validation(format!(
                        "notification {:?} needs a credential id or a url",
                        s
                    )));
                }
                Self::Webhook {
                    credential_id,
                    secret,
                    url,
                }
            },
            "Team" => Self::Team {
                team: required(1, "team id")?,
            },
            "TeamEmail" => Self::TeamEmail {
                team: required(1, "team id")?,
            },
            other => {
                return Err(ProviderError::Validation(format!(
                    "unknown notification type {:?}",
                    other
                )))
            },
        };
        Ok(notification)
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email { email } => write!(f, "Email,{}", email),
            Self::PagerDuty { credential_id } => write!(f, "PagerDuty,{}", credential_id),
            Self::Slack {
                credential_id,
                channel,
            } => write!(f, "Slack,{},{}", credential_id, channel),
            Self::Webhook {
                credential_id,
                secret,
                url,
            } => write!(
                f,
                "Webhook,{},{},{}",
                credential_id.as_deref().unwrap_or_default(),
                secret.as_deref().unwrap_or_default(),
                url.as_deref().unwrap_or_default()
            ),
            Self::Team { team } => write!(f, "Team,{}", team),
            Self::TeamEmail { team } => write!(f, "TeamEmail,{}", team),
        }
    }
}

impl Notification {
    /// Parse a list of notification strings.
    pub fn parse_all<S: AsRef<str>>(items: &[S]) -> Result<Vec<Self>, ProviderError> {
        items.iter().map(|s| s.as_ref().parse()).collect()
    }
}
