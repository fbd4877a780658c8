// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel normalizer: adapts one channel-specific payload into the
//! canonical message shape.
//!
//! Pure: no storage writes. Channel payloads are a tagged sum type
//! dispatched by exhaustive matching; fields the canonical model has no
//! slot for are preserved verbatim in `channel_metadata`, never dropped.
//! Email bodies stay raw HTML here -- cleaning is a presentation concern.

use serde::Deserialize;
use serde_json::{Map, Value};

use triage_core::{Channel, Direction, Sender, TriageError, now_iso};

/// Channel tags the normalizer understands.
const KNOWN_CHANNELS: [&str; 6] = [
    "contact_form",
    "quote_form",
    "email",
    "phone",
    "whatsapp",
    "manual",
];

/// One channel-specific payload, tagged by its `channel` field.
///
/// Each variant carries that channel's required-field set; everything the
/// schema does not name lands in `extra` via serde's flatten capture.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum ChannelPayload {
    ContactForm {
        name: String,
        email: String,
        #[serde(default)]
        phone: Option<String>,
        #[serde(default)]
        company: Option<String>,
        message: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    QuoteForm {
        name: String,
        email: String,
        #[serde(default)]
        phone: Option<String>,
        #[serde(default)]
        company: Option<String>,
        #[serde(default)]
        project_type: Option<String>,
        details: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    Email {
        from_address: String,
        #[serde(default)]
        from_name: Option<String>,
        #[serde(default)]
        subject: Option<String>,
        /// Raw HTML as received; stored unmodified for audit/reprocessing.
        body_html: String,
        #[serde(default)]
        thread_id: Option<String>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    Phone {
        #[serde(default)]
        caller_name: Option<String>,
        phone_number: String,
        notes: String,
        #[serde(default)]
        duration_secs: Option<i64>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    Whatsapp {
        phone_number: String,
        #[serde(default)]
        profile_name: Option<String>,
        text: String,
        #[serde(default)]
        wa_message_id: Option<String>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    Manual {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        phone: Option<String>,
        #[serde(default)]
        company: Option<String>,
        #[serde(default)]
        subject: Option<String>,
        note: String,
        /// Manually logged entries can record either side of the exchange.
        #[serde(default)]
        direction: Direction,
        #[serde(default)]
        agent_id: Option<String>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
}

/// A normalized message, not yet resolved to a conversation.
///
/// The aggregator assigns the owning conversation at ingestion.
#[derive(Debug, Clone)]
pub struct NormalizedMessage {
    pub id: String,
    pub channel: Channel,
    pub direction: Direction,
    pub body: String,
    pub sender: Sender,
    pub channel_metadata: Map<String, Value>,
    /// Short human label for a conversation seeded from this message.
    pub subject: String,
    /// Channel-supplied thread identifier, when the channel has one.
    pub thread_id: Option<String>,
    pub created_at: String,
}

/// Normalize a raw JSON payload into the canonical message shape.
///
/// Rejects unknown channel tags with `UnsupportedChannel` and schema or
/// identity violations with `Validation`.
pub fn normalize(payload: Value) -> Result<NormalizedMessage, TriageError> {
    let tag = payload
        .get("channel")
        .and_then(Value::as_str)
        .ok_or_else(|| TriageError::Validation("payload is missing the channel tag".into()))?;
    if !KNOWN_CHANNELS.contains(&tag) {
        return Err(TriageError::UnsupportedChannel(tag.to_string()));
    }
    let payload: ChannelPayload = serde_json::from_value(payload)
        .map_err(|e| TriageError::Validation(e.to_string()))?;
    normalize_payload(payload)
}

/// Normalize an already-typed channel payload.
pub fn normalize_payload(payload: ChannelPayload) -> Result<NormalizedMessage, TriageError> {
    let id = uuid::Uuid::new_v4().to_string();
    let created_at = now_iso();

    match payload {
        ChannelPayload::ContactForm {
            name,
            email,
            phone,
            company,
            message,
            extra,
        } => {
            require_nonempty("name", &name)?;
            require_email("email", &email)?;
            require_nonempty("message", &message)?;
            Ok(NormalizedMessage {
                id,
                channel: Channel::ContactForm,
                direction: Direction::Inbound,
                body: message,
                subject: format!("Contact form from {name}"),
                sender: Sender {
                    name: Some(name),
                    email: Some(email),
                    phone,
                    company,
                },
                channel_metadata: metadata(extra, []),
                thread_id: None,
                created_at,
            })
        }
        ChannelPayload::QuoteForm {
            name,
            email,
            phone,
            company,
            project_type,
            details,
            extra,
        } => {
            require_nonempty("name", &name)?;
            require_email("email", &email)?;
            require_nonempty("details", &details)?;
            let subject = match &project_type {
                Some(kind) => format!("Quote request ({kind}) from {name}"),
                None => format!("Quote request from {name}"),
            };
            Ok(NormalizedMessage {
                id,
                channel: Channel::QuoteForm,
                direction: Direction::Inbound,
                body: details,
                subject,
                sender: Sender {
                    name: Some(name),
                    email: Some(email),
                    phone,
                    company,
                },
                channel_metadata: metadata(
                    extra,
                    [("project_type", project_type.map(Value::from))],
                ),
                thread_id: None,
                created_at,
            })
        }
        ChannelPayload::Email {
            from_address,
            from_name,
            subject,
            body_html,
            thread_id,
            extra,
        } => {
            require_email("from_address", &from_address)?;
            Ok(NormalizedMessage {
                id,
                channel: Channel::Email,
                direction: Direction::Inbound,
                body: body_html,
                subject: subject
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| "(no subject)".to_string()),
                sender: Sender {
                    name: from_name,
                    email: Some(from_address),
                    phone: None,
                    company: None,
                },
                channel_metadata: metadata(
                    extra,
                    [("thread_id", thread_id.clone().map(Value::from))],
                ),
                thread_id,
                created_at,
            })
        }
        ChannelPayload::Phone {
            caller_name,
            phone_number,
            notes,
            duration_secs,
            extra,
        } => {
            require_nonempty("phone_number", &phone_number)?;
            let label = caller_name.clone().unwrap_or_else(|| phone_number.clone());
            Ok(NormalizedMessage {
                id,
                channel: Channel::Phone,
                direction: Direction::Inbound,
                body: notes,
                subject: format!("Phone call from {label}"),
                sender: Sender {
                    name: caller_name,
                    email: None,
                    phone: Some(phone_number),
                    company: None,
                },
                channel_metadata: metadata(
                    extra,
                    [("duration_secs", duration_secs.map(Value::from))],
                ),
                thread_id: None,
                created_at,
            })
        }
        ChannelPayload::Whatsapp {
            phone_number,
            profile_name,
            text,
            wa_message_id,
            extra,
        } => {
            require_nonempty("phone_number", &phone_number)?;
            let label = profile_name.clone().unwrap_or_else(|| phone_number.clone());
            Ok(NormalizedMessage {
                id,
                channel: Channel::Whatsapp,
                direction: Direction::Inbound,
                body: text,
                subject: format!("WhatsApp from {label}"),
                sender: Sender {
                    name: profile_name,
                    email: None,
                    phone: Some(phone_number),
                    company: None,
                },
                channel_metadata: metadata(
                    extra,
                    [("wa_message_id", wa_message_id.map(Value::from))],
                ),
                thread_id: None,
                created_at,
            })
        }
        ChannelPayload::Manual {
            name,
            email,
            phone,
            company,
            subject,
            note,
            direction,
            agent_id,
            extra,
        } => {
            require_nonempty("note", &note)?;
            Ok(NormalizedMessage {
                id,
                channel: Channel::Manual,
                direction,
                body: note,
                subject: subject
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| "Manual note".to_string()),
                sender: Sender {
                    name,
                    email,
                    phone,
                    company,
                },
                channel_metadata: metadata(extra, [("agent_id", agent_id.map(Value::from))]),
                thread_id: None,
                created_at,
            })
        }
    }
}

/// Build the metadata map: flattened extras (minus the tag key serde may
/// leave behind) plus named channel-specific fields.
fn metadata<const N: usize>(
    mut extra: Map<String, Value>,
    named: [(&str, Option<Value>); N],
) -> Map<String, Value> {
    extra.remove("channel");
    for (key, value) in named {
        if let Some(value) = value {
            extra.insert(key.to_string(), value);
        }
    }
    extra
}

fn require_nonempty(field: &str, value: &str) -> Result<(), TriageError> {
    if value.trim().is_empty() {
        return Err(TriageError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn require_email(field: &str, value: &str) -> Result<(), TriageError> {
    require_nonempty(field, value)?;
    if !value.contains('@') {
        return Err(TriageError::Validation(format!(
            "{field} `{value}` is not an email address"
        )));
    }
    Ok(())
}
