//! Delivery routing for agent responses and cron job outputs.
//!
//! Targets are symbolic (`origin`, `local`, `telegram`,
//! `discord:#alerts`); the router resolves them against the config's home
//! channels and the channel directory, de-duplicates, and fans content out
//! to adapters and the local file sink concurrently.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use dashmap::DashMap;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use hermes_core::{GatewayConfig, Platform, SessionSource};

use crate::adapter::PlatformAdapter;
use crate::directory::ChannelDirectory;
use crate::error::{ChannelError, Result};
use crate::extract::{extract_documents, extract_images};
use crate::trust::ensure_trusted;

/// A resolved delivery destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryTarget {
    pub platform: Platform,
    /// `None` only for `local` (and unresolved bare platforms).
    pub chat_id: Option<String>,
    pub is_origin: bool,
    /// True when the chat was named explicitly in the spec string.
    pub is_explicit: bool,
}

impl DeliveryTarget {
    pub fn local() -> Self {
        Self {
            platform: Platform::Local,
            chat_id: None,
            is_origin: false,
            is_explicit: false,
        }
    }

    /// Parse one target spec.
    ///
    /// Grammar: `origin` | `local` | `<platform>` | `<platform>:<chat>`.
    /// `origin` degrades to `local` when the origin is unknown. An unknown
    /// platform name is an [`ChannelError::Unresolved`] error.
    pub fn parse(spec: &str, origin: Option<&SessionSource>) -> Result<Self> {
        let spec = spec.trim().to_lowercase();

        if spec == "origin" {
            return Ok(match origin {
                Some(src) => Self {
                    platform: src.platform,
                    chat_id: Some(src.chat_id.clone()),
                    is_origin: true,
                    is_explicit: false,
                },
                None => Self {
                    platform: Platform::Local,
                    chat_id: None,
                    is_origin: true,
                    is_explicit: false,
                },
            });
        }
        if spec == "local" {
            return Ok(Self::local());
        }

        if let Some((platform_str, chat)) = spec.split_once(':') {
            let platform: Platform = platform_str
                .parse()
                .map_err(|e: String| ChannelError::Unresolved(e))?;
            return Ok(Self {
                platform,
                chat_id: Some(chat.trim().to_string()),
                is_origin: false,
                is_explicit: true,
            });
        }

        let platform: Platform = spec
            .parse()
            .map_err(|e: String| ChannelError::Unresolved(e))?;
        Ok(Self {
            platform,
            chat_id: None,
            is_origin: false,
            is_explicit: false,
        })
    }
}

impl fmt::Display for DeliveryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_origin {
            return f.write_str("origin");
        }
        if self.platform == Platform::Local {
            return f.write_str("local");
        }
        match &self.chat_id {
            Some(chat) => write!(f, "{}:{}", self.platform, chat),
            None => write!(f, "{}", self.platform),
        }
    }
}

/// Content ready for delivery: cleaned text plus extracted attachments.
#[derive(Debug, Clone, Default)]
pub struct OutboundPayload {
    pub text: String,
    /// `(url, caption)` pairs, in source order.
    pub images: Vec<(String, String)>,
    /// `(path, caption)` pairs, in source order.
    pub documents: Vec<(String, String)>,
}

impl OutboundPayload {
    /// Split raw agent output into text, images, and documents.
    pub fn from_response(content: &str) -> Self {
        let (images, remainder) = extract_images(content);
        let (documents, text) = extract_documents(&remainder);
        Self {
            text,
            images,
            documents,
        }
    }

    pub fn text_only(content: impl Into<String>) -> Self {
        Self {
            text: content.into(),
            images: Vec::new(),
            documents: Vec::new(),
        }
    }
}

/// Per-target delivery outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
    /// Attachment failures that did not prevent the text send.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachment_errors: Vec<String>,
}

/// Context attached to a delivery (cron job identity, extra header fields
/// for the local sink).
#[derive(Debug, Clone, Default)]
pub struct DeliveryMeta {
    pub job_id: Option<String>,
    pub job_name: Option<String>,
    pub metadata: Vec<(String, String)>,
}

/// Routes content to adapters and the local sink.
pub struct DeliveryRouter {
    config: Arc<GatewayConfig>,
    adapters: Arc<DashMap<Platform, Arc<dyn PlatformAdapter>>>,
    directory: Arc<ChannelDirectory>,
}

impl DeliveryRouter {
    pub fn new(
        config: Arc<GatewayConfig>,
        adapters: Arc<DashMap<Platform, Arc<dyn PlatformAdapter>>>,
        directory: Arc<ChannelDirectory>,
    ) -> Self {
        Self {
            config,
            adapters,
            directory,
        }
    }

    /// Resolve a delivery specification to concrete targets.
    ///
    /// Unresolvable specs are dropped with a logged error; the rest of the
    /// list is unaffected. Deterministic for a fixed config and directory
    /// snapshot: same input, same output, in spec order.
    pub fn resolve_targets(
        &self,
        deliver: &[String],
        origin: Option<&SessionSource>,
    ) -> Vec<DeliveryTarget> {
        let mut targets = Vec::new();
        let mut seen: HashSet<(Platform, Option<String>)> = HashSet::new();

        for spec in deliver {
            let mut target = match DeliveryTarget::parse(spec, origin) {
                Ok(t) => t,
                Err(e) => {
                    warn!(spec = %spec, error = %e, "dropping unresolvable delivery target");
                    continue;
                }
            };

            if target.platform != Platform::Local {
                match target.chat_id.clone() {
                    None => {
                        // Bare platform → home channel, or drop.
                        match self.config.home_channel(target.platform) {
                            Some(home) => target.chat_id = Some(home.chat_id.clone()),
                            None => {
                                warn!(spec = %spec, platform = %target.platform,
                                      "no home channel configured, dropping target");
                                continue;
                            }
                        }
                    }
                    Some(chat) if !is_numeric_id(&chat) => {
                        match self.directory.resolve(target.platform, &chat) {
                            Some(id) => target.chat_id = Some(id),
                            None => {
                                warn!(spec = %spec, platform = %target.platform, chat = %chat,
                                      "channel name not found in directory, dropping target");
                                continue;
                            }
                        }
                    }
                    Some(_) => {}
                }
            }

            let key = (target.platform, target.chat_id.clone());
            if seen.insert(key) {
                targets.push(target);
            }
        }

        if self.config.always_log_local && !seen.contains(&(Platform::Local, None)) {
            targets.push(DeliveryTarget::local());
        }

        targets
    }

    /// Deliver `payload` to every target concurrently.
    ///
    /// One failing target never short-circuits the others; the returned
    /// map holds one [`DeliveryResult`] per target, keyed by the target's
    /// string form.
    pub async fn deliver(
        &self,
        payload: &OutboundPayload,
        targets: &[DeliveryTarget],
        meta: &DeliveryMeta,
    ) -> HashMap<String, DeliveryResult> {
        let sends = targets.iter().map(|target| async {
            let result = self.deliver_one(target, payload, meta).await;
            (target.to_string(), result)
        });
        join_all(sends).await.into_iter().collect()
    }

    async fn deliver_one(
        &self,
        target: &DeliveryTarget,
        payload: &OutboundPayload,
        meta: &DeliveryMeta,
    ) -> DeliveryResult {
        if target.platform == Platform::Local {
            return match self.write_local(payload, meta) {
                Ok(path) => DeliveryResult {
                    success: true,
                    message_id: Some(path.display().to_string()),
                    error: None,
                    attachment_errors: Vec::new(),
                },
                Err(e) => DeliveryResult {
                    success: false,
                    error: Some(e.to_string()),
                    ..Default::default()
                },
            };
        }

        let adapter = match self.adapters.get(&target.platform) {
            Some(entry) => Arc::clone(entry.value()),
            None => {
                return DeliveryResult {
                    success: false,
                    error: Some(format!("no adapter configured for {}", target.platform)),
                    ..Default::default()
                }
            }
        };
        let chat_id = match &target.chat_id {
            Some(id) => id.clone(),
            None => {
                return DeliveryResult {
                    success: false,
                    error: Some(format!("no chat id for {} delivery", target.platform)),
                    ..Default::default()
                }
            }
        };

        let mut result = DeliveryResult::default();
        if payload.text.is_empty() {
            result.success = true;
        } else {
            let sent = adapter.send_text(&chat_id, &payload.text, None, None).await;
            result.success = sent.success;
            result.message_id = sent.message_id;
            result.error = sent.error;
        }

        for (url, caption) in &payload.images {
            let caption = (!caption.is_empty()).then_some(caption.as_str());
            let sent = adapter.send_image(&chat_id, url, caption, None).await;
            if !sent.success {
                result
                    .attachment_errors
                    .push(sent.error.unwrap_or_else(|| format!("image send failed: {url}")));
            }
        }

        for (path, caption) in &payload.documents {
            let trusted = ensure_trusted(
                std::path::Path::new(path),
                &self.config.trusted_document_dirs,
            );
            let real = match trusted {
                Ok(real) => real,
                Err(e) => {
                    warn!(path = %path, error = %e, "document rejected, not sent");
                    result.attachment_errors.push(e.to_string());
                    continue;
                }
            };
            let caption = (!caption.is_empty()).then_some(caption.as_str());
            let sent = adapter.send_document(&chat_id, &real, caption).await;
            if !sent.success {
                result
                    .attachment_errors
                    .push(sent.error.unwrap_or_else(|| format!("document send failed: {path}")));
            }
        }

        result
    }

    /// Write the payload to the local sink:
    /// `<state>/cron/output/<job_id|misc>/<YYYYMMDD_HHMMSS>.md`.
    fn write_local(&self, payload: &OutboundPayload, meta: &DeliveryMeta) -> Result<PathBuf> {
        let now = Local::now();
        let stamp = now.format("%Y%m%d_%H%M%S").to_string();
        let subdir = meta.job_id.as_deref().unwrap_or("misc");
        let dir = self.config.cron_output_dir().join(subdir);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{stamp}.md"));

        let mut lines: Vec<String> = Vec::new();
        match &meta.job_name {
            Some(name) => lines.push(format!("# {name}")),
            None => lines.push("# Delivery Output".to_string()),
        }
        lines.push(String::new());
        lines.push(format!("**Timestamp:** {}", now.format("%Y-%m-%d %H:%M:%S")));
        if let Some(job_id) = &meta.job_id {
            lines.push(format!("**Job ID:** {job_id}"));
        }
        for (key, value) in &meta.metadata {
            lines.push(format!("**{key}:** {value}"));
        }
        lines.push(String::new());
        lines.push("---".to_string());
        lines.push(String::new());
        lines.push(payload.text.clone());

        std::fs::write(&path, lines.join("\n"))?;
        debug!(path = %path.display(), "delivery written to local sink");
        Ok(path)
    }
}

fn is_numeric_id(chat: &str) -> bool {
    let digits = chat.strip_prefix('-').unwrap_or(chat);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
