//! Optional rewording of messages by an external generator, with a cache.
//!
//! The policy is chosen per rule (or command, or session note):
//! - `off`: the message is returned as written.
//! - `once`: rephrased the first time, then served from the cache forever.
//! - `session`: like `once`, but the cache entry expires after a day and is
//!   dropped at the next session start.
//! - `always`: rephrased on every call; the result is still cached as a
//!   session entry.
//!
//! Rephrasing is best effort: generator and cache failures are logged and the
//! original message is returned.

use std::cell::Cell;
use std::rc::Rc;

use bon::Builder;
use chrono::{DateTime, Duration, Utc};
use color_eyre::eyre::Result;
use derive_more::Display;
use indoc::formatdoc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::storage::{CacheEntry, Storage};

/// How long a session-scoped cache entry lives, in hours.
pub const SESSION_TTL_HOURS: i64 = 24;

/// The rephrase policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerateMode {
    #[default]
    #[serde(alias = "")]
    #[display("off")]
    Off,

    #[display("once")]
    Once,

    #[display("session")]
    Session,

    #[display("always")]
    Always,
}

/// The `generate` setting of a rule, command, or session note.
///
/// Accepts either a bare mode (`generate: once`) or a record
/// (`generate: {mode: once, prompt: "..."}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "GenerateSetting")]
pub struct Generate {
    pub mode: GenerateMode,

    /// Custom instructions for the generator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GenerateSetting {
    Mode(GenerateMode),
    Record {
        #[serde(default)]
        mode: GenerateMode,
        #[serde(default)]
        prompt: Option<String>,
    },
}

impl From<GenerateSetting> for Generate {
    fn from(setting: GenerateSetting) -> Self {
        match setting {
            GenerateSetting::Mode(mode) => Generate { mode, prompt: None },
            GenerateSetting::Record { mode, prompt } => Generate { mode, prompt },
        }
    }
}

impl From<GenerateMode> for Generate {
    fn from(mode: GenerateMode) -> Self {
        Generate { mode, prompt: None }
    }
}

/// A message to rephrase.
#[derive(Debug, Clone, Builder)]
pub struct GenerateRequest<'a> {
    pub original_message: &'a str,

    #[builder(default)]
    pub custom_prompt: &'a str,

    /// The pattern of the rule that produced the message; part of the cache key.
    #[builder(default)]
    pub pattern: &'a str,

    pub mode: GenerateMode,
}

impl<'a> GenerateRequest<'a> {
    /// Build a request from a `generate` setting.
    pub fn from_setting(original_message: &'a str, pattern: &'a str, setting: &'a Generate) -> Self {
        GenerateRequest {
            original_message,
            custom_prompt: setting.prompt.as_deref().unwrap_or_default(),
            pattern,
            mode: setting.mode,
        }
    }

    /// The cache key for this request.
    pub fn fingerprint(&self) -> String {
        fingerprint(self.original_message, self.custom_prompt, self.pattern)
    }
}

/// Produces text from a prompt.
pub trait Generator {
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Hex SHA-256 over the message, prompt, and pattern.
///
/// Each part is length-prefixed so that moving text between parts changes the
/// fingerprint.
pub fn fingerprint(original_message: &str, custom_prompt: &str, pattern: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [original_message, custom_prompt, pattern] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// The prompt sent to the generator.
pub fn compose_prompt(original_message: &str, custom_prompt: &str) -> String {
    if custom_prompt.trim().is_empty() {
        formatdoc! {"
            Rephrase the following guidance for an AI coding assistant. Keep every
            instruction, command, and file path it contains, and keep it about as
            short as it is now.

            Reply with only the rephrased message. Do not add any preamble or
            commentary such as \"Here's the message:\", do not wrap it in quotes,
            and do not explain what you changed. Answer within 10 seconds.

            Message: {original_message}"}
    } else {
        format!("{custom_prompt}\n\n---\nMessage: {original_message}")
    }
}

/// Applies rephrase policies using a generator and an optional cache.
pub struct Rephraser<'a> {
    generator: &'a dyn Generator,
    cache: Option<&'a Storage>,
    now: DateTime<Utc>,
    cache_warned: Rc<Cell<bool>>,
}

impl<'a> Rephraser<'a> {
    pub fn new(generator: &'a dyn Generator, cache: Option<&'a Storage>) -> Self {
        Self {
            generator,
            cache,
            now: Utc::now(),
            cache_warned: Rc::default(),
        }
    }

    /// Use a fixed clock instead of the current time.
    pub fn at(self, now: DateTime<Utc>) -> Self {
        Self { now, ..self }
    }

    /// Share the "cache failure already reported" flag with other rephrasers,
    /// so a broken cache is reported once per flag rather than once per
    /// rephraser.
    pub fn sharing_warnings(self, cache_warned: Rc<Cell<bool>>) -> Self {
        Self {
            cache_warned,
            ..self
        }
    }

    /// Whether a cache failure has been reported.
    pub fn cache_warned(&self) -> bool {
        self.cache_warned.get()
    }

    /// Apply the request's policy, returning the message to send.
    #[tracing::instrument(skip(self, request), fields(mode = %request.mode))]
    pub fn rephrase(&self, request: &GenerateRequest<'_>) -> String {
        if request.original_message.is_empty() {
            return String::new();
        }

        let fingerprint = request.fingerprint();
        match request.mode {
            GenerateMode::Off => request.original_message.to_string(),
            GenerateMode::Once | GenerateMode::Session => {
                if let Some(cached) = self.cached(&fingerprint) {
                    tracing::debug!(%fingerprint, "serving rephrase from cache");
                    return cached;
                }
                self.generate_and_store(request, &fingerprint)
            }
            GenerateMode::Always => self.generate_and_store(request, &fingerprint),
        }
    }

    fn cached(&self, fingerprint: &str) -> Option<String> {
        let cache = self.cache?;
        match cache.cache_entry(fingerprint) {
            Ok(entry) => entry
                .filter(|entry| !entry.is_expired(self.now))
                .map(|entry| entry.generated_message),
            Err(error) => {
                self.cache_failed(&error);
                None
            }
        }
    }

    fn generate_and_store(&self, request: &GenerateRequest<'_>, fingerprint: &str) -> String {
        let prompt = compose_prompt(request.original_message, request.custom_prompt);
        let generated = match self.generator.generate(&prompt) {
            Ok(generated) if !generated.trim().is_empty() => generated.trim().to_string(),
            Ok(_) => {
                tracing::warn!("generator returned an empty message; using the original");
                return request.original_message.to_string();
            }
            Err(error) => {
                tracing::warn!(?error, "rephrase failed; using the original message");
                return request.original_message.to_string();
            }
        };

        if let Some(cache) = self.cache {
            let expires_at = match request.mode {
                GenerateMode::Once => None,
                _ => Some(self.now + Duration::hours(SESSION_TTL_HOURS)),
            };
            let entry = CacheEntry {
                generated_message: generated.clone(),
                original_message: request.original_message.to_string(),
                timestamp: self.now,
                expires_at,
            };
            if let Err(error) = cache.put_cache_entry(fingerprint, &entry) {
                self.cache_failed(&error);
            }
        }

        generated
    }

    fn cache_failed(&self, error: &color_eyre::Report) {
        if !self.cache_warned.replace(true) {
            tracing::warn!(?error, "rephrase cache unavailable; bypassing it");
        }
    }
}
