//! Extract the assistant's intent from a Claude Code transcript.
//!
//! The transcript is a JSONL log where each record has a `uuid`, an optional
//! `parentUuid`, and a `message` whose `content` is a list of typed items.
//! The intent of a tool call is the text of the assistant record the
//! `tool_use` record descends from.
//!
//! With a `tool_use_id` the log is scanned forward until the matching
//! `tool_use` item is found. Without one, the log is read backward in chunks
//! from the end so large transcripts are never loaded whole.
//!
//! Extraction is best effort: every failure yields an empty intent.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use serde::Deserialize;

use crate::rules::IntentSource;

/// Size of each chunk read when scanning backward.
const CHUNK_SIZE: u64 = 64 * 1024;

/// Lines examined from the end of the log before giving up.
const MAX_RECENT_LINES: usize = 5_000;

/// Assistant records followed through `parentUuid` while looking for text.
const MAX_CHAIN: usize = 16;

/// Resolve the intent for a tool call, or an empty string.
#[tracing::instrument]
pub fn extract_intent(path: &Path, tool_use_id: Option<&str>) -> String {
    let result = match tool_use_id.filter(|id| !id.is_empty()) {
        Some(id) => precise(path, id).and_then(|found| match found {
            Some(intent) => Ok(intent),
            None => {
                tracing::debug!(tool_use_id = id, "tool use not in transcript; using recency");
                recent(path)
            }
        }),
        None => recent(path),
    };

    match result {
        Ok(intent) => intent.trim().to_string(),
        Err(error) => {
            tracing::debug!(?error, "read intent from transcript");
            String::new()
        }
    }
}

/// Intent resolved on first use and remembered.
#[derive(Debug)]
pub struct LazyIntent<'a> {
    path: Option<&'a Path>,
    tool_use_id: Option<&'a str>,
    intent: OnceCell<String>,
}

impl<'a> LazyIntent<'a> {
    pub fn new(path: Option<&'a Path>, tool_use_id: Option<&'a str>) -> Self {
        Self {
            path,
            tool_use_id,
            intent: OnceCell::new(),
        }
    }
}

impl IntentSource for LazyIntent<'_> {
    fn intent(&self) -> &str {
        self.intent.get_or_init(|| match self.path {
            Some(path) => extract_intent(path, self.tool_use_id),
            None => String::new(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct Record {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(rename = "parentUuid", default)]
    parent_uuid: Option<String>,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Content {
    Text(String),
    Items(Vec<ContentItem>),
}

impl Default for Content {
    fn default() -> Self {
        Content::Items(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentItem {
    Text {
        #[serde(default)]
        text: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    ToolUse {
        #[serde(default)]
        id: String,
    },
    #[serde(other)]
    Other,
}

/// The parts of a record intent extraction needs.
///
/// Content is only read for assistant records.
#[derive(Debug, Default)]
struct Turn {
    assistant: bool,
    uuid: Option<String>,
    parent: Option<String>,
    text: String,
    thinking: String,
    tool_uses: Vec<String>,
}

impl Turn {
    /// Parse a log line; `None` for malformed lines.
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let record = match serde_json::from_str::<Record>(line) {
            Ok(record) => record,
            Err(error) => {
                tracing::trace!(%error, "skipping malformed transcript line");
                return None;
            }
        };
        let mut turn = Turn {
            assistant: record.kind == "assistant",
            uuid: record.uuid,
            parent: record.parent_uuid.filter(|parent| !parent.is_empty()),
            ..Turn::default()
        };
        if !turn.assistant {
            return Some(turn);
        }

        let mut texts = Vec::new();
        let mut thoughts = Vec::new();
        match record.message.map(|message| message.content) {
            Some(Content::Text(text)) => texts.push(text),
            Some(Content::Items(items)) => {
                for item in items {
                    match item {
                        ContentItem::Text { text } => texts.push(text),
                        ContentItem::Thinking { thinking } => thoughts.push(thinking),
                        ContentItem::ToolUse { id } => turn.tool_uses.push(id),
                        ContentItem::Other => {}
                    }
                }
            }
            None => {}
        }
        turn.text = join(texts);
        turn.thinking = join(thoughts);
        Some(turn)
    }

    fn has_tool_use(&self, id: &str) -> bool {
        self.tool_uses.iter().any(|candidate| candidate == id)
    }
}

fn join(parts: Vec<String>) -> String {
    parts
        .into_iter()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Scan forward for the record carrying `tool_use_id` and resolve its parent.
///
/// Returns `None` if the tool use is not in the log.
fn precise(path: &Path, tool_use_id: &str) -> Result<Option<String>> {
    let file = File::open(path).with_context(|| format!("open transcript: {path:?}"))?;
    let mut reader = BufReader::new(file);
    let mut turns = HashMap::<String, Turn>::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .with_context(|| format!("read transcript: {path:?}"))?;
        if read == 0 {
            return Ok(None);
        }

        let Some(turn) = Turn::parse(&String::from_utf8_lossy(&line)) else {
            continue;
        };
        if !turn.assistant {
            continue;
        }
        if turn.has_tool_use(tool_use_id) {
            let mut chain = Chain::default();
            let mut next = turn.parent.clone();
            while let Some(uuid) = next.take() {
                let Some(ancestor) = turns.get(&uuid) else {
                    break;
                };
                if chain.visit(ancestor) {
                    next = ancestor.parent.clone();
                }
            }
            return Ok(Some(chain.resolve(&turn)));
        }
        if let Some(uuid) = turn.uuid.clone() {
            turns.insert(uuid, turn);
        }
    }
}

/// Walk state while following `parentUuid` links.
#[derive(Debug, Default)]
struct Chain {
    steps: usize,
    text: Option<String>,
    thinking: Option<String>,
}

impl Chain {
    /// Record an ancestor; returns whether to keep walking.
    fn visit(&mut self, turn: &Turn) -> bool {
        self.steps += 1;
        if !turn.text.is_empty() {
            self.text = Some(turn.text.clone());
            return false;
        }
        if self.thinking.is_none() && !turn.thinking.is_empty() {
            self.thinking = Some(turn.thinking.clone());
        }
        self.steps < MAX_CHAIN
    }

    /// The intent found by the walk, falling back to the tool use record's
    /// own text and then to the first reasoning seen.
    fn resolve(self, tool_use: &Turn) -> String {
        self.text
            .or_else(|| Some(tool_use.text.clone()).filter(|text| !text.is_empty()))
            .or(self.thinking)
            .unwrap_or_default()
    }

    fn done(&self) -> bool {
        self.text.is_some() || self.steps >= MAX_CHAIN
    }
}

/// Resolve the intent of the most recent tool call by reading backward.
fn recent(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("open transcript: {path:?}"))?;
    let lines = ReverseLines::new(file).with_context(|| format!("read transcript: {path:?}"))?;

    let mut latest_texts = Vec::new();
    let mut tool_use: Option<Turn> = None;
    let mut wanted: Option<String> = None;
    let mut chain = Chain::default();

    for line in lines.take(MAX_RECENT_LINES) {
        let Some(turn) = Turn::parse(&line) else {
            continue;
        };

        if latest_texts.len() < 2 && !turn.text.is_empty() {
            latest_texts.push(turn.text.clone());
        }

        if tool_use.is_none() {
            if turn.assistant && !turn.tool_uses.is_empty() {
                wanted = turn.parent.clone();
                tool_use = Some(turn);
            }
        } else if wanted.is_some() && turn.uuid == wanted {
            // The walk stops at the first non-assistant ancestor.
            wanted = if turn.assistant && chain.visit(&turn) {
                turn.parent.clone()
            } else {
                None
            };
        }

        if tool_use.is_some() && (wanted.is_none() || chain.done()) {
            break;
        }
    }

    let intent = match &tool_use {
        Some(tool_use) => chain.resolve(tool_use),
        None => String::new(),
    };
    if !intent.is_empty() {
        return Ok(intent);
    }

    latest_texts.reverse();
    Ok(latest_texts.join("\n"))
}

/// Yields the lines of a file from last to first, reading fixed-size chunks
/// from the end.
struct ReverseLines {
    file: File,
    pos: u64,

    /// The start of a line whose beginning has not been read yet.
    partial: Vec<u8>,

    /// Complete lines from the current chunk, in file order.
    ready: Vec<Vec<u8>>,
}

impl ReverseLines {
    fn new(mut file: File) -> Result<Self> {
        let pos = file.seek(SeekFrom::End(0)).context("seek to end")?;
        Ok(Self {
            file,
            pos,
            partial: Vec::new(),
            ready: Vec::new(),
        })
    }

    fn read_chunk(&mut self) -> Result<()> {
        let size = CHUNK_SIZE.min(self.pos);
        self.pos -= size;
        self.file
            .seek(SeekFrom::Start(self.pos))
            .context("seek to chunk")?;

        let mut chunk = vec![0; size as usize];
        self.file.read_exact(&mut chunk).context("read chunk")?;
        chunk.append(&mut self.partial);

        let mut parts = chunk.split(|byte| *byte == b'\n');
        self.partial = parts.next().map(<[u8]>::to_vec).unwrap_or_default();
        self.ready = parts.map(<[u8]>::to_vec).collect();
        Ok(())
    }
}

impl Iterator for ReverseLines {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if let Some(line) = self.ready.pop() {
                return Some(String::from_utf8_lossy(&line).into_owned());
            }
            if self.pos == 0 {
                if self.partial.is_empty() {
                    return None;
                }
                let line = std::mem::take(&mut self.partial);
                return Some(String::from_utf8_lossy(&line).into_owned());
            }
            if let Err(error) = self.read_chunk() {
                tracing::debug!(?error, "stop reading transcript backward");
                return None;
            }
        }
    }
}
