//! Rule compilation and matching.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use crate::template::{self, Variables};

use super::fields::default_fields;
use super::schema::{Rule, RuleEvent, Source};

/// Provides the assistant's intent text on demand.
///
/// Resolving intent means reading the transcript, so matchers only ask for it
/// when a rule actually selects `#intent`.
pub trait IntentSource {
    /// The intent text; empty when unavailable.
    fn intent(&self) -> &str;
}

impl IntentSource for str {
    fn intent(&self) -> &str {
        self
    }
}

impl IntentSource for String {
    fn intent(&self) -> &str {
        self
    }
}

/// A rule that matched, with the text that triggered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch<'m> {
    /// The rule that matched.
    pub rule: &'m Rule,

    /// The position of the rule in the authored rule list.
    pub index: usize,

    /// The full text of the selector value the pattern matched.
    pub matched_text: String,
}

/// A rule whose regexes failed to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRule {
    /// The position of the rule in the authored rule list.
    pub index: usize,

    /// The regex that failed to compile.
    pub regex: String,

    /// The compiler's error message.
    pub error: String,
}

/// Summary of compiling a rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    /// Number of rules that compiled.
    pub valid: usize,

    /// Rules that failed to compile.
    pub invalid: Vec<InvalidRule>,
}

impl Validation {
    /// Whether every rule compiled.
    pub fn is_ok(&self) -> bool {
        self.invalid.is_empty()
    }
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} valid rules", self.valid)?;
        if let Some(first) = self.invalid.first() {
            write!(
                f,
                ", {} invalid rule(s); first failure in rule {}: {:?}: {}",
                self.invalid.len(),
                first.index + 1,
                first.regex,
                first.error
            )?;
        }
        Ok(())
    }
}

/// The compiled form of a rule's pattern.
#[derive(Debug, Clone)]
enum Pattern {
    /// Compiled once, at construction.
    Static(Regex),

    /// Contains template syntax; rendered and compiled per call.
    Templated(String),
}

#[derive(Debug, Clone)]
struct CompiledRule {
    index: usize,
    rule: Rule,
    pattern: Pattern,
    tool: Option<Regex>,
}

/// Matches text against a rule set.
///
/// Rules are compiled at construction; rules whose regexes do not compile are
/// recorded and excluded from matching. Matching is deterministic: rules are
/// tried in authored order, then selectors in the order the rule lists them,
/// then default fields in table order.
#[derive(Debug)]
pub struct RuleMatcher {
    rules: Vec<CompiledRule>,
    invalid: Vec<InvalidRule>,

    /// Compiled templated patterns, keyed by rule index and rendered pattern.
    rendered: RefCell<HashMap<(usize, String), Regex>>,

    /// Unknown tools already reported, so each is logged once.
    reported_tools: RefCell<HashSet<String>>,
}

impl RuleMatcher {
    /// Compile the given rules.
    #[tracing::instrument(name = "RuleMatcher::new", skip_all, fields(rules = rules.len()))]
    pub fn new(rules: &[Rule]) -> Self {
        let mut compiled = Vec::new();
        let mut invalid = Vec::new();

        for (index, rule) in rules.iter().enumerate() {
            match compile(index, rule) {
                Ok(rule) => compiled.push(rule),
                Err(failure) => {
                    tracing::warn!(
                        index,
                        regex = %failure.regex,
                        error = %failure.error,
                        "skipping rule with invalid regex"
                    );
                    invalid.push(failure);
                }
            }
        }

        Self {
            rules: compiled,
            invalid,
            rendered: RefCell::default(),
            reported_tools: RefCell::default(),
        }
    }

    /// Summarize which rules compiled.
    pub fn validate(&self) -> Validation {
        Validation {
            valid: self.rules.len(),
            invalid: self.invalid.clone(),
        }
    }

    /// The rules that compiled, in authored order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().map(|compiled| &compiled.rule)
    }

    /// Find the first rule (of any event) matching the text and tool name.
    pub fn find_match(&self, text: &str, tool_name: &str) -> Option<RuleMatch<'_>> {
        self.find_match_with_context(text, tool_name, &Variables::new())
    }

    /// Find the first rule (of any event) matching the text and tool name,
    /// rendering templated patterns with the given variables.
    pub fn find_match_with_context(
        &self,
        text: &str,
        tool_name: &str,
        vars: &Variables,
    ) -> Option<RuleMatch<'_>> {
        self.rules
            .iter()
            .filter(|rule| self.tool_matches(rule, tool_name))
            .find(|rule| self.pattern_matches(rule, text, vars))
            .map(|rule| rule.to_match(text))
    }

    /// Match a proposed tool call against the `pre` rules.
    ///
    /// Rules with `sources` test each selector in order; rules without test
    /// the tool's default fields, or every string field if the tool has no
    /// default fields.
    #[tracing::instrument(skip(self, tool_input, intent, vars))]
    pub fn match_pre_tool<I: IntentSource + ?Sized>(
        &self,
        tool_name: &str,
        tool_input: &Map<String, Value>,
        intent: &I,
        vars: &Variables,
    ) -> Option<RuleMatch<'_>> {
        for rule in self.rules_for(RuleEvent::Pre) {
            if !self.tool_matches(rule, tool_name) {
                continue;
            }

            let mut check = |text: &str| self.pattern_matches(rule, text, vars);
            let found = if rule.rule.sources.is_empty() {
                self.first_default_field(tool_name, tool_input, &mut check)
            } else {
                first_selected(&rule.rule.sources, tool_input, intent, &mut check)
            };

            if let Some(text) = found {
                tracing::debug!(index = rule.index, "pre-tool rule matched");
                return Some(rule.to_match(&text));
            }
        }

        None
    }

    /// Match a completed tool call against the `post` rules.
    ///
    /// The candidate text for each rule is chosen from the tool response:
    /// - without `sources`, the first non-empty string in the response
    /// - with `#intent` and a non-empty intent, the intent
    /// - otherwise the first present non-empty field named in `sources`
    ///   (`#all` contributes every string field)
    #[tracing::instrument(skip(self, response, intent, vars))]
    pub fn match_post_tool<I: IntentSource + ?Sized>(
        &self,
        tool_name: &str,
        response: &Map<String, Value>,
        intent: &I,
        vars: &Variables,
    ) -> Option<RuleMatch<'_>> {
        for rule in self.rules_for(RuleEvent::Post) {
            if !self.tool_matches(rule, tool_name) {
                continue;
            }

            let candidates = post_candidates(&rule.rule, response, intent);
            if let Some(text) = candidates
                .into_iter()
                .find(|text| self.pattern_matches(rule, text, vars))
            {
                tracing::debug!(index = rule.index, "post-tool rule matched");
                return Some(rule.to_match(&text));
            }
        }

        None
    }

    /// Whether any rule for the event reads the assistant's intent.
    pub fn uses_intent(&self, event: RuleEvent) -> bool {
        self.rules_for(event).any(|rule| rule.rule.uses_intent())
    }

    /// Whether any rule is evaluated for the event.
    pub fn has_rules_for(&self, event: RuleEvent) -> bool {
        self.rules_for(event).next().is_some()
    }

    fn rules_for(&self, event: RuleEvent) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter().filter(move |rule| rule.rule.event == event)
    }

    fn tool_matches(&self, rule: &CompiledRule, tool_name: &str) -> bool {
        rule.tool
            .as_ref()
            .is_none_or(|tool| tool.is_match(tool_name))
    }

    fn pattern_matches(&self, rule: &CompiledRule, text: &str, vars: &Variables) -> bool {
        match &rule.pattern {
            Pattern::Static(regex) => regex.is_match(text),
            Pattern::Templated(source) => self
                .render_pattern(rule.index, source, vars)
                .is_some_and(|regex| regex.is_match(text)),
        }
    }

    fn render_pattern(&self, index: usize, source: &str, vars: &Variables) -> Option<Regex> {
        let rendered = match template::render(source, vars) {
            Ok(rendered) => rendered,
            Err(error) => {
                tracing::warn!(index, %error, "render rule pattern");
                return None;
            }
        };

        let key = (index, rendered);
        if let Some(regex) = self.rendered.borrow().get(&key) {
            return Some(regex.clone());
        }

        match Regex::new(&key.1) {
            Ok(regex) => {
                self.rendered.borrow_mut().insert(key, regex.clone());
                Some(regex)
            }
            Err(error) => {
                tracing::warn!(index, pattern = %key.1, %error, "compile rendered rule pattern");
                None
            }
        }
    }

    fn first_default_field(
        &self,
        tool_name: &str,
        tool_input: &Map<String, Value>,
        check: &mut dyn FnMut(&str) -> bool,
    ) -> Option<String> {
        match default_fields(tool_name) {
            Some(fields) => fields
                .iter()
                .filter_map(|field| tool_input.get(*field).and_then(field_text))
                .find(|text| check(text.as_str())),
            None => {
                if self.reported_tools.borrow_mut().insert(tool_name.to_string()) {
                    tracing::info!(
                        tool_name,
                        "no default fields for tool; checking every string field"
                    );
                }
                string_fields(tool_input).find(|text| check(text.as_str()))
            }
        }
    }
}

impl CompiledRule {
    fn to_match(&self, text: &str) -> RuleMatch<'_> {
        RuleMatch {
            rule: &self.rule,
            index: self.index,
            matched_text: text.to_string(),
        }
    }
}

fn compile(index: usize, rule: &Rule) -> Result<CompiledRule, InvalidRule> {
    let invalid = |regex: &str, error: String| InvalidRule {
        index,
        regex: regex.to_string(),
        error,
    };

    let pattern = if template::has_actions(&rule.pattern) {
        // Check that the pattern is a valid template and, with every variable
        // empty, a valid regex; the real values are substituted per call.
        let probe = template::render(&rule.pattern, &Variables::new())
            .map_err(|error| invalid(&rule.pattern, error.to_string()))?;
        Regex::new(&probe).map_err(|error| invalid(&rule.pattern, error.to_string()))?;
        Pattern::Templated(rule.pattern.clone())
    } else {
        Regex::new(&rule.pattern)
            .map(Pattern::Static)
            .map_err(|error| invalid(&rule.pattern, error.to_string()))?
    };

    let tool = rule
        .tool_filter()
        .map(|tool| {
            RegexBuilder::new(tool)
                .case_insensitive(true)
                .build()
                .map_err(|error| invalid(tool, error.to_string()))
        })
        .transpose()?;

    Ok(CompiledRule {
        index,
        rule: rule.clone(),
        pattern,
        tool,
    })
}

/// Walk the selectors of a rule in order and return the first text that
/// passes `check`.
fn first_selected<I: IntentSource + ?Sized>(
    sources: &[Source],
    tool_input: &Map<String, Value>,
    intent: &I,
    check: &mut dyn FnMut(&str) -> bool,
) -> Option<String> {
    for source in sources {
        let found = match source {
            Source::Intent => Some(intent.intent())
                .filter(|intent| !intent.is_empty())
                .filter(|intent| check(*intent))
                .map(String::from),
            Source::All => string_fields(tool_input).find(|text| check(text.as_str())),
            Source::Field(name) => tool_input
                .get(name)
                .and_then(field_text)
                .filter(|text| check(text.as_str())),
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

fn post_candidates<I: IntentSource + ?Sized>(
    rule: &Rule,
    response: &Map<String, Value>,
    intent: &I,
) -> Vec<String> {
    if rule.sources.is_empty() {
        return string_fields(response).take(1).collect();
    }

    if rule.uses_intent() {
        let intent = intent.intent();
        if !intent.is_empty() {
            return vec![intent.to_string()];
        }
    }

    for source in &rule.sources {
        match source {
            Source::Intent => continue,
            Source::All => return string_fields(response).collect(),
            Source::Field(name) => {
                if let Some(text) = response
                    .get(name)
                    .and_then(Value::as_str)
                    .filter(|text| !text.is_empty())
                {
                    return vec![text.to_string()];
                }
            }
        }
    }

    Vec::new()
}

/// Every non-empty string-valued field, in document order.
fn string_fields(fields: &Map<String, Value>) -> impl Iterator<Item = String> + '_ {
    fields
        .values()
        .filter_map(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(String::from)
}

/// The text a field contributes to matching.
///
/// Strings are used as-is; other values (such as the `edits` array of
/// `MultiEdit`) are matched against their compact JSON encoding.
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}
