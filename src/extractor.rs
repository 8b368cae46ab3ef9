//! Operation extractor
//!
//! Best-effort scan of DSL text into [`Operation`] records. Each non-blank,
//! non-comment line that opens with `(domain.action` becomes one operation;
//! anything else is skipped with a `ParseSkip` diagnostic.
//!
//! Attribute references are `@attr{id}` tokens. A token directly after the
//! `:as` keyword is produced by the operation; the rest are consumed. The verb
//! registry adds the verb's implicit milestone inputs and outputs.

use nom::{
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0, multispace1, satisfy},
    combinator::recognize,
    multi::many1,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use tracing::debug;

use crate::config::{domain_of, PlannerConfig};
use crate::error::PlanDiagnostic;
use crate::timing::TimingEstimator;
use crate::types::Operation;

/// Operations and skip diagnostics from one extraction pass
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub operations: Vec<Operation>,
    pub diagnostics: Vec<PlanDiagnostic>,
}

pub struct OperationExtractor<'a> {
    config: &'a PlannerConfig,
}

impl<'a> OperationExtractor<'a> {
    pub fn new(config: &'a PlannerConfig) -> Self {
        Self { config }
    }

    pub fn extract(&self, dsl: &str) -> ExtractionResult {
        let mut result = ExtractionResult::default();

        for (idx, raw) in dsl.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();

            if line.is_empty() || is_comment(line) {
                continue;
            }

            match parse_invocation(line) {
                Some((verb, args)) => {
                    let id = format!("op-{}", result.operations.len() + 1);
                    let op = self.build_operation(id, verb, line, line_no, args);
                    result.operations.push(op);
                }
                None => {
                    debug!(line = line_no, "Skipping non-verb line: {}", line);
                    result
                        .diagnostics
                        .push(PlanDiagnostic::parse_skip(line_no, line));
                }
            }
        }

        debug!(
            operations = result.operations.len(),
            skipped = result.diagnostics.len(),
            "Extraction complete"
        );
        result
    }

    fn build_operation(
        &self,
        id: String,
        verb: &str,
        source: &str,
        line: usize,
        args: &str,
    ) -> Operation {
        let domain = domain_of(verb).to_string();
        let spec = self.config.verb(verb);
        let tokens = scan_attribute_refs(args);

        let mut produces: Vec<String> = Vec::new();
        for token in &tokens {
            if let AttrToken::Produced(id) = token {
                push_unique(&mut produces, id);
            }
        }
        if let Some(spec) = spec {
            for attr in &spec.produces {
                push_unique(&mut produces, attr);
            }
        }

        let mut consumes: Vec<String> = Vec::new();
        let referenced = tokens.iter().filter_map(|t| match t {
            AttrToken::Referenced(id) => Some(*id),
            AttrToken::Produced(_) => None,
        });
        let implicit = spec
            .into_iter()
            .flat_map(|s| s.consumes.iter().map(String::as_str));
        for attr in referenced.chain(implicit) {
            if !produces.iter().any(|p| p == attr) {
                push_unique(&mut consumes, attr);
            }
        }

        Operation {
            id,
            verb: verb.to_string(),
            priority: self.config.domain(&domain).priority,
            domain,
            source: source.to_string(),
            line,
            consumes,
            produces,
            retryable: spec.map(|s| s.retryable).unwrap_or(true),
            parallel_safe: spec.map(|s| s.parallel_safe).unwrap_or(true),
            estimated_duration_ms: TimingEstimator::new(self.config).operation_duration(verb),
            on_critical_path: false,
        }
    }
}

fn is_comment(line: &str) -> bool {
    line.starts_with(';') || line.starts_with('#') || line.starts_with("//")
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|existing| existing == value) {
        list.push(value.to_string());
    }
}

// ============================================================================
// Parsers
// ============================================================================

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// One dotted-name segment: a letter followed by identifier characters
fn segment(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic()),
        take_while(is_ident_char),
    ))(input)
}

/// `domain.action` (further dotted segments are kept in the verb)
fn verb_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(segment, many1(pair(char('.'), segment))))(input)
}

/// `(domain.action` at the start of a line
fn verb_head(input: &str) -> IResult<&str, &str> {
    preceded(pair(char('('), multispace0), verb_name)(input)
}

/// Parse a line into its verb and the remaining argument text
pub fn parse_invocation(line: &str) -> Option<(&str, &str)> {
    let (rest, verb) = verb_head(line).ok()?;
    match rest.chars().next() {
        None => Some((verb, rest)),
        Some(c) if c.is_whitespace() || c == ')' => Some((verb, rest)),
        Some(_) => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrToken<'a> {
    Produced(&'a str),
    Referenced(&'a str),
}

// Attribute reference: @attr{id}
fn attribute_ref(input: &str) -> IResult<&str, &str> {
    delimited(tag("@attr{"), take_while1(|c: char| c != '}'), char('}'))(input)
}

// Produced reference: :as @attr{id}
fn produced_ref(input: &str) -> IResult<&str, &str> {
    preceded(tuple((tag(":as"), multispace1)), attribute_ref)(input)
}

fn scan_attribute_refs(input: &str) -> Vec<AttrToken<'_>> {
    let mut tokens = Vec::new();
    let mut rest = input;

    while !rest.is_empty() {
        if let Ok((next, id)) = produced_ref(rest) {
            tokens.push(AttrToken::Produced(id.trim()));
            rest = next;
        } else if let Ok((next, id)) = attribute_ref(rest) {
            tokens.push(AttrToken::Referenced(id.trim()));
            rest = next;
        } else {
            let mut chars = rest.chars();
            chars.next();
            rest = chars.as_str();
        }
    }

    tokens.retain(|t| match t {
        AttrToken::Produced(id) | AttrToken::Referenced(id) => !id.is_empty(),
    });
    tokens
}
