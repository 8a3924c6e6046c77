//! Error classification for failed apply attempts
//!
//! Turns the raw text of a failed attempt (process output or job log
//! entries) into an [`ErrorKind`] plus a short message an operator can read
//! in a long-running log.
//!
//! Fatal signatures are checked before capacity signatures, so an output
//! carrying both is always classified as fatal. Fatal kinds are checked in
//! the order auth-failure, limit-exceeded, malformed-request: the generic
//! `400-` marker comes last because the provider also reports some limit
//! errors with that status.

use crate::attempt::ErrorKind;
use regex::Regex;
use std::sync::LazyLock;

/// Longest message produced, in characters
pub const MAX_MESSAGE_LEN: usize = 240;

/// Message used when there is no output at all
pub const EMPTY_OUTPUT_MESSAGE: &str = "no diagnostic output captured";

const CHECK_ORDER: [ErrorKind; 4] = [
    ErrorKind::AuthFailure,
    ErrorKind::LimitExceeded,
    ErrorKind::MalformedRequest,
    ErrorKind::CapacityExhausted,
];

const AUTH_PATTERN: &str = r"(?i)\b40[13]-[a-z]|notauthenticated|notauthorizedornotfound|\bunauthorized\b|\bforbidden\b|authentication failed|invalid private key|did not find a proper configuration";
const LIMIT_PATTERN: &str =
    r"(?i)limitexceeded|limits? (?:were |was )?exceeded|quota ?exceeded|vcn-count";
const MALFORMED_PATTERN: &str = r"(?i)cannotparserequest|invalidparameter|missingparameter|\b400-[a-z]|\bbad request\b|unsupported argument|missing required argument|invalid reference|reference to undeclared";
const CAPACITY_PATTERN: &str = r"(?i)out ?of ?host ?capacity|out of capacity|insufficient ?capacity|\bno capacity\b|cannotattachvolume";

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").unwrap());
static LEVEL_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\[[A-Za-z]+\]\s*)+").unwrap());
static DIAGNOSTIC_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:\[[a-z]+\]\s*)*(?:error|fatal|panic)\b|error:").unwrap());
static ERROR_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:\[[a-z]+\]\s*)*error:").unwrap());
static DEFAULT_CLASSIFIER: LazyLock<ErrorClassifier> = LazyLock::new(ErrorClassifier::new);

/// Result of classifying a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    pub message: String,
}

/// Classify with the built-in signatures only
pub fn classify(raw_output: &str) -> Classification {
    DEFAULT_CLASSIFIER.classify(raw_output)
}

/// Signature-based classifier
///
/// Holds the built-in signatures plus any operator-supplied markers.
/// Classification is a pure function of the input text.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    signatures: Vec<(ErrorKind, Regex)>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorClassifier {
    pub fn new() -> Self {
        let signatures = [
            (ErrorKind::AuthFailure, AUTH_PATTERN),
            (ErrorKind::LimitExceeded, LIMIT_PATTERN),
            (ErrorKind::MalformedRequest, MALFORMED_PATTERN),
            (ErrorKind::CapacityExhausted, CAPACITY_PATTERN),
        ]
        .into_iter()
        .map(|(kind, pattern)| (kind, Regex::new(pattern).unwrap()))
        .collect();

        Self { signatures }
    }

    /// Add case-insensitive substrings that mean capacity exhaustion
    pub fn with_capacity_markers<I, S>(self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.with_markers(ErrorKind::CapacityExhausted, markers)
    }

    /// Add case-insensitive substrings that mean a configuration defect
    ///
    /// These classify as [`ErrorKind::MalformedRequest`].
    pub fn with_fatal_markers<I, S>(self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.with_markers(ErrorKind::MalformedRequest, markers)
    }

    fn with_markers<I, S>(mut self, kind: ErrorKind, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alternatives: Vec<String> = markers
            .into_iter()
            .map(|m| m.as_ref().trim().to_string())
            .filter(|m| !m.is_empty())
            .map(|m| regex::escape(&m))
            .collect();

        if alternatives.is_empty() {
            return self;
        }

        // escaped literals always form a valid pattern
        if let Ok(re) = Regex::new(&format!("(?i){}", alternatives.join("|"))) {
            self.signatures.push((kind, re));
        }
        self
    }

    /// Classify the raw text of a failed attempt
    pub fn classify(&self, raw_output: &str) -> Classification {
        let lines = logical_lines(raw_output);

        if lines.is_empty() {
            return Classification {
                kind: ErrorKind::Unknown,
                message: EMPTY_OUTPUT_MESSAGE.to_string(),
            };
        }

        for kind in CHECK_ORDER {
            if let Some(line) = lines.iter().find(|l| self.matches(kind, &l.text)) {
                return Classification {
                    kind,
                    message: tidy_message(&line.text, kind),
                };
            }
        }

        // an `Error:` line names the failure; other diagnostic lines only wrap it
        let message = match lines
            .iter()
            .find(|l| ERROR_PREFIX.is_match(&l.text))
            .or_else(|| lines.iter().find(|l| l.diagnostic))
        {
            Some(line) => tidy_message(&line.text, ErrorKind::Unknown),
            None => prefix_message(raw_output),
        };

        Classification {
            kind: ErrorKind::Unknown,
            message,
        }
    }

    fn matches(&self, kind: ErrorKind, text: &str) -> bool {
        self.signatures
            .iter()
            .any(|(k, re)| *k == kind && re.is_match(text))
    }
}

struct LogicalLine {
    text: String,
    diagnostic: bool,
}

/// Split output into scan units, reducing machine-readable JSON lines to
/// their human text
fn logical_lines(raw_output: &str) -> Vec<LogicalLine> {
    raw_output
        .lines()
        .map(|line| ANSI_ESCAPE.replace_all(line, ""))
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .map(|line| match structured_line(&line) {
            Some(structured) => structured,
            None => LogicalLine {
                diagnostic: DIAGNOSTIC_LINE.is_match(&line),
                text: line,
            },
        })
        .collect()
}

/// `{"@level":"error","@message":"Error: ...","diagnostic":{...}}`
fn structured_line(line: &str) -> Option<LogicalLine> {
    if !line.starts_with('{') {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    let message = value.get("@message")?.as_str()?.trim();

    let mut text = message.to_string();
    if let Some(detail) = value
        .pointer("/diagnostic/detail")
        .and_then(|d| d.as_str())
        .map(str::trim)
        .filter(|d| !d.is_empty())
    {
        text.push(' ');
        text.push_str(detail);
    }

    let level_error = value
        .get("@level")
        .and_then(|l| l.as_str())
        .is_some_and(|l| l.eq_ignore_ascii_case("error"));

    Some(LogicalLine {
        diagnostic: level_error || DIAGNOSTIC_LINE.is_match(&text),
        text,
    })
}

fn tidy_message(line: &str, kind: ErrorKind) -> String {
    let stripped = LEVEL_TAG.replace(line, "");
    let collapsed = collapse_whitespace(&stripped);
    if collapsed.is_empty() {
        return format!("{} (no message text)", kind);
    }
    truncate(&collapsed, MAX_MESSAGE_LEN)
}

fn prefix_message(raw_output: &str) -> String {
    one_line(raw_output, EMPTY_OUTPUT_MESSAGE)
}

/// Squeeze arbitrary text into a bounded one-line message
pub(crate) fn one_line(text: &str, fallback: &str) -> String {
    let collapsed = collapse_whitespace(&ANSI_ESCAPE.replace_all(text, ""));
    if collapsed.is_empty() {
        return fallback.to_string();
    }
    truncate(&collapsed, MAX_MESSAGE_LEN)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
