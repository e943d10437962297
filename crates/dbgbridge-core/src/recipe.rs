//! Recipe property expansion.
//!
//! Debugger command lines are described declaratively as patterns such as
//! `"{tools.gdb.cmd}" --interpreter=mi2 "{build.path}/{build.project_name}.elf"`.
//! [`Properties::resolve_command`] splits the pattern into words first and
//! then substitutes `{key}` placeholders inside each word, so property values
//! never add or merge arguments.
//!
//! Values set with [`Properties::set_literal`] are substituted verbatim and
//! never scanned for further placeholders.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}\s]+)\}").expect("static regex is valid"));

/// Upper bound on nested placeholder resolution, so self-referencing
/// properties terminate.
const MAX_EXPANSION_DEPTH: usize = 10;

/// Upper bound on the length of a single expanded word, in bytes.
pub const MAX_EXPANDED_LEN: usize = 64 * 1024;

/// Errors produced while resolving a recipe into a command line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecipeError {
    #[error("no pattern defined for {0}")]
    MissingPattern(String),

    #[error("recipe expanded to an empty command line")]
    EmptyCommand,

    #[error("unterminated quote in command line: {0}")]
    UnterminatedQuote(String),

    #[error("expanded recipe exceeds {0} bytes")]
    TooLong(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    value: String,
    literal: bool,
}

/// A flat `key = value` property set, keys being dot-separated paths.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, Entry>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value that may reference other properties.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.insert(key.into(), value.into(), false);
    }

    /// Set a value that is substituted as-is, placeholders included.
    pub fn set_literal(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.insert(key.into(), value.into(), true);
    }

    fn insert(&mut self, key: String, value: String, literal: bool) {
        self.entries.insert(key, Entry { value, literal });
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|e| e.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy every entry of `other` into `self`, overwriting existing keys.
    pub fn merge(&mut self, other: &Self) {
        self.entries
            .extend(other.entries.iter().map(|(k, e)| (k.clone(), e.clone())));
    }

    /// Entries below `prefix.`, with the prefix stripped.
    pub fn sub_tree(&self, prefix: &str) -> Self {
        let dotted = format!("{prefix}.");
        let entries = self
            .entries
            .iter()
            .filter_map(|(k, e)| k.strip_prefix(&dotted).map(|rest| (rest.to_string(), e.clone())))
            .collect();
        Self { entries }
    }

    /// Replace `{key}` placeholders with their values.
    ///
    /// Non-literal values are expanded recursively up to a fixed depth;
    /// placeholders naming unknown keys, or nested too deeply, are kept
    /// verbatim.
    pub fn expand(&self, input: &str) -> Result<String, RecipeError> {
        let mut out = String::new();
        self.expand_into(input, 0, &mut out)?;
        Ok(out)
    }

    fn expand_into(&self, input: &str, depth: usize, out: &mut String) -> Result<(), RecipeError> {
        let mut last = 0;
        for caps in PLACEHOLDER_RE.captures_iter(input) {
            let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&input[last..whole.start()]);
            last = whole.end();

            match self.entries.get(key.as_str()) {
                Some(entry) if entry.literal => out.push_str(&entry.value),
                Some(entry) if depth < MAX_EXPANSION_DEPTH => {
                    self.expand_into(&entry.value, depth + 1, out)?;
                }
                _ => out.push_str(whole.as_str()),
            }
            check_len(out)?;
        }
        out.push_str(&input[last..]);
        check_len(out)
    }

    /// Split the pattern stored under `pattern_key` into words, then expand
    /// each word.
    pub fn resolve_command(&self, pattern_key: &str) -> Result<CommandLine, RecipeError> {
        let pattern = self
            .get(pattern_key)
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| RecipeError::MissingPattern(pattern_key.to_string()))?;
        let words = split_command_line(pattern)?;

        let program = self.expand(&words.program)?;
        if program.trim().is_empty() {
            return Err(RecipeError::EmptyCommand);
        }
        let args = words
            .args
            .iter()
            .map(|arg| self.expand(arg))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CommandLine { program, args })
    }
}

fn check_len(out: &str) -> Result<(), RecipeError> {
    if out.len() > MAX_EXPANDED_LEN {
        Err(RecipeError::TooLong(MAX_EXPANDED_LEN))
    } else {
        Ok(())
    }
}

impl std::fmt::Debug for Properties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, e)| (k, &e.value)))
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Self::new();
        for (k, v) in iter {
            props.set(k, v);
        }
        props
    }
}

/// A resolved executable plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Split a command line on whitespace, keeping quoted sections together.
///
/// Double and single quotes group words and are removed; inside double
/// quotes a backslash escapes `"` and `\`.
pub fn split_command_line(line: &str) -> Result<CommandLine, RecipeError> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some('"') => match c {
                '"' => quote = None,
                '\\' if matches!(chars.peek(), Some(&('"' | '\\'))) => {
                    if let Some(escaped) = chars.next() {
                        word.push(escaped);
                    }
                }
                _ => word.push(c),
            },
            Some(q) => {
                if c == q {
                    quote = None;
                } else {
                    word.push(c);
                }
            }
            None => match c {
                '"' | '\'' => {
                    quote = Some(c);
                    in_word = true;
                }
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut word));
                        in_word = false;
                    }
                }
                _ => {
                    word.push(c);
                    in_word = true;
                }
            },
        }
    }

    if quote.is_some() {
        return Err(RecipeError::UnterminatedQuote(line.to_string()));
    }
    if in_word {
        words.push(word);
    }

    let mut words = words.into_iter();
    let program = words
        .next()
        .filter(|p| !p.is_empty())
        .ok_or(RecipeError::EmptyCommand)?;
    Ok(CommandLine {
        program,
        args: words.collect(),
    })
}
