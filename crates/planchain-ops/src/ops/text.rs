//! Text operations

use crate::params::{bool_or, optional_str, require_array, require_str};
use crate::registry::Operation;
use planchain_core::{
    Error, OperationOutput, OperationSchema, ParamDef, ParamType, Params, Result,
};
use regex::{NoExpand, RegexBuilder};
use serde_json::{json, Value};
use sha2::{Digest, Sha256, Sha512};

const CATEGORY: &str = "text_operations";
const ORIGINAL_PREVIEW_CHARS: usize = 100;

/// Sentence pieces split on runs of `.`, `!`, `?`; blank pieces dropped.
fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn analyze(text: &str) -> Value {
    let words: Vec<&str> = text.split_whitespace().collect();
    let sentences = sentences(text).count();
    let paragraphs = text.split("\n\n").filter(|p| !p.trim().is_empty()).count();
    let letters: usize = words.iter().map(|w| w.chars().count()).sum();

    let avg_word = if words.is_empty() {
        0.0
    } else {
        letters as f64 / words.len() as f64
    };
    let avg_sentence = if sentences == 0 {
        0.0
    } else {
        words.len() as f64 / sentences as f64
    };

    json!({
        "character_count": text.chars().count(),
        "character_count_no_spaces": text.chars().filter(|c| *c != ' ').count(),
        "word_count": words.len(),
        "sentence_count": sentences,
        "paragraph_count": paragraphs,
        "average_word_length": avg_word,
        "average_sentence_length": avg_sentence,
    })
}

pub struct AnalyzeText {
    schema: OperationSchema,
}

impl AnalyzeText {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new(
                "analyze_text",
                CATEGORY,
                "Count characters, words, sentences, and paragraphs in text",
            )
            .param(ParamDef::required("text", ParamType::String, "Text to analyze"))
            .returns("analysis"),
        }
    }
}

impl Default for AnalyzeText {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Operation for AnalyzeText {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let text = require_str("analyze_text", &params, "text")?;
        let analysis = analyze(text);
        Ok(OperationOutput::data(analysis.clone()).with("analysis", analysis))
    }
}

pub struct GenerateHash {
    schema: OperationSchema,
}

impl GenerateHash {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new("generate_hash", CATEGORY, "Hex digest of a text")
                .param(ParamDef::required("text", ParamType::String, "Text to hash"))
                .param(ParamDef::optional(
                    "hash_type",
                    ParamType::String,
                    "sha256 or sha512",
                    "sha256",
                ))
                .returns("hash, hash_type"),
        }
    }
}

impl Default for GenerateHash {
    fn default() -> Self {
        Self::new()
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[async_trait::async_trait]
impl Operation for GenerateHash {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let text = require_str("generate_hash", &params, "text")?;
        let hash_type = optional_str(&params, "hash_type").unwrap_or("sha256");
        let digest = match hash_type.to_lowercase().as_str() {
            "sha256" => hex(&Sha256::digest(text.as_bytes())),
            "sha512" => hex(&Sha512::digest(text.as_bytes())),
            other => {
                return Ok(OperationOutput::failure(format!(
                    "Unsupported hash type: {}",
                    other
                )))
            }
        };
        Ok(OperationOutput::data(digest.clone())
            .with("hash", digest)
            .with("hash_type", hash_type))
    }
}

pub struct SplitText {
    schema: OperationSchema,
}

impl SplitText {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new("split_text", CATEGORY, "Split text into parts")
                .param(ParamDef::required("text", ParamType::String, "Text to split"))
                .param(ParamDef::optional(
                    "delimiter",
                    ParamType::String,
                    "Separator; whitespace when omitted",
                    " ",
                ))
                .param(ParamDef::optional(
                    "split_type",
                    ParamType::String,
                    "delimiter, lines, words, or sentences",
                    "delimiter",
                ))
                .returns("data: parts, count"),
        }
    }
}

impl Default for SplitText {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Operation for SplitText {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let text = require_str("split_text", &params, "text")?;
        let split_type = optional_str(&params, "split_type").unwrap_or("delimiter");

        let parts: Vec<String> = match split_type {
            "delimiter" => match optional_str(&params, "delimiter") {
                Some(d) if !d.trim().is_empty() => text.split(d).map(String::from).collect(),
                _ => text.split_whitespace().map(String::from).collect(),
            },
            "words" => text.split_whitespace().map(String::from).collect(),
            "lines" => text.lines().map(String::from).collect(),
            "sentences" => sentences(text).map(String::from).collect(),
            other => {
                return Ok(OperationOutput::failure(format!(
                    "Unknown split type: {}",
                    other
                )))
            }
        };

        let count = parts.len();
        Ok(OperationOutput::data(parts).with("count", count))
    }
}

pub struct JoinText {
    schema: OperationSchema,
}

impl JoinText {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new("join_text", CATEGORY, "Join text parts with a delimiter")
                .param(ParamDef::required("text_parts", ParamType::Array, "Parts to join"))
                .param(ParamDef::optional(
                    "delimiter",
                    ParamType::String,
                    "Separator between parts",
                    " ",
                ))
                .returns("data: joined text"),
        }
    }
}

impl Default for JoinText {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Operation for JoinText {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let parts = require_array("join_text", &params, "text_parts")?;
        let delimiter = optional_str(&params, "delimiter").unwrap_or(" ");
        let joined = parts
            .iter()
            .map(|p| match p {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(delimiter);
        Ok(OperationOutput::data(joined))
    }
}

pub struct FindReplace {
    schema: OperationSchema,
}

impl FindReplace {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new(
                "find_replace",
                CATEGORY,
                "Find and replace text, literally or by regex",
            )
            .param(ParamDef::required("text", ParamType::String, "Text to edit"))
            .param(ParamDef::required("find_pattern", ParamType::String, "Text or regex to find"))
            .param(ParamDef::required(
                "replace_with",
                ParamType::String,
                "Replacement; $1 / ${name} refer to groups in regex mode",
            ))
            .param(ParamDef::optional(
                "use_regex",
                ParamType::Boolean,
                "Treat find_pattern as a regex",
                false,
            ))
            .param(ParamDef::optional(
                "case_sensitive",
                ParamType::Boolean,
                "Match case exactly",
                true,
            ))
            .returns("data: result_text, replacements_made"),
        }
    }
}

impl Default for FindReplace {
    fn default() -> Self {
        Self::new()
    }
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(ORIGINAL_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[async_trait::async_trait]
impl Operation for FindReplace {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let text = require_str("find_replace", &params, "text")?;
        let find = require_str("find_replace", &params, "find_pattern")?;
        let replace_with = require_str("find_replace", &params, "replace_with")?;
        let use_regex = bool_or(&params, "use_regex", false);
        let case_sensitive = bool_or(&params, "case_sensitive", true);
        if find.is_empty() {
            return Err(Error::invalid_parameter(
                "find_replace",
                "find_pattern",
                "must not be empty",
            ));
        }

        let source = if use_regex {
            find.to_string()
        } else {
            regex::escape(find)
        };
        let re = match RegexBuilder::new(&source)
            .case_insensitive(!case_sensitive)
            .build()
        {
            Ok(re) => re,
            Err(e) => return Ok(OperationOutput::failure(format!("Invalid pattern: {}", e))),
        };

        let replacements = re.find_iter(text).count();
        let result = if use_regex {
            re.replace_all(text, replace_with)
        } else {
            re.replace_all(text, NoExpand(replace_with))
        }
        .into_owned();

        Ok(OperationOutput::data(result.clone())
            .with("original_text", preview(text))
            .with("result_text", result)
            .with("replacements_made", replacements))
    }
}

/// Regexes for the `pattern_type` shortcuts.
fn named_pattern(kind: &str) -> Option<&'static str> {
    Some(match kind {
        "email" => r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        "phone" => r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b",
        "url" => r#"https?://[^\s<>"']+"#,
        "ip" => r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b",
        "date" => r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b",
        _ => return None,
    })
}

pub struct ExtractPatterns {
    schema: OperationSchema,
}

impl ExtractPatterns {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new(
                "extract_patterns",
                CATEGORY,
                "Extract regex matches (or emails, phones, urls, ips, dates) from text",
            )
            .param(ParamDef::required("text", ParamType::String, "Text to scan"))
            .param(ParamDef::optional(
                "pattern",
                ParamType::String,
                "Regex to match",
                Value::Null,
            ))
            .param(ParamDef::optional(
                "pattern_type",
                ParamType::String,
                "email, phone, url, ip, or date; overrides pattern",
                Value::Null,
            ))
            .returns("data: whole matches in order; pattern, count"),
        }
    }
}

impl Default for ExtractPatterns {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Operation for ExtractPatterns {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let text = require_str("extract_patterns", &params, "text")?;
        let pattern = match optional_str(&params, "pattern_type") {
            Some(kind) => match named_pattern(kind) {
                Some(p) => p,
                None => {
                    return Ok(OperationOutput::failure(format!(
                        "Unknown pattern type: {}",
                        kind
                    )))
                }
            },
            None => optional_str(&params, "pattern").ok_or_else(|| {
                Error::invalid_parameter(
                    "extract_patterns",
                    "pattern",
                    "either pattern or pattern_type is required",
                )
            })?,
        };
        let re = match RegexBuilder::new(pattern).build() {
            Ok(re) => re,
            Err(e) => return Ok(OperationOutput::failure(format!("Invalid pattern: {}", e))),
        };

        let matches: Vec<&str> = re.find_iter(text).map(|m| m.as_str()).collect();
        let count = matches.len();
        Ok(OperationOutput::data(matches)
            .with("pattern", pattern)
            .with("count", count))
    }
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn format_as(text: &str, format_type: &str) -> Option<String> {
    Some(match format_type {
        "uppercase" => text.to_uppercase(),
        "lowercase" => text.to_lowercase(),
        "title" => title_case(text),
        "capitalize" => capitalize(text),
        "reverse" => text.chars().rev().collect(),
        "remove_spaces" => text.replace(' ', ""),
        "normalize_spaces" => text.split_whitespace().collect::<Vec<_>>().join(" "),
        "remove_punctuation" => text
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
            .collect(),
        _ => return None,
    })
}

pub struct FormatText {
    schema: OperationSchema,
}

impl FormatText {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new("format_text", CATEGORY, "Format text in various ways")
                .param(ParamDef::required("text", ParamType::String, "Text to format"))
                .param(ParamDef::required(
                    "format_type",
                    ParamType::String,
                    "uppercase, lowercase, title, capitalize, reverse, remove_spaces, \
                     normalize_spaces, or remove_punctuation",
                ))
                .returns("data: formatted_text"),
        }
    }
}

impl Default for FormatText {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Operation for FormatText {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let text = require_str("format_text", &params, "text")?;
        let format_type = require_str("format_text", &params, "format_type")?;
        match format_as(text, format_type) {
            Some(formatted) => Ok(OperationOutput::data(formatted.clone())
                .with("original_text", text)
                .with("formatted_text", formatted)
                .with("format_type", format_type)),
            None => Ok(OperationOutput::failure(format!(
                "Unknown format type: {}",
                format_type
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(v: Value) -> Params {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn analysis_counts() {
        let a = analyze("One two. Three!\n\nFour five six?");
        assert_eq!(a["word_count"], 6);
        assert_eq!(a["sentence_count"], 3);
        assert_eq!(a["paragraph_count"], 2);
    }

    #[tokio::test]
    async fn sha256_of_abc() {
        let out = GenerateHash::new()
            .invoke(params(json!({"text": "abc"})))
            .await
            .unwrap();
        assert_eq!(
            out.fields["hash"],
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn unsupported_hash_fails() {
        let out = GenerateHash::new()
            .invoke(params(json!({"text": "abc", "hash_type": "crc"})))
            .await
            .unwrap();
        assert!(out.is_error());
    }

    #[tokio::test]
    async fn split_and_join() {
        let split = SplitText::new()
            .invoke(params(json!({"text": "a,b,c", "delimiter": ","})))
            .await
            .unwrap();
        assert_eq!(split.fields["data"], json!(["a", "b", "c"]));

        let joined = JoinText::new()
            .invoke(params(json!({"text_parts": ["a", "b", "c"], "delimiter": "-"})))
            .await
            .unwrap();
        assert_eq!(joined.fields["data"], "a-b-c");
    }

    #[tokio::test]
    async fn literal_replace_ignores_regex_syntax() {
        let out = FindReplace::new()
            .invoke(params(json!({
                "text": "cost: $5 (approx.) or $5",
                "find_pattern": "$5",
                "replace_with": "$1.00"
            })))
            .await
            .unwrap();
        assert_eq!(out.fields["result_text"], "cost: $1.00 (approx.) or $1.00");
        assert_eq!(out.fields["replacements_made"], 2);
    }

    #[tokio::test]
    async fn case_insensitive_and_regex_groups() {
        let op = FindReplace::new();
        let out = op
            .invoke(params(json!({
                "text": "Apple apple APPLE",
                "find_pattern": "apple",
                "replace_with": "pear",
                "case_sensitive": false
            })))
            .await
            .unwrap();
        assert_eq!(out.fields["data"], "pear pear pear");

        let swapped = op
            .invoke(params(json!({
                "text": "2024-03-05",
                "find_pattern": r"(\d+)-(\d+)-(\d+)",
                "replace_with": "$3/$2/$1",
                "use_regex": true
            })))
            .await
            .unwrap();
        assert_eq!(swapped.fields["data"], "05/03/2024");

        let bad = op
            .invoke(params(json!({
                "text": "x",
                "find_pattern": "(",
                "replace_with": "",
                "use_regex": true
            })))
            .await
            .unwrap();
        assert!(bad.error.unwrap().starts_with("Invalid pattern"));
    }

    #[test]
    fn long_originals_are_previewed() {
        let long = "x".repeat(150);
        assert_eq!(preview(&long).len(), ORIGINAL_PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }

    #[tokio::test]
    async fn named_patterns_find_contacts() {
        let text = "Mail ana@example.org or bo@test.io, call 555-123-4567, \
                    see https://x.dev/a?b=1 from 10.0.0.12 on 3/14/2024";
        let op = ExtractPatterns::new();
        let run = |kind: &str| {
            op.invoke(params(json!({"text": text, "pattern_type": kind})))
        };
        assert_eq!(
            run("email").await.unwrap().fields["data"],
            json!(["ana@example.org", "bo@test.io"])
        );
        assert_eq!(run("phone").await.unwrap().fields["data"], json!(["555-123-4567"]));
        assert_eq!(run("url").await.unwrap().fields["data"], json!(["https://x.dev/a?b=1"]));
        assert_eq!(run("ip").await.unwrap().fields["data"], json!(["10.0.0.12"]));
        assert_eq!(run("date").await.unwrap().fields["count"], 1);
        assert!(run("zipcode").await.unwrap().is_error());
    }

    #[tokio::test]
    async fn custom_pattern_or_error() {
        let op = ExtractPatterns::new();
        let out = op
            .invoke(params(json!({"text": "a1 b22 c333", "pattern": r"\d{2,}"})))
            .await
            .unwrap();
        assert_eq!(out.fields["data"], json!(["22", "333"]));

        let err = op.invoke(params(json!({"text": "abc"}))).await.unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn format_types() {
        let cases = [
            ("uppercase", "hello world", "HELLO WORLD"),
            ("title", "hello wORLD it's", "Hello World It'S"),
            ("capitalize", "hELLO World", "Hello world"),
            ("reverse", "abc", "cba"),
            ("remove_spaces", "a b  c", "abc"),
            ("normalize_spaces", "  a \t b\n c ", "a b c"),
            ("remove_punctuation", "Hi, there! (ok)", "Hi there ok"),
        ];
        for (kind, input, expected) in cases {
            assert_eq!(format_as(input, kind).as_deref(), Some(expected), "{}", kind);
        }
        assert_eq!(format_as("x", "sideways"), None);
    }
}
