//! Math answer matching: `\boxed{}` extraction, LaTeX cleanup, numeric
//! comparison with a relative tolerance.

use std::sync::LazyLock;

use agentrl_core::{Action, RewardSample};
use async_trait::async_trait;
use regex_lite::Regex;
use serde_json::Value;

use super::{ResultRewardStrategy, label_text};

const TOLERANCE: f64 = 1e-6;

static TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:text|textbf|textrm|mathrm|mbox)\{([^{}]*)\}").expect("valid text regex")
});

static FRAC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\\frac\{([^{}]+)\}\{([^{}]+)\}$").expect("valid frac regex")
});

static THOUSANDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-+]?\d{1,3}(,\d{3})+(\.\d+)?$").expect("valid thousands regex")
});

static ASSIGNMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]{1,2}=([^=]+)$").expect("valid assignment regex"));

/// Matches math answers that are equal up to formatting.
#[derive(Debug, Clone)]
pub struct MathMatchingReward {
    pub correct_score: f64,
    pub miss_score: f64,
    final_tool: String,
}

impl Default for MathMatchingReward {
    fn default() -> Self {
        Self {
            correct_score: 1.0,
            miss_score: 0.0,
            final_tool: "final".into(),
        }
    }
}

impl MathMatchingReward {
    pub fn with_scores(mut self, correct: f64, miss: f64) -> Self {
        self.correct_score = correct;
        self.miss_score = miss;
        self
    }

    pub fn with_final_tool(mut self, name: impl Into<String>) -> Self {
        self.final_tool = name.into();
        self
    }
}

#[async_trait]
impl ResultRewardStrategy for MathMatchingReward {
    fn name(&self) -> &str {
        "math_matching"
    }

    fn final_tool(&self) -> &str {
        &self.final_tool
    }

    async fn score(&self, action: &Action, label: Option<&Value>, _sample: Option<&RewardSample>) -> f64 {
        let Some(label) = label.filter(|l| !l.is_null()) else {
            return self.miss_score;
        };
        let Some(response) = self.extract_final_response(action) else {
            return self.miss_score;
        };
        let answer = extract_boxed(&response).unwrap_or(response);

        let candidates: Vec<&Value> = match label {
            Value::Array(items) => items.iter().collect(),
            single => vec![single],
        };
        for candidate in candidates {
            let text = label_text(candidate);
            let target = extract_boxed(&text).unwrap_or(text);
            if is_equivalent(&answer, &target) {
                return self.correct_score;
            }
        }
        self.miss_score
    }
}

/// Contents of the last `\boxed{…}` or `\fbox{…}` in `text`.
pub fn extract_boxed(text: &str) -> Option<String> {
    let (start, marker_len) = ["\\boxed", "\\fbox"]
        .iter()
        .filter_map(|marker| text.rfind(marker).map(|i| (i, marker.len())))
        .max_by_key(|(i, _)| *i)?;
    let rest = text[start + marker_len..].trim_start();

    let Some(inner) = rest.strip_prefix('{') else {
        // `\boxed 5` form
        let token: String = rest
            .chars()
            .take_while(|c| !c.is_whitespace() && *c != '$')
            .collect();
        return (!token.is_empty()).then_some(token);
    };

    let mut depth = 1usize;
    for (i, c) in inner.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(inner[..i].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Strip LaTeX presentation noise so equal answers compare equal.
pub fn normalize(answer: &str) -> String {
    let mut s = TEXT_RE.replace_all(answer.trim(), "$1").into_owned();
    for (from, to) in [
        ("\\left", ""),
        ("\\right", ""),
        ("\\!", ""),
        ("\\,", ""),
        ("\\;", ""),
        ("\\:", ""),
        ("\\dfrac", "\\frac"),
        ("\\tfrac", "\\frac"),
        ("^{\\circ}", ""),
        ("^\\circ", ""),
        ("\\%", ""),
        ("%", ""),
        ("\\$", ""),
        ("$", ""),
    ] {
        s = s.replace(from, to);
    }
    s.retain(|c| !c.is_whitespace());
    while s.ends_with('.') {
        s.pop();
    }
    if let Some(rhs) = ASSIGNMENT_RE.captures(&s).and_then(|c| c.get(1)) {
        s = rhs.as_str().to_string();
    }
    s
}

fn parse_number(s: &str) -> Option<f64> {
    if let Some(rest) = s.strip_prefix('-').filter(|r| r.starts_with('\\')) {
        return parse_number(rest).map(|v| -v);
    }
    if let Some(caps) = FRAC_RE.captures(s) {
        let numerator = parse_number(&caps[1])?;
        let denominator = parse_number(&caps[2])?;
        return (denominator != 0.0).then(|| numerator / denominator);
    }
    if let Some((numerator, denominator)) = s.split_once('/') {
        let numerator = parse_number(numerator)?;
        let denominator = parse_number(denominator)?;
        return (denominator != 0.0).then(|| numerator / denominator);
    }
    let plain = if THOUSANDS_RE.is_match(s) {
        s.replace(',', "")
    } else {
        s.to_string()
    };
    plain.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Normalized string equality, then numeric equality within tolerance.
pub fn is_equivalent(answer: &str, target: &str) -> bool {
    let a = normalize(answer);
    let b = normalize(target);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    match (parse_number(&a), parse_number(&b)) {
        (Some(x), Some(y)) => (x - y).abs() <= TOLERANCE * x.abs().max(y.abs()).max(1.0),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_last_boxed_with_nested_braces() {
        assert_eq!(extract_boxed(r"so \boxed{1} or \boxed{\frac{3}{4}}").as_deref(), Some(r"\frac{3}{4}"));
        assert_eq!(extract_boxed(r"\fbox{7}").as_deref(), Some("7"));
        assert_eq!(extract_boxed(r"$\boxed 12$").as_deref(), Some("12"));
        assert!(extract_boxed("no box").is_none());
        assert!(extract_boxed(r"\boxed{unclosed").is_none());
    }

    #[test]
    fn normalizes_latex_noise() {
        assert_eq!(normalize(r"\left( 1, 2 \right)"), "(1,2)");
        assert_eq!(normalize(r"\text{Paris}."), "Paris");
        assert_eq!(normalize(r"90^\circ"), "90");
        assert_eq!(normalize(r"\dfrac{1}{2}"), r"\frac{1}{2}");
        assert_eq!(normalize("x = 5"), "5");
    }

    #[test]
    fn numeric_equivalence() {
        assert!(is_equivalent(r"\frac{1}{2}", "0.5"));
        assert!(is_equivalent("1,000", "1000"));
        assert!(is_equivalent("1/4", "0.25"));
        assert!(is_equivalent("50\\%", "50"));
        assert!(is_equivalent(r"-\frac{3}{2}", "-1.5"));
        assert!(!is_equivalent("3", "4"));
        assert!(!is_equivalent("", ""));
    }

    #[tokio::test]
    async fn scores_boxed_answers_against_label_lists() {
        let reward = MathMatchingReward::default();
        let action = Action::text(r"The result is \boxed{\dfrac{1}{2}}.");
        assert_eq!(reward.score(&action, Some(&json!("0.5")), None).await, 1.0);
        assert_eq!(reward.score(&action, Some(&json!(["7", "1/2"])), None).await, 1.0);
        assert_eq!(reward.score(&action, Some(&json!(["7", "8"])), None).await, 0.0);
        assert_eq!(reward.score(&action, None, None).await, 0.0);
    }

    #[tokio::test]
    async fn numeric_json_label() {
        let reward = MathMatchingReward::default();
        assert_eq!(reward.score(&Action::text(r"\boxed{42}"), Some(&json!(42)), None).await, 1.0);
    }
}
