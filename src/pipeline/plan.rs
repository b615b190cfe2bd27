//! Splitting a video plan into acts.

use regex::Regex;
use std::sync::OnceLock;

/// One section of a multi-pass plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Act {
    /// 1-based position in the plan
    pub number: usize,
    pub name: String,
    pub duration_secs: u32,
    /// Non-empty lines following the header, newline-terminated
    pub description: String,
}

fn act_header_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(ACT \d+|CLOSING):\s*(.*?)\s*\(~(\d+)s\)").ok())
        .as_ref()
}

/// Parse `ACT <n>: <name> (~<secs>s)` and `CLOSING: (~<secs>s)` headers.
///
/// Text before the first header is ignored. A plan with no headers has no acts.
pub fn parse_acts(plan: &str) -> Vec<Act> {
    let Some(re) = act_header_re() else {
        return Vec::new();
    };

    let mut acts: Vec<Act> = Vec::new();
    for line in plan.lines().map(str::trim) {
        if let Some(caps) = re.captures(line) {
            let kind = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let name = if kind == "CLOSING" {
                "Closing".to_string()
            } else {
                caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default()
            };
            let duration_secs = caps
                .get(3)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            acts.push(Act {
                number: acts.len() + 1,
                name,
                duration_secs,
                description: String::new(),
            });
        } else if !line.is_empty() {
            if let Some(current) = acts.last_mut() {
                current.description.push_str(line);
                current.description.push('\n');
            }
        }
    }
    acts
}
