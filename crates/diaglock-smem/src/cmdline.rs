//! Kernel command line parsing.
//!
//! Tokens are whitespace separated; values may be double-quoted to carry
//! spaces. Later occurrences of a key win, matching how the kernel hands
//! duplicate parameters to userspace consumers.

use std::collections::HashMap;

/// Parsed `key=value` view over a command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KernelCmdline {
    params: HashMap<String, String>,
}

impl KernelCmdline {
    pub fn parse(raw: &str) -> Self {
        let mut params = HashMap::new();
        for token in split_tokens(raw) {
            let (key, value) = match token.split_once('=') {
                Some((key, value)) => (key, value.trim_matches('"')),
                None => (token.as_str(), ""),
            };
            if key.is_empty() {
                continue;
            }
            params.insert(key.to_string(), value.to_string());
        }
        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Interpret `key` as a boolean flag.
    ///
    /// A bare key counts as set; `0`/`false`/`no`/`off` count as unset.
    pub fn flag(&self, key: &str) -> bool {
        match self.get(key) {
            None => false,
            Some(value) => !matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            ),
        }
    }
}

fn split_tokens(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for ch in raw.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                current.push(ch);
            }
            ch if ch.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            ch => current.push(ch),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
