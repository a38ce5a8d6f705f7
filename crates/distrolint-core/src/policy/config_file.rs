//! INI-style configuration files (`/etc/wsl.conf`,
//! `/etc/wsl-distribution.conf`).
//!
//! Keys are flattened to `section.key` and fully case-folded, so
//! `[Oobe] Command = ...` is reported as `oobe.command`.

use std::collections::BTreeMap;

use thiserror::Error;

/// A line of a configuration file could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ConfigSyntaxError {
    /// 1-based line number.
    pub line: usize,
    /// What was expected.
    pub message: String,
}

impl ConfigSyntaxError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Flattened `section.key -> value` pairs of a configuration file.
///
/// # Examples
///
/// ```
/// use distrolint_core::policy::ConfigFile;
///
/// let config = ConfigFile::parse("[oobe]\nCommand = /usr/lib/wsl/oobe.sh\n").unwrap();
/// assert_eq!(config.get("oobe.command"), Some("/usr/lib/wsl/oobe.sh"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    values: BTreeMap<String, String>,
}

impl ConfigFile {
    /// Parses configuration text.
    ///
    /// Full-line comments start with `#` or `;`. A `#` outside double quotes
    /// ends a value. Values may be wrapped in double quotes. Later
    /// assignments of the same key win.
    ///
    /// # Errors
    ///
    /// Returns the first malformed line: a bad section header, a line with
    /// no `=`/`:` separator, an empty key, or a key before any section.
    pub fn parse(text: &str) -> Result<Self, ConfigSyntaxError> {
        let mut values = BTreeMap::new();
        let mut section: Option<String> = None;

        for (number, raw) in text.lines().enumerate() {
            let line_number = number + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                section = Some(parse_section(rest, line_number)?);
                continue;
            }

            let Some(separator) = line.find(['=', ':']) else {
                return Err(ConfigSyntaxError::new(line_number, "expected 'key = value'"));
            };
            let key = line[..separator].trim();
            if key.is_empty() {
                return Err(ConfigSyntaxError::new(line_number, "missing key name"));
            }
            let Some(section) = &section else {
                return Err(ConfigSyntaxError::new(
                    line_number,
                    format!("key '{key}' outside of any section"),
                ));
            };

            let value = parse_value(&line[separator + 1..]);
            values.insert(format!("{section}.{}", key.to_lowercase()), value);
        }

        Ok(Self { values })
    }

    /// Value of a flattened key. The lookup key is case-folded too.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Flattened keys, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Keys not present in `allowed`, sorted.
    #[must_use]
    pub fn unexpected_keys(&self, allowed: &[&str]) -> Vec<&str> {
        self.keys().filter(|key| !allowed.contains(key)).collect()
    }

    /// Interprets a key as a boolean (`true`/`yes`/`on`/`1`, any case).
    ///
    /// Absent or unrecognized values are `false`.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).is_some_and(|value| {
            matches!(
                value.to_ascii_lowercase().as_str(),
                "true" | "yes" | "on" | "1"
            )
        })
    }
}

fn parse_section(rest: &str, line: usize) -> Result<String, ConfigSyntaxError> {
    let Some(end) = rest.find(']') else {
        return Err(ConfigSyntaxError::new(line, "expected ']'"));
    };
    let name = rest[..end].trim();
    if name.is_empty() {
        return Err(ConfigSyntaxError::new(line, "empty section name"));
    }

    let trailing = rest[end + 1..].trim_start();
    if !(trailing.is_empty() || trailing.starts_with('#') || trailing.starts_with(';')) {
        return Err(ConfigSyntaxError::new(line, "expected end of line after ']'"));
    }
    Ok(name.to_lowercase())
}

fn parse_value(raw: &str) -> String {
    let mut in_quotes = false;
    let mut end = raw.len();
    for (i, ch) in raw.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => {
                end = i;
                break;
            }
            _ => {}
        }
    }

    let value = raw[..end].trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}
