//! Line model for `key=value` configuration files.
//!
//! A file is tokenized into [`ConfigLine`]s that keep their raw text,
//! terminator included. Rendering a document concatenates the raw text, so
//! any line that was not explicitly replaced comes back byte-for-byte.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    Comment,
    /// `[NAME]` header
    Section(String),
    /// `key=value`; the key is the text before the first `=`, untrimmed
    Entry { key: String, value: String },
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLine {
    raw: String,
    kind: LineKind,
}

impl ConfigLine {
    pub fn parse(raw: &str) -> Self {
        let content = strip_terminator(raw);
        let trimmed = content.trim();

        let kind = if trimmed.is_empty() {
            LineKind::Blank
        } else if trimmed.starts_with('#') || trimmed.starts_with(';') {
            LineKind::Comment
        } else if let Some(rest) = content.strip_prefix('[') {
            let name = rest.split(']').next().unwrap_or(rest).trim().to_string();
            LineKind::Section(name)
        } else if let Some((key, value)) = content.split_once('=') {
            LineKind::Entry {
                key: key.to_string(),
                value: value.trim().to_string(),
            }
        } else {
            LineKind::Other
        };

        Self {
            raw: raw.to_string(),
            kind,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> &LineKind {
        &self.kind
    }

    pub fn entry(&self) -> Option<(&str, &str)> {
        match &self.kind {
            LineKind::Entry { key, value } => Some((key, value)),
            _ => None,
        }
    }

    /// `"\r\n"`, `"\n"`, or `""` for a final line without newline
    pub fn terminator(&self) -> &str {
        &self.raw[strip_terminator(&self.raw).len()..]
    }
}

fn strip_terminator(raw: &str) -> &str {
    raw.strip_suffix("\r\n")
        .or_else(|| raw.strip_suffix('\n'))
        .unwrap_or(raw)
}

/// An ordered sequence of lines that renders back to its source text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    lines: Vec<ConfigLine>,
}

impl ConfigDocument {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.split_inclusive('\n').map(ConfigLine::parse).collect(),
        }
    }

    pub fn lines(&self) -> &[ConfigLine] {
        &self.lines
    }

    /// First entry whose key is exactly `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines
            .iter()
            .filter_map(ConfigLine::entry)
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Replace the first entry for `key` with `key=value`, keeping that line's
    /// terminator. Returns false when the key is absent.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        let Some(line) = self
            .lines
            .iter_mut()
            .find(|l| matches!(l.entry(), Some((k, _)) if k == key))
        else {
            return false;
        };
        let raw = format!("{}={}{}", key, value, line.terminator());
        *line = ConfigLine::parse(&raw);
        true
    }

    pub fn render(&self) -> String {
        self.lines.iter().map(ConfigLine::raw).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# panel settings\n\n[DEFAULT]\nssl=no\nport = 2083\r\nforce_domain=\nnotes\nlast=1";

    #[test]
    fn classifies_lines() {
        let doc = ConfigDocument::parse(SAMPLE);
        let kinds: Vec<_> = doc.lines().iter().map(|l| l.kind().clone()).collect();
        assert_eq!(kinds[0], LineKind::Comment);
        assert_eq!(kinds[1], LineKind::Blank);
        assert_eq!(kinds[2], LineKind::Section("DEFAULT".to_string()));
        assert_eq!(
            kinds[3],
            LineKind::Entry {
                key: "ssl".to_string(),
                value: "no".to_string()
            }
        );
        assert_eq!(kinds[6], LineKind::Other);
    }

    #[test]
    fn render_is_lossless() {
        assert_eq!(ConfigDocument::parse(SAMPLE).render(), SAMPLE);
        assert_eq!(ConfigDocument::parse("").render(), "");
    }

    #[test]
    fn keys_match_exactly() {
        let doc = ConfigDocument::parse(SAMPLE);
        assert_eq!(doc.get("ssl"), Some("no"));
        // "port = 2083" has key "port ", like a `port=` prefix check would
        assert_eq!(doc.get("port"), None);
        assert_eq!(doc.get("force_domain"), Some(""));
        assert_eq!(doc.get("# panel settings"), None);
    }

    #[test]
    fn set_keeps_terminators() {
        let mut doc = ConfigDocument::parse("a=1\r\nb=2\nc=3");
        assert!(doc.set("a", "x"));
        assert!(doc.set("c", "y"));
        assert_eq!(doc.render(), "a=x\r\nb=2\nc=y");
    }

    #[test]
    fn set_touches_only_first_match() {
        let mut doc = ConfigDocument::parse("a=1\na=2\n");
        assert!(doc.set("a", "9"));
        assert_eq!(doc.render(), "a=9\na=2\n");
        assert!(!doc.set("missing", "1"));
    }
}
