//! Keyfile (INI-style) documents
//!
//! The ostree repository config and deployment origin files use the GLib
//! keyfile format: `[section]` headers followed by `key=value` lines, with `#`
//! or `;` comments. This model keeps section order, key order and comments so
//! that a load/modify/save cycle only changes what the caller touched.

use std::fmt;
use std::path::Path;

use crate::{Error, Result, io};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Pair { key: String, value: String },
    Comment(String),
}

/// One `[name]` section of a keyfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<Entry>,
}

impl Section {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find_map(|e| match e {
            Entry::Pair { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Key/value pairs in file order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Pair { key, value } => Some((key.as_str(), value.as_str())),
            Entry::Comment(_) => None,
        })
    }

    fn set(&mut self, key: &str, value: &str) {
        for entry in &mut self.entries {
            if let Entry::Pair { key: k, value: v } = entry
                && k == key
            {
                *v = value.to_string();
                return;
            }
        }
        self.entries.push(Entry::Pair {
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self
            .entries
            .iter()
            .position(|e| matches!(e, Entry::Pair { key: k, .. } if k == key))?;
        match self.entries.remove(pos) {
            Entry::Pair { value, .. } => Some(value),
            Entry::Comment(_) => None,
        }
    }
}

/// An in-memory keyfile document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyFile {
    preamble: Vec<String>,
    sections: Vec<Section>,
}

impl KeyFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse keyfile text.
    ///
    /// A repeated `[section]` header continues the earlier section, and a
    /// repeated key takes the later value.
    pub fn parse(text: &str) -> Result<Self> {
        let mut doc = KeyFile::new();
        let mut current: Option<usize> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();

            if line.is_empty() {
                continue;
            }

            if line.starts_with('#') || line.starts_with(';') {
                match current {
                    Some(i) => doc.sections[i].entries.push(Entry::Comment(line.to_string())),
                    None => doc.preamble.push(line.to_string()),
                }
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest.strip_suffix(']').ok_or_else(|| Error::Syntax {
                    line: line_no,
                    message: format!("unterminated section header `{}`", line),
                })?;
                if name.trim().is_empty() {
                    return Err(Error::Syntax {
                        line: line_no,
                        message: "empty section name".to_string(),
                    });
                }
                current = Some(doc.section_index(name));
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| Error::Syntax {
                line: line_no,
                message: format!("expected `key=value`, found `{}`", line),
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(Error::Syntax {
                    line: line_no,
                    message: "empty key".to_string(),
                });
            }
            let i = current.ok_or_else(|| Error::Syntax {
                line: line_no,
                message: format!("key `{}` outside of any section", key),
            })?;
            doc.sections[i].set(key, value.trim());
        }

        Ok(doc)
    }

    /// Load and parse a keyfile from disk.
    ///
    /// Syntax errors are reported as [`Error::ConfigParse`] carrying the path.
    pub fn load(path: &Path) -> Result<Self> {
        let text = io::read_text(path)?;
        Self::parse(&text).map_err(|e| match e {
            Error::Syntax { line, message } => Error::ConfigParse {
                path: path.to_path_buf(),
                format: "keyfile".into(),
                message: format!("line {}: {}", line, message),
            },
            other => other,
        })
    }

    /// Write the document atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        io::write_text(path, &self.to_string())
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)?.get(key)
    }

    /// Set `key` in `section`, creating the section at the end if needed.
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.section_mut_or_insert(section).set(key, value);
    }

    pub fn remove_key(&mut self, section: &str, key: &str) -> Option<String> {
        self.sections
            .iter_mut()
            .find(|s| s.name == section)?
            .remove(key)
    }

    pub fn remove_section(&mut self, name: &str) -> bool {
        let before = self.sections.len();
        self.sections.retain(|s| s.name != name);
        self.sections.len() != before
    }

    /// Keep only the sections for which `keep` returns true.
    pub fn retain_sections(&mut self, mut keep: impl FnMut(&Section) -> bool) {
        self.sections.retain(|s| keep(s));
    }

    fn section_mut_or_insert(&mut self, name: &str) -> &mut Section {
        let idx = self.section_index(name);
        &mut self.sections[idx]
    }

    /// Position of `name`, appending an empty section if absent.
    fn section_index(&mut self, name: &str) -> usize {
        match self.sections.iter().position(|s| s.name == name) {
            Some(idx) => idx,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        }
    }
}

impl fmt::Display for KeyFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.preamble {
            writeln!(f, "{}", line)?;
        }
        if !self.preamble.is_empty() && !self.sections.is_empty() {
            writeln!(f)?;
        }
        for (idx, section) in self.sections.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            writeln!(f, "[{}]", section.name)?;
            for entry in &section.entries {
                match entry {
                    Entry::Pair { key, value } => writeln!(f, "{}={}", key, value)?,
                    Entry::Comment(text) => writeln!(f, "{}", text)?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const REPO_CONFIG: &str = r#"# managed by ostree
[core]
repo_version=1
mode = bare

[remote "awesome-ostree"]
url=http://awesome.example.com/ostree
gpg-verify=false
"#;

    #[test]
    fn parse_reads_sections_and_trims_values() {
        let doc = KeyFile::parse(REPO_CONFIG).unwrap();

        assert_eq!(
            doc.section_names().collect::<Vec<_>>(),
            vec!["core", "remote \"awesome-ostree\""]
        );
        assert_eq!(doc.get("core", "mode"), Some("bare"));
        assert_eq!(
            doc.get("remote \"awesome-ostree\"", "url"),
            Some("http://awesome.example.com/ostree")
        );
    }

    #[test]
    fn render_preserves_order_and_comments() {
        let doc = KeyFile::parse(REPO_CONFIG).unwrap();

        assert_eq!(
            doc.to_string(),
            "# managed by ostree\n\n[core]\nrepo_version=1\nmode=bare\n\n[remote \"awesome-ostree\"]\nurl=http://awesome.example.com/ostree\ngpg-verify=false\n"
        );
    }

    #[test]
    fn set_updates_in_place_and_appends_new_keys() {
        let mut doc = KeyFile::parse(REPO_CONFIG).unwrap();
        doc.set("core", "mode", "archive-z2");
        doc.set("core", "min-free-space-percent", "3");

        let core: Vec<_> = doc.section("core").unwrap().pairs().collect();
        assert_eq!(
            core,
            vec![
                ("repo_version", "1"),
                ("mode", "archive-z2"),
                ("min-free-space-percent", "3"),
            ]
        );
    }

    #[test]
    fn remove_section_and_key() {
        let mut doc = KeyFile::parse(REPO_CONFIG).unwrap();

        assert!(doc.remove_section("remote \"awesome-ostree\""));
        assert!(!doc.remove_section("remote \"awesome-ostree\""));
        assert_eq!(doc.remove_key("core", "mode"), Some("bare".to_string()));
        assert_eq!(doc.get("core", "mode"), None);
    }

    #[test]
    fn key_outside_section_is_rejected() {
        let err = KeyFile::parse("url=http://nowhere\n").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 1, .. }));
    }

    #[test]
    fn unterminated_header_is_rejected() {
        let err = KeyFile::parse("[core\nmode=bare\n").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 1, .. }));
    }

    #[test]
    fn duplicate_sections_are_merged() {
        let doc = KeyFile::parse(
            "[core]\nrepo_version=1\nmode=bare\n\n[remote \"a\"]\nurl=http://a\n\n[core]\nmode=archive\nfsync=false\n",
        )
        .unwrap();

        assert_eq!(doc.section_names().collect::<Vec<_>>(), vec!["core", "remote \"a\""]);
        let core: Vec<_> = doc.section("core").unwrap().pairs().collect();
        assert_eq!(
            core,
            vec![("repo_version", "1"), ("mode", "archive"), ("fsync", "false")]
        );
    }
}
