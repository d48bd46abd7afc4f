//! Shell command line construction.
//!
//! Paths are untrusted input; [`escape`] backslash-escapes the characters
//! that would split or re-quote a word in the shells we drive. This is
//! deliberately conservative path escaping, not full shell quoting — it is
//! safe for path-like strings only.

use std::path::MAIN_SEPARATOR;

/// Escape a path string for inclusion in a command line. Backslash,
/// double-quote, single-quote, backtick and space each get a single
/// backslash prefix; everything else passes through untouched.
pub fn escape(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if matches!(c, '\\' | '"' | '\'' | '`' | ' ') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Builds the concrete command strings the shell session executes.
///
/// Mutating and listing commands are prefixed with the configured privileged
/// helper binary (e.g. `busybox`) when one is set; plain probes (`stat`,
/// `test`) never are.
#[derive(Debug, Clone)]
pub struct Commands {
    helper: Option<String>,
    show_hidden: bool,
}

impl Commands {
    pub fn new(helper: Option<String>, show_hidden: bool) -> Self {
        Self { helper, show_hidden }
    }

    fn prefixed(&self, rest: String) -> String {
        match &self.helper {
            Some(h) => format!("{h} {rest}"),
            None => rest,
        }
    }

    fn ls_flags(&self) -> &'static str {
        if self.show_hidden {
            "-lA -n -p -e"
        } else {
            "-l -n -p -e"
        }
    }

    /// List a directory's children, one listing line per entry. A trailing
    /// separator is appended so the lister reports the directory's contents
    /// rather than the directory itself.
    pub fn list_dir(&self, path: &str) -> String {
        let mut escaped = escape(path);
        if !escaped.ends_with(MAIN_SEPARATOR) {
            escaped.push(MAIN_SEPARATOR);
        }
        self.prefixed(format!("ls {} {}", self.ls_flags(), escaped))
    }

    /// List a single entry; `-d` keeps the lister from recursing into a
    /// directory target.
    pub fn list_entry(&self, path: &str) -> String {
        self.prefixed(format!("ls -l -n -p -e -d {}", escape(path)))
    }

    pub fn touch(&self, path: &str) -> String {
        self.prefixed(format!("touch {}", escape(path)))
    }

    pub fn mkdir(&self, path: &str, parents: bool) -> String {
        if parents {
            self.prefixed(format!("mkdir -p {}", escape(path)))
        } else {
            self.prefixed(format!("mkdir {}", escape(path)))
        }
    }

    pub fn copy(&self, source: &str, target: &str) -> String {
        self.prefixed(format!("cp -rfp {} {}", escape(source), escape(target)))
    }

    pub fn r#move(&self, source: &str, target: &str) -> String {
        self.prefixed(format!("mv -f {} {}", escape(source), escape(target)))
    }

    pub fn remove(&self, path: &str) -> String {
        self.prefixed(format!("rm -rf {}", escape(path)))
    }

    pub fn chmod(&self, octal: &str, path: &str) -> String {
        self.prefixed(format!("chmod {} {}", octal, escape(path)))
    }

    /// Filesystem type probe; emits one line such as `vfat` or `ext4`.
    /// Not helper-prefixed.
    pub fn fs_type(&self, path: &str) -> String {
        format!("stat -f -c \"%T\" {}", escape(path))
    }

    /// Existence probe; emits the literal line `exists` when the path is
    /// present. Not helper-prefixed.
    pub fn exists_probe(&self, path: &str) -> String {
        format!("test -e {} && echo exists", escape(path))
    }
}
