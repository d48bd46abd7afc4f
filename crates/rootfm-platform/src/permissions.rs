use std::fmt;

use serde::{Deserialize, Serialize};

/// Unix permission triple for owner/group/other.
///
/// Convertible from a 10-character symbolic string (the leading type flag is
/// ignored) and to the 3-digit octal form used by `chmod`. Equality is
/// field-wise over the nine bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub ur: bool,
    pub uw: bool,
    pub ux: bool,
    pub gr: bool,
    pub gw: bool,
    pub gx: bool,
    pub or: bool,
    pub ow: bool,
    pub ox: bool,
}

impl Permissions {
    /// Build from three explicit rwx triples (owner, group, other).
    pub fn from_triples(owner: (bool, bool, bool), group: (bool, bool, bool), other: (bool, bool, bool)) -> Self {
        Self {
            ur: owner.0,
            uw: owner.1,
            ux: owner.2,
            gr: group.0,
            gw: group.1,
            gx: group.2,
            or: other.0,
            ow: other.1,
            ox: other.2,
        }
    }

    /// Parse a symbolic permission string as printed by `ls -l`, e.g.
    /// `drwxr-xr-x`. The first character (type flag) is skipped; a bare
    /// 9-character `rwxr-xr-x` is accepted too. Returns `None` on any
    /// unexpected length or character.
    pub fn from_symbolic(s: &str) -> Option<Self> {
        let bits: Vec<char> = s.chars().collect();
        let rwx = match bits.len() {
            10 => &bits[1..10],
            9 => &bits[0..9],
            _ => return None,
        };
        let flag = |c: char, set: char| -> Option<bool> {
            if c == set {
                Some(true)
            } else if c == '-' {
                Some(false)
            } else {
                None
            }
        };
        Some(Self {
            ur: flag(rwx[0], 'r')?,
            uw: flag(rwx[1], 'w')?,
            ux: flag(rwx[2], 'x')?,
            gr: flag(rwx[3], 'r')?,
            gw: flag(rwx[4], 'w')?,
            gx: flag(rwx[5], 'x')?,
            or: flag(rwx[6], 'r')?,
            ow: flag(rwx[7], 'w')?,
            ox: flag(rwx[8], 'x')?,
        })
    }

    /// Build from the low nine bits of a unix mode word.
    pub fn from_mode(mode: u32) -> Self {
        Self {
            ur: mode & 0o400 != 0,
            uw: mode & 0o200 != 0,
            ux: mode & 0o100 != 0,
            gr: mode & 0o040 != 0,
            gw: mode & 0o020 != 0,
            gx: mode & 0o010 != 0,
            or: mode & 0o004 != 0,
            ow: mode & 0o002 != 0,
            ox: mode & 0o001 != 0,
        }
    }

    pub fn mode(&self) -> u32 {
        let triple = |r: bool, w: bool, x: bool| -> u32 {
            (r as u32) << 2 | (w as u32) << 1 | (x as u32)
        };
        triple(self.ur, self.uw, self.ux) << 6
            | triple(self.gr, self.gw, self.gx) << 3
            | triple(self.or, self.ow, self.ox)
    }

    /// The 3-digit octal form used for `chmod`, e.g. `755`.
    pub fn octal_string(&self) -> String {
        format!("{:03o}", self.mode())
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bit = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "{}{}{}{}{}{}{}{}{}",
            bit(self.ur, 'r'),
            bit(self.uw, 'w'),
            bit(self.ux, 'x'),
            bit(self.gr, 'r'),
            bit(self.gw, 'w'),
            bit(self.gx, 'x'),
            bit(self.or, 'r'),
            bit(self.ow, 'w'),
            bit(self.ox, 'x'),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbolic_with_type_flag() {
        let p = Permissions::from_symbolic("drwxr-xr-x").unwrap();
        assert!(p.ur && p.uw && p.ux);
        assert!(p.gr && !p.gw && p.gx);
        assert!(p.or && !p.ow && p.ox);
        assert_eq!(p.octal_string(), "755");
    }

    #[test]
    fn symbolic_rejects_garbage() {
        assert!(Permissions::from_symbolic("").is_none());
        assert!(Permissions::from_symbolic("drwxr-xr").is_none());
        assert!(Permissions::from_symbolic("drwxr-xr-q").is_none());
    }

    #[test]
    fn octal_round_trip_through_symbolic() {
        // every triple combination survives octal -> symbolic -> octal
        for mode in 0..0o1000 {
            let p = Permissions::from_mode(mode);
            let symbolic = format!("-{}", p);
            let back = Permissions::from_symbolic(&symbolic).unwrap();
            assert_eq!(p, back);
            assert_eq!(back.mode(), mode);
        }
    }

    #[test]
    fn display_matches_ls() {
        let p = Permissions::from_triples((true, true, false), (true, false, false), (false, false, false));
        assert_eq!(p.to_string(), "rw-r-----");
        assert_eq!(p.octal_string(), "640");
    }
}
