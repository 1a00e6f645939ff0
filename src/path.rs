//! Property path grammar shared by the schema locator and the projector.
//!
//! `.` descends into an object property and `@` descends into every item of an
//! array: `items@foo` selects `foo` from each element of `items`. A leading `@`
//! (as in `@foo`) addresses the items of a root-level array. Paths are consumed
//! strictly left to right, so `a@b.c@d` means "for each item of `a`, descend into
//! `b`, then for each item of `c`, select `d`".

use std::fmt;

/// One step of a property path. `pluck` is true when the step is followed by `@`,
/// i.e. the value under `key` is an array whose items the rest of the path addresses.
/// A segment with an empty key and `pluck` set addresses the items of the current value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Segment {
    pub key: String,
    pub pluck: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PropPath {
    segments: Vec<Segment>,
}

impl PropPath {
    pub fn parse(raw: &str) -> Self {
        let mut segments = Vec::new();
        let mut key = String::new();
        for c in raw.chars() {
            match c {
                '.' => {
                    if !key.is_empty() {
                        segments.push(Segment {
                            key: std::mem::take(&mut key),
                            pluck: false,
                        });
                    }
                }
                '@' => segments.push(Segment {
                    key: std::mem::take(&mut key),
                    pluck: true,
                }),
                _ => key.push(c),
            }
        }
        if !key.is_empty() {
            segments.push(Segment { key, pluck: false });
        }
        PropPath { segments }
    }

    pub fn parse_all<S: AsRef<str>>(raw: &[S]) -> Vec<PropPath> {
        raw.iter()
            .map(|p| PropPath::parse(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn head(&self) -> Option<&Segment> {
        self.segments.first()
    }

    /// A single object key with nothing nested below it.
    pub fn is_flat(&self) -> bool {
        matches!(self.segments.as_slice(), [only] if !only.pluck)
    }

    /// True when the path starts with a bare `@`.
    pub fn starts_with_pluck(&self) -> bool {
        matches!(self.segments.first(), Some(s) if s.key.is_empty() && s.pluck)
    }

    pub fn strip_leading_pluck(&self) -> PropPath {
        if self.starts_with_pluck() {
            PropPath {
                segments: self.segments[1..].to_vec(),
            }
        } else {
            self.clone()
        }
    }

    /// The path below the head. When the head plucks, the remainder keeps a leading
    /// `@` so that it still addresses array items when applied to the nested value.
    pub fn tail(&self) -> PropPath {
        let Some(head) = self.segments.first() else {
            return self.clone();
        };
        let mut segments = Vec::with_capacity(self.segments.len());
        if head.pluck && !head.key.is_empty() {
            segments.push(Segment {
                key: String::new(),
                pluck: true,
            });
        }
        segments.extend_from_slice(&self.segments[1..]);
        PropPath { segments }
    }

    /// Top-level key name (the first non-empty key).
    pub fn root_key(&self) -> Option<&str> {
        self.segments
            .iter()
            .map(|s| s.key.as_str())
            .find(|k| !k.is_empty())
    }
}

impl fmt::Display for PropPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last = self.segments.len().saturating_sub(1);
        for (i, s) in self.segments.iter().enumerate() {
            f.write_str(&s.key)?;
            if s.pluck {
                f.write_str("@")?;
            } else if i < last {
                f.write_str(".")?;
            }
        }
        Ok(())
    }
}

impl From<&str> for PropPath {
    fn from(raw: &str) -> Self {
        PropPath::parse(raw)
    }
}
