use std::num::Wrapping;

/// Yields `0000`, `0001`, ... `ffff`, then wraps around to `0000`.
#[derive(Debug)]
pub struct TagGenerator {
    last_tag: Wrapping<u16>,
}

impl Iterator for TagGenerator {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        self.last_tag += 1;
        Some(format!("{:04x}", self.last_tag))
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self {
            last_tag: Wrapping(u16::MAX),
        }
    }
}
