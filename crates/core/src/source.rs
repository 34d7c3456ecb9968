//! Source positions and the macro-expansion source map.
//!
//! Every AST node carries a [`Provenance`] pointing at original source.
//! When text was produced by vocabulary expansion, the [`SourceMap`] built
//! alongside the expanded text translates expanded line numbers back to the
//! line of the originating `@use` call, so diagnostics from later stages
//! always land on something the author actually wrote.

/// Original source position of a declaration. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Provenance {
    pub fn new(file: &str, line: u32, column: u32) -> Self {
        Provenance {
            file: file.to_owned(),
            line,
            column,
        }
    }
}

/// Line-level mapping from expanded text back to original source lines.
///
/// Entry `i` (0-based) holds the original 1-based line for expanded line
/// `i + 1`. Lines that passed through expansion untouched map to themselves;
/// lines emitted by a template all map to the `@use` invocation line.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    lines: Vec<u32>,
}

impl SourceMap {
    pub fn new() -> Self {
        SourceMap { lines: Vec::new() }
    }

    /// Identity map for text that went through no expansion.
    pub fn identity(line_count: usize) -> Self {
        SourceMap {
            lines: (1..=line_count as u32).collect(),
        }
    }

    /// Record that the next expanded line originates at `original_line`.
    pub fn push(&mut self, original_line: u32) {
        self.lines.push(original_line);
    }

    /// Translate an expanded 1-based line to its original 1-based line.
    /// Out-of-range lines (e.g. a synthetic EOF token) pass through.
    pub fn resolve(&self, expanded_line: u32) -> u32 {
        if expanded_line == 0 {
            return 0;
        }
        self.lines
            .get(expanded_line as usize - 1)
            .copied()
            .unwrap_or(expanded_line)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_maps_lines_to_themselves() {
        let map = SourceMap::identity(3);
        assert_eq!(map.resolve(1), 1);
        assert_eq!(map.resolve(3), 3);
    }

    #[test]
    fn expanded_lines_map_to_invocation_line() {
        let mut map = SourceMap::new();
        map.push(1); // original line 1
        map.push(2); // @use on original line 2 produced two lines
        map.push(2);
        map.push(3);
        assert_eq!(map.resolve(2), 2);
        assert_eq!(map.resolve(3), 2);
        assert_eq!(map.resolve(4), 3);
    }

    #[test]
    fn out_of_range_passes_through() {
        let map = SourceMap::identity(2);
        assert_eq!(map.resolve(9), 9);
        assert_eq!(map.resolve(0), 0);
    }
}
