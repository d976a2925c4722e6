//! Mapping from rewritten source offsets back to original offsets

use crate::error::{CompilerError, Result};
use crate::utils::LineIndex;
use serde::Serialize;
use sourcemap::{SourceMap, SourceMapBuilder};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SegmentKind {
    /// Prelude text with no original counterpart
    Inserted,
    /// Original text copied byte for byte
    Copied,
    /// A construct replaced by generated code
    Replaced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub generated: Range<usize>,
    /// Empty for inserted text
    pub original: Range<usize>,
}

/// Ordered, contiguous segments covering the whole rewritten buffer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PositionMap {
    segments: Vec<Segment>,
}

impl PositionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn generated_end(&self) -> usize {
        self.segments.last().map(|s| s.generated.end).unwrap_or(0)
    }

    fn push(&mut self, kind: SegmentKind, generated_len: usize, original: Range<usize>) {
        if generated_len == 0 && original.is_empty() {
            return;
        }
        let start = self.generated_end();
        self.segments.push(Segment {
            kind,
            generated: start..start + generated_len,
            original,
        });
    }

    pub fn push_inserted(&mut self, len: usize) {
        self.push(SegmentKind::Inserted, len, 0..0);
    }

    pub fn push_copied(&mut self, original: Range<usize>) {
        let len = original.len();
        self.push(SegmentKind::Copied, len, original);
    }

    pub fn push_replaced(&mut self, generated_len: usize, original: Range<usize>) {
        self.push(SegmentKind::Replaced, generated_len, original);
    }

    fn segment_at(&self, generated: usize) -> Option<&Segment> {
        let index = self
            .segments
            .partition_point(|segment| segment.generated.end <= generated);
        self.segments
            .get(index)
            .filter(|segment| segment.generated.contains(&generated))
    }

    /// Original offset for a rewritten offset. Copied text maps byte for byte,
    /// generated code maps to the start of the construct it replaced and the
    /// inserted prelude has no original position.
    pub fn original_offset(&self, generated: usize) -> Option<usize> {
        if generated == self.generated_end() {
            return self.segments.last().map(|segment| segment.original.end);
        }
        let segment = self.segment_at(generated)?;
        match segment.kind {
            SegmentKind::Inserted => None,
            SegmentKind::Copied => Some(segment.original.start + (generated - segment.generated.start)),
            SegmentKind::Replaced => Some(segment.original.start),
        }
    }

    /// V3 source map: one token per segment start and per line start inside
    /// copied text
    pub fn to_source_map(&self, generated: &str, original: &str, file: &str) -> SourceMap {
        let generated_lines = LineIndex::new(generated);
        let original_lines = LineIndex::new(original);

        let mut builder = SourceMapBuilder::new(None);
        let source_id = builder.add_source(file);
        builder.set_source_contents(source_id, Some(original));

        for segment in &self.segments {
            if segment.kind == SegmentKind::Inserted {
                continue;
            }
            let (dst_line, dst_col) = generated_lines.position(segment.generated.start);
            let (src_line, src_col) = original_lines.position(segment.original.start);
            builder.add_raw(dst_line, dst_col, src_line, src_col, Some(source_id), None, false);

            if segment.kind == SegmentKind::Copied {
                for &line_start in generated_lines.line_starts() {
                    if line_start <= segment.generated.start || line_start >= segment.generated.end {
                        continue;
                    }
                    let original_offset = segment.original.start + (line_start - segment.generated.start);
                    let (dst_line, dst_col) = generated_lines.position(line_start);
                    let (src_line, src_col) = original_lines.position(original_offset);
                    builder.add_raw(dst_line, dst_col, src_line, src_col, Some(source_id), None, false);
                }
            }
        }

        builder.into_sourcemap()
    }

    pub fn to_source_map_json(&self, generated: &str, original: &str, file: &str) -> Result<String> {
        let mut bytes = Vec::new();
        self.to_source_map(generated, original, file)
            .to_writer(&mut bytes)
            .map_err(|e| CompilerError::SourceMap {
                message: format!("Failed to serialize source map for {}: {}", file, e),
            })?;
        String::from_utf8(bytes).map_err(|e| CompilerError::SourceMap {
            message: format!("Source map for {} is not UTF-8: {}", file, e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// "PRE" + "ab" + "<X>" (for "cd") + "ef"
    fn sample() -> (PositionMap, &'static str, &'static str) {
        let original = "abcdef";
        let generated = "PREab<X>ef";
        let mut map = PositionMap::new();
        map.push_inserted(3);
        map.push_copied(0..2);
        map.push_replaced(3, 2..4);
        map.push_copied(4..6);
        (map, generated, original)
    }

    #[test]
    fn test_segments_are_contiguous() {
        let (map, generated, _) = sample();
        let mut expected_start = 0;
        for segment in map.segments() {
            assert_eq!(segment.generated.start, expected_start);
            expected_start = segment.generated.end;
        }
        assert_eq!(expected_start, generated.len());
    }

    #[test]
    fn test_original_offset_lookup() {
        let (map, _, _) = sample();
        assert_eq!(map.original_offset(0), None);
        assert_eq!(map.original_offset(2), None);
        assert_eq!(map.original_offset(3), Some(0));
        assert_eq!(map.original_offset(4), Some(1));
        assert_eq!(map.original_offset(5), Some(2));
        assert_eq!(map.original_offset(7), Some(2));
        assert_eq!(map.original_offset(8), Some(4));
        assert_eq!(map.original_offset(10), Some(6));
        assert_eq!(map.original_offset(11), None);
    }

    #[test]
    fn test_copied_segments_round_trip() {
        let (map, generated, original) = sample();
        for segment in map.segments().iter().filter(|s| s.kind == SegmentKind::Copied) {
            assert_eq!(&generated[segment.generated.clone()], &original[segment.original.clone()]);
        }
    }

    #[test]
    fn test_empty_pushes_are_ignored() {
        let mut map = PositionMap::new();
        map.push_inserted(0);
        map.push_copied(3..3);
        assert!(map.segments().is_empty());
        assert_eq!(map.original_offset(0), None);
    }

    #[test]
    fn test_source_map_tokens() {
        let original = "line1\nconst a = X;\nline3\n";
        let generated = "import 'x';\nline1\nconst a = Y(1);\nline3\n";
        let x = original.find('X').unwrap();
        let mut map = PositionMap::new();
        map.push_inserted(12);
        map.push_copied(0..x);
        map.push_replaced(4, x..x + 1);
        map.push_copied(x + 1..original.len());

        let source_map = map.to_source_map(generated, original, "a.ts");
        let token = source_map.lookup_token(2, 10).unwrap();
        assert_eq!(token.get_src_line(), 1);
        assert_eq!(token.get_src_col(), 10);

        let token = source_map.lookup_token(3, 0).unwrap();
        assert_eq!(token.get_src_line(), 2);

        let json = map.to_source_map_json(generated, original, "a.ts").unwrap();
        assert!(json.contains("\"sources\":[\"a.ts\"]"));
    }
}
