//! Line-reading file source/transform node.

use crate::error::{Error, Result};
use crate::node::{Context, Node};
use crate::value::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

/// Emits lines from files, newline stripped.
///
/// Works two ways:
/// - constructed with a path (`FileLines::new("input.txt")`), a pure source
///   emitting that file's lines during setup;
/// - constructed bare (`FileLines::from_upstream()`), a transform treating
///   each incoming string value as a path and emitting its lines.
#[derive(Clone, Default)]
pub struct FileLines {
    path: Option<PathBuf>,
}

impl FileLines {
    /// Read lines from one file named at construction.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Read lines from every filename received from upstream.
    pub fn from_upstream() -> Self {
        Self::default()
    }

    fn emit_file(&self, path: &std::path::Path, ctx: &mut Context) -> Result<()> {
        let reader = BufReader::new(File::open(path)?);
        for line in reader.lines() {
            ctx.emit(line?)?;
        }
        Ok(())
    }
}

impl Node for FileLines {
    fn setup(&mut self, ctx: &mut Context) -> Result<()> {
        if let Some(path) = self.path.take() {
            self.emit_file(&path, ctx)?;
        }
        Ok(())
    }

    fn process(&mut self, value: Value, ctx: &mut Context) -> Result<()> {
        let path = value
            .as_str()
            .ok_or_else(|| Error::Node(format!("FileLines expects a path string, got {value}")))?;
        self.emit_file(std::path::Path::new(path), ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::Backend;
    use crate::nodes::IterSrc;
    use crate::pipeline::Pipeline;
    use std::io::Write;

    fn fixture(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_lines_from_constructor() {
        let f = fixture("Line1\nLine2\nLine3\n");
        let pipeline = Pipeline::with_backend(Backend::Sync);
        let lines = pipeline.add(FileLines::new(f.path())).unwrap();
        assert_eq!(
            lines.results().unwrap(),
            vec![
                Value::Str("Line1".into()),
                Value::Str("Line2".into()),
                Value::Str("Line3".into())
            ]
        );
    }

    #[test]
    fn test_lines_from_upstream_paths() {
        let f = fixture("a\nb\n");
        let path = f.path().to_string_lossy().into_owned();

        let pipeline = Pipeline::with_backend(Backend::Sync);
        let src = pipeline.add(IterSrc::new([path])).unwrap();
        let lines = pipeline.add(FileLines::from_upstream()).unwrap();
        src.feeds_into(&lines).unwrap();
        assert_eq!(
            lines.results().unwrap(),
            vec![Value::Str("a".into()), Value::Str("b".into())]
        );
    }
}
