//! Serialization of a [`PatchGraph`] to the solver's four-file format.
//!
//! One run produces `<name>.index`, `<name>.patches`, `<name>.links`, and
//! `<name>.problem` under a shared directory. The set is written once,
//! sequentially, and is only meaningful as a whole: a run that aborts
//! mid-write leaves an invalid set with no partial-recovery semantics.
//! Column names and field order are part of the contract with the external
//! optimizer and must not change.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::info;

use crate::error::FileSetError;
use crate::model::{ActionElement, Link, PatchGraph, PatchId, RestorationAction};

const INDEX_HEADER: &str = "patches_file,links_file";
const PATCHES_HEADER: &str = "id,weight,x,y";
const LINKS_HEADER: &str = "source_id,target_id,probability";

/// Paths of one serialized graph file set.
///
/// # Examples
/// ```
/// use landgraph_core::GraphFileSet;
///
/// let set = GraphFileSet::new("out", "quebec");
/// assert!(set.index_path().ends_with("quebec.index"));
/// assert!(set.problem_path().ends_with("quebec.problem"));
/// ```
#[derive(Debug, Clone)]
pub struct GraphFileSet {
    directory: PathBuf,
    name: String,
}

impl GraphFileSet {
    /// Addresses the file set `<directory>/<name>.{index,patches,links,problem}`.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            name: name.into(),
        }
    }

    /// Path of the index manifest.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.path_with_extension("index")
    }

    /// Path of the patches table.
    #[must_use]
    pub fn patches_path(&self) -> PathBuf {
        self.path_with_extension("patches")
    }

    /// Path of the links table.
    #[must_use]
    pub fn links_path(&self) -> PathBuf {
        self.path_with_extension("links")
    }

    /// Path of the restoration-problem file.
    #[must_use]
    pub fn problem_path(&self) -> PathBuf {
        self.path_with_extension("problem")
    }

    fn path_with_extension(&self, extension: &str) -> PathBuf {
        self.directory.join(format!("{}.{extension}", self.name))
    }

    /// Writes the whole file set.
    ///
    /// Files are created and flushed in a fixed order (index, patches,
    /// links, problem). Identical graphs serialize to byte-identical files.
    ///
    /// # Errors
    /// Returns [`FileSetError::Io`] naming the file that failed; the set
    /// must then be treated as invalid in its entirety.
    #[tracing::instrument(skip_all, fields(name = %self.name))]
    pub fn write(&self, graph: &PatchGraph) -> Result<(), FileSetError> {
        self.write_index()?;
        self.write_patches(graph)?;
        self.write_links(graph)?;
        self.write_problem(graph)?;
        info!(
            index = %self.index_path().display(),
            patches = graph.patches().len(),
            links = graph.links().len(),
            actions = graph.actions().len(),
            "file set written"
        );
        Ok(())
    }

    fn create(&self, path: &Path) -> Result<BufWriter<File>, FileSetError> {
        let file = File::create(path).map_err(|source| FileSetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(BufWriter::new(file))
    }

    fn finish(path: &Path, mut writer: BufWriter<File>) -> Result<(), FileSetError> {
        writer.flush().map_err(|source| FileSetError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write_index(&self) -> Result<(), FileSetError> {
        let path = self.index_path();
        let mut writer = self.create(&path)?;
        write_io(&path, || {
            writeln!(writer, "{INDEX_HEADER}")?;
            writeln!(writer, "{0}.patches,{0}.links", self.name)
        })?;
        Self::finish(&path, writer)
    }

    fn write_patches(&self, graph: &PatchGraph) -> Result<(), FileSetError> {
        let path = self.patches_path();
        let mut writer = self.create(&path)?;
        write_io(&path, || {
            writeln!(writer, "{PATCHES_HEADER}")?;
            for patch in graph.patches() {
                writeln!(writer, "{},{},{},{}", patch.id, patch.weight, patch.x, patch.y)?;
            }
            Ok(())
        })?;
        Self::finish(&path, writer)
    }

    fn write_links(&self, graph: &PatchGraph) -> Result<(), FileSetError> {
        let path = self.links_path();
        let mut writer = self.create(&path)?;
        write_io(&path, || {
            writeln!(writer, "{LINKS_HEADER}")?;
            for link in graph.links() {
                writeln!(writer, "{},{},{}", link.source, link.target, link.probability)?;
            }
            Ok(())
        })?;
        Self::finish(&path, writer)
    }

    fn write_problem(&self, graph: &PatchGraph) -> Result<(), FileSetError> {
        let path = self.problem_path();
        let mut writer = self.create(&path)?;
        write_io(&path, || {
            for action in graph.actions() {
                writeln!(writer, "{} {}", action.cost, action.elements.len())?;
                for element in &action.elements {
                    match *element {
                        ActionElement::NodeGain { patch, gain } => {
                            writeln!(writer, "\tn {patch} {gain}")?;
                        }
                        ActionElement::ArcCapacity {
                            source,
                            target,
                            capacity,
                        } => {
                            writeln!(writer, "\ta {source} {target} {capacity}")?;
                        }
                    }
                }
            }
            Ok(())
        })?;
        Self::finish(&path, writer)
    }

    /// Re-parses a previously written file set.
    ///
    /// The reconstructed graph is fully re-validated, so a hand-edited set
    /// that breaks mirror symmetry or referential integrity is rejected.
    ///
    /// # Errors
    /// Returns [`FileSetError`] for unreadable files, malformed rows, or a
    /// graph that fails [`PatchGraph::validate`].
    pub fn read(&self) -> Result<PatchGraph, FileSetError> {
        self.read_index()?;
        let mut graph = PatchGraph::new();
        self.read_patches(&mut graph)?;
        self.read_links(&mut graph)?;
        self.read_problem(&mut graph)?;
        graph.validate()?;
        Ok(graph)
    }

    fn read_index(&self) -> Result<(), FileSetError> {
        let path = self.index_path();
        let text = read_file(&path)?;
        let mut lines = text.lines();
        let header = lines.next().unwrap_or_default();
        if normalize(header) != INDEX_HEADER {
            return Err(malformed(&path, 1, format!("expected header `{INDEX_HEADER}`")));
        }
        let row = lines
            .next()
            .ok_or_else(|| malformed(&path, 2, "missing file-name row".to_owned()))?;
        if row.split(',').count() != 2 {
            return Err(malformed(&path, 2, "expected two file names".to_owned()));
        }
        Ok(())
    }

    fn read_patches(&self, graph: &mut PatchGraph) -> Result<(), FileSetError> {
        let path = self.patches_path();
        let text = read_file(&path)?;
        let mut lines = text.lines().enumerate();
        let (_, header) = lines
            .next()
            .ok_or_else(|| malformed(&path, 1, "empty patches file".to_owned()))?;
        if normalize(header) != PATCHES_HEADER {
            return Err(malformed(&path, 1, format!("expected header `{PATCHES_HEADER}`")));
        }
        for (index, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let number = index + 1;
            let fields = split_csv(line, &path, number, 4)?;
            let id: u64 = parse_number(&fields[0], &path, number)?;
            let weight = parse_number(&fields[1], &path, number)?;
            let x = parse_number(&fields[2], &path, number)?;
            let y = parse_number(&fields[3], &path, number)?;
            let assigned = graph.add_patch(weight, x, y)?;
            if assigned.get() != id {
                return Err(malformed(
                    &path,
                    number,
                    format!("expected patch id {}, found {id}", assigned.get()),
                ));
            }
        }
        Ok(())
    }

    fn read_links(&self, graph: &mut PatchGraph) -> Result<(), FileSetError> {
        let path = self.links_path();
        let text = read_file(&path)?;
        let mut lines = text.lines().enumerate();
        let (_, header) = lines
            .next()
            .ok_or_else(|| malformed(&path, 1, "empty links file".to_owned()))?;
        if normalize(header) != LINKS_HEADER {
            return Err(malformed(&path, 1, format!("expected header `{LINKS_HEADER}`")));
        }
        for (index, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let number = index + 1;
            let fields = split_csv(line, &path, number, 3)?;
            let source: u64 = parse_number(&fields[0], &path, number)?;
            let target: u64 = parse_number(&fields[1], &path, number)?;
            let probability = parse_number(&fields[2], &path, number)?;
            // Mirror symmetry is restored by the final validate pass.
            graph.push_raw_link(Link {
                source: PatchId::new(source),
                target: PatchId::new(target),
                probability,
            });
        }
        Ok(())
    }

    fn read_problem(&self, graph: &mut PatchGraph) -> Result<(), FileSetError> {
        let path = self.problem_path();
        let text = read_file(&path)?;
        let mut lines = text.lines().enumerate();
        while let Some((index, line)) = lines.next() {
            if line.trim().is_empty() {
                continue;
            }
            let number = index + 1;
            let mut parts = line.split_whitespace();
            let cost = parse_token(parts.next(), &path, number, "action cost")?;
            let count: usize = parse_token(parts.next(), &path, number, "element count")?;
            // The count is untrusted; never preallocate from it.
            let mut elements = Vec::new();
            for _ in 0..count {
                let (element_index, element_line) = lines.next().ok_or_else(|| {
                    malformed(&path, number, "action block is truncated".to_owned())
                })?;
                elements.push(parse_element(element_line, &path, element_index + 1)?);
            }
            graph.add_action(RestorationAction { cost, elements })?;
        }
        Ok(())
    }
}

fn parse_element(line: &str, path: &Path, number: usize) -> Result<ActionElement, FileSetError> {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("n") => {
            let patch: u64 = parse_token(parts.next(), path, number, "patch id")?;
            let gain = parse_token(parts.next(), path, number, "gain")?;
            Ok(ActionElement::NodeGain {
                patch: PatchId::new(patch),
                gain,
            })
        }
        Some("a") => {
            let source: u64 = parse_token(parts.next(), path, number, "source id")?;
            let target: u64 = parse_token(parts.next(), path, number, "target id")?;
            let capacity = parse_token(parts.next(), path, number, "capacity")?;
            Ok(ActionElement::ArcCapacity {
                source: PatchId::new(source),
                target: PatchId::new(target),
                capacity,
            })
        }
        other => Err(malformed(
            path,
            number,
            format!("expected element kind `n` or `a`, found {other:?}"),
        )),
    }
}

fn write_io<F>(path: &Path, body: F) -> Result<(), FileSetError>
where
    F: FnOnce() -> std::io::Result<()>,
{
    body().map_err(|source| FileSetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_file(path: &Path) -> Result<String, FileSetError> {
    fs::read_to_string(path).map_err(|source| FileSetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn malformed(path: &Path, line: usize, reason: String) -> FileSetError {
    FileSetError::Malformed {
        path: path.to_path_buf(),
        line,
        reason,
    }
}

fn normalize(header: &str) -> String {
    header.replace(' ', "")
}

fn split_csv(
    line: &str,
    path: &Path,
    number: usize,
    expected: usize,
) -> Result<Vec<String>, FileSetError> {
    let fields: Vec<String> = line.split(',').map(|field| field.trim().to_owned()).collect();
    if fields.len() != expected {
        return Err(malformed(
            path,
            number,
            format!("expected {expected} fields, found {}", fields.len()),
        ));
    }
    Ok(fields)
}

fn parse_number<T: FromStr>(raw: &str, path: &Path, number: usize) -> Result<T, FileSetError> {
    raw.parse()
        .map_err(|_| malformed(path, number, format!("cannot parse `{raw}` as a number")))
}

fn parse_token<T: FromStr>(
    token: Option<&str>,
    path: &Path,
    number: usize,
    what: &str,
) -> Result<T, FileSetError> {
    let raw = token.ok_or_else(|| malformed(path, number, format!("missing {what}")))?;
    raw.parse()
        .map_err(|_| malformed(path, number, format!("cannot parse `{raw}` as {what}")))
}
