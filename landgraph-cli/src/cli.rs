//! Command-line interface orchestration for landgraph.
//!
//! Two subcommands: `build` runs the threat-splitting transform over raw
//! survey tables, and `worst-case` synthesizes an adversarial instance.
//! Both end by serializing a patch graph as a four-file set and returning a
//! summary for stdout.

use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;

use landgraph_core::{
    Bounds, FileSetError, GeneratorError, GraphFileSet, PatchGraph, SurveyError, ThreatError,
    ThreatGraphBuilder, WorstCaseGenerator, WorstCaseKind, survey,
    threat::DEFAULT_SPLIT_OFFSET, worst_case::DEFAULT_EPSILON,
};

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(
    name = "landgraph",
    about = "Produce patch-graph file sets for the landscape-connectivity optimizer."
)]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Convert raw survey tables into a patch-graph file set.
    Build(BuildCommand),
    /// Generate an adversarial instance for greedy-policy regression tests.
    WorstCase(WorstCaseCommand),
}

/// Options accepted by the `build` command.
#[derive(Debug, Args, Clone)]
pub struct BuildCommand {
    /// Vertex table (`count area count2050 menace xcoord ycoord`).
    pub vertices: PathBuf,

    /// Edge table (`from to probdistGAP`).
    pub edges: PathBuf,

    /// Directory the file set is written into.
    #[arg(long, default_value = ".")]
    pub output: PathBuf,

    /// Base name of the file set (defaults to the vertex file's stem).
    #[arg(long)]
    pub name: Option<String>,

    /// Field delimiter of the input tables.
    #[arg(long, default_value_t = ' ')]
    pub delimiter: char,

    /// Keep only the lower-left `FRACTION x FRACTION` corner of the survey's
    /// bounding box, renumbering survivors densely.
    #[arg(long, value_name = "FRACTION")]
    pub clip: Option<f64>,

    /// Positional offset applied to split-node coordinates.
    #[arg(long, default_value_t = DEFAULT_SPLIT_OFFSET)]
    pub split_offset: f64,
}

/// Options accepted by the `worst-case` command.
#[derive(Debug, Args, Clone)]
pub struct WorstCaseCommand {
    /// Which greedy weakness the instance exercises.
    #[arg(value_enum)]
    pub kind: WorstCaseKindArg,

    /// Greedy budget the construction is scaled to.
    #[arg(long, default_value_t = 1)]
    pub budget: u64,

    /// Directory the file set is written into.
    #[arg(long, default_value = ".")]
    pub output: PathBuf,

    /// Base name of the file set (defaults to a kind-specific name).
    #[arg(long)]
    pub name: Option<String>,

    /// Decoy/relay patch weight and keystone bonus.
    #[arg(long, default_value_t = DEFAULT_EPSILON)]
    pub epsilon: f64,
}

/// CLI-facing spelling of [`WorstCaseKind`].
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum WorstCaseKindArg {
    /// Defeats incremental (add-under-growing-budget) greedy.
    Incremental,
    /// Defeats decremental (remove-least-valuable) greedy.
    Decremental,
    /// Challenges both policies in one instance.
    Combined,
}

impl WorstCaseKindArg {
    const fn kind(self) -> WorstCaseKind {
        match self {
            Self::Incremental => WorstCaseKind::Incremental,
            Self::Decremental => WorstCaseKind::Decremental,
            Self::Combined => WorstCaseKind::Combined,
        }
    }

    const fn default_name(self) -> &'static str {
        match self {
            Self::Incremental => "inc_worst_case",
            Self::Decremental => "dec_worst_case",
            Self::Combined => "both_worst_case",
        }
    }
}

/// Errors surfaced while executing CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// File I/O failed while loading an input or preparing the output dir.
    #[error("failed to access `{path}`: {source}")]
    Io {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// The clip fraction fell outside `(0, 1]`.
    #[error("clip fraction {got} is outside (0, 1]")]
    InvalidClip {
        /// The rejected fraction.
        got: f64,
    },
    /// Survey parsing failed.
    #[error(transparent)]
    Survey(#[from] SurveyError),
    /// The threat-splitting transform failed.
    #[error(transparent)]
    Threat(#[from] ThreatError),
    /// The adversarial generator failed.
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    /// Serializing the file set failed.
    #[error(transparent)]
    Files(#[from] FileSetError),
}

impl CliError {
    /// Stable machine-readable code for this error.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "CLI_IO",
            Self::InvalidClip { .. } => "CLI_INVALID_CLIP",
            Self::Survey(err) => err.code(),
            Self::Threat(err) => err.code(),
            Self::Generator(err) => err.code(),
            Self::Files(err) => err.code(),
        }
    }
}

/// Summarises the outcome of executing a CLI command.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    /// Base name of the written file set.
    pub name: String,
    /// Number of patches emitted.
    pub patches: usize,
    /// Number of directed link rows emitted.
    pub links: usize,
    /// Number of restoration actions emitted.
    pub actions: usize,
    /// Path of the written index manifest.
    pub index_path: PathBuf,
}

/// Executes the CLI command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when parsing inputs, building the graph, or writing
/// the file set fails. Nothing is written before all inputs validate.
pub fn run_cli(cli: Cli) -> Result<ExecutionSummary, CliError> {
    match cli.command {
        Command::Build(build) => run_build(build),
        Command::WorstCase(worst_case) => run_worst_case(worst_case),
    }
}

fn run_build(command: BuildCommand) -> Result<ExecutionSummary, CliError> {
    let vertices = survey::read_vertices(open_reader(&command.vertices)?, command.delimiter)?;
    let edges = survey::read_edges(open_reader(&command.edges)?, command.delimiter)?;

    let mut builder = ThreatGraphBuilder::new().with_split_offset(command.split_offset);
    if let Some(fraction) = command.clip {
        if !fraction.is_finite() || fraction <= 0.0 || fraction > 1.0 {
            return Err(CliError::InvalidClip { got: fraction });
        }
        if let Some(bounds) = Bounds::from_vertices(&vertices) {
            builder = builder.with_bounds(bounds.lower_left_window(fraction));
        }
    }
    let graph = builder.build_graph(&vertices, &edges)?;

    let name = derive_set_name(&command.vertices, command.name.as_deref());
    write_file_set(&command.output, &name, &graph)
}

fn run_worst_case(command: WorstCaseCommand) -> Result<ExecutionSummary, CliError> {
    let graph = WorstCaseGenerator::new(command.kind.kind())
        .with_budget(command.budget)
        .with_epsilon(command.epsilon)
        .generate()?;
    let name = command
        .name
        .unwrap_or_else(|| command.kind.default_name().to_owned());
    write_file_set(&command.output, &name, &graph)
}

fn write_file_set(
    output: &Path,
    name: &str,
    graph: &PatchGraph,
) -> Result<ExecutionSummary, CliError> {
    fs::create_dir_all(output).map_err(|source| CliError::Io {
        path: output.to_path_buf(),
        source,
    })?;
    let set = GraphFileSet::new(output, name);
    set.write(graph)?;
    Ok(ExecutionSummary {
        name: name.to_owned(),
        patches: graph.patches().len(),
        links: graph.links().len(),
        actions: graph.actions().len(),
        index_path: set.index_path(),
    })
}

fn open_reader(path: &Path) -> Result<BufReader<File>, CliError> {
    let file = File::open(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

fn derive_set_name(path: &Path, override_name: Option<&str>) -> String {
    if let Some(name) = override_name {
        return name.to_owned();
    }

    path.file_stem()
        .and_then(|value| value.to_str())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| "landscape".to_owned())
}

/// Renders `summary` to `writer` in a human-readable text format.
///
/// # Errors
/// Returns [`io::Error`] if writing to the supplied writer fails.
pub fn render_summary(summary: &ExecutionSummary, mut writer: impl Write) -> io::Result<()> {
    writeln!(writer, "file set: {}", summary.name)?;
    writeln!(writer, "patches: {}", summary.patches)?;
    writeln!(writer, "links: {}", summary.links)?;
    writeln!(writer, "actions: {}", summary.actions)?;
    writeln!(writer, "index: {}", summary.index_path.display())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use rstest::rstest;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    const VERTEX_TABLE: &str = "\
count area count2050 menace xcoord ycoord
1 10 4 100 0 0
2 5 5 0 3 4
";
    const EDGE_TABLE: &str = "from to probdistGAP\n1 2 0.8\n";

    fn temp_dir() -> TempDir {
        match TempDir::new() {
            Ok(dir) => dir,
            Err(err) => panic!("failed to create temp dir: {err}"),
        }
    }

    fn write_input(dir: &TempDir, name: &str, contents: &str) -> io::Result<PathBuf> {
        let path = dir.path().join(name);
        fs::write(&path, contents)?;
        Ok(path)
    }

    fn build_command(dir: &TempDir) -> io::Result<BuildCommand> {
        Ok(BuildCommand {
            vertices: write_input(dir, "sommets.txt", VERTEX_TABLE)?,
            edges: write_input(dir, "aretes.txt", EDGE_TABLE)?,
            output: dir.path().join("out"),
            name: Some("demo".into()),
            delimiter: ' ',
            clip: None,
            split_offset: DEFAULT_SPLIT_OFFSET,
        })
    }

    #[rstest]
    fn build_writes_a_complete_file_set() -> TestResult {
        let dir = temp_dir();
        let cli = Cli {
            command: Command::Build(build_command(&dir)?),
        };
        let summary = run_cli(cli)?;
        assert_eq!(summary.name, "demo");
        // Two base patches plus one split twin.
        assert_eq!(summary.patches, 3);
        // Survey pair (redirected to the twin) plus the connecting pair.
        assert_eq!(summary.links, 4);
        assert_eq!(summary.actions, 1);

        let out = dir.path().join("out");
        for extension in ["index", "patches", "links", "problem"] {
            assert!(out.join(format!("demo.{extension}")).exists());
        }
        let problem = fs::read_to_string(out.join("demo.problem"))?;
        assert_eq!(problem, "2 2\n\tn 0 6\n\ta 2 0 1\n");
        Ok(())
    }

    #[rstest]
    fn build_defaults_name_to_vertex_file_stem() -> TestResult {
        let dir = temp_dir();
        let mut command = build_command(&dir)?;
        command.name = None;
        let summary = run_cli(Cli {
            command: Command::Build(command),
        })?;
        assert_eq!(summary.name, "sommets");
        Ok(())
    }

    #[rstest]
    fn build_clip_filters_the_survey() -> TestResult {
        let dir = temp_dir();
        let mut command = build_command(&dir)?;
        // Window collapses to the lower-left vertex only.
        command.clip = Some(0.125);
        let summary = run_cli(Cli {
            command: Command::Build(command),
        })?;
        // The surviving vertex is fully threatened: base patch plus twin.
        assert_eq!(summary.patches, 2);
        assert_eq!(summary.links, 2);
        Ok(())
    }

    #[rstest]
    #[case(0.0)]
    #[case(1.5)]
    #[case(f64::NAN)]
    fn build_rejects_invalid_clip(#[case] clip: f64) -> TestResult {
        let dir = temp_dir();
        let mut command = build_command(&dir)?;
        command.clip = Some(clip);
        let err = run_cli(Cli {
            command: Command::Build(command),
        })
        .expect_err("clip must be rejected");
        assert!(matches!(err, CliError::InvalidClip { .. }));
        Ok(())
    }

    #[rstest]
    fn build_fails_on_missing_input() -> TestResult {
        let dir = temp_dir();
        let mut command = build_command(&dir)?;
        command.vertices = dir.path().join("absent.txt");
        let err = run_cli(Cli {
            command: Command::Build(command),
        })
        .expect_err("missing input must fail");
        assert!(matches!(err, CliError::Io { .. }));
        Ok(())
    }

    #[rstest]
    fn build_fails_on_malformed_vertices() -> TestResult {
        let dir = temp_dir();
        let mut command = build_command(&dir)?;
        command.vertices = write_input(
            &dir,
            "bad.txt",
            "count area count2050 menace xcoord ycoord\n1 oops 4 0 0 0\n",
        )?;
        let err = run_cli(Cli {
            command: Command::Build(command),
        })
        .expect_err("malformed input must fail");
        assert!(matches!(
            err,
            CliError::Survey(SurveyError::MalformedNumber { .. })
        ));
        Ok(())
    }

    #[rstest]
    #[case(WorstCaseKindArg::Incremental, "inc_worst_case", 4)]
    #[case(WorstCaseKindArg::Decremental, "dec_worst_case", 3)]
    #[case(WorstCaseKindArg::Combined, "both_worst_case", 5)]
    fn worst_case_uses_kind_specific_default_names(
        #[case] kind: WorstCaseKindArg,
        #[case] expected_name: &str,
        #[case] expected_patches: usize,
    ) -> TestResult {
        let dir = temp_dir();
        let summary = run_cli(Cli {
            command: Command::WorstCase(WorstCaseCommand {
                kind,
                budget: 1,
                output: dir.path().to_path_buf(),
                name: None,
                epsilon: DEFAULT_EPSILON,
            }),
        })?;
        assert_eq!(summary.name, expected_name);
        assert_eq!(summary.patches, expected_patches);
        assert!(summary.index_path.exists());
        Ok(())
    }

    #[rstest]
    fn worst_case_rejects_zero_budget() -> TestResult {
        let dir = temp_dir();
        let err = run_cli(Cli {
            command: Command::WorstCase(WorstCaseCommand {
                kind: WorstCaseKindArg::Incremental,
                budget: 0,
                output: dir.path().to_path_buf(),
                name: None,
                epsilon: DEFAULT_EPSILON,
            }),
        })
        .expect_err("budget 0 must fail");
        assert!(matches!(
            err,
            CliError::Generator(GeneratorError::InvalidBudget { got: 0 })
        ));
        Ok(())
    }

    #[rstest]
    fn render_summary_lists_counts_and_paths() -> TestResult {
        let summary = ExecutionSummary {
            name: "demo".into(),
            patches: 4,
            links: 6,
            actions: 3,
            index_path: PathBuf::from("out/demo.index"),
        };
        let mut buffer = Vec::new();
        render_summary(&summary, &mut buffer)?;
        let text = String::from_utf8(buffer)?;
        assert!(text.contains("file set: demo"));
        assert!(text.contains("patches: 4"));
        assert!(text.contains("links: 6"));
        assert!(text.contains("actions: 3"));
        assert!(text.contains("demo.index"));
        Ok(())
    }

    #[test]
    fn clap_rejects_unknown_kind() {
        let args = ["landgraph", "worst-case", "sideways"];
        let result = Cli::try_parse_from(args);
        assert!(result.is_err());
    }

    #[test]
    fn clap_parses_a_full_build_invocation() {
        let args = [
            "landgraph",
            "build",
            "sommets.txt",
            "aretes.txt",
            "--output",
            "out",
            "--name",
            "quebec",
            "--clip",
            "0.125",
        ];
        let cli = Cli::try_parse_from(args).expect("arguments must parse");
        let Command::Build(command) = cli.command else {
            panic!("expected build command");
        };
        assert_eq!(command.name.as_deref(), Some("quebec"));
        assert_eq!(command.clip, Some(0.125));
        assert_eq!(command.delimiter, ' ');
    }
}
