use crate::{
    analyze_source,
    cli::OutputFormat,
    parser::is_supported_source,
    runtime::{RUNTIME_FILE_NAME, RUNTIME_SOURCE},
    session::CompilationSession,
    CompilationStats, CompileOutput, CompilerError, CompilerOptions, CssOutputMode, Result,
    VIRTUAL_UNIT_PREFIX,
};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Instant;
use walkdir::WalkDir;

const DEFAULT_OUTPUT_DIRECTORY: &str = "dist";
/// Directory under the output root virtual units are written to
const VIRTUAL_UNIT_DIR: &str = "__stylec";
const MANIFEST_FILE: &str = "stylec-manifest.json";

/// A source file and its path relative to the input it was found under
#[derive(Debug, Clone)]
struct SourceFile {
    path: PathBuf,
    relative: PathBuf,
}

impl SourceFile {
    fn display(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

fn walk_error(e: walkdir::Error) -> CompilerError {
    CompilerError::Io(e.into())
}

fn watch_error(context: &str, e: notify::Error) -> CompilerError {
    CompilerError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("{}: {}", context, e),
    ))
}

fn collect_sources(inputs: &[String]) -> Result<Vec<SourceFile>> {
    let mut sources = Vec::new();
    for input in inputs {
        let input_path = Path::new(input);
        if input_path.is_file() {
            let relative = input_path
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| input_path.to_path_buf());
            sources.push(SourceFile {
                path: input_path.to_path_buf(),
                relative,
            });
            continue;
        }
        if !input_path.is_dir() {
            return Err(CompilerError::FileNotFound { path: input.clone() });
        }

        let walker = WalkDir::new(input_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.file_name() != "node_modules");
        for entry in walker {
            let entry = entry.map_err(walk_error)?;
            if !entry.file_type().is_file() || !is_supported_source(entry.path()) {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(input_path)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| entry.path().to_path_buf());
            sources.push(SourceFile {
                path: entry.path().to_path_buf(),
                relative,
            });
        }
    }
    Ok(sources)
}

/// Re-walks the inputs when `event` created something, so files added after
/// startup are picked up. Returns whether the list was refreshed.
fn refresh_sources(event: &Event, inputs: &[String], files: &mut Vec<SourceFile>) -> Result<bool> {
    if !matches!(event.kind, EventKind::Create(_)) {
        return Ok(false);
    }
    *files = collect_sources(inputs)?;
    Ok(true)
}

fn watched_file<'a>(files: &'a [SourceFile], changed: &Path) -> Option<&'a SourceFile> {
    files
        .iter()
        .find(|file| file.path == changed || fs::canonicalize(&file.path).is_ok_and(|path| path == changed))
}

// --- COMPILE ---
pub fn handle_compile_command(cli: &super::EnhancedCli, matches: &clap::ArgMatches) -> Result<()> {
    let inputs: Vec<String> = matches
        .get_many::<String>("inputs")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let out_dir = PathBuf::from(
        matches
            .get_one::<String>("out-dir")
            .or(cli.config().output_directory.as_ref())
            .map(String::as_str)
            .unwrap_or(DEFAULT_OUTPUT_DIRECTORY),
    );
    let job = CompileJob {
        out_dir,
        source_maps: matches.get_flag("source-map") || cli.config().source_maps.unwrap_or(false),
    };

    let options = cli.build_compiler_options(matches)?;
    let mut session = CompilationSession::new(options)?;

    if matches.get_flag("watch") {
        watch_and_compile(&inputs, &job, &mut session)
    } else {
        let stats = compile_all(&inputs, &job, &mut session)?;
        if matches.get_flag("stats") {
            print_detailed_stats(&stats);
        }
        Ok(())
    }
}

struct CompileJob {
    out_dir: PathBuf,
    source_maps: bool,
}

impl CompileJob {
    /// Writes the rewritten file, its CSS units and optional source map.
    /// Files without constructs are copied unchanged.
    fn write(
        &self,
        file: &SourceFile,
        source: &str,
        output: Option<&CompileOutput>,
        mode: CssOutputMode,
    ) -> Result<()> {
        let target = self.out_dir.join(&file.relative);
        let target_dir = target.parent().unwrap_or(self.out_dir.as_path()).to_path_buf();
        fs::create_dir_all(&target_dir)?;

        let Some(output) = output else {
            fs::write(&target, source)?;
            return Ok(());
        };

        fs::write(&target, &output.code)?;
        for unit in &output.css_units {
            let unit_path = match mode {
                CssOutputMode::Physical => target_dir.join(unit.import_specifier.trim_start_matches("./")),
                CssOutputMode::Virtual => self.out_dir.join(VIRTUAL_UNIT_DIR).join(&unit.key),
            };
            if let Some(parent) = unit_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&unit_path, &unit.css)?;
        }

        if self.source_maps {
            let mut map_path = target.clone().into_os_string();
            map_path.push(".map");
            fs::write(PathBuf::from(map_path), output.source_map_json(source)?)?;
        }
        Ok(())
    }

    /// The JS runtime module rewritten code imports
    fn write_runtime(&self) -> Result<()> {
        fs::create_dir_all(&self.out_dir)?;
        fs::write(self.out_dir.join(RUNTIME_FILE_NAME), RUNTIME_SOURCE)?;
        Ok(())
    }

    /// Virtual specifier -> unit file, for hosts resolving `virtual:` imports,
    /// plus the runtime module -> runtime file
    fn write_manifest(&self, session: &CompilationSession, files: &[SourceFile]) -> Result<()> {
        let mut manifest = BTreeMap::new();
        manifest.insert(
            session.options().runtime_module.clone(),
            RUNTIME_FILE_NAME.to_string(),
        );
        for file in files {
            for unit in session.units_for(&file.display()) {
                manifest.insert(
                    format!("{}{}", VIRTUAL_UNIT_PREFIX, unit.key),
                    format!("{}/{}", VIRTUAL_UNIT_DIR, unit.key),
                );
            }
        }
        let json = serde_json::to_string_pretty(&manifest).map_err(|e| CompilerError::InvalidFormat {
            message: format!("JSON serialization error: {}", e),
        })?;
        fs::write(self.out_dir.join(MANIFEST_FILE), json)?;
        Ok(())
    }
}

fn compile_all(
    inputs: &[String],
    job: &CompileJob,
    session: &mut CompilationSession,
) -> Result<CompilationStats> {
    let files = collect_sources(inputs)?;
    println!("🔨 Compiling {} files -> {}", files.len(), job.out_dir.display());
    let compile_start = Instant::now();

    let mut batch = Vec::with_capacity(files.len());
    for file in &files {
        batch.push((file.display(), fs::read_to_string(&file.path)?));
    }
    let results = session.compile_many(&batch);
    job.write_runtime()?;

    let mode = session.options().css_output;
    let mut totals = CompilationStats::default();
    let mut failures = 0;
    for ((file, (_, source)), result) in files.iter().zip(&batch).zip(results) {
        match result {
            Ok(output) => {
                job.write(file, source, output.as_ref(), mode)?;
                accumulate(&mut totals, source, output.as_ref());
            }
            Err(e) => {
                eprintln!("❌ {}", e);
                failures += 1;
            }
        }
    }
    if mode == CssOutputMode::Virtual {
        job.write_manifest(session, &files)?;
    }
    totals.compile_time_ms = compile_start.elapsed().as_millis() as u64;

    if failures > 0 {
        return Err(CompilerError::InvalidFormat {
            message: format!("{} of {} files failed to compile", failures, files.len()),
        });
    }

    println!("✅ Compilation successful!");
    println!("   Constructs: {}", totals.construct_count);
    println!("   CSS units: {}", totals.css_unit_count);
    println!("   Time: {}ms", totals.compile_time_ms);
    Ok(totals)
}

fn accumulate(totals: &mut CompilationStats, source: &str, output: Option<&CompileOutput>) {
    totals.source_size += source.len();
    match output {
        Some(output) => {
            totals.output_size += output.stats.output_size;
            totals.construct_count += output.stats.construct_count;
            totals.css_unit_count += output.stats.css_unit_count;
            totals.css_size += output.stats.css_size;
            totals.runtime_helper_count += output.stats.runtime_helper_count;
        }
        None => totals.output_size += source.len(),
    }
}

fn watch_and_compile(
    inputs: &[String],
    job: &CompileJob,
    session: &mut CompilationSession,
) -> Result<()> {
    let (tx, rx) = channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                if let Err(e) = tx.send(event) {
                    eprintln!("Watch error: {}", e);
                }
            }
        },
        notify::Config::default(),
    )
    .map_err(|e| watch_error("Failed to create file watcher", e))?;

    for input in inputs {
        watcher
            .watch(Path::new(input), RecursiveMode::Recursive)
            .map_err(|e| watch_error("Failed to watch path", e))?;
    }
    println!("👀 Watching {} for changes...", inputs.join(", "));

    match compile_all(inputs, job, session) {
        Ok(_) => println!("✅ Initial compilation successful"),
        Err(e) => eprintln!("❌ Initial compilation failed: {}", e),
    }

    let mut files = collect_sources(inputs)?;
    loop {
        let event = match rx.recv() {
            Ok(event) => event,
            Err(e) => {
                eprintln!("Watch error: {}", e);
                break;
            }
        };
        match refresh_sources(&event, inputs, &mut files) {
            Ok(true) => log::info!("Source list refreshed: {} files", files.len()),
            Ok(false) => {}
            Err(e) => eprintln!("❌ {}", e),
        }
        for changed in &event.paths {
            let Some(file) = watched_file(&files, changed) else {
                continue;
            };

            if matches!(event.kind, EventKind::Remove(_)) {
                let removed = session.invalidate(&file.display());
                println!("🗑️  {} removed ({} CSS units dropped)", file.display(), removed);
                continue;
            }

            println!("🔄 {} changed, recompiling...", file.display());
            let source = match fs::read_to_string(&file.path) {
                Ok(source) => source,
                Err(e) => {
                    eprintln!("❌ {}: {}", file.display(), e);
                    continue;
                }
            };
            let mode = session.options().css_output;
            match session.compile(&source, &file.display()) {
                Ok(output) => {
                    if let Err(e) = job.write(file, &source, output.as_ref(), mode) {
                        eprintln!("❌ {}", e);
                        continue;
                    }
                    let units = output.as_ref().map_or(0, |output| output.css_units.len());
                    println!("✅ Recompiled {} ({} CSS units)", file.display(), units);
                }
                Err(e) => eprintln!("❌ Compilation failed: {}", e),
            }
        }
        if session.options().css_output == CssOutputMode::Virtual {
            if let Err(e) = job.write_manifest(session, &files) {
                eprintln!("❌ {}", e);
            }
        }
    }

    Ok(())
}

// --- CHECK ---
pub fn handle_check_command(cli: &super::EnhancedCli, matches: &clap::ArgMatches) -> Result<()> {
    let inputs: Vec<String> = matches
        .get_many::<String>("inputs")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let options = cli.build_compiler_options(matches)?;
    let files = collect_sources(&inputs)?;

    let mut total_files = 0;
    let mut error_files = 0;
    for file in &files {
        total_files += 1;
        if check_single_file(file, &options).is_err() {
            error_files += 1;
        }
    }

    println!("\n📊 Check Summary:");
    println!("   Total files: {}", total_files);
    println!("   Files with errors: {}", error_files);
    if total_files > 0 {
        println!(
            "   Success rate: {:.1}%",
            (total_files - error_files) as f64 / total_files as f64 * 100.0
        );
    }

    if error_files > 0 {
        Err(CompilerError::InvalidFormat {
            message: format!("{} files have errors", error_files),
        })
    } else {
        Ok(())
    }
}

fn check_single_file(file: &SourceFile, options: &CompilerOptions) -> Result<()> {
    let source = fs::read_to_string(&file.path)?;
    match crate::compile_source_with_options(&source, &file.display(), options) {
        Ok(Some(output)) => {
            println!(
                "✅ {} - {} constructs, {} CSS units",
                file.display(),
                output.stats.construct_count,
                output.stats.css_unit_count
            );
            Ok(())
        }
        Ok(None) => {
            println!("➖ {} - nothing to extract", file.display());
            Ok(())
        }
        Err(e) => {
            println!("❌ {} - {}", file.display(), e);
            Err(e)
        }
    }
}

// --- ANALYZE ---
pub fn handle_analyze_command(cli: &super::EnhancedCli, matches: &clap::ArgMatches) -> Result<()> {
    let input_path = matches
        .get_one::<String>("input")
        .ok_or_else(|| CompilerError::config("No input file given"))?;
    let output_path = matches.get_one::<String>("output");
    let format = matches
        .get_one::<OutputFormat>("format")
        .copied()
        .unwrap_or(OutputFormat::Debug);
    let options = cli.build_compiler_options(matches)?;

    println!("🔬 Analyzing {}", input_path);

    let source = fs::read_to_string(input_path).map_err(|e| CompilerError::FileNotFound {
        path: format!("{}: {}", input_path, e),
    })?;
    let analysis = analyze_source(&source, input_path, &options)?;

    let report = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&analysis).map_err(|e| {
            CompilerError::InvalidFormat {
                message: format!("JSON serialization error: {}", e),
            }
        })?,
        OutputFormat::Debug => match &analysis {
            Some(analysis) => format!("Source Analysis: {}\n\n{:#?}", input_path, analysis),
            None => format!("Source Analysis: {}\n\nNo styling constructs found", input_path),
        },
    };

    if let Some(output_file) = output_path {
        fs::write(output_file, report)?;
        println!("✅ Analysis saved to {}", output_file);
    } else {
        println!("{}", report);
    }
    Ok(())
}

// --- HELPERS ---
fn print_detailed_stats(stats: &CompilationStats) {
    println!("\n📊 Detailed Compilation Statistics:");
    println!("   Source size: {} bytes", stats.source_size);
    println!("   Output size: {} bytes", stats.output_size);
    println!("   Emitted CSS: {} bytes", stats.css_size);
    println!("   Compile time: {}ms", stats.compile_time_ms);
    println!("\n   Breakdown:");
    println!("     Constructs: {}", stats.construct_count);
    println!("     CSS units: {}", stats.css_unit_count);
    println!("     Runtime helpers imported: {}", stats.runtime_helper_count);
}
