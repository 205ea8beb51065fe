use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use glint_ast::diag::{Diagnostic, Stage};
use glint_ast::span::{LineIndex, Location};
use glint_cli::{CompileResult, Runtime};
use glint_parse::parse_str;
use glint_spirv::BinaryModule;
use glint_types::CapabilityProfile;
use rspirv::binary::Disassemble;
use serde::Serialize;

/// Maximum source file size in bytes (1MB)
const MAX_SOURCE_SIZE: usize = 1_000_000;

#[derive(Parser, Debug)]
#[command(name = "glint")]
#[command(about = "Glint: GLSL compute shaders to SPIR-V")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a compute shader to a SPIR-V module
    Compile {
        /// Path to the GLSL source file
        file: PathBuf,

        /// Output path (defaults to the input with a .spv extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Name used in diagnostics (defaults to the file name)
        #[arg(long)]
        name: Option<String>,

        /// Capability profile overrides (TOML)
        #[arg(long)]
        profile: Option<PathBuf>,
    },

    /// Run the whole pipeline and report diagnostics without writing output
    Check {
        /// Path to the GLSL source file
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = CheckFormat::Text)]
        format: CheckFormat,

        /// Capability profile overrides (TOML)
        #[arg(long)]
        profile: Option<PathBuf>,
    },

    /// Parse a source file and dump the syntax tree
    Ast {
        /// Path to the GLSL source file
        file: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = AstFormat::Pretty)]
        format: AstFormat,
    },

    /// Disassemble a .spv module, or compile a shader and disassemble it
    Disasm {
        /// Path to a .spv binary or a GLSL source file
        file: PathBuf,

        /// Capability profile overrides (TOML), for source input
        #[arg(long)]
        profile: Option<PathBuf>,
    },

    /// Print the default capability profile as TOML
    Profile,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CheckFormat {
    Text,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum AstFormat {
    Pretty,
    Json,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Compile {
            file,
            output,
            name,
            profile,
        } => cmd_compile(&file, output, name, profile.as_deref()),
        Commands::Check {
            file,
            format,
            profile,
        } => cmd_check(&file, format, profile.as_deref()),
        Commands::Ast { file, format } => cmd_ast(&file, format),
        Commands::Disasm { file, profile } => cmd_disasm(&file, profile.as_deref()),
        Commands::Profile => cmd_profile(),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn read_source(path: &Path) -> Result<String> {
    let src = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if src.len() > MAX_SOURCE_SIZE {
        bail!(
            "source file exceeds {}MB limit ({} bytes)",
            MAX_SOURCE_SIZE / 1_000_000,
            src.len()
        );
    }
    Ok(src)
}

fn load_profile(path: Option<&Path>) -> Result<CapabilityProfile> {
    let Some(path) = path else {
        return Ok(CapabilityProfile::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile {}", path.display()))?;
    let profile: CapabilityProfile = toml::from_str(&text)
        .with_context(|| format!("failed to parse profile {}", path.display()))?;
    log::info!("loaded capability profile from {}", path.display());
    Ok(profile)
}

fn debug_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Start a runtime for `profile` and compile `path` with it.
fn compile_file(path: &Path, name: &str, profile: Option<&Path>) -> Result<CompileResult> {
    let src = read_source(path)?;
    let runtime = Runtime::startup(load_profile(profile)?)?;
    let result = runtime.compile(&src, name);
    runtime.shutdown();
    Ok(result)
}

/// SHA-256 of the module's byte image, prefixed with "sha256:".
fn fingerprint(module: &BinaryModule) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(module.to_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

fn cmd_compile(
    file: &Path,
    output: Option<PathBuf>,
    name: Option<String>,
    profile: Option<&Path>,
) -> Result<bool> {
    let name = name.unwrap_or_else(|| debug_name(file));
    let module = match compile_file(file, &name, profile)? {
        CompileResult::Success(m) => m,
        CompileResult::Failure(f) => {
            eprintln!("{}", f.report);
            return Ok(false);
        }
    };
    let output = output.unwrap_or_else(|| file.with_extension("spv"));
    std::fs::write(&output, module.to_bytes())
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!(
        "{}: {} words -> {} ({})",
        name,
        module.words().len(),
        output.display(),
        fingerprint(&module)
    );
    Ok(true)
}

#[derive(Serialize)]
struct CheckReport<'a> {
    name: &'a str,
    success: bool,
    stage: Option<Stage>,
    words: Option<usize>,
    diagnostics: Vec<DiagnosticRecord<'a>>,
}

#[derive(Serialize)]
struct DiagnosticRecord<'a> {
    kind: &'static str,
    message: &'a str,
    location: Option<Location>,
    notes: Vec<NoteRecord<'a>>,
}

#[derive(Serialize)]
struct NoteRecord<'a> {
    message: &'a str,
    location: Location,
}

fn record<'a>(d: &'a Diagnostic, index: &LineIndex) -> DiagnosticRecord<'a> {
    DiagnosticRecord {
        kind: d.kind_name(),
        message: &d.message,
        location: d.span.map(|s| index.location(s)),
        notes: d
            .notes
            .iter()
            .map(|n| NoteRecord {
                message: &n.message,
                location: index.location(n.span),
            })
            .collect(),
    }
}

fn cmd_check(file: &Path, format: CheckFormat, profile: Option<&Path>) -> Result<bool> {
    let name = debug_name(file);
    let result = compile_file(file, &name, profile)?;
    match format {
        CheckFormat::Text => match &result {
            CompileResult::Success(m) => println!("{}: ok ({} words)", name, m.words().len()),
            CompileResult::Failure(f) => println!("{}", f.report),
        },
        CheckFormat::Json => {
            let src = read_source(file)?;
            let index = LineIndex::new(&src);
            let report = match &result {
                CompileResult::Success(m) => CheckReport {
                    name: &name,
                    success: true,
                    stage: None,
                    words: Some(m.words().len()),
                    diagnostics: Vec::new(),
                },
                CompileResult::Failure(f) => CheckReport {
                    name: &name,
                    success: false,
                    stage: f.stage,
                    words: None,
                    diagnostics: f.diagnostics.iter().map(|d| record(d, &index)).collect(),
                },
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(result.is_success())
}

fn cmd_ast(file: &Path, format: AstFormat) -> Result<bool> {
    let src = read_source(file)?;
    let unit = match parse_str(&src, &CapabilityProfile::default().limits) {
        Ok(staged) => staged.value,
        Err(diags) => {
            let name = debug_name(file);
            let log = glint_cli::report::debug_log(&diags);
            eprintln!(
                "{}",
                glint_cli::render_report(&name, &src, Stage::Syntax, &diags, &log)
            );
            return Ok(false);
        }
    };
    match format {
        AstFormat::Pretty => println!("{:#?}", unit),
        AstFormat::Json => println!("{}", serde_json::to_string_pretty(&unit)?),
    }
    Ok(true)
}

fn cmd_disasm(file: &Path, profile: Option<&Path>) -> Result<bool> {
    let module = if file.extension().is_some_and(|e| e == "spv") {
        let bytes =
            std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
        BinaryModule::from_bytes(&bytes)
            .with_context(|| format!("{} is not a SPIR-V module", file.display()))?
    } else {
        match compile_file(file, &debug_name(file), profile)? {
            CompileResult::Success(m) => m,
            CompileResult::Failure(f) => {
                eprintln!("{}", f.report);
                return Ok(false);
            }
        }
    };
    let loaded = rspirv::dr::load_words(module.words())
        .map_err(|e| anyhow::anyhow!("failed to load module: {:?}", e))?;
    println!("{}", loaded.disassemble());
    Ok(true)
}

fn cmd_profile() -> Result<bool> {
    let text = toml::to_string_pretty(&CapabilityProfile::default())?;
    print!("{}", text);
    Ok(true)
}
