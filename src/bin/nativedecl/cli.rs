//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use nativedecl::ops::call::parse_assignment;
use nativedecl::ops::DumpFormat;
use nativedecl::DescriptorKind;

/// nativedecl - Validate and dump native-library binding descriptors
#[derive(Parser)]
#[command(name = "nativedecl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate descriptor files
    Check(CheckArgs),

    /// List declared descriptors
    List(ListArgs),

    /// Show a descriptor and everything that uses it
    Explain(ExplainArgs),

    /// Write the frozen catalog for a binding generator
    Dump(DumpArgs),

    /// Check a call against a function's parameter annotations
    Call(CallArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Where descriptors are loaded from.
#[derive(Args)]
pub struct SourceArgs {
    /// Descriptor file to load (repeatable). Defaults to `decls.include` from
    /// the config, then to the bundled stb catalog
    #[arg(short, long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,

    /// Let annotations reference later parameters in modules that don't set
    /// `forward_references`
    #[arg(long)]
    pub allow_forward_references: bool,
}

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Only list descriptors of this module
    #[arg(short, long)]
    pub module: Option<String>,

    /// Only list descriptors of this kind (type, pointer, struct, callback, function)
    #[arg(short, long)]
    pub kind: Option<DescriptorKind>,
}

#[derive(Args)]
pub struct ExplainArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Descriptor name
    pub name: String,

    /// Resolve the name as seen from this module
    #[arg(short, long)]
    pub module: Option<String>,
}

#[derive(Args)]
pub struct DumpArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output format (json, toml)
    #[arg(long)]
    pub format: Option<DumpFormat>,

    /// Write to a file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct CallArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Function name
    pub function: String,

    /// Module declaring the function (defaults to the first one that does)
    #[arg(short, long)]
    pub module: Option<String>,

    /// Scalar argument, `name=value` (repeatable)
    #[arg(long = "arg", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub args: Vec<(String, i64)>,

    /// Buffer argument with its element count, `name=len` (repeatable)
    #[arg(long = "buffer", value_name = "NAME=LEN", value_parser = parse_assignment)]
    pub buffers: Vec<(String, i64)>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
