// rdsweep-cli/src/cli.rs
//
// Defines the command-line argument structures using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use rdsweep_core::VmafBackend;
use std::path::PathBuf;

// --- CLI Argument Definition ---

#[derive(Parser, Debug)]
#[command(
    author,
    version, // Reads from Cargo.toml via "cargo" feature in clap
    about = "rdsweep: rate-distortion experiment harness",
    long_about = "Sweeps codec configurations over input clips with ffmpeg and records PSNR, SSIM and VMAF per configuration in a CSV table."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase console log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors to the console
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Directory for the run log file (no log file when omitted)
    #[arg(long, global = true, value_name = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Runs a sweep over the given inputs and writes the result table
    Run(RunArgs),
    /// Lists the codecs the harness knows
    Codecs(CodecsArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Input video files
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// CSV file the result table is written to
    #[arg(short = 'o', long = "output", required_unless_present = "plan", value_name = "OUTFILE")]
    pub output: Option<PathBuf>,

    // --- Sweep Axes ---
    /// Codecs to sweep (see `rdsweep codecs`)
    #[arg(long, value_delimiter = ',', required = true, value_name = "CODECS")]
    pub codecs: Vec<String>,

    /// Encode resolutions as WxH, or `source` for the reference resolution
    #[arg(long, value_delimiter = ',', value_name = "RESOLUTIONS")]
    pub resolutions: Vec<String>,

    /// Rate-control modes (cbr, crf)
    #[arg(long, value_delimiter = ',', default_value = "cbr", value_name = "MODES")]
    pub rcmodes: Vec<String>,

    /// Target bitrates in kbps for cbr
    #[arg(long, value_delimiter = ',', value_name = "KBPS")]
    pub bitrates: Vec<String>,

    /// Quality values for crf
    #[arg(long, value_delimiter = ',', value_name = "VALUES")]
    pub qualities: Vec<String>,

    /// Presets to sweep (defaults to each codec's own default preset)
    #[arg(long, value_delimiter = ',', value_name = "PRESETS")]
    pub presets: Option<Vec<String>>,

    /// Number of times every configuration is run
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub repetitions: u32,

    // --- Reference ---
    /// Label written to every row
    #[arg(long, default_value = "", value_name = "LABEL")]
    pub label: String,

    /// Resolution of the normalized reference (defaults to the input's)
    #[arg(short = 's', long = "ref-resolution", value_name = "WxH")]
    pub ref_resolution: Option<String>,

    /// Pixel format of the normalized reference
    #[arg(long, default_value = rdsweep_core::config::DEFAULT_REFERENCE_PIX_FMT, value_name = "PIX_FMT")]
    pub pix_fmt: String,

    /// GoP length in frames (0 leaves it to the encoder)
    #[arg(long, default_value_t = rdsweep_core::config::DEFAULT_GOP_LENGTH, value_name = "FRAMES")]
    pub gop_length: u32,

    /// Directory for references and intermediate artifacts
    #[arg(long, default_value = rdsweep_core::config::DEFAULT_TMP_DIR, value_name = "DIR")]
    pub tmp_dir: PathBuf,

    // --- Cleanup ---
    /// Delete decoded and rescaled artifacts after each configuration.
    /// This is the default; pass --no-cleanup to keep every artifact
    #[arg(long, conflicts_with_all = ["full_cleanup", "no_cleanup"])]
    pub cleanup: bool,

    /// Delete the encoded artifact as well
    #[arg(long, conflicts_with = "no_cleanup")]
    pub full_cleanup: bool,

    /// Keep every artifact, including decoded and rescaled ones
    #[arg(long)]
    pub no_cleanup: bool,

    // --- Execution ---
    /// Record failing configurations and continue instead of aborting
    #[arg(long)]
    pub skip_failures: bool,

    /// Configurations of one input run concurrently
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub jobs: u32,

    /// Kill any external command running longer than this many seconds
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Capture encoder perf counters (requires `perf`)
    #[arg(long)]
    pub perf: bool,

    // --- Tools ---
    /// How VMAF is computed
    #[arg(long, value_enum, default_value_t = VmafBackendArg::Auto, value_name = "BACKEND")]
    pub vmaf_backend: VmafBackendArg,

    /// VMAF model file
    #[arg(long, value_name = "PATH")]
    pub vmaf_model: Option<String>,

    /// ffmpeg binary
    #[arg(long, env = "RDSWEEP_FFMPEG", default_value = "ffmpeg", value_name = "PATH")]
    pub ffmpeg: String,

    /// ffprobe binary
    #[arg(long, env = "RDSWEEP_FFPROBE", default_value = "ffprobe", value_name = "PATH")]
    pub ffprobe: String,

    /// Standalone vmaf binary
    #[arg(long, env = "RDSWEEP_VMAF", default_value = "vmaf", value_name = "PATH")]
    pub vmaf: String,

    /// Print the configurations the sweep expands to and exit
    #[arg(long)]
    pub plan: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VmafBackendArg {
    /// libvmaf filter when ffmpeg has it, else the standalone scorer
    Auto,
    /// ffmpeg's libvmaf filter
    #[value(alias = "libvmaf")]
    Filter,
    /// The standalone `vmaf` tool
    #[value(alias = "vmaf")]
    Standalone,
}

impl From<VmafBackendArg> for VmafBackend {
    fn from(arg: VmafBackendArg) -> Self {
        match arg {
            VmafBackendArg::Auto => VmafBackend::Auto,
            VmafBackendArg::Filter => VmafBackend::Filter,
            VmafBackendArg::Standalone => VmafBackend::Standalone,
        }
    }
}

#[derive(Args, Debug)]
pub struct CodecsArgs {
    /// Print the registry as JSON
    #[arg(long)]
    pub json: bool,
}
