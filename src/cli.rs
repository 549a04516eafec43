// Command-line front end for oxipatch.
//
// A thin layer over the library: each subcommand resolves its inputs and
// outputs, calls the streaming helpers in `io`, and maps the typed error it
// gets back to an exit code.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};

use crate::compress::encoder::CompressOptions;
use crate::compress::secondary::SecondaryCompression;
use crate::format::decoder::StreamDecoder;
use crate::format::error::{DecodeError, EncodeError};
use crate::format::header::{self, FORMAT_VERSION, HARD_MAX_WINDOW, StreamHeader, WindowHeader};
use crate::format::instruction::Instruction;
use crate::hash::config::{
    self, DEFAULT_BLOCK_SIZE, DEFAULT_MIN_MATCH, DEFAULT_WINDOW_SIZE, MAX_BLOCK_SIZE,
};
use crate::hooks::Hooks;
use crate::io::{self as file_io, DecodeStats, EncodeStats, IoError};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const DEFAULT_LEVEL: u32 = 6;

const BUF_SIZE: usize = 64 * 1024;

// Exit codes.
const EXIT_OK: i32 = 0;
const EXIT_FAILURE: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_IO: i32 = 3;
const EXIT_MALFORMED: i32 = 4;
const EXIT_CHECKSUM: i32 = 5;
const EXIT_VERSION: i32 = 6;
const EXIT_CANCELLED: i32 = 130;

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Binary delta encoder/decoder.
#[derive(Parser, Debug)]
#[command(
    name = "oxipatch",
    version,
    about = "Binary delta (patch) encoder/decoder",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (errors only).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use twice for debug output).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Create a patch from a source and a target.
    Encode(EncodeArgs),
    /// Apply a patch to a source.
    Decode(DecodeArgs),
    /// Print build/configuration details.
    Config,
    /// Print the stream header and the first window header.
    Header(PrintArgs),
    /// Print the stream header and every window header.
    Headers(PrintArgs),
    /// Print headers and every instruction.
    Delta(PrintArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SecondaryArg {
    None,
    Lzma,
    Zlib,
}

#[derive(Args, Debug)]
struct EncodeTuningArgs {
    /// Compression level (0-9, 0 stores literals only).
    #[arg(long, short = 'l', value_parser = clap::value_parser!(u32).range(0..=9), default_value_t = DEFAULT_LEVEL)]
    level: u32,

    /// Fingerprint block size in bytes.
    #[arg(long = "block-size", value_parser = parse_byte_size, default_value_t = DEFAULT_BLOCK_SIZE as u64)]
    block_size: u64,

    /// Shortest match encoded as a copy.
    #[arg(long = "min-match", default_value_t = DEFAULT_MIN_MATCH)]
    min_match: usize,

    /// Target window size (supports K/M/G suffix).
    #[arg(long = "window-size", short = 'W', value_parser = parse_byte_size, default_value_t = DEFAULT_WINDOW_SIZE as u64)]
    window_size: u64,

    /// Secondary compressor for window payloads.
    #[arg(long, value_enum, default_value_t = SecondaryArg::None)]
    secondary: SecondaryArg,

    /// Patch description stored in the stream header.
    #[arg(long = "description", visible_alias = "app-header")]
    description: Option<String>,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Source file to copy from (default: none, every byte is stored).
    #[arg(long, short = 's', value_hint = ValueHint::FilePath)]
    source: Option<PathBuf>,

    /// Target file (default: stdin).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "input_pos")]
    input: Option<PathBuf>,

    /// Patch file (default: stdout).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    #[command(flatten)]
    tuning: EncodeTuningArgs,

    /// Target file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    input_pos: Option<PathBuf>,

    /// Patch file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Source file the patch was made against.
    #[arg(long, short = 's', value_hint = ValueHint::FilePath)]
    source: Option<PathBuf>,

    /// Patch file (default: stdin).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "input_pos")]
    input: Option<PathBuf>,

    /// Output file (default: stdout).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Skip Adler-32 verification.
    #[arg(long = "no-checksum")]
    no_checksum: bool,

    /// Decode and verify without writing output.
    #[arg(long = "check-only")]
    check_only: bool,

    /// Patch file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    input_pos: Option<PathBuf>,

    /// Output file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PrintArgs {
    /// Patch file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Copy)]
struct Global {
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrintMode {
    FirstWindow,
    AllWindows,
    Instructions,
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("oxipatch".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv)
        && let Cmd::Encode(args) = cli.command
    {
        let _ = build_compress_options(&args.tuning);
    }
}

// ---------------------------------------------------------------------------
// Exit code mapping
// ---------------------------------------------------------------------------

fn decode_exit_code(e: &DecodeError) -> i32 {
    match e {
        DecodeError::MalformedInstruction(_)
        | DecodeError::OutOfRangeCopy { .. }
        | DecodeError::InvalidHeader(_) => EXIT_MALFORMED,
        DecodeError::CorruptDelta { .. } => EXIT_CHECKSUM,
        DecodeError::UnsupportedVersion { .. } => EXIT_VERSION,
        DecodeError::Cancelled => EXIT_CANCELLED,
        DecodeError::Io(_) => EXIT_IO,
    }
}

fn exit_code(e: &IoError) -> i32 {
    match e {
        IoError::Io(_) => EXIT_IO,
        IoError::Encode(EncodeError::InvalidOptions(_)) => EXIT_USAGE,
        IoError::Encode(EncodeError::Cancelled) => EXIT_CANCELLED,
        IoError::Encode(EncodeError::Io(_)) => EXIT_IO,
        IoError::Decode(e) => decode_exit_code(e),
    }
}

fn fail(context: &str, e: &IoError) -> i32 {
    eprintln!("oxipatch: {context}: {e}");
    exit_code(e)
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

fn init_logging(g: &Global) {
    let default_level = match (g.quiet, g.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

/// Hooks that forward every library message to the log.
fn logging_hooks<'a>() -> Hooks<'a> {
    Hooks::new().with_message(|m| log::info!("{m}"))
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("oxipatch version {version}, patch format version {FORMAT_VERSION}");

    let lzma = cfg!(feature = "lzma-secondary") as u8;
    let zlib = cfg!(feature = "zlib-secondary") as u8;
    let adler32 = cfg!(feature = "adler32") as u8;
    let file_io = cfg!(feature = "file-io") as u8;
    let parallel = cfg!(feature = "parallel") as u8;

    eprintln!("SECONDARY_LZMA={lzma}");
    eprintln!("SECONDARY_ZLIB={zlib}");
    eprintln!("ADLER32_SIMD={adler32}");
    eprintln!("FILE_IO={file_io}");
    eprintln!("PARALLEL={parallel}");
    eprintln!("DEFAULT_LEVEL={DEFAULT_LEVEL}");
    eprintln!("DEFAULT_BLOCK_SIZE={DEFAULT_BLOCK_SIZE}");
    eprintln!("MAX_BLOCK_SIZE={MAX_BLOCK_SIZE}");
    eprintln!("DEFAULT_MIN_MATCH={DEFAULT_MIN_MATCH}");
    eprintln!("DEFAULT_WINDOW_SIZE={DEFAULT_WINDOW_SIZE}");
    eprintln!("HARD_MAX_WINDOW={HARD_MAX_WINDOW}");
    for level in 0..=9 {
        let profile = config::config_for_level(level);
        eprintln!(
            "LEVEL_{level}={} (chain {})",
            if level == 0 { "store" } else { profile.name },
            profile.max_chain
        );
    }

    EXIT_OK
}

// ---------------------------------------------------------------------------
// Build CompressOptions from CLI options
// ---------------------------------------------------------------------------

fn build_compress_options(t: &EncodeTuningArgs) -> Result<CompressOptions, String> {
    let secondary = match t.secondary {
        SecondaryArg::None => SecondaryCompression::None,
        #[cfg(feature = "lzma-secondary")]
        SecondaryArg::Lzma => SecondaryCompression::Lzma,
        #[cfg(feature = "zlib-secondary")]
        SecondaryArg::Zlib => SecondaryCompression::Zlib { level: t.level },
        #[allow(unreachable_patterns)]
        other => {
            log::warn!("secondary compressor {other:?} not built in, using none");
            SecondaryCompression::None
        }
    };

    let block_size =
        usize::try_from(t.block_size).map_err(|_| format!("block size {} too large", t.block_size))?;
    let window_size = usize::try_from(t.window_size)
        .map_err(|_| format!("window size {} too large", t.window_size))?;

    let opts = CompressOptions {
        level: t.level,
        block_size,
        min_match: t.min_match,
        window_size,
        secondary,
        app_header: t.description.as_ref().map(|d| d.as_bytes().to_vec()),
    };
    opts.validate().map_err(|e| e.to_string())?;
    Ok(opts)
}

// ---------------------------------------------------------------------------
// Shared input/output resolution
// ---------------------------------------------------------------------------

fn read_source(path: Option<&Path>) -> Result<Vec<u8>, IoError> {
    match path {
        Some(path) => Ok(std::fs::read(path)?),
        None => Ok(Vec::new()),
    }
}

/// Open `path` (or stdin) and report its length when it is a file.
fn open_input(path: Option<&Path>) -> io::Result<(Box<dyn Read>, Option<u64>)> {
    match path {
        Some(path) => {
            let f = File::open(path)?;
            let len = f.metadata()?.len();
            Ok((Box::new(BufReader::with_capacity(BUF_SIZE, f)), Some(len)))
        }
        None => Ok((Box::new(BufReader::with_capacity(BUF_SIZE, io::stdin())), None)),
    }
}

/// The output file, or `None` for stdout. Refuses to clobber without `-f`.
fn resolve_output(
    g: &Global,
    stdout: bool,
    output: Option<PathBuf>,
) -> Result<Option<PathBuf>, String> {
    match output {
        Some(path) if stdout => {
            if !g.quiet {
                log::warn!("-c overrides output filename: {}", path.display());
            }
            Ok(None)
        }
        Some(path) if path.exists() && !g.force => Err(format!(
            "output file exists, use -f to overwrite: {}",
            path.display()
        )),
        other => Ok(other),
    }
}

fn print_json(value: serde_json::Value) {
    eprintln!("{value:#}");
}

fn digest_json(d: Option<[u8; 32]>) -> serde_json::Value {
    d.map_or(serde_json::Value::Null, |d| file_io::hex_digest(&d).into())
}

// ---------------------------------------------------------------------------
// Encode command
// ---------------------------------------------------------------------------

fn cmd_encode(g: &Global, args: EncodeArgs) -> i32 {
    let opts = match build_compress_options(&args.tuning) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("oxipatch: {e}");
            return EXIT_USAGE;
        }
    };
    let level = opts.level;

    let source = match read_source(args.source.as_deref()) {
        Ok(s) => s,
        Err(e) => return fail("source file", &e),
    };

    let input = args.input.or(args.input_pos);
    let (reader, target_len) = match open_input(input.as_deref()) {
        Ok(r) => r,
        Err(e) => return fail("input file", &IoError::Io(e)),
    };

    let output = match resolve_output(g, args.stdout, args.output.or(args.output_pos)) {
        Ok(o) => o,
        Err(msg) => {
            eprintln!("oxipatch: {msg}");
            return EXIT_FAILURE;
        }
    };

    let mut hooks = logging_hooks();
    let result = match &output {
        Some(path) => encode_to_file(&source, reader, path, opts, target_len, &mut hooks),
        None => {
            let writer = BufWriter::with_capacity(BUF_SIZE, io::stdout().lock());
            file_io::encode_stream(&source, reader, writer, opts, target_len, &mut hooks)
                .and_then(|(mut w, stats)| {
                    w.flush()?;
                    Ok(stats)
                })
        }
    };

    let stats = match result {
        Ok(s) => s,
        Err(e) => return fail("encode", &e),
    };
    report_encode(g, &stats, level);
    EXIT_OK
}

fn encode_to_file(
    source: &[u8],
    reader: Box<dyn Read>,
    path: &Path,
    opts: CompressOptions,
    target_len: Option<u64>,
    hooks: &mut Hooks<'_>,
) -> Result<EncodeStats, IoError> {
    let writer = BufWriter::with_capacity(BUF_SIZE, file_io::temp_sibling(path)?);
    let (writer, stats) = file_io::encode_stream(source, reader, writer, opts, target_len, hooks)?;
    file_io::commit(writer, path)?;
    Ok(stats)
}

fn report_encode(g: &Global, stats: &EncodeStats, level: u32) {
    if g.verbose > 0 && !g.quiet {
        eprintln!(
            "oxipatch: encoder: source size: {}, input size: {}, delta size: {}, windows: {}",
            stats.source_size, stats.target_size, stats.delta_size, stats.windows
        );
    }
    if g.json_output {
        print_json(serde_json::json!({
            "command": "encode",
            "source_size": stats.source_size,
            "input_size": stats.target_size,
            "delta_size": stats.delta_size,
            "windows": stats.windows,
            "level": level,
            "source_sha256": digest_json(stats.source_sha256),
            "input_sha256": digest_json(stats.target_sha256),
        }));
    }
}

// ---------------------------------------------------------------------------
// Decode command
// ---------------------------------------------------------------------------

fn cmd_decode(g: &Global, args: DecodeArgs) -> i32 {
    let source = match read_source(args.source.as_deref()) {
        Ok(s) => s,
        Err(e) => return fail("source file", &e),
    };

    let input = args.input.or(args.input_pos);
    let (reader, _) = match open_input(input.as_deref()) {
        Ok(r) => r,
        Err(e) => return fail("input file", &IoError::Io(e)),
    };

    let output = if args.check_only {
        None
    } else {
        match resolve_output(g, args.stdout, args.output.or(args.output_pos)) {
            Ok(o) => o,
            Err(msg) => {
                eprintln!("oxipatch: {msg}");
                return EXIT_FAILURE;
            }
        }
    };

    let verify = !args.no_checksum;
    let mut hooks = logging_hooks();
    let result = if args.check_only {
        file_io::decode_stream(&source, reader, &mut io::sink(), verify, &mut hooks)
    } else {
        match &output {
            Some(path) => decode_to_file(&source, reader, path, verify, &mut hooks),
            None => decode_to_stdout(&source, reader, verify, &mut hooks),
        }
    };

    let stats = match result {
        Ok(s) => s,
        Err(e) => return fail("decode", &e),
    };
    report_decode(g, &stats);
    EXIT_OK
}

fn decode_to_file(
    source: &[u8],
    reader: Box<dyn Read>,
    path: &Path,
    verify: bool,
    hooks: &mut Hooks<'_>,
) -> Result<DecodeStats, IoError> {
    let mut writer = BufWriter::with_capacity(BUF_SIZE, file_io::temp_sibling(path)?);
    let stats = file_io::decode_stream(source, reader, &mut writer, verify, hooks)?;
    file_io::commit(writer, path)?;
    Ok(stats)
}

/// Nothing reaches stdout until the whole stream has verified.
fn decode_to_stdout(
    source: &[u8],
    reader: Box<dyn Read>,
    verify: bool,
    hooks: &mut Hooks<'_>,
) -> Result<DecodeStats, IoError> {
    let mut buffered = Vec::new();
    let stats = file_io::decode_stream(source, reader, &mut buffered, verify, hooks)?;
    let mut out = io::stdout().lock();
    out.write_all(&buffered)?;
    out.flush()?;
    Ok(stats)
}

fn report_decode(g: &Global, stats: &DecodeStats) {
    if g.verbose > 0 && !g.quiet {
        eprintln!(
            "oxipatch: decoder: output size: {}, windows: {}",
            stats.output_size, stats.windows
        );
    }
    if g.json_output {
        print_json(serde_json::json!({
            "command": "decode",
            "source_size": stats.source_size,
            "delta_size": stats.delta_size,
            "output_size": stats.output_size,
            "windows": stats.windows,
            "output_sha256": digest_json(stats.output_sha256),
        }));
    }
}

// ---------------------------------------------------------------------------
// Print commands (header, headers, delta)
// ---------------------------------------------------------------------------

fn flag_names<I: Iterator<Item = (&'static str, T)>, T>(names: I) -> String {
    let names: Vec<&str> = names.map(|(name, _)| name).collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(" ")
    }
}

fn print_stream_header(out: &mut impl Write, hdr: &StreamHeader) -> io::Result<()> {
    writeln!(out, "format version:          {}", hdr.version)?;
    writeln!(out, "header size:             {}", hdr.encoded_len())?;
    writeln!(out, "header flags:            {}", flag_names(hdr.flags().iter_names()))?;
    match hdr.secondary_id {
        Some(id) => writeln!(
            out,
            "secondary compressor:    {} (id={id})",
            header::secondary_name(id)
        )?,
        None => writeln!(out, "secondary compressor:    none")?,
    }
    writeln!(out, "source length:           {}", hdr.source_len)?;
    if let Some(t) = hdr.target_len {
        writeln!(out, "target length:           {t}")?;
    }
    if let Some(desc) = hdr.description() {
        writeln!(out, "description:             {desc}")?;
    }
    Ok(())
}

fn print_window_header(
    out: &mut impl Write,
    index: u64,
    target_offset: u64,
    wh: &WindowHeader,
) -> io::Result<()> {
    writeln!(out, "window number:           {index}")?;
    writeln!(out, "window flags:            {}", flag_names(wh.flags.iter_names()))?;
    writeln!(out, "window at offset:        {target_offset}")?;
    if wh.has_source() {
        writeln!(out, "source range offset:     {}", wh.source_offset)?;
        writeln!(out, "source range length:     {}", wh.source_len)?;
    }
    writeln!(out, "target window length:    {}", wh.target_len)?;
    writeln!(out, "payload length:          {}", wh.payload_len)?;
    writeln!(out, "payload checksum:        {:08X}", wh.payload_checksum)?;
    writeln!(out, "target checksum:         {:08X}", wh.target_checksum)?;
    Ok(())
}

enum PrintError {
    Io(io::Error),
    Decode(DecodeError),
}

impl From<io::Error> for PrintError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<DecodeError> for PrintError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

fn print_patch<R: Read, W: Write>(reader: R, out: &mut W, mode: PrintMode) -> Result<(), PrintError> {
    let mut decoder = StreamDecoder::new(reader, true);
    print_stream_header(out, decoder.read_header()?)?;

    let mut target_offset = 0u64;
    while let Some(record) = decoder.read_window_raw()? {
        writeln!(out)?;
        print_window_header(out, record.index, target_offset, &record.header)?;
        let window_len = record.header.target_len;

        if mode == PrintMode::Instructions {
            let record = decoder.expand(record)?;
            writeln!(out, "  Offset   Type        Size  Source")?;
            let mut offset = target_offset;
            for inst in record.instructions() {
                match inst? {
                    Instruction::Copy { offset: src, len } => {
                        writeln!(out, "  {offset:06}   COPY   {len:9}  S@{src}")?;
                        offset += len;
                    }
                    Instruction::Insert { data } => {
                        writeln!(out, "  {offset:06}   INSERT {:9}", data.len())?;
                        offset += data.len() as u64;
                    }
                }
            }
        }

        target_offset += window_len;
        if mode == PrintMode::FirstWindow {
            break;
        }
    }
    out.flush()?;
    Ok(())
}

fn cmd_print(args: PrintArgs, mode: PrintMode) -> i32 {
    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("oxipatch: {}: {e}", args.input.display());
            return EXIT_IO;
        }
    };
    let reader = BufReader::with_capacity(BUF_SIZE, file);
    let mut out = BufWriter::new(io::stdout().lock());

    match print_patch(reader, &mut out, mode) {
        Ok(()) => EXIT_OK,
        Err(PrintError::Io(e)) => {
            eprintln!("oxipatch: {e}");
            EXIT_IO
        }
        Err(PrintError::Decode(e)) => {
            // Flush what was printed so far so the reader sees where it broke.
            let _ = out.flush();
            eprintln!("oxipatch: {}: {e}", args.input.display());
            decode_exit_code(&e)
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    // Usage errors exit with code 2 from here.
    let cli = Cli::parse();
    let g = Global {
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
    };
    init_logging(&g);

    let exit_code = match cli.command {
        Cmd::Encode(args) => cmd_encode(&g, args),
        Cmd::Decode(args) => cmd_decode(&g, args),
        Cmd::Config => cmd_config(),
        Cmd::Header(args) => cmd_print(args, PrintMode::FirstWindow),
        Cmd::Headers(args) => cmd_print(args, PrintMode::AllWindows),
        Cmd::Delta(args) => cmd_print(args, PrintMode::Instructions),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
