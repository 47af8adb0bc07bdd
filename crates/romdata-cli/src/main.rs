use clap::{Args as ClapArgs, Parser, Subcommand};
use romdata_core::model::render_fields;
use romdata_core::{BlockAddr, CisoImage, Error, JsonOpts, ReadLimits};
use std::fs::File;
use std::path::PathBuf;
use std::process::exit;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "romdata",
    about = "Show metadata of chiptunes, disc images and console saves as JSON",
    version
)]
struct Cli {
    /// Log parser decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Detect one file and print its metadata
    Show(ShowArgs),
    /// Print metadata for every file in a directory as one JSON map
    Scan(ScanArgs),
    /// Print the logical to physical block table of a CISO image
    Blocks(BlocksArgs),
}

#[derive(ClapArgs, Debug)]
struct OutputArgs {
    /// Include the typed record next to the display fields
    #[arg(long, default_value_t = false)]
    raw: bool,
    /// Max rows to include per table field
    #[arg(long, default_value_t = 256)]
    max_rows: usize,
    /// Bytes read from the start of the file for tag headers
    #[arg(long, default_value_t = 4096)]
    tag_bytes: usize,
}

impl OutputArgs {
    fn opts(&self) -> JsonOpts {
        JsonOpts {
            max_rows: self.max_rows,
            raw: self.raw,
        }
    }

    fn limits(&self) -> ReadLimits {
        ReadLimits {
            tag_header_bytes: self.tag_bytes,
        }
    }
}

#[derive(ClapArgs, Debug)]
struct ShowArgs {
    /// File to inspect
    path: PathBuf,
    /// Print aligned text instead of JSON
    #[arg(long, default_value_t = false)]
    text: bool,
    #[command(flatten)]
    out: OutputArgs,
}

#[derive(ClapArgs, Debug)]
struct ScanArgs {
    /// Directory to scan
    dir: PathBuf,
    /// Descend into subdirectories
    #[arg(short, long, default_value_t = false)]
    recursive: bool,
    #[command(flatten)]
    out: OutputArgs,
}

#[derive(ClapArgs, Debug)]
struct BlocksArgs {
    /// CISO image
    path: PathBuf,
    /// Max blocks to list
    #[arg(long)]
    limit: Option<usize>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.cmd {
        Cmd::Show(a) => cmd_show(a),
        Cmd::Scan(a) => cmd_scan(a),
        Cmd::Blocks(a) => cmd_blocks(a),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(e: &Error) -> ! {
    eprintln!("error: {}", e);
    exit(match e {
        Error::Unsupported(_) => 3,
        Error::Json(_) => 4,
        Error::Rejected | Error::Io(_) | Error::Parse(_) => 2,
    });
}

fn cmd_show(args: ShowArgs) {
    if args.text {
        let mut file = File::open(&args.path).unwrap_or_else(|e| fail(&e.into()));
        let info = romdata_core::detect(&mut file, &args.out.limits()).unwrap_or_else(|e| fail(&e));
        println!("{}", info.format_name());
        print!("{}", render_fields(&info.fields()));
        return;
    }
    match romdata_core::dump_file_json(&args.path, args.out.opts(), &args.out.limits()) {
        Ok(s) => println!("{}", s),
        Err(e) => fail(&e),
    }
}

fn cmd_scan(args: ScanArgs) {
    if !args.dir.is_dir() {
        eprintln!("error: not a directory: {}", args.dir.display());
        exit(2);
    }
    match romdata_core::dump_dir_map_json(
        &args.dir,
        args.recursive,
        args.out.opts(),
        &args.out.limits(),
    ) {
        Ok(s) => println!("{}", s),
        Err(e) => fail(&e),
    }
}

fn cmd_blocks(args: BlocksArgs) {
    let file = File::open(&args.path).unwrap_or_else(|e| fail(&e.into()));
    let image = CisoImage::open(file).unwrap_or_else(|e| fail(&e));
    let map = image.block_map();
    println!(
        "block size {:#x}, disc size {:#x}, {} stored blocks",
        image.block_size(),
        image.disc_size(),
        map.used_blocks()
    );
    let limit = args.limit.unwrap_or(usize::MAX);
    for (logical, addr) in map.iter().take(limit) {
        match addr {
            BlockAddr::Empty => println!("{:6}\tempty", logical),
            BlockAddr::Physical(a) => println!("{:6}\t{:#012x}", logical, a),
        }
    }
}
