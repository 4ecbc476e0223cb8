use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "kosma", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one card face as a PNG.
    Face(FaceArgs),
    /// Export the phone-sized share PNG (both faces plus QR).
    ExportPng(ExportPngArgs),
    /// Export the card as a vCard 3.0 file.
    ExportVcf(ExportVcfArgs),
    /// Print the share link for a card.
    Share(ShareArgs),
    /// Decode a share payload back into card JSON.
    Decode(DecodeArgs),
    /// Render one frame of the ambient background.
    Ambient(AmbientArgs),
}

#[derive(Parser, Debug)]
struct FaceArgs {
    /// Input card JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Which face to render.
    #[arg(long, value_enum, default_value_t = SideChoice::Front)]
    side: SideChoice,

    /// Pixel scale (1.0 = 1050x600).
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Override the card's style.
    #[arg(long, value_enum)]
    style: Option<StyleChoice>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct ExportPngArgs {
    /// Input card JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Origin for the embedded share link.
    #[arg(long, default_value = "https://kosma.cards")]
    origin: String,

    /// Output PNG path; defaults to `<name-slug>.png`.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ExportVcfArgs {
    /// Input card JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output VCF path; defaults to `<name-slug>.vcf`.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ShareArgs {
    /// Input card JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Origin for the link.
    #[arg(long, default_value = "https://kosma.cards")]
    origin: String,

    /// Print only the payload, not the full URL.
    #[arg(long)]
    payload_only: bool,
}

#[derive(Parser, Debug)]
struct DecodeArgs {
    /// The `data=` payload (or a full share URL).
    payload: String,
}

#[derive(Parser, Debug)]
struct AmbientArgs {
    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Field seed; the same seed always yields the same frame.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Seconds of drift to simulate before capturing the frame.
    #[arg(long, default_value_t = 0.0)]
    time: f64,

    /// Style whose palette tints the field.
    #[arg(long, value_enum, default_value_t = StyleChoice::Kosma)]
    style: StyleChoice,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SideChoice {
    Front,
    Back,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StyleChoice {
    Kosma,
    Techno,
}

impl From<StyleChoice> for kosma::CardStyle {
    fn from(c: StyleChoice) -> Self {
        match c {
            StyleChoice::Kosma => kosma::CardStyle::Kosma,
            StyleChoice::Techno => kosma::CardStyle::Techno,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Face(args) => cmd_face(args),
        Command::ExportPng(args) => cmd_export_png(args),
        Command::ExportVcf(args) => cmd_export_vcf(args),
        Command::Share(args) => cmd_share(args),
        Command::Decode(args) => cmd_decode(args),
        Command::Ambient(args) => cmd_ambient(args),
    }
}

fn read_card_json(path: &Path) -> anyhow::Result<kosma::Card> {
    let f = File::open(path).with_context(|| format!("open card '{}'", path.display()))?;
    let r = BufReader::new(f);
    let card: kosma::Card = serde_json::from_reader(r).with_context(|| "parse card JSON")?;
    Ok(card)
}

fn write_png(out: &Path, frame: &kosma::FrameRgba) -> anyhow::Result<()> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        out,
        &frame.to_straight_rgba(),
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", out.display()))?;
    eprintln!("wrote {}", out.display());
    Ok(())
}

fn cmd_face(args: FaceArgs) -> anyhow::Result<()> {
    let card = read_card_json(&args.in_path)?;
    let style = args.style.map_or(card.style, Into::into);
    let side = match args.side {
        SideChoice::Front => kosma::FaceSide::Front,
        SideChoice::Back => kosma::FaceSide::Back,
    };

    let layout = kosma::resolve_layout(&card, style);
    let plan = kosma::compile_face(
        &layout,
        side,
        &kosma::PlanOptions {
            scale: args.scale,
            photo: card.photo.clone(),
            ..kosma::PlanOptions::default()
        },
    );
    let frame = kosma::FaceRasterizer::new().render(&plan)?;
    write_png(&args.out, &frame)
}

fn cmd_export_png(args: ExportPngArgs) -> anyhow::Result<()> {
    let card = read_card_json(&args.in_path)?;
    let bytes = kosma::export::export_png_for_origin(&card, &args.origin)?;

    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(format!("{}.png", kosma::export::artifact_file_stem(&card))));
    std::fs::write(&out, bytes).with_context(|| format!("write png '{}'", out.display()))?;
    eprintln!("wrote {}", out.display());
    Ok(())
}

fn cmd_export_vcf(args: ExportVcfArgs) -> anyhow::Result<()> {
    let card = read_card_json(&args.in_path)?;
    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(format!("{}.vcf", kosma::export::artifact_file_stem(&card))));
    std::fs::write(&out, kosma::export::vcard(&card))
        .with_context(|| format!("write vcf '{}'", out.display()))?;
    eprintln!("wrote {}", out.display());
    Ok(())
}

fn cmd_share(args: ShareArgs) -> anyhow::Result<()> {
    let card = read_card_json(&args.in_path)?;
    let snapshot = kosma::ShareSnapshot::from_card(&card);
    if args.payload_only {
        println!("{}", kosma::encode_snapshot(&snapshot)?);
    } else {
        println!(
            "{}",
            kosma::viewer_url(&args.origin, &kosma::new_share_id(), &snapshot)?
        );
    }
    Ok(())
}

fn cmd_decode(args: DecodeArgs) -> anyhow::Result<()> {
    // Accept a full share URL for convenience.
    let payload = args
        .payload
        .rsplit_once("data=")
        .map_or(args.payload.as_str(), |(_, p)| p);
    let snapshot = kosma::decode_snapshot(payload)
        .ok_or_else(|| anyhow::anyhow!("payload is not a valid card snapshot"))?;
    println!("{}", serde_json::to_string_pretty(&snapshot.into_card())?);
    Ok(())
}

fn cmd_ambient(args: AmbientArgs) -> anyhow::Result<()> {
    let theme = kosma::template::Theme::for_style(args.style.into());
    let mut field = kosma::ambient::AmbientField::new(args.width, args.height, args.seed, theme);
    // Step in fixed 60 Hz ticks so `--time` is reproducible.
    let mut remaining = args.time;
    while remaining > 0.0 {
        let dt = remaining.min(1.0 / 60.0);
        field.tick(dt);
        remaining -= dt;
    }
    let frame = field.render()?;
    write_png(&args.out, &frame)
}
