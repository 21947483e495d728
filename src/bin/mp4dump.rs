use anyhow::{Context as _, bail};
use clap::{ArgAction, Parser};
use mp4schema::{
    AmbiguityPolicy, BoxType, ConstPolicy, Context, DecodeOptions, DecodedBox, FourCC, Registry,
    Walker, build_registry, default_registry,
    json_api::{read_file, to_json},
    render_tree,
    util::hex_dump,
};
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(version, about = "Schema-driven MP4/ISOBMFF box dumper")]
struct Args {
    /// MP4/ISOBMFF file path
    path: String,

    /// Emit JSON instead of the indented tree
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Re-encode the decoded tree and compare it with the input bytes
    #[arg(long, action = ArgAction::SetTrue)]
    verify: bool,

    /// Deepest box nesting accepted
    #[arg(long, default_value_t = 64)]
    max_depth: usize,

    /// Keep reserved fields that hold unexpected values instead of failing
    #[arg(long, action = ArgAction::SetTrue)]
    accept_constants: bool,

    /// When several schemas match a box, use the first one registered
    #[arg(long, action = ArgAction::SetTrue)]
    first_match: bool,

    /// Hex-dump the payload of every box of this 4CC (e.g. --raw stsd)
    #[arg(long = "raw")]
    raw: Option<String>,

    /// Bytes to show per raw dump (0 means the entire payload)
    #[arg(long, default_value_t = 0)]
    bytes: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let owned;
    let registry: &Registry = if args.first_match {
        owned = build_registry(AmbiguityPolicy::FirstRegistered)?;
        &owned
    } else {
        default_registry()?
    };

    let const_policy = if args.accept_constants {
        ConstPolicy::Accept
    } else {
        ConstPolicy::Reject
    };
    let options = DecodeOptions::default()
        .with_const_policy(const_policy)
        .with_max_depth(args.max_depth);
    let walker = Walker::new(registry).with_options(options);
    let ctx = Context::new();

    let boxes = read_file(&args.path, &walker)
        .with_context(|| format!("decoding {}", args.path))?;

    if args.json {
        let json = to_json(&walker, &boxes, &ctx, 0)?;
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        print!("{}", render_tree(registry, &boxes, &ctx)?);
    }

    if args.verify {
        let original = std::fs::read(&args.path)?;
        let encoded = walker.encode(&boxes, &ctx)?;
        if encoded != original {
            let at = original
                .iter()
                .zip(&encoded)
                .position(|(a, b)| a != b)
                .unwrap_or(original.len().min(encoded.len()));
            bail!(
                "re-encoded output differs from input at byte {:#x} ({} vs {} bytes)",
                at,
                encoded.len(),
                original.len()
            );
        }
        eprintln!("verify: {} bytes round-trip exactly", original.len());
    }

    if let Some(sel) = args.raw.as_ref() {
        let cc = FourCC::from_str(sel).map_err(anyhow::Error::msg)?;
        dump_raw(&walker, &boxes, &ctx, &BoxType::FourCC(cc), args.bytes)?;
    }

    Ok(())
}

fn dump_raw(
    walker: &Walker<'_>,
    boxes: &[DecodedBox],
    ctx: &Context,
    wanted: &BoxType,
    limit: usize,
) -> anyhow::Result<()> {
    for b in boxes {
        if &b.box_type == wanted {
            let payload = walker.encode_payload(b, ctx)?;
            let n = if limit == 0 {
                payload.len()
            } else {
                limit.min(payload.len())
            };
            println!("\n== {} payload: len={} ==", b.box_type, payload.len());
            print!("{}", hex_dump(&payload[..n], 0));
        }
        let child_ctx = walker.child_context(b, ctx)?;
        dump_raw(walker, b.children(), &child_ctx, wanted, limit)?;
    }
    Ok(())
}
