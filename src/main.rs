use anyhow::{bail, Context, Result};
use stamp_painter::logging::{init_logging, LoggingConfig};
use stamp_painter::{PainterConfig, Stamper};
use std::env;
use std::path::PathBuf;

const USAGE: &str = "Usage: stamp-painter <image> <output.png> [--config FILE] [--stamp X,Y]... \
[--scatter N] [--seed S] [--pixelate SIZE]";

#[derive(Debug, Default)]
struct Options {
    image: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    stamps: Vec<(f64, f64)>,
    scatter: Option<usize>,
    seed: Option<u64>,
    pixelate: Option<u32>,
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut positional = Vec::new();
    let mut options = Options::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next().with_context(|| format!("{} needs a value", flag))
        };
        match arg.as_str() {
            "--config" => options.config = Some(PathBuf::from(value("--config")?)),
            "--stamp" => {
                let raw = value("--stamp")?;
                let (x, y) = raw
                    .split_once(',')
                    .with_context(|| format!("--stamp expects X,Y, got {}", raw))?;
                let x = x.trim().parse().with_context(|| format!("bad x in {}", raw))?;
                let y = y.trim().parse().with_context(|| format!("bad y in {}", raw))?;
                options.stamps.push((x, y));
            }
            "--scatter" => options.scatter = Some(value("--scatter")?.parse().context("--scatter expects a count")?),
            "--seed" => options.seed = Some(value("--seed")?.parse().context("--seed expects an integer")?),
            "--pixelate" => options.pixelate = Some(value("--pixelate")?.parse().context("--pixelate expects a size")?),
            flag if flag.starts_with("--") => bail!("unknown option {}\n{}", flag, USAGE),
            _ => positional.push(arg.clone()),
        }
    }

    if positional.len() != 2 {
        bail!("{}", USAGE);
    }
    options.output = PathBuf::from(positional.pop().unwrap_or_default());
    options.image = PathBuf::from(positional.pop().unwrap_or_default());
    Ok(options)
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let args: Vec<String> = env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(1);
        }
    };

    let config = match &options.config {
        Some(path) => PainterConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => PainterConfig::default(),
    };
    let style = config.style;

    let mut stamper = Stamper::new(config.canvas)?;
    log::info!("canvas {}x{}", stamper.width(), stamper.height());

    stamper
        .load_image(&options.image)
        .with_context(|| format!("loading {}", options.image.display()))?;

    for &(x, y) in &options.stamps {
        stamper.stamp_at(x, y, &style);
    }

    if let Some(count) = options.scatter {
        if let Some(seed) = stamper.random_scatter(count, options.seed, &style) {
            log::info!("scattered {} stamps (seed {})", count, seed);
        }
    }

    if let Some(size) = options.pixelate {
        stamper.pixelate(size, &style);
    }

    stamper
        .canvas()
        .save(&options.output)
        .with_context(|| format!("saving {}", options.output.display()))?;

    log::info!("{} actions drawn, saved to {}", stamper.actions().len(), options.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_all_options() {
        let options = parse_args(&args(&[
            "in.jpg", "--stamp", "10,20.5", "--scatter", "300", "--seed", "9", "out.png", "--pixelate", "25",
            "--stamp", "1, 2",
        ]))
        .unwrap();
        assert_eq!(options.image, PathBuf::from("in.jpg"));
        assert_eq!(options.output, PathBuf::from("out.png"));
        assert_eq!(options.stamps, vec![(10.0, 20.5), (1.0, 2.0)]);
        assert_eq!(options.scatter, Some(300));
        assert_eq!(options.seed, Some(9));
        assert_eq!(options.pixelate, Some(25));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args(&args(&["only-one.png"])).is_err());
        assert!(parse_args(&args(&["a", "b", "--stamp", "12"])).is_err());
        assert!(parse_args(&args(&["a", "b", "--scatter"])).is_err());
        assert!(parse_args(&args(&["a", "b", "--frobnicate"])).is_err());
    }
}
