use std::path::PathBuf;

use post_reel::filter::TypeFilter;
use post_reel::RunOptions;

const USAGE: &str = "post-reel - Browse captured social posts from the terminal.

Usage: post-reel [OPTIONS] [POSTS.json]

  --version, -V          Show version and exit
  --help,    -h          Show this help message
  --verbose, -v          More detailed log output (repeat for trace)
  --config <FILE>        Read configuration from FILE
  --session <ID>         Load a saved session from the capture backend (\"latest\" for the newest)
  --sessions             List saved sessions on the capture backend and exit
  --demo                 Start with a built-in sample feed
  --search <TERM>        Initial search term
  --type <TYPE>          Initial type filter (all, text, image, video, article, repost)
  --export <DIR>         Write the filtered posts to DIR as JSON and exit";

enum Command {
    Exit,
    Run(RunOptions),
}

fn main() {
    let options = match parse_args(std::env::args().skip(1)) {
        Ok(Command::Exit) => return,
        Ok(Command::Run(options)) => options,
        Err(message) => {
            eprintln!("error: {message}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    if let Err(err) = post_reel::run(options) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Command, String> {
    let mut options = RunOptions::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("post-reel {}", post_reel::VERSION);
                return Ok(Command::Exit);
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                return Ok(Command::Exit);
            }
            "--verbose" | "-v" => options.verbosity = options.verbosity.saturating_add(1),
            "-vv" => options.verbosity = options.verbosity.saturating_add(2),
            "--config" => options.config_file = Some(PathBuf::from(value(&mut args, &arg)?)),
            "--session" => options.session = Some(value(&mut args, &arg)?),
            "--sessions" => options.list_sessions = true,
            "--demo" => options.demo = true,
            "--search" => options.search = Some(value(&mut args, &arg)?),
            "--type" => {
                let raw = value(&mut args, &arg)?;
                let filter =
                    TypeFilter::from_key(&raw).ok_or_else(|| format!("unknown post type: {raw}"))?;
                options.type_filter = Some(filter);
            }
            "--export" => options.export_dir = Some(PathBuf::from(value(&mut args, &arg)?)),
            flag if flag.starts_with('-') => return Err(format!("unknown option: {flag}")),
            path => {
                if options.input.is_some() {
                    return Err(format!("unexpected argument: {path}"));
                }
                options.input = Some(PathBuf::from(path));
            }
        }
    }
    Ok(Command::Run(options))
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, String> {
    args.next()
        .filter(|value| !value.starts_with("--"))
        .ok_or_else(|| format!("{flag} needs a value"))
}
