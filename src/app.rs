use crate::cli::{Cli, Commands, EncodeArgs};
use anyhow::Result;
use ffmerge::config::Config;
use ffmerge::engine::{
    self, Codec, EncodeError, EncodeRequest, EncodeStrategy, EncoderTag, FfmpegBackend, Mode,
    Preferences, Preview,
};
use std::path::{Path, PathBuf};

pub fn run(cli: Cli) -> i32 {
    // init-config must work even when the file is missing or broken
    if let Commands::InitConfig = cli.command {
        return handle_init_config(cli.config.as_deref());
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return engine::error::EXIT_INVALID_INPUT;
        }
    };

    match cli.command {
        Commands::Merge {
            args,
            output,
            reencode,
            copy,
        } => {
            let mode = if reencode {
                Mode::Reencode
            } else if copy {
                Mode::Copy
            } else {
                config.defaults.mode
            };
            handle_merge(&config, args, output, mode)
        }
        Commands::Transcode {
            args,
            output_dir,
            container,
        } => handle_transcode(&config, args, output_dir, container),
        Commands::Encoders { codec, prefer } => handle_encoders(&config, codec, prefer),
        Commands::CheckFfmpeg => handle_check_ffmpeg(&config),
        Commands::InitConfig => handle_init_config(cli.config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn report(err: &EncodeError) -> i32 {
    eprintln!("Error: {}", err);
    err.exit_code()
}

fn sources(args: &EncodeArgs) -> Vec<PathBuf> {
    if args.inputs.is_empty() {
        vec![std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))]
    } else {
        args.inputs.clone()
    }
}

fn preferences(config: &Config, prefer: &[EncoderTag]) -> Preferences {
    if prefer.is_empty() {
        config.preferences()
    } else {
        Preferences::new(prefer.to_vec())
    }
}

/// Config defaults with CLI overrides applied
fn build_request(
    config: &Config,
    args: &EncodeArgs,
    inputs: Vec<PathBuf>,
    output: PathBuf,
    mode: Mode,
) -> Result<EncodeRequest> {
    Ok(EncodeRequest::new(inputs, output)
        .with_mode(mode)
        .with_codec(args.codec.unwrap_or(config.defaults.codec))
        .with_audio_policy(args.audio.unwrap_or(config.defaults.audio_policy))
        .with_encoder_override(args.encoder.clone())
        .with_overwrite(args.overwrite || config.defaults.overwrite)
        .with_audio_bitrate(config.defaults.audio_bitrate_kbps)
        .with_extra_args(config.extra_args()?))
}

fn plan(config: &Config, args: &EncodeArgs, request: &EncodeRequest) -> Result<EncodeStrategy, EncodeError> {
    // An explicit encoder needs no probe
    let probe = if request.encoder_override.is_some() {
        None
    } else {
        Some(engine::capabilities(&config.tools.ffmpeg)?)
    };
    let empty = engine::CapabilityProbe::default();

    let mut settings = config.strategy_settings();
    if args.no_retry {
        settings.retry_enabled = false;
    }

    Ok(EncodeStrategy::plan(
        request,
        probe.unwrap_or(&empty),
        &preferences(config, &args.prefer),
        &settings,
    ))
}

fn print_preview(preview: &Preview) {
    if let Some(manifest) = &preview.manifest {
        println!("# concat.txt");
        print!("{}", manifest);
    }
    println!("# audio: {}", preview.audio);
    for (idx, cmd) in preview.commands.iter().enumerate() {
        let label = if idx == 0 { "primary" } else { "retry" };
        println!("# {}", label);
        println!("{}", cmd);
    }
}

fn handle_merge(config: &Config, args: EncodeArgs, output: PathBuf, mode: Mode) -> i32 {
    let extensions = if args.ext.is_empty() {
        config.defaults.extensions.clone()
    } else {
        args.ext.clone()
    };

    let inputs = match engine::collect_inputs(&sources(&args), &extensions, args.recursive) {
        Ok(inputs) => inputs,
        Err(e) => return report(&e),
    };
    // Checked before touching ffmpeg at all
    if inputs.is_empty() {
        return report(&EncodeError::NoMatchingInputs);
    }

    let request = match build_request(config, &args, inputs, output, mode) {
        Ok(req) => req,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return engine::error::EXIT_INVALID_INPUT;
        }
    };
    let strategy = match plan(config, &args, &request) {
        Ok(s) => s,
        Err(e) => return report(&e),
    };

    let mut backend = FfmpegBackend::new(&config.tools.ffmpeg, &config.tools.ffprobe);
    let safety = config.audio_safety();

    if args.dry_run {
        return match engine::preview(&request, &strategy, &mut backend, &safety) {
            Ok(preview) => {
                print_preview(&preview);
                0
            }
            Err(e) => report(&e),
        };
    }

    println!(
        "Merging {} file(s) into {}",
        request.inputs().len(),
        request.output.display()
    );
    match engine::execute(&request, &strategy, &mut backend, &safety) {
        Ok(done) => {
            println!(
                "Done: {} ({} bytes, {}, audio {})",
                done.output.display(),
                done.bytes_written,
                done.strategy,
                done.audio
            );
            0
        }
        Err(e) => report(&e),
    }
}

fn handle_transcode(
    config: &Config,
    args: EncodeArgs,
    output_dir: Option<PathBuf>,
    container: Option<String>,
) -> i32 {
    let extensions = if args.ext.is_empty() {
        config.defaults.extensions.clone()
    } else {
        args.ext.clone()
    };

    let inputs = match engine::collect_inputs(&sources(&args), &extensions, args.recursive) {
        Ok(inputs) => inputs,
        Err(e) => return report(&e),
    };
    if inputs.is_empty() {
        return report(&EncodeError::NoMatchingInputs);
    }

    let container = container.unwrap_or_else(|| config.defaults.container.clone());
    // Per-file outputs are derived from each input; the request output is unused
    let request = match build_request(config, &args, inputs, PathBuf::new(), Mode::Reencode) {
        Ok(req) => req.with_container(&container),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return engine::error::EXIT_INVALID_INPUT;
        }
    };
    let strategy = match plan(config, &args, &request) {
        Ok(s) => s,
        Err(e) => return report(&e),
    };

    let mut backend = FfmpegBackend::new(&config.tools.ffmpeg, &config.tools.ffprobe);
    let safety = config.audio_safety();
    let output_dir = output_dir.as_deref();

    if args.dry_run {
        return match engine::preview_each(&request, &strategy, &mut backend, &safety, output_dir) {
            Ok(previews) => {
                for (input, preview) in request.inputs().iter().zip(&previews) {
                    println!("# {}", input.display());
                    print_preview(preview);
                }
                0
            }
            Err(e) => report(&e),
        };
    }

    let outcomes = match engine::execute_each(&request, &strategy, &mut backend, &safety, output_dir) {
        Ok(outcomes) => outcomes,
        Err(e) => return report(&e),
    };

    let mut exit_code = 0;
    let mut encoded = 0;
    for (input, outcome) in request.inputs().iter().zip(&outcomes) {
        match outcome {
            Ok(done) => {
                encoded += 1;
                println!(
                    "- {} -> {} ({})",
                    input.display(),
                    done.output.display(),
                    done.strategy
                );
            }
            Err(e) => {
                eprintln!("- {}: {}", input.display(), e);
                exit_code = exit_code.max(e.exit_code());
            }
        }
    }

    let skipped = request.inputs().len() - outcomes.len();
    println!(
        "Encoded {} of {} file(s){}",
        encoded,
        request.inputs().len(),
        if skipped > 0 {
            format!(", {} not attempted", skipped)
        } else {
            String::new()
        }
    );
    exit_code
}

fn handle_encoders(config: &Config, codec: Option<Codec>, prefer: Vec<EncoderTag>) -> i32 {
    let probe = match engine::capabilities(&config.tools.ffmpeg) {
        Ok(probe) => probe,
        Err(e) => return report(&e),
    };
    let codec = codec.unwrap_or(config.defaults.codec);
    let prefs = preferences(config, &prefer);

    let mut tags = prefs.order().to_vec();
    if !tags.contains(&prefs.fallback()) {
        tags.push(prefs.fallback());
    }

    println!("{} encoders:", codec.display_name());
    for tag in &tags {
        println!(
            "  {:<13} {:<18} {}",
            tag.as_str(),
            codec.encoder_name(*tag),
            if probe.supports(codec, *tag) { "available" } else { "missing" }
        );
    }

    let selected = engine::select_strategy(probe, codec, &prefs);
    println!(
        "Selected: {} ({})",
        selected,
        codec.encoder_name(selected)
    );
    0
}

fn handle_check_ffmpeg(config: &Config) -> i32 {
    match engine::ffmpeg_version(&config.tools.ffmpeg) {
        Ok(version) => {
            println!("ffmpeg found: {}", version);
            match engine::ffprobe_version(&config.tools.ffprobe) {
                Ok(probe_version) => {
                    println!("ffprobe found: {}", probe_version);
                    0
                }
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    engine::error::EXIT_INVALID_INPUT
                }
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            engine::error::EXIT_INVALID_INPUT
        }
    }
}

fn handle_init_config(path: Option<&Path>) -> i32 {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => match Config::config_path() {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                return engine::error::EXIT_INVALID_INPUT;
            }
        },
    };

    if config_path.exists() {
        match Config::load_from(&config_path) {
            Ok(cfg) => {
                println!("Config loaded successfully from {}", config_path.display());
                println!("{:#?}", cfg);
                0
            }
            Err(e) => {
                eprintln!("Config invalid: {:#}", e);
                engine::error::EXIT_INVALID_INPUT
            }
        }
    } else {
        println!("No config at {}", config_path.display());
        println!("Creating default config...");
        match Config::default().save_to(&config_path) {
            Ok(()) => {
                println!("Default config saved to {}", config_path.display());
                0
            }
            Err(e) => {
                eprintln!("Failed to save default config: {:#}", e);
                engine::error::EXIT_INVALID_INPUT
            }
        }
    }
}
