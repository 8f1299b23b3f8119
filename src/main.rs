use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod align;
mod args;
mod audio;
mod burn;
mod encode;
mod error;
mod slideshow;
mod story;
mod subtitle;
mod tts;
mod utils;

use align::{load_alignment, CommandAligner, SubtitleJob};
use args::{AssetPaths, BurnOpts, Cli, Commands, MixOpts, SlideshowOpts, StoryOpts, SubtitleOpts, VoiceOpts};
use audio::{mix_audio, wav_duration_seconds};
use burn::{burn_subtitles, BurnOptions};
use encode::render_to_file;
use slideshow::Timeline;
use story::{generate_story, StoryScript};
use subtitle::{build_events, write_ass};
use tts::synthesize_narration;
use utils::{collect_images, split_sentences};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default, e.g. RUST_LOG=debug
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Story { paths, story } => run_story(&paths, &story).await,
        Commands::Narrate { paths, voice } => run_narrate(&paths, &voice),
        Commands::Mix { paths, mix } => match &mix.music {
            Some(music) => run_mix(&paths, &mix, music),
            None => anyhow::bail!("--music is required for the mix stage"),
        },
        Commands::Slideshow {
            paths,
            slideshow,
            audio,
        } => {
            let audio = audio.unwrap_or_else(|| paths.mix_out.clone());
            run_slideshow(&paths, &slideshow, &audio)
        }
        Commands::Subtitles { paths, subtitles } => run_subtitles(&paths, &subtitles),
        Commands::Burn { paths, burn } => run_burn(&paths, &burn).map(|_| ()),
        Commands::Run {
            paths,
            story,
            voice,
            mix,
            slideshow,
            subtitles,
            burn,
            skip_story,
        } => {
            info!("Starting story video pipeline");
            if skip_story {
                info!("Reusing story from {}", paths.story_json.display());
            } else {
                run_story(&paths, &story).await?;
            }
            run_narrate(&paths, &voice)?;
            let soundtrack = match &mix.music {
                Some(music) => {
                    run_mix(&paths, &mix, music)?;
                    paths.mix_out.clone()
                }
                None => {
                    info!("No background music given; using narration as the soundtrack");
                    paths.narration.clone()
                }
            };
            run_slideshow(&paths, &slideshow, &soundtrack)?;
            run_subtitles(&paths, &subtitles)?;
            let out = run_burn(&paths, &burn)?;
            info!("Process complete: {}", out.display());
            Ok(())
        }
    }
}

async fn run_story(paths: &AssetPaths, opts: &StoryOpts) -> anyhow::Result<()> {
    let api_key = opts
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .context("GPT4_API_KEY is not set; pass --api-key or export it")?;
    let script = generate_story(&opts.topic, api_key, &opts.model)
        .await
        .context("story generation failed")?;
    script
        .save(&paths.story_json)
        .with_context(|| format!("failed to save story to {}", paths.story_json.display()))?;
    info!("Story saved to {}", paths.story_json.display());
    Ok(())
}

fn run_narrate(paths: &AssetPaths, opts: &VoiceOpts) -> anyhow::Result<()> {
    let script = StoryScript::load(&paths.story_json)?;
    let sentences = split_sentences(&script.narration_text());
    info!("Narrating {} sentences", sentences.len());
    synthesize_narration(&opts.piper_model, &sentences, &paths.chunk_dir, &paths.narration)
        .context("narration failed")?;
    let duration = wav_duration_seconds(&paths.narration)?;
    info!("Narration length: {:.2} seconds", duration);
    Ok(())
}

fn run_mix(paths: &AssetPaths, opts: &MixOpts, music: &Path) -> anyhow::Result<()> {
    mix_audio(&paths.narration, music, &paths.mix_out, &opts.params()).context("audio mix failed")?;
    Ok(())
}

fn run_slideshow(paths: &AssetPaths, opts: &SlideshowOpts, audio: &Path) -> anyhow::Result<()> {
    let params = opts.resolve().context("invalid slideshow parameters")?;
    let images = collect_images(&paths.images)?;
    let duration = wav_duration_seconds(audio)
        .with_context(|| format!("cannot read audio length of {}", audio.display()))?;
    info!("Audio {} is {:.2} seconds", audio.display(), duration);

    let timeline = Timeline::from_paths(&images, duration, &params)?;
    render_to_file(&timeline, audio, &paths.video, &params).context("slideshow encoding failed")?;
    info!("Slideshow saved: {}", paths.video.display());
    Ok(())
}

fn run_subtitles(paths: &AssetPaths, opts: &SubtitleOpts) -> anyhow::Result<()> {
    let style = opts.resolve_style()?;
    let segments = match &opts.alignment {
        Some(alignment) => {
            info!("Using existing alignment {}", alignment.display());
            load_alignment(alignment)?
        }
        None => {
            let job = SubtitleJob::prepare(&paths.story_json, &paths.narration, &opts.checkpoint)?;
            let aligner = CommandAligner {
                program: opts.aligner.clone(),
                checkpoint: opts.checkpoint.clone(),
                language: opts.language.clone(),
            };
            job.align(&aligner).context("forced alignment failed")?
        }
    };

    let events = build_events(&segments, &style, opts.mode);
    if events.is_empty() {
        warn!("Alignment produced no timed words; subtitle file will be empty");
    }
    write_ass(&paths.ass, &style, opts.mode, &events)
        .with_context(|| format!("failed to write {}", paths.ass.display()))?;
    Ok(())
}

fn run_burn(paths: &AssetPaths, opts: &BurnOpts) -> anyhow::Result<PathBuf> {
    let options = BurnOptions {
        crf: opts.crf,
        preset: opts.preset.clone(),
        fonts_dir: opts.fonts_dir.clone(),
        ..BurnOptions::default()
    };
    let out = burn_subtitles(&paths.video, &paths.ass, &paths.out, &options)
        .context("burning subtitles failed")?;
    Ok(out)
}
