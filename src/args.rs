use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::audio::{MixParams, MixStrategy, MixTarget};
use crate::error::Result;
use crate::slideshow::SlideshowParams;
use crate::subtitle::{SubtitleMode, SubtitleStyle};

#[derive(Parser, Debug)]
#[clap(name = "storyreel", version, about = "Turns a topic into a narrated, subtitled short video")]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask the language model for a story and image prompts
    Story {
        #[clap(flatten)]
        paths: AssetPaths,
        #[clap(flatten)]
        story: StoryOpts,
    },
    /// Synthesize the narration from the story
    Narrate {
        #[clap(flatten)]
        paths: AssetPaths,
        #[clap(flatten)]
        voice: VoiceOpts,
    },
    /// Mix background music under the narration
    Mix {
        #[clap(flatten)]
        paths: AssetPaths,
        #[clap(flatten)]
        mix: MixOpts,
    },
    /// Render the Ken Burns slideshow over the audio
    Slideshow {
        #[clap(flatten)]
        paths: AssetPaths,
        #[clap(flatten)]
        slideshow: SlideshowOpts,
        /// Audio track to time the slideshow against
        #[clap(long)]
        audio: Option<PathBuf>,
    },
    /// Align the narration and write word-level subtitles
    Subtitles {
        #[clap(flatten)]
        paths: AssetPaths,
        #[clap(flatten)]
        subtitles: SubtitleOpts,
    },
    /// Burn the subtitles into the slideshow video
    Burn {
        #[clap(flatten)]
        paths: AssetPaths,
        #[clap(flatten)]
        burn: BurnOpts,
    },
    /// Run every stage in order
    Run {
        #[clap(flatten)]
        paths: AssetPaths,
        #[clap(flatten)]
        story: StoryOpts,
        #[clap(flatten)]
        voice: VoiceOpts,
        #[clap(flatten)]
        mix: MixOpts,
        #[clap(flatten)]
        slideshow: SlideshowOpts,
        #[clap(flatten)]
        subtitles: SubtitleOpts,
        #[clap(flatten)]
        burn: BurnOpts,
        /// Reuse the existing story JSON instead of generating one
        #[clap(long)]
        skip_story: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct AssetPaths {
    #[clap(long, default_value = "assets/info/story_image_prompts.json")]
    pub story_json: PathBuf,

    #[clap(long, default_value = "assets/audio/generated/output.wav")]
    pub narration: PathBuf,

    #[clap(long, default_value = "assets/audio/generated/chunks")]
    pub chunk_dir: PathBuf,

    #[clap(long, default_value = "assets/audio/generated/mix.wav")]
    pub mix_out: PathBuf,

    #[clap(long, default_value = "assets/images")]
    pub images: PathBuf,

    #[clap(long, default_value = "assets/video/output.mp4")]
    pub video: PathBuf,

    #[clap(long, default_value = "assets/subtitles/output.ass")]
    pub ass: PathBuf,

    #[clap(long, default_value = "assets/video/output_subtitled.mp4")]
    pub out: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct StoryOpts {
    #[clap(long, default_value = "Overcoming challenges and achieving success")]
    pub topic: String,

    #[clap(long, env = "GPT4_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[clap(long, default_value = "gpt-4o-mini")]
    pub model: String,
}

#[derive(Args, Debug, Clone)]
pub struct VoiceOpts {
    #[clap(long, default_value = "./tts/en_US-hfc_male-medium.onnx")]
    pub piper_model: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct MixOpts {
    /// Background music; without it the narration is used as is
    #[clap(long)]
    pub music: Option<PathBuf>,

    #[clap(long, default_value_t = 1.0)]
    pub main_volume: f64,

    #[clap(long, default_value_t = 0.20)]
    pub bg_volume: f64,

    #[clap(long, value_enum, default_value = "main")]
    pub mix_target: MixTarget,

    #[clap(long, value_enum, default_value = "cut")]
    pub mix_strategy: MixStrategy,

    #[clap(long, default_value_t = 48000)]
    pub sample_rate: u32,
}

impl MixOpts {
    pub fn params(&self) -> MixParams {
        MixParams {
            main_volume: self.main_volume,
            bg_volume: self.bg_volume,
            target: self.mix_target,
            strategy: self.mix_strategy,
            sample_rate: self.sample_rate,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SlideshowOpts {
    /// JSON file with slideshow parameters; missing fields use defaults
    #[clap(long)]
    pub params: Option<PathBuf>,

    #[clap(long)]
    pub fps: Option<f64>,

    #[clap(long)]
    pub width: Option<u32>,

    #[clap(long)]
    pub height: Option<u32>,

    #[clap(long)]
    pub min_per_image: Option<f64>,
}

impl SlideshowOpts {
    /// Defaults, then the params file, then individual flags.
    pub fn resolve(&self) -> Result<SlideshowParams> {
        let mut params = match &self.params {
            Some(path) => SlideshowParams::load(path)?,
            None => SlideshowParams::default(),
        };
        if let Some(fps) = self.fps {
            params.fps = fps;
        }
        if let Some(w) = self.width {
            params.target_w = w;
        }
        if let Some(h) = self.height {
            params.target_h = h;
        }
        if let Some(min) = self.min_per_image {
            params.min_per_image = min;
        }
        params.validate()?;
        Ok(params)
    }
}

#[derive(Args, Debug, Clone)]
pub struct SubtitleOpts {
    #[clap(long, value_enum, default_value = "segment-overlay")]
    pub mode: SubtitleMode,

    /// JSON file with subtitle style overrides
    #[clap(long)]
    pub style: Option<PathBuf>,

    /// Existing alignment JSON; skips running the aligner
    #[clap(long)]
    pub alignment: Option<PathBuf>,

    #[clap(long, default_value = "whisperx-align")]
    pub aligner: PathBuf,

    #[clap(
        long,
        default_value = "models/hub/checkpoints/wav2vec2_fairseq_base_ls960_asr_ls960.pth"
    )]
    pub checkpoint: PathBuf,

    #[clap(long, default_value = "en")]
    pub language: String,
}

impl SubtitleOpts {
    pub fn resolve_style(&self) -> Result<SubtitleStyle> {
        match &self.style {
            Some(path) => SubtitleStyle::load(path),
            None => Ok(SubtitleStyle::default()),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct BurnOpts {
    #[clap(long, default_value_t = 18)]
    pub crf: u8,

    #[clap(long, default_value = "medium")]
    pub preset: String,

    #[clap(long)]
    pub fonts_dir: Option<PathBuf>,
}
