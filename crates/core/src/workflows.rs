//! Built-in job graph templates for the four media kinds.
//!
//! Each template is a parameter struct with sensible defaults whose
//! [`build`](TextToVideo::build) method produces a validated [`JobGraph`].
//! The graphs target LTX-Video (video), Flux (image), and MMAudio (audio)
//! node packs; model file names are the ones the factory installs.

use crate::error::CoreError;
use crate::graph::{JobGraph, NodeRef, NodeSpec, OutputSlot};

// ---------------------------------------------------------------------------
// Output slots
// ---------------------------------------------------------------------------

/// Named output slots for the multi-output nodes used by the templates.
pub mod slots {
    use crate::graph::OutputSlot;

    /// `CheckpointLoaderSimple` model output.
    pub const CHECKPOINT_MODEL: OutputSlot = OutputSlot(0);
    /// `CheckpointLoaderSimple` VAE output.
    pub const CHECKPOINT_VAE: OutputSlot = OutputSlot(2);
    /// Positive half of a conditioning pair.
    pub const POSITIVE: OutputSlot = OutputSlot(0);
    /// Negative half of a conditioning pair.
    pub const NEGATIVE: OutputSlot = OutputSlot(1);
    /// `LTXVImgToVideo` latent output.
    pub const IMAGE_LATENT: OutputSlot = OutputSlot(2);
}

// ---------------------------------------------------------------------------
// Model files and defaults
// ---------------------------------------------------------------------------

pub const LTXV_CHECKPOINT: &str = "ltxv-13b-0.9.8-distilled-fp8.safetensors";
pub const T5_ENCODER: &str = "t5xxl_fp16.safetensors";
pub const CLIP_L_ENCODER: &str = "clip_l.safetensors";
pub const FLUX_UNET: &str = "flux1-dev-kontext_fp8_scaled.safetensors";
pub const FLUX_VAE: &str = "ae.safetensors";
pub const MMAUDIO_MODEL: &str = "mmaudio_large_44k_v2_fp16.safetensors";
pub const MMAUDIO_VAE: &str = "mmaudio_vae_44k_fp16.safetensors";
pub const MMAUDIO_SYNCHFORMER: &str = "mmaudio_synchformer_fp16.safetensors";
pub const MMAUDIO_CLIP: &str = "apple_DFN5B-CLIP-ViT-H-14-384_fp16.safetensors";

const VIDEO_NEGATIVE_PROMPT: &str = "low quality, blurry, distorted";
const AUDIO_NEGATIVE_PROMPT: &str = "noise, static, distortion";
const VIDEO_FRAME_RATE: f64 = 24.0;

/// Node id of the final save node in the video templates.
pub const VIDEO_OUTPUT_NODE: &str = "15";
/// Node id of the final save node in the image template.
pub const IMAGE_OUTPUT_NODE: &str = "9";
/// Node id of the final save node in the audio template.
pub const AUDIO_OUTPUT_NODE: &str = "4";

fn out(node: &str) -> NodeRef {
    NodeRef::new(node, OutputSlot::FIRST)
}

fn at(node: &str, slot: OutputSlot) -> NodeRef {
    NodeRef::new(node, slot)
}

/// Use the given seed or draw one from `0..=u32::MAX`.
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| rand::random_range(0..=u64::from(u32::MAX)))
}

fn require_prompt(prompt: &str) -> Result<(), CoreError> {
    if prompt.trim().is_empty() {
        return Err(CoreError::Validation("Prompt must not be empty".to_string()));
    }
    Ok(())
}

fn require_positive(name: &str, value: u32) -> Result<(), CoreError> {
    if value == 0 {
        return Err(CoreError::Validation(format!("{name} must be greater than zero")));
    }
    Ok(())
}

fn finish(graph: JobGraph) -> Result<JobGraph, CoreError> {
    graph.validate()?;
    Ok(graph)
}

// ---------------------------------------------------------------------------
// LTX-Video shared backbone
// ---------------------------------------------------------------------------

/// Loader, text conditioning, and sampler nodes shared by both video
/// templates. The caller adds the guider (11), sampler (12), and the
/// latent source it feeds into node 12.
fn ltxv_backbone(prompt: &str, seed: u64) -> JobGraph {
    JobGraph::new()
        .with_node(
            "1",
            NodeSpec::new("CLIPLoader")
                .input("clip_name", T5_ENCODER)
                .input("type", "ltxv"),
        )
        .with_node(
            "2",
            NodeSpec::new("CheckpointLoaderSimple").input("ckpt_name", LTXV_CHECKPOINT),
        )
        .with_node(
            "3",
            NodeSpec::new("ModelSamplingLTXV")
                .input("max_shift", 2.05)
                .input("base_shift", 0.95)
                .input("model", at("2", slots::CHECKPOINT_MODEL)),
        )
        .with_node(
            "4",
            NodeSpec::new("CLIPTextEncode")
                .input("text", prompt)
                .input("clip", out("1")),
        )
        .with_node(
            "5",
            NodeSpec::new("CLIPTextEncode")
                .input("text", VIDEO_NEGATIVE_PROMPT)
                .input("clip", out("1")),
        )
        .with_node(
            "6",
            NodeSpec::new("LTXVConditioning")
                .input("frame_rate", VIDEO_FRAME_RATE)
                .input("positive", out("4"))
                .input("negative", out("5")),
        )
        .with_node("8", NodeSpec::new("KSamplerSelect").input("sampler_name", "euler"))
        .with_node(
            "9",
            NodeSpec::new("BasicScheduler")
                .input("scheduler", "linear_quadratic")
                .input("steps", 25u32)
                .input("denoise", 1.0)
                .input("model", out("3")),
        )
        .with_node("10", NodeSpec::new("RandomNoise").input("noise_seed", seed))
        .with_node(
            "13",
            NodeSpec::new("VAEDecode")
                .input("samples", out("12"))
                .input("vae", at("2", slots::CHECKPOINT_VAE)),
        )
        .with_node(
            "14",
            NodeSpec::new("CreateVideo")
                .input("images", out("13"))
                .input("fps", VIDEO_FRAME_RATE),
        )
}

/// Guider and sampler wired to a conditioning node and a latent source.
fn ltxv_sampling(graph: JobGraph, conditioning: &str, latent: NodeRef, prefix: String) -> JobGraph {
    graph
        .with_node(
            "11",
            NodeSpec::new("CFGGuider")
                .input("cfg", 1.0)
                .input("model", out("3"))
                .input("positive", at(conditioning, slots::POSITIVE))
                .input("negative", at(conditioning, slots::NEGATIVE)),
        )
        .with_node(
            "12",
            NodeSpec::new("SamplerCustomAdvanced")
                .input("noise", out("10"))
                .input("guider", out("11"))
                .input("sampler", out("8"))
                .input("sigmas", out("9"))
                .input("latent_image", latent),
        )
        .with_node(
            VIDEO_OUTPUT_NODE,
            NodeSpec::new("SaveVideo")
                .input("video", out("14"))
                .input("filename_prefix", prefix)
                .input("format", "mp4")
                .input("codec", "h264"),
        )
}

// ---------------------------------------------------------------------------
// Text to video
// ---------------------------------------------------------------------------

/// Text-to-video with LTX-Video.
#[derive(Debug, Clone)]
pub struct TextToVideo {
    pub prompt: String,
    pub seed: Option<u64>,
    pub frames: u32,
    pub width: u32,
    pub height: u32,
}

impl TextToVideo {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            seed: None,
            frames: 65,
            width: 768,
            height: 512,
        }
    }

    pub fn build(&self) -> Result<JobGraph, CoreError> {
        require_prompt(&self.prompt)?;
        require_positive("frames", self.frames)?;
        require_positive("width", self.width)?;
        require_positive("height", self.height)?;

        let seed = resolve_seed(self.seed);
        let graph = ltxv_backbone(&self.prompt, seed).with_node(
            "7",
            NodeSpec::new("EmptyLTXVLatentVideo")
                .input("width", self.width)
                .input("height", self.height)
                .input("length", self.frames)
                .input("batch_size", 1u32),
        );
        finish(ltxv_sampling(graph, "6", out("7"), format!("t2v_{seed}")))
    }
}

// ---------------------------------------------------------------------------
// Image to video
// ---------------------------------------------------------------------------

/// Image-to-video with LTX-Video. `image` is a file name already present
/// in the engine's input directory.
#[derive(Debug, Clone)]
pub struct ImageToVideo {
    pub image: String,
    pub prompt: String,
    pub seed: Option<u64>,
    pub frames: u32,
    pub width: u32,
    pub height: u32,
    pub strength: f64,
}

impl ImageToVideo {
    pub fn new(image: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            prompt: prompt.into(),
            seed: None,
            frames: 65,
            width: 768,
            height: 512,
            strength: 0.9,
        }
    }

    pub fn build(&self) -> Result<JobGraph, CoreError> {
        require_prompt(&self.prompt)?;
        if self.image.trim().is_empty() {
            return Err(CoreError::Validation("Image must not be empty".to_string()));
        }
        require_positive("frames", self.frames)?;
        require_positive("width", self.width)?;
        require_positive("height", self.height)?;
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(CoreError::Validation(
                "strength must be between 0.0 and 1.0".to_string(),
            ));
        }

        let seed = resolve_seed(self.seed);
        let graph = ltxv_backbone(&self.prompt, seed)
            .with_node("20", NodeSpec::new("LoadImage").input("image", self.image.as_str()))
            .with_node(
                "21",
                NodeSpec::new("LTXVImgToVideo")
                    .input("positive", at("6", slots::POSITIVE))
                    .input("negative", at("6", slots::NEGATIVE))
                    .input("vae", at("2", slots::CHECKPOINT_VAE))
                    .input("image", out("20"))
                    .input("width", self.width)
                    .input("height", self.height)
                    .input("length", self.frames)
                    .input("batch_size", 1u32)
                    .input("strength", self.strength),
            );
        finish(ltxv_sampling(
            graph,
            "21",
            at("21", slots::IMAGE_LATENT),
            format!("i2v_{seed}"),
        ))
    }
}

// ---------------------------------------------------------------------------
// Text to image
// ---------------------------------------------------------------------------

/// Text-to-image with Flux.
#[derive(Debug, Clone)]
pub struct TextToImage {
    pub prompt: String,
    pub seed: Option<u64>,
    pub width: u32,
    pub height: u32,
}

impl TextToImage {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            seed: None,
            width: 1024,
            height: 576,
        }
    }

    pub fn build(&self) -> Result<JobGraph, CoreError> {
        require_prompt(&self.prompt)?;
        require_positive("width", self.width)?;
        require_positive("height", self.height)?;

        let seed = resolve_seed(self.seed);
        finish(
            JobGraph::new()
                .with_node(
                    "1",
                    NodeSpec::new("UNETLoader")
                        .input("unet_name", FLUX_UNET)
                        .input("weight_dtype", "default"),
                )
                .with_node(
                    "2",
                    NodeSpec::new("DualCLIPLoader")
                        .input("clip_name1", CLIP_L_ENCODER)
                        .input("clip_name2", T5_ENCODER)
                        .input("type", "flux"),
                )
                .with_node("3", NodeSpec::new("VAELoader").input("vae_name", FLUX_VAE))
                .with_node(
                    "4",
                    NodeSpec::new("CLIPTextEncode")
                        .input("text", self.prompt.as_str())
                        .input("clip", out("2")),
                )
                .with_node(
                    "5",
                    NodeSpec::new("CLIPTextEncode")
                        .input("text", "")
                        .input("clip", out("2")),
                )
                .with_node(
                    "6",
                    NodeSpec::new("EmptySD3LatentImage")
                        .input("width", self.width)
                        .input("height", self.height)
                        .input("batch_size", 1u32),
                )
                .with_node(
                    "7",
                    NodeSpec::new("KSampler")
                        .input("model", out("1"))
                        .input("positive", out("4"))
                        .input("negative", out("5"))
                        .input("latent_image", out("6"))
                        .input("seed", seed)
                        .input("steps", 20u32)
                        .input("cfg", 3.5)
                        .input("sampler_name", "euler")
                        .input("scheduler", "simple")
                        .input("denoise", 1.0),
                )
                .with_node(
                    "8",
                    NodeSpec::new("VAEDecode")
                        .input("samples", out("7"))
                        .input("vae", out("3")),
                )
                .with_node(
                    IMAGE_OUTPUT_NODE,
                    NodeSpec::new("SaveImage")
                        .input("images", out("8"))
                        .input("filename_prefix", format!("img_{seed}")),
                ),
        )
    }
}

// ---------------------------------------------------------------------------
// Text to audio
// ---------------------------------------------------------------------------

/// Text-to-audio with MMAudio.
#[derive(Debug, Clone)]
pub struct TextToAudio {
    pub prompt: String,
    pub seed: Option<u64>,
    pub duration_secs: u32,
}

impl TextToAudio {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            seed: None,
            duration_secs: 8,
        }
    }

    pub fn build(&self) -> Result<JobGraph, CoreError> {
        require_prompt(&self.prompt)?;
        require_positive("duration", self.duration_secs)?;

        let seed = resolve_seed(self.seed);
        finish(
            JobGraph::new()
                .with_node(
                    "1",
                    NodeSpec::new("MMAudioModelLoader")
                        .input("mmaudio_model", MMAUDIO_MODEL)
                        .input("base_precision", "fp16"),
                )
                .with_node(
                    "2",
                    NodeSpec::new("MMAudioFeatureUtilsLoader")
                        .input("vae_model", MMAUDIO_VAE)
                        .input("synchformer_model", MMAUDIO_SYNCHFORMER)
                        .input("clip_model", MMAUDIO_CLIP)
                        .input("mode", "44k")
                        .input("precision", "fp16"),
                )
                .with_node(
                    "3",
                    NodeSpec::new("MMAudioSampler")
                        .input("mmaudio_model", out("1"))
                        .input("feature_utils", out("2"))
                        .input("duration", self.duration_secs)
                        .input("steps", 25u32)
                        .input("cfg", 4.5)
                        .input("seed", seed)
                        .input("prompt", self.prompt.as_str())
                        .input("negative_prompt", AUDIO_NEGATIVE_PROMPT)
                        .input("mask_away_clip", false)
                        .input("force_offload", true),
                )
                .with_node(
                    AUDIO_OUTPUT_NODE,
                    NodeSpec::new("SaveAudio")
                        .input("audio", out("3"))
                        .input("filename_prefix", format!("audio_{seed}")),
                ),
        )
    }
}
