//! Resolved configuration types for the Gale engine
//!
//! Everything in this module is a product of resolution. Callers describe
//! what they want through [`EngineOptions`](crate::options::EngineOptions);
//! the resolver turns that into the immutable structs below.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hardware::{ComputeCapability, DeviceType};

/// Runtime generation the engine will execute on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeGeneration {
    /// The mature runtime with the widest feature coverage
    Legacy,

    /// The next-generation runtime with chunked prefill always on
    NextGen,
}

impl RuntimeGeneration {
    /// Whether this is the next-generation runtime
    pub fn is_nextgen(&self) -> bool {
        matches!(self, RuntimeGeneration::NextGen)
    }
}

impl fmt::Display for RuntimeGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuntimeGeneration::Legacy => "legacy",
            RuntimeGeneration::NextGen => "next-generation",
        };
        write!(f, "{}", name)
    }
}

/// What the model is asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTask {
    /// Pick a task from the model itself
    #[default]
    Auto,

    /// Autoregressive text generation
    Generate,

    /// Embedding extraction
    Embed,

    /// Sequence classification
    Classify,

    /// Cross-encoder scoring
    Score,

    /// Reward modeling
    Reward,
}

impl ModelTask {
    /// The runner kind a task maps to
    ///
    /// `Auto` resolves to generation before a model config is built, so it
    /// maps to the generation runner here.
    pub fn runner_kind(&self) -> RunnerKind {
        match self {
            ModelTask::Auto | ModelTask::Generate => RunnerKind::Generate,
            ModelTask::Embed | ModelTask::Classify | ModelTask::Score | ModelTask::Reward => {
                RunnerKind::Pooling
            }
        }
    }
}

/// The broad execution mode a task requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerKind {
    /// Token-by-token generation
    Generate,

    /// Single forward pass with pooled outputs
    Pooling,
}

/// Supported model architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelArchitecture {
    /// Llama and Llama-2/3 style models
    Llama,

    /// Mistral models
    Mistral,

    /// Mixtral mixture-of-experts models
    Mixtral,

    /// Qwen models
    Qwen,

    /// Qwen2 models
    Qwen2,

    /// Phi models
    Phi,

    /// Phi-3 models
    Phi3,

    /// Falcon models
    Falcon,

    /// GPT-NeoX style models
    GptNeox,

    /// GPT-J style models
    GptJ,

    /// MPT models
    Mpt,

    /// BLOOM models
    Bloom,

    /// Gemma models
    Gemma,

    /// DeepSeek models with multi-head latent attention
    DeepSeek,

    /// Mamba state-space models
    Mamba,

    /// T5 encoder-decoder models
    T5,

    /// LLaVA vision-language models
    Llava,
}

impl ModelArchitecture {
    /// Try to detect the architecture from a model name or path
    pub fn detect(model: &str) -> Option<Self> {
        // Longer or more specific patterns first; "mixtral" checkpoints
        // usually live under a "mistralai/" prefix and "t5" is short enough
        // to hide inside other names.
        const NAME_PATTERNS: &[(&str, ModelArchitecture)] = &[
            ("llava", ModelArchitecture::Llava),
            ("mixtral", ModelArchitecture::Mixtral),
            ("mistral", ModelArchitecture::Mistral),
            ("qwen2", ModelArchitecture::Qwen2),
            ("qwen", ModelArchitecture::Qwen),
            ("phi-3", ModelArchitecture::Phi3),
            ("phi3", ModelArchitecture::Phi3),
            ("phi", ModelArchitecture::Phi),
            ("deepseek", ModelArchitecture::DeepSeek),
            ("mamba", ModelArchitecture::Mamba),
            ("llama", ModelArchitecture::Llama),
            ("falcon", ModelArchitecture::Falcon),
            ("gpt-neox", ModelArchitecture::GptNeox),
            ("gptneox", ModelArchitecture::GptNeox),
            ("gpt-j", ModelArchitecture::GptJ),
            ("gptj", ModelArchitecture::GptJ),
            ("mpt", ModelArchitecture::Mpt),
            ("bloom", ModelArchitecture::Bloom),
            ("gemma", ModelArchitecture::Gemma),
            ("t5", ModelArchitecture::T5),
        ];

        let name = model.to_ascii_lowercase();
        NAME_PATTERNS
            .iter()
            .find(|(pattern, _)| name.contains(pattern))
            .map(|(_, arch)| *arch)
    }

    /// Whether the architecture consumes non-text inputs
    pub fn is_multimodal(&self) -> bool {
        matches!(self, ModelArchitecture::Llava)
    }

    /// Whether the architecture uses multi-head latent attention
    pub fn uses_latent_attention(&self) -> bool {
        matches!(self, ModelArchitecture::DeepSeek)
    }

    /// Whether the next-generation runtime can serve this architecture
    ///
    /// State-space and encoder-decoder models still need the legacy
    /// scheduler.
    pub fn is_nextgen_capable(&self) -> bool {
        !matches!(self, ModelArchitecture::Mamba | ModelArchitecture::T5)
    }

    /// Whether the architecture can be split across pipeline stages
    pub fn supports_pipeline_parallel(&self) -> bool {
        !matches!(
            self,
            ModelArchitecture::Mamba | ModelArchitecture::T5 | ModelArchitecture::Llava
        )
    }
}

/// Numeric data types for model weights and activations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// 32-bit floating point
    Float32,

    /// 16-bit floating point
    Float16,

    /// Brain floating point
    BFloat16,

    /// 8-bit floating point (e4m3)
    Float8E4M3,

    /// 8-bit floating point (e5m2)
    Float8E5M2,

    /// 8-bit integer
    Int8,

    /// 4-bit integer
    Int4,
}

impl DataType {
    /// Whether this is one of the fp8 variants usable for the KV cache
    pub fn is_fp8(&self) -> bool {
        matches!(self, DataType::Float8E4M3 | DataType::Float8E5M2)
    }
}

/// Quantization methods for model weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantizationMethod {
    /// GPTQ quantization
    Gptq,

    /// AWQ quantization
    Awq,

    /// GGML/GGUF quantization
    Ggml,

    /// SqueezeLLM quantization
    SqueezeLlm,

    /// Marlin kernel quantization
    Marlin,

    /// FP8 quantization
    Fp8,

    /// BitsAndBytes quantization
    BitsAndBytes,
}

/// RoPE scaling strategies for extending context length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RopeScalingType {
    /// Linear interpolation scaling
    Linear,

    /// Dynamic NTK scaling
    Dynamic,

    /// YaRN scaling
    Yarn,

    /// LongRoPE scaling
    Longrope,
}

/// RoPE scaling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RopeScalingConfig {
    /// Scaling strategy
    pub scaling_type: RopeScalingType,

    /// Scaling factor applied to the base context length
    pub factor: f32,

    /// Original maximum position embeddings before scaling
    pub original_max_position_embeddings: Option<usize>,
}

/// Weight loading formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadFormat {
    /// Pick a format based on what the checkpoint provides
    #[default]
    Auto,

    /// Safetensors checkpoints
    Safetensors,

    /// Single-file GGUF checkpoints
    Gguf,

    /// BitsAndBytes quantized loading
    BitsAndBytes,

    /// Random weights, for profiling and tests
    Dummy,
}

/// What to do with a preempted sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreemptionMode {
    /// Drop the KV cache and recompute when rescheduled
    Recompute,

    /// Swap the KV cache out to CPU memory
    Swap,
}

/// Request scheduling policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulingPolicy {
    /// First come, first served
    #[default]
    Fcfs,

    /// Caller-assigned priorities
    Priority,
}

/// Backends for guided (structured) decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuidedDecodingBackend {
    /// Grammar-compiled token masks
    #[default]
    XGrammar,

    /// Outlines finite-state machines
    Outlines,

    /// lm-format-enforcer token filtering
    #[serde(rename = "lm-format-enforcer")]
    LmFormatEnforcer,
}

/// Executor backends for multi-device serving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorBackend {
    /// One worker process per device on this host
    MultiProcess,

    /// A distributed scheduler spanning hosts
    Distributed,

    /// Workers launched and owned by an external system
    ExternalLauncher,
}

/// Role of this engine in a disaggregated KV transfer setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KvTransferRole {
    /// Produces KV blocks for remote consumers
    Producer,

    /// Consumes KV blocks from remote producers
    Consumer,

    /// Both produces and consumes
    Both,
}

/// KV transfer settings, passed through to the transfer connector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KvTransferConfig {
    /// Connector implementation name
    pub connector: String,

    /// Role of this engine instance
    pub role: KvTransferRole,

    /// Lookup buffer size in GiB
    pub buffer_size_gib: f32,
}

/// Resolved device placement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device the engine will run on
    pub device: DeviceType,

    /// Marketing name reported by the probe
    pub device_name: String,

    /// Compute capability, when the device reports one
    pub compute_capability: Option<ComputeCapability>,
}

/// Resolved model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name or path
    pub model: String,

    /// Tokenizer name or path
    pub tokenizer: String,

    /// Name the model is served under
    pub served_model_name: String,

    /// Detected or caller-specified architecture
    pub architecture: ModelArchitecture,

    /// Resolved task, never `Auto`
    pub task: ModelTask,

    /// Weight and activation data type
    pub dtype: DataType,

    /// Seed for reproducible sampling
    pub seed: u64,

    /// Maximum context length in tokens
    pub max_model_len: usize,

    /// Sliding attention window size, if the model uses one
    pub sliding_window: Option<usize>,

    /// Weight quantization method, if any
    pub quantization: Option<QuantizationMethod>,

    /// RoPE scaling override
    pub rope_scaling: Option<RopeScalingConfig>,

    /// RoPE theta override
    pub rope_theta: Option<f32>,

    /// Maximum number of logprobs a request may ask for
    pub max_logprobs: usize,

    /// Always run eagerly instead of capturing device graphs
    pub enforce_eager: bool,

    /// Longest sequence covered by captured device graphs
    pub max_seq_len_to_capture: usize,

    /// Allow custom model code from the checkpoint
    pub trust_remote_code: bool,

    /// Checkpoint revision
    pub revision: Option<String>,

    /// Skip tokenizer initialization, caller supplies token ids
    pub skip_tokenizer_init: bool,

    /// Pattern selecting caller-provided logits processors
    pub logits_processor_pattern: Option<String>,
}

impl ModelConfig {
    /// The runner kind the resolved task requires
    pub fn runner_kind(&self) -> RunnerKind {
        self.task.runner_kind()
    }

    /// Whether the model consumes non-text inputs
    pub fn is_multimodal(&self) -> bool {
        self.architecture.is_multimodal()
    }

    /// Whether the model uses multi-head latent attention
    pub fn uses_latent_attention(&self) -> bool {
        self.architecture.uses_latent_attention()
    }
}

/// Resolved weight loading settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Checkpoint format to load
    pub format: LoadFormat,

    /// Directory for downloaded weights
    pub download_dir: Option<PathBuf>,

    /// Loader-specific settings, e.g. the QLoRA adapter path
    pub model_loader_extra_config: Option<serde_json::Value>,

    /// Glob patterns to skip while loading
    pub ignore_patterns: Vec<String>,
}

/// Resolved KV cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Tokens per cache block
    pub block_size: usize,

    /// Fraction of device memory the engine may use
    pub gpu_memory_utilization: f32,

    /// CPU swap space per device in GiB
    pub swap_space_gib: f32,

    /// Device memory offloaded to CPU in GiB
    pub cpu_offload_gib: f32,

    /// KV cache data type, `None` follows the model dtype
    pub cache_dtype: Option<DataType>,

    /// Fixed number of device cache blocks, overriding profiling
    pub num_gpu_blocks_override: Option<usize>,

    /// Sliding window the cache must respect
    pub sliding_window: Option<usize>,

    /// Reuse cached prefixes across requests
    pub enable_prefix_caching: bool,

    /// Compute KV scaling factors at runtime for fp8 caches
    pub calculate_kv_scales: bool,
}

/// Resolved parallelism settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Number of pipeline stages
    pub pipeline_parallel_size: usize,

    /// Number of tensor-parallel shards
    pub tensor_parallel_size: usize,

    /// Cap on concurrent weight-loading workers
    pub max_parallel_loading_workers: Option<usize>,

    /// Disable the custom all-reduce kernel
    pub disable_custom_all_reduce: bool,

    /// Executor backend, `None` runs in-process on one device
    pub distributed_executor_backend: Option<ExecutorBackend>,

    /// Custom worker class name
    pub worker_class: Option<String>,
}

impl ParallelConfig {
    /// Total number of devices across both parallelism axes
    pub fn world_size(&self) -> usize {
        self.pipeline_parallel_size * self.tensor_parallel_size
    }

    /// Whether workers run under the distributed executor backend
    pub fn uses_distributed_executor(&self) -> bool {
        matches!(
            self.distributed_executor_backend,
            Some(ExecutorBackend::Distributed)
        )
    }
}

/// How draft tokens are proposed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeculativeMethod {
    /// A smaller draft model proposes tokens
    DraftModel {
        /// Draft model name or path
        model: String,

        /// Quantization of the draft model weights
        quantization: Option<QuantizationMethod>,
    },

    /// Prompt n-gram lookup proposes tokens, no draft model involved
    Ngram {
        /// Largest n-gram window to match against the prompt
        prompt_lookup_max: usize,

        /// Smallest n-gram window to match against the prompt
        prompt_lookup_min: usize,
    },
}

/// Resolved speculative decoding settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeculativeConfig {
    /// Proposal method
    pub method: SpeculativeMethod,

    /// Draft tokens proposed per step
    pub num_speculative_tokens: usize,

    /// Context length available to the proposer
    pub max_model_len: usize,

    /// Tensor parallelism of the draft model
    pub draft_tensor_parallel_size: usize,

    /// Disable speculation once the batch reaches this size
    pub disable_by_batch_size: Option<usize>,

    /// Disable the MQA scorer and fall back to batch expansion
    pub disable_mqa_scorer: bool,

    /// Skip logprob computation for draft-accepted tokens
    pub disable_logprobs: bool,
}

impl SpeculativeConfig {
    /// Scheduler slots needed to score this many draft tokens per step
    pub fn num_lookahead_slots(&self) -> usize {
        self.num_speculative_tokens
    }
}

/// Resolved scheduler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Runner kind the scheduler feeds
    pub runner_kind: RunnerKind,

    /// Token budget per scheduler step
    pub max_num_batched_tokens: usize,

    /// Sequence budget per scheduler step
    pub max_num_seqs: usize,

    /// Maximum context length, mirrored from the model config
    pub max_model_len: usize,

    /// Slots reserved per sequence for tokens beyond the next one
    pub num_lookahead_slots: usize,

    /// Artificial delay factor before scheduling a new batch
    pub delay_factor: f32,

    /// Mix prefill chunks and decode steps in one batch
    pub enable_chunked_prefill: bool,

    /// Whether the model consumes non-text inputs
    pub is_multimodal: bool,

    /// Forced preemption handling, `None` lets the runtime choose
    pub preemption_mode: Option<PreemptionMode>,

    /// Device steps per scheduler invocation
    pub num_scheduler_steps: usize,

    /// Stream outputs after every step of a multi-step batch
    pub multi_step_stream_outputs: bool,

    /// Send worker state as deltas instead of full snapshots
    pub send_delta_data: bool,

    /// Request ordering policy
    pub policy: SchedulingPolicy,

    /// Custom scheduler class name
    pub scheduler_class: Option<String>,

    /// Concurrent partial prefills allowed per step
    pub max_num_partial_prefills: usize,

    /// Concurrent long partial prefills allowed per step
    pub max_long_partial_prefills: usize,

    /// Prompt length above which a prefill counts as long
    pub long_prefill_token_threshold: usize,
}

impl SchedulerConfig {
    /// Whether the scheduler runs more than one device step per invocation
    pub fn is_multi_step(&self) -> bool {
        self.num_scheduler_steps > 1
    }
}

/// Resolved LoRA adapter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoraConfig {
    /// Adapters resident on the device at once
    pub max_loras: usize,

    /// Largest supported adapter rank
    pub max_lora_rank: usize,

    /// Use fully sharded LoRA kernels
    pub fully_sharded_loras: bool,

    /// Adapters cached in CPU memory, always at least `max_loras`
    pub max_cpu_loras: usize,

    /// Adapter computation dtype, resolved against the model dtype
    pub lora_dtype: DataType,

    /// Extra vocabulary slots reserved per adapter
    pub lora_extra_vocab_size: usize,

    /// RoPE scaling factors reserved for long-context adapters
    pub long_lora_scaling_factors: Option<Vec<f32>>,

    /// Whether adapters may carry bias terms
    pub bias_enabled: bool,
}

/// Resolved prompt adapter settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptAdapterConfig {
    /// Prompt adapters resident at once
    pub max_prompt_adapters: usize,

    /// Token budget a single prompt adapter may occupy
    pub max_prompt_adapter_token: usize,
}

/// Resolved decoding settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodingConfig {
    /// Backend for guided decoding
    pub guided_decoding_backend: GuidedDecodingBackend,

    /// Reasoning parser name, when reasoning output is enabled
    pub reasoning_parser: Option<String>,
}

/// Resolved observability settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log throughput and cache statistics
    pub log_stats: bool,

    /// Expose metrics already scheduled for removal
    pub show_hidden_metrics: bool,

    /// OTLP collector endpoint for request traces
    pub otlp_traces_endpoint: Option<String>,

    /// Record model forward time in traces
    pub collect_model_forward_time: bool,

    /// Record model execute time in traces
    pub collect_model_execute_time: bool,
}

/// The complete, immutable output of one resolution pass
///
/// Optional concerns stay `None` when the caller did not enable them; a
/// present value is always internally valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    /// Runtime generation chosen by the compatibility rules
    pub generation: RuntimeGeneration,

    /// Model settings
    pub model: ModelConfig,

    /// KV cache settings
    pub cache: CacheConfig,

    /// Parallelism settings
    pub parallel: ParallelConfig,

    /// Scheduler settings
    pub scheduler: SchedulerConfig,

    /// Device placement
    pub device: DeviceConfig,

    /// Weight loading settings
    pub load: LoadConfig,

    /// Decoding settings
    pub decoding: DecodingConfig,

    /// Observability settings
    pub observability: ObservabilityConfig,

    /// LoRA settings, when LoRA serving is enabled
    pub lora: Option<LoraConfig>,

    /// Speculative decoding settings, when a proposer is configured
    pub speculative: Option<SpeculativeConfig>,

    /// Prompt adapter settings, when prompt adapters are enabled
    pub prompt_adapter: Option<PromptAdapterConfig>,

    /// KV transfer settings, passed through untouched
    pub kv_transfer: Option<KvTransferConfig>,

    /// Free-form settings for out-of-tree runtime extensions
    pub additional_config: Option<serde_json::Value>,
}

impl ResolvedConfig {
    /// Serialize the configuration for diagnostics and support bundles
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architecture_detection() {
        assert_eq!(
            ModelArchitecture::detect("meta-llama/Llama-2-7b-hf"),
            Some(ModelArchitecture::Llama)
        );
        assert_eq!(
            ModelArchitecture::detect("mistralai/Mixtral-8x7B-Instruct-v0.1"),
            Some(ModelArchitecture::Mixtral)
        );
        assert_eq!(
            ModelArchitecture::detect("mistralai/Mistral-7B-v0.1"),
            Some(ModelArchitecture::Mistral)
        );
        assert_eq!(
            ModelArchitecture::detect("Qwen/Qwen2-7B-Instruct"),
            Some(ModelArchitecture::Qwen2)
        );
        assert_eq!(
            ModelArchitecture::detect("deepseek-ai/DeepSeek-V2-Lite"),
            Some(ModelArchitecture::DeepSeek)
        );
        assert_eq!(
            ModelArchitecture::detect("llava-hf/llava-1.5-7b-hf"),
            Some(ModelArchitecture::Llava)
        );
        assert_eq!(
            ModelArchitecture::detect("state-spaces/mamba-2.8b-hf"),
            Some(ModelArchitecture::Mamba)
        );
        assert_eq!(ModelArchitecture::detect("openai/whisper-large"), None);
    }

    #[test]
    fn test_architecture_capabilities() {
        assert!(ModelArchitecture::Llama.is_nextgen_capable());
        assert!(!ModelArchitecture::Mamba.is_nextgen_capable());
        assert!(!ModelArchitecture::T5.is_nextgen_capable());

        assert!(ModelArchitecture::Llava.is_multimodal());
        assert!(!ModelArchitecture::Llava.supports_pipeline_parallel());
        assert!(ModelArchitecture::Llama.supports_pipeline_parallel());

        assert!(ModelArchitecture::DeepSeek.uses_latent_attention());
        assert!(!ModelArchitecture::Llama.uses_latent_attention());
    }

    #[test]
    fn test_task_runner_kinds() {
        assert_eq!(ModelTask::Generate.runner_kind(), RunnerKind::Generate);
        assert_eq!(ModelTask::Auto.runner_kind(), RunnerKind::Generate);
        assert_eq!(ModelTask::Embed.runner_kind(), RunnerKind::Pooling);
        assert_eq!(ModelTask::Score.runner_kind(), RunnerKind::Pooling);
    }

    #[test]
    fn test_wire_names() {
        let format = serde_json::to_string(&LoadFormat::BitsAndBytes).unwrap();
        assert_eq!(format, "\"bitsandbytes\"");

        let backend = serde_json::to_string(&GuidedDecodingBackend::LmFormatEnforcer).unwrap();
        assert_eq!(backend, "\"lm-format-enforcer\"");

        let parsed: GuidedDecodingBackend = serde_json::from_str("\"xgrammar\"").unwrap();
        assert_eq!(parsed, GuidedDecodingBackend::XGrammar);
    }

    #[test]
    fn test_runtime_generation_display() {
        assert_eq!(RuntimeGeneration::Legacy.to_string(), "legacy");
        assert_eq!(RuntimeGeneration::NextGen.to_string(), "next-generation");
    }

    #[test]
    fn test_fp8_cache_dtypes() {
        assert!(DataType::Float8E4M3.is_fp8());
        assert!(DataType::Float8E5M2.is_fp8());
        assert!(!DataType::Float16.is_fp8());
    }

    #[test]
    fn test_world_size() {
        let parallel = ParallelConfig {
            pipeline_parallel_size: 2,
            tensor_parallel_size: 4,
            max_parallel_loading_workers: None,
            disable_custom_all_reduce: false,
            distributed_executor_backend: Some(ExecutorBackend::Distributed),
            worker_class: None,
        };
        assert_eq!(parallel.world_size(), 8);
        assert!(parallel.uses_distributed_executor());
    }
}
