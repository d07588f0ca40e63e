//! Raw engine options as supplied by the caller
//!
//! [`EngineOptions`] mirrors the engine's full option surface. Fields are
//! plain data with permissive types; cross-field constraints are enforced
//! during resolution, not here. `Option<T>` fields distinguish "caller said
//! nothing" from an explicit value so defaulting can tell the two apart.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{
    DataType, ExecutorBackend, GuidedDecodingBackend, KvTransferConfig, LoadFormat,
    ModelArchitecture, ModelTask, PreemptionMode, QuantizationMethod, RopeScalingConfig,
    SchedulingPolicy,
};
use crate::hardware::DeviceType;

/// Sentinel model name selecting prompt n-gram speculation
pub const NGRAM_SPECULATIVE_MODEL: &str = "ngram";

/// The complete raw option surface of the engine
///
/// Construct with [`EngineOptions::new`] and adjust fields directly or
/// through the `with_*` helpers. All defaults match what the engine would
/// pick for an unremarkable generation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Model name or path
    pub model: String,

    /// Name to serve the model under, defaults to `model`
    pub served_model_name: Option<String>,

    /// Tokenizer name or path, defaults to `model`
    pub tokenizer: Option<String>,

    /// Task the model should perform
    pub task: ModelTask,

    /// Architecture override, detected from the model name when unset
    pub architecture: Option<ModelArchitecture>,

    /// Skip tokenizer initialization, caller supplies token ids
    pub skip_tokenizer_init: bool,

    /// Allow custom model code from the checkpoint
    pub trust_remote_code: bool,

    /// Checkpoint revision
    pub revision: Option<String>,

    /// Weight data type, unset follows the checkpoint
    pub dtype: Option<DataType>,

    /// KV cache data type, unset follows the model dtype
    pub kv_cache_dtype: Option<DataType>,

    /// Seed for reproducible sampling
    pub seed: u64,

    /// Maximum context length, unset falls back to the model default
    pub max_model_len: Option<usize>,

    /// Maximum number of logprobs a request may ask for
    pub max_logprobs: usize,

    /// Sliding attention window size
    pub sliding_window: Option<usize>,

    /// Ignore the model's sliding window and attend to the full context
    pub disable_sliding_window: bool,

    /// RoPE scaling override
    pub rope_scaling: Option<RopeScalingConfig>,

    /// RoPE theta override
    pub rope_theta: Option<f32>,

    /// Always run eagerly instead of capturing device graphs
    pub enforce_eager: bool,

    /// Longest sequence covered by captured device graphs
    pub max_seq_len_to_capture: usize,

    /// Pattern selecting caller-provided logits processors
    pub logits_processor_pattern: Option<String>,

    /// Weight loading format
    pub load_format: LoadFormat,

    /// Directory for downloaded weights
    pub download_dir: Option<PathBuf>,

    /// Loader-specific settings as free-form JSON
    pub model_loader_extra_config: Option<serde_json::Value>,

    /// Glob patterns to skip while loading weights
    pub ignore_patterns: Vec<String>,

    /// Weight quantization method
    pub quantization: Option<QuantizationMethod>,

    /// Path to a QLoRA adapter, implies BitsAndBytes loading
    pub qlora_adapter_path: Option<String>,

    /// Tokens per KV cache block
    pub block_size: Option<usize>,

    /// Fraction of device memory the engine may use
    pub gpu_memory_utilization: f32,

    /// CPU swap space per device in GiB
    pub swap_space_gib: f32,

    /// Device memory offloaded to CPU in GiB
    pub cpu_offload_gib: f32,

    /// Reuse cached prefixes across requests
    pub enable_prefix_caching: Option<bool>,

    /// Fixed number of device cache blocks, overriding profiling
    pub num_gpu_blocks_override: Option<usize>,

    /// Compute KV scaling factors at runtime for fp8 caches
    pub calculate_kv_scales: bool,

    /// Number of pipeline stages
    pub pipeline_parallel_size: usize,

    /// Number of tensor-parallel shards
    pub tensor_parallel_size: usize,

    /// Cap on concurrent weight-loading workers
    pub max_parallel_loading_workers: Option<usize>,

    /// Disable the custom all-reduce kernel
    pub disable_custom_all_reduce: bool,

    /// Executor backend for multi-device serving
    pub distributed_executor_backend: Option<ExecutorBackend>,

    /// Custom worker class name
    pub worker_class: Option<String>,

    /// Token budget per scheduler step
    pub max_num_batched_tokens: Option<usize>,

    /// Sequence budget per scheduler step
    pub max_num_seqs: Option<usize>,

    /// Concurrent partial prefills allowed per step
    pub max_num_partial_prefills: usize,

    /// Concurrent long partial prefills allowed per step
    pub max_long_partial_prefills: usize,

    /// Prompt length above which a prefill counts as long
    pub long_prefill_token_threshold: usize,

    /// Slots reserved per sequence for tokens beyond the next one
    pub num_lookahead_slots: usize,

    /// Artificial delay factor before scheduling a new batch
    pub scheduler_delay_factor: f32,

    /// Mix prefill chunks and decode steps in one batch
    pub enable_chunked_prefill: Option<bool>,

    /// Device steps per scheduler invocation
    pub num_scheduler_steps: usize,

    /// Stream outputs after every step of a multi-step batch
    pub multi_step_stream_outputs: bool,

    /// Request ordering policy
    pub scheduling_policy: SchedulingPolicy,

    /// Custom scheduler class name
    pub scheduler_class: Option<String>,

    /// Forced preemption handling
    pub preemption_mode: Option<PreemptionMode>,

    /// Process outputs synchronously with the device loop
    pub disable_async_output_processing: bool,

    /// Serve LoRA adapters
    pub enable_lora: bool,

    /// Allow adapters to carry bias terms
    pub enable_lora_bias: bool,

    /// Adapters resident on the device at once
    pub max_loras: usize,

    /// Largest supported adapter rank
    pub max_lora_rank: usize,

    /// Extra vocabulary slots reserved per adapter
    pub lora_extra_vocab_size: usize,

    /// Adapter computation dtype, unset follows the model dtype
    pub lora_dtype: Option<DataType>,

    /// Adapters cached in CPU memory, unset or zero means `max_loras`
    pub max_cpu_loras: Option<usize>,

    /// Use fully sharded LoRA kernels
    pub fully_sharded_loras: bool,

    /// RoPE scaling factors reserved for long-context adapters
    pub long_lora_scaling_factors: Option<Vec<f32>>,

    /// Serve prompt adapters
    pub enable_prompt_adapter: bool,

    /// Prompt adapters resident at once
    pub max_prompt_adapters: usize,

    /// Token budget a single prompt adapter may occupy
    pub max_prompt_adapter_token: usize,

    /// Draft model name, or [`NGRAM_SPECULATIVE_MODEL`] for n-gram lookup
    pub speculative_model: Option<String>,

    /// Quantization of the draft model weights
    pub speculative_model_quantization: Option<QuantizationMethod>,

    /// Tensor parallelism of the draft model
    pub speculative_draft_tensor_parallel_size: Option<usize>,

    /// Draft tokens proposed per step
    pub num_speculative_tokens: Option<usize>,

    /// Context length available to the proposer
    pub speculative_max_model_len: Option<usize>,

    /// Disable speculation once the batch reaches this size
    pub speculative_disable_by_batch_size: Option<usize>,

    /// Largest n-gram window for prompt lookup
    pub ngram_prompt_lookup_max: Option<usize>,

    /// Smallest n-gram window for prompt lookup
    pub ngram_prompt_lookup_min: Option<usize>,

    /// Disable the MQA scorer and fall back to batch expansion
    pub speculative_disable_mqa_scorer: bool,

    /// Skip logprob computation for draft-accepted tokens
    pub disable_logprobs_during_spec_decoding: Option<bool>,

    /// Backend for guided decoding
    pub guided_decoding_backend: GuidedDecodingBackend,

    /// Separate reasoning content from final output
    pub enable_reasoning: bool,

    /// Parser for reasoning output
    pub reasoning_parser: Option<String>,

    /// Show metrics hidden since the named previous version
    pub show_hidden_metrics_for_version: Option<String>,

    /// OTLP collector endpoint for request traces
    pub otlp_traces_endpoint: Option<String>,

    /// Modules to collect detailed traces for: "model", "worker", "all"
    pub collect_detailed_traces: Vec<String>,

    /// Disable throughput and cache statistics logging
    pub disable_log_stats: bool,

    /// Device override, unset follows the hardware probe
    pub device: Option<DeviceType>,

    /// KV transfer settings for disaggregated serving
    pub kv_transfer_config: Option<KvTransferConfig>,

    /// Free-form settings for out-of-tree runtime extensions
    pub additional_config: Option<serde_json::Value>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            model: String::new(),
            served_model_name: None,
            tokenizer: None,
            task: ModelTask::Auto,
            architecture: None,
            skip_tokenizer_init: false,
            trust_remote_code: false,
            revision: None,
            dtype: None,
            kv_cache_dtype: None,
            seed: 0,
            max_model_len: None,
            max_logprobs: 20,
            sliding_window: None,
            disable_sliding_window: false,
            rope_scaling: None,
            rope_theta: None,
            enforce_eager: false,
            max_seq_len_to_capture: 8192,
            logits_processor_pattern: None,
            load_format: LoadFormat::Auto,
            download_dir: None,
            model_loader_extra_config: None,
            ignore_patterns: Vec::new(),
            quantization: None,
            qlora_adapter_path: None,
            block_size: None,
            gpu_memory_utilization: 0.90,
            swap_space_gib: 4.0,
            cpu_offload_gib: 0.0,
            enable_prefix_caching: None,
            num_gpu_blocks_override: None,
            calculate_kv_scales: false,
            pipeline_parallel_size: 1,
            tensor_parallel_size: 1,
            max_parallel_loading_workers: None,
            disable_custom_all_reduce: false,
            distributed_executor_backend: None,
            worker_class: None,
            max_num_batched_tokens: None,
            max_num_seqs: None,
            max_num_partial_prefills: 1,
            max_long_partial_prefills: 1,
            long_prefill_token_threshold: 0,
            num_lookahead_slots: 0,
            scheduler_delay_factor: 0.0,
            enable_chunked_prefill: None,
            num_scheduler_steps: 1,
            multi_step_stream_outputs: true,
            scheduling_policy: SchedulingPolicy::Fcfs,
            scheduler_class: None,
            preemption_mode: None,
            disable_async_output_processing: false,
            enable_lora: false,
            enable_lora_bias: false,
            max_loras: 1,
            max_lora_rank: 16,
            lora_extra_vocab_size: 256,
            lora_dtype: None,
            max_cpu_loras: None,
            fully_sharded_loras: false,
            long_lora_scaling_factors: None,
            enable_prompt_adapter: false,
            max_prompt_adapters: 1,
            max_prompt_adapter_token: 0,
            speculative_model: None,
            speculative_model_quantization: None,
            speculative_draft_tensor_parallel_size: None,
            num_speculative_tokens: None,
            speculative_max_model_len: None,
            speculative_disable_by_batch_size: None,
            ngram_prompt_lookup_max: None,
            ngram_prompt_lookup_min: None,
            speculative_disable_mqa_scorer: false,
            disable_logprobs_during_spec_decoding: None,
            guided_decoding_backend: GuidedDecodingBackend::XGrammar,
            enable_reasoning: false,
            reasoning_parser: None,
            show_hidden_metrics_for_version: None,
            otlp_traces_endpoint: None,
            collect_detailed_traces: Vec::new(),
            disable_log_stats: false,
            device: None,
            kv_transfer_config: None,
            additional_config: None,
        }
    }
}

impl EngineOptions {
    /// Options for the given model with every other field at its default
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Set the tensor parallelism degree
    pub fn with_tensor_parallel(mut self, size: usize) -> Self {
        self.tensor_parallel_size = size;
        self
    }

    /// Set the maximum context length
    pub fn with_max_model_len(mut self, len: usize) -> Self {
        self.max_model_len = Some(len);
        self
    }

    /// Set the task
    pub fn with_task(mut self, task: ModelTask) -> Self {
        self.task = task;
        self
    }

    /// Set the weight quantization method
    pub fn with_quantization(mut self, quantization: QuantizationMethod) -> Self {
        self.quantization = Some(quantization);
        self
    }

    /// Whether speculation is configured to use prompt n-gram lookup
    pub fn uses_ngram_speculation(&self) -> bool {
        self.speculative_model.as_deref() == Some(NGRAM_SPECULATIVE_MODEL)
    }

    /// Fill derived fields before resolution proper starts
    ///
    /// The tokenizer follows the model when unset, a `.gguf` checkpoint
    /// pins the load format and quantization, and a QLoRA adapter path is
    /// forwarded to the weight loader. Purely name-based, no file I/O.
    pub(crate) fn normalize(&mut self) {
        if self.tokenizer.is_none() {
            self.tokenizer = Some(self.model.clone());
        }

        let is_gguf = Path::new(&self.model)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gguf"));
        if is_gguf {
            self.load_format = LoadFormat::Gguf;
            self.quantization = Some(QuantizationMethod::Ggml);
        }

        if let Some(path) = self.qlora_adapter_path.clone() {
            if !path.is_empty() {
                let extra = self
                    .model_loader_extra_config
                    .get_or_insert_with(|| serde_json::Value::Object(Default::default()));
                if let serde_json::Value::Object(map) = extra {
                    map.insert(
                        "qlora_adapter_name_or_path".to_string(),
                        serde_json::Value::String(path),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_defaults_tokenizer_to_model() {
        let mut options = EngineOptions::new("meta-llama/Llama-2-7b-hf");
        options.normalize();
        assert_eq!(options.tokenizer.as_deref(), Some("meta-llama/Llama-2-7b-hf"));

        let mut options = EngineOptions::new("meta-llama/Llama-2-7b-hf");
        options.tokenizer = Some("hf-internal-testing/llama-tokenizer".to_string());
        options.normalize();
        assert_eq!(
            options.tokenizer.as_deref(),
            Some("hf-internal-testing/llama-tokenizer")
        );
    }

    #[test]
    fn test_normalize_detects_gguf_checkpoints() {
        let mut options = EngineOptions::new("models/llama-2-7b.Q4_K_M.gguf");
        options.normalize();
        assert_eq!(options.load_format, LoadFormat::Gguf);
        assert_eq!(options.quantization, Some(QuantizationMethod::Ggml));

        // Name-based only, a directory of safetensors is untouched.
        let mut options = EngineOptions::new("meta-llama/Llama-2-7b-hf");
        options.normalize();
        assert_eq!(options.load_format, LoadFormat::Auto);
        assert_eq!(options.quantization, None);
    }

    #[test]
    fn test_normalize_forwards_qlora_adapter_to_loader() {
        let mut options = EngineOptions::new("meta-llama/Llama-2-7b-hf");
        options.qlora_adapter_path = Some("adapters/guanaco-7b".to_string());
        options.normalize();

        let extra = options.model_loader_extra_config.unwrap();
        assert_eq!(
            extra["qlora_adapter_name_or_path"],
            serde_json::Value::String("adapters/guanaco-7b".to_string())
        );
    }

    #[test]
    fn test_ngram_sentinel() {
        let mut options = EngineOptions::new("meta-llama/Llama-2-7b-hf");
        assert!(!options.uses_ngram_speculation());

        options.speculative_model = Some(NGRAM_SPECULATIVE_MODEL.to_string());
        assert!(options.uses_ngram_speculation());

        options.speculative_model = Some("meta-llama/Llama-2-70b-hf".to_string());
        assert!(!options.uses_ngram_speculation());
    }

    #[test]
    fn test_builder_helpers() {
        let options = EngineOptions::new("meta-llama/Llama-2-7b-hf")
            .with_tensor_parallel(4)
            .with_max_model_len(8192)
            .with_task(ModelTask::Generate);
        assert_eq!(options.tensor_parallel_size, 4);
        assert_eq!(options.max_model_len, Some(8192));
        assert_eq!(options.task, ModelTask::Generate);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: EngineOptions =
            serde_json::from_str(r#"{"model": "meta-llama/Llama-2-7b-hf", "seed": 7}"#).unwrap();
        assert_eq!(options.model, "meta-llama/Llama-2-7b-hf");
        assert_eq!(options.seed, 7);
        assert_eq!(options.max_logprobs, 20);
        assert_eq!(options.enable_chunked_prefill, None);
    }
}
