//! Sub-configuration builders
//!
//! Each builder reads the normalized options plus any earlier-built
//! configuration it depends on, validates its own slice of the option
//! surface, and produces one resolved struct. Builders never emit notices;
//! anything recoverable is handled in defaulting or assembly.

use crate::config::{
    CacheConfig, DataType, DecodingConfig, DeviceConfig, ExecutorBackend, LoadConfig, LoadFormat,
    LoraConfig, ModelArchitecture, ModelConfig, ModelTask, ObservabilityConfig, ParallelConfig,
    PromptAdapterConfig, QuantizationMethod, SchedulerConfig, SpeculativeConfig,
    SpeculativeMethod,
};
use crate::error::{ConfigError, Result};
use crate::hardware::{DeviceType, HardwareContext};
use crate::options::EngineOptions;

const DEFAULT_MAX_MODEL_LEN: usize = 4096;
const DEFAULT_BLOCK_SIZE: usize = 16;
const SUPPORTED_BLOCK_SIZES: &[usize] = &[8, 16, 32, 64, 128];

/// Token budget used for chunked prefill when the caller sets none
const DEFAULT_CHUNKED_PREFILL_TOKEN_BUDGET: usize = 2048;

/// Smallest token budget handed to an unchunked scheduler
const MIN_TOKEN_BUDGET: usize = 2048;

const SUPPORTED_LORA_RANKS: &[usize] = &[8, 16, 32, 64, 128, 256];
const MAX_LORA_EXTRA_VOCAB_SIZE: usize = 512;

const ALLOWED_DETAILED_TRACE_MODULES: &[&str] = &["model", "worker", "all"];

/// Resolve device placement against the probe
pub(crate) fn build_device_config(
    options: &EngineOptions,
    hardware: &HardwareContext,
) -> Result<DeviceConfig> {
    let device = options.device.unwrap_or(hardware.device);
    if let Some(requested) = options.device {
        // Running on the CPU of an accelerator host is allowed, any other
        // mismatch with the probe is not.
        if requested != hardware.device && requested != DeviceType::Cpu {
            return Err(ConfigError::validation(format!(
                "device {} requested but the hardware probe reports {}",
                requested, hardware.device
            )));
        }
    }
    Ok(DeviceConfig {
        device,
        device_name: hardware.device_name.clone(),
        compute_capability: hardware.compute_capability,
    })
}

/// Resolve the model settings
pub(crate) fn build_model_config(options: &EngineOptions) -> Result<ModelConfig> {
    if options.model.is_empty() {
        return Err(ConfigError::validation("model must not be empty"));
    }

    let architecture = match options.architecture {
        Some(architecture) => architecture,
        None => ModelArchitecture::detect(&options.model).ok_or_else(|| {
            ConfigError::validation(format!(
                "unable to detect the architecture of {:?}, set architecture explicitly",
                options.model
            ))
        })?,
    };

    let task = match options.task {
        ModelTask::Auto => ModelTask::Generate,
        task => task,
    };

    let max_model_len = options.max_model_len.unwrap_or(DEFAULT_MAX_MODEL_LEN);
    if max_model_len == 0 {
        return Err(ConfigError::validation("max_model_len must be positive"));
    }

    let sliding_window = if options.disable_sliding_window {
        None
    } else {
        options.sliding_window
    };
    if sliding_window == Some(0) {
        return Err(ConfigError::validation("sliding_window must be positive"));
    }

    if let Some(rope_scaling) = &options.rope_scaling {
        if rope_scaling.factor < 1.0 {
            return Err(ConfigError::validation(format!(
                "rope_scaling factor must be at least 1.0, got {}",
                rope_scaling.factor
            )));
        }
    }

    Ok(ModelConfig {
        model: options.model.clone(),
        tokenizer: options
            .tokenizer
            .clone()
            .unwrap_or_else(|| options.model.clone()),
        served_model_name: options
            .served_model_name
            .clone()
            .unwrap_or_else(|| options.model.clone()),
        architecture,
        task,
        dtype: options.dtype.unwrap_or(DataType::Float16),
        seed: options.seed,
        max_model_len,
        sliding_window,
        quantization: options.quantization,
        rope_scaling: options.rope_scaling.clone(),
        rope_theta: options.rope_theta,
        max_logprobs: options.max_logprobs,
        enforce_eager: options.enforce_eager,
        max_seq_len_to_capture: options.max_seq_len_to_capture,
        trust_remote_code: options.trust_remote_code,
        revision: options.revision.clone(),
        skip_tokenizer_init: options.skip_tokenizer_init,
        logits_processor_pattern: options.logits_processor_pattern.clone(),
    })
}

/// Resolve weight loading, holding the BitsAndBytes pairing invariant
pub(crate) fn build_load_config(options: &EngineOptions) -> Result<LoadConfig> {
    let has_qlora_adapter = options
        .qlora_adapter_path
        .as_deref()
        .is_some_and(|path| !path.is_empty());
    let wants_bnb = options.quantization == Some(QuantizationMethod::BitsAndBytes)
        || has_qlora_adapter;
    let loads_bnb = options.load_format == LoadFormat::BitsAndBytes;

    if wants_bnb && !loads_bnb {
        return Err(ConfigError::conflict(format!(
            "BitsAndBytes quantization and QLoRA adapters require the bitsandbytes \
             load format, got {:?}",
            options.load_format
        )));
    }
    if loads_bnb && !wants_bnb {
        return Err(ConfigError::conflict(format!(
            "the bitsandbytes load format requires BitsAndBytes quantization, got {:?}",
            options.quantization
        )));
    }

    Ok(LoadConfig {
        format: options.load_format,
        download_dir: options.download_dir.clone(),
        model_loader_extra_config: options.model_loader_extra_config.clone(),
        ignore_patterns: options.ignore_patterns.clone(),
    })
}

/// Resolve the KV cache settings
pub(crate) fn build_cache_config(
    options: &EngineOptions,
    model: &ModelConfig,
) -> Result<CacheConfig> {
    let block_size = options.block_size.unwrap_or(DEFAULT_BLOCK_SIZE);
    if !SUPPORTED_BLOCK_SIZES.contains(&block_size) {
        return Err(ConfigError::validation(format!(
            "block_size must be one of {:?}, got {}",
            SUPPORTED_BLOCK_SIZES, block_size
        )));
    }

    if !(options.gpu_memory_utilization > 0.0 && options.gpu_memory_utilization <= 1.0) {
        return Err(ConfigError::validation(format!(
            "gpu_memory_utilization must be within (0, 1], got {}",
            options.gpu_memory_utilization
        )));
    }
    if options.swap_space_gib < 0.0 {
        return Err(ConfigError::validation("swap_space_gib must not be negative"));
    }
    if options.cpu_offload_gib < 0.0 {
        return Err(ConfigError::validation("cpu_offload_gib must not be negative"));
    }

    if let Some(cache_dtype) = options.kv_cache_dtype {
        if !cache_dtype.is_fp8() {
            return Err(ConfigError::validation(format!(
                "kv_cache_dtype must be left unset or an fp8 variant, got {:?}",
                cache_dtype
            )));
        }
    }

    Ok(CacheConfig {
        block_size,
        gpu_memory_utilization: options.gpu_memory_utilization,
        swap_space_gib: options.swap_space_gib,
        cpu_offload_gib: options.cpu_offload_gib,
        cache_dtype: options.kv_cache_dtype,
        num_gpu_blocks_override: options.num_gpu_blocks_override,
        sliding_window: model.sliding_window,
        enable_prefix_caching: options.enable_prefix_caching.unwrap_or(false),
        calculate_kv_scales: options.calculate_kv_scales,
    })
}

/// Resolve the parallelism settings
pub(crate) fn build_parallel_config(options: &EngineOptions) -> Result<ParallelConfig> {
    if options.pipeline_parallel_size == 0 {
        return Err(ConfigError::validation(
            "pipeline_parallel_size must be at least 1",
        ));
    }
    if options.tensor_parallel_size == 0 {
        return Err(ConfigError::validation(
            "tensor_parallel_size must be at least 1",
        ));
    }
    if options.max_parallel_loading_workers == Some(0) {
        return Err(ConfigError::validation(
            "max_parallel_loading_workers must be at least 1",
        ));
    }

    let world_size = options.pipeline_parallel_size * options.tensor_parallel_size;
    let distributed_executor_backend = match options.distributed_executor_backend {
        Some(backend) => Some(backend),
        None if world_size > 1 => Some(ExecutorBackend::MultiProcess),
        None => None,
    };

    Ok(ParallelConfig {
        pipeline_parallel_size: options.pipeline_parallel_size,
        tensor_parallel_size: options.tensor_parallel_size,
        max_parallel_loading_workers: options.max_parallel_loading_workers,
        disable_custom_all_reduce: options.disable_custom_all_reduce,
        distributed_executor_backend,
        worker_class: options.worker_class.clone(),
    })
}

/// Resolve speculative decoding, absent unless a proposer is configured
pub(crate) fn build_speculative_config(
    options: &EngineOptions,
    model: &ModelConfig,
    parallel: &ParallelConfig,
) -> Result<Option<SpeculativeConfig>> {
    let Some(proposer) = options.speculative_model.as_deref() else {
        if options.num_speculative_tokens.is_some() {
            return Err(ConfigError::validation(
                "num_speculative_tokens requires a speculative_model",
            ));
        }
        return Ok(None);
    };

    let num_speculative_tokens = options.num_speculative_tokens.ok_or_else(|| {
        ConfigError::validation("speculative_model requires num_speculative_tokens")
    })?;
    if num_speculative_tokens == 0 {
        return Err(ConfigError::validation(
            "num_speculative_tokens must be positive",
        ));
    }

    let method = if options.uses_ngram_speculation() {
        let prompt_lookup_max = options.ngram_prompt_lookup_max.ok_or_else(|| {
            ConfigError::validation("ngram speculation requires ngram_prompt_lookup_max")
        })?;
        if prompt_lookup_max == 0 {
            return Err(ConfigError::validation(
                "ngram_prompt_lookup_max must be positive",
            ));
        }
        let prompt_lookup_min = options.ngram_prompt_lookup_min.unwrap_or(1);
        if prompt_lookup_min == 0 || prompt_lookup_min > prompt_lookup_max {
            return Err(ConfigError::validation(format!(
                "ngram_prompt_lookup_min must lie within 1..={}, got {}",
                prompt_lookup_max, prompt_lookup_min
            )));
        }
        SpeculativeMethod::Ngram {
            prompt_lookup_max,
            prompt_lookup_min,
        }
    } else {
        SpeculativeMethod::DraftModel {
            model: proposer.to_string(),
            quantization: options.speculative_model_quantization,
        }
    };

    let draft_tensor_parallel_size = options
        .speculative_draft_tensor_parallel_size
        .unwrap_or(1);
    if draft_tensor_parallel_size != 1
        && draft_tensor_parallel_size != parallel.tensor_parallel_size
    {
        return Err(ConfigError::validation(format!(
            "speculative_draft_tensor_parallel_size must be 1 or match \
             tensor_parallel_size ({}), got {}",
            parallel.tensor_parallel_size, draft_tensor_parallel_size
        )));
    }

    let max_model_len = match options.speculative_max_model_len {
        Some(len) if len > model.max_model_len => {
            return Err(ConfigError::validation(format!(
                "speculative_max_model_len ({}) must not exceed max_model_len ({})",
                len, model.max_model_len
            )));
        }
        Some(len) => len,
        None => model.max_model_len,
    };

    if let Some(batch_size) = options.speculative_disable_by_batch_size {
        if batch_size < 2 {
            return Err(ConfigError::validation(
                "speculative_disable_by_batch_size must be at least 2",
            ));
        }
    }

    Ok(Some(SpeculativeConfig {
        method,
        num_speculative_tokens,
        max_model_len,
        draft_tensor_parallel_size,
        disable_by_batch_size: options.speculative_disable_by_batch_size,
        disable_mqa_scorer: options.speculative_disable_mqa_scorer,
        disable_logprobs: options
            .disable_logprobs_during_spec_decoding
            .unwrap_or(false),
    }))
}

/// Resolve the scheduler settings
pub(crate) fn build_scheduler_config(
    options: &EngineOptions,
    model: &ModelConfig,
    speculative: Option<&SpeculativeConfig>,
) -> Result<SchedulerConfig> {
    let enable_chunked_prefill = options.enable_chunked_prefill.unwrap_or(false);

    let max_num_batched_tokens = options.max_num_batched_tokens.unwrap_or_else(|| {
        if enable_chunked_prefill {
            // Chunking caps the per-step budget, long prompts span steps.
            DEFAULT_CHUNKED_PREFILL_TOKEN_BUDGET
        } else {
            model.max_model_len.max(MIN_TOKEN_BUDGET)
        }
    });
    if !enable_chunked_prefill && max_num_batched_tokens < model.max_model_len {
        return Err(ConfigError::validation(format!(
            "max_num_batched_tokens ({}) must cover max_model_len ({}) unless \
             chunked prefill is enabled",
            max_num_batched_tokens, model.max_model_len
        )));
    }

    let max_num_seqs = options.max_num_seqs.unwrap_or(256);
    if max_num_seqs == 0 {
        return Err(ConfigError::validation("max_num_seqs must be positive"));
    }
    if max_num_batched_tokens < max_num_seqs {
        return Err(ConfigError::validation(format!(
            "max_num_batched_tokens ({}) must be at least max_num_seqs ({})",
            max_num_batched_tokens, max_num_seqs
        )));
    }

    if options.scheduler_delay_factor < 0.0 {
        return Err(ConfigError::validation(
            "scheduler_delay_factor must not be negative",
        ));
    }
    if options.num_scheduler_steps == 0 {
        return Err(ConfigError::validation(
            "num_scheduler_steps must be at least 1",
        ));
    }
    if options.max_num_partial_prefills == 0 {
        return Err(ConfigError::validation(
            "max_num_partial_prefills must be at least 1",
        ));
    }
    if options.max_long_partial_prefills == 0
        || options.max_long_partial_prefills > options.max_num_partial_prefills
    {
        return Err(ConfigError::validation(format!(
            "max_long_partial_prefills must lie within 1..={}, got {}",
            options.max_num_partial_prefills, options.max_long_partial_prefills
        )));
    }

    // Multi-step scheduling needs a slot per extra step; a speculative
    // proposer dictates the lookahead outright.
    let mut num_lookahead_slots = options
        .num_lookahead_slots
        .max(options.num_scheduler_steps.saturating_sub(1));
    if let Some(speculative) = speculative {
        num_lookahead_slots = speculative.num_lookahead_slots();
    }

    Ok(SchedulerConfig {
        runner_kind: model.runner_kind(),
        max_num_batched_tokens,
        max_num_seqs,
        max_model_len: model.max_model_len,
        num_lookahead_slots,
        delay_factor: options.scheduler_delay_factor,
        enable_chunked_prefill,
        is_multimodal: model.is_multimodal(),
        preemption_mode: options.preemption_mode,
        num_scheduler_steps: options.num_scheduler_steps,
        multi_step_stream_outputs: options.multi_step_stream_outputs,
        send_delta_data: false,
        policy: options.scheduling_policy,
        scheduler_class: options.scheduler_class.clone(),
        max_num_partial_prefills: options.max_num_partial_prefills,
        max_long_partial_prefills: options.max_long_partial_prefills,
        long_prefill_token_threshold: options.long_prefill_token_threshold,
    })
}

/// Resolve LoRA serving, absent unless enabled
pub(crate) fn build_lora_config(
    options: &EngineOptions,
    model: &ModelConfig,
) -> Result<Option<LoraConfig>> {
    if !options.enable_lora {
        return Ok(None);
    }

    if options.max_loras == 0 {
        return Err(ConfigError::validation("max_loras must be at least 1"));
    }
    if !SUPPORTED_LORA_RANKS.contains(&options.max_lora_rank) {
        return Err(ConfigError::validation(format!(
            "max_lora_rank must be one of {:?}, got {}",
            SUPPORTED_LORA_RANKS, options.max_lora_rank
        )));
    }
    if options.lora_extra_vocab_size > MAX_LORA_EXTRA_VOCAB_SIZE {
        return Err(ConfigError::validation(format!(
            "lora_extra_vocab_size must not exceed {}, got {}",
            MAX_LORA_EXTRA_VOCAB_SIZE, options.lora_extra_vocab_size
        )));
    }

    let max_cpu_loras = match options.max_cpu_loras {
        // Unset or zero means "as many as fit on the device".
        None | Some(0) => options.max_loras,
        Some(n) if n < options.max_loras => {
            return Err(ConfigError::validation(format!(
                "max_cpu_loras ({}) must be at least max_loras ({})",
                n, options.max_loras
            )));
        }
        Some(n) => n,
    };

    Ok(Some(LoraConfig {
        max_loras: options.max_loras,
        max_lora_rank: options.max_lora_rank,
        fully_sharded_loras: options.fully_sharded_loras,
        max_cpu_loras,
        lora_dtype: options.lora_dtype.unwrap_or(model.dtype),
        lora_extra_vocab_size: options.lora_extra_vocab_size,
        long_lora_scaling_factors: options.long_lora_scaling_factors.clone(),
        bias_enabled: options.enable_lora_bias,
    }))
}

/// Resolve prompt adapter serving, absent unless enabled
pub(crate) fn build_prompt_adapter_config(
    options: &EngineOptions,
) -> Result<Option<PromptAdapterConfig>> {
    if !options.enable_prompt_adapter {
        return Ok(None);
    }

    if options.max_prompt_adapters == 0 {
        return Err(ConfigError::validation(
            "max_prompt_adapters must be at least 1",
        ));
    }
    if options.max_prompt_adapter_token == 0 {
        return Err(ConfigError::validation(
            "max_prompt_adapter_token must be set when prompt adapters are enabled",
        ));
    }

    Ok(Some(PromptAdapterConfig {
        max_prompt_adapters: options.max_prompt_adapters,
        max_prompt_adapter_token: options.max_prompt_adapter_token,
    }))
}

/// Resolve the decoding settings
pub(crate) fn build_decoding_config(options: &EngineOptions) -> Result<DecodingConfig> {
    if options.enable_reasoning && options.reasoning_parser.is_none() {
        return Err(ConfigError::validation(
            "enable_reasoning requires a reasoning_parser",
        ));
    }

    Ok(DecodingConfig {
        guided_decoding_backend: options.guided_decoding_backend,
        reasoning_parser: if options.enable_reasoning {
            options.reasoning_parser.clone()
        } else {
            None
        },
    })
}

/// Resolve the observability settings
pub(crate) fn build_observability_config(
    options: &EngineOptions,
) -> Result<ObservabilityConfig> {
    for module in &options.collect_detailed_traces {
        if !ALLOWED_DETAILED_TRACE_MODULES.contains(&module.as_str()) {
            return Err(ConfigError::validation(format!(
                "invalid detailed-trace module {:?}, valid modules are {:?}",
                module, ALLOWED_DETAILED_TRACE_MODULES
            )));
        }
    }
    let collects = |name: &str| {
        options
            .collect_detailed_traces
            .iter()
            .any(|module| module == name || module == "all")
    };

    let show_hidden_metrics = options
        .show_hidden_metrics_for_version
        .as_deref()
        .is_some_and(|gate| previous_minor_version().as_deref() == Some(gate));

    Ok(ObservabilityConfig {
        log_stats: !options.disable_log_stats,
        show_hidden_metrics,
        otlp_traces_endpoint: options.otlp_traces_endpoint.clone(),
        collect_model_forward_time: collects("model"),
        collect_model_execute_time: collects("worker"),
    })
}

/// The minor release before this crate's own, as "major.minor"
///
/// Hidden metrics stay visible for exactly one extra minor release; the
/// escape hatch expires on its own when the version moves on.
fn previous_minor_version() -> Option<String> {
    let version = env!("CARGO_PKG_VERSION");
    let mut parts = version.split('.');
    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = parts.next()?.parse().ok()?;
    Some(format!("{}.{}", major, minor.checked_sub(1)?))
}
