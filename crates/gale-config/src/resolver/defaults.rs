//! Generation-specific defaulting
//!
//! Once the runtime generation is known, options the caller left unset are
//! filled in. The two runtimes want different values, most visibly around
//! chunked prefill and batch sizing, so defaulting runs after the
//! compatibility rules and before any sub-configuration is built.

use crate::config::{ModelConfig, RunnerKind, RuntimeGeneration};
use crate::error::{ConfigError, Result};
use crate::hardware::{HardwareContext, UsageContext};
use crate::notice::NoticeLog;
use crate::options::EngineOptions;

/// Context length above which a model counts as long-context
const LONG_CONTEXT_THRESHOLD: usize = 32_768;

const LEGACY_DEFAULT_MAX_NUM_SEQS: usize = 256;
const NEXTGEN_DEFAULT_MAX_NUM_SEQS: usize = 1024;

/// Fill unset options with generation-appropriate values
pub(crate) fn apply_defaults(
    options: &mut EngineOptions,
    generation: RuntimeGeneration,
    model: &ModelConfig,
    hardware: &HardwareContext,
    usage: UsageContext,
    notices: &mut NoticeLog,
) -> Result<()> {
    if options.enable_chunked_prefill == Some(true)
        && model.runner_kind() == RunnerKind::Pooling
    {
        return Err(ConfigError::validation(
            "chunked prefill is not supported for pooling models",
        ));
    }

    match generation {
        RuntimeGeneration::Legacy => apply_legacy_defaults(options, model, hardware, notices),
        RuntimeGeneration::NextGen => apply_nextgen_defaults(options, hardware, usage),
    }
    Ok(())
}

fn apply_legacy_defaults(
    options: &mut EngineOptions,
    model: &ModelConfig,
    hardware: &HardwareContext,
    notices: &mut NoticeLog,
) {
    let long_context = model.max_model_len > LONG_CONTEXT_THRESHOLD;

    if options.enable_chunked_prefill.is_none() {
        if model.is_multimodal() || model.uses_latent_attention() {
            // The legacy runtime cannot chunk prefills for these models.
            options.enable_chunked_prefill = Some(false);
        } else if long_context {
            let eligible = hardware.is_accelerator
                && model.sliding_window.is_none()
                && options.speculative_model.is_none()
                && !options.enable_lora
                && !options.enable_prompt_adapter
                && model.runner_kind() != RunnerKind::Pooling;
            if eligible {
                options.enable_chunked_prefill = Some(true);
                notices.warning(
                    "enable_chunked_prefill",
                    format!(
                        "chunked prefill is enabled by default for models with a context \
                         length over {} tokens; it may not work with every feature, \
                         disable it explicitly if you hit issues",
                        LONG_CONTEXT_THRESHOLD
                    ),
                );
            }
        }
        if options.enable_chunked_prefill.is_none() {
            options.enable_chunked_prefill = Some(false);
        }
    }

    if options.enable_chunked_prefill == Some(false) && long_context {
        notices.warning(
            "max_model_len",
            format!(
                "the model has a long context length ({} tokens); initial memory \
                 profiling may run out of memory and the KV cache may end up small, \
                 consider a smaller max_model_len",
                model.max_model_len
            ),
        );
    }

    if model.is_multimodal() {
        if options.enable_prefix_caching == Some(true) {
            notices.warning(
                "enable_prefix_caching",
                "prefix caching is not supported for multimodal models on the legacy \
                 runtime and has been disabled",
            );
        }
        options.enable_prefix_caching = Some(false);
    }
    if options.enable_prefix_caching.is_none() {
        options.enable_prefix_caching = Some(false);
    }

    if options.max_num_seqs.is_none() {
        options.max_num_seqs = Some(LEGACY_DEFAULT_MAX_NUM_SEQS);
    }
}

fn apply_nextgen_defaults(
    options: &mut EngineOptions,
    hardware: &HardwareContext,
    usage: UsageContext,
) {
    // The next-generation scheduler always chunks prefills.
    options.enable_chunked_prefill = Some(true);

    if options.enable_prefix_caching.is_none() {
        options.enable_prefix_caching = Some(true);
    }

    if options.max_num_batched_tokens.is_none() {
        let tokens = default_max_batched_tokens(hardware, usage);
        options.max_num_batched_tokens = Some(tokens);
        tracing::debug!(
            max_num_batched_tokens = tokens,
            usage = ?usage,
            "defaulted the scheduler token budget"
        );
    }

    if options.max_num_seqs.is_none() {
        options.max_num_seqs = Some(NEXTGEN_DEFAULT_MAX_NUM_SEQS);
    }
}

/// Default scheduler token budget, keyed by device class and usage
///
/// The API server favors a smaller budget for lower time to first token;
/// in-process use favors throughput.
fn default_max_batched_tokens(hardware: &HardwareContext, usage: UsageContext) -> usize {
    let device_name = hardware.device_name.to_ascii_lowercase();
    let high_end = device_name.contains("h100") || device_name.contains("h200");
    match (high_end, usage) {
        (true, UsageContext::Library) => 16_384,
        (true, UsageContext::ApiServer) => 8_192,
        (false, UsageContext::Library) => 8_192,
        (false, UsageContext::ApiServer) => 2_048,
    }
}
