//! Configuration resolution pipeline
//!
//! [`resolve`] turns raw options plus probe-supplied hardware facts into a
//! [`ResolvedConfig`]. The pipeline order is fixed: normalize, place the
//! device, resolve the model, choose the runtime generation, fill
//! generation-specific defaults, build each sub-configuration, then run the
//! cross-configuration checks. Identical inputs always yield an identical
//! configuration and notice log.

mod builders;
mod defaults;
mod oracle;

use serde::{Deserialize, Serialize};

use crate::config::{ResolvedConfig, RuntimeGeneration};
use crate::error::{ConfigError, Result};
use crate::hardware::{HardwareContext, UsageContext};
use crate::notice::{Notice, NoticeLog};
use crate::options::EngineOptions;

/// Caller-supplied runtime-generation override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeOverride {
    /// Let the compatibility rules and the policy decide
    #[default]
    Auto,

    /// Always run the legacy runtime
    ForceLegacy,

    /// Run the next-generation runtime or fail trying
    ForceNextGen,
}

/// Deployment policy for one resolution
///
/// Resolution reads no process environment; everything deployment-specific
/// arrives through this struct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionPolicy {
    /// Runtime-generation override
    pub runtime_override: RuntimeOverride,

    /// Serve rule-clean configurations on the next-generation runtime
    pub nextgen_by_default: bool,

    /// Workers run in SPMD mode under the distributed executor
    pub spmd_worker: bool,
}

/// The product of a successful resolution
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The immutable resolved configuration
    pub config: ResolvedConfig,

    /// Notices emitted along the way, in emission order
    pub notices: Vec<Notice>,
}

/// Resolve raw options into a complete engine configuration
///
/// Fails with a [`ConfigError`](crate::error::ConfigError) when the options
/// contradict each other, violate a constraint, or demand a runtime that
/// cannot serve them. Recoverable issues become notices instead.
pub fn resolve(
    mut options: EngineOptions,
    hardware: &HardwareContext,
    usage: UsageContext,
    policy: &ResolutionPolicy,
) -> Result<Resolution> {
    let mut notices = NoticeLog::new();
    options.normalize();

    let device = builders::build_device_config(&options, hardware)?;
    let model = builders::build_model_config(&options)?;

    let generation = oracle::choose_runtime(
        &oracle::RuleContext {
            options: &options,
            model: &model,
            hardware,
        },
        policy,
        &mut notices,
    )?;
    tracing::debug!(
        generation = %generation,
        model = %model.model,
        "selected runtime generation"
    );

    defaults::apply_defaults(&mut options, generation, &model, hardware, usage, &mut notices)?;

    let load = builders::build_load_config(&options)?;
    let cache = builders::build_cache_config(&options, &model)?;
    let parallel = builders::build_parallel_config(&options)?;
    let speculative = builders::build_speculative_config(&options, &model, &parallel)?;

    // Multi-step interlocks run before the scheduler is built so its
    // lookahead computation sees the final step count.
    if options.num_scheduler_steps > 1 {
        if speculative.is_some() {
            return Err(ConfigError::conflict(
                "speculative decoding is not supported with multi-step scheduling",
            ));
        }
        if options.enable_chunked_prefill.unwrap_or(false) && options.pipeline_parallel_size > 1 {
            return Err(ConfigError::conflict(
                "multi-step chunked prefill is not supported with pipeline parallelism",
            ));
        }
        if !hardware.is_accelerator {
            notices.warning(
                "num_scheduler_steps",
                "multi-step scheduling is not supported on non-accelerator devices \
                 and has been disabled",
            );
            options.num_scheduler_steps = 1;
        }
    }

    let scheduler = builders::build_scheduler_config(&options, &model, speculative.as_ref())?;
    let lora = builders::build_lora_config(&options, &model)?;
    let prompt_adapter = builders::build_prompt_adapter_config(&options)?;
    let decoding = builders::build_decoding_config(&options)?;
    let observability = builders::build_observability_config(&options)?;

    let candidate = ResolvedConfig {
        generation,
        model,
        cache,
        parallel,
        scheduler,
        device,
        load,
        decoding,
        observability,
        lora,
        speculative,
        prompt_adapter,
        kv_transfer: options.kv_transfer_config.clone(),
        additional_config: options.additional_config.clone(),
    };
    let config = assemble(candidate, policy, &mut notices)?;

    Ok(Resolution {
        config,
        notices: notices.into_notices(),
    })
}

/// Cross-configuration checks that need every sub-configuration at once
///
/// The candidate never leaves this function unless every check passes.
fn assemble(
    mut config: ResolvedConfig,
    policy: &ResolutionPolicy,
    notices: &mut NoticeLog,
) -> Result<ResolvedConfig> {
    config.scheduler.send_delta_data =
        policy.spmd_worker && config.parallel.uses_distributed_executor();

    if config.parallel.pipeline_parallel_size > 1
        && !config.model.architecture.supports_pipeline_parallel()
    {
        return Err(ConfigError::conflict(format!(
            "the {:?} architecture does not support pipeline parallelism",
            config.model.architecture
        )));
    }

    if config.generation == RuntimeGeneration::Legacy
        && config.cache.enable_prefix_caching
        && config.model.sliding_window.is_some()
    {
        return Err(ConfigError::conflict(
            "prefix caching cannot be combined with a sliding attention window \
             on the legacy runtime",
        ));
    }

    if let Some(speculative) = &config.speculative {
        if config.scheduler.num_lookahead_slots != speculative.num_lookahead_slots() {
            return Err(ConfigError::validation(format!(
                "num_lookahead_slots ({}) does not match the speculative proposer ({})",
                config.scheduler.num_lookahead_slots,
                speculative.num_lookahead_slots()
            )));
        }
    }

    if config.lora.is_some() {
        if let Some(quantization) = config.model.quantization {
            notices.warning(
                "lora",
                format!(
                    "serving LoRA adapters together with {:?} quantization is not \
                     fully validated, watch output quality",
                    quantization
                ),
            );
        }
    }

    Ok(config)
}

impl EngineOptions {
    /// Resolve these options, consuming them
    ///
    /// Convenience wrapper around [`resolve`].
    pub fn resolve(
        self,
        hardware: &HardwareContext,
        usage: UsageContext,
        policy: &ResolutionPolicy,
    ) -> Result<Resolution> {
        resolve(self, hardware, usage, policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExecutorBackend, LoadFormat, QuantizationMethod, SchedulingPolicy};
    use crate::hardware::ComputeCapability;
    use crate::notice::NoticeLevel;
    use crate::options::NGRAM_SPECULATIVE_MODEL;

    fn llama() -> EngineOptions {
        EngineOptions::new("meta-llama/Llama-2-7b-hf")
    }

    fn ampere() -> HardwareContext {
        HardwareContext::cuda("NVIDIA A100-SXM4-80GB", ComputeCapability::new(8, 0))
    }

    fn auto_policy() -> ResolutionPolicy {
        ResolutionPolicy::default()
    }

    fn nextgen_policy() -> ResolutionPolicy {
        ResolutionPolicy {
            nextgen_by_default: true,
            ..ResolutionPolicy::default()
        }
    }

    fn forced_policy() -> ResolutionPolicy {
        ResolutionPolicy {
            runtime_override: RuntimeOverride::ForceNextGen,
            ..ResolutionPolicy::default()
        }
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let options = llama().with_max_model_len(65_536);
        let first = resolve(options.clone(), &ampere(), UsageContext::Library, &auto_policy())
            .unwrap();
        let second = resolve(options, &ampere(), UsageContext::Library, &auto_policy()).unwrap();

        assert_eq!(first.config, second.config);
        assert_eq!(first.notices, second.notices);
    }

    #[test]
    fn test_legacy_happy_path() {
        let resolution =
            resolve(llama(), &ampere(), UsageContext::Library, &auto_policy()).unwrap();
        let config = &resolution.config;

        assert_eq!(config.generation, RuntimeGeneration::Legacy);
        assert!(!config.scheduler.enable_chunked_prefill);
        assert!(!config.cache.enable_prefix_caching);
        assert_eq!(config.scheduler.max_num_seqs, 256);
        assert_eq!(config.scheduler.max_num_batched_tokens, 4096);
        assert!(config.lora.is_none());
        assert!(config.speculative.is_none());
        assert!(config.prompt_adapter.is_none());
        assert!(config.kv_transfer.is_none());

        // Auto mode points compatible callers at the newer runtime.
        assert_eq!(resolution.notices.len(), 1);
        assert_eq!(resolution.notices[0].feature, "runtime");
        assert_eq!(resolution.notices[0].level, NoticeLevel::Info);
    }

    #[test]
    fn test_nextgen_happy_path() {
        let resolution =
            resolve(llama(), &ampere(), UsageContext::Library, &nextgen_policy()).unwrap();
        let config = &resolution.config;

        assert_eq!(config.generation, RuntimeGeneration::NextGen);
        assert!(config.scheduler.enable_chunked_prefill);
        assert!(config.cache.enable_prefix_caching);
        assert_eq!(config.scheduler.max_num_batched_tokens, 8192);
        assert_eq!(config.scheduler.max_num_seqs, 1024);
        assert!(resolution.notices.is_empty());
    }

    #[test]
    fn test_hard_rule_downgrade_keeps_the_setting() {
        let mut options = llama();
        options.scheduling_policy = SchedulingPolicy::Priority;
        let resolution =
            resolve(options, &ampere(), UsageContext::Library, &nextgen_policy()).unwrap();

        assert_eq!(resolution.config.generation, RuntimeGeneration::Legacy);
        assert_eq!(resolution.config.scheduler.policy, SchedulingPolicy::Priority);
        assert_eq!(resolution.notices[0].feature, "scheduling_policy");
        assert_eq!(resolution.notices[0].level, NoticeLevel::Warning);
    }

    #[test]
    fn test_forcing_nextgen_onto_a_hard_rule_fails() {
        let mut options = llama();
        options.scheduling_policy = SchedulingPolicy::Priority;
        let err = resolve(options, &ampere(), UsageContext::Library, &forced_policy())
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_speculative_proposer_dictates_the_lookahead() {
        let mut options = llama();
        options.num_lookahead_slots = 3;
        options.speculative_model = Some("meta-llama/Llama-2-70b-hf".to_string());
        options.num_speculative_tokens = Some(5);
        let resolution =
            resolve(options, &ampere(), UsageContext::Library, &auto_policy()).unwrap();

        assert_eq!(resolution.config.scheduler.num_lookahead_slots, 5);
        let speculative = resolution.config.speculative.as_ref().unwrap();
        assert_eq!(speculative.num_speculative_tokens, 5);
    }

    #[test]
    fn test_multi_step_rejects_speculation() {
        let mut options = llama();
        options.num_scheduler_steps = 2;
        options.speculative_model = Some(NGRAM_SPECULATIVE_MODEL.to_string());
        options.num_speculative_tokens = Some(3);
        options.ngram_prompt_lookup_max = Some(4);
        let err =
            resolve(options, &ampere(), UsageContext::Library, &auto_policy()).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_multi_step_chunked_prefill_rejects_pipeline_parallel() {
        let mut options = llama();
        options.num_scheduler_steps = 2;
        options.enable_chunked_prefill = Some(true);
        options.pipeline_parallel_size = 2;
        let err =
            resolve(options, &ampere(), UsageContext::Library, &auto_policy()).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_multi_step_is_clamped_off_accelerators() {
        let mut options = llama();
        options.num_scheduler_steps = 4;
        let resolution =
            resolve(options, &HardwareContext::cpu(), UsageContext::Library, &auto_policy())
                .unwrap();

        assert_eq!(resolution.config.scheduler.num_scheduler_steps, 1);
        assert_eq!(resolution.config.scheduler.num_lookahead_slots, 0);
        assert!(resolution
            .notices
            .iter()
            .any(|notice| notice.feature == "num_scheduler_steps"
                && notice.level == NoticeLevel::Warning
                && notice.message.contains("disabled")));
    }

    #[test]
    fn test_bitsandbytes_pairing_is_checked_during_resolution() {
        let options = llama().with_quantization(QuantizationMethod::BitsAndBytes);
        let err =
            resolve(options, &ampere(), UsageContext::Library, &auto_policy()).unwrap_err();
        assert!(err.is_conflict());

        let mut options = llama().with_quantization(QuantizationMethod::BitsAndBytes);
        options.load_format = LoadFormat::BitsAndBytes;
        let resolution =
            resolve(options, &ampere(), UsageContext::Library, &auto_policy()).unwrap();
        assert_eq!(resolution.config.load.format, LoadFormat::BitsAndBytes);
    }

    #[test]
    fn test_delta_data_needs_spmd_and_the_distributed_executor() {
        let mut options = llama().with_tensor_parallel(2);
        options.distributed_executor_backend = Some(ExecutorBackend::Distributed);

        let policy = ResolutionPolicy {
            spmd_worker: true,
            nextgen_by_default: true,
            ..ResolutionPolicy::default()
        };
        let resolution =
            resolve(options.clone(), &ampere(), UsageContext::Library, &policy).unwrap();
        assert!(resolution.config.scheduler.send_delta_data);

        let resolution =
            resolve(options.clone(), &ampere(), UsageContext::Library, &nextgen_policy())
                .unwrap();
        assert!(!resolution.config.scheduler.send_delta_data);

        options.distributed_executor_backend = Some(ExecutorBackend::MultiProcess);
        let resolution = resolve(options, &ampere(), UsageContext::Library, &policy).unwrap();
        assert!(!resolution.config.scheduler.send_delta_data);
    }

    #[test]
    fn test_legacy_prefix_caching_rejects_sliding_windows() {
        let mut options = llama();
        options.enable_prefix_caching = Some(true);
        options.sliding_window = Some(4096);
        let err =
            resolve(options, &ampere(), UsageContext::Library, &auto_policy()).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_pipeline_parallelism_needs_architecture_support() {
        let mut options = EngineOptions::new("llava-hf/llava-1.5-7b-hf");
        options.pipeline_parallel_size = 2;
        let err =
            resolve(options, &ampere(), UsageContext::Library, &auto_policy()).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_lora_with_quantization_warns_in_order() {
        let mut options = llama().with_quantization(QuantizationMethod::Gptq);
        options.enable_lora = true;
        let resolution =
            resolve(options, &ampere(), UsageContext::Library, &nextgen_policy()).unwrap();

        assert!(resolution.config.lora.is_some());
        // The oracle speaks first, assembly last.
        assert_eq!(resolution.notices[0].feature, "lora");
        assert_eq!(resolution.notices[0].level, NoticeLevel::Info);
        let last = resolution.notices.last().unwrap();
        assert_eq!(last.feature, "lora");
        assert_eq!(last.level, NoticeLevel::Warning);
        assert!(last.message.contains("Gptq"));
    }

    #[test]
    fn test_invalid_trace_module_fails_after_the_downgrade() {
        let mut options = llama();
        options.collect_detailed_traces = vec!["bogus".to_string()];
        let err =
            resolve(options, &ampere(), UsageContext::Library, &auto_policy()).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_gguf_checkpoints_resolve_end_to_end() {
        let options = EngineOptions::new("models/llama-2-7b.Q4_K_M.gguf");
        let resolution =
            resolve(options, &ampere(), UsageContext::Library, &auto_policy()).unwrap();

        assert_eq!(resolution.config.load.format, LoadFormat::Gguf);
        assert_eq!(
            resolution.config.model.quantization,
            Some(QuantizationMethod::Ggml)
        );
    }

    #[test]
    fn test_kv_transfer_passes_through_untouched() {
        let mut options = llama();
        options.kv_transfer_config = Some(crate::config::KvTransferConfig {
            connector: "shared-storage".to_string(),
            role: crate::config::KvTransferRole::Producer,
            buffer_size_gib: 1.0,
        });
        let resolution = resolve(
            options.clone(),
            &ampere(),
            UsageContext::Library,
            &auto_policy(),
        )
        .unwrap();

        assert_eq!(resolution.config.generation, RuntimeGeneration::Legacy);
        assert_eq!(resolution.config.kv_transfer, options.kv_transfer_config);
        assert_eq!(resolution.notices[0].feature, "kv_transfer_config");
    }

    #[test]
    fn test_options_resolve_method() {
        let resolution = llama()
            .resolve(&ampere(), UsageContext::ApiServer, &nextgen_policy())
            .unwrap();
        assert_eq!(resolution.config.scheduler.max_num_batched_tokens, 2048);
    }

    #[test]
    fn test_resolved_config_serializes_for_diagnostics() {
        let resolution =
            resolve(llama(), &ampere(), UsageContext::Library, &nextgen_policy()).unwrap();
        let json = resolution.config.to_json().unwrap();
        assert!(json.contains("\"generation\": \"nextgen\""));
        assert!(json.contains("\"max_num_batched_tokens\": 8192"));
    }
}
