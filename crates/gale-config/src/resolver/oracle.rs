//! Runtime compatibility rules
//!
//! An ordered table of named rules decides which runtime generation serves
//! a given option set. Hard rules name features the next-generation runtime
//! cannot serve at all; experimental rules name features it serves with
//! caveats. The first matching hard rule decides, so rules must stay in
//! declaration order.

use crate::config::{ModelConfig, ModelTask, RuntimeGeneration};
use crate::error::{ConfigError, Result};
use crate::hardware::HardwareContext;
use crate::notice::NoticeLog;
use crate::options::EngineOptions;

use super::{ResolutionPolicy, RuntimeOverride};

/// How well the next-generation runtime supports a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SupportTier {
    /// Not served at all, a match forces the legacy runtime
    Unsupported,

    /// Served, but only for callers who opt in by forcing next-generation
    Experimental,
}

/// Everything a compatibility rule may inspect
pub(crate) struct RuleContext<'a> {
    /// Raw options, already normalized
    pub options: &'a EngineOptions,

    /// The resolved model configuration
    pub model: &'a ModelConfig,

    /// Probe-supplied hardware facts
    pub hardware: &'a HardwareContext,
}

/// One row of the compatibility table
pub(crate) struct CompatRule {
    /// Feature name used in notices and errors
    pub feature: &'static str,

    /// Support tier on the next-generation runtime
    pub tier: SupportTier,

    /// Whether fallback notices should suggest removing the setting
    pub recommend_removal: bool,

    /// Whether the rule matches the given context
    pub applies: fn(&RuleContext<'_>) -> bool,
}

/// The compatibility table, hard rules first
///
/// Rows within a tier are evaluated top to bottom.
pub(crate) static COMPAT_RULES: &[CompatRule] = &[
    CompatRule {
        feature: "logits_processor_pattern",
        tier: SupportTier::Unsupported,
        recommend_removal: false,
        applies: |cx| cx.options.logits_processor_pattern.is_some(),
    },
    CompatRule {
        feature: "preemption_mode",
        tier: SupportTier::Unsupported,
        recommend_removal: true,
        applies: |cx| cx.options.preemption_mode.is_some(),
    },
    CompatRule {
        feature: "disable_async_output_processing",
        tier: SupportTier::Unsupported,
        recommend_removal: true,
        applies: |cx| cx.options.disable_async_output_processing,
    },
    CompatRule {
        feature: "scheduling_policy",
        tier: SupportTier::Unsupported,
        recommend_removal: false,
        applies: |cx| {
            cx.options.scheduling_policy != crate::config::SchedulingPolicy::Fcfs
        },
    },
    CompatRule {
        feature: "scheduler_class",
        tier: SupportTier::Unsupported,
        recommend_removal: false,
        applies: |cx| cx.options.scheduler_class.is_some(),
    },
    CompatRule {
        feature: "worker_class",
        tier: SupportTier::Unsupported,
        recommend_removal: false,
        applies: |cx| cx.options.worker_class.is_some(),
    },
    CompatRule {
        feature: "num_scheduler_steps",
        tier: SupportTier::Unsupported,
        recommend_removal: true,
        applies: |cx| cx.options.num_scheduler_steps > 1,
    },
    CompatRule {
        feature: "scheduler_delay_factor",
        tier: SupportTier::Unsupported,
        recommend_removal: true,
        applies: |cx| cx.options.scheduler_delay_factor != 0.0,
    },
    CompatRule {
        feature: "additional_config",
        tier: SupportTier::Unsupported,
        recommend_removal: false,
        applies: |cx| cx.options.additional_config.is_some(),
    },
    CompatRule {
        feature: "guided_decoding_backend",
        tier: SupportTier::Unsupported,
        recommend_removal: false,
        applies: |cx| {
            cx.options.guided_decoding_backend != crate::config::GuidedDecodingBackend::XGrammar
        },
    },
    CompatRule {
        feature: "compute capability below 8.0",
        tier: SupportTier::Unsupported,
        recommend_removal: false,
        applies: |cx| {
            cx.hardware.is_accelerator
                && cx
                    .hardware
                    .compute_capability
                    .is_some_and(|cc| cc.major < 8)
        },
    },
    CompatRule {
        feature: "kv_cache_dtype",
        tier: SupportTier::Unsupported,
        recommend_removal: false,
        applies: |cx| cx.options.kv_cache_dtype.is_some(),
    },
    CompatRule {
        feature: "enable_prompt_adapter",
        tier: SupportTier::Unsupported,
        recommend_removal: false,
        applies: |cx| cx.options.enable_prompt_adapter,
    },
    CompatRule {
        feature: "non-generation task",
        tier: SupportTier::Unsupported,
        recommend_removal: false,
        applies: |cx| cx.model.task != ModelTask::Generate,
    },
    CompatRule {
        feature: "model architecture",
        tier: SupportTier::Unsupported,
        recommend_removal: false,
        applies: |cx| !cx.model.architecture.is_nextgen_capable(),
    },
    CompatRule {
        feature: "concurrent partial prefill",
        tier: SupportTier::Unsupported,
        recommend_removal: false,
        applies: |cx| {
            cx.options.max_num_partial_prefills != 1
                || cx.options.max_long_partial_prefills != 1
                || cx.options.long_prefill_token_threshold != 0
        },
    },
    CompatRule {
        feature: "detailed tracing",
        tier: SupportTier::Unsupported,
        recommend_removal: false,
        applies: |cx| {
            cx.options.otlp_traces_endpoint.is_some()
                || !cx.options.collect_detailed_traces.is_empty()
        },
    },
    CompatRule {
        feature: "speculative decoding with a draft model",
        tier: SupportTier::Unsupported,
        recommend_removal: false,
        applies: |cx| {
            (cx.options.speculative_model.is_some()
                || cx.options.num_speculative_tokens.is_some())
                && !cx.options.uses_ngram_speculation()
        },
    },
    CompatRule {
        feature: "kv_transfer_config",
        tier: SupportTier::Unsupported,
        recommend_removal: false,
        applies: |cx| cx.options.kv_transfer_config.is_some(),
    },
    CompatRule {
        feature: "multi-head latent attention",
        tier: SupportTier::Experimental,
        recommend_removal: false,
        applies: |cx| cx.model.uses_latent_attention(),
    },
    CompatRule {
        feature: "lora",
        tier: SupportTier::Experimental,
        recommend_removal: false,
        applies: |cx| cx.options.enable_lora,
    },
    CompatRule {
        feature: "pipeline parallelism",
        tier: SupportTier::Experimental,
        recommend_removal: false,
        applies: |cx| cx.options.pipeline_parallel_size > 1,
    },
    CompatRule {
        feature: "ngram speculative decoding",
        tier: SupportTier::Experimental,
        recommend_removal: false,
        applies: |cx| cx.options.uses_ngram_speculation(),
    },
    CompatRule {
        feature: "non-accelerator device",
        tier: SupportTier::Experimental,
        recommend_removal: false,
        applies: |cx| !cx.hardware.is_accelerator,
    },
];

/// Decide the runtime generation for the given context
///
/// A matching hard rule falls back to the legacy runtime with a warning, or
/// fails outright when the caller forced next-generation. Matching
/// experimental rules fall back with an informational notice unless
/// next-generation was forced, in which case they warn and proceed. With no
/// match the policy decides.
pub(crate) fn choose_runtime(
    cx: &RuleContext<'_>,
    policy: &ResolutionPolicy,
    notices: &mut NoticeLog,
) -> Result<RuntimeGeneration> {
    let forced_nextgen = policy.runtime_override == RuntimeOverride::ForceNextGen;

    for rule in COMPAT_RULES
        .iter()
        .filter(|rule| rule.tier == SupportTier::Unsupported)
    {
        if !(rule.applies)(cx) {
            continue;
        }
        if forced_nextgen {
            return Err(ConfigError::unsupported(
                rule.feature,
                RuntimeGeneration::NextGen,
            ));
        }
        let mut message = format!(
            "{} is not supported by the next-generation runtime, falling back to the legacy runtime",
            rule.feature
        );
        if rule.recommend_removal {
            message.push_str("; remove the setting to become eligible for next-generation serving");
        }
        notices.warning(rule.feature, message);
        return Ok(RuntimeGeneration::Legacy);
    }

    for rule in COMPAT_RULES
        .iter()
        .filter(|rule| rule.tier == SupportTier::Experimental)
    {
        if !(rule.applies)(cx) {
            continue;
        }
        if forced_nextgen {
            notices.warning(
                rule.feature,
                format!(
                    "{} support on the next-generation runtime is experimental",
                    rule.feature
                ),
            );
        } else {
            notices.info(
                rule.feature,
                format!(
                    "{} is experimental on the next-generation runtime, falling back to the legacy runtime",
                    rule.feature
                ),
            );
            return Ok(RuntimeGeneration::Legacy);
        }
    }

    match policy.runtime_override {
        RuntimeOverride::ForceNextGen => Ok(RuntimeGeneration::NextGen),
        RuntimeOverride::ForceLegacy => Ok(RuntimeGeneration::Legacy),
        RuntimeOverride::Auto => {
            if policy.nextgen_by_default {
                Ok(RuntimeGeneration::NextGen)
            } else {
                notices.info(
                    "runtime",
                    "this configuration is supported by the next-generation runtime, \
                     set the runtime override to opt in",
                );
                Ok(RuntimeGeneration::Legacy)
            }
        }
    }
}
