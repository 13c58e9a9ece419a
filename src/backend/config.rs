//! Front end configuration.
//!
//! Defaults can be overridden programmatically (`with_*`), from the
//! environment (`from_env`), or from a manifest's `[config]` table.

use serde::Deserialize;

/// Names the delegate thunk templates expect on a delegate type
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DelegateConventions {
    /// Field holding the bound target (null for static targets)
    pub target_field: String,
    /// Field holding the bound function pointer
    pub method_ptr_field: String,
    /// Field holding the number of chained delegates (multicast only)
    pub invocation_count_field: String,
    /// Field holding the array of chained delegates (multicast only)
    pub invocation_list_field: String,
    /// Name of the invocation method
    pub invoke_method: String,
}

impl Default for DelegateConventions {
    fn default() -> Self {
        Self {
            target_field: "_target".to_string(),
            method_ptr_field: "_methodPtr".to_string(),
            invocation_count_field: "_invocationCount".to_string(),
            invocation_list_field: "_invocationList".to_string(),
            invoke_method: "Invoke".to_string(),
        }
    }
}

/// Front end configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Emit short-form branches in synthetic bodies, widening only the ones
    /// whose displacement does not fit in a signed byte
    pub short_branches: bool,
    /// Skip types nested in `<PrivateImplementationDetails>`
    pub skip_compiler_generated: bool,
    /// Build translation units across types in parallel
    pub parallel: bool,
    /// Delegate naming conventions
    pub delegate: DelegateConventions,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            short_branches: true,
            skip_compiler_generated: true,
            parallel: false,
            delegate: DelegateConventions::default(),
        }
    }
}

impl FrontendConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `CILFRONT_*` environment overrides on top of `self`
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_flag("CILFRONT_SHORT_BRANCHES") {
            self.short_branches = v;
        }
        if let Some(v) = env_flag("CILFRONT_PARALLEL") {
            self.parallel = v;
        }
        if let Some(v) = env_flag("CILFRONT_SKIP_COMPILER_GENERATED") {
            self.skip_compiler_generated = v;
        }
        self
    }

    pub fn with_short_branches(mut self, enabled: bool) -> Self {
        self.short_branches = enabled;
        self
    }

    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    pub fn with_skip_compiler_generated(mut self, enabled: bool) -> Self {
        self.skip_compiler_generated = enabled;
        self
    }

    pub fn with_delegate_conventions(mut self, conventions: DelegateConventions) -> Self {
        self.delegate = conventions;
        self
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|s| parse_flag(&s))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
