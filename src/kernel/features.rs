use crate::foundation::error::{SplitError, SplitResult};

/// Optional code paths the stage kernels must be built with.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RequestedFeatures {
    /// Upper bound on closures per shading point; sizes the per-lane shading state.
    pub max_closure: u32,
    pub experimental: bool,
    pub use_hair: bool,
    pub use_object_motion: bool,
    pub use_camera_motion: bool,
    pub use_baking: bool,
    pub use_subsurface: bool,
    pub use_volume: bool,
    pub use_integrator_branched: bool,
    pub use_patch_evaluation: bool,
    pub use_transparent: bool,
    pub use_principled: bool,
}

impl Default for RequestedFeatures {
    fn default() -> Self {
        Self {
            max_closure: 64,
            experimental: false,
            use_hair: false,
            use_object_motion: false,
            use_camera_motion: false,
            use_baking: false,
            use_subsurface: false,
            use_volume: false,
            use_integrator_branched: false,
            use_patch_evaluation: false,
            use_transparent: false,
            use_principled: false,
        }
    }
}

impl RequestedFeatures {
    /// Every optional path enabled, with the default closure bound.
    pub fn all() -> Self {
        Self {
            max_closure: 64,
            experimental: true,
            use_hair: true,
            use_object_motion: true,
            use_camera_motion: true,
            use_baking: true,
            use_subsurface: true,
            use_volume: true,
            use_integrator_branched: true,
            use_patch_evaluation: true,
            use_transparent: true,
            use_principled: true,
        }
    }

    pub fn from_json_str(s: &str) -> SplitResult<Self> {
        serde_json::from_str(s)
            .map_err(|e| SplitError::config(format!("requested features JSON: {e}")))
    }

    fn flags(&self) -> [(&'static str, bool); 11] {
        [
            ("__KERNEL_EXPERIMENTAL__", self.experimental),
            ("__HAIR__", self.use_hair),
            ("__OBJECT_MOTION__", self.use_object_motion),
            ("__CAMERA_MOTION__", self.use_camera_motion),
            ("__BAKING__", self.use_baking),
            ("__SUBSURFACE__", self.use_subsurface),
            ("__VOLUME__", self.use_volume),
            ("__BRANCHED_PATH__", self.use_integrator_branched),
            ("__PATCH_EVAL__", self.use_patch_evaluation),
            ("__TRANSPARENT_SHADOWS__", self.use_transparent),
            ("__PRINCIPLED__", self.use_principled),
        ]
    }

    /// Compiler defines selecting the requested code paths, e.g. `-D__VOLUME__`.
    pub fn build_options(&self) -> String {
        let mut out = format!("-D__MAX_CLOSURE__={}", self.max_closure);
        for (define, on) in self.flags() {
            if on {
                out.push_str(" -D");
                out.push_str(define);
            }
        }
        out
    }

    /// `true` when every feature requested here is also enabled in `supported`.
    pub fn is_subset_of(&self, supported: &RequestedFeatures) -> bool {
        self.max_closure <= supported.max_closure
            && self
                .flags()
                .iter()
                .zip(supported.flags().iter())
                .all(|((_, want), (_, have))| !*want || *have)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/features.rs"]
mod tests;
